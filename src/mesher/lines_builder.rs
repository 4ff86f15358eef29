use crate::Error;

/// Absolute distance under which a pushed line reuses an existing one.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Stable handle to a line pushed into a [`LinesBuilder`].
///
/// The handle keeps pointing at the same physical line through sorting and
/// merging, even though its position in the line list changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LineId(usize);

impl LineId {
    #[inline]
    pub(crate) fn raw(self) -> usize {
        self.0
    }
}

/// An ordered and deduplicated set of coordinate lines along one axis.
#[derive(Clone, Debug)]
pub struct LinesBuilder {
    lines: Vec<f64>,
    id_to_index: Vec<usize>,
    is_sorted: bool,
    scale: f64,
}

impl LinesBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            id_to_index: Vec::new(),
            is_sorted: false,
            scale: 1.0,
        }
    }

    /// Pushes a line, reusing any stored line within [`DEFAULT_TOLERANCE`].
    #[inline]
    pub fn push(&mut self, line: f64) -> LineId {
        self.push_with_tolerance(line, DEFAULT_TOLERANCE)
    }

    /// Pushes a line, reusing any stored line within `tolerance`.
    ///
    /// Deduplication only applies before the lines are sorted. After a
    /// [`sort`](Self::sort) or [`merge`](Self::merge) the line is appended and
    /// the builder is marked unsorted again.
    pub fn push_with_tolerance(&mut self, line: f64, tolerance: f64) -> LineId {
        if !self.is_sorted {
            let existing = self.id_to_index.iter()
                .position(|&index| (self.lines[index]-line).abs() <= tolerance);
            if let Some(id) = existing {
                return LineId(id);
            }
        }

        let id = self.id_to_index.len();
        let index = self.lines.len();
        self.lines.push(line);
        self.id_to_index.push(index);
        self.is_sorted = false;
        LineId(id)
    }

    /// Sorts lines by coordinate while keeping every id on its line.
    pub fn sort(&mut self) {
        if self.is_sorted {
            return;
        }
        let mut order: Vec<usize> = (0..self.lines.len()).collect();
        order.sort_by(|&a, &b| self.lines[a].total_cmp(&self.lines[b]));

        let mut old_to_new = vec![0; order.len()];
        for (new_index, &old_index) in order.iter().enumerate() {
            old_to_new[old_index] = new_index;
        }
        self.lines = order.iter().map(|&i| self.lines[i]).collect();
        for index in self.id_to_index.iter_mut() {
            *index = old_to_new[*index];
        }
        self.is_sorted = true;
    }

    /// Collapses lines that lie within `threshold` of the first line of their run.
    ///
    /// All ids that pointed into a collapsed run point at the surviving line.
    pub fn merge(&mut self, threshold: f64) -> Result<(), Error> {
        if self.lines.is_empty() {
            return Err(Error::EmptyLines);
        }
        self.sort();

        let mut merged_lines: Vec<f64> = Vec::with_capacity(self.lines.len());
        let mut index_to_merged = Vec::with_capacity(self.lines.len());
        let mut anchor = f64::NEG_INFINITY;
        for &line in self.lines.iter() {
            if (line-anchor).abs() > threshold || merged_lines.is_empty() {
                anchor = line;
                merged_lines.push(anchor);
            }
            index_to_merged.push(merged_lines.len()-1);
        }

        self.lines = merged_lines;
        for index in self.id_to_index.iter_mut() {
            *index = index_to_merged[*index];
        }
        Ok(())
    }

    /// Returns the `N-1` gaps between the `N` sorted lines.
    pub fn to_regions(&mut self) -> Result<Vec<f64>, Error> {
        self.sort();
        if self.lines.len() < 2 {
            return Err(Error::InsufficientLines(self.lines.len()));
        }
        Ok(self.lines.windows(2).map(|w| w[1]-w[0]).collect())
    }

    /// Multiplies every stored coordinate by `scale`.
    #[inline]
    pub fn apply_scale(&mut self, scale: f64) {
        self.lines.iter_mut().for_each(|line| *line *= scale);
        self.scale *= scale;
    }

    /// Current position of the line referred to by `id`.
    #[inline]
    pub fn get_index(&self, id: LineId) -> usize {
        self.id_to_index[id.0]
    }

    /// Line positions of every id, indexed by id.
    #[inline]
    pub(crate) fn id_indices(&self) -> &[usize] {
        &self.id_to_index
    }

    #[inline]
    pub fn get_line(&self, id: LineId) -> f64 {
        self.lines[self.get_index(id)]
    }

    #[inline]
    pub fn lines(&self) -> &[f64] {
        &self.lines
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[inline]
    pub fn is_sorted(&self) -> bool {
        self.is_sorted
    }

    /// Accumulated factor applied through [`apply_scale`](Self::apply_scale).
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn min(&self) -> Option<f64> {
        self.lines.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.lines.iter().copied().reduce(f64::max)
    }
}

impl Default for LinesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn push_deduplicates_before_sort() {
        let mut builder = LinesBuilder::new();
        let a = builder.push(1.0);
        let b = builder.push(2.0);
        let c = builder.push(1.0 + 1e-9);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn sort_keeps_ids_on_their_lines() {
        let mut builder = LinesBuilder::new();
        let ids: Vec<_> = [5.0, -1.0, 3.0, 0.5].iter().map(|&x| builder.push(x)).collect();
        builder.sort();
        assert_eq!(builder.lines(), &[-1.0, 0.5, 3.0, 5.0]);
        assert_eq!(builder.get_line(ids[0]), 5.0);
        assert_eq!(builder.get_line(ids[1]), -1.0);
        assert_eq!(builder.get_index(ids[2]), 2);

        // sorting twice changes nothing
        builder.sort();
        assert_eq!(builder.get_index(ids[3]), 1);
    }

    #[test]
    fn merge_collapses_runs_onto_anchor() {
        let mut builder = LinesBuilder::new();
        let a = builder.push(0.0);
        let b = builder.push(0.0005);
        let c = builder.push(1.0);
        let d = builder.push(1.0008);
        let e = builder.push(2.0);
        builder.merge(1e-3).unwrap();

        assert_eq!(builder.lines(), &[0.0, 1.0, 2.0]);
        assert_eq!(builder.get_index(a), builder.get_index(b));
        assert_eq!(builder.get_index(c), 1);
        assert_eq!(builder.get_index(d), 1);
        assert_eq!(builder.get_index(e), 2);
    }

    #[test]
    fn merge_without_lines_fails() {
        let mut builder = LinesBuilder::new();
        assert!(matches!(builder.merge(1e-3), Err(Error::EmptyLines)));
    }

    #[test]
    fn regions_are_gaps_between_lines() {
        let mut builder = LinesBuilder::new();
        for x in [0.2, 3.0, -1.0, 0.0] {
            builder.push(x);
        }
        let regions = builder.to_regions().unwrap();
        assert_eq!(regions.len(), 3);
        assert!(regions.iter().all(|&r| r >= 0.0));
        assert_relative_eq!(regions.iter().sum::<f64>(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn regions_need_two_lines() {
        let mut builder = LinesBuilder::new();
        builder.push(1.0);
        assert!(matches!(builder.to_regions(), Err(Error::InsufficientLines(1))));
    }

    #[test]
    fn scale_multiplies_lines() {
        let mut builder = LinesBuilder::new();
        let id = builder.push(2.5);
        builder.apply_scale(4.0);
        builder.apply_scale(0.5);
        assert_eq!(builder.get_line(id), 5.0);
        assert_eq!(builder.scale(), 2.0);
    }
}
