/// A sparse matrix in compressed sparse row format.
///
/// Rows are appended in order: call [`push_row`](Self::push_row) once before
/// the entries of every row and once more after the last row, so the row
/// pointer always grows by exactly one per row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CsrMatrix {
    ncols: usize,
    values: Vec<f64>,
    col_indices: Vec<usize>,
    row_ptr: Vec<usize>,
}

impl CsrMatrix {
    #[inline]
    pub fn new(ncols: usize) -> Self {
        Self {
            ncols,
            values: Vec::new(),
            col_indices: Vec::new(),
            row_ptr: Vec::new(),
        }
    }

    /// Preallocates room for `nrows` rows and `nnz` entries.
    #[inline]
    pub fn with_capacity(ncols: usize, nrows: usize, nnz: usize) -> Self {
        Self {
            ncols,
            values: Vec::with_capacity(nnz),
            col_indices: Vec::with_capacity(nnz),
            row_ptr: Vec::with_capacity(nrows+1),
        }
    }

    /// Starts a new row, or closes the last one.
    #[inline]
    pub fn push_row(&mut self) {
        self.row_ptr.push(self.values.len());
    }

    /// Appends an entry to the current row.
    #[inline]
    pub fn push_entry(&mut self, value: f64, column: usize) {
        self.values.push(value);
        self.col_indices.push(column);
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.row_ptr.len().saturating_sub(1)
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// Column indices and values of one row.
    #[inline]
    pub fn row(&self, row: usize) -> (&[usize], &[f64]) {
        let range = self.row_ptr[row]..self.row_ptr[row+1];
        (&self.col_indices[range.clone()], &self.values[range])
    }

    /// Value at `(row, col)`, zero when the entry is not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let (cols, values) = self.row(row);
        cols.iter().zip(values.iter())
            .filter(|(&c, _)| c == col)
            .map(|(_, &v)| v)
            .sum()
    }

    /// Computes `A*x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        (0..self.nrows())
            .map(|row| {
                let (cols, values) = self.row(row);
                cols.iter().zip(values.iter()).map(|(&c, &v)| v*x[c]).sum()
            })
            .collect()
    }

    /// The transpose, which doubles as column access into this matrix.
    pub fn transpose(&self) -> CsrMatrix {
        let nrows = self.nrows();
        let mut counts = vec![0usize; self.ncols+1];
        for &col in self.col_indices.iter() {
            counts[col+1] += 1;
        }
        for i in 0..self.ncols {
            counts[i+1] += counts[i];
        }
        let row_ptr = counts.clone();

        let mut next = counts;
        let mut values = vec![0.0; self.nnz()];
        let mut col_indices = vec![0; self.nnz()];
        for row in 0..nrows {
            let (cols, vals) = self.row(row);
            for (&col, &value) in cols.iter().zip(vals.iter()) {
                let dest = next[col];
                values[dest] = value;
                col_indices[dest] = row;
                next[col] += 1;
            }
        }

        CsrMatrix {
            ncols: nrows,
            values,
            col_indices,
            row_ptr,
        }
    }

    /// Expands into a dense row-major matrix.
    pub fn to_dense(&self) -> ndarray::Array2<f64> {
        let mut dense = ndarray::Array2::<f64>::zeros((self.nrows(), self.ncols));
        for row in 0..self.nrows() {
            let (cols, values) = self.row(row);
            for (&col, &value) in cols.iter().zip(values.iter()) {
                dense[[row, col]] += value;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // [[2, 0, 1],
    //  [0, 3, 0],
    //  [4, 0, 5]]
    fn sample() -> CsrMatrix {
        let mut a = CsrMatrix::new(3);
        a.push_row();
        a.push_entry(2.0, 0);
        a.push_entry(1.0, 2);
        a.push_row();
        a.push_entry(3.0, 1);
        a.push_row();
        a.push_entry(4.0, 0);
        a.push_entry(5.0, 2);
        a.push_row();
        a
    }

    #[test]
    fn rows_and_lookup() {
        let a = sample();
        assert_eq!(a.nrows(), 3);
        assert_eq!(a.nnz(), 5);
        assert_eq!(a.row_ptr(), &[0, 2, 3, 5]);
        assert_eq!(a.get(2, 0), 4.0);
        assert_eq!(a.get(1, 0), 0.0);
        assert_eq!(a.mul_vec(&[1.0, 1.0, 1.0]), vec![3.0, 3.0, 9.0]);
    }

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let a = sample();
        let at = a.transpose();
        assert_eq!(at.nrows(), 3);
        for row in 0..3 {
            for col in 0..3 {
                assert_eq!(a.get(row, col), at.get(col, row));
            }
        }
        assert_eq!(at.transpose(), a);
    }

    #[test]
    fn empty_rows_are_kept() {
        let mut a = CsrMatrix::new(2);
        a.push_row();
        a.push_row();
        a.push_entry(1.0, 1);
        a.push_row();
        assert_eq!(a.nrows(), 2);
        assert_eq!(a.row(0).0.len(), 0);
        assert_eq!(a.to_dense(), ndarray::arr2(&[[0.0, 0.0], [0.0, 1.0]]));
    }
}
