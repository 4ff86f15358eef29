use crate::mesher::search::{bisection_search, section_search, BisectionConfig, Scored};

/// Subdivision of one region into grid cells.
#[derive(Clone, Debug, PartialEq)]
pub enum MeshSegment {
    Linear(LinearMeshSegment),
    OpenGeometric(OpenGeometricMeshSegment),
    ClosedGeometric(ClosedGeometricMeshSegment),
}

impl MeshSegment {
    /// Cell sizes in order of increasing coordinate.
    pub fn generate_deltas(&self) -> Vec<f64> {
        match self {
            Self::Linear(segment) => segment.generate_deltas(),
            Self::OpenGeometric(segment) => segment.generate_deltas(),
            Self::ClosedGeometric(segment) => segment.generate_deltas(),
        }
    }

    /// Physical length covered by the segment.
    pub fn size(&self) -> f64 {
        match self {
            Self::Linear(segment) => segment.size(),
            Self::OpenGeometric(segment) => segment.size(),
            Self::ClosedGeometric(segment) => segment.size(),
        }
    }

    /// Number of cells in the segment.
    pub fn total_elements(&self) -> usize {
        match self {
            Self::Linear(segment) => segment.n,
            Self::OpenGeometric(segment) => segment.n,
            Self::ClosedGeometric(segment) => segment.left.n + segment.right.n,
        }
    }

    /// Growth ratios used by the segment, `1.0` for linear segments.
    pub fn ratios(&self) -> Vec<f64> {
        match self {
            Self::Linear(_) => vec![1.0],
            Self::OpenGeometric(segment) => vec![segment.r],
            Self::ClosedGeometric(segment) => vec![segment.left.r, segment.right.r],
        }
    }
}

/// `n` cells of equal size `a`.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearMeshSegment {
    pub a: f64,
    pub n: usize,
}

impl LinearMeshSegment {
    #[inline]
    pub fn new(a: f64, n: usize) -> Self {
        Self { a, n }
    }

    pub fn generate_deltas(&self) -> Vec<f64> {
        vec![self.a; self.n]
    }

    #[inline]
    pub fn size(&self) -> f64 {
        self.a*(self.n as f64)
    }
}

/// `n` cells growing from size `a` by ratio `r`.
///
/// When `is_reversed` is set the fixed cell sits at the high coordinate end
/// and the cells grow towards the low end.
#[derive(Clone, Debug, PartialEq)]
pub struct OpenGeometricMeshSegment {
    pub a: f64,
    pub r: f64,
    pub n: usize,
    pub is_reversed: bool,
}

impl OpenGeometricMeshSegment {
    #[inline]
    pub fn new(a: f64, r: f64, n: usize, is_reversed: bool) -> Self {
        Self { a, r, n, is_reversed }
    }

    pub fn generate_deltas(&self) -> Vec<f64> {
        let mut deltas = Vec::with_capacity(self.n);
        let mut size = self.a;
        for _ in 0..self.n {
            deltas.push(size);
            size *= self.r;
        }
        if self.is_reversed {
            deltas.reverse();
        }
        deltas
    }

    #[inline]
    pub fn size(&self) -> f64 {
        Self::calculate_sum(self.a, self.r, self.n)
    }

    /// Sum of the geometric series `a + a*r + ... + a*r^(n-1)`.
    pub fn calculate_sum(a: f64, r: f64, n: usize) -> f64 {
        if (1.0-r).abs() < 1e-9 {
            return a*(n as f64);
        }
        a*(r.powi(n as i32)-1.0)/(r-1.0)
    }

    /// Fractional number of cells needed to cover `sum` at ratio `r`.
    pub fn calculate_n(sum: f64, r: f64, a: f64) -> f64 {
        if (r-1.0).abs() < 1e-9 {
            return sum/a;
        }
        (1.0 + sum*(r-1.0)/a).ln() / r.ln()
    }

    /// Ratio that makes `n` cells starting at `a` cover exactly `sum`.
    pub fn estimate_r(sum: f64, a: f64, n: usize) -> f64 {
        let sample = bisection_search(
            |r: f64| RatioSample {
                r,
                error: (Self::calculate_sum(a, r, n)-sum)/sum,
            },
            0.0, 1.0, &BisectionConfig::default(),
        );
        sample.r
    }

    /// Fewest cells (at least `n_min`) that cover `a_target` growing no faster than `r_max`.
    pub fn search_best_fit(a_target: f64, a: f64, r_max: f64, n_min: usize) -> Self {
        let n_estimate = Self::calculate_n(a_target, r_max, a);
        let n = n_min.max(n_estimate.ceil() as usize);
        let r = Self::estimate_r(a_target, a, n);
        Self::new(a, r, n, false)
    }
}

/// Two open segments meeting in the middle of a region.
///
/// The left half grows from `a_left` by `r0` over `n0` cells, the right half
/// grows from `a_right` (at the high coordinate end) by `r1` over `n1` cells.
/// The ratios are tied by `a_left*r0^n0 == a_right*r1^n1`, so the two
/// innermost cells are each one growth step away from a common size.
#[derive(Clone, Debug, PartialEq)]
pub struct ClosedGeometricMeshSegment {
    pub left: OpenGeometricMeshSegment,
    pub right: OpenGeometricMeshSegment,
}

impl ClosedGeometricMeshSegment {
    #[inline]
    pub fn new(a0: f64, a1: f64, r0: f64, r1: f64, n0: usize, n1: usize) -> Self {
        Self {
            left: OpenGeometricMeshSegment::new(a0, r0, n0, false),
            right: OpenGeometricMeshSegment::new(a1, r1, n1, true),
        }
    }

    pub fn generate_deltas(&self) -> Vec<f64> {
        let mut deltas = self.left.generate_deltas();
        deltas.extend(self.right.generate_deltas());
        deltas
    }

    #[inline]
    pub fn size(&self) -> f64 {
        self.left.size() + self.right.size()
    }

    /// Largest deviation of either ratio from a uniform grid.
    #[inline]
    pub fn max_ratio_deviation(&self) -> f64 {
        (1.0-self.left.r).abs().max((1.0-self.right.r).abs())
    }

    /// Larger of the two growth ratios.
    #[inline]
    pub fn max_ratio(&self) -> f64 {
        self.left.r.max(self.right.r)
    }

    /// Smoothest segment covering `a_target` with a cell count in `[n_lower, n_upper]`.
    ///
    /// Searches the total cell count and the split point between the halves,
    /// solving for `r0` by bisection and deriving `r1` from continuity, and
    /// keeps the candidate whose worst ratio is closest to 1.
    pub fn search_lowest_maximum_ratio(
        a_target: f64,
        a_left: f64,
        a_right: f64,
        n_lower: usize,
        n_upper: usize,
    ) -> Self {
        let n_lower = n_lower.max(2);
        let n_upper = n_upper.max(n_lower);

        let search_n = |n: usize| -> ClosedSample {
            let search_n0 = |n0: usize| -> ClosedSample {
                let n1 = n-n0;
                let sample = bisection_search(
                    |r0: f64| {
                        let r1 = (a_left*r0.powi(n0 as i32)/a_right).powf(1.0/(n1 as f64));
                        let mesh = Self::new(a_left, a_right, r0, r1, n0, n1);
                        let error = (mesh.size()-a_target)/a_target;
                        ClosedSample { mesh, error }
                    },
                    0.0, 1.0, &BisectionConfig::default(),
                );
                let error = sample.mesh.max_ratio_deviation();
                ClosedSample { mesh: sample.mesh, error }
            };
            section_search(search_n0, 1, n-1)
        };
        section_search(search_n, n_lower, n_upper).mesh
    }
}

struct RatioSample {
    r: f64,
    error: f64,
}

impl Scored for RatioSample {
    #[inline]
    fn error(&self) -> f64 {
        self.error
    }
}

#[derive(Clone)]
struct ClosedSample {
    mesh: ClosedGeometricMeshSegment,
    error: f64,
}

impl Scored for ClosedSample {
    #[inline]
    fn error(&self) -> f64 {
        self.error
    }
}
