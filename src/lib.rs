//! A 2-dimensional electrostatic field solver for the characteristic impedance of
//! printed circuit board transmission line cross-sections.
//!
//! The pipeline is: mesh the cross-section into a graded non-uniform grid
//! ([`mesher`]), paint voltage and dielectric regions onto it ([`builder`]),
//! factor the discrete Laplacian once ([`Grid::bake`]), solve for the voltage
//! field ([`Grid::run`]) and integrate the field energy into an
//! [`ImpedanceResult`]. The [`search`] driver repeats this pipeline to find the
//! geometry that hits a target impedance.
//!
//! To get started, refer to the `demos` directory in the main repository.

pub mod builder;
pub mod electrostatic;
pub mod measurement;
pub mod mesher;
pub mod prelude;
pub mod search;
pub mod view;

#[cfg(feature = "hdf5")]
mod save;

pub use electrostatic::{
    BakeResult, CsrMatrix, DenseLu, Grid, ImpedanceResult, IndexBeta, RunResult, SparseLu,
};
#[cfg(feature = "hdf5")]
pub use save::SaveSettings;

/// Represents an error in the field solver.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Need at least 2 grid lines for a region (got {0})")]
    InsufficientLines(usize),
    #[error("No lines have been pushed to the lines builder")]
    EmptyLines,
    #[error("Region lines must be sorted before creating a region to grid map")]
    UnsortedLines,
    #[error("Number of region lines ({total_lines}) - 1 does not correspond to \
        number of region segments ({total_segments})")]
    SegmentCountMismatch {
        total_lines: usize,
        total_segments: usize,
    },
    #[error("{array_name} does not have expected shape \
        ( {array_name} shape: {input_shape:?}, \
        expected shape: {expected_shape:?} )")]
    BadShape {
        array_name: String,
        input_shape: Vec<usize>,
        expected_shape: Vec<usize>,
    },
    #[error("{table_name} table has no entry at index {index} (table length: {length})")]
    UnknownTableIndex {
        table_name: String,
        index: usize,
        length: usize,
    },
    #[error("LU solver has not been factorised yet, call bake() first")]
    NotBaked,
    #[error("Dirichlet nodes changed since the last bake(), the grid must be baked again")]
    TopologyChanged,
    #[error("Maximum search value {max_value} is less than minimum search value {min_value}")]
    InvalidSearchRange {
        min_value: f64,
        max_value: f64,
    },
    #[error("Parameter search failed to generate any results")]
    NoSearchResults,
    #[error("Save file {0} already exists and overwrite is not set")]
    FileExists(String),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    H5Error(#[from] hdf5::Error),
}

/// Represents a numerical failure inside a linear solver.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Singular matrix: no usable pivot in column {column}")]
    SingularMatrix { column: usize },
    #[error("Solve produced a non-finite value at row {index}")]
    NonFiniteSolution { index: usize },
    #[error("Matrix dimension mismatch ( rows: {rows}, columns: {cols}, rhs: {rhs} )")]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        rhs: usize,
    },
}

/// Solves `Ax = b` for a matrix that has already been factorised.
///
/// Implementors are produced once per sparsity pattern by [`Grid::bake`] and
/// reused for every right hand side that shares that pattern.
pub trait LinearSolver {
    /// Overwrites `rhs` with the solution `x`.
    fn solve(&self, rhs: &mut [f64]) -> Result<(), SolverError>;

    /// The dimension of the factorised system.
    fn size(&self) -> usize;

    /// Number of stored non-zeros in the factors.
    fn nnz(&self) -> usize;
}
