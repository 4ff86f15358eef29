//! The electrostatic grid and its solve pipeline.

mod csr;
mod grid;
mod impedance;
mod laplacian;
mod lu;

pub mod energy;
pub mod ordering;

pub use csr::CsrMatrix;
pub use grid::{BakeResult, Grid, IndexBeta, RunResult};
pub use impedance::{ImpedanceResult, C_0, EPSILON_0};
pub use laplacian::assemble_laplacian;
pub use lu::{DenseLu, SparseLu};
