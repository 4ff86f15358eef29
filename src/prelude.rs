//! Includes commonly used library components.

pub use crate::{
    BakeResult,
    Error,
    Grid,
    ImpedanceResult,
    IndexBeta,
    LinearSolver,
    RunResult,
};
pub use crate::builder::{
    GridBuilder,
    GridBuilderConfig,
    GridBuilderPadding,
    Region,
    Shape,
};
pub use crate::measurement::{
    perform_measurement,
    Measurement,
    MeasurementKind,
    MeasurementSetup,
};
pub use crate::search::{
    perform_parameter_search,
    ImpedanceCorrelation,
    ParameterSearchConfig,
    SearchDescriptor,
};
#[cfg(feature = "hdf5")]
pub use crate::SaveSettings;
