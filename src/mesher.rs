//! Non-uniform grid generation.
//!
//! Physical features are first collected as coordinate lines per axis
//! ([`LinesBuilder`]). The gaps between lines become regions, and each region
//! is subdivided into a [`MeshSegment`] whose cell sizes grade geometrically
//! towards its smaller neighbours ([`generate_region_mesh_segments`]). The
//! concatenated segments form the grid along that axis ([`RegionToGridMap`]).

mod lines_builder;
mod regions;
mod segment;

pub mod search;

pub use lines_builder::{LineId, LinesBuilder, DEFAULT_TOLERANCE};
pub use regions::{generate_region_mesh_segments, RegionSpecification, RegionToGridMap};
pub use segment::{
    ClosedGeometricMeshSegment, LinearMeshSegment, MeshSegment, OpenGeometricMeshSegment,
};
