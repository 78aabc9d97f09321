pub mod cache;
pub mod gap;
#[allow(clippy::module_inception)]
pub mod model;
pub mod presets;
pub mod rate_matrix;
pub mod registry;
