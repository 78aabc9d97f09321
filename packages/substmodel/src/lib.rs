pub mod alphabet;
pub mod linalg;
pub mod model;
pub mod utils;

pub use alphabet::alphabet::{Alphabet, AlphabetName, GAP_CHAR};
pub use linalg::eigen::{EigenDecomposition, EigenOptions};
pub use model::cache::{CacheOptions, CachePolicy};
pub use model::gap::{augment_with_gaps, GapAugmentedModel};
pub use model::model::{create_model, ModelOptions, ModelParams, StateDistribution, SubstitutionModel, TransitionModel};
pub use model::presets::ModelName;
pub use model::rate_matrix::RateMatrixInput;
pub use model::registry::{create_named_model, known_models, register_model};
pub use utils::error::ModelError;
pub use utils::global_init::{global_init, InitOptions};
