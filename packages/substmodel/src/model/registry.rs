use crate::make_error;
use crate::model::model::{ModelOptions, SubstitutionModel};
use crate::model::presets::{create_preset, ModelName};
use crate::utils::error::ModelError;
use eyre::{Report, WrapErr};
use indexmap::IndexMap;
use itertools::{chain, Itertools};
use lazy_static::lazy_static;
use log::warn;
use parking_lot::RwLock;
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;

pub type ModelFactory = Arc<dyn Fn() -> Result<SubstitutionModel, Report> + Send + Sync>;

lazy_static! {
  static ref REGISTRY: RwLock<IndexMap<String, ModelFactory>> = RwLock::new(IndexMap::new());
}

fn registry_key(name: &str) -> String {
  name.trim().to_lowercase()
}

/// Makes a model factory available to `create_named_model` under the given name.
///
/// Names are case-insensitive. Names of pre-defined models are reserved. Registering a name again replaces the
/// previous factory.
pub fn register_model<F>(name: &str, factory: F) -> Result<(), Report>
where
  F: Fn() -> Result<SubstitutionModel, Report> + Send + Sync + 'static,
{
  if ModelName::from_str(name.trim()).is_ok() {
    return make_error!("Unable to register model '{name}': the name is reserved for a pre-defined model");
  }

  let key = registry_key(name);
  if key.is_empty() {
    return make_error!("Unable to register model: the name is empty");
  }

  if REGISTRY.write().insert(key, Arc::new(factory)).is_some() {
    warn!("Model '{name}' was registered before. The previous factory is replaced.");
  }
  Ok(())
}

/// Names of all models known to `create_named_model`: the pre-defined ones first
pub fn known_models() -> Vec<String> {
  let registered = REGISTRY.read().keys().cloned().collect_vec();
  chain(ModelName::iter().map(|name| name.to_string()), registered).collect()
}

/// Creates a model by name, with default options for pre-defined models.
///
/// Pre-defined models are matched first, then registered factories. Both lookups ignore case.
pub fn create_named_model(name: &str) -> Result<SubstitutionModel, Report> {
  if let Ok(preset) = ModelName::from_str(name.trim()) {
    return create_preset(preset, &ModelOptions::default());
  }

  // Clone the factory out, so that the lock is not held while the model is built
  let factory = REGISTRY.read().get(&registry_key(name)).cloned();
  match factory {
    Some(factory) => factory().wrap_err_with(|| format!("When creating registered model '{name}'")),
    None => Err(
      ModelError::UnknownModel {
        name: name.to_owned(),
        known: known_models().join(", "),
      }
      .into_report(),
    ),
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::alphabet::alphabet::Alphabet;
  use crate::model::model::{create_model, TransitionModel};
  use crate::model::rate_matrix::RateMatrixInput;
  use crate::utils::error::model_error;
  use ndarray::array;
  use pretty_assertions::assert_eq;
  use rstest::rstest;

  fn binary() -> Result<SubstitutionModel, Report> {
    create_model(
      array![0.5, 0.5],
      &RateMatrixInput::Rates(array![[0.0, 1.0], [1.0, 0.0]]),
      Alphabet::from_symbols(['0', '1'])?,
    )
  }

  #[rstest]
  #[case("JC69")]
  #[case("jc69")]
  #[case(" hky85 ")]
  #[case("poisson")]
  #[case("Wag")]
  fn creates_presets_case_insensitively(#[case] name: &str) -> Result<(), Report> {
    let model = create_named_model(name)?;
    assert_eq!(model.name().to_lowercase(), name.trim().to_lowercase());
    Ok(())
  }

  #[rstest]
  fn creates_registered_models_case_insensitively() -> Result<(), Report> {
    register_model("Binary-Test", binary)?;
    let model = create_named_model("BINARY-test")?;
    assert_eq!(model.alphabet().len(), 2);
    assert!(known_models().contains(&"binary-test".to_owned()));
    Ok(())
  }

  #[rstest]
  fn refuses_to_override_presets() {
    assert!(register_model("k80", binary).is_err());
    assert!(register_model("", binary).is_err());
  }

  #[rstest]
  fn fails_on_unknown_model() {
    let report = create_named_model("WAG-unknown").unwrap_err();
    match model_error(&report) {
      Some(ModelError::UnknownModel { name, known }) => {
        assert_eq!(name, "WAG-unknown");
        assert!(known.starts_with("JC69, K80, F81, HKY85, T92, Poisson, WAG"));
      }
      other => panic!("Expected UnknownModel error, found {other:?}"),
    }
  }
}
