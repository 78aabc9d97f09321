use crate::alphabet::alphabet::Alphabet;
use crate::make_report;
use crate::model::model::{ModelOptions, SubstitutionModel, TransitionModel};
use crate::utils::error::ModelError;
use eyre::{Report, WrapErr};
use log::debug;
use ndarray::{s, Array1, Array2};
use std::sync::Arc;

/// Substitution model extended with a gap state.
///
/// Each symbol is deleted (turns into the gap) with rate `mu`. A gap is filled by an insertion with rate `lambda`,
/// and the inserted symbol is drawn from the stationary frequencies of the base model. The gap is the last state of
/// the augmented alphabet.
#[derive(Debug)]
pub struct GapAugmentedModel {
  base: Arc<SubstitutionModel>,
  mu: f64,
  lambda: f64,
  augmented: SubstitutionModel,
}

/// Extends a model with a gap state, built with the same options as the base model
pub fn augment_with_gaps(
  base: Arc<SubstitutionModel>,
  mu: f64,
  lambda: f64,
  gap: char,
) -> Result<GapAugmentedModel, Report> {
  let options = base.options().clone();
  GapAugmentedModel::new(base, mu, lambda, gap, &options)
}

impl GapAugmentedModel {
  pub fn new(
    base: Arc<SubstitutionModel>,
    mu: f64,
    lambda: f64,
    gap: char,
    options: &ModelOptions,
  ) -> Result<Self, Report> {
    let name = format!("{}+gap", base.name());
    Self::new_impl(base, mu, lambda, gap, name.clone(), options)
      .wrap_err_with(|| make_report!("When creating gap-augmented model '{name}' (mu={mu}, lambda={lambda})"))
  }

  fn new_impl(
    base: Arc<SubstitutionModel>,
    mu: f64,
    lambda: f64,
    gap: char,
    name: String,
    options: &ModelOptions,
  ) -> Result<Self, Report> {
    if !mu.is_finite() || !lambda.is_finite() || mu < 0.0 || lambda < 0.0 || mu + lambda < 0.0 {
      return Err(ModelError::InvalidRate { mu, lambda }.into_report());
    }

    let alphabet = base.alphabet().with_gap(gap)?;
    let rate = augmented_rate_matrix(base.rate_matrix(), base.stationary(), mu, lambda);
    let pi = augmented_stationary(base.stationary(), mu, lambda);
    debug!("Augmenting model '{}' with gap '{gap}': mu={mu}, lambda={lambda}", base.name());

    let augmented = SubstitutionModel::from_rate_matrix(name, alphabet, pi, rate, options)?;

    Ok(Self {
      base,
      mu,
      lambda,
      augmented,
    })
  }

  pub fn base(&self) -> &Arc<SubstitutionModel> {
    &self.base
  }

  pub const fn mu(&self) -> f64 {
    self.mu
  }

  pub const fn lambda(&self) -> f64 {
    self.lambda
  }

  pub fn gap(&self) -> Option<char> {
    self.augmented.alphabet().gap()
  }

  /// Underlying model over the augmented alphabet
  pub fn augmented(&self) -> &SubstitutionModel {
    &self.augmented
  }

  /// Probability that a symbol present at time zero is a gap at time `t`: `γ(t) = μ/(μ+λ)·(1 - exp(-(μ+λ)·t))`
  pub fn deletion_probability(&self, t: f64) -> f64 {
    self.relaxed(self.mu, t)
  }

  /// Probability that a gap at time zero is filled at time `t`: `ξ(t) = λ/(μ+λ)·(1 - exp(-(μ+λ)·t))`
  pub fn insertion_probability(&self, t: f64) -> f64 {
    self.relaxed(self.lambda, t)
  }

  fn relaxed(&self, rate: f64, t: f64) -> f64 {
    let total = self.mu + self.lambda;
    if total == 0.0 {
      0.0
    } else {
      rate / total * (1.0 - (-total * t).exp())
    }
  }

  /// Probability of symbol `to` at time `t` given symbol `from` at time zero.
  ///
  /// Sum of two paths: the site survives without deletion and evolves under the base model, or it is deleted and
  /// re-inserted, drawing the symbol from the stationary frequencies.
  pub fn symbol_given_symbol(&self, from: char, to: char, t: f64) -> Result<f64, Report> {
    let i = self.base.alphabet().index(from)?;
    let j = self.base.alphabet().index(to)?;
    let survival = (-self.mu * t).exp();
    let p_base = self.base.matrix_at(t)[[i, j]];
    let pi = self.base.stationary()[j];
    Ok(survival * p_base + (1.0 - self.deletion_probability(t) - survival) * pi)
  }

  pub fn gap_given_symbol(&self, t: f64) -> f64 {
    self.deletion_probability(t)
  }

  pub fn symbol_given_gap(&self, to: char, t: f64) -> Result<f64, Report> {
    let j = self.base.alphabet().index(to)?;
    Ok(self.insertion_probability(t) * self.base.stationary()[j])
  }

  pub fn gap_given_gap(&self, t: f64) -> f64 {
    1.0 - self.insertion_probability(t)
  }
}

impl TransitionModel for GapAugmentedModel {
  fn name(&self) -> &str {
    self.augmented.name()
  }

  fn alphabet(&self) -> &Alphabet {
    self.augmented.alphabet()
  }

  fn stationary(&self) -> &Array1<f64> {
    self.augmented.stationary()
  }

  fn rate_matrix(&self) -> &Array2<f64> {
    self.augmented.rate_matrix()
  }

  fn matrix_at(&self, t: f64) -> Arc<Array2<f64>> {
    self.augmented.matrix_at(t)
  }
}

/// Rate matrix over K+1 states: the base rates with deletion as an extra outflow from every symbol, and insertions
/// distributed according to the stationary frequencies. The result is not renormalized.
fn augmented_rate_matrix(rate: &Array2<f64>, pi: &Array1<f64>, mu: f64, lambda: f64) -> Array2<f64> {
  let n = rate.nrows();
  let mut augmented = Array2::<f64>::zeros((n + 1, n + 1));

  let mut block = augmented.slice_mut(s![..n, ..n]);
  block.assign(rate);
  block.diag_mut().mapv_inplace(|r| r - mu);

  augmented.slice_mut(s![..n, n]).fill(mu);
  augmented.slice_mut(s![n, ..n]).assign(&(pi * lambda));
  augmented[[n, n]] = -lambda;

  augmented
}

fn augmented_stationary(pi: &Array1<f64>, mu: f64, lambda: f64) -> Array1<f64> {
  let n = pi.len();
  let total = mu + lambda;
  let mut augmented = Array1::<f64>::zeros(n + 1);
  if total == 0.0 {
    augmented.slice_mut(s![..n]).assign(pi);
  } else {
    augmented.slice_mut(s![..n]).assign(&(pi * (lambda / total)));
    augmented[n] = mu / total;
  }
  augmented
}
