use crate::alphabet::alphabet::Alphabet;
use crate::linalg::eigen::{EigenDecomposition, EigenOptions};
use crate::make_report;
use crate::model::cache::{CacheOptions, ProbabilityCache};
use crate::model::rate_matrix::{build_rate_matrix, validate_frequencies, RateMatrixInput};
use crate::utils::ndarray::{ensure_len, ensure_shape};
use eyre::{Report, WrapErr};
use itertools::Itertools;
use log::trace;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use std::fmt::Display;
use std::iter::zip;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, SmartDefault, Serialize, Deserialize)]
pub struct ModelOptions {
  pub cache: CacheOptions,
  pub eigen: EigenOptions,
}

/// Everything needed to rebuild a model with identical probabilities
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
  pub name: String,
  pub alphabet: Alphabet,
  pub pi: Array1<f64>,
  pub rate: Array2<f64>,
}

/// Probabilities of every state of the alphabet, labelled by symbol
#[derive(Clone, Debug, PartialEq)]
pub struct StateDistribution {
  pub symbols: Vec<char>,
  pub probabilities: Array1<f64>,
}

impl StateDistribution {
  pub fn get(&self, symbol: char) -> Option<f64> {
    let index = self.symbols.iter().position(|&s| s == symbol)?;
    Some(self.probabilities[index])
  }

  pub fn iter(&self) -> impl Iterator<Item = (char, f64)> + '_ {
    zip(self.symbols.iter().copied(), self.probabilities.iter().copied())
  }

  pub fn sum(&self) -> f64 {
    self.probabilities.sum()
  }
}

/// Query surface shared by all transition models.
///
/// `P(t)[i][j]` is the probability to be in state `j` after time `t`, given state `i` at time zero. Rows of `P(t)`
/// sum to one.
pub trait TransitionModel: Send + Sync {
  fn name(&self) -> &str;

  fn alphabet(&self) -> &Alphabet;

  /// Stationary frequencies, used as the root prior
  fn stationary(&self) -> &Array1<f64>;

  fn rate_matrix(&self) -> &Array2<f64>;

  /// Transition probability matrix `P(t)`
  fn matrix_at(&self, t: f64) -> Arc<Array2<f64>>;

  /// Transition probability matrices for a batch of times, computed in parallel
  fn matrices_at(&self, ts: &[f64]) -> Vec<Arc<Array2<f64>>> {
    ts.par_iter().map(|&t| self.matrix_at(t)).collect()
  }

  /// Probability to observe `to` after time `t`, given `from` at time zero
  fn probability(&self, from: char, to: char, t: f64) -> Result<f64, Report> {
    let i = self.alphabet().index(from)?;
    let j = self.alphabet().index(to)?;
    Ok(self.matrix_at(t)[[i, j]])
  }

  fn probability_by_index(&self, from: usize, to: usize, t: f64) -> Option<f64> {
    self.matrix_at(t).get((from, to)).copied()
  }

  fn log_probability(&self, from: char, to: char, t: f64) -> Result<f64, Report> {
    Ok(self.probability(from, to, t)?.ln())
  }

  fn stationary_probability(&self, symbol: char) -> Result<f64, Report> {
    let i = self.alphabet().index(symbol)?;
    Ok(self.stationary()[i])
  }

  /// Distribution over all states after time `t`, given `from` at time zero
  fn distribution_given(&self, from: char, t: f64) -> Result<StateDistribution, Report> {
    let i = self.alphabet().index(from)?;
    Ok(StateDistribution {
      symbols: self.alphabet().symbols().collect(),
      probabilities: self.matrix_at(t).row(i).to_owned(),
    })
  }
}

/// Continuous-time Markov chain over a finite alphabet.
///
/// The rate matrix is decomposed once, on construction. Transition matrices are then assembled from the eigendata
/// on demand and memoized per time value.
#[derive(Debug)]
pub struct SubstitutionModel {
  name: String,
  alphabet: Alphabet,
  pi: Array1<f64>,
  rate: Array2<f64>,
  eigen: EigenDecomposition,
  cache: ProbabilityCache,
  options: ModelOptions,
}

impl SubstitutionModel {
  /// Builds the rate matrix from frequencies and off-diagonal rates, normalizes it, and decomposes it
  pub fn new(
    name: impl Into<String>,
    alphabet: Alphabet,
    pi: Array1<f64>,
    input: &RateMatrixInput,
    options: &ModelOptions,
  ) -> Result<Self, Report> {
    let name = name.into();
    ensure_len(&pi, alphabet.len(), "stationary frequencies")
      .and_then(|()| build_rate_matrix(&pi, input))
      .and_then(|rate| Self::from_rate_matrix(name.clone(), alphabet, pi, rate, options))
      .wrap_err_with(|| make_report!("When creating substitution model '{name}'"))
  }

  /// Takes a ready rate matrix as is, without making it valid or normalizing it
  pub(crate) fn from_rate_matrix(
    name: String,
    alphabet: Alphabet,
    pi: Array1<f64>,
    rate: Array2<f64>,
    options: &ModelOptions,
  ) -> Result<Self, Report> {
    let n = alphabet.len();
    ensure_len(&pi, n, "stationary frequencies")?;
    ensure_shape(&rate, n, "rate matrix")?;
    validate_frequencies(&pi)?;

    let eigen = EigenDecomposition::new(&rate, &options.eigen).wrap_err("When decomposing rate matrix")?;

    Ok(Self {
      name,
      alphabet,
      pi,
      rate,
      eigen,
      cache: ProbabilityCache::new(options.cache.clone()),
      options: options.clone(),
    })
  }

  pub fn from_params(params: ModelParams, options: &ModelOptions) -> Result<Self, Report> {
    let ModelParams {
      name,
      alphabet,
      pi,
      rate,
    } = params;
    Self::from_rate_matrix(name.clone(), alphabet, pi, rate, options)
      .wrap_err_with(|| make_report!("When restoring substitution model '{name}' from parameters"))
  }

  pub fn params(&self) -> ModelParams {
    ModelParams {
      name: self.name.clone(),
      alphabet: self.alphabet.clone(),
      pi: self.pi.clone(),
      rate: self.rate.clone(),
    }
  }

  pub fn eigen(&self) -> &EigenDecomposition {
    &self.eigen
  }

  /// Options the model was built with
  pub fn options(&self) -> &ModelOptions {
    &self.options
  }

  pub fn cache_len(&self) -> usize {
    self.cache.len()
  }

  pub fn clear_cache(&self) {
    self.cache.clear();
  }

  /// `P(t) = V·exp(D·t)·V⁻¹`, with every entry replaced by its magnitude
  fn compute_matrix(&self, t: f64) -> Array2<f64> {
    trace!("Computing transition matrix of model '{}' for t={t}", self.name);
    let EigenDecomposition { v, v_inv, .. } = &self.eigen;
    v.dot(&self.eigen.exp_dt(t)).dot(v_inv).mapv(f64::abs)
  }
}

impl TransitionModel for SubstitutionModel {
  fn name(&self) -> &str {
    &self.name
  }

  fn alphabet(&self) -> &Alphabet {
    &self.alphabet
  }

  fn stationary(&self) -> &Array1<f64> {
    &self.pi
  }

  fn rate_matrix(&self) -> &Array2<f64> {
    &self.rate
  }

  fn matrix_at(&self, t: f64) -> Arc<Array2<f64>> {
    self.cache.get_or_insert_with(t, || self.compute_matrix(t))
  }
}

impl Display for SubstitutionModel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "Substitution model '{}'", self.name)?;

    writeln!(f, "\nEquilibrium frequencies (pi_i):")?;
    for (a, p) in zip(self.alphabet.symbols(), &self.pi) {
      writeln!(f, "{a}:\t{p:.4}")?;
    }

    writeln!(f, "\nRates from i->j (R_ij):")?;
    writeln!(f, "\t{}", self.alphabet.symbols().join("\t"))?;
    for (a, row) in zip(self.alphabet.symbols(), self.rate.rows()) {
      writeln!(f, "{a}\t{}", row.iter().map(|r| format!("{r:.4}")).join("\t"))?;
    }

    if self.eigen.has_complex_eigenvalues() {
      writeln!(f, "\nRate matrix has complex eigenvalues")?;
    }

    Ok(())
  }
}

/// Creates a model from user-supplied stationary frequencies and rates, with default options
pub fn create_model(pi: Array1<f64>, input: &RateMatrixInput, alphabet: Alphabet) -> Result<SubstitutionModel, Report> {
  SubstitutionModel::new("custom", alphabet, pi, input, &ModelOptions::default())
}
