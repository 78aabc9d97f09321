#![allow(clippy::pub_use)]

use eyre::Report;
use thiserror::Error;

/// Failure kinds of model construction and queries.
///
/// Fallible functions in this crate return `eyre::Report`. A report created from one of these variants can be
/// inspected with `report.downcast_ref::<ModelError>()`, also after context was added with `wrap_err`.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ModelError {
  #[error("Dimension mismatch in {what}: expected {expected}, found {found}")]
  DimensionMismatch {
    what: &'static str,
    expected: String,
    found: String,
  },

  #[error("Matrix is singular: row {row} has no non-zero entries")]
  SingularMatrix { row: usize },

  #[error("Eigenvalue iteration did not converge: {iterations} iterations spent on eigenvalue {index} of a {n}x{n} matrix")]
  EigenConvergence { index: usize, iterations: usize, n: usize },

  #[error("Invalid indel rates: deletion rate mu={mu}, insertion rate lambda={lambda}")]
  InvalidRate { mu: f64, lambda: f64 },

  #[error("Unknown symbol '{symbol}'. Known symbols: {known}")]
  UnknownSymbol { symbol: char, known: String },

  #[error("Unknown substitution model '{name}'. Known models: {known}")]
  UnknownModel { name: String, known: String },

  #[error("Invalid stationary frequency {value} at position {index}: frequencies must be finite and non-negative")]
  InvalidFrequencies { index: usize, value: f64 },

  #[error("Rate matrix cannot be normalized: expected substitution rate is {rate}")]
  DegenerateRateMatrix { rate: f64 },

  #[error("Symbol '{symbol}' occurs more than once in the alphabet")]
  DuplicateSymbol { symbol: char },
}

impl ModelError {
  /// Wraps the error into a report, ready to be returned with `Err(...)`
  pub fn into_report(self) -> Report {
    Report::new(self)
  }
}

/// Finds the `ModelError` carried by a report, if any
pub fn model_error(report: &Report) -> Option<&ModelError> {
  report.downcast_ref::<ModelError>()
}

#[macro_export(local_inner_macros)]
macro_rules! make_error {
  ($($arg:tt)*) => {
    {
      Err(eyre::eyre!(std::format!($($arg)*)))
    }
  };
}

pub use make_error;

#[macro_export(local_inner_macros)]
macro_rules! make_report {
  ($($arg:tt)*) => {
    {
      eyre::eyre!($($arg)*)
    }
  };
}

pub use make_report;

#[cfg(test)]
mod test {
  use super::*;
  use eyre::WrapErr;
  use pretty_assertions::assert_eq;
  use rstest::rstest;

  #[rstest]
  fn model_error_survives_context() {
    let res: Result<(), Report> = Err(ModelError::SingularMatrix { row: 2 }.into_report());
    let report = res.wrap_err("When inverting eigenvectors").unwrap_err();
    assert_eq!(model_error(&report), Some(&ModelError::SingularMatrix { row: 2 }));
    assert_eq!(
      format!("{report:#}"),
      "When inverting eigenvectors: Matrix is singular: row 2 has no non-zero entries"
    );
  }

  #[rstest]
  fn plain_reports_carry_no_model_error() {
    let res: Result<(), Report> = make_error!("Something else: {}", 42);
    let report = res.unwrap_err();
    assert_eq!(model_error(&report), None);
    assert_eq!(format!("{report:#}"), "Something else: 42");
  }
}
