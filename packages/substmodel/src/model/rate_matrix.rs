use crate::utils::error::ModelError;
use crate::utils::ndarray::{ensure_len, ensure_square, max_abs_axis};
use eyre::Report;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Off-diagonal part of a rate matrix, in one of the two accepted forms
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RateMatrixInput {
  /// Symmetric exchangeabilities `S`. Only the upper triangle is read.
  Exchangeabilities(Array2<f64>),

  /// Instantaneous rates `Q`, used as given. The diagonal is ignored.
  Rates(Array2<f64>),
}

impl RateMatrixInput {
  pub fn matrix(&self) -> &Array2<f64> {
    match self {
      RateMatrixInput::Exchangeabilities(m) | RateMatrixInput::Rates(m) => m,
    }
  }
}

/// Builds a valid normalized rate matrix `R` from stationary frequencies and a matrix of off-diagonal rates.
///
/// After the off-diagonal entries are filled in, every diagonal entry is set to the negated sum of its row, and the
/// whole matrix is divided by the expected substitution rate `Σ -R[i][i]·F[i]`, so that one unit of time corresponds
/// to one expected substitution per site at equilibrium.
pub fn build_rate_matrix(pi: &Array1<f64>, input: &RateMatrixInput) -> Result<Array2<f64>, Report> {
  let n = pi.len();
  let m = input.matrix();
  ensure_square(m, "rate matrix input")?;
  ensure_len(&m.diag(), n, "rate matrix input")?;
  validate_frequencies(pi)?;

  let mut rate = Array2::<f64>::zeros((n, n));
  match input {
    RateMatrixInput::Exchangeabilities(s) => {
      for i in 0..n {
        for j in (i + 1)..n {
          rate[[i, j]] = s[[i, j]] * pi[j];
          rate[[j, i]] = s[[i, j]] * pi[i];
        }
      }
    }
    RateMatrixInput::Rates(q) => {
      rate.assign(q);
      rate.diag_mut().fill(0.0);
    }
  }

  make_valid(&mut rate);

  if max_abs_axis(&rate, Axis(1)).iter().all(|&big| big == 0.0) {
    return Err(ModelError::SingularMatrix { row: 0 }.into_report());
  }

  let expected_rate = expected_rate(&rate, pi);
  if expected_rate == 0.0 || !expected_rate.is_finite() {
    return Err(ModelError::DegenerateRateMatrix { rate: expected_rate }.into_report());
  }

  Ok(rate / expected_rate)
}

/// Sets every diagonal entry to the negated sum of the off-diagonal entries in its row
pub fn make_valid(rate: &mut Array2<f64>) {
  rate.diag_mut().fill(0.0);
  let row_sums = rate.sum_axis(Axis(1));
  rate.diag_mut().assign(&-row_sums);
}

/// Expected number of substitutions per unit time at equilibrium: `Σ -R[i][i]·F[i]`
pub fn expected_rate(rate: &Array2<f64>, pi: &Array1<f64>) -> f64 {
  -(&rate.diag() * pi).sum()
}

pub fn validate_frequencies(pi: &Array1<f64>) -> Result<(), Report> {
  match pi.iter().position(|&p| !p.is_finite() || p < 0.0) {
    Some(index) => Err(
      ModelError::InvalidFrequencies {
        index,
        value: pi[index],
      }
      .into_report(),
    ),
    None => Ok(()),
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::utils::error::model_error;
  use approx::{assert_abs_diff_eq, assert_ulps_eq};
  use ndarray::array;
  use pretty_assertions::assert_eq;
  use rstest::rstest;

  #[rstest]
  fn builds_from_exchangeabilities() -> Result<(), Report> {
    let pi = array![0.1, 0.2, 0.3, 0.4];
    let s = array![
      [0.0, 1.0, 2.0, 1.0],
      [0.0, 0.0, 1.0, 2.0],
      [0.0, 0.0, 0.0, 1.0],
      [0.0, 0.0, 0.0, 0.0],
    ];
    let rate = build_rate_matrix(&pi, &RateMatrixInput::Exchangeabilities(s))?;

    assert_abs_diff_eq!(rate.sum_axis(Axis(1)), Array1::<f64>::zeros(4), epsilon = 1e-14);
    assert_ulps_eq!(expected_rate(&rate, &pi), 1.0, max_ulps = 4);

    // Detailed balance: F[i]·R[i][j] = F[j]·R[j][i]
    for i in 0..4 {
      for j in 0..4 {
        assert_abs_diff_eq!(pi[i] * rate[[i, j]], pi[j] * rate[[j, i]], epsilon = 1e-15);
      }
    }

    assert_ulps_eq!(rate[[0, 2]] / rate[[0, 1]], 2.0 * 0.3 / 0.2, max_ulps = 4);
    Ok(())
  }

  #[rstest]
  fn ignores_lower_triangle_of_exchangeabilities() -> Result<(), Report> {
    let pi = array![0.5, 0.5];
    let upper = build_rate_matrix(&pi, &RateMatrixInput::Exchangeabilities(array![[0.0, 1.0], [0.0, 0.0]]))?;
    let full = build_rate_matrix(&pi, &RateMatrixInput::Exchangeabilities(array![[7.0, 1.0], [42.0, 7.0]]))?;
    assert_eq!(upper, full);
    Ok(())
  }

  #[rstest]
  fn builds_from_raw_rates() -> Result<(), Report> {
    let pi = array![0.5, 0.5];
    let rate = build_rate_matrix(&pi, &RateMatrixInput::Rates(array![[-5.0, 1.0], [1.0, 123.0]]))?;
    assert_eq!(rate, array![[-1.0, 1.0], [1.0, -1.0]]);
    Ok(())
  }

  #[rstest]
  fn does_not_mutate_inputs() -> Result<(), Report> {
    let pi = array![0.25, 0.75];
    let input = RateMatrixInput::Rates(array![[0.0, 2.0], [3.0, 0.0]]);
    let copy = input.clone();
    build_rate_matrix(&pi, &input)?;
    assert_eq!(input, copy);
    assert_eq!(pi, array![0.25, 0.75]);
    Ok(())
  }

  #[rstest]
  fn fails_on_all_zero_input() {
    let report = build_rate_matrix(&array![0.5, 0.5], &RateMatrixInput::Rates(Array2::zeros((2, 2)))).unwrap_err();
    assert_eq!(model_error(&report), Some(&ModelError::SingularMatrix { row: 0 }));
  }

  #[rstest]
  fn fails_when_frequencies_sit_on_absorbing_states() {
    // State 1 never leaves, and all the mass is on it
    let report = build_rate_matrix(&array![0.0, 1.0], &RateMatrixInput::Rates(array![[0.0, 1.0], [0.0, 0.0]])).unwrap_err();
    assert_eq!(model_error(&report), Some(&ModelError::DegenerateRateMatrix { rate: 0.0 }));
  }

  #[rstest]
  fn fails_on_dimension_mismatch() {
    let report = build_rate_matrix(&array![0.5, 0.5], &RateMatrixInput::Rates(Array2::ones((3, 3)))).unwrap_err();
    assert!(matches!(model_error(&report), Some(ModelError::DimensionMismatch { .. })));
  }

  #[rstest]
  fn fails_on_non_square_input() {
    let report = build_rate_matrix(&array![0.5, 0.5], &RateMatrixInput::Rates(Array2::ones((2, 3)))).unwrap_err();
    assert!(matches!(model_error(&report), Some(ModelError::DimensionMismatch { .. })));
  }

  #[rstest]
  fn fails_on_negative_frequency() {
    let report = build_rate_matrix(&array![1.5, -0.5], &RateMatrixInput::Rates(Array2::ones((2, 2)))).unwrap_err();
    assert_eq!(
      model_error(&report),
      Some(&ModelError::InvalidFrequencies { index: 1, value: -0.5 })
    );
  }
}
