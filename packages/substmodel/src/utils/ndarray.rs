use crate::utils::error::ModelError;
use eyre::Report;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};

/// Checks that the matrix is square and returns its dimension
pub fn ensure_square<S: Data<Elem = f64>>(a: &ArrayBase<S, Ix2>, what: &'static str) -> Result<usize, Report> {
  let (rows, cols) = a.dim();
  if rows != cols {
    return Err(
      ModelError::DimensionMismatch {
        what,
        expected: format!("{rows}x{rows}"),
        found: format!("{rows}x{cols}"),
      }
      .into_report(),
    );
  }
  Ok(rows)
}

/// Checks that the matrix is `n x n`
pub fn ensure_shape<S: Data<Elem = f64>>(a: &ArrayBase<S, Ix2>, n: usize, what: &'static str) -> Result<(), Report> {
  let (rows, cols) = a.dim();
  if (rows, cols) != (n, n) {
    return Err(
      ModelError::DimensionMismatch {
        what,
        expected: format!("{n}x{n}"),
        found: format!("{rows}x{cols}"),
      }
      .into_report(),
    );
  }
  Ok(())
}

/// Checks that the vector has length `n`
pub fn ensure_len<S: Data<Elem = f64>>(v: &ArrayBase<S, Ix1>, n: usize, what: &'static str) -> Result<(), Report> {
  if v.len() != n {
    return Err(
      ModelError::DimensionMismatch {
        what,
        expected: n.to_string(),
        found: v.len().to_string(),
      }
      .into_report(),
    );
  }
  Ok(())
}

/// Calculates max of absolute values over given axis
#[inline]
pub fn max_abs_axis(arr: &Array2<f64>, axis: Axis) -> Array1<f64> {
  arr.fold_axis(axis, 0.0, |&a, &b| a.max(b.abs()))
}
