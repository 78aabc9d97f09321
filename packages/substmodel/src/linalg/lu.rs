use crate::utils::error::ModelError;
use crate::utils::ndarray::{ensure_square, max_abs_axis};
use eyre::Report;
use ndarray::{Array1, Array2, Axis};

/// LU decomposition of a row-permuted square matrix, with `L` and `U` packed into one matrix.
///
/// `L` has an implicit unit diagonal and occupies the strictly lower triangle, `U` the upper triangle including the
/// diagonal. At elimination step `j`, row `j` was interchanged with row `permutation[j]`.
#[derive(Clone, Debug)]
pub struct LuDecomposition {
  lu: Array2<f64>,
  permutation: Vec<usize>,
}

impl LuDecomposition {
  /// Crout decomposition with partial pivoting and implicit row scaling.
  ///
  /// Pivot candidates are compared after scaling each row by the reciprocal of its largest-magnitude entry. Fails
  /// with `ModelError::SingularMatrix` if some row is entirely zero. A pivot which becomes exactly zero during the
  /// elimination is replaced with machine epsilon, so that the decomposition remains usable.
  pub fn new(a: &Array2<f64>) -> Result<Self, Report> {
    let n = ensure_square(a, "matrix to decompose")?;
    let mut lu = a.to_owned();

    let mut scale = max_abs_axis(&lu, Axis(1));
    if let Some(row) = scale.iter().position(|&big| big == 0.0) {
      return Err(ModelError::SingularMatrix { row }.into_report());
    }
    scale.mapv_inplace(|big| 1.0 / big);

    let mut permutation = vec![0; n];
    for j in 0..n {
      for i in 0..j {
        let mut sum = lu[[i, j]];
        for k in 0..i {
          sum -= lu[[i, k]] * lu[[k, j]];
        }
        lu[[i, j]] = sum;
      }

      let mut big: f64 = 0.0;
      let mut imax = j;
      for i in j..n {
        let mut sum = lu[[i, j]];
        for k in 0..j {
          sum -= lu[[i, k]] * lu[[k, j]];
        }
        lu[[i, j]] = sum;

        let candidate = scale[i] * sum.abs();
        if candidate >= big {
          big = candidate;
          imax = i;
        }
      }

      if imax != j {
        for k in 0..n {
          lu.swap([imax, k], [j, k]);
        }
        scale[imax] = scale[j];
      }
      permutation[j] = imax;

      if lu[[j, j]] == 0.0 {
        lu[[j, j]] = f64::EPSILON;
      }

      let pivot = lu[[j, j]];
      for i in (j + 1)..n {
        lu[[i, j]] /= pivot;
      }
    }

    Ok(Self { lu, permutation })
  }

  /// Solves `A·x = b` in place
  pub fn solve_inplace(&self, b: &mut Array1<f64>) {
    let n = self.lu.nrows();

    // Forward substitution, skipping the leading zeros of `b`
    let mut first_nonzero: Option<usize> = None;
    for i in 0..n {
      let ip = self.permutation[i];
      let mut sum = b[ip];
      b[ip] = b[i];
      if let Some(ii) = first_nonzero {
        for j in ii..i {
          sum -= self.lu[[i, j]] * b[j];
        }
      } else if sum != 0.0 {
        first_nonzero = Some(i);
      }
      b[i] = sum;
    }

    for i in (0..n).rev() {
      let mut sum = b[i];
      for j in (i + 1)..n {
        sum -= self.lu[[i, j]] * b[j];
      }
      b[i] = sum / self.lu[[i, i]];
    }
  }

  /// Explicit inverse, assembled column by column from the solutions for each unit vector
  pub fn inverse(&self) -> Array2<f64> {
    let n = self.lu.nrows();
    let mut inv = Array2::<f64>::zeros((n, n));
    let mut col = Array1::<f64>::zeros(n);
    for j in 0..n {
      col.fill(0.0);
      col[j] = 1.0;
      self.solve_inplace(&mut col);
      inv.column_mut(j).assign(&col);
    }
    inv
  }
}

/// Inverts a square matrix using LU decomposition
pub fn invert(a: &Array2<f64>) -> Result<Array2<f64>, Report> {
  Ok(LuDecomposition::new(a)?.inverse())
}
