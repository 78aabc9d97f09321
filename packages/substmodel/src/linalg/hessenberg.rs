use ndarray::Array2;

/// Upper Hessenberg form `H` of a square matrix `A`, together with the transform `Z` such that `A·Z = Z·H`.
#[derive(Clone, Debug)]
pub struct Hessenberg {
  /// Upper Hessenberg matrix. Entries below the first sub-diagonal are exactly zero.
  pub h: Array2<f64>,

  /// Accumulated similarity transform
  pub z: Array2<f64>,
}

impl Hessenberg {
  /// Reduces a real square matrix to upper Hessenberg form.
  ///
  /// The input is left untouched: the reduction happens on an owned working copy.
  pub fn new(a: &Array2<f64>) -> Self {
    let mut h = a.to_owned();
    let pivots = eliminate(&mut h);
    let z = accumulate(&h, &pivots);

    // Multipliers were stored below the sub-diagonal and are not part of the Hessenberg matrix
    let n = h.nrows();
    for i in 2..n {
      for j in 0..i - 1 {
        h[[i, j]] = 0.0;
      }
    }

    Self { h, z }
  }
}

/// Gaussian elimination with partial pivoting, applied as similarity transforms, column by column.
///
/// For every column `m - 1`, rows `m + 1..n` are eliminated using the largest-magnitude entry of rows `m..n` as the
/// pivot. The multiplier used for row `i` is kept in `a[i, m - 1]` and the row interchanged into position `m` is
/// returned in `pivots[m]`.
fn eliminate(a: &mut Array2<f64>) -> Vec<usize> {
  let n = a.nrows();
  let mut pivots: Vec<usize> = (0..n).collect();

  for m in 1..n.saturating_sub(1) {
    let mut x: f64 = 0.0;
    let mut pivot = m;
    for j in m..n {
      if a[[j, m - 1]].abs() > x.abs() {
        x = a[[j, m - 1]];
        pivot = j;
      }
    }
    pivots[m] = pivot;

    if pivot != m {
      for j in (m - 1)..n {
        a.swap([pivot, j], [m, j]);
      }
      for j in 0..n {
        a.swap([j, pivot], [j, m]);
      }
    }

    if x == 0.0 {
      continue;
    }

    for i in (m + 1)..n {
      let mut y = a[[i, m - 1]];
      if y == 0.0 {
        continue;
      }
      y /= x;
      a[[i, m - 1]] = y;
      for j in m..n {
        a[[i, j]] -= y * a[[m, j]];
      }
      for j in 0..n {
        a[[j, m]] += y * a[[j, i]];
      }
    }
  }

  pivots
}

/// Builds the transform carrying eigenvectors of the Hessenberg form back to the original basis, from the
/// multipliers and interchanges recorded by `eliminate`.
fn accumulate(a: &Array2<f64>, pivots: &[usize]) -> Array2<f64> {
  let n = a.nrows();
  let mut z = Array2::<f64>::eye(n);

  for mp in (1..n.saturating_sub(1)).rev() {
    for i in (mp + 1)..n {
      z[[i, mp]] = a[[i, mp - 1]];
    }

    let pivot = pivots[mp];
    if pivot != mp {
      for j in mp..n {
        z[[mp, j]] = z[[pivot, j]];
        z[[pivot, j]] = 0.0;
      }
      z[[pivot, mp]] = 1.0;
    }
  }

  z
}

#[cfg(test)]
mod test {
  use super::*;
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use rstest::rstest;

  #[rstest]
  fn reduces_to_hessenberg_form() {
    let a = array![
      [-1.1, 0.3, 0.5, 0.3],
      [0.2, -0.9, 0.4, 0.3],
      [0.7, 0.1, -1.5, 0.7],
      [0.05, 0.8, 0.15, -1.0],
    ];

    let Hessenberg { h, z } = Hessenberg::new(&a);

    for i in 2..4 {
      for j in 0..i - 1 {
        assert_eq!(h[[i, j]], 0.0);
      }
    }

    assert_abs_diff_eq!(a.dot(&z), z.dot(&h), epsilon = 1e-12);
  }

  #[rstest]
  fn preserves_trace() {
    let a = array![[0.0, 2.0, 1.0], [3.0, -2.0, 0.5], [1.0, 4.0, 1.0]];
    let Hessenberg { h, .. } = Hessenberg::new(&a);
    assert_abs_diff_eq!(h.diag().sum(), a.diag().sum(), epsilon = 1e-12);
  }

  #[rstest]
  fn leaves_small_matrices_as_is() {
    let a = array![[1.0, 2.0], [3.0, 4.0]];
    let Hessenberg { h, z } = Hessenberg::new(&a);
    assert_eq!(h, a);
    assert_eq!(z, Array2::<f64>::eye(2));
  }
}
