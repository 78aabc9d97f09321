use crate::linalg::hessenberg::Hessenberg;
use crate::linalg::lu::invert;
use crate::linalg::{negligible, negligible_fraction};
use crate::utils::error::ModelError;
use crate::utils::ndarray::ensure_square;
use eyre::{Report, WrapErr};
use log::debug;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

#[derive(Clone, Debug, PartialEq, Eq, SmartDefault, Serialize, Deserialize)]
pub struct EigenOptions {
  /// Maximum number of QR iterations spent on a single eigenvalue, per row of the matrix
  #[default = 30]
  pub max_iterations_factor: usize,
}

/// Eigendecomposition of a general real square matrix `A`, such that `A·V = V·D`.
///
/// `D` is block diagonal: a real eigenvalue occupies a 1x1 block and a complex-conjugate pair `a ± ib` occupies a
/// 2x2 block `[[a, b], [-b, a]]`. The pair is stored in consecutive positions, with the positive imaginary part
/// first, and the corresponding columns of `V` hold the real and imaginary parts of the eigenvector.
#[derive(Clone, Debug)]
pub struct EigenDecomposition {
  /// Real parts of eigenvalues
  pub wr: Array1<f64>,

  /// Imaginary parts of eigenvalues, non-zero only for complex-conjugate pairs
  pub wi: Array1<f64>,

  /// Eigenvectors, in columns
  pub v: Array2<f64>,

  /// Inverse of `v`
  pub v_inv: Array2<f64>,
}

impl EigenDecomposition {
  pub fn new(a: &Array2<f64>, options: &EigenOptions) -> Result<Self, Report> {
    let n = ensure_square(a, "matrix to decompose")?;
    debug!("Computing eigendecomposition of a {n}x{n} matrix");

    let Hessenberg { mut h, mut z } = Hessenberg::new(a);
    let (wr, wi) = hqr2(&mut h, &mut z, options.max_iterations_factor * n)?;
    let v = z;

    let v_inv = invert(&v).wrap_err("When inverting the matrix of eigenvectors")?;

    Ok(Self { wr, wi, v, v_inv })
  }

  pub fn len(&self) -> usize {
    self.wr.len()
  }

  pub fn is_empty(&self) -> bool {
    self.wr.is_empty()
  }

  pub fn has_complex_eigenvalues(&self) -> bool {
    self.wi.iter().any(|&x| x != 0.0)
  }

  /// Block-diagonal eigenvalue matrix `D`
  pub fn d(&self) -> Array2<f64> {
    self.block_diagonal(|re, im| (re, im))
  }

  /// Block-diagonal matrix `exp(D·t)`.
  ///
  /// A complex pair `a ± ib` turns into the rotation block `exp(a·t)·[[cos(b·t), sin(b·t)], [-sin(b·t), cos(b·t)]]`.
  pub fn exp_dt(&self, t: f64) -> Array2<f64> {
    self.block_diagonal(|re, im| {
      let scale = (re * t).exp();
      (scale * (im * t).cos(), scale * (im * t).sin())
    })
  }

  /// Assembles a block-diagonal matrix. For every eigenvalue `(re, im)` the callback returns the diagonal entry and
  /// the upper off-diagonal entry of its block. Real eigenvalues are passed with `im = 0`.
  fn block_diagonal(&self, f: impl Fn(f64, f64) -> (f64, f64)) -> Array2<f64> {
    let n = self.len();
    let mut d = Array2::<f64>::zeros((n, n));
    let mut i = 0;
    while i < n {
      let (re, im) = (self.wr[i], self.wi[i]);
      if im > 0.0 && i + 1 < n {
        let (diag, off) = f(re, im);
        d[[i, i]] = diag;
        d[[i + 1, i + 1]] = diag;
        d[[i, i + 1]] = off;
        d[[i + 1, i]] = -off;
        i += 2;
      } else {
        d[[i, i]] = f(re, 0.0).0;
        i += 1;
      }
    }
    d
  }
}

/// Complex division `(xr + i·xi) / (yr + i·yi)`
fn cdiv(xr: f64, xi: f64, yr: f64, yi: f64) -> (f64, f64) {
  if yr.abs() > yi.abs() {
    let r = yi / yr;
    let d = yr + r * yi;
    ((xr + r * xi) / d, (xi - r * xr) / d)
  } else {
    let r = yr / yi;
    let d = yi + r * yr;
    ((r * xr + xi) / d, (r * xi - xr) / d)
  }
}

/// Eigenvalues and eigenvectors of an upper Hessenberg matrix by the double-shift QR algorithm.
///
/// On entry `v` holds the transform which produced `h`. On exit `v` holds the eigenvectors of the original matrix and
/// `h` is destroyed. Fails if more than `max_iterations` QR steps are spent on a single eigenvalue.
#[allow(clippy::many_single_char_names, clippy::too_many_lines, unused_assignments)]
fn hqr2(h: &mut Array2<f64>, v: &mut Array2<f64>, max_iterations: usize) -> Result<(Array1<f64>, Array1<f64>), Report> {
  let nn = h.nrows();
  let mut wr = Array1::<f64>::zeros(nn);
  let mut wi = Array1::<f64>::zeros(nn);

  let mut norm: f64 = 0.0;
  for i in 0..nn {
    for j in i.saturating_sub(1)..nn {
      norm += h[[i, j]].abs();
    }
  }

  let (mut p, mut q, mut r, mut s, mut z) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
  let (mut t, mut w, mut x, mut y) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
  let mut exshift: f64 = 0.0;
  let mut iter = 0;

  let mut n = nn as isize - 1;
  while n >= 0 {
    let en = n as usize;

    // Look for a single small sub-diagonal element
    let mut l = en;
    while l > 0 {
      s = h[[l - 1, l - 1]].abs() + h[[l, l]].abs();
      if s == 0.0 {
        s = norm;
      }
      if negligible(h[[l, l - 1]].abs(), s) {
        break;
      }
      l -= 1;
    }

    if l == en {
      // One root found
      h[[en, en]] += exshift;
      wr[en] = h[[en, en]];
      wi[en] = 0.0;
      n -= 1;
      iter = 0;
    } else if l == en - 1 {
      // Two roots found
      w = h[[en, en - 1]] * h[[en - 1, en]];
      p = (h[[en - 1, en - 1]] - h[[en, en]]) / 2.0;
      q = p * p + w;
      z = q.abs().sqrt();
      h[[en, en]] += exshift;
      h[[en - 1, en - 1]] += exshift;
      x = h[[en, en]];

      if q >= 0.0 {
        // Real pair
        z = if p >= 0.0 { p + z } else { p - z };
        wr[en - 1] = x + z;
        wr[en] = wr[en - 1];
        if z != 0.0 {
          wr[en] = x - w / z;
        }
        wi[en - 1] = 0.0;
        wi[en] = 0.0;

        x = h[[en, en - 1]];
        s = x.abs() + z.abs();
        p = x / s;
        q = z / s;
        r = (p * p + q * q).sqrt();
        p /= r;
        q /= r;

        // Row modification
        for j in (en - 1)..nn {
          z = h[[en - 1, j]];
          h[[en - 1, j]] = q * z + p * h[[en, j]];
          h[[en, j]] = q * h[[en, j]] - p * z;
        }

        // Column modification
        for i in 0..=en {
          z = h[[i, en - 1]];
          h[[i, en - 1]] = q * z + p * h[[i, en]];
          h[[i, en]] = q * h[[i, en]] - p * z;
        }

        // Accumulate transformations
        for i in 0..nn {
          z = v[[i, en - 1]];
          v[[i, en - 1]] = q * z + p * v[[i, en]];
          v[[i, en]] = q * v[[i, en]] - p * z;
        }
      } else {
        // Complex pair
        wr[en - 1] = x + p;
        wr[en] = x + p;
        wi[en - 1] = z;
        wi[en] = -z;
      }
      n -= 2;
      iter = 0;
    } else {
      // No convergence yet
      if iter >= max_iterations {
        return Err(
          ModelError::EigenConvergence {
            index: en,
            iterations: iter,
            n: nn,
          }
          .into_report(),
        );
      }

      // Form shift
      x = h[[en, en]];
      y = h[[en - 1, en - 1]];
      w = h[[en, en - 1]] * h[[en - 1, en]];

      // Exceptional shifts, to escape stagnation
      if iter == 10 || iter == 20 {
        exshift += x;
        for i in 0..=en {
          h[[i, i]] -= x;
        }
        s = h[[en, en - 1]].abs() + h[[en - 1, en - 2]].abs();
        x = 0.75 * s;
        y = x;
        w = -0.4375 * s * s;
      }

      iter += 1;

      // Look for two consecutive small sub-diagonal elements
      let mut m = en - 2;
      loop {
        z = h[[m, m]];
        r = x - z;
        s = y - z;
        p = (r * s - w) / h[[m + 1, m]] + h[[m, m + 1]];
        q = h[[m + 1, m + 1]] - z - r - s;
        r = h[[m + 2, m + 1]];
        s = p.abs() + q.abs() + r.abs();
        p /= s;
        q /= s;
        r /= s;
        if m == l {
          break;
        }
        let scale = p.abs() * (h[[m - 1, m - 1]].abs() + z.abs() + h[[m + 1, m + 1]].abs());
        if negligible(h[[m, m - 1]].abs() * (q.abs() + r.abs()), scale) {
          break;
        }
        m -= 1;
      }

      for i in (m + 2)..=en {
        h[[i, i - 2]] = 0.0;
        if i > m + 2 {
          h[[i, i - 3]] = 0.0;
        }
      }

      // Double QR step involving rows l..=en and columns m..=en
      for k in m..en {
        let notlast = k != en - 1;
        if k != m {
          p = h[[k, k - 1]];
          q = h[[k + 1, k - 1]];
          r = if notlast { h[[k + 2, k - 1]] } else { 0.0 };
          x = p.abs() + q.abs() + r.abs();
          if x == 0.0 {
            continue;
          }
          p /= x;
          q /= x;
          r /= x;
        }

        s = (p * p + q * q + r * r).sqrt();
        if p < 0.0 {
          s = -s;
        }
        if s == 0.0 {
          continue;
        }

        if k != m {
          h[[k, k - 1]] = -s * x;
        } else if l != m {
          h[[k, k - 1]] = -h[[k, k - 1]];
        }
        p += s;
        x = p / s;
        y = q / s;
        z = r / s;
        q /= p;
        r /= p;

        // Row modification
        for j in k..nn {
          p = h[[k, j]] + q * h[[k + 1, j]];
          if notlast {
            p += r * h[[k + 2, j]];
            h[[k + 2, j]] -= p * z;
          }
          h[[k, j]] -= p * x;
          h[[k + 1, j]] -= p * y;
        }

        // Column modification
        for i in 0..=en.min(k + 3) {
          p = x * h[[i, k]] + y * h[[i, k + 1]];
          if notlast {
            p += z * h[[i, k + 2]];
            h[[i, k + 2]] -= p * r;
          }
          h[[i, k]] -= p;
          h[[i, k + 1]] -= p * q;
        }

        // Accumulate transformations
        for i in 0..nn {
          p = x * v[[i, k]] + y * v[[i, k + 1]];
          if notlast {
            p += z * v[[i, k + 2]];
            v[[i, k + 2]] -= p * r;
          }
          v[[i, k]] -= p;
          v[[i, k + 1]] -= p * q;
        }
      }
    }
  }

  if norm == 0.0 {
    return Ok((wr, wi));
  }

  // Back-substitute to find vectors of the upper quasi-triangular form
  for en in (0..nn).rev() {
    p = wr[en];
    q = wi[en];

    if q == 0.0 {
      // Real vector
      let mut l = en;
      h[[en, en]] = 1.0;
      for i in (0..en).rev() {
        w = h[[i, i]] - p;
        r = 0.0;
        for j in l..=en {
          r += h[[i, j]] * h[[j, en]];
        }
        if wi[i] < 0.0 {
          z = w;
          s = r;
          continue;
        }

        l = i;
        if wi[i] == 0.0 {
          t = if w == 0.0 { negligible_fraction(norm) } else { w };
          h[[i, en]] = -r / t;
        } else {
          // Solve real equations
          x = h[[i, i + 1]];
          y = h[[i + 1, i]];
          q = (wr[i] - p) * (wr[i] - p) + wi[i] * wi[i];
          t = (x * s - z * r) / q;
          h[[i, en]] = t;
          h[[i + 1, en]] = if x.abs() > z.abs() {
            (-r - w * t) / x
          } else {
            (-s - y * t) / z
          };
        }

        // Overflow control
        t = h[[i, en]].abs();
        if t != 0.0 && negligible(1.0 / t, t) {
          for j in i..=en {
            h[[j, en]] /= t;
          }
        }
      }
    } else if q < 0.0 {
      // Complex vector, stored in columns `en - 1` (real part) and `en` (imaginary part)
      let mut l = en - 1;

      // Last vector component imaginary so matrix is triangular
      if h[[en, en - 1]].abs() > h[[en - 1, en]].abs() {
        h[[en - 1, en - 1]] = q / h[[en, en - 1]];
        h[[en - 1, en]] = -(h[[en, en]] - p) / h[[en, en - 1]];
      } else {
        let (re, im) = cdiv(0.0, -h[[en - 1, en]], h[[en - 1, en - 1]] - p, q);
        h[[en - 1, en - 1]] = re;
        h[[en - 1, en]] = im;
      }
      h[[en, en - 1]] = 0.0;
      h[[en, en]] = 1.0;

      for i in (0..en.saturating_sub(1)).rev() {
        let mut ra: f64 = 0.0;
        let mut sa: f64 = 0.0;
        for j in l..=en {
          ra += h[[i, j]] * h[[j, en - 1]];
          sa += h[[i, j]] * h[[j, en]];
        }
        w = h[[i, i]] - p;

        if wi[i] < 0.0 {
          z = w;
          r = ra;
          s = sa;
          continue;
        }

        l = i;
        if wi[i] == 0.0 {
          let (re, im) = cdiv(-ra, -sa, w, q);
          h[[i, en - 1]] = re;
          h[[i, en]] = im;
        } else {
          // Solve complex equations
          x = h[[i, i + 1]];
          y = h[[i + 1, i]];
          let mut vr = (wr[i] - p) * (wr[i] - p) + wi[i] * wi[i] - q * q;
          let vi = (wr[i] - p) * 2.0 * q;
          if vr == 0.0 && vi == 0.0 {
            vr = negligible_fraction(norm * (w.abs() + q.abs() + x.abs() + y.abs() + z.abs()));
          }
          let (re, im) = cdiv(x * r - z * ra + q * sa, x * s - z * sa - q * ra, vr, vi);
          h[[i, en - 1]] = re;
          h[[i, en]] = im;
          if x.abs() > z.abs() + q.abs() {
            h[[i + 1, en - 1]] = (-ra - w * h[[i, en - 1]] + q * h[[i, en]]) / x;
            h[[i + 1, en]] = (-sa - w * h[[i, en]] - q * h[[i, en - 1]]) / x;
          } else {
            let (re, im) = cdiv(-r - y * h[[i, en - 1]], -s - y * h[[i, en]], z, q);
            h[[i + 1, en - 1]] = re;
            h[[i + 1, en]] = im;
          }
        }

        // Overflow control
        t = h[[i, en - 1]].abs().max(h[[i, en]].abs());
        if t != 0.0 && negligible(1.0 / t, t) {
          for j in i..=en {
            h[[j, en - 1]] /= t;
            h[[j, en]] /= t;
          }
        }
      }
    }
  }

  // Back transformation to get eigenvectors of the original matrix
  for j in (0..nn).rev() {
    for i in 0..nn {
      z = 0.0;
      for k in 0..=j {
        z += v[[i, k]] * h[[k, j]];
      }
      v[[i, j]] = z;
    }
  }

  Ok((wr, wi))
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::pretty_assert_ulps_eq;
  use crate::utils::error::model_error;
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use pretty_assertions::assert_eq;
  use rstest::rstest;

  fn sorted(x: &Array1<f64>) -> Vec<f64> {
    let mut x = x.to_vec();
    x.sort_by(f64::total_cmp);
    x
  }

  fn reconstruct(eig: &EigenDecomposition) -> Array2<f64> {
    eig.v.dot(&eig.d()).dot(&eig.v_inv)
  }

  #[rstest]
  fn decomposes_symmetric_rate_matrix() -> Result<(), Report> {
    let a = array![[-1.0, 1.0], [1.0, -1.0]];
    let eig = EigenDecomposition::new(&a, &EigenOptions::default())?;
    assert_abs_diff_eq!(sorted(&eig.wr).as_slice(), [-2.0, 0.0].as_slice(), epsilon = 1e-14);
    assert!(!eig.has_complex_eigenvalues());
    assert_abs_diff_eq!(reconstruct(&eig), a, epsilon = 1e-14);
    Ok(())
  }

  #[rstest]
  fn decomposes_general_rate_matrix() -> Result<(), Report> {
    let a = array![
      [-1.1, 0.3, 0.5, 0.3],
      [0.2, -0.9, 0.4, 0.3],
      [0.7, 0.1, -1.5, 0.7],
      [0.05, 0.8, 0.15, -1.0],
    ];
    let eig = EigenDecomposition::new(&a, &EigenOptions::default())?;

    assert_abs_diff_eq!(a.dot(&eig.v), eig.v.dot(&eig.d()), epsilon = 1e-12);
    assert_abs_diff_eq!(reconstruct(&eig), a, epsilon = 1e-12);
    assert_abs_diff_eq!(eig.wr.sum(), a.diag().sum(), epsilon = 1e-12);

    // A generator always has a zero eigenvalue
    assert!(eig.wr.iter().any(|x| x.abs() < 1e-12));
    Ok(())
  }

  #[rstest]
  fn decomposes_matrix_with_complex_eigenvalues() -> Result<(), Report> {
    // Cyclic chain 0 -> 1 -> 2 -> 0: eigenvalues 0 and -3/2 ± i·sqrt(3)/2
    let a = array![[-1.0, 1.0, 0.0], [0.0, -1.0, 1.0], [1.0, 0.0, -1.0]];
    let eig = EigenDecomposition::new(&a, &EigenOptions::default())?;

    assert!(eig.has_complex_eigenvalues());
    let k = eig.wi.iter().position(|&x| x > 0.0).unwrap();
    assert_abs_diff_eq!(eig.wr[k], -1.5, epsilon = 1e-12);
    assert_abs_diff_eq!(eig.wi[k], 3.0_f64.sqrt() / 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(eig.wr[k + 1], -1.5, epsilon = 1e-12);
    assert_abs_diff_eq!(eig.wi[k + 1], -(3.0_f64.sqrt()) / 2.0, epsilon = 1e-12);

    assert_abs_diff_eq!(a.dot(&eig.v), eig.v.dot(&eig.d()), epsilon = 1e-12);
    assert_abs_diff_eq!(reconstruct(&eig), a, epsilon = 1e-12);
    Ok(())
  }

  #[rstest]
  fn decomposes_rotation() -> Result<(), Report> {
    let a = array![[0.0, 1.0], [-1.0, 0.0]];
    let eig = EigenDecomposition::new(&a, &EigenOptions::default())?;
    pretty_assert_ulps_eq!(eig.wr, array![0.0, 0.0]);
    pretty_assert_ulps_eq!(eig.wi, array![1.0, -1.0]);
    assert_abs_diff_eq!(reconstruct(&eig), a, epsilon = 1e-14);
    Ok(())
  }

  #[rstest]
  fn decomposes_matrix_with_repeated_eigenvalues() -> Result<(), Report> {
    let a = array![
      [-1.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0],
      [1.0 / 3.0, -1.0, 1.0 / 3.0, 1.0 / 3.0],
      [1.0 / 3.0, 1.0 / 3.0, -1.0, 1.0 / 3.0],
      [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, -1.0],
    ];
    let eig = EigenDecomposition::new(&a, &EigenOptions::default())?;
    assert_abs_diff_eq!(
      sorted(&eig.wr).as_slice(),
      [-4.0 / 3.0, -4.0 / 3.0, -4.0 / 3.0, 0.0].as_slice(),
      epsilon = 1e-12
    );
    assert_abs_diff_eq!(reconstruct(&eig), a, epsilon = 1e-8);
    Ok(())
  }

  #[rstest]
  fn decomposes_zero_matrix() -> Result<(), Report> {
    let a = Array2::<f64>::zeros((3, 3));
    let eig = EigenDecomposition::new(&a, &EigenOptions::default())?;
    assert_eq!(eig.wr, Array1::<f64>::zeros(3));
    assert_eq!(eig.v, Array2::<f64>::eye(3));
    Ok(())
  }

  #[rstest]
  fn fails_when_iterations_are_exhausted() {
    let a = array![
      [-1.1, 0.3, 0.5, 0.3],
      [0.2, -0.9, 0.4, 0.3],
      [0.7, 0.1, -1.5, 0.7],
      [0.05, 0.8, 0.15, -1.0],
    ];
    let options = EigenOptions {
      max_iterations_factor: 0,
    };
    let report = EigenDecomposition::new(&a, &options).unwrap_err();
    assert_eq!(
      model_error(&report),
      Some(&ModelError::EigenConvergence {
        index: 3,
        iterations: 0,
        n: 4
      })
    );
  }

  #[rstest]
  fn computes_complex_division() {
    // (1 + 2i) / (3 + 4i) = (11 + 2i) / 25
    let (re, im) = cdiv(1.0, 2.0, 3.0, 4.0);
    assert_abs_diff_eq!(re, 11.0 / 25.0, epsilon = 1e-15);
    assert_abs_diff_eq!(im, 2.0 / 25.0, epsilon = 1e-15);

    let (re, im) = cdiv(1.0, 2.0, 4.0, 3.0);
    assert_abs_diff_eq!(re, 10.0 / 25.0, epsilon = 1e-15);
    assert_abs_diff_eq!(im, 5.0 / 25.0, epsilon = 1e-15);
  }

  #[rstest]
  fn computes_exp_dt_for_complex_pair() -> Result<(), Report> {
    let a = array![[0.0, 1.0], [-1.0, 0.0]];
    let eig = EigenDecomposition::new(&a, &EigenOptions::default())?;
    let t = 0.3_f64;
    let expected = array![[t.cos(), t.sin()], [-t.sin(), t.cos()]];
    assert_abs_diff_eq!(eig.v.dot(&eig.exp_dt(t)).dot(&eig.v_inv), expected, epsilon = 1e-14);
    Ok(())
  }
}
