pub mod eigen;
pub mod hessenberg;
pub mod lu;

/// Relative-magnitude zero test: `delta` is negligible if adding it to `scale` does not change `scale`.
///
/// All convergence and zero checks of the solvers go through this, so that they behave the same way regardless of
/// the magnitude of the matrix entries.
#[inline]
pub(crate) fn negligible(delta: f64, scale: f64) -> bool {
  scale + delta == scale
}

/// Largest power-of-hundredth fraction of `scale` which is still negligible relative to `scale`.
///
/// Used as a substitute denominator where an exact zero would otherwise be divided by.
pub(crate) fn negligible_fraction(scale: f64) -> f64 {
  if scale <= 0.0 {
    return f64::MIN_POSITIVE;
  }
  let mut t = scale;
  loop {
    t *= 0.01;
    if !(scale + t > scale) {
      return t;
    }
  }
}
