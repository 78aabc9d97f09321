use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_isaac::Isaac64Rng;

pub fn get_random_number_generator(seed: u64) -> impl Rng {
  Isaac64Rng::seed_from_u64(seed)
}

/// Random stationary frequencies, bounded away from zero and summing to one
pub fn random_frequencies(n: usize, rng: &mut impl Rng) -> Array1<f64> {
  let pi = Array1::from_shape_fn(n, |_| rng.gen_range(0.05..1.0));
  let sum = pi.sum();
  pi / sum
}

/// Random non-negative matrix with zero diagonal
pub fn random_rates(n: usize, rng: &mut impl Rng) -> Array2<f64> {
  Array2::from_shape_fn((n, n), |(i, j)| if i == j { 0.0 } else { rng.gen_range(0.01..2.0) })
}

/// Random symmetric non-negative matrix with zero diagonal
pub fn random_exchangeabilities(n: usize, rng: &mut impl Rng) -> Array2<f64> {
  let mut s = random_rates(n, rng);
  for i in 0..n {
    for j in (i + 1)..n {
      s[[j, i]] = s[[i, j]];
    }
  }
  s
}
