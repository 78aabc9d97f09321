use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use substmodel::{augment_with_gaps, create_named_model, global_init, InitOptions, TransitionModel, GAP_CHAR};

fn benchmark_main(c: &mut Criterion) {
  global_init(&InitOptions::default());

  let model = Arc::new(create_named_model("HKY85").unwrap());
  let gapped = augment_with_gaps(Arc::clone(&model), 0.1, 0.05, GAP_CHAR).unwrap();
  let wag = create_named_model("WAG").unwrap();
  let branch_lengths: Vec<f64> = (1..=200).map(|i| f64::from(i) * 0.005).collect();

  let mut g = c.benchmark_group("matrix_at");

  g.bench_function("nuc_cached", |b| {
    model.matrix_at(0.1);
    b.iter(|| model.matrix_at(black_box(0.1)));
  });

  g.bench_function("nuc_uncached", |b| {
    b.iter(|| {
      model.clear_cache();
      model.matrix_at(black_box(0.1))
    });
  });

  g.bench_function("nuc_gap_uncached", |b| {
    b.iter(|| {
      gapped.augmented().clear_cache();
      gapped.matrix_at(black_box(0.1))
    });
  });

  g.bench_function("aa_uncached", |b| {
    b.iter(|| {
      wag.clear_cache();
      wag.matrix_at(black_box(0.1))
    });
  });

  g.bench_function("nuc_batch_parallel", |b| {
    b.iter(|| {
      model.clear_cache();
      model.matrices_at(black_box(&branch_lengths))
    });
  });

  g.finish();
}

criterion_group!(benches, benchmark_main);
criterion_main!(benches);
