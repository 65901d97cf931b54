use criterion::{criterion_group, criterion_main};

mod benchmarks;
use benchmarks::propagation::propagation_benchmarks;

criterion_group!(propagation_benches, propagation_benchmarks,);

criterion_main!(propagation_benches);
