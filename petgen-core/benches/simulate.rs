//! Measurements of problem loading and simulation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use petgen_core::{Problem, SimulationOptions, Simulator};

const PROBLEM_PATH: &'static str = "../problems/conversion/petab.yaml";

criterion_group!(simulate, problem_from_path, simulate_noise_free, simulate_noisy);
criterion_main!(simulate);

fn problem_from_path(c: &mut Criterion) {
    c.bench_function("problem_from_path", |b| {
        b.iter(|| black_box(Problem::from_path(PROBLEM_PATH).unwrap()))
    });
}

fn simulate_noise_free(c: &mut Criterion) {
    let problem = Problem::from_path(PROBLEM_PATH).unwrap();
    let sim = Simulator::new(&problem).unwrap();
    c.bench_function("simulate_noise_free", |b| {
        b.iter(|| black_box(sim.simulate(false).unwrap()))
    });
}

fn simulate_noisy(c: &mut Criterion) {
    let problem = Problem::from_path(PROBLEM_PATH).unwrap();
    let options = SimulationOptions {
        seed: Some(1),
        ..SimulationOptions::default()
    };
    let sim = Simulator::with_options(&problem, options).unwrap();
    c.bench_function("simulate_noisy", |b| {
        b.iter(|| black_box(sim.simulate(true).unwrap()))
    });
}
