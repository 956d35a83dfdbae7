// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

fn main() {
    divan::main();
}

const NUM_THREADS: &[usize] = &[1, 2, 4, 8];
const TOLERANCES: &[f64] = &[1e-6, 1e-8, 1e-10];

/// An integrand with uneven difficulty over its domain, so that the initial
/// slices don't balance the load.
fn integrand(x: f64) -> f64 {
    (x * x).sin() + 1.5
}

const FROM: f64 = 0.0;
const TO: f64 = 10.0;

/// Baseline benchmarks using the single-threaded integrators.
mod serial {
    use super::{integrand, FROM, TO, TOLERANCES};
    use divan::{black_box, Bencher};

    #[divan::bench(args = TOLERANCES)]
    fn recursive(bencher: Bencher, eps: f64) {
        bencher.bench_local(|| paraquad::integrate_recursive(integrand, black_box(FROM), TO, eps))
    }

    #[divan::bench(args = TOLERANCES)]
    fn iterative(bencher: Bencher, eps: f64) {
        bencher.bench_local(|| paraquad::integrate_iterative(integrand, black_box(FROM), TO, eps))
    }
}

/// Benchmarks using a divide-and-conquer recursion on Rayon.
mod rayon {
    use super::{integrand, FROM, NUM_THREADS, TO, TOLERANCES};
    use divan::{black_box, Bencher};
    use paraquad::{refine, Interval, Step};

    fn recurse(interval: &Interval, eps: f64) -> f64 {
        match refine(&integrand, interval, eps) {
            Step::Converged(value) => value,
            Step::Split(left, right) => {
                let (left, right) = rayon::join(|| recurse(&left, eps), || recurse(&right, eps));
                left + right
            }
        }
    }

    #[divan::bench(consts = NUM_THREADS, args = TOLERANCES)]
    fn integrate_rayon<const NUM_THREADS: usize>(bencher: Bencher, eps: f64) {
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(NUM_THREADS)
            .build()
            .unwrap();
        // Ideally we'd prefer to run bench_local() inside the Rayon thread pool, but
        // that doesn't work because divan::Bencher isn't Send (and bench_local()
        // consumes it).
        bencher.bench_local(|| {
            thread_pool.install(|| recurse(&Interval::new(&integrand, black_box(FROM), TO), eps))
        });
    }
}

/// Benchmarks using Paraquad.
mod paraquad {
    use super::{integrand, FROM, NUM_THREADS, TO, TOLERANCES};
    use divan::{black_box, Bencher};
    use paraquad::{CpuPinningPolicy, IntegratorBuilder, ThreadCount, DEFAULT_ITERATION_SPAN};

    #[divan::bench(consts = NUM_THREADS, args = TOLERANCES)]
    fn integrate<const NUM_THREADS: usize>(bencher: Bencher, eps: f64) {
        let integrator = IntegratorBuilder {
            num_threads: ThreadCount::try_from(NUM_THREADS).unwrap(),
            cpu_pinning: CpuPinningPolicy::IfSupported,
            iteration_span: DEFAULT_ITERATION_SPAN,
        }
        .build();
        bencher.bench_local(|| integrator.integrate(integrand, black_box(FROM), TO, eps));
    }
}
