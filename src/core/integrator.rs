// Copyright 2024-2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Parallel integrator, dispatching slices of the domain to worker threads.

use super::observer::{IntervalObserver, NoopObserver, RunStats};
use super::sync::SharedContext;
use super::worker::ThreadContext;
use crate::kernel::check_domain;
#[cfg(feature = "log_parallelism")]
use crate::macros::log_info;
use crate::macros::{log_debug, log_error, log_warn};
// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;

/// Default number of splits between two attempts of a worker thread to share
/// work with the others.
pub const DEFAULT_ITERATION_SPAN: NonZeroU32 = match NonZeroU32::new(0x400) {
    Some(span) => span,
    None => unreachable!(),
};

/// Number of worker threads to spawn for each integration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadCount {
    /// Spawn the number of threads returned by
    /// [`std::thread::available_parallelism()`].
    AvailableParallelism,
    /// Spawn the given number of threads.
    Count(NonZeroUsize),
}

impl TryFrom<usize> for ThreadCount {
    type Error = <NonZeroUsize as TryFrom<usize>>::Error;

    fn try_from(thread_count: usize) -> Result<Self, Self::Error> {
        let count = NonZeroUsize::try_from(thread_count)?;
        Ok(ThreadCount::Count(count))
    }
}

/// Policy to pin worker threads to CPUs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuPinningPolicy {
    /// Don't pin worker threads to CPUs.
    No,
    /// Pin each worker thread to a CPU, if CPU pinning is supported and
    /// implemented on this platform.
    IfSupported,
    /// Pin each worker thread to a CPU. If CPU pinning isn't supported on this
    /// platform (or not implemented), integrating will panic.
    Always,
}

/// A builder for [`Integrator`].
#[derive(Clone, Copy, Debug)]
pub struct IntegratorBuilder {
    /// Number of worker threads to spawn for each integration.
    pub num_threads: ThreadCount,
    /// Policy to pin worker threads to CPUs.
    pub cpu_pinning: CpuPinningPolicy,
    /// Number of splits between two attempts of a worker thread to offload
    /// work to the others. Smaller values balance the load more eagerly, at the
    /// cost of more synchronization.
    pub iteration_span: NonZeroU32,
}

impl Default for IntegratorBuilder {
    fn default() -> Self {
        Self {
            num_threads: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::No,
            iteration_span: DEFAULT_ITERATION_SPAN,
        }
    }
}

impl IntegratorBuilder {
    /// Creates an integrator.
    ///
    /// ```
    /// # use paraquad::{CpuPinningPolicy, IntegratorBuilder, ThreadCount, DEFAULT_ITERATION_SPAN};
    /// let integrator = IntegratorBuilder {
    ///     num_threads: ThreadCount::AvailableParallelism,
    ///     cpu_pinning: CpuPinningPolicy::No,
    ///     iteration_span: DEFAULT_ITERATION_SPAN,
    /// }
    /// .build();
    ///
    /// let area = integrator.integrate(|x| x * x, 0.0, 3.0, 1e-6);
    /// assert!((area - 9.0).abs() < 1e-4);
    /// ```
    pub fn build(&self) -> Integrator {
        let num_threads = match self.num_threads {
            ThreadCount::AvailableParallelism => std::thread::available_parallelism()
                .expect("Getting the available parallelism failed"),
            ThreadCount::Count(count) => count,
        };

        #[cfg(any(
            miri,
            not(any(
                target_os = "android",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "linux"
            ))
        ))]
        match self.cpu_pinning {
            CpuPinningPolicy::No => (),
            CpuPinningPolicy::IfSupported => {
                log_warn!("Pinning threads to CPUs is not implemented on this platform.")
            }
            CpuPinningPolicy::Always => {
                panic!("Pinning threads to CPUs is not implemented on this platform.")
            }
        }

        Integrator {
            num_threads,
            cpu_pinning: self.cpu_pinning,
            iteration_span: self.iteration_span,
        }
    }
}

/// Computes definite integrals with a fixed number of worker threads that
/// share work dynamically.
///
/// Each call to an `integrate*()` method spawns its own worker threads and
/// shared state, so an integrator can be reused, including concurrently from
/// multiple threads.
#[derive(Clone, Debug)]
pub struct Integrator {
    num_threads: NonZeroUsize,
    cpu_pinning: CpuPinningPolicy,
    iteration_span: NonZeroU32,
}

impl Integrator {
    /// Returns the number of worker threads spawned for each integration.
    pub fn num_threads(&self) -> NonZeroUsize {
        self.num_threads
    }

    /// Integrates `f` over `[from, to]` with the relative tolerance `eps`.
    ///
    /// # Panics
    ///
    /// Panics if the bounds aren't finite, if `from >= to`, if `eps <= 0` or if
    /// `f` panicked on any worker thread.
    pub fn integrate<F>(&self, f: F, from: f64, to: f64, eps: f64) -> f64
    where
        F: Fn(f64) -> f64 + Sync,
    {
        self.run(&f, from, to, eps, &NoopObserver).0
    }

    /// Same as [`integrate()`](Self::integrate), also returning statistics
    /// about how the work was distributed.
    pub fn integrate_with_stats<F>(&self, f: F, from: f64, to: f64, eps: f64) -> (f64, RunStats)
    where
        F: Fn(f64) -> f64 + Sync,
    {
        self.run(&f, from, to, eps, &NoopObserver)
    }

    /// Same as [`integrate()`](Self::integrate), reporting events from the
    /// worker threads to the given observer.
    pub fn integrate_observed<F, O>(&self, f: F, from: f64, to: f64, eps: f64, observer: &O) -> f64
    where
        F: Fn(f64) -> f64 + Sync,
        O: IntervalObserver,
    {
        self.run(&f, from, to, eps, observer).0
    }

    fn run<F, O>(&self, f: &F, from: f64, to: f64, eps: f64, observer: &O) -> (f64, RunStats)
    where
        F: Fn(f64) -> f64 + Sync,
        O: IntervalObserver,
    {
        check_domain(from, to, eps);

        let num_threads = self.num_threads.get();
        let bounds = slice_bounds(from, to, num_threads);
        let shared = Arc::new(SharedContext::new(num_threads));
        let iteration_span = self.iteration_span.get();
        let cpu_pinning = self.cpu_pinning;

        std::thread::scope(|scope| {
            let handles = bounds
                .windows(2)
                .enumerate()
                .map(|(id, slice)| {
                    let (from, to) = (slice[0], slice[1]);
                    let context =
                        ThreadContext::new(id, f, eps, iteration_span, shared.clone(), observer);
                    scope.spawn(move || {
                        pin_current_thread(id, cpu_pinning);
                        context.run(from, to)
                    })
                })
                .collect::<Vec<_>>();
            log_debug!("[main thread] Spawned {num_threads} threads");

            let mut num_panicking_threads = 0;
            for (_i, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(()) => log_debug!("[main thread] Thread {_i} joined"),
                    Err(_) => {
                        log_error!("[main thread] Thread {_i} panicked");
                        num_panicking_threads += 1;
                    }
                }
            }
            log_debug!("[main thread] Joined threads.");

            if num_panicking_threads != 0 {
                panic!("{num_panicking_threads} worker thread(s) panicked!");
            }
        });

        shared.coordinator.assert_terminated();
        let (result, stats) = shared.result.get();

        #[cfg(feature = "log_parallelism")]
        {
            log_info!("Work-sharing statistics:");
            log_info!("- steps: {}", stats.steps);
            log_info!("- offloads: {}", stats.offloads);
            log_info!("- claims: {}", stats.claims);
            log_info!("- waits: {}", stats.waits);
        }

        (result, stats)
    }
}

/// Integrates `f` over `[from, to]` with the relative tolerance `eps`, using
/// `num_threads` worker threads with the default settings.
///
/// ```
/// # use paraquad::integrate;
/// # use std::num::NonZeroUsize;
/// let area = integrate(f64::sin, 0.0, std::f64::consts::PI, 1e-6, NonZeroUsize::new(4).unwrap());
/// assert!((area - 2.0).abs() < 1e-4);
/// ```
pub fn integrate<F>(f: F, from: f64, to: f64, eps: f64, num_threads: NonZeroUsize) -> f64
where
    F: Fn(f64) -> f64 + Sync,
{
    IntegratorBuilder {
        num_threads: ThreadCount::Count(num_threads),
        ..IntegratorBuilder::default()
    }
    .build()
    .integrate(f, from, to, eps)
}

/// Splits `[from, to]` into `num_slices` slices of equal width, returning the
/// `num_slices + 1` boundaries. Adjacent slices share the exact same boundary,
/// and the outer boundaries are exactly `from` and `to`.
///
/// Boundaries are interpolated between both ends rather than offset by
/// `to - from`, which overflows when the domain is wider than `f64::MAX`.
fn slice_bounds(from: f64, to: f64, num_slices: usize) -> Vec<f64> {
    let n = num_slices as f64;
    let mut bounds = Vec::with_capacity(num_slices + 1);
    bounds.push(from);
    let mut prev = from;
    for i in 1..num_slices {
        let t = i as f64 / n;
        // Rounding must never reorder the boundaries.
        let bound = (from * (1.0 - t) + to * t).max(prev).min(to);
        bounds.push(bound);
        prev = bound;
    }
    bounds.push(to);
    bounds
}

/// Pins the current thread to a CPU according to the given policy.
#[allow(unused_variables)]
fn pin_current_thread(id: usize, cpu_pinning: CpuPinningPolicy) {
    #[cfg(all(
        not(miri),
        any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        )
    ))]
    {
        let cpu = id % CpuSet::count();
        match cpu_pinning {
            CpuPinningPolicy::No => (),
            CpuPinningPolicy::IfSupported => {
                let mut cpu_set = CpuSet::new();
                if let Err(_e) = cpu_set.set(cpu) {
                    log_warn!("Failed to set CPU affinity for thread #{id}: {_e}");
                } else if let Err(_e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                    log_warn!("Failed to set CPU affinity for thread #{id}: {_e}");
                } else {
                    log_debug!("Pinned thread #{id} to CPU #{cpu}");
                }
            }
            CpuPinningPolicy::Always => {
                let mut cpu_set = CpuSet::new();
                if let Err(e) = cpu_set.set(cpu) {
                    panic!("Failed to set CPU affinity for thread #{id}: {e}");
                } else if let Err(e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                    panic!("Failed to set CPU affinity for thread #{id}: {e}");
                } else {
                    log_debug!("Pinned thread #{id} to CPU #{cpu}");
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_thread_count_try_from_usize() {
        assert!(ThreadCount::try_from(0).is_err());
        assert_eq!(
            ThreadCount::try_from(1),
            Ok(ThreadCount::Count(NonZeroUsize::try_from(1).unwrap()))
        );
    }

    #[test]
    fn test_num_threads() {
        let integrator = IntegratorBuilder::default().build();
        assert_eq!(
            integrator.num_threads(),
            std::thread::available_parallelism().unwrap()
        );

        let integrator = IntegratorBuilder {
            num_threads: ThreadCount::try_from(4).unwrap(),
            ..IntegratorBuilder::default()
        }
        .build();
        assert_eq!(integrator.num_threads(), NonZeroUsize::try_from(4).unwrap());
    }

    #[test]
    fn test_slice_bounds() {
        assert_eq!(slice_bounds(0.0, 1.0, 1), vec![0.0, 1.0]);
        assert_eq!(slice_bounds(0.0, 2.0, 4), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(slice_bounds(-1.0, 1.0, 2), vec![-1.0, 0.0, 1.0]);

        let bounds = slice_bounds(0.1, 0.7, 3);
        assert_eq!(bounds.len(), 4);
        assert_eq!(bounds[0], 0.1);
        assert_eq!(bounds[3], 0.7);
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_slice_bounds_wider_than_f64_max() {
        let bounds = slice_bounds(-1e308, 1e308, 4);
        assert_eq!(bounds.len(), 5);
        assert_eq!(bounds[0], -1e308);
        assert_eq!(bounds[2], 0.0);
        assert_eq!(bounds[4], 1e308);
        assert!(bounds.iter().all(|x| x.is_finite()));
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));

        let bounds = slice_bounds(f64::MIN, f64::MAX, 7);
        assert_eq!(bounds[0], f64::MIN);
        assert_eq!(bounds[7], f64::MAX);
        assert!(bounds.iter().all(|x| x.is_finite()));
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_slice_bounds_are_ordered_on_tiny_domains() {
        let from = 1.0;
        let to = 1.0 + 2.0 * f64::EPSILON;
        let bounds = slice_bounds(from, to, 8);
        assert_eq!(bounds[0], from);
        assert_eq!(bounds[8], to);
        assert!(bounds.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_build_cpu_pinning_if_supported() {
        let integrator = IntegratorBuilder {
            num_threads: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::IfSupported,
            iteration_span: DEFAULT_ITERATION_SPAN,
        }
        .build();
        let area = integrator.integrate(|x| x, 0.0, 1.0, 1e-6);
        assert!((area - 0.5).abs() < 1e-6);
    }

    #[cfg(any(
        miri,
        not(any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        ))
    ))]
    #[test]
    #[should_panic = "Pinning threads to CPUs is not implemented on this platform."]
    fn test_build_cpu_pinning_always_not_supported() {
        IntegratorBuilder {
            num_threads: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::Always,
            iteration_span: DEFAULT_ITERATION_SPAN,
        }
        .build();
    }

    #[test]
    fn test_stats_are_collected() {
        let integrator = IntegratorBuilder {
            num_threads: ThreadCount::try_from(2).unwrap(),
            ..IntegratorBuilder::default()
        }
        .build();
        let (area, stats) = integrator.integrate_with_stats(|x| x * x, 0.0, 3.0, 1e-6);
        assert!((area - 9.0).abs() < 1e-4);
        assert!(stats.steps > 0);
        // Every offloaded interval is eventually claimed.
        assert_eq!(stats.claims, stats.offloads);
    }
}
