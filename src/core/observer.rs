// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Hooks to inspect how the work flows between the worker threads.

use crate::kernel::Interval;
use std::ops::AddAssign;

/// Receives events from the worker threads of an
/// [`Integrator`](crate::Integrator).
///
/// All methods are called concurrently from the worker threads, identified by
/// their index in `0..num_threads`, and default to doing nothing.
pub trait IntervalObserver: Sync {
    /// The given interval converged on this thread, contributing `value` to
    /// the result.
    fn converged(&self, _thread_id: usize, _interval: &Interval, _value: f64) {}

    /// This thread published the given interval to the shared stack.
    fn offloaded(&self, _thread_id: usize, _interval: &Interval) {}

    /// This thread claimed the given interval from the shared stack.
    fn claimed(&self, _thread_id: usize, _interval: &Interval) {}
}

/// An observer that ignores all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl IntervalObserver for NoopObserver {}

/// Counters collected over one integration run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Number of refinement steps, i.e. evaluations of the kernel.
    pub steps: u64,
    /// Number of intervals published to the shared stack.
    pub offloads: u64,
    /// Number of intervals claimed from the shared stack.
    pub claims: u64,
    /// Number of times a thread blocked waiting for work.
    pub waits: u64,
}

impl AddAssign<&RunStats> for RunStats {
    fn add_assign(&mut self, other: &RunStats) {
        self.steps += other.steps;
        self.offloads += other.offloads;
        self.claims += other.claims;
        self.waits += other.waits;
    }
}
