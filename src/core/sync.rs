// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Synchronization between the worker threads: shared task stack, termination
//! detection and reduction of the partial results.

use super::observer::RunStats;
use super::util::Status;
use crate::kernel::Interval;
use crate::macros::log_debug;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Context shared between all the worker threads of one integration run.
pub struct SharedContext {
    /// Task stack and thread counters.
    pub coordinator: Coordinator,
    /// Partial results folded by each thread on exit.
    pub result: Reduction,
}

impl SharedContext {
    /// Creates a fresh context for a run on `num_threads` threads, all of
    /// which start in the active state.
    pub fn new(num_threads: usize) -> Self {
        Self {
            coordinator: Coordinator::new(num_threads),
            result: Reduction::default(),
        }
    }
}

/// A counting latch that all the threads pass once global completion has been
/// detected.
///
/// The thread that detects completion opens the latch, and every other thread
/// arrives at it exactly once before exiting.
#[derive(Debug)]
struct Latch {
    /// Number of threads that observed completion so far.
    arrived: usize,
    /// Number of threads that must arrive.
    expected: usize,
}

impl Latch {
    fn new(expected: usize) -> Self {
        Self {
            arrived: 0,
            expected,
        }
    }

    fn is_open(&self) -> bool {
        self.arrived != 0
    }

    fn open(&mut self) {
        assert_eq!(self.arrived, 0, "termination was detected twice");
        self.arrived = 1;
    }

    fn arrive(&mut self) {
        assert!(self.is_open(), "arrived at a closed termination latch");
        assert!(
            self.arrived < self.expected,
            "more than {} threads arrived at the termination latch",
            self.expected
        );
        self.arrived += 1;
    }

    fn is_complete(&self) -> bool {
        self.arrived == self.expected
    }
}

/// State protected by the coordination lock.
#[derive(Debug)]
struct CoordinationState {
    /// Intervals offloaded by busy threads, waiting to be claimed.
    stack: Vec<Interval>,
    /// Number of threads currently computing.
    num_active_threads: usize,
    /// Termination barrier.
    latch: Latch,
    /// Whether a worker thread panicked, in which case all the others must
    /// exit as soon as they run out of local work.
    aborted: bool,
}

/// Coordinates the distribution of work and the termination of the worker
/// threads.
///
/// Pushes to the stack and the termination check happen under the same lock,
/// so a thread can never declare completion while an interval is being
/// offloaded.
pub struct Coordinator {
    state: Status<CoordinationState>,
    /// Mirror of the stack length, updated under the lock, which busy threads
    /// can read without locking to skip offloading while work is pending.
    pending: CachePadded<AtomicUsize>,
}

impl Coordinator {
    fn new(num_threads: usize) -> Self {
        Self {
            state: Status::new(CoordinationState {
                stack: Vec::new(),
                num_active_threads: num_threads,
                latch: Latch::new(num_threads),
                aborted: false,
            }),
            pending: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Attempts to publish the given interval on the shared stack.
    ///
    /// This never blocks: the interval isn't published if the stack already
    /// contains pending work or if the lock is contended. Returns whether the
    /// interval was published, in which case the caller doesn't own it
    /// anymore.
    pub fn try_offload(&self, interval: Interval) -> bool {
        if self.pending.load(Ordering::Relaxed) != 0 {
            return false;
        }
        let Some(mut state) = self.state.try_lock() else {
            return false;
        };
        if !state.stack.is_empty() {
            return false;
        }
        state.stack.push(interval);
        self.pending.store(state.stack.len(), Ordering::Relaxed);
        drop(state);

        self.state.notify_one();
        true
    }

    /// Called by a thread that ran out of local work. Blocks until either an
    /// interval is available on the shared stack, or all the threads are out
    /// of work.
    ///
    /// Returns the claimed interval, or [`None`] if the thread must exit.
    pub fn wait_for_work(&self, _id: usize, stats: &mut RunStats) -> Option<Interval> {
        let mut state = self.state.lock();
        if state.aborted {
            return None;
        }

        assert!(
            state.num_active_threads > 0,
            "the number of active threads underflowed"
        );
        state.num_active_threads -= 1;

        if state.num_active_threads == 0 && state.stack.is_empty() {
            log_debug!("[thread {_id}] Computation completion detected");
            state.latch.open();
            drop(state);
            self.state.notify_all();
            return None;
        }

        if state.stack.is_empty() && !state.latch.is_open() {
            stats.waits += 1;
            state = self.state.wait_while(state, |state| {
                state.stack.is_empty() && !state.latch.is_open() && !state.aborted
            });
        }

        if state.aborted {
            return None;
        }
        if state.latch.is_open() {
            log_debug!("[thread {_id}] Computation completion signal received");
            state.latch.arrive();
            return None;
        }

        let interval = state
            .stack
            .pop()
            .expect("claimed an interval from an empty stack");
        self.pending.store(state.stack.len(), Ordering::Relaxed);
        state.num_active_threads += 1;
        stats.claims += 1;
        Some(interval)
    }

    /// Releases all the waiting threads after a worker thread panicked.
    pub fn abort(&self) {
        let mut state = self.state.lock_ignore_poison();
        state.aborted = true;
        drop(state);
        self.state.notify_all();
    }

    /// Checks that the run terminated cleanly: every thread passed the
    /// termination latch and no work was left behind.
    pub fn assert_terminated(&self) {
        let state = self.state.lock();
        assert!(
            state.latch.is_complete(),
            "only {} out of {} threads observed completion",
            state.latch.arrived,
            state.latch.expected
        );
        assert_eq!(state.num_active_threads, 0);
        assert!(state.stack.is_empty(), "work was left on the stack");
    }
}

/// Accumulates the partial results of all the threads.
#[derive(Default)]
pub struct Reduction {
    inner: CachePadded<Mutex<(f64, RunStats)>>,
}

impl Reduction {
    /// Folds the local sum and statistics of one thread into the result.
    pub fn fold(&self, value: f64, stats: &RunStats) {
        let mut guard = self.inner.lock().unwrap();
        guard.0 += value;
        guard.1 += stats;
    }

    /// Returns the total so far.
    pub fn get(&self) -> (f64, RunStats) {
        *self.inner.lock().unwrap()
    }
}
