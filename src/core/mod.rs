// Copyright 2024-2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Core engine: worker threads, work sharing and termination detection.

mod integrator;
mod observer;
mod sync;
mod util;
mod worker;

pub use integrator::{
    integrate, CpuPinningPolicy, Integrator, IntegratorBuilder, ThreadCount,
    DEFAULT_ITERATION_SPAN,
};
pub use observer::{IntervalObserver, NoopObserver, RunStats};
