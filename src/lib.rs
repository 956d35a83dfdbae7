// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs, unsafe_code)]

mod core;
mod kernel;
mod macros;
mod sequential;

pub use crate::core::{
    integrate, CpuPinningPolicy, Integrator, IntegratorBuilder, IntervalObserver, NoopObserver,
    RunStats, ThreadCount, DEFAULT_ITERATION_SPAN,
};
pub use kernel::{refine, Interval, Step};
pub use sequential::{integrate_iterative, integrate_recursive};
