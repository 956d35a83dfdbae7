// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Single-threaded reference integrators.

use crate::kernel::{check_domain, refine, Interval, Step};

/// Integrates `f` over `[from, to]` by recursing on the call stack until every
/// branch converges.
///
/// ```
/// # use paraquad::integrate_recursive;
/// let area = integrate_recursive(|x| x, 0.0, 1.0, 1e-6);
/// assert!((area - 0.5).abs() < 1e-6);
/// ```
pub fn integrate_recursive(f: impl Fn(f64) -> f64, from: f64, to: f64, eps: f64) -> f64 {
    check_domain(from, to, eps);
    recurse(&f, &Interval::new(&f, from, to), eps)
}

fn recurse(f: &impl Fn(f64) -> f64, interval: &Interval, eps: f64) -> f64 {
    match refine(f, interval, eps) {
        Step::Converged(value) => value,
        Step::Split(left, right) => recurse(f, &left, eps) + recurse(f, &right, eps),
    }
}

/// Integrates `f` over `[from, to]` with an explicit stack of pending
/// intervals instead of the call stack.
///
/// On each split, the left half is pushed and the right half is processed
/// next. This visits the intervals in a different order than
/// [`integrate_recursive()`], so results only agree up to rounding.
///
/// ```
/// # use paraquad::integrate_iterative;
/// let area = integrate_iterative(|x| x * x, 0.0, 3.0, 1e-6);
/// assert!((area - 9.0).abs() < 1e-4);
/// ```
pub fn integrate_iterative(f: impl Fn(f64) -> f64, from: f64, to: f64, eps: f64) -> f64 {
    check_domain(from, to, eps);
    let mut pending = Vec::new();
    let mut current = Interval::new(&f, from, to);
    let mut total = 0.0;
    loop {
        match refine(&f, &current, eps) {
            Step::Converged(value) => {
                total += value;
                match pending.pop() {
                    Some(next) => current = next,
                    None => return total,
                }
            }
            Step::Split(left, right) => {
                pending.push(left);
                current = right;
            }
        }
    }
}
