// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Convergence kernel shared by all the integrators.

/// A slice `[a, b]` of the integration domain, together with the cached values
/// of the integrand at both endpoints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    /// Left bound.
    pub a: f64,
    /// Right bound, strictly greater than `a`.
    pub b: f64,
    /// Value of the integrand at `a`.
    pub fa: f64,
    /// Value of the integrand at `b`.
    pub fb: f64,
}

impl Interval {
    /// Creates the interval `[a, b]`, evaluating the integrand at both ends.
    pub fn new(f: &impl Fn(f64) -> f64, a: f64, b: f64) -> Self {
        Self {
            a,
            b,
            fa: f(a),
            fb: f(b),
        }
    }

    /// Width `b - a` of this interval.
    pub fn width(&self) -> f64 {
        self.b - self.a
    }
}

/// Outcome of one refinement step on an [`Interval`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// The interval converged and contributes the given value.
    Converged(f64),
    /// The interval must be refined further: the caller is responsible for
    /// summing the contributions of both halves.
    Split(Interval, Interval),
}

/// Runs one refinement step on `interval`.
///
/// The trapezoid estimate over the whole interval is compared with the sum of
/// the trapezoid estimates over both halves. The interval converges when their
/// difference is within `eps` relative to the refined estimate.
///
/// The interval must satisfy `a < b`; this is not checked.
#[inline]
pub fn refine(f: &impl Fn(f64) -> f64, interval: &Interval, eps: f64) -> Step {
    let Interval { a, b, fa, fb } = *interval;
    // Halving first keeps the midpoint finite near `f64::MAX`.
    let c = a / 2.0 + b / 2.0;
    let fc = f(c);

    let whole = (fa + fb) * (b - a) / 2.0;
    let split = (fa + fc) * (c - a) / 2.0 + (fc + fb) * (b - c) / 2.0;

    if (split - whole).abs() <= split.abs() * eps {
        Step::Converged(split)
    } else {
        Step::Split(
            Interval { a, b: c, fa, fb: fc },
            Interval { a: c, b, fa: fc, fb },
        )
    }
}

/// Panics unless the arguments describe a valid integration problem.
pub(crate) fn check_domain(from: f64, to: f64, eps: f64) {
    assert!(
        from.is_finite() && to.is_finite(),
        "integration bounds must be finite, got [{from}, {to}]"
    );
    assert!(
        from < to,
        "the lower bound must be less than the upper bound, got [{from}, {to}]"
    );
    assert!(eps > 0.0, "the tolerance must be positive, got {eps}");
}
