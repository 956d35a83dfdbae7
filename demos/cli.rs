// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI tool to integrate a built-in function over an interval.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use paraquad::{
    integrate_iterative, integrate_recursive, CpuPinningPolicy, IntegratorBuilder, ThreadCount,
    DEFAULT_ITERATION_SPAN,
};
use std::num::NonZeroUsize;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = cli.validate() {
        e.exit();
    }

    let f = cli.function.integrand();
    let result = if cli.linear_recursive {
        integrate_recursive(f, cli.from, cli.to, cli.eps)
    } else if cli.linear_nonrecursive {
        integrate_iterative(f, cli.from, cli.to, cli.eps)
    } else {
        IntegratorBuilder {
            num_threads: ThreadCount::Count(cli.parallel),
            cpu_pinning: CpuPinningPolicy::IfSupported,
            iteration_span: DEFAULT_ITERATION_SPAN,
        }
        .build()
        .integrate(f, cli.from, cli.to, cli.eps)
    };
    println!("{result:.20}");
}

/// CLI tool to integrate a built-in function over an interval.
///
/// Examples:
///   cli --function x2 --from 0 --to 3
///   cli --function sin --from 0 --to 1 --eps 0.001 --parallel 8
#[derive(Parser, Debug, PartialEq)]
#[command(version, verbatim_doc_comment)]
struct Cli {
    /// Left integration boundary.
    #[arg(short, long, allow_negative_numbers = true)]
    from: f64,

    /// Right integration boundary.
    #[arg(short, long, allow_negative_numbers = true)]
    to: f64,

    /// Function to integrate.
    #[arg(short = 'e', long, value_enum)]
    function: Function,

    /// Computation precision, relative to the value of the integral.
    #[arg(long, default_value_t = 1e-6)]
    eps: f64,

    /// Number of threads for the parallel algorithm.
    #[arg(long, default_value_t = NonZeroUsize::new(4).unwrap())]
    parallel: NonZeroUsize,

    /// Run the linear recursive algorithm instead of the parallel one.
    #[arg(long, conflicts_with = "linear_nonrecursive")]
    linear_recursive: bool,

    /// Run the linear non-recursive algorithm instead of the parallel one.
    #[arg(long)]
    linear_nonrecursive: bool,
}

impl Cli {
    /// Checks the constraints between values that clap can't express.
    fn validate(&self) -> Result<(), clap::Error> {
        let error = |message: &str| -> Result<(), clap::Error> {
            Err(Cli::command().error(ErrorKind::ValueValidation, message))
        };
        if !(self.from.is_finite() && self.to.is_finite()) {
            return error("'from' and 'to' values must be finite");
        }
        if !(self.from < self.to) {
            return error("'from' value must be less than 'to'");
        }
        if !(self.eps > 0.0) {
            return error("'eps' value must be positive");
        }
        Ok(())
    }
}

/// Built-in functions.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Function {
    /// x
    X,
    /// x^2
    X2,
    /// sin(x)
    Sin,
    /// exp(x)
    Exp,
    /// 1 / sqrt(1 + x)
    InvSqrtShifted,
    /// sin(1 / x), whose domain must exclude 0
    SinInv,
}

impl Function {
    fn integrand(self) -> fn(f64) -> f64 {
        match self {
            Function::X => |x| x,
            Function::X2 => |x| x * x,
            Function::Sin => f64::sin,
            Function::Exp => f64::exp,
            Function::InvSqrtShifted => |x| (1.0 + x).sqrt().recip(),
            Function::SinInv => |x| x.recip().sin(),
        }
    }
}
