// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Internal logging macros, compiled out unless the `log` feature is enabled.
//!
//! The `log_info!` and `log_trace!` macros are reserved for the hot path of
//! the workers (offloads, claims and statistics), and additionally require the
//! `log_parallelism` feature.

macro_rules! log_debug {
    ( $($args:tt)* ) => {{
        #[cfg(feature = "log")]
        log::debug!( $($args)* );
    }};
}

macro_rules! log_error {
    ( $($args:tt)* ) => {{
        #[cfg(feature = "log")]
        log::error!( $($args)* );
    }};
}

macro_rules! log_warn {
    ( $($args:tt)* ) => {{
        #[cfg(feature = "log")]
        log::warn!( $($args)* );
    }};
}

#[cfg(feature = "log_parallelism")]
macro_rules! log_info {
    ( $($args:tt)* ) => {
        log::info!( $($args)* )
    };
}

#[cfg(feature = "log_parallelism")]
macro_rules! log_trace {
    ( $($args:tt)* ) => {
        log::trace!( $($args)* )
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
#[cfg(feature = "log_parallelism")]
pub(crate) use log_info;
#[cfg(feature = "log_parallelism")]
pub(crate) use log_trace;
pub(crate) use log_warn;
