//! Diagnostic logging.
//!
//! Records go through the [`log`](https://docs.rs/log) facade when the `log`
//! feature is enabled. Without it, the macros only type-check their arguments.
//!
//! A logger that allocates must not be installed while this heap serves as
//! the global allocator, as the log call would re-enter the heap.

use core::fmt;

#[cfg(feature = "log")]
macro_rules! log {
    ($level:ident, $($arg:tt)*) => {
        ::log::$level!(target: "heap", $($arg)*)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log {
    ($level:ident, $($arg:tt)*) => {
        $crate::log::discard(format_args!($($arg)*))
    };
}

macro_rules! trace {
    ($($arg:tt)*) => {
        log!(trace, $($arg)*)
    };
}

macro_rules! debug {
    ($($arg:tt)*) => {
        log!(debug, $($arg)*)
    };
}

macro_rules! warn {
    ($($arg:tt)*) => {
        log!(warn, $($arg)*)
    };
}

#[cfg_attr(feature = "log", expect(dead_code))]
#[inline]
pub(crate) fn discard(_message: fmt::Arguments<'_>) {}
