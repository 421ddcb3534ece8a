//! Diagnostics emitted by the library.
//!
//! With the `tracing` feature the macros below produce `tracing` events. Otherwise, with the
//! `logging` feature, they produce `log` records. With neither, the arguments are still
//! type-checked and nothing is emitted.

macro_rules! emit {
    ($level:ident, $($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        { tracing::$level!($($arg)*); }

        #[cfg(all(not(feature = "tracing"), feature = "logging"))]
        { log::$level!($($arg)*); }

        #[cfg(not(any(feature = "tracing", feature = "logging")))]
        { let _ = format_args!($($arg)*); }
    }};
}

macro_rules! emit_debug {
    ($($arg:tt)*) => { $crate::observability::emit!(debug, $($arg)*) };
}

macro_rules! emit_info {
    ($($arg:tt)*) => { $crate::observability::emit!(info, $($arg)*) };
}

macro_rules! emit_warn {
    ($($arg:tt)*) => { $crate::observability::emit!(warn, $($arg)*) };
}

pub(crate) use emit;
pub(crate) use emit_debug;
pub(crate) use emit_info;
pub(crate) use emit_warn;
