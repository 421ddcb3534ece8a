// `debug!`, `info!` and `warn!` for library code; see `observability` for the backends.

pub(crate) use crate::observability::{emit_debug as debug, emit_info as info, emit_warn as warn};
