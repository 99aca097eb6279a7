//! Control-plane layer.
//!
//! Owns startup validation, namespace planning, the static dispatch table and
//! the gateway state machine. Everything here is decided before the gateway
//! enters Running and stays immutable afterwards.

pub(crate) mod configuration;
pub(crate) mod dispatch_table;
pub(crate) mod endpoint_registrar;
pub(crate) mod lifecycle;
