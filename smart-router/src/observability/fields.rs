//! Canonical structured field values and value-format helpers.

use crate::endpoint::NamespacePath;

pub const REASON_CONNECTION_CLOSED: &str = "connection_closed";
pub const REASON_GATEWAY_SHUTDOWN: &str = "gateway_shutdown";
pub const REASON_TRANSPORT_CLOSED: &str = "transport_closed";

/// Formats a namespace for log fields; the endpoint-only form stays readable.
pub fn format_namespace(namespace: &NamespacePath) -> String {
    namespace.to_string()
}
