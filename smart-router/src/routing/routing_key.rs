//! Broker routing-key derivation for namespaces.

use crate::endpoint::NamespacePath;
use std::fmt::{Display, Formatter};

/// Broker-side address used to bind client queues and publish messages.
///
/// For a namespace the key is the plain concatenation of endpoint name and
/// instance id (`agent` + `456` = `agent456`); the id may be empty.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn for_endpoint(endpoint: &str, id: &str) -> Self {
        Self(format!("{endpoint}{id}"))
    }

    pub fn for_namespace(namespace: &NamespacePath) -> Self {
        Self::for_endpoint(namespace.endpoint(), namespace.id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoutingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
