//! Routing identity layer.
//!
//! Owns the value types that make queue ownership and routing-key derivation
//! deterministic: `ClientIdentity` keys a durable mailbox and `RoutingKey`
//! is a pure function of a namespace path.
//!
//! ```
//! use smart_router::{ClientIdentity, NamespacePath, RoutingKey};
//!
//! let namespace = NamespacePath::new("agent", "456");
//! assert_eq!(RoutingKey::for_namespace(&namespace).as_str(), "agent456");
//! assert_eq!(ClientIdentity::new("agent456").as_str(), "agent456");
//! ```

pub(crate) mod client_identity;
pub(crate) mod routing_key;
