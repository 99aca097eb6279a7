//! Data-plane layer.
//!
//! Owns everything that runs per connection: the acceptor task of each
//! namespace, the connection session, queue binding against the broker,
//! forwarding of broker deliveries through a bounded outbound buffer, and the
//! dispatch of client-emitted messages to route handlers.

pub(crate) mod connection_binder;
pub(crate) mod forwarding_listener;
pub(crate) mod namespace_acceptor;
pub(crate) mod outbound_worker;
pub(crate) mod route_dispatcher;
pub(crate) mod session;
