//! Canonical structured event names used across `smart-router`.

// Gateway lifecycle events.
pub const GATEWAY_START: &str = "gateway_start";
pub const GATEWAY_STARTED: &str = "gateway_started";
pub const GATEWAY_START_FAILED: &str = "gateway_start_failed";
pub const GATEWAY_STOP: &str = "gateway_stop";
pub const GATEWAY_STOPPED: &str = "gateway_stopped";
pub const GATEWAY_SHUTDOWN_GRACE_EXPIRED: &str = "gateway_shutdown_grace_expired";

// Endpoint registration events.
pub const NAMESPACE_OPEN_OK: &str = "namespace_open_ok";
pub const NAMESPACE_OPEN_FAILED: &str = "namespace_open_failed";
pub const NAMESPACE_ACCEPTOR_CLOSED: &str = "namespace_acceptor_closed";
pub const ROUTE_UNKNOWN_ENDPOINT: &str = "route_unknown_endpoint";

// Connection session events.
pub const CONNECTION_ACCEPTED: &str = "connection_accepted";
pub const CONNECTION_CLOSED: &str = "connection_closed";
pub const CONNECTION_ACK_FAILED: &str = "connection_ack_failed";

// Connection binder events.
pub const BINDER_BIND_OK: &str = "binder_bind_ok";
pub const BINDER_BIND_RETRY: &str = "binder_bind_retry";
pub const BINDER_BIND_ABANDONED: &str = "binder_bind_abandoned";
pub const BINDER_RELEASE_OK: &str = "binder_release_ok";
pub const BINDER_RELEASE_FAILED: &str = "binder_release_failed";

// Forwarding (broker -> connection) events.
pub const FORWARD_DELIVERY: &str = "forward_delivery";
pub const FORWARD_REQUEUE_BUFFER_FULL: &str = "forward_requeue_buffer_full";
pub const FORWARD_REQUEUE_CONNECTION_CLOSED: &str = "forward_requeue_connection_closed";
pub const FORWARD_DROP_UNDECODABLE: &str = "forward_drop_undecodable";
pub const OUTBOUND_SEND_FAILED: &str = "outbound_send_failed";
pub const OUTBOUND_CLOSED: &str = "outbound_closed";

// Route dispatch events.
pub const DISPATCH_UNROUTED: &str = "dispatch_unrouted";
pub const DISPATCH_HANDLER_OK: &str = "dispatch_handler_ok";
pub const DISPATCH_HANDLER_FAILED: &str = "dispatch_handler_failed";
pub const DISPATCH_HANDLER_PANICKED: &str = "dispatch_handler_panicked";

// Broker bridge events.
pub const BROKER_CONNECT_OK: &str = "broker_connect_ok";
pub const BROKER_CONNECT_FAILED: &str = "broker_connect_failed";
pub const BROKER_STATUS_CHANGED: &str = "broker_status_changed";
pub const BROKER_PUBLISH_RETRY: &str = "broker_publish_retry";
pub const BROKER_PUBLISH_FAILED: &str = "broker_publish_failed";
