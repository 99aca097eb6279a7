//! Structured logging vocabulary.
//!
//! Library code emits `tracing` events tagged with the names in [`events`] and
//! the shared field values in [`fields`]. It never installs a global subscriber; binaries and tests
//! initialize `tracing_subscriber` once at their process boundary.

pub mod events;
pub mod fields;
