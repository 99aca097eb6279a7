//! Runtime integration layer.
//!
//! Isolates retry timing and task shutdown helpers so async behavior remains
//! localized and predictable for the rest of the crate.

pub(crate) mod retry;
pub(crate) mod shutdown;
