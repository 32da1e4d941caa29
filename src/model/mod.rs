//! Core data structures.
//!
//! - [`raw`]: transcript records exactly as the editor persists them
//!   (`RawSession`, `RawRequest`), deserialized leniently.
//! - [`event`]: the canonical [`NormalizedEvent`] stream and per-session
//!   [`SessionMetadata`] derived from it.

pub mod event;
pub mod raw;

pub use event::*;
pub use raw::*;
