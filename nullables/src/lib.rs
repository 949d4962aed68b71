//! Nullable infrastructure for deterministic governance tests.
//!
//! Production code talks to the outside world through two seams: the
//! [`AuthorizationCapability`](quorum_governance::AuthorizationCapability)
//! wrapped by a voter set, and the wall clock read when a transaction
//! context is built. This crate provides controllable stand-ins for both:
//! - they return deterministic values
//! - they record what they were asked to do
//! - they can be told to fail
//!
//! Usage: swap real implementations for nullables in tests.

pub mod capability;
pub mod clock;

pub use capability::{NullCapability, NullCapabilityError, NullReceipt, NullTicket};
pub use clock::NullClock;
