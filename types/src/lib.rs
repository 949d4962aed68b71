//! Fundamental types for the quorum governance workspace.
//!
//! This crate defines the value types shared across every other crate:
//! addresses, object identities, action digests and timestamps.

pub mod address;
pub mod digest;
pub mod error;
pub mod object;
pub mod time;

pub use address::Address;
pub use digest::Digest;
pub use error::TypesError;
pub use object::ObjectId;
pub use time::Timestamp;
