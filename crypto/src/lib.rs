//! Hashing primitives for quorum governance.
//!
//! - **Blake2b-256** for hashing
//! - Deterministic derivation of object ids for voter sets and proposals

pub mod hash;

pub use hash::{blake2b_256, blake2b_256_multi, derive_object_id};
