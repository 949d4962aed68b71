//! The seam between the governance core and the external resource it guards.
//!
//! The core never looks inside a capability. It forwards a digest to
//! [`AuthorizationCapability::authorize`] when an `AuthorizeAction` proposal
//! executes, and later hands the resulting receipt to
//! [`AuthorizationCapability::commit`].

use quorum_types::{Address, Digest};

/// An opaque privileged resource exclusively owned by a `VoterSet`.
pub trait AuthorizationCapability {
    /// Permission to perform one action. Produced once per authorization.
    type Ticket;
    /// Proof that the authorized action completed.
    type Receipt;
    type Error: std::fmt::Display;

    /// Authorize the action identified by `digest`.
    ///
    /// May fail if the capability's own policy rejects the digest.
    fn authorize(&mut self, digest: &Digest) -> Result<Self::Ticket, Self::Error>;

    /// Record completion of a previously authorized action.
    fn commit(&mut self, receipt: Self::Receipt) -> Result<(), Self::Error>;
}

/// A capability released from governance, now owned directly by `owner`.
#[derive(Debug)]
pub struct OwnedCapability<C> {
    pub owner: Address,
    pub capability: C,
}

impl<C> OwnedCapability<C> {
    pub fn into_inner(self) -> C {
        self.capability
    }
}
