//! Authorize one privileged action on the wrapped capability.

use super::execute_with;
use crate::capability::AuthorizationCapability;
use crate::context::TxContext;
use crate::error::GovernanceError;
use crate::proposal::{Proposal, Rejected};
use crate::voter_set::VoterSet;
use quorum_types::Digest;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizeAction {
    digest: Digest,
}

impl AuthorizeAction {
    /// Fails with `EmptyDigest` for an empty digest. The digest is otherwise
    /// opaque.
    pub fn new<C>(_voter_set: &VoterSet<C>, digest: Digest) -> Result<Self, GovernanceError> {
        if digest.is_empty() {
            return Err(GovernanceError::EmptyDigest);
        }
        Ok(Self { digest })
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Forward the digest to the capability and return its ticket.
    ///
    /// The ticket must be redeemed and its receipt passed to
    /// [`VoterSet::commit`] before another action can be authorized.
    pub fn execute<C: AuthorizationCapability>(
        proposal: Proposal<Self>,
        voter_set: &mut VoterSet<C>,
        ctx: &mut TxContext,
    ) -> Result<C::Ticket, Rejected<Proposal<Self>>> {
        execute_with(proposal, voter_set, ctx, |payload, set, ctx| {
            set.authorize(&payload.digest, ctx)
        })
    }
}
