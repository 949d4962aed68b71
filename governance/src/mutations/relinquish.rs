//! Dissolve the governance instance and hand its capability to a new owner.
//!
//! This is terminal: [`RelinquishControl::execute`] takes the voter set by
//! value and nothing of it survives except the released capability.

use crate::capability::OwnedCapability;
use crate::context::TxContext;
use crate::error::GovernanceError;
use crate::proposal::{Proposal, Rejected};
use crate::voter_set::VoterSet;
use quorum_types::Address;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelinquishControl {
    new_owner: Address,
}

impl RelinquishControl {
    /// Any address may be the new owner; quorum is what gates execution.
    pub fn new<C>(_voter_set: &VoterSet<C>, new_owner: Address) -> Result<Self, GovernanceError> {
        Ok(Self { new_owner })
    }

    pub fn new_owner(&self) -> &Address {
        &self.new_owner
    }

    /// On failure both the proposal and the voter set are handed back.
    pub fn execute<C>(
        proposal: Proposal<Self>,
        voter_set: VoterSet<C>,
        ctx: &mut TxContext,
    ) -> Result<OwnedCapability<C>, Rejected<(Proposal<Self>, VoterSet<C>)>> {
        match proposal.execute(&voter_set, ctx) {
            Ok(payload) => Ok(voter_set.relinquish(payload.new_owner, ctx)),
            Err(rejected) => Err(rejected.map_inner(|proposal| (proposal, voter_set))),
        }
    }
}
