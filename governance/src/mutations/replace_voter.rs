//! Swap one voter for another, keeping the threshold.

use super::execute_with;
use crate::context::TxContext;
use crate::error::GovernanceError;
use crate::proposal::{Proposal, Rejected};
use crate::voter_set::VoterSet;
use quorum_types::Address;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceVoter {
    old_voter: Address,
    new_voter: Address,
}

impl ReplaceVoter {
    pub fn new<C>(
        voter_set: &VoterSet<C>,
        old_voter: Address,
        new_voter: Address,
    ) -> Result<Self, GovernanceError> {
        voter_set.check_replace_voter(&old_voter, &new_voter)?;
        Ok(Self {
            old_voter,
            new_voter,
        })
    }

    pub fn old_voter(&self) -> &Address {
        &self.old_voter
    }

    pub fn new_voter(&self) -> &Address {
        &self.new_voter
    }

    pub fn execute<C>(
        proposal: Proposal<Self>,
        voter_set: &mut VoterSet<C>,
        ctx: &mut TxContext,
    ) -> Result<(), Rejected<Proposal<Self>>> {
        execute_with(proposal, voter_set, ctx, |payload, set, ctx| {
            set.replace_voter(&payload.old_voter, payload.new_voter, ctx)
        })
    }
}
