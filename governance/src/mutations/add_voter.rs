//! Add a voter, optionally moving the threshold in the same step.

use super::execute_with;
use crate::context::TxContext;
use crate::error::GovernanceError;
use crate::proposal::{Proposal, Rejected};
use crate::voter_set::VoterSet;
use quorum_types::Address;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddVoter {
    voter: Address,
    new_required_votes: Option<u64>,
}

impl AddVoter {
    /// Fails with `VoterAlreadyExists` if `voter` is a member, and with
    /// `RequiredVotesZero` / `InvalidRequiredVotes` unless an override
    /// satisfies `0 < t <= voters + 1`.
    pub fn new<C>(
        voter_set: &VoterSet<C>,
        voter: Address,
        new_required_votes: Option<u64>,
    ) -> Result<Self, GovernanceError> {
        voter_set.check_add_voter(&voter, new_required_votes)?;
        Ok(Self {
            voter,
            new_required_votes,
        })
    }

    pub fn voter(&self) -> &Address {
        &self.voter
    }

    pub fn new_required_votes(&self) -> Option<u64> {
        self.new_required_votes
    }

    pub fn execute<C>(
        proposal: Proposal<Self>,
        voter_set: &mut VoterSet<C>,
        ctx: &mut TxContext,
    ) -> Result<(), Rejected<Proposal<Self>>> {
        execute_with(proposal, voter_set, ctx, |payload, set, ctx| {
            set.add_voter(payload.voter, payload.new_required_votes, ctx)
        })
    }
}
