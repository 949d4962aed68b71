//! Change the number of votes required for quorum.

use super::execute_with;
use crate::context::TxContext;
use crate::error::GovernanceError;
use crate::proposal::{Proposal, Rejected};
use crate::voter_set::VoterSet;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateThreshold {
    new_required_votes: u64,
}

impl UpdateThreshold {
    /// Fails with `InvalidThreshold` unless `0 < t <= voters`.
    pub fn new<C>(voter_set: &VoterSet<C>, new_required_votes: u64) -> Result<Self, GovernanceError> {
        voter_set.check_update_threshold(new_required_votes)?;
        Ok(Self { new_required_votes })
    }

    pub fn new_required_votes(&self) -> u64 {
        self.new_required_votes
    }

    pub fn execute<C>(
        proposal: Proposal<Self>,
        voter_set: &mut VoterSet<C>,
        ctx: &mut TxContext,
    ) -> Result<(), Rejected<Proposal<Self>>> {
        execute_with(proposal, voter_set, ctx, |payload, set, ctx| {
            set.update_threshold(payload.new_required_votes, ctx)
        })
    }
}
