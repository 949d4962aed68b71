//! Governance events emitted for observers (dashboards, monitoring).
//!
//! Events are informational. Nothing in the protocol reads them back, so a
//! lost or reordered listener can never affect correctness.

use quorum_types::{Address, Digest, ObjectId};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GovernanceEvent {
    /// A governance instance was published.
    InstanceCreated {
        instance_id: ObjectId,
        voters: u64,
        required_votes: u64,
    },
    /// A proposal was opened; the creator's vote is already counted.
    ProposalOpened {
        proposal_id: ObjectId,
        instance_id: ObjectId,
        creator: Address,
    },
    VoteCast {
        proposal_id: ObjectId,
        total_votes: u64,
    },
    VoteRemoved {
        proposal_id: ObjectId,
        voter: Address,
    },
    /// Recomputed valid votes crossed the threshold during a vote.
    QuorumReached { proposal_id: ObjectId },
    ProposalDeleted { proposal_id: ObjectId },
    ProposalExecuted { proposal_id: ObjectId },
    VoterAdded {
        instance_id: ObjectId,
        voter: Address,
    },
    VoterRemoved {
        instance_id: ObjectId,
        voter: Address,
    },
    VoterReplaced {
        instance_id: ObjectId,
        old_voter: Address,
        new_voter: Address,
    },
    ThresholdUpdated {
        instance_id: ObjectId,
        old_required_votes: u64,
        new_required_votes: u64,
    },
    /// The wrapped capability issued a ticket for `digest`.
    ActionAuthorized {
        instance_id: ObjectId,
        digest: Digest,
    },
    /// The receipt for the in-flight action was accepted.
    ActionCommitted {
        instance_id: ObjectId,
        digest: Digest,
    },
    /// The instance was dissolved and its capability handed to `new_owner`.
    QuorumRelinquished {
        instance_id: ObjectId,
        new_owner: Address,
    },
}

impl GovernanceEvent {
    /// Stable short name, used as a log field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InstanceCreated { .. } => "instance_created",
            Self::ProposalOpened { .. } => "proposal_opened",
            Self::VoteCast { .. } => "vote_cast",
            Self::VoteRemoved { .. } => "vote_removed",
            Self::QuorumReached { .. } => "quorum_reached",
            Self::ProposalDeleted { .. } => "proposal_deleted",
            Self::ProposalExecuted { .. } => "proposal_executed",
            Self::VoterAdded { .. } => "voter_added",
            Self::VoterRemoved { .. } => "voter_removed",
            Self::VoterReplaced { .. } => "voter_replaced",
            Self::ThresholdUpdated { .. } => "threshold_updated",
            Self::ActionAuthorized { .. } => "action_authorized",
            Self::ActionCommitted { .. } => "action_committed",
            Self::QuorumRelinquished { .. } => "quorum_relinquished",
        }
    }
}

/// Synchronous fan-out event bus for governance events.
///
/// Listeners are invoked inline on the emitting thread; keep handlers fast.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&GovernanceEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&GovernanceEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &GovernanceEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
