//! Proposals: a typed payload plus the set of voters who approved it.
//!
//! A proposal is always either open or gone. It leaves the open state in
//! exactly one of two ways: its creator deletes it, or a mutation's
//! `execute` consumes it after quorum is confirmed. Both take the proposal
//! by value, so the same proposal can never be executed twice.
//!
//! Quorum is never cached. [`Proposal::quorum_reached`] counts only votes
//! from addresses that are members of the voter set *right now*; a voter
//! removed after voting still appears in [`Proposal::votes`] but no longer
//! counts.

use crate::context::TxContext;
use crate::error::GovernanceError;
use crate::event::GovernanceEvent;
use crate::voter_set::VoterSet;
use quorum_types::{Address, ObjectId, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Free-form, informational key/value annotations.
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug)]
pub struct Proposal<T> {
    id: ObjectId,
    creator: Address,
    target: ObjectId,
    votes: BTreeSet<Address>,
    payload: T,
    metadata: Option<Metadata>,
    created_at: Timestamp,
}

impl<T> Proposal<T> {
    /// Open a proposal against `voter_set`. The caller must be a voter and
    /// their vote is recorded immediately.
    pub fn open<C>(
        voter_set: &VoterSet<C>,
        payload: T,
        metadata: Option<Metadata>,
        ctx: &mut TxContext,
    ) -> Result<Self, GovernanceError> {
        let creator = *ctx.sender();
        voter_set.ensure_voter(&creator)?;

        let proposal = Self {
            id: ctx.fresh_id(),
            creator,
            target: voter_set.id(),
            votes: BTreeSet::from([creator]),
            payload,
            metadata,
            created_at: ctx.timestamp(),
        };
        ctx.emit(GovernanceEvent::ProposalOpened {
            proposal_id: proposal.id,
            instance_id: proposal.target,
            creator,
        });
        ctx.emit(GovernanceEvent::VoteCast {
            proposal_id: proposal.id,
            total_votes: 1,
        });
        if proposal.quorum_reached(voter_set) {
            ctx.emit(GovernanceEvent::QuorumReached {
                proposal_id: proposal.id,
            });
        }
        Ok(proposal)
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn creator(&self) -> &Address {
        &self.creator
    }

    /// The voter set this proposal belongs to. Fixed at creation.
    pub fn target(&self) -> ObjectId {
        self.target
    }

    /// Every address that voted, including ones since removed from the set.
    pub fn votes(&self) -> &BTreeSet<Address> {
        &self.votes
    }

    pub fn has_voted(&self, address: &Address) -> bool {
        self.votes.contains(address)
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Record the caller's approval.
    pub fn vote<C>(
        &mut self,
        voter_set: &VoterSet<C>,
        ctx: &mut TxContext,
    ) -> Result<(), GovernanceError> {
        self.ensure_target(voter_set)?;
        let voter = *ctx.sender();
        voter_set.ensure_voter(&voter)?;
        if self.votes.contains(&voter) {
            return Err(GovernanceError::AlreadyVoted(voter));
        }

        let had_quorum = self.quorum_reached(voter_set);
        self.votes.insert(voter);
        ctx.emit(GovernanceEvent::VoteCast {
            proposal_id: self.id,
            total_votes: self.votes.len() as u64,
        });
        if !had_quorum && self.quorum_reached(voter_set) {
            ctx.emit(GovernanceEvent::QuorumReached {
                proposal_id: self.id,
            });
        }
        Ok(())
    }

    /// Withdraw the caller's approval.
    ///
    /// Membership is not required: a removed voter may still retract a
    /// vote they cast while they were a member.
    pub fn remove_vote<C>(
        &mut self,
        voter_set: &VoterSet<C>,
        ctx: &mut TxContext,
    ) -> Result<(), GovernanceError> {
        self.ensure_target(voter_set)?;
        let voter = *ctx.sender();
        if !self.votes.remove(&voter) {
            return Err(GovernanceError::NoVoteFound(voter));
        }
        ctx.emit(GovernanceEvent::VoteRemoved {
            proposal_id: self.id,
            voter,
        });
        Ok(())
    }

    /// Number of votes cast by addresses that are still voters.
    pub fn valid_votes<C>(&self, voter_set: &VoterSet<C>) -> u64 {
        self.votes
            .iter()
            .filter(|voter| voter_set.is_voter(voter))
            .count() as u64
    }

    /// Recompute quorum against live membership. Always false for a voter
    /// set other than the target.
    pub fn quorum_reached<C>(&self, voter_set: &VoterSet<C>) -> bool {
        self.target == voter_set.id() && self.valid_votes(voter_set) >= voter_set.required_votes()
    }

    /// Attach metadata. Creator only, and only if none was set at open.
    pub fn set_metadata(
        &mut self,
        metadata: Metadata,
        ctx: &TxContext,
    ) -> Result<(), GovernanceError> {
        self.ensure_creator(ctx)?;
        if self.metadata.is_some() {
            return Err(GovernanceError::MetadataAlreadySet);
        }
        self.metadata = Some(metadata);
        Ok(())
    }

    /// Withdraw the proposal. Only its creator may do this; no quorum is
    /// needed.
    pub fn delete(self, ctx: &mut TxContext) -> Result<(), Rejected<Self>> {
        if let Err(error) = self.ensure_creator(ctx) {
            return Err(Rejected::new(error, self));
        }
        ctx.emit(GovernanceEvent::ProposalDeleted {
            proposal_id: self.id,
        });
        Ok(())
    }

    /// Check everything `execute` needs without consuming the proposal:
    /// right instance, caller is a voter, quorum over live membership.
    pub(crate) fn ensure_executable<C>(
        &self,
        voter_set: &VoterSet<C>,
        ctx: &TxContext,
    ) -> Result<(), GovernanceError> {
        self.ensure_target(voter_set)?;
        voter_set.ensure_voter(ctx.sender())?;
        let valid_votes = self.valid_votes(voter_set);
        if valid_votes < voter_set.required_votes() {
            return Err(GovernanceError::QuorumNotReached {
                valid_votes,
                required_votes: voter_set.required_votes(),
            });
        }
        Ok(())
    }

    /// Destroy the proposal shell and release the payload. Callers must
    /// have passed [`Proposal::ensure_executable`] first.
    pub(crate) fn consume(self, ctx: &mut TxContext) -> T {
        ctx.emit(GovernanceEvent::ProposalExecuted {
            proposal_id: self.id,
        });
        self.payload
    }

    /// Quorum-checked consumption of the proposal, yielding its payload.
    pub(crate) fn execute<C>(
        self,
        voter_set: &VoterSet<C>,
        ctx: &mut TxContext,
    ) -> Result<T, Rejected<Self>> {
        match self.ensure_executable(voter_set, ctx) {
            Ok(()) => Ok(self.consume(ctx)),
            Err(error) => Err(Rejected::new(error, self)),
        }
    }

    /// Re-type the payload, keeping identity and votes.
    pub(crate) fn map_payload<U>(self, f: impl FnOnce(T) -> U) -> Proposal<U> {
        Proposal {
            id: self.id,
            creator: self.creator,
            target: self.target,
            votes: self.votes,
            payload: f(self.payload),
            metadata: self.metadata,
            created_at: self.created_at,
        }
    }

    /// Split into an empty shell and the payload.
    pub(crate) fn take_payload(self) -> (Proposal<()>, T) {
        let shell = Proposal {
            id: self.id,
            creator: self.creator,
            target: self.target,
            votes: self.votes,
            payload: (),
            metadata: self.metadata,
            created_at: self.created_at,
        };
        (shell, self.payload)
    }

    fn ensure_target<C>(&self, voter_set: &VoterSet<C>) -> Result<(), GovernanceError> {
        if self.target != voter_set.id() {
            return Err(GovernanceError::QuorumMismatch {
                expected: self.target,
                actual: voter_set.id(),
            });
        }
        Ok(())
    }

    fn ensure_creator(&self, ctx: &TxContext) -> Result<(), GovernanceError> {
        if ctx.sender() != &self.creator {
            return Err(GovernanceError::Unauthorized(*ctx.sender()));
        }
        Ok(())
    }
}

/// A refused operation on a by-value object, handing the object back
/// unchanged.
pub struct Rejected<T> {
    error: GovernanceError,
    inner: T,
}

impl<T> Rejected<T> {
    pub(crate) fn new(error: GovernanceError, inner: T) -> Self {
        Self { error, inner }
    }

    pub fn error(&self) -> &GovernanceError {
        &self.error
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn into_parts(self) -> (GovernanceError, T) {
        (self.error, self.inner)
    }

    pub(crate) fn map_inner<U>(self, f: impl FnOnce(T) -> U) -> Rejected<U> {
        Rejected {
            error: self.error,
            inner: f(self.inner),
        }
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected").field("error", &self.error).finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T> std::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<T> From<Rejected<T>> for GovernanceError {
    fn from(rejected: Rejected<T>) -> Self {
        rejected.error
    }
}
