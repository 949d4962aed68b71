//! The voter set: members, threshold and the wrapped capability of one
//! governance instance.
//!
//! Invariant, checked before every mutation is applied:
//! `1 <= required_votes <= voters.len()`. All validation happens before any
//! field is touched, so a rejected call leaves the set unchanged.
//!
//! Membership and threshold changes are crate-private: only an executed
//! mutation proposal may call them. The one exception is
//! [`VoterSet::replace_self`], a voter rotating their own key.

use crate::capability::{AuthorizationCapability, OwnedCapability};
use crate::context::TxContext;
use crate::error::GovernanceError;
use crate::event::GovernanceEvent;
use quorum_types::{Address, Digest, ObjectId};
use std::collections::BTreeSet;

#[derive(Debug)]
pub struct VoterSet<C> {
    id: ObjectId,
    voters: BTreeSet<Address>,
    required_votes: u64,
    capability: C,
    /// Digest of the action authorized but not yet committed.
    in_flight: Option<Digest>,
}

impl<C> VoterSet<C> {
    /// Publish a new governance instance wrapping `capability`.
    ///
    /// Duplicate addresses in `voters` collapse into one member; the
    /// threshold is checked against the deduplicated count.
    pub fn create(
        capability: C,
        required_votes: u64,
        voters: impl IntoIterator<Item = Address>,
        ctx: &mut TxContext,
    ) -> Result<Self, GovernanceError> {
        let voters: BTreeSet<Address> = voters.into_iter().collect();
        check_threshold(required_votes, voters.len() as u64)?;

        let id = ctx.fresh_id();
        ctx.emit(GovernanceEvent::InstanceCreated {
            instance_id: id,
            voters: voters.len() as u64,
            required_votes,
        });
        Ok(Self {
            id,
            voters,
            required_votes,
            capability,
            in_flight: None,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn voters(&self) -> &BTreeSet<Address> {
        &self.voters
    }

    pub fn voter_count(&self) -> u64 {
        self.voters.len() as u64
    }

    pub fn required_votes(&self) -> u64 {
        self.required_votes
    }

    pub fn is_voter(&self, address: &Address) -> bool {
        self.voters.contains(address)
    }

    /// Read-only view of the wrapped capability.
    pub fn capability(&self) -> &C {
        &self.capability
    }

    pub fn action_in_flight(&self) -> Option<&Digest> {
        self.in_flight.as_ref()
    }

    /// Whether quorum is currently achievable: `1 <= required <= |voters|`.
    pub fn invariants_hold(&self) -> bool {
        self.required_votes >= 1 && self.required_votes <= self.voter_count()
    }

    pub(crate) fn ensure_voter(&self, address: &Address) -> Result<(), GovernanceError> {
        if self.is_voter(address) {
            Ok(())
        } else {
            Err(GovernanceError::Unauthorized(*address))
        }
    }

    // ── Precondition checks (shared by mutation constructors) ──────────

    /// Validate adding `voter`; returns the threshold that would result.
    pub(crate) fn check_add_voter(
        &self,
        voter: &Address,
        new_required_votes: Option<u64>,
    ) -> Result<u64, GovernanceError> {
        if self.is_voter(voter) {
            return Err(GovernanceError::VoterAlreadyExists(*voter));
        }
        match new_required_votes {
            Some(required) => check_override(required, self.voter_count() + 1),
            None => Ok(self.required_votes),
        }
    }

    /// Validate removing `voter`; returns the threshold that would result.
    pub(crate) fn check_remove_voter(
        &self,
        voter: &Address,
        new_required_votes: Option<u64>,
    ) -> Result<u64, GovernanceError> {
        if !self.is_voter(voter) {
            return Err(GovernanceError::InvalidVoter(*voter));
        }
        let remaining = self.voter_count() - 1;
        check_override(new_required_votes.unwrap_or(self.required_votes), remaining)
    }

    pub(crate) fn check_replace_voter(
        &self,
        old_voter: &Address,
        new_voter: &Address,
    ) -> Result<(), GovernanceError> {
        if !self.is_voter(old_voter) {
            return Err(GovernanceError::InvalidOldVoter(*old_voter));
        }
        if self.is_voter(new_voter) {
            return Err(GovernanceError::InvalidNewVoter(*new_voter));
        }
        Ok(())
    }

    pub(crate) fn check_update_threshold(&self, required_votes: u64) -> Result<(), GovernanceError> {
        check_threshold(required_votes, self.voter_count())
    }

    // ── Mutations (reachable only through executed proposals) ──────────

    pub(crate) fn add_voter(
        &mut self,
        voter: Address,
        new_required_votes: Option<u64>,
        ctx: &mut TxContext,
    ) -> Result<(), GovernanceError> {
        let required = self.check_add_voter(&voter, new_required_votes)?;
        self.voters.insert(voter);
        ctx.emit(GovernanceEvent::VoterAdded {
            instance_id: self.id,
            voter,
        });
        self.set_required_votes(required, ctx);
        debug_assert!(self.invariants_hold());
        Ok(())
    }

    pub(crate) fn remove_voter(
        &mut self,
        voter: &Address,
        new_required_votes: Option<u64>,
        ctx: &mut TxContext,
    ) -> Result<(), GovernanceError> {
        let required = self.check_remove_voter(voter, new_required_votes)?;
        self.voters.remove(voter);
        ctx.emit(GovernanceEvent::VoterRemoved {
            instance_id: self.id,
            voter: *voter,
        });
        self.set_required_votes(required, ctx);
        debug_assert!(self.invariants_hold());
        Ok(())
    }

    pub(crate) fn replace_voter(
        &mut self,
        old_voter: &Address,
        new_voter: Address,
        ctx: &mut TxContext,
    ) -> Result<(), GovernanceError> {
        self.check_replace_voter(old_voter, &new_voter)?;
        self.voters.remove(old_voter);
        self.voters.insert(new_voter);
        ctx.emit(GovernanceEvent::VoterReplaced {
            instance_id: self.id,
            old_voter: *old_voter,
            new_voter,
        });
        Ok(())
    }

    pub(crate) fn update_threshold(
        &mut self,
        required_votes: u64,
        ctx: &mut TxContext,
    ) -> Result<(), GovernanceError> {
        self.check_update_threshold(required_votes)?;
        self.set_required_votes(required_votes, ctx);
        Ok(())
    }

    /// Give the caller's seat to `new_voter` without a vote.
    ///
    /// Only the seat holder can do this, so it cannot be used to change
    /// anyone else's standing.
    pub fn replace_self(
        &mut self,
        new_voter: Address,
        ctx: &mut TxContext,
    ) -> Result<(), GovernanceError> {
        let sender = *ctx.sender();
        self.ensure_voter(&sender)?;
        self.replace_voter(&sender, new_voter, ctx)
    }

    /// Dissolve the instance and hand the capability to `new_owner`.
    pub(crate) fn relinquish(self, new_owner: Address, ctx: &mut TxContext) -> OwnedCapability<C> {
        ctx.emit(GovernanceEvent::QuorumRelinquished {
            instance_id: self.id,
            new_owner,
        });
        OwnedCapability {
            owner: new_owner,
            capability: self.capability,
        }
    }

    fn set_required_votes(&mut self, required_votes: u64, ctx: &mut TxContext) {
        if required_votes == self.required_votes {
            return;
        }
        let old = self.required_votes;
        self.required_votes = required_votes;
        ctx.emit(GovernanceEvent::ThresholdUpdated {
            instance_id: self.id,
            old_required_votes: old,
            new_required_votes: required_votes,
        });
    }
}

impl<C: AuthorizationCapability> VoterSet<C> {
    /// Forward `digest` to the wrapped capability.
    ///
    /// At most one action may be in flight; the next authorization waits
    /// for [`VoterSet::commit`].
    pub(crate) fn authorize(
        &mut self,
        digest: &Digest,
        ctx: &mut TxContext,
    ) -> Result<C::Ticket, GovernanceError> {
        if self.in_flight.is_some() {
            return Err(GovernanceError::ActionInFlight);
        }
        let ticket = self
            .capability
            .authorize(digest)
            .map_err(|e| GovernanceError::Capability(e.to_string()))?;
        self.in_flight = Some(digest.clone());
        ctx.emit(GovernanceEvent::ActionAuthorized {
            instance_id: self.id,
            digest: digest.clone(),
        });
        Ok(ticket)
    }

    /// Hand the receipt of the in-flight action to the capability.
    ///
    /// Only a current voter may commit. If the capability refuses the
    /// receipt the action stays in flight.
    pub fn commit(&mut self, receipt: C::Receipt, ctx: &mut TxContext) -> Result<(), GovernanceError> {
        self.ensure_voter(ctx.sender())?;
        let Some(digest) = self.in_flight.clone() else {
            return Err(GovernanceError::NoActionInFlight);
        };
        self.capability
            .commit(receipt)
            .map_err(|e| GovernanceError::Capability(e.to_string()))?;
        self.in_flight = None;
        ctx.emit(GovernanceEvent::ActionCommitted {
            instance_id: self.id,
            digest,
        });
        Ok(())
    }
}

fn check_threshold(required_votes: u64, voters: u64) -> Result<(), GovernanceError> {
    if required_votes == 0 || required_votes > voters {
        return Err(GovernanceError::InvalidThreshold {
            required_votes,
            voters,
        });
    }
    Ok(())
}

/// Validate a threshold against the voter count after a membership change.
fn check_override(required_votes: u64, voters_after: u64) -> Result<u64, GovernanceError> {
    if required_votes == 0 {
        return Err(GovernanceError::RequiredVotesZero);
    }
    if required_votes > voters_after {
        return Err(GovernanceError::InvalidRequiredVotes {
            required_votes,
            voters: voters_after,
        });
    }
    Ok(required_votes)
}
