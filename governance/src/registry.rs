//! Shared-object registry: every live voter set and open proposal, keyed
//! by id, behind one lock.
//!
//! This is the service form of the governance core. Callers name objects by
//! id and identify themselves by address; each call re-checks authorization
//! against the state as it is when the lock is taken. Proposals of all kinds
//! are stored as `Proposal<Mutation>` and dispatched to the typed
//! `execute` of their payload.
//!
//! A consumed proposal is removed from the registry, so any later call on
//! its id fails with [`GovernanceError::ProposalNotFound`].

use crate::capability::{AuthorizationCapability, OwnedCapability};
use crate::context::TxContext;
use crate::error::GovernanceError;
use crate::event::{EventBus, GovernanceEvent};
use crate::mutations::{
    AddVoter, AuthorizeAction, Mutation, MutationRequest, RelinquishControl, RemoveVoter,
    ReplaceVoter, UpdateThreshold,
};
use crate::proposal::{Metadata, Proposal, Rejected};
use crate::voter_set::VoterSet;
use quorum_types::{Address, Digest, ObjectId, Timestamp};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// What executing a proposal produced.
pub enum Execution<C: AuthorizationCapability> {
    /// A voter-set mutation was applied.
    Applied,
    /// The capability issued a ticket; commit its receipt later.
    Authorized(C::Ticket),
    /// The instance is gone; the capability now belongs to the new owner.
    Relinquished(OwnedCapability<C>),
}

impl<C: AuthorizationCapability> fmt::Debug for Execution<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => f.write_str("Applied"),
            Self::Authorized(_) => f.write_str("Authorized(..)"),
            Self::Relinquished(owned) => write!(f, "Relinquished(owner: {})", owned.owner),
        }
    }
}

/// Snapshot of a governance instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstanceView {
    pub id: ObjectId,
    pub voters: Vec<Address>,
    pub required_votes: u64,
    pub action_in_flight: Option<Digest>,
    pub open_proposals: usize,
}

/// Snapshot of an open proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProposalView {
    pub id: ObjectId,
    pub instance_id: ObjectId,
    pub creator: Address,
    pub mutation: Mutation,
    pub votes: Vec<Address>,
    /// `None` once the target instance has been relinquished.
    pub valid_votes: Option<u64>,
    pub quorum_reached: bool,
    pub metadata: Option<Metadata>,
    pub created_at: Timestamp,
}

struct RegistryState<C> {
    instances: HashMap<ObjectId, VoterSet<C>>,
    proposals: HashMap<ObjectId, Proposal<Mutation>>,
}

pub struct GovernanceRegistry<C> {
    state: Mutex<RegistryState<C>>,
    events: EventBus,
}

impl<C: AuthorizationCapability> GovernanceRegistry<C> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                instances: HashMap::new(),
                proposals: HashMap::new(),
            }),
            events: EventBus::new(),
        }
    }

    /// Attach an observer. Events are delivered after the state lock is
    /// released, in emission order.
    pub fn subscribe(&mut self, listener: Box<dyn Fn(&GovernanceEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    // ── Instances ──────────────────────────────────────────────────────

    pub fn create_instance(
        &self,
        sender: &Address,
        capability: C,
        required_votes: u64,
        voters: impl IntoIterator<Item = Address>,
    ) -> Result<ObjectId, GovernanceError> {
        self.run(sender, "create_instance", |state, ctx| {
            let voter_set = VoterSet::create(capability, required_votes, voters, ctx)?;
            let id = voter_set.id();
            state.instances.insert(id, voter_set);
            tracing::info!(instance = %id.short(), required_votes, "governance instance created");
            Ok(id)
        })
    }

    pub fn replace_self(
        &self,
        sender: &Address,
        instance_id: ObjectId,
        new_voter: Address,
    ) -> Result<(), GovernanceError> {
        self.run(sender, "replace_self", |state, ctx| {
            state.instance_mut(instance_id)?.replace_self(new_voter, ctx)
        })
    }

    /// Commit the receipt of the instance's in-flight action. `sender`
    /// must be a current voter of the instance.
    pub fn commit(
        &self,
        sender: &Address,
        instance_id: ObjectId,
        receipt: C::Receipt,
    ) -> Result<(), GovernanceError> {
        self.run(sender, "commit", |state, ctx| {
            state.instance_mut(instance_id)?.commit(receipt, ctx)
        })
    }

    // ── Proposals ──────────────────────────────────────────────────────

    /// Validate `request` against the instance and open a proposal for it.
    pub fn open_proposal(
        &self,
        sender: &Address,
        instance_id: ObjectId,
        request: MutationRequest,
        metadata: Option<Metadata>,
    ) -> Result<ObjectId, GovernanceError> {
        self.run(sender, "open_proposal", |state, ctx| {
            let voter_set = state.instance(instance_id)?;
            let mutation = request.validate(voter_set)?;
            let kind = mutation.kind();
            let proposal = Proposal::open(voter_set, mutation, metadata, ctx)?;
            let id = proposal.id();
            state.proposals.insert(id, proposal);
            tracing::info!(proposal = %id.short(), instance = %instance_id.short(), kind, "proposal opened");
            Ok(id)
        })
    }

    pub fn vote(&self, sender: &Address, proposal_id: ObjectId) -> Result<(), GovernanceError> {
        self.run(sender, "vote", |state, ctx| {
            let (proposal, voter_set) = state.proposal_with_instance(proposal_id)?;
            proposal.vote(voter_set, ctx)
        })
    }

    pub fn remove_vote(&self, sender: &Address, proposal_id: ObjectId) -> Result<(), GovernanceError> {
        self.run(sender, "remove_vote", |state, ctx| {
            let (proposal, voter_set) = state.proposal_with_instance(proposal_id)?;
            proposal.remove_vote(voter_set, ctx)
        })
    }

    pub fn set_metadata(
        &self,
        sender: &Address,
        proposal_id: ObjectId,
        metadata: Metadata,
    ) -> Result<(), GovernanceError> {
        self.run(sender, "set_metadata", |state, ctx| {
            state
                .proposals
                .get_mut(&proposal_id)
                .ok_or(GovernanceError::ProposalNotFound(proposal_id))?
                .set_metadata(metadata, ctx)
        })
    }

    /// Withdraw a proposal. Creator only. Works even if the target
    /// instance has been relinquished.
    pub fn delete_proposal(&self, sender: &Address, proposal_id: ObjectId) -> Result<(), GovernanceError> {
        self.run(sender, "delete_proposal", |state, ctx| {
            let proposal = state
                .proposals
                .remove(&proposal_id)
                .ok_or(GovernanceError::ProposalNotFound(proposal_id))?;
            proposal.delete(ctx).map_err(|rejected| {
                let (error, proposal) = rejected.into_parts();
                state.proposals.insert(proposal_id, proposal);
                error
            })
        })
    }

    /// Execute a proposal that has reached quorum.
    ///
    /// On success the proposal is gone. On failure it stays open, untouched.
    pub fn execute(&self, sender: &Address, proposal_id: ObjectId) -> Result<Execution<C>, GovernanceError> {
        self.run(sender, "execute", |state, ctx| {
            let proposal = state
                .proposals
                .remove(&proposal_id)
                .ok_or(GovernanceError::ProposalNotFound(proposal_id))?;
            let target = proposal.target();
            let (shell, payload) = proposal.take_payload();

            let outcome = match payload {
                Mutation::RelinquishControl(payload) => match state.instances.remove(&target) {
                    Some(voter_set) => {
                        RelinquishControl::execute(shell.map_payload(|()| payload), voter_set, ctx)
                            .map(Execution::Relinquished)
                            .map_err(|rejected| {
                                let (error, (proposal, voter_set)) = rejected.into_parts();
                                state.instances.insert(target, voter_set);
                                Rejected::new(error, proposal.map_payload(Mutation::from))
                            })
                    }
                    None => Err(Rejected::new(
                        GovernanceError::InstanceNotFound(target),
                        shell.map_payload(|()| Mutation::RelinquishControl(payload)),
                    )),
                },
                payload => match state.instances.get_mut(&target) {
                    Some(voter_set) => execute_in_place(shell, payload, voter_set, ctx),
                    None => Err(Rejected::new(
                        GovernanceError::InstanceNotFound(target),
                        shell.map_payload(|()| payload),
                    )),
                },
            };

            match outcome {
                Ok(execution) => {
                    tracing::info!(proposal = %proposal_id.short(), instance = %target.short(), "proposal executed");
                    Ok(execution)
                }
                Err(rejected) => {
                    let (error, proposal) = rejected.into_parts();
                    state.proposals.insert(proposal_id, proposal);
                    Err(error)
                }
            }
        })
    }

    // ── Reads ──────────────────────────────────────────────────────────

    pub fn instance_exists(&self, instance_id: ObjectId) -> bool {
        self.lock().instances.contains_key(&instance_id)
    }

    pub fn proposal_exists(&self, proposal_id: ObjectId) -> bool {
        self.lock().proposals.contains_key(&proposal_id)
    }

    pub fn voters(&self, instance_id: ObjectId) -> Result<BTreeSet<Address>, GovernanceError> {
        Ok(self.lock().instance(instance_id)?.voters().clone())
    }

    pub fn required_votes(&self, instance_id: ObjectId) -> Result<u64, GovernanceError> {
        Ok(self.lock().instance(instance_id)?.required_votes())
    }

    /// Recompute quorum for a proposal against its instance's live
    /// membership.
    pub fn quorum_reached(&self, proposal_id: ObjectId) -> Result<bool, GovernanceError> {
        let state = self.lock();
        let proposal = state.proposal(proposal_id)?;
        let voter_set = state.instance(proposal.target())?;
        Ok(proposal.quorum_reached(voter_set))
    }

    pub fn instance(&self, instance_id: ObjectId) -> Result<InstanceView, GovernanceError> {
        let state = self.lock();
        let voter_set = state.instance(instance_id)?;
        Ok(InstanceView {
            id: instance_id,
            voters: voter_set.voters().iter().copied().collect(),
            required_votes: voter_set.required_votes(),
            action_in_flight: voter_set.action_in_flight().cloned(),
            open_proposals: state
                .proposals
                .values()
                .filter(|p| p.target() == instance_id)
                .count(),
        })
    }

    pub fn proposal(&self, proposal_id: ObjectId) -> Result<ProposalView, GovernanceError> {
        let state = self.lock();
        let proposal = state.proposal(proposal_id)?;
        let voter_set = state.instances.get(&proposal.target());
        Ok(ProposalView {
            id: proposal_id,
            instance_id: proposal.target(),
            creator: *proposal.creator(),
            mutation: proposal.payload().clone(),
            votes: proposal.votes().iter().copied().collect(),
            valid_votes: voter_set.map(|set| proposal.valid_votes(set)),
            quorum_reached: voter_set.is_some_and(|set| proposal.quorum_reached(set)),
            metadata: proposal.metadata().cloned(),
            created_at: proposal.created_at(),
        })
    }

    /// Ids of the open proposals targeting `instance_id`, sorted.
    pub fn proposals_for(&self, instance_id: ObjectId) -> Vec<ObjectId> {
        let state = self.lock();
        let mut ids: Vec<ObjectId> = state
            .proposals
            .values()
            .filter(|p| p.target() == instance_id)
            .map(|p| p.id())
            .collect();
        ids.sort();
        ids
    }

    /// Read the capability wrapped by an instance.
    pub fn inspect_capability<R>(
        &self,
        instance_id: ObjectId,
        f: impl FnOnce(&C) -> R,
    ) -> Result<R, GovernanceError> {
        Ok(f(self.lock().instance(instance_id)?.capability()))
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, RegistryState<C>> {
        // Every operation validates before it mutates, so the state behind a
        // poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` as one transaction from `sender`, then publish its events.
    fn run<R>(
        &self,
        sender: &Address,
        name: &'static str,
        op: impl FnOnce(&mut RegistryState<C>, &mut TxContext) -> Result<R, GovernanceError>,
    ) -> Result<R, GovernanceError> {
        let mut ctx = TxContext::new(*sender);
        let result = {
            let mut state = self.lock();
            op(&mut state, &mut ctx)
        };
        match &result {
            Ok(_) => self.publish(ctx.take_events()),
            Err(e) => tracing::warn!(op = name, sender = %sender, error = %e, "governance operation rejected"),
        }
        result
    }

    fn publish(&self, events: Vec<GovernanceEvent>) {
        for event in &events {
            tracing::debug!(event = event.name(), ?event, "governance event");
            self.events.emit(event);
        }
    }
}

impl<C: AuthorizationCapability> Default for GovernanceRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RegistryState<C> {
    fn instance(&self, id: ObjectId) -> Result<&VoterSet<C>, GovernanceError> {
        self.instances
            .get(&id)
            .ok_or(GovernanceError::InstanceNotFound(id))
    }

    fn instance_mut(&mut self, id: ObjectId) -> Result<&mut VoterSet<C>, GovernanceError> {
        self.instances
            .get_mut(&id)
            .ok_or(GovernanceError::InstanceNotFound(id))
    }

    fn proposal(&self, id: ObjectId) -> Result<&Proposal<Mutation>, GovernanceError> {
        self.proposals
            .get(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    fn proposal_with_instance(
        &mut self,
        id: ObjectId,
    ) -> Result<(&mut Proposal<Mutation>, &VoterSet<C>), GovernanceError> {
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        let target = proposal.target();
        let voter_set = self
            .instances
            .get(&target)
            .ok_or(GovernanceError::InstanceNotFound(target))?;
        Ok((proposal, voter_set))
    }
}

/// Dispatch a non-terminal mutation to its typed executor.
fn execute_in_place<C: AuthorizationCapability>(
    shell: Proposal<()>,
    payload: Mutation,
    voter_set: &mut VoterSet<C>,
    ctx: &mut TxContext,
) -> Result<Execution<C>, Rejected<Proposal<Mutation>>> {
    match payload {
        Mutation::AddVoter(p) => AddVoter::execute(shell.map_payload(|()| p), voter_set, ctx)
            .map(|()| Execution::Applied)
            .map_err(|r| r.map_inner(|p| p.map_payload(Mutation::from))),
        Mutation::RemoveVoter(p) => RemoveVoter::execute(shell.map_payload(|()| p), voter_set, ctx)
            .map(|()| Execution::Applied)
            .map_err(|r| r.map_inner(|p| p.map_payload(Mutation::from))),
        Mutation::ReplaceVoter(p) => ReplaceVoter::execute(shell.map_payload(|()| p), voter_set, ctx)
            .map(|()| Execution::Applied)
            .map_err(|r| r.map_inner(|p| p.map_payload(Mutation::from))),
        Mutation::UpdateThreshold(p) => {
            UpdateThreshold::execute(shell.map_payload(|()| p), voter_set, ctx)
                .map(|()| Execution::Applied)
                .map_err(|r| r.map_inner(|p| p.map_payload(Mutation::from)))
        }
        Mutation::AuthorizeAction(p) => {
            AuthorizeAction::execute(shell.map_payload(|()| p), voter_set, ctx)
                .map(Execution::Authorized)
                .map_err(|r| r.map_inner(|p| p.map_payload(Mutation::from)))
        }
        relinquish @ Mutation::RelinquishControl(_) => Err(Rejected::new(
            GovernanceError::PayloadMismatch("relinquish_control"),
            shell.map_payload(|()| relinquish),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upgrade::UpgradeCap;
    use std::sync::Arc;

    fn addr(seed: u8) -> Address {
        Address::new([seed; 32])
    }

    fn setup(required: u64) -> (GovernanceRegistry<UpgradeCap>, ObjectId) {
        let registry = GovernanceRegistry::new();
        let id = registry
            .create_instance(
                &addr(1),
                UpgradeCap::new(ObjectId::new([0xcc; 32])),
                required,
                [addr(1), addr(2), addr(3)],
            )
            .unwrap();
        (registry, id)
    }

    fn add_voter(voter: Address) -> MutationRequest {
        MutationRequest::AddVoter {
            voter,
            new_required_votes: None,
        }
    }

    #[test]
    fn test_create_instance_rejects_bad_threshold() {
        let registry: GovernanceRegistry<UpgradeCap> = GovernanceRegistry::new();
        let err = registry
            .create_instance(&addr(1), UpgradeCap::new(ObjectId::ZERO), 0, [addr(1)])
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidThreshold { .. }));
    }

    #[test]
    fn test_execute_twice_fails_with_not_found() {
        let (registry, instance) = setup(2);
        let proposal = registry
            .open_proposal(&addr(1), instance, add_voter(addr(4)), None)
            .unwrap();
        registry.vote(&addr(2), proposal).unwrap();
        assert!(matches!(
            registry.execute(&addr(1), proposal).unwrap(),
            Execution::Applied
        ));
        assert!(!registry.proposal_exists(proposal));
        assert_eq!(
            registry.execute(&addr(1), proposal).unwrap_err(),
            GovernanceError::ProposalNotFound(proposal)
        );
        assert_eq!(
            registry.vote(&addr(3), proposal).unwrap_err(),
            GovernanceError::ProposalNotFound(proposal)
        );
    }

    #[test]
    fn test_failed_execute_keeps_proposal() {
        let (registry, instance) = setup(2);
        let proposal = registry
            .open_proposal(&addr(1), instance, add_voter(addr(4)), None)
            .unwrap();
        assert!(matches!(
            registry.execute(&addr(1), proposal).unwrap_err(),
            GovernanceError::QuorumNotReached { valid_votes: 1, required_votes: 2 }
        ));
        let view = registry.proposal(proposal).unwrap();
        assert_eq!(view.votes, vec![addr(1)]);
        assert_eq!(view.valid_votes, Some(1));
        assert!(!view.quorum_reached);
        assert_eq!(registry.voters(instance).unwrap().len(), 3);
    }

    #[test]
    fn test_open_validates_request() {
        let (registry, instance) = setup(2);
        assert_eq!(
            registry
                .open_proposal(&addr(1), instance, add_voter(addr(2)), None)
                .unwrap_err(),
            GovernanceError::VoterAlreadyExists(addr(2))
        );
        assert_eq!(
            registry
                .open_proposal(&addr(9), instance, add_voter(addr(4)), None)
                .unwrap_err(),
            GovernanceError::Unauthorized(addr(9))
        );
        assert!(registry.proposals_for(instance).is_empty());
    }

    #[test]
    fn test_relinquish_removes_instance() {
        let (registry, instance) = setup(2);
        let stale = registry
            .open_proposal(&addr(2), instance, add_voter(addr(4)), None)
            .unwrap();
        let proposal = registry
            .open_proposal(
                &addr(1),
                instance,
                MutationRequest::RelinquishControl { new_owner: addr(42) },
                None,
            )
            .unwrap();
        registry.vote(&addr(3), proposal).unwrap();

        match registry.execute(&addr(1), proposal).unwrap() {
            Execution::Relinquished(owned) => assert_eq!(owned.owner, addr(42)),
            other => panic!("unexpected execution: {other:?}"),
        }
        assert!(!registry.instance_exists(instance));
        assert_eq!(
            registry.vote(&addr(3), stale).unwrap_err(),
            GovernanceError::InstanceNotFound(instance)
        );
        assert_eq!(
            registry.execute(&addr(2), stale).unwrap_err(),
            GovernanceError::InstanceNotFound(instance)
        );
        assert_eq!(registry.proposal(stale).unwrap().valid_votes, None);
        registry.delete_proposal(&addr(2), stale).unwrap();
        assert!(!registry.proposal_exists(stale));
    }

    #[test]
    fn test_failed_relinquish_restores_instance() {
        let (registry, instance) = setup(2);
        let proposal = registry
            .open_proposal(
                &addr(1),
                instance,
                MutationRequest::RelinquishControl { new_owner: addr(42) },
                None,
            )
            .unwrap();
        assert!(registry.execute(&addr(1), proposal).is_err());
        assert!(registry.instance_exists(instance));
        assert!(registry.proposal_exists(proposal));
    }

    #[test]
    fn test_delete_by_non_creator_keeps_proposal() {
        let (registry, instance) = setup(2);
        let proposal = registry
            .open_proposal(&addr(1), instance, add_voter(addr(4)), None)
            .unwrap();
        assert_eq!(
            registry.delete_proposal(&addr(2), proposal).unwrap_err(),
            GovernanceError::Unauthorized(addr(2))
        );
        assert!(registry.proposal_exists(proposal));
        registry.delete_proposal(&addr(1), proposal).unwrap();
        assert_eq!(
            registry.delete_proposal(&addr(1), proposal).unwrap_err(),
            GovernanceError::ProposalNotFound(proposal)
        );
    }

    #[test]
    fn test_events_reach_subscribers_only_on_success() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry: GovernanceRegistry<UpgradeCap> = GovernanceRegistry::new();
        let sink = Arc::clone(&seen);
        registry.subscribe(Box::new(move |event: &GovernanceEvent| {
            sink.lock().unwrap().push(event.name());
        }));

        assert!(registry
            .create_instance(&addr(1), UpgradeCap::new(ObjectId::ZERO), 5, [addr(1)])
            .is_err());
        assert!(seen.lock().unwrap().is_empty());

        let instance = registry
            .create_instance(&addr(1), UpgradeCap::new(ObjectId::ZERO), 1, [addr(1), addr(2)])
            .unwrap();
        let proposal = registry
            .open_proposal(
                &addr(1),
                instance,
                MutationRequest::UpdateThreshold { new_required_votes: 2 },
                None,
            )
            .unwrap();
        registry.execute(&addr(2), proposal).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "instance_created",
                "proposal_opened",
                "vote_cast",
                "quorum_reached",
                "threshold_updated",
                "proposal_executed",
            ]
        );
    }

    #[test]
    fn test_instance_view() {
        let (registry, instance) = setup(2);
        registry
            .open_proposal(&addr(1), instance, add_voter(addr(4)), None)
            .unwrap();
        let view = registry.instance(instance).unwrap();
        assert_eq!(view.voters, vec![addr(1), addr(2), addr(3)]);
        assert_eq!(view.required_votes, 2);
        assert_eq!(view.open_proposals, 1);
        assert_eq!(view.action_in_flight, None);
        assert_eq!(
            registry.inspect_capability(instance, |cap| cap.version()).unwrap(),
            1
        );
    }
}
