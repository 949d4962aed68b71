//! End-to-end governance scenarios: voter sets, proposals and the
//! capability seam wired together, with deterministic time and a recording
//! capability.

use quorum_governance::{
    AddVoter, AuthorizeAction, Execution, GovernanceError, GovernanceEvent, GovernanceRegistry,
    MutationRequest, Proposal, RemoveVoter, UpdateThreshold, VoterSet,
};
use quorum_nullables::{NullCapability, NullClock, NullReceipt};
use quorum_types::{Address, Digest, Timestamp};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ALICE: u8 = 0xa1;
const BOB: u8 = 0xb0;
const CAROL: u8 = 0xc0;
const DAVE: u8 = 0xd0;

fn addr(seed: u8) -> Address {
    Address::new([seed; 32])
}

fn upgrade_digest() -> Digest {
    "0x0123456789".parse().unwrap()
}

fn abc(clock: &NullClock, required: u64) -> VoterSet<NullCapability> {
    VoterSet::create(
        NullCapability::new(),
        required,
        [addr(ALICE), addr(BOB), addr(CAROL)],
        &mut clock.context(addr(ALICE)),
    )
    .unwrap()
}

/// Open a proposal from `creator`, collect votes from `voters` and execute
/// it as `creator`.
fn pass<T>(
    clock: &NullClock,
    set: &mut VoterSet<NullCapability>,
    payload: T,
    creator: u8,
    voters: &[u8],
    execute: impl FnOnce(Proposal<T>, &mut VoterSet<NullCapability>, &mut quorum_governance::TxContext),
) {
    let mut proposal = Proposal::open(set, payload, None, &mut clock.context(addr(creator))).unwrap();
    for voter in voters {
        proposal.vote(set, &mut clock.context(addr(*voter))).unwrap();
    }
    execute(proposal, set, &mut clock.context(addr(creator)));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn happy_path_upgrade() {
    let clock = NullClock::new(1_700_000_000);
    let mut set = abc(&clock, 2);

    let payload = AuthorizeAction::new(&set, upgrade_digest()).unwrap();
    let mut proposal =
        Proposal::open(&set, payload, None, &mut clock.context(addr(ALICE))).unwrap();
    assert_eq!(proposal.created_at(), Timestamp::new(1_700_000_000));
    assert!(!proposal.quorum_reached(&set));

    clock.advance(30);
    proposal.vote(&set, &mut clock.context(addr(BOB))).unwrap();
    assert!(proposal.quorum_reached(&set));
    assert_eq!(proposal.valid_votes(&set), 2);

    let mut ctx = clock.context(addr(ALICE));
    let ticket = AuthorizeAction::execute(proposal, &mut set, &mut ctx).unwrap();
    assert_eq!(ticket.digest(), &upgrade_digest());
    assert_eq!(set.action_in_flight(), Some(&upgrade_digest()));
    assert!(ctx
        .events()
        .iter()
        .any(|e| matches!(e, GovernanceEvent::ProposalExecuted { .. })));

    set.commit(ticket.complete(), &mut clock.context(addr(ALICE)))
        .unwrap();
    assert_eq!(set.action_in_flight(), None);
    assert_eq!(set.capability().authorized(), &[upgrade_digest()]);
    assert_eq!(set.capability().committed(), &[1]);
}

#[test]
fn happy_path_upgrade_through_registry() {
    let registry: GovernanceRegistry<NullCapability> = GovernanceRegistry::new();
    let instance = registry
        .create_instance(
            &addr(ALICE),
            NullCapability::new(),
            2,
            [addr(ALICE), addr(BOB), addr(CAROL)],
        )
        .unwrap();
    let proposal = registry
        .open_proposal(
            &addr(ALICE),
            instance,
            MutationRequest::AuthorizeAction {
                digest: upgrade_digest(),
            },
            None,
        )
        .unwrap();
    registry.vote(&addr(BOB), proposal).unwrap();
    assert!(registry.quorum_reached(proposal).unwrap());

    let ticket = match registry.execute(&addr(ALICE), proposal).unwrap() {
        Execution::Authorized(ticket) => ticket,
        other => panic!("expected a ticket, got {other:?}"),
    };
    registry
        .commit(&addr(ALICE), instance, ticket.complete())
        .unwrap();

    assert!(!registry.proposal_exists(proposal));
    assert_eq!(
        registry.execute(&addr(ALICE), proposal).unwrap_err(),
        GovernanceError::ProposalNotFound(proposal)
    );
    assert_eq!(registry.instance(instance).unwrap().action_in_flight, None);
}

#[test]
fn insufficient_quorum_leaves_everything_unchanged() {
    let clock = NullClock::new(0);
    let mut set = abc(&clock, 2);
    let payload = AuthorizeAction::new(&set, upgrade_digest()).unwrap();
    let proposal = Proposal::open(&set, payload, None, &mut clock.context(addr(ALICE))).unwrap();
    let proposal_id = proposal.id();

    let mut ctx = clock.context(addr(ALICE));
    let rejected = AuthorizeAction::execute(proposal, &mut set, &mut ctx).unwrap_err();
    assert_eq!(
        rejected.error(),
        &GovernanceError::QuorumNotReached {
            valid_votes: 1,
            required_votes: 2
        }
    );
    assert!(ctx.events().is_empty());

    let proposal = rejected.into_inner();
    assert_eq!(proposal.id(), proposal_id);
    assert_eq!(proposal.votes().len(), 1);
    assert_eq!(set.voter_count(), 3);
    assert_eq!(set.required_votes(), 2);
    assert_eq!(set.action_in_flight(), None);
    assert!(set.capability().authorized().is_empty());
}

#[test]
fn invalid_threshold_on_creation() {
    let clock = NullClock::new(0);
    for required in [0, 4] {
        let mut ctx = clock.context(addr(ALICE));
        let err = VoterSet::create(
            NullCapability::new(),
            required,
            [addr(ALICE), addr(BOB), addr(CAROL)],
            &mut ctx,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GovernanceError::InvalidThreshold {
                required_votes: required,
                voters: 3
            }
        );
        assert!(ctx.events().is_empty());
    }
}

#[test]
fn quorum_reflects_removed_voter() {
    let clock = NullClock::new(0);
    let mut set = abc(&clock, 2);

    let payload = UpdateThreshold::new(&set, 1).unwrap();
    let mut open = Proposal::open(&set, payload, None, &mut clock.context(addr(ALICE))).unwrap();
    open.vote(&set, &mut clock.context(addr(BOB))).unwrap();
    assert!(open.quorum_reached(&set));

    let remove_bob = RemoveVoter::new(&set, addr(BOB), None).unwrap();
    pass(&clock, &mut set, remove_bob, ALICE, &[CAROL], |p, s, ctx| {
        RemoveVoter::execute(p, s, ctx).unwrap()
    });
    assert!(!set.is_voter(&addr(BOB)));

    assert_eq!(open.valid_votes(&set), 1);
    assert!(!open.quorum_reached(&set));
}

#[test]
fn stale_voter_votes_are_excluded() {
    let clock = NullClock::new(0);
    let mut set = abc(&clock, 2);

    let add_dave = AddVoter::new(&set, addr(DAVE), None).unwrap();
    let mut pending =
        Proposal::open(&set, add_dave, None, &mut clock.context(addr(ALICE))).unwrap();
    pending.vote(&set, &mut clock.context(addr(CAROL))).unwrap();
    assert!(pending.quorum_reached(&set));

    let remove_alice = RemoveVoter::new(&set, addr(ALICE), None).unwrap();
    pass(&clock, &mut set, remove_alice, BOB, &[CAROL], |p, s, ctx| {
        RemoveVoter::execute(p, s, ctx).unwrap()
    });

    assert_eq!(pending.valid_votes(&set), 1);
    assert!(!pending.quorum_reached(&set));
    let rejected = AddVoter::execute(pending, &mut set, &mut clock.context(addr(CAROL))).unwrap_err();
    assert!(matches!(
        rejected.error(),
        GovernanceError::QuorumNotReached { valid_votes: 1, .. }
    ));
}

#[test]
fn add_then_remove_restores_voters() {
    let clock = NullClock::new(0);
    let mut set = abc(&clock, 2);
    let original = set.voters().clone();

    let add = AddVoter::new(&set, addr(DAVE), Some(3)).unwrap();
    pass(&clock, &mut set, add, ALICE, &[BOB], |p, s, ctx| {
        AddVoter::execute(p, s, ctx).unwrap()
    });
    assert_eq!(set.voter_count(), 4);
    assert_eq!(set.required_votes(), 3);

    let remove = RemoveVoter::new(&set, addr(DAVE), Some(2)).unwrap();
    pass(&clock, &mut set, remove, ALICE, &[BOB, DAVE], |p, s, ctx| {
        RemoveVoter::execute(p, s, ctx).unwrap()
    });
    assert_eq!(set.voters(), &original);
    assert_eq!(set.required_votes(), 2);
}

#[test]
fn read_accessors_have_no_side_effects() {
    let clock = NullClock::new(0);
    let set = abc(&clock, 2);
    let first = (set.voters().clone(), set.required_votes());
    for _ in 0..3 {
        assert_eq!((set.voters().clone(), set.required_votes()), first);
    }

    let registry: GovernanceRegistry<NullCapability> = GovernanceRegistry::new();
    let id = registry
        .create_instance(&addr(ALICE), NullCapability::new(), 1, [addr(ALICE)])
        .unwrap();
    assert_eq!(registry.voters(id).unwrap(), registry.voters(id).unwrap());
    assert_eq!(registry.required_votes(id).unwrap(), 1);
    assert_eq!(registry.required_votes(id).unwrap(), 1);
}

#[test]
fn denied_digest_keeps_proposal_and_frees_slot() {
    let registry: GovernanceRegistry<NullCapability> = GovernanceRegistry::new();
    let denied = Digest::new(vec![0xde, 0xad]);
    let instance = registry
        .create_instance(
            &addr(ALICE),
            NullCapability::new().deny(denied.clone()),
            1,
            [addr(ALICE), addr(BOB)],
        )
        .unwrap();
    let proposal = registry
        .open_proposal(
            &addr(ALICE),
            instance,
            MutationRequest::AuthorizeAction { digest: denied },
            None,
        )
        .unwrap();

    let err = registry.execute(&addr(BOB), proposal).unwrap_err();
    assert!(matches!(err, GovernanceError::Capability(_)));
    assert!(registry.proposal_exists(proposal));
    assert_eq!(registry.instance(instance).unwrap().action_in_flight, None);
}

#[test]
fn second_action_waits_for_commit() {
    let registry: GovernanceRegistry<NullCapability> = GovernanceRegistry::new();
    let instance = registry
        .create_instance(&addr(ALICE), NullCapability::new(), 1, [addr(ALICE)])
        .unwrap();
    let open = |bytes: Vec<u8>| {
        registry
            .open_proposal(
                &addr(ALICE),
                instance,
                MutationRequest::AuthorizeAction {
                    digest: Digest::new(bytes),
                },
                None,
            )
            .unwrap()
    };
    let first = open(vec![1]);
    let second = open(vec![2]);

    let ticket = match registry.execute(&addr(ALICE), first).unwrap() {
        Execution::Authorized(ticket) => ticket,
        other => panic!("expected a ticket, got {other:?}"),
    };
    assert_eq!(
        registry.execute(&addr(ALICE), second).unwrap_err(),
        GovernanceError::ActionInFlight
    );

    registry
        .commit(&addr(ALICE), instance, ticket.complete())
        .unwrap();
    assert!(matches!(
        registry.execute(&addr(ALICE), second).unwrap(),
        Execution::Authorized(_)
    ));
}

#[test]
fn replayed_receipt_is_refused_and_action_stays_in_flight() {
    let clock = NullClock::new(1_700_000_000);
    let mut set = abc(&clock, 1);
    let authorize = |set: &mut VoterSet<NullCapability>, bytes: Vec<u8>| {
        let payload = AuthorizeAction::new(set, Digest::new(bytes)).unwrap();
        let proposal = Proposal::open(set, payload, None, &mut clock.context(addr(ALICE))).unwrap();
        AuthorizeAction::execute(proposal, set, &mut clock.context(addr(ALICE)))
    };

    let first = authorize(&mut set, vec![1]).unwrap();
    set.commit(first.complete(), &mut clock.context(addr(ALICE)))
        .unwrap();
    let _second = authorize(&mut set, vec![2]).unwrap();

    let err = set
        .commit(NullReceipt::counterfeit(1), &mut clock.context(addr(ALICE)))
        .unwrap_err();
    assert!(matches!(err, GovernanceError::Capability(_)));
    assert_eq!(set.action_in_flight(), Some(&Digest::new(vec![2])));
    assert_eq!(set.capability().committed(), &[1]);

    let third = authorize(&mut set, vec![3]).unwrap_err();
    assert_eq!(*third.error(), GovernanceError::ActionInFlight);
}

#[test]
fn commit_from_non_voter_is_refused() {
    let registry: GovernanceRegistry<NullCapability> = GovernanceRegistry::new();
    let instance = registry
        .create_instance(&addr(ALICE), NullCapability::new(), 1, [addr(ALICE)])
        .unwrap();
    let proposal = registry
        .open_proposal(
            &addr(ALICE),
            instance,
            MutationRequest::AuthorizeAction {
                digest: upgrade_digest(),
            },
            None,
        )
        .unwrap();
    let ticket = match registry.execute(&addr(ALICE), proposal).unwrap() {
        Execution::Authorized(ticket) => ticket,
        other => panic!("expected a ticket, got {other:?}"),
    };

    assert_eq!(
        registry
            .commit(&addr(DAVE), instance, NullReceipt::counterfeit(ticket.sequence()))
            .unwrap_err(),
        GovernanceError::Unauthorized(addr(DAVE))
    );
    assert_eq!(
        registry.instance(instance).unwrap().action_in_flight,
        Some(upgrade_digest())
    );

    registry
        .commit(&addr(ALICE), instance, ticket.complete())
        .unwrap();
    assert_eq!(registry.instance(instance).unwrap().action_in_flight, None);
}

#[test]
fn replace_self_keeps_votes_from_old_address_invalid() {
    let registry: GovernanceRegistry<NullCapability> = GovernanceRegistry::new();
    let instance = registry
        .create_instance(
            &addr(ALICE),
            NullCapability::new(),
            2,
            [addr(ALICE), addr(BOB), addr(CAROL)],
        )
        .unwrap();
    let proposal = registry
        .open_proposal(
            &addr(ALICE),
            instance,
            MutationRequest::UpdateThreshold {
                new_required_votes: 3,
            },
            None,
        )
        .unwrap();
    registry.vote(&addr(BOB), proposal).unwrap();
    assert!(registry.quorum_reached(proposal).unwrap());

    registry.replace_self(&addr(BOB), instance, addr(DAVE)).unwrap();
    assert!(!registry.quorum_reached(proposal).unwrap());
    registry.vote(&addr(DAVE), proposal).unwrap();
    assert!(registry.quorum_reached(proposal).unwrap());
}

#[test]
fn registry_events_follow_operation_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut registry: GovernanceRegistry<NullCapability> = GovernanceRegistry::new();
    let sink = Arc::clone(&events);
    registry.subscribe(Box::new(move |event: &GovernanceEvent| {
        sink.lock().unwrap().push(event.clone());
    }));

    let instance = registry
        .create_instance(&addr(ALICE), NullCapability::new(), 2, [addr(ALICE), addr(BOB)])
        .unwrap();
    let proposal = registry
        .open_proposal(
            &addr(ALICE),
            instance,
            MutationRequest::RelinquishControl {
                new_owner: addr(DAVE),
            },
            None,
        )
        .unwrap();
    registry.vote(&addr(BOB), proposal).unwrap();
    let owned = match registry.execute(&addr(BOB), proposal).unwrap() {
        Execution::Relinquished(owned) => owned,
        other => panic!("expected relinquish, got {other:?}"),
    };
    assert_eq!(owned.owner, addr(DAVE));
    assert!(owned.into_inner().authorized().is_empty());

    let names: Vec<&str> = events.lock().unwrap().iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec![
            "instance_created",
            "proposal_opened",
            "vote_cast",
            "vote_cast",
            "quorum_reached",
            "proposal_executed",
            "quorum_relinquished",
        ]
    );
}
