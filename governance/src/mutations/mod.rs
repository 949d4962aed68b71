//! The governance mutations: payload types for [`Proposal`].
//!
//! Each mutation has the same two-phase shape:
//!
//! 1. `new(voter_set, ..)` validates its preconditions against the current
//!    voter set, so a proposal that could never be applied is never opened.
//! 2. `execute(proposal, voter_set, ctx)` confirms quorum, applies the
//!    effect and only then consumes the proposal. If anything fails the
//!    proposal comes back unchanged inside [`Rejected`].
//!
//! [`Mutation`] is the tagged union of all six payloads, used where
//! proposals of different kinds are stored together.

pub mod add_voter;
pub mod authorize;
pub mod relinquish;
pub mod remove_voter;
pub mod replace_voter;
pub mod update_threshold;

pub use add_voter::AddVoter;
pub use authorize::AuthorizeAction;
pub use relinquish::RelinquishControl;
pub use remove_voter::RemoveVoter;
pub use replace_voter::ReplaceVoter;
pub use update_threshold::UpdateThreshold;

use crate::context::TxContext;
use crate::error::GovernanceError;
use crate::proposal::{Proposal, Rejected};
use crate::voter_set::VoterSet;
use quorum_types::{Address, Digest};
use serde::{Deserialize, Serialize};

/// Check quorum, run `apply`, and consume the proposal only if `apply`
/// succeeded.
pub(crate) fn execute_with<T, C, R>(
    proposal: Proposal<T>,
    voter_set: &mut VoterSet<C>,
    ctx: &mut TxContext,
    apply: impl FnOnce(&T, &mut VoterSet<C>, &mut TxContext) -> Result<R, GovernanceError>,
) -> Result<R, Rejected<Proposal<T>>> {
    if let Err(error) = proposal.ensure_executable(voter_set, ctx) {
        return Err(Rejected::new(error, proposal));
    }
    match apply(proposal.payload(), voter_set, ctx) {
        Ok(output) => {
            proposal.consume(ctx);
            Ok(output)
        }
        Err(error) => Err(Rejected::new(error, proposal)),
    }
}

/// A validated payload of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    AddVoter(AddVoter),
    RemoveVoter(RemoveVoter),
    ReplaceVoter(ReplaceVoter),
    UpdateThreshold(UpdateThreshold),
    RelinquishControl(RelinquishControl),
    AuthorizeAction(AuthorizeAction),
}

impl Mutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddVoter(_) => "add_voter",
            Self::RemoveVoter(_) => "remove_voter",
            Self::ReplaceVoter(_) => "replace_voter",
            Self::UpdateThreshold(_) => "update_threshold",
            Self::RelinquishControl(_) => "relinquish_control",
            Self::AuthorizeAction(_) => "authorize_action",
        }
    }
}

macro_rules! impl_from_payload {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Mutation {
                fn from(payload: $variant) -> Self {
                    Self::$variant(payload)
                }
            }
        )*
    };
}

impl_from_payload!(
    AddVoter,
    RemoveVoter,
    ReplaceVoter,
    UpdateThreshold,
    RelinquishControl,
    AuthorizeAction
);

/// An unvalidated mutation, as submitted by a caller.
///
/// Turn it into a [`Mutation`] with [`MutationRequest::validate`], which
/// runs the payload's own constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationRequest {
    AddVoter {
        voter: Address,
        #[serde(default)]
        new_required_votes: Option<u64>,
    },
    RemoveVoter {
        voter: Address,
        #[serde(default)]
        new_required_votes: Option<u64>,
    },
    ReplaceVoter {
        old_voter: Address,
        new_voter: Address,
    },
    UpdateThreshold {
        new_required_votes: u64,
    },
    RelinquishControl {
        new_owner: Address,
    },
    AuthorizeAction {
        digest: Digest,
    },
}

impl MutationRequest {
    pub fn validate<C>(self, voter_set: &VoterSet<C>) -> Result<Mutation, GovernanceError> {
        let mutation = match self {
            Self::AddVoter {
                voter,
                new_required_votes,
            } => AddVoter::new(voter_set, voter, new_required_votes)?.into(),
            Self::RemoveVoter {
                voter,
                new_required_votes,
            } => RemoveVoter::new(voter_set, voter, new_required_votes)?.into(),
            Self::ReplaceVoter {
                old_voter,
                new_voter,
            } => ReplaceVoter::new(voter_set, old_voter, new_voter)?.into(),
            Self::UpdateThreshold { new_required_votes } => {
                UpdateThreshold::new(voter_set, new_required_votes)?.into()
            }
            Self::RelinquishControl { new_owner } => {
                RelinquishControl::new(voter_set, new_owner)?.into()
            }
            Self::AuthorizeAction { digest } => AuthorizeAction::new(voter_set, digest)?.into(),
        };
        Ok(mutation)
    }
}
