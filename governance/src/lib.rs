//! Quorum governance over a single privileged capability.
//!
//! A [`VoterSet`] owns a capability and a set of voter addresses with a
//! required vote threshold. Any change to the set, and any use of the
//! capability, goes through a [`Proposal`] that must collect votes from
//! current voters before it can be executed.
//!
//! Quorum is never cached: it is recomputed against the live membership
//! every time it is checked, so votes from removed voters stop counting
//! the moment they are removed.
//!
//! [`GovernanceRegistry`] wraps the core in an id-keyed, lock-guarded
//! store for callers that address objects by id.

pub mod capability;
pub mod context;
pub mod error;
pub mod event;
pub mod mutations;
pub mod proposal;
pub mod registry;
pub mod upgrade;
pub mod voter_set;

pub use capability::{AuthorizationCapability, OwnedCapability};
pub use context::TxContext;
pub use error::GovernanceError;
pub use event::{EventBus, GovernanceEvent};
pub use mutations::{
    AddVoter, AuthorizeAction, Mutation, MutationRequest, RelinquishControl, RemoveVoter,
    ReplaceVoter, UpdateThreshold,
};
pub use proposal::{Metadata, Proposal, Rejected};
pub use registry::{Execution, GovernanceRegistry, InstanceView, ProposalView};
pub use upgrade::{UpgradeCap, UpgradeError, UpgradePolicy, UpgradeReceipt, UpgradeTicket};
pub use voter_set::VoterSet;
