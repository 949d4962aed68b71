use quorum_types::{Address, ObjectId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    // ── Authorization ──────────────────────────────────────────────────
    #[error("{0} is not authorized for this operation")]
    Unauthorized(Address),

    // ── State ──────────────────────────────────────────────────────────
    #[error("{0} has already voted on this proposal")]
    AlreadyVoted(Address),

    #[error("no vote from {0} on this proposal")]
    NoVoteFound(Address),

    #[error("quorum not reached: {valid_votes} valid votes < {required_votes} required")]
    QuorumNotReached { valid_votes: u64, required_votes: u64 },

    #[error("proposal targets instance {expected}, not {actual}")]
    QuorumMismatch { expected: ObjectId, actual: ObjectId },

    #[error("proposal metadata has already been set")]
    MetadataAlreadySet,

    #[error("an authorized action is still in flight and must be committed first")]
    ActionInFlight,

    #[error("no authorized action is in flight")]
    NoActionInFlight,

    // ── Invariants ─────────────────────────────────────────────────────
    #[error("invalid threshold: {required_votes} required of {voters} voters")]
    InvalidThreshold { required_votes: u64, voters: u64 },

    #[error("required votes must be at least 1")]
    RequiredVotesZero,

    #[error("required votes {required_votes} exceeds the {voters} voters left after the change")]
    InvalidRequiredVotes { required_votes: u64, voters: u64 },

    #[error("{0} is already a voter")]
    VoterAlreadyExists(Address),

    #[error("{0} is not a voter")]
    InvalidVoter(Address),

    #[error("old voter {0} is not a voter")]
    InvalidOldVoter(Address),

    #[error("new voter {0} is already a voter")]
    InvalidNewVoter(Address),

    #[error("action digest must not be empty")]
    EmptyDigest,

    // ── Lifecycle ──────────────────────────────────────────────────────
    #[error("proposal {0} not found")]
    ProposalNotFound(ObjectId),

    #[error("governance instance {0} not found")]
    InstanceNotFound(ObjectId),

    #[error("proposal payload is not a {0} mutation")]
    PayloadMismatch(&'static str),

    // ── External ───────────────────────────────────────────────────────
    #[error("authorization capability refused: {0}")]
    Capability(String),
}
