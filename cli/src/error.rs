use quorum_governance::{GovernanceError, UpgradeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("unknown proposal label '{0}'")]
    UnknownLabel(String),

    #[error("proposal label '{0}' is already in use")]
    DuplicateLabel(String),

    #[error("no authorized action is waiting to be committed")]
    NoTicket,

    #[error("governance instance was relinquished")]
    Relinquished,

    #[error("governance error: {0}")]
    Governance(#[from] GovernanceError),

    #[error("upgrade error: {0}")]
    Upgrade(#[from] UpgradeError),
}
