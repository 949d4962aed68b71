//! Governance instance configuration with TOML file support.

use crate::error::CliError;
use quorum_crypto::derive_object_id;
use quorum_governance::{GovernanceError, UpgradeCap, UpgradePolicy};
use quorum_types::{Address, ObjectId};
use quorum_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

const PACKAGE_DOMAIN: &[u8] = b"quorum/package/v1";

/// Configuration for one governance instance guarding an upgrade capability.
///
/// Loaded from a TOML file via [`GovernanceConfig::from_toml_file`] or built
/// programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Initial voters. Duplicates collapse into one.
    pub voters: Vec<Address>,

    /// Votes needed to execute a proposal.
    pub required_votes: u64,

    #[serde(default)]
    pub upgrade_policy: UpgradePolicy,

    /// Package controlled by the upgrade capability.
    #[serde(default = "default_package")]
    pub package: ObjectId,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_package() -> ObjectId {
    derive_object_id(PACKAGE_DOMAIN, &Address::ZERO, 0, 0)
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl GovernanceConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, CliError> {
        toml::from_str(s).map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, CliError> {
        toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Check the threshold against the distinct voters, with the same rule
    /// instance creation applies.
    pub fn validate(&self) -> Result<(), CliError> {
        let distinct = self.distinct_voters().len() as u64;
        if self.required_votes == 0 || self.required_votes > distinct {
            return Err(GovernanceError::InvalidThreshold {
                required_votes: self.required_votes,
                voters: distinct,
            }
            .into());
        }
        Ok(())
    }

    pub fn distinct_voters(&self) -> BTreeSet<Address> {
        self.voters.iter().copied().collect()
    }

    /// The capability this config describes, before any upgrade.
    pub fn capability(&self) -> UpgradeCap {
        UpgradeCap::new(self.package).with_policy(self.upgrade_policy)
    }
}
