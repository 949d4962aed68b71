//! Package upgrade capability: the reference [`AuthorizationCapability`].
//!
//! Models an upgrade authority over one code package. Authorizing a digest
//! yields an [`UpgradeTicket`]; the external upgrade process turns the ticket
//! into an [`UpgradeReceipt`] naming the new package, and committing the
//! receipt moves the capability to that package.

use crate::capability::AuthorizationCapability;
use quorum_types::{Digest, ObjectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How far an upgrade may diverge from the current package. Variants are
/// ordered from most to least permissive.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UpgradePolicy {
    /// Any change that keeps existing public signatures.
    #[default]
    Compatible,
    /// Only additions.
    Additive,
    /// Only dependency changes.
    DependencyOnly,
    /// No further upgrades.
    Immutable,
}

impl fmt::Display for UpgradePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compatible => "compatible",
            Self::Additive => "additive",
            Self::DependencyOnly => "dependency_only",
            Self::Immutable => "immutable",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpgradeError {
    #[error("package is immutable")]
    Immutable,

    #[error("an upgrade ticket for this package is already outstanding")]
    TicketOutstanding,

    #[error("no upgrade ticket is outstanding")]
    NoTicket,

    #[error("receipt is for package {receipt}, capability controls {current}")]
    PackageMismatch { current: ObjectId, receipt: ObjectId },

    #[error("cannot relax upgrade policy from {current} to {requested}")]
    PolicyWeakening {
        current: UpgradePolicy,
        requested: UpgradePolicy,
    },
}

/// Permission to upgrade `package` to content matching `digest`.
#[derive(Debug, PartialEq, Eq)]
pub struct UpgradeTicket {
    package: ObjectId,
    policy: UpgradePolicy,
    digest: Digest,
}

impl UpgradeTicket {
    pub fn package(&self) -> ObjectId {
        self.package
    }

    pub fn policy(&self) -> UpgradePolicy {
        self.policy
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Finish the upgrade, publishing the new code as `new_package`.
    pub fn complete(self, new_package: ObjectId) -> UpgradeReceipt {
        UpgradeReceipt {
            package: self.package,
            new_package,
        }
    }
}

/// Proof that the upgrade of `package` produced `new_package`.
#[derive(Debug, PartialEq, Eq)]
pub struct UpgradeReceipt {
    package: ObjectId,
    new_package: ObjectId,
}

impl UpgradeReceipt {
    pub fn package(&self) -> ObjectId {
        self.package
    }

    pub fn new_package(&self) -> ObjectId {
        self.new_package
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCap {
    package: ObjectId,
    version: u64,
    policy: UpgradePolicy,
    ticket_outstanding: bool,
}

impl UpgradeCap {
    /// A capability over a freshly published package (version 1).
    pub fn new(package: ObjectId) -> Self {
        Self {
            package,
            version: 1,
            policy: UpgradePolicy::Compatible,
            ticket_outstanding: false,
        }
    }

    pub fn with_policy(mut self, policy: UpgradePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn package(&self) -> ObjectId {
        self.package
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn policy(&self) -> UpgradePolicy {
        self.policy
    }

    /// Tighten the upgrade policy. Relaxing it is refused.
    pub fn restrict(&mut self, policy: UpgradePolicy) -> Result<(), UpgradeError> {
        if policy < self.policy {
            return Err(UpgradeError::PolicyWeakening {
                current: self.policy,
                requested: policy,
            });
        }
        self.policy = policy;
        Ok(())
    }
}

impl AuthorizationCapability for UpgradeCap {
    type Ticket = UpgradeTicket;
    type Receipt = UpgradeReceipt;
    type Error = UpgradeError;

    fn authorize(&mut self, digest: &Digest) -> Result<UpgradeTicket, UpgradeError> {
        if self.policy == UpgradePolicy::Immutable {
            return Err(UpgradeError::Immutable);
        }
        if self.ticket_outstanding {
            return Err(UpgradeError::TicketOutstanding);
        }
        self.ticket_outstanding = true;
        Ok(UpgradeTicket {
            package: self.package,
            policy: self.policy,
            digest: digest.clone(),
        })
    }

    fn commit(&mut self, receipt: UpgradeReceipt) -> Result<(), UpgradeError> {
        if !self.ticket_outstanding {
            return Err(UpgradeError::NoTicket);
        }
        if receipt.package != self.package {
            return Err(UpgradeError::PackageMismatch {
                current: self.package,
                receipt: receipt.package,
            });
        }
        self.package = receipt.new_package;
        self.version += 1;
        self.ticket_outstanding = false;
        Ok(())
    }
}
