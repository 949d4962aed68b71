//! Proposal scripts: a JSON list of governance steps replayed against a
//! fresh instance.
//!
//! ```json
//! [
//!   { "step": "open", "label": "upgrade", "sender": "0x01",
//!     "mutation": { "kind": "authorize_action", "digest": "0x0123456789" } },
//!   { "step": "vote", "label": "upgrade", "sender": "0x02" },
//!   { "step": "execute", "label": "upgrade", "sender": "0x01" },
//!   { "step": "commit", "sender": "0x01" }
//! ]
//! ```

use crate::config::GovernanceConfig;
use crate::error::CliError;
use quorum_crypto::derive_object_id;
use quorum_governance::{
    Execution, GovernanceError, GovernanceEvent, GovernanceRegistry, InstanceView, Metadata,
    MutationRequest, UpgradeCap, UpgradeError, UpgradePolicy, UpgradeTicket,
};
use quorum_types::{Address, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

const UPGRADED_PACKAGE_DOMAIN: &[u8] = b"quorum/package/upgraded/v1";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Open {
        label: String,
        sender: Address,
        mutation: MutationRequest,
        #[serde(default)]
        metadata: Option<Metadata>,
    },
    Vote {
        label: String,
        sender: Address,
    },
    RemoveVote {
        label: String,
        sender: Address,
    },
    SetMetadata {
        label: String,
        sender: Address,
        metadata: Metadata,
    },
    Delete {
        label: String,
        sender: Address,
    },
    Execute {
        label: String,
        sender: Address,
    },
    /// Complete the outstanding upgrade and commit its receipt.
    Commit {
        sender: Address,
    },
    ReplaceSelf {
        sender: Address,
        new_voter: Address,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Vote { .. } => "vote",
            Self::RemoveVote { .. } => "remove_vote",
            Self::SetMetadata { .. } => "set_metadata",
            Self::Delete { .. } => "delete",
            Self::Execute { .. } => "execute",
            Self::Commit { .. } => "commit",
            Self::ReplaceSelf { .. } => "replace_self",
        }
    }

    pub fn sender(&self) -> &Address {
        match self {
            Self::Open { sender, .. }
            | Self::Vote { sender, .. }
            | Self::RemoveVote { sender, .. }
            | Self::SetMetadata { sender, .. }
            | Self::Delete { sender, .. }
            | Self::Execute { sender, .. }
            | Self::Commit { sender }
            | Self::ReplaceSelf { sender, .. } => sender,
        }
    }
}

pub fn parse_script(json: &str) -> Result<Vec<Step>, CliError> {
    serde_json::from_str(json).map_err(|e| CliError::Script(e.to_string()))
}

pub fn load_script(path: &Path) -> Result<Vec<Step>, CliError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::Script(format!("{}: {e}", path.display())))?;
    parse_script(&content)
}

/// Result of one replayed step.
#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub step: &'static str,
    pub sender: Address,
    /// `None` if the step succeeded.
    pub error: Option<String>,
    pub detail: Option<String>,
    pub events: Vec<GovernanceEvent>,
}

impl StepReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Where the capability ended up after the replay.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FinalState {
    Governed {
        instance: InstanceView,
        package: ObjectId,
        version: u64,
        policy: UpgradePolicy,
    },
    Relinquished {
        owner: Address,
        package: ObjectId,
        version: u64,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct ReplayReport {
    pub instance_id: ObjectId,
    pub steps: Vec<StepReport>,
    pub final_state: FinalState,
}

impl ReplayReport {
    pub fn rejected(&self) -> usize {
        self.steps.iter().filter(|s| !s.succeeded()).count()
    }
}

/// Drives one governance instance through a script.
pub struct Replay {
    registry: GovernanceRegistry<UpgradeCap>,
    instance_id: ObjectId,
    labels: HashMap<String, ObjectId>,
    ticket: Option<UpgradeTicket>,
    relinquished: Option<(Address, UpgradeCap)>,
    sink: Arc<Mutex<Vec<GovernanceEvent>>>,
}

impl Replay {
    /// Create the configured instance in a fresh registry. The config's
    /// first voter is recorded as the publisher.
    pub fn new(config: &GovernanceConfig) -> Result<Self, CliError> {
        config.validate()?;
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut registry = GovernanceRegistry::new();
        let events = Arc::clone(&sink);
        registry.subscribe(Box::new(move |event: &GovernanceEvent| {
            events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }));

        let publisher = config.voters.first().copied().unwrap_or(Address::ZERO);
        let instance_id = registry.create_instance(
            &publisher,
            config.capability(),
            config.required_votes,
            config.voters.iter().copied(),
        )?;

        Ok(Self {
            registry,
            instance_id,
            labels: HashMap::new(),
            ticket: None,
            relinquished: None,
            sink,
        })
    }

    /// Events emitted since the last call.
    pub fn drain_events(&self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut *self.sink.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run every step. Rejected steps are recorded; with `fail_fast` the
    /// replay stops after the first one.
    pub fn run(mut self, steps: &[Step], fail_fast: bool) -> Result<ReplayReport, CliError> {
        let mut reports = Vec::with_capacity(steps.len());
        // Instance creation events belong to no step.
        self.drain_events();

        for (index, step) in steps.iter().enumerate() {
            let outcome = self.apply(step);
            let report = StepReport {
                index,
                step: step.name(),
                sender: *step.sender(),
                error: outcome.as_ref().err().map(ToString::to_string),
                detail: outcome.unwrap_or_default(),
                events: self.drain_events(),
            };
            let stop = fail_fast && !report.succeeded();
            match &report.error {
                None => tracing::debug!(index, step = report.step, "step applied"),
                Some(error) => tracing::warn!(index, step = report.step, %error, "step rejected"),
            }
            reports.push(report);
            if stop {
                break;
            }
        }

        Ok(ReplayReport {
            instance_id: self.instance_id,
            steps: reports,
            final_state: self.final_state()?,
        })
    }

    /// Apply one step, returning a short description of anything it
    /// produced.
    pub fn apply(&mut self, step: &Step) -> Result<Option<String>, CliError> {
        match step {
            Step::Open {
                label,
                sender,
                mutation,
                metadata,
            } => {
                if self.labels.contains_key(label) {
                    return Err(CliError::DuplicateLabel(label.clone()));
                }
                let id = self.registry.open_proposal(
                    sender,
                    self.instance_id,
                    mutation.clone(),
                    metadata.clone(),
                )?;
                self.labels.insert(label.clone(), id);
                Ok(Some(format!("proposal {id}")))
            }
            Step::Vote { label, sender } => {
                self.registry.vote(sender, self.label(label)?)?;
                Ok(None)
            }
            Step::RemoveVote { label, sender } => {
                self.registry.remove_vote(sender, self.label(label)?)?;
                Ok(None)
            }
            Step::SetMetadata {
                label,
                sender,
                metadata,
            } => {
                self.registry
                    .set_metadata(sender, self.label(label)?, metadata.clone())?;
                Ok(None)
            }
            Step::Delete { label, sender } => {
                self.registry.delete_proposal(sender, self.label(label)?)?;
                Ok(None)
            }
            Step::Execute { label, sender } => {
                match self.registry.execute(sender, self.label(label)?)? {
                    Execution::Applied => Ok(None),
                    Execution::Authorized(ticket) => {
                        let detail = format!("ticket for digest {}", ticket.digest());
                        self.ticket = Some(ticket);
                        Ok(Some(detail))
                    }
                    Execution::Relinquished(owned) => {
                        let detail = format!("capability released to {}", owned.owner);
                        self.relinquished = Some((owned.owner, owned.capability));
                        Ok(Some(detail))
                    }
                }
            }
            Step::Commit { sender } => self.commit(sender),
            Step::ReplaceSelf { sender, new_voter } => {
                self.registry
                    .replace_self(sender, self.instance_id, *new_voter)?;
                Ok(None)
            }
        }
    }

    /// Commit the held ticket. The ticket is kept unless every check the
    /// registry makes on the receipt has passed.
    fn commit(&mut self, sender: &Address) -> Result<Option<String>, CliError> {
        if self.relinquished.is_some() {
            return Err(CliError::Relinquished);
        }
        let ticket = self.ticket.as_ref().ok_or(CliError::NoTicket)?;
        let instance = self.registry.instance(self.instance_id)?;
        if !instance.voters.contains(sender) {
            return Err(GovernanceError::Unauthorized(*sender).into());
        }
        if instance.action_in_flight.as_ref() != Some(ticket.digest()) {
            return Err(GovernanceError::NoActionInFlight.into());
        }
        let (package, version) = self
            .registry
            .inspect_capability(self.instance_id, |cap| (cap.package(), cap.version()))?;
        if ticket.package() != package {
            return Err(UpgradeError::PackageMismatch {
                current: package,
                receipt: ticket.package(),
            }
            .into());
        }

        let new_package = derive_object_id(UPGRADED_PACKAGE_DOMAIN, sender, version, 0);
        let ticket = self.ticket.take().ok_or(CliError::NoTicket)?;
        self.registry
            .commit(sender, self.instance_id, ticket.complete(new_package))?;
        Ok(Some(format!("package upgraded to {new_package}")))
    }

    fn label(&self, label: &str) -> Result<ObjectId, CliError> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| CliError::UnknownLabel(label.to_string()))
    }

    fn final_state(&self) -> Result<FinalState, CliError> {
        if let Some((owner, cap)) = &self.relinquished {
            return Ok(FinalState::Relinquished {
                owner: *owner,
                package: cap.package(),
                version: cap.version(),
            });
        }
        let instance = self.registry.instance(self.instance_id)?;
        let (package, version, policy) = self
            .registry
            .inspect_capability(self.instance_id, |cap| {
                (cap.package(), cap.version(), cap.policy())
            })?;
        Ok(FinalState::Governed {
            instance,
            package,
            version,
            policy,
        })
    }
}
