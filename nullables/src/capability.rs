//! Nullable capability: records every authorization and commit.

use quorum_governance::AuthorizationCapability;
use quorum_types::Digest;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NullCapabilityError {
    #[error("digest {0} rejected by capability")]
    Rejected(Digest),
    #[error("no ticket issued with sequence {0}")]
    UnknownReceipt(u64),
    #[error("receipt for ticket {0} was already committed")]
    AlreadyCommitted(u64),
    #[error("receipt for ticket {sequence} is stale, ticket {latest} is outstanding")]
    StaleReceipt { sequence: u64, latest: u64 },
}

/// Issued by [`NullCapability::authorize`]. Tickets are numbered from 1.
#[derive(Debug, PartialEq, Eq)]
pub struct NullTicket {
    sequence: u64,
    digest: Digest,
}

impl NullTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// The receipt a successful action would produce. Consumes the ticket,
    /// so one ticket yields exactly one receipt.
    pub fn complete(self) -> NullReceipt {
        NullReceipt {
            sequence: self.sequence,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct NullReceipt {
    sequence: u64,
}

impl NullReceipt {
    /// A receipt for ticket `sequence` that no ticket produced, for
    /// exercising the refusal paths of `commit`.
    pub fn counterfeit(sequence: u64) -> Self {
        Self { sequence }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// A capability that authorizes any digest not on its deny list.
///
/// Only the latest ticket may be committed, and only once.
#[derive(Debug, Default)]
pub struct NullCapability {
    denied: BTreeSet<Digest>,
    authorized: Vec<Digest>,
    committed: Vec<u64>,
}

impl NullCapability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `authorize` fail for `digest`.
    pub fn deny(mut self, digest: Digest) -> Self {
        self.denied.insert(digest);
        self
    }

    /// Digests authorized so far, in order.
    pub fn authorized(&self) -> &[Digest] {
        &self.authorized
    }

    /// Ticket sequences committed so far, in order.
    pub fn committed(&self) -> &[u64] {
        &self.committed
    }
}

impl AuthorizationCapability for NullCapability {
    type Ticket = NullTicket;
    type Receipt = NullReceipt;
    type Error = NullCapabilityError;

    fn authorize(&mut self, digest: &Digest) -> Result<NullTicket, NullCapabilityError> {
        if self.denied.contains(digest) {
            return Err(NullCapabilityError::Rejected(digest.clone()));
        }
        self.authorized.push(digest.clone());
        Ok(NullTicket {
            sequence: self.authorized.len() as u64,
            digest: digest.clone(),
        })
    }

    fn commit(&mut self, receipt: NullReceipt) -> Result<(), NullCapabilityError> {
        let sequence = receipt.sequence;
        let latest = self.authorized.len() as u64;
        if sequence == 0 || sequence > latest {
            return Err(NullCapabilityError::UnknownReceipt(sequence));
        }
        if self.committed.contains(&sequence) {
            return Err(NullCapabilityError::AlreadyCommitted(sequence));
        }
        if sequence != latest {
            return Err(NullCapabilityError::StaleReceipt { sequence, latest });
        }
        self.committed.push(sequence);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_records_and_numbers_tickets() {
        let mut cap = NullCapability::new();
        let first = cap.authorize(&Digest::new(vec![1])).unwrap();
        let second = cap.authorize(&Digest::new(vec![2])).unwrap();
        assert_eq!(first.sequence(), 1);
        assert_eq!(second.sequence(), 2);
        assert_eq!(cap.authorized(), &[Digest::new(vec![1]), Digest::new(vec![2])]);
    }

    #[test]
    fn test_denied_digest_fails() {
        let mut cap = NullCapability::new().deny(Digest::new(vec![0xde, 0xad]));
        assert_eq!(
            cap.authorize(&Digest::new(vec![0xde, 0xad])).unwrap_err(),
            NullCapabilityError::Rejected(Digest::new(vec![0xde, 0xad]))
        );
        assert!(cap.authorized().is_empty());
    }

    #[test]
    fn test_commit_requires_issued_ticket() {
        let mut cap = NullCapability::new();
        assert_eq!(
            cap.commit(NullReceipt { sequence: 1 }).unwrap_err(),
            NullCapabilityError::UnknownReceipt(1)
        );
        let ticket = cap.authorize(&Digest::new(vec![9])).unwrap();
        cap.commit(ticket.complete()).unwrap();
        assert_eq!(cap.committed(), &[1]);
    }

    #[test]
    fn test_receipt_commits_only_once() {
        let mut cap = NullCapability::new();
        let ticket = cap.authorize(&Digest::new(vec![1])).unwrap();
        cap.commit(ticket.complete()).unwrap();
        assert_eq!(
            cap.commit(NullReceipt::counterfeit(1)).unwrap_err(),
            NullCapabilityError::AlreadyCommitted(1)
        );
        assert_eq!(cap.committed(), &[1]);
    }

    #[test]
    fn test_only_latest_ticket_commits() {
        let mut cap = NullCapability::new();
        let first = cap.authorize(&Digest::new(vec![1])).unwrap();
        let second = cap.authorize(&Digest::new(vec![2])).unwrap();
        assert_eq!(
            cap.commit(first.complete()).unwrap_err(),
            NullCapabilityError::StaleReceipt {
                sequence: 1,
                latest: 2
            }
        );
        cap.commit(second.complete()).unwrap();
        assert_eq!(cap.committed(), &[2]);
    }
}
