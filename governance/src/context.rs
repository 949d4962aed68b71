//! Per-transaction execution context.
//!
//! Every state-changing operation runs inside a [`TxContext`]: it names the
//! caller, hands out fresh object ids and collects the events the operation
//! emits. Contexts are cheap; create one per logical transaction.

use crate::event::GovernanceEvent;
use quorum_crypto::derive_object_id;
use quorum_types::{Address, ObjectId, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};

/// Domain tag mixed into every derived object id.
const OBJECT_ID_DOMAIN: &[u8] = b"quorum/object/v1";

/// Process-wide transaction sequence. Starts at 1 so that sequence 0 is
/// never handed out.
static NEXT_TX_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct TxContext {
    sender: Address,
    timestamp: Timestamp,
    tx_seq: u64,
    ids_created: u64,
    events: Vec<GovernanceEvent>,
}

impl TxContext {
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            timestamp: Timestamp::now(),
            tx_seq: NEXT_TX_SEQ.fetch_add(1, Ordering::Relaxed),
            ids_created: 0,
            events: Vec::new(),
        }
    }

    /// Override the context time (replays and tests).
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Derive a new object id, unique across all contexts in this process.
    pub fn fresh_id(&mut self) -> ObjectId {
        let id = derive_object_id(OBJECT_ID_DOMAIN, &self.sender, self.tx_seq, self.ids_created);
        self.ids_created += 1;
        id
    }

    pub fn emit(&mut self, event: GovernanceEvent) {
        self.events.push(event);
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> &[GovernanceEvent] {
        &self.events
    }

    /// Drain the collected events.
    pub fn take_events(&mut self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut self.events)
    }
}
