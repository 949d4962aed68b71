//! Nullable clock: deterministic transaction timestamps.

use quorum_governance::TxContext;
use quorum_types::{Address, Timestamp};
use std::cell::Cell;

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to.
pub struct NullClock {
    current: Cell<u64>,
}

impl NullClock {
    pub fn new(initial_secs: u64) -> Self {
        Self {
            current: Cell::new(initial_secs),
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.current.get())
    }

    /// Advance time by a number of seconds.
    pub fn advance(&self, secs: u64) {
        self.current.set(self.current.get().saturating_add(secs));
    }

    /// A transaction context from `sender`, stamped with the current time.
    pub fn context(&self, sender: Address) -> TxContext {
        TxContext::new(sender).with_timestamp(self.now())
    }
}
