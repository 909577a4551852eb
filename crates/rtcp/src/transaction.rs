// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outstanding-transaction bookkeeping.
//!
//! Every request that expects a response carries a fresh transaction id
//! which is parked in the registry until the correlated response arrives.
//! A response whose id is not in the registry is an orphan and is dropped
//! by the dispatcher.
//!
//! The registry is shared across all channels of one message manager and
//! is safe under concurrent callers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// 64-bit identifier correlating a request with its response.
pub type TransactionId = u64;

/// Set of transaction ids awaiting responses.
#[derive(Debug)]
pub struct TransactionRegistry {
    /// Next id to hand out. Monotonically increasing; wraparound is
    /// unreachable within one process lifetime.
    next_id: AtomicU64,

    outstanding: Mutex<HashSet<TransactionId>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            outstanding: Mutex::new(HashSet::new()),
        }
    }

    /// Allocate a fresh unique id.
    pub fn next(&self) -> TransactionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert an outstanding id. Idempotent on collision.
    pub fn add(&self, id: TransactionId) {
        self.outstanding.lock().insert(id);
    }

    /// Membership test.
    pub fn find(&self, id: TransactionId) -> bool {
        self.outstanding.lock().contains(&id)
    }

    /// Discard an id if present; silently a no-op otherwise.
    pub fn remove(&self, id: TransactionId) {
        self.outstanding.lock().remove(&id);
    }

    /// Number of transactions awaiting responses.
    pub fn outstanding_len(&self) -> usize {
        self.outstanding.lock().len()
    }
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
