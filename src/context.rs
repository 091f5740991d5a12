// SPDX-License-Identifier: MIT OR Apache-2.0

//! State scoped to one unit of work.
//!
//! The hosting runtime constructs a [`TransactionContext`] per transaction,
//! hands it `&mut` to every behaviour invocation within that transaction and
//! drops it at transaction end. Nothing here is process-global.

use std::collections::{HashMap, HashSet};

use crate::node::NodeId;

/// Mutable markers living exactly as long as the enclosing transaction.
///
/// Sets are created on first use and discarded with the context; there is no
/// explicit teardown and no leakage across transactions.
#[derive(Debug, Default)]
pub struct TransactionContext {
    sets: HashMap<&'static str, HashSet<NodeId>>,
}

impl TransactionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the working set registered under `key`.
    pub fn working_set(&mut self, key: &'static str) -> &mut HashSet<NodeId> {
        self.sets.entry(key).or_default()
    }
}
