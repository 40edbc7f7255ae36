//! Unpublished operation store: a durable key-value sink for in-flight
//! operations that are not yet anchored.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};

use crate::operation::AnchoredOperation;

/// Store for operations that have passed parsing, validation and decoration
/// but are not yet anchored.
///
/// Implementations are keyed by unique suffix: a duplicate `put` for the same
/// suffix overwrites, and `delete` of a missing entry is not an error.
pub trait UnpublishedOperationStore: Send + Sync {
    /// Save an operation into the store.
    fn put(&self, op: &AnchoredOperation) -> Result<()>;

    /// Remove an operation from the store.
    fn delete(&self, op: &AnchoredOperation) -> Result<()>;
}

/// Store used when durability for in-flight operations is not required.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUnpublishedOperationStore;

impl UnpublishedOperationStore for NoopUnpublishedOperationStore {
    fn put(&self, _op: &AnchoredOperation) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _op: &AnchoredOperation) -> Result<()> {
        Ok(())
    }
}

/// In-memory reference implementation of the store contract.
#[derive(Debug, Default)]
pub struct MemoryUnpublishedOperationStore {
    operations: RwLock<HashMap<String, AnchoredOperation>>,
}

impl MemoryUnpublishedOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the staged operation for a suffix.
    pub fn get(&self, unique_suffix: &str) -> Option<AnchoredOperation> {
        self.operations.read().ok()?.get(unique_suffix).cloned()
    }

    pub fn len(&self) -> usize {
        self.operations.read().map(|ops| ops.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UnpublishedOperationStore for MemoryUnpublishedOperationStore {
    fn put(&self, op: &AnchoredOperation) -> Result<()> {
        self.operations
            .write()
            .map_err(|_| anyhow!("unpublished operation store lock poisoned"))?
            .insert(op.unique_suffix.clone(), op.clone());

        Ok(())
    }

    fn delete(&self, op: &AnchoredOperation) -> Result<()> {
        self.operations
            .write()
            .map_err(|_| anyhow!("unpublished operation store lock poisoned"))?
            .remove(&op.unique_suffix);

        Ok(())
    }
}
