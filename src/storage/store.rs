//! The document store seam

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::update::WriteModel;

use super::error::{StoreError, StoreResult};

/// Counts reported by one bulk write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BulkWriteResult {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
}

impl BulkWriteResult {
    /// Documents inserted, modified or deleted
    pub fn affected(&self) -> u64 {
        self.inserted_count + self.modified_count + self.deleted_count
    }
}

/// A store that applies write directives to named collections
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Apply all directives to one collection in a single call
    fn bulk_write(
        &self,
        collection: &str,
        requests: Vec<WriteModel>,
    ) -> StoreResult<BulkWriteResult>;

    /// Asynchronous bulk write observing `cancellation`
    async fn bulk_write_async(
        &self,
        collection: &str,
        requests: Vec<WriteModel>,
        cancellation: &CancellationToken,
    ) -> StoreResult<BulkWriteResult> {
        if cancellation.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.bulk_write(collection, requests)
    }
}
