//! In-process document store

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::update::{Document, WriteModel};

use super::error::{StoreError, StoreResult};
use super::store::{BulkWriteResult, DocumentStore};

/// Collections of documents held in memory.
///
/// Directives in one bulk write are applied in order under a single lock;
/// the first failure stops the batch, keeping what was already applied.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a collection's documents in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .get(collection)
            .map_or(0, Vec::len)
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, v)| document.get(k).unwrap_or(&Value::Null) == v)
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn bulk_write(
        &self,
        collection: &str,
        requests: Vec<WriteModel>,
    ) -> StoreResult<BulkWriteResult> {
        let mut collections = self.collections.lock();
        let documents = collections.entry(collection.to_string()).or_default();
        let mut result = BulkWriteResult::default();

        for request in requests {
            match request {
                WriteModel::InsertOne { document } => {
                    if let Some(id) = document.get("_id") {
                        if documents.iter().any(|d| d.get("_id") == Some(id)) {
                            return Err(StoreError::BulkWrite {
                                collection: collection.to_string(),
                                message: format!("duplicate key {}", id),
                            });
                        }
                    }
                    documents.push(document);
                    result.inserted_count += 1;
                }
                WriteModel::ReplaceOne {
                    filter,
                    replacement,
                } => {
                    if let Some(existing) = documents.iter_mut().find(|d| matches(d, &filter)) {
                        result.matched_count += 1;
                        if *existing != replacement {
                            *existing = replacement;
                            result.modified_count += 1;
                        }
                    }
                }
                WriteModel::DeleteOne { filter } => {
                    if let Some(index) = documents.iter().position(|d| matches(d, &filter)) {
                        documents.remove(index);
                        result.deleted_count += 1;
                    }
                }
            }
        }
        Ok(result)
    }
}
