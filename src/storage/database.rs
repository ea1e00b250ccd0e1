//! Saving a change set as bulk writes
//!
//! Every pending entry is resolved to the root document it is stored in.
//! Each root is written at most once per save, and roots are grouped by
//! physical collection with one bulk write per group. The async path issues
//! the group writes concurrently; groups already committed stay committed if
//! a later one fails or is cancelled.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metadata::DocumentSchema;
use crate::update::{ChangeSet, EntryId, UpdateError, WriteModel, WriteModelFactorySelector};

use super::error::{SaveError, SaveResult};
use super::store::DocumentStore;

/// Save behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Mark entries as saved once every group has been written
    pub accept_changes_on_success: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            accept_changes_on_success: true,
        }
    }
}

/// Writes change sets to a [`DocumentStore`]
#[derive(Debug)]
pub struct DocumentDatabase<S> {
    schema: Arc<DocumentSchema>,
    store: S,
    selector: WriteModelFactorySelector,
    options: DatabaseOptions,
}

impl<S: DocumentStore> DocumentDatabase<S> {
    pub fn new(schema: Arc<DocumentSchema>, store: S) -> Self {
        let selector = WriteModelFactorySelector::with_schema(schema.clone());
        Self {
            schema,
            store,
            selector,
            options: DatabaseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DatabaseOptions) -> Self {
        self.options = options;
        self
    }

    /// Share a selector, and with it the factory cache, across databases
    pub fn with_selector(mut self, selector: WriteModelFactorySelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn schema(&self) -> &Arc<DocumentSchema> {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn selector(&self) -> &WriteModelFactorySelector {
        &self.selector
    }

    /// Write all pending changes, returning the number of documents
    /// inserted, modified or deleted
    pub fn save_changes(&self, changes: &mut ChangeSet) -> SaveResult<u64> {
        let batches = self.prepare(changes)?;

        let mut total = 0;
        for (collection, requests) in batches {
            debug!(%collection, requests = requests.len(), "bulk write");
            let result = self.store.bulk_write(&collection, requests).map_err(|e| {
                warn!(%collection, error = %e, "bulk write failed");
                e
            })?;
            total += result.affected();
        }

        self.finish(changes, total);
        Ok(total)
    }

    /// Like [`DocumentDatabase::save_changes`], writing every collection
    /// group concurrently
    pub async fn save_changes_async(
        &self,
        changes: &mut ChangeSet,
        cancellation: &CancellationToken,
    ) -> SaveResult<u64> {
        let batches = self.prepare(changes)?;

        let writes = batches.into_iter().map(|(collection, requests)| async move {
            debug!(%collection, requests = requests.len(), "bulk write");
            let result = self
                .store
                .bulk_write_async(&collection, requests, cancellation)
                .await;
            if let Err(e) = &result {
                warn!(%collection, error = %e, "bulk write failed");
            }
            result
        });

        let mut total = 0;
        for result in join_all(writes).await {
            total += result?.affected();
        }

        self.finish(changes, total);
        Ok(total)
    }

    /// Build the write directives of every collection group
    fn prepare(&self, changes: &mut ChangeSet) -> SaveResult<BTreeMap<String, Vec<WriteModel>>> {
        let mut groups: BTreeMap<String, Vec<EntryId>> = BTreeMap::new();
        for root in self.root_entries(changes)? {
            let entry = changes.entry(root).ok_or(UpdateError::UnknownEntry(root))?;
            let collection = self.schema.collection_name(entry.entity_type())?;
            groups.entry(collection).or_default().push(root);
        }

        let mut batches = BTreeMap::new();
        for (collection, roots) in groups {
            let mut requests = Vec::with_capacity(roots.len());
            for root in roots {
                let entry = changes.entry(root).ok_or(UpdateError::UnknownEntry(root))?;
                let factory = self.selector.select(entry)?;
                requests.push(factory.create_write_model(changes, root)?);
            }
            batches.insert(collection, requests);
        }
        Ok(batches)
    }

    /// Distinct root documents of the pending entries
    pub fn root_entries(&self, changes: &ChangeSet) -> SaveResult<BTreeSet<EntryId>> {
        let mut roots = BTreeSet::new();
        for id in changes.pending() {
            roots.insert(self.root_entry(changes, id)?);
        }
        Ok(roots)
    }

    fn root_entry(&self, changes: &ChangeSet, id: EntryId) -> SaveResult<EntryId> {
        let mut current = id;
        loop {
            let entry = changes
                .entry(current)
                .ok_or(UpdateError::UnknownEntry(current))?;
            if self.schema.is_document_root(entry.entity_type()) {
                return Ok(current);
            }
            current = changes
                .owner_of(current)
                .ok_or_else(|| SaveError::OrphanedEntity(entry.entity_type().name.clone()))?;
        }
    }

    fn finish(&self, changes: &mut ChangeSet, total: u64) {
        debug!(affected = total, "changes saved");
        if self.options.accept_changes_on_success {
            changes.accept_all_changes();
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::ast::ClrType;
    use crate::metadata::{ConventionSet, EntityType, ModelBuilder, Navigation, Property};
    use crate::storage::MemoryDocumentStore;
    use crate::update::{Document, EntityState};

    fn create_test_schema() -> Arc<DocumentSchema> {
        let schema = ModelBuilder::new()
            .with_entity_type(
                EntityType::new("Family")
                    .with_property(Property::new("Id", ClrType::Int32))
                    .with_property(Property::new("LastName", ClrType::String))
                    .with_navigation(Navigation::reference("Address", "Address").owned()),
            )
            .with_entity_type(
                EntityType::new("Address").with_property(Property::new("City", ClrType::String)),
            )
            .with_entity_type(
                EntityType::new("Pet")
                    .with_property(Property::new("Id", ClrType::Int32))
                    .with_property(Property::new("Name", ClrType::String)),
            )
            .finalize(&ConventionSet::default())
            .unwrap();
        Arc::new(schema)
    }

    fn values(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {}", other),
        }
    }

    fn track(
        changes: &mut ChangeSet,
        schema: &DocumentSchema,
        name: &str,
        state: EntityState,
        v: Value,
    ) -> EntryId {
        changes.track(schema.entity_type(name).unwrap().clone(), state, values(v))
    }

    #[test]
    fn test_groups_by_collection() {
        let schema = create_test_schema();
        let database = DocumentDatabase::new(schema.clone(), MemoryDocumentStore::new());

        let mut changes = ChangeSet::new();
        track(
            &mut changes,
            &schema,
            "Family",
            EntityState::Added,
            json!({ "Id": 1, "LastName": "Andersen" }),
        );
        track(
            &mut changes,
            &schema,
            "Pet",
            EntityState::Added,
            json!({ "Id": 1, "Name": "Shadow" }),
        );
        track(
            &mut changes,
            &schema,
            "Pet",
            EntityState::Added,
            json!({ "Id": 2, "Name": "Tiger" }),
        );

        assert_eq!(database.save_changes(&mut changes).unwrap(), 3);
        assert_eq!(database.store().count("families"), 1);
        assert_eq!(database.store().count("pets"), 2);
        assert!(changes.pending().is_empty());
    }

    #[test]
    fn test_owned_change_rewrites_root() {
        let schema = create_test_schema();
        let database = DocumentDatabase::new(schema.clone(), MemoryDocumentStore::new());

        let mut changes = ChangeSet::new();
        let family = track(
            &mut changes,
            &schema,
            "Family",
            EntityState::Added,
            json!({ "Id": 7, "LastName": "Andersen" }),
        );
        let address = changes
            .track_owned(
                family,
                schema.entity_type("Address").unwrap().clone(),
                EntityState::Added,
                values(json!({ "City": "Seattle" })),
            )
            .unwrap();
        assert_eq!(database.save_changes(&mut changes).unwrap(), 1);

        changes
            .entry_mut(address)
            .unwrap()
            .set_current_value("City", json!("Redmond"));
        changes.entry_mut(address).unwrap().set_state(EntityState::Modified);
        assert_eq!(database.save_changes(&mut changes).unwrap(), 1);

        let stored = database.store().documents("families");
        assert_eq!(
            Value::Object(stored[0].clone()),
            json!({ "_id": 7, "LastName": "Andersen", "Address": { "City": "Redmond" } })
        );
    }

    #[test]
    fn test_options_keep_changes_pending() {
        let schema = create_test_schema();
        let database = DocumentDatabase::new(schema.clone(), MemoryDocumentStore::new())
            .with_options(DatabaseOptions {
                accept_changes_on_success: false,
            });

        let mut changes = ChangeSet::new();
        track(&mut changes, &schema, "Pet", EntityState::Added, json!({ "Id": 3, "Name": "Rex" }));
        database.save_changes(&mut changes).unwrap();
        assert_eq!(changes.pending().len(), 1);
    }
}
