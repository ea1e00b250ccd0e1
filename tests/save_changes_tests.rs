//! Saving change sets through DocumentDatabase:
//! 1. Track roots and owned entities
//! 2. Save synchronously or asynchronously
//! 3. Inspect the directives sent and the documents stored

use std::sync::Arc;

use async_trait::async_trait;
use docmapper::ast::ClrType;
use docmapper::metadata::{
    ConventionSet, DocumentSchema, EntityType, ModelBuilder, Navigation, Property,
};
use docmapper::storage::{
    BulkWriteResult, DocumentDatabase, DocumentStore, MemoryDocumentStore, SaveError, StoreError,
    StoreResult,
};
use docmapper::update::{ChangeSet, Document, EntityState, EntryId, WriteModel, WriteModelKind};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

fn create_test_schema() -> Arc<DocumentSchema> {
    let schema = ModelBuilder::new()
        .with_entity_type(
            EntityType::new("Family")
                .with_property(Property::new("Id", ClrType::Int32))
                .with_property(Property::new("LastName", ClrType::String))
                .with_navigation(Navigation::reference("Address", "Address").owned())
                .with_navigation(Navigation::collection("Children", "Child").owned()),
        )
        .with_entity_type(
            EntityType::new("Address").with_property(Property::new("City", ClrType::String)),
        )
        .with_entity_type(
            EntityType::new("Child")
                .with_property(Property::new("FirstName", ClrType::String))
                .with_property(Property::new("Grade", ClrType::Int32)),
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

fn track_owned(
    changes: &mut ChangeSet,
    schema: &DocumentSchema,
    owner: EntryId,
    name: &str,
    v: Value,
) -> EntryId {
    changes
        .track_owned(
            owner,
            schema.entity_type(name).unwrap().clone(),
            EntityState::Added,
            values(v),
        )
        .unwrap()
}

/// Store that records every directive before delegating to memory
#[derive(Debug, Default)]
struct RecordingStore {
    inner: MemoryDocumentStore,
    writes: Mutex<Vec<(String, Vec<WriteModelKind>)>>,
}

impl RecordingStore {
    fn writes(&self) -> Vec<(String, Vec<WriteModelKind>)> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    fn bulk_write(
        &self,
        collection: &str,
        requests: Vec<WriteModel>,
    ) -> StoreResult<BulkWriteResult> {
        let kinds = requests.iter().map(WriteModel::kind).collect();
        self.writes.lock().push((collection.to_string(), kinds));
        self.inner.bulk_write(collection, requests)
    }
}

/// A family with two children, saved and accepted
fn saved_family(
    database: &DocumentDatabase<RecordingStore>,
) -> (ChangeSet, EntryId, EntryId, EntryId) {
    let schema = database.schema().clone();
    let mut changes = ChangeSet::new();
    let family = track(
        &mut changes,
        &schema,
        "Family",
        EntityState::Added,
        json!({ "Id": 1, "LastName": "Wakefield" }),
    );
    let first = track_owned(
        &mut changes,
        &schema,
        family,
        "Child",
        json!({ "FirstName": "Jesse", "Grade": 1 }),
    );
    let second = track_owned(
        &mut changes,
        &schema,
        family,
        "Child",
        json!({ "FirstName": "Lisa", "Grade": 8 }),
    );
    assert_eq!(database.save_changes(&mut changes).unwrap(), 1);
    (changes, family, first, second)
}

// =============================================================================
// Root resolution
// =============================================================================

#[tokio::test]
async fn test_owned_changes_produce_one_directive() {
    let schema = create_test_schema();
    let database = DocumentDatabase::new(schema, RecordingStore::default());
    let (mut changes, _, first, second) = saved_family(&database);

    for (id, grade) in [(first, 2), (second, 9)] {
        let entry = changes.entry_mut(id).unwrap();
        entry.set_current_value("Grade", json!(grade));
        entry.set_state(EntityState::Modified);
    }

    let count = database
        .save_changes_async(&mut changes, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(count, 1);

    let writes = database.store().writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1], ("families".to_string(), vec![WriteModelKind::Replace]));

    let stored = database.store().inner.documents("families");
    assert_eq!(
        Value::Object(stored[0].clone()),
        json!({
            "_id": 1,
            "LastName": "Wakefield",
            "Children": [
                { "FirstName": "Jesse", "Grade": 2 },
                { "FirstName": "Lisa", "Grade": 9 }
            ]
        })
    );
    assert!(changes.pending().is_empty());
}

#[test]
fn test_orphaned_owned_entity() {
    let schema = create_test_schema();
    let database = DocumentDatabase::new(schema.clone(), MemoryDocumentStore::new());

    let mut changes = ChangeSet::new();
    track(&mut changes, &schema, "Address", EntityState::Added, json!({ "City": "Seattle" }));

    let err = database.save_changes(&mut changes).unwrap_err();
    assert_eq!(err, SaveError::OrphanedEntity("Address".to_string()));
    assert_eq!(err.to_string(), "Encountered orphaned document of type Address.");
    assert_eq!(database.store().count("families"), 0);
}

#[test]
fn test_root_entries_are_distinct() {
    let schema = create_test_schema();
    let database = DocumentDatabase::new(schema.clone(), MemoryDocumentStore::new());

    let mut changes = ChangeSet::new();
    let family = track(
        &mut changes,
        &schema,
        "Family",
        EntityState::Added,
        json!({ "Id": 4, "LastName": "Miller" }),
    );
    track_owned(&mut changes, &schema, family, "Address", json!({ "City": "NY" }));
    track_owned(&mut changes, &schema, family, "Child", json!({ "FirstName": "Max", "Grade": 3 }));
    let pet = track(
        &mut changes,
        &schema,
        "Pet",
        EntityState::Added,
        json!({ "Id": 1, "Name": "Shadow" }),
    );

    let roots: Vec<EntryId> = database.root_entries(&changes).unwrap().into_iter().collect();
    assert_eq!(roots, vec![family, pet]);
}

// =============================================================================
// Directives per state
// =============================================================================

#[test]
fn test_delete_removes_document() {
    let schema = create_test_schema();
    let database = DocumentDatabase::new(schema, RecordingStore::default());
    let (mut changes, family, _, _) = saved_family(&database);

    changes.entry_mut(family).unwrap().set_state(EntityState::Deleted);
    assert_eq!(database.save_changes(&mut changes).unwrap(), 1);
    assert_eq!(database.store().inner.count("families"), 0);
    assert_eq!(changes.entry(family).unwrap().state(), EntityState::Detached);
}

#[test]
fn test_one_bulk_write_per_collection() {
    let schema = create_test_schema();
    let database = DocumentDatabase::new(schema.clone(), RecordingStore::default());

    let mut changes = ChangeSet::new();
    track(
        &mut changes,
        &schema,
        "Family",
        EntityState::Added,
        json!({ "Id": 1, "LastName": "Andersen" }),
    );
    track(&mut changes, &schema, "Pet", EntityState::Added, json!({ "Id": 1, "Name": "Shadow" }));
    track(&mut changes, &schema, "Pet", EntityState::Added, json!({ "Id": 2, "Name": "Tiger" }));

    assert_eq!(database.save_changes(&mut changes).unwrap(), 3);
    assert_eq!(
        database.store().writes(),
        vec![
            ("families".to_string(), vec![WriteModelKind::Insert]),
            ("pets".to_string(), vec![WriteModelKind::Insert, WriteModelKind::Insert]),
        ]
    );
}

// =============================================================================
// Sync and async paths
// =============================================================================

fn mixed_changes(schema: &DocumentSchema) -> ChangeSet {
    let mut changes = ChangeSet::new();
    let family = track(
        &mut changes,
        schema,
        "Family",
        EntityState::Added,
        json!({ "Id": 9, "LastName": "Smith" }),
    );
    track_owned(&mut changes, schema, family, "Address", json!({ "City": "Austin" }));
    track(&mut changes, schema, "Pet", EntityState::Added, json!({ "Id": 3, "Name": "Rex" }));
    changes
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sync_and_async_agree() {
    let schema = create_test_schema();
    let sync_database = DocumentDatabase::new(schema.clone(), MemoryDocumentStore::new());
    let async_database = DocumentDatabase::new(schema.clone(), MemoryDocumentStore::new());

    let mut sync_changes = mixed_changes(&schema);
    let mut async_changes = mixed_changes(&schema);

    let sync_count = sync_database.save_changes(&mut sync_changes).unwrap();
    let async_count = async_database
        .save_changes_async(&mut async_changes, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(sync_count, async_count);
    for collection in ["families", "pets"] {
        assert_eq!(
            sync_database.store().documents(collection),
            async_database.store().documents(collection)
        );
    }
}

#[tokio::test]
async fn test_cancelled_save_keeps_changes_pending() {
    let schema = create_test_schema();
    let database = DocumentDatabase::new(schema.clone(), MemoryDocumentStore::new());
    let mut changes = mixed_changes(&schema);

    let token = CancellationToken::new();
    token.cancel();
    let err = database.save_changes_async(&mut changes, &token).await.unwrap_err();

    assert_eq!(err, SaveError::Store(StoreError::Cancelled));
    assert_eq!(database.store().count("families"), 0);
    assert_eq!(changes.pending().len(), 3);
}
