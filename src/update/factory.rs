//! Write-model factories
//!
//! Each factory turns one root entry into one write directive. Inserts carry
//! the whole document; replaces and deletes match the stored document by its
//! primary key plus the original values of its concurrency tokens.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::metadata::{DocumentSchema, EntityType};

use super::document::DocumentSerializer;
use super::entry::{ChangeSet, Document, EntryId, UpdateEntry};
use super::error::{UpdateError, UpdateResult};
use super::value_generation::ValueGeneratorSelector;
use super::write_model::{WriteModel, WriteModelKind};

/// Builds write directives for one entity type and state
pub trait WriteModelFactory: fmt::Debug + Send + Sync {
    fn entity_type(&self) -> &Arc<EntityType>;

    fn kind(&self) -> WriteModelKind;

    /// Build the directive for `id`. Generated values are written back into
    /// the entry first, so the tracked entity matches what is stored.
    fn create_write_model(&self, changes: &mut ChangeSet, id: EntryId) -> UpdateResult<WriteModel>;
}

/// Dependencies shared by all factories
#[derive(Debug, Clone)]
struct FactoryContext {
    schema: Arc<DocumentSchema>,
    generators: Arc<ValueGeneratorSelector>,
    entity_type: Arc<EntityType>,
}

impl FactoryContext {
    fn update_generated_values(
        &self,
        changes: &mut ChangeSet,
        id: EntryId,
        adding: bool,
    ) -> UpdateResult<()> {
        let properties = self.schema.properties(&self.entity_type);
        let entry = changes.entry_mut(id).ok_or(UpdateError::UnknownEntry(id))?;
        self.generators.generate_values(&properties, entry, adding)
    }

    fn document(&self, changes: &ChangeSet, id: EntryId) -> UpdateResult<Document> {
        DocumentSerializer::new(&self.schema).serialize(changes, id)
    }

    /// Key elements and concurrency tokens, at their original values
    fn filter(&self, entry: &UpdateEntry) -> UpdateResult<Document> {
        let key = self.schema.primary_key(&self.entity_type);
        if key.is_empty() {
            return Err(UpdateError::MissingPrimaryKey(self.entity_type.name.clone()));
        }

        let mut filter = Document::new();
        for property in &key {
            match entry.original_value(&property.name) {
                Some(value) if !value.is_null() => {
                    filter.insert(property.element().to_string(), value.clone());
                }
                _ => {
                    return Err(UpdateError::MissingKeyValue {
                        entity_type: self.entity_type.name.clone(),
                        property: property.name.clone(),
                    })
                }
            }
        }

        for token in self
            .schema
            .properties(&self.entity_type)
            .iter()
            .filter(|p| p.is_concurrency_token && p.is_persisted())
        {
            let value = entry.original_value(&token.name).cloned().unwrap_or(Value::Null);
            filter.insert(token.element().to_string(), value);
        }
        Ok(filter)
    }
}

fn entry(changes: &ChangeSet, id: EntryId) -> UpdateResult<&UpdateEntry> {
    changes.entry(id).ok_or(UpdateError::UnknownEntry(id))
}

/// Inserts the entry's current document
#[derive(Debug, Clone)]
pub struct InsertOneModelFactory {
    context: FactoryContext,
}

impl InsertOneModelFactory {
    pub fn new(
        schema: Arc<DocumentSchema>,
        generators: Arc<ValueGeneratorSelector>,
        entity_type: Arc<EntityType>,
    ) -> Self {
        Self {
            context: FactoryContext {
                schema,
                generators,
                entity_type,
            },
        }
    }
}

impl WriteModelFactory for InsertOneModelFactory {
    fn entity_type(&self) -> &Arc<EntityType> {
        &self.context.entity_type
    }

    fn kind(&self) -> WriteModelKind {
        WriteModelKind::Insert
    }

    fn create_write_model(&self, changes: &mut ChangeSet, id: EntryId) -> UpdateResult<WriteModel> {
        self.context.update_generated_values(changes, id, true)?;
        Ok(WriteModel::InsertOne {
            document: self.context.document(changes, id)?,
        })
    }
}

/// Replaces the whole stored document
#[derive(Debug, Clone)]
pub struct ReplaceOneModelFactory {
    context: FactoryContext,
}

impl ReplaceOneModelFactory {
    pub fn new(
        schema: Arc<DocumentSchema>,
        generators: Arc<ValueGeneratorSelector>,
        entity_type: Arc<EntityType>,
    ) -> Self {
        Self {
            context: FactoryContext {
                schema,
                generators,
                entity_type,
            },
        }
    }
}

impl WriteModelFactory for ReplaceOneModelFactory {
    fn entity_type(&self) -> &Arc<EntityType> {
        &self.context.entity_type
    }

    fn kind(&self) -> WriteModelKind {
        WriteModelKind::Replace
    }

    fn create_write_model(&self, changes: &mut ChangeSet, id: EntryId) -> UpdateResult<WriteModel> {
        self.context.update_generated_values(changes, id, false)?;
        let filter = self.context.filter(entry(changes, id)?)?;
        Ok(WriteModel::ReplaceOne {
            filter,
            replacement: self.context.document(changes, id)?,
        })
    }
}

/// Deletes the stored document
#[derive(Debug, Clone)]
pub struct DeleteOneModelFactory {
    context: FactoryContext,
}

impl DeleteOneModelFactory {
    pub fn new(
        schema: Arc<DocumentSchema>,
        generators: Arc<ValueGeneratorSelector>,
        entity_type: Arc<EntityType>,
    ) -> Self {
        Self {
            context: FactoryContext {
                schema,
                generators,
                entity_type,
            },
        }
    }
}

impl WriteModelFactory for DeleteOneModelFactory {
    fn entity_type(&self) -> &Arc<EntityType> {
        &self.context.entity_type
    }

    fn kind(&self) -> WriteModelKind {
        WriteModelKind::Delete
    }

    fn create_write_model(&self, changes: &mut ChangeSet, id: EntryId) -> UpdateResult<WriteModel> {
        Ok(WriteModel::DeleteOne {
            filter: self.context.filter(entry(changes, id)?)?,
        })
    }
}
