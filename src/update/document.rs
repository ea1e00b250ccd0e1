//! Composition of whole documents from tracked entries

use serde_json::Value;

use crate::metadata::DocumentSchema;

use super::entry::{ChangeSet, Document, EntityState, EntryId, UpdateEntry};
use super::error::{UpdateError, UpdateResult};

/// Builds the stored form of an entry and everything embedded in it
#[derive(Debug, Clone, Copy)]
pub struct DocumentSerializer<'a> {
    schema: &'a DocumentSchema,
}

impl<'a> DocumentSerializer<'a> {
    pub fn new(schema: &'a DocumentSchema) -> Self {
        Self { schema }
    }

    /// Serialize the entry `id` with its owned entries nested under their
    /// element names. Deleted children and empty arrays are left out.
    pub fn serialize(&self, changes: &ChangeSet, id: EntryId) -> UpdateResult<Document> {
        let entry = changes.entry(id).ok_or(UpdateError::UnknownEntry(id))?;
        let entity_type = entry.entity_type();
        let mut document = Document::new();

        for property in self.schema.properties(entity_type) {
            if !property.is_persisted() {
                continue;
            }
            if let Some(value) = entry.current_value(&property.name) {
                document.insert(property.element().to_string(), value.clone());
            }
        }

        if self.schema.is_polymorphic(entity_type) {
            document.insert(
                self.schema.discriminator_element().to_string(),
                Value::from(self.schema.discriminator(entity_type)),
            );
        }

        for navigation in self.schema.navigations(entity_type) {
            if !navigation.is_ownership {
                continue;
            }
            let target = self.schema.entity_type(&navigation.target_type)?;
            let element = self
                .schema
                .containing_property_name(target)
                .unwrap_or(&navigation.name)
                .to_string();

            let children: Vec<&UpdateEntry> = changes
                .owned_entries(id)
                .filter(|c| is_stored(c.state()))
                .filter(|c| self.schema.is_assignable_from(target, c.entity_type()))
                .collect();

            if navigation.is_collection {
                let items = children
                    .iter()
                    .map(|c| self.serialize(changes, c.id()).map(Value::Object))
                    .collect::<UpdateResult<Vec<_>>>()?;
                if !items.is_empty() {
                    document.insert(element, Value::Array(items));
                }
            } else if let Some(child) = children.first() {
                let nested = self.serialize(changes, child.id())?;
                document.insert(element, Value::Object(nested));
            }
        }

        Ok(document)
    }
}

fn is_stored(state: EntityState) -> bool {
    !matches!(state, EntityState::Deleted | EntityState::Detached)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::ast::ClrType;
    use crate::metadata::{ConventionSet, EntityType, ModelBuilder, Navigation, Property};

    fn create_test_schema() -> DocumentSchema {
        ModelBuilder::new()
            .with_entity_type(
                EntityType::new("Family")
                    .with_property(Property::new("Id", ClrType::ObjectId))
                    .with_property(Property::new("LastName", ClrType::String))
                    .with_property(Property::new("Loaded", ClrType::Bool).with_element_name(""))
                    .with_navigation(Navigation::reference("Address", "Address").owned())
                    .with_navigation(Navigation::collection("Children", "Child").owned()),
            )
            .with_entity_type(
                EntityType::new("Address").with_property(Property::new("City", ClrType::String)),
            )
            .with_entity_type(
                EntityType::new("Child").with_property(Property::new("Name", ClrType::String)),
            )
            .with_entity_type(EntityType::new("Adopted").with_base_type("Child"))
            .finalize(&ConventionSet::default())
            .unwrap()
    }

    fn values(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {}", other),
        }
    }

    fn entity(schema: &DocumentSchema, name: &str) -> Arc<EntityType> {
        schema.entity_type(name).unwrap().clone()
    }

    #[test]
    fn test_nested_document() {
        let schema = create_test_schema();
        let mut changes = ChangeSet::new();
        let root = changes.track(
            entity(&schema, "Family"),
            EntityState::Modified,
            values(json!({ "Id": "65a1", "LastName": "Andersen", "Loaded": true })),
        );
        changes
            .track_owned(
                root,
                entity(&schema, "Address"),
                EntityState::Unchanged,
                values(json!({ "City": "Seattle" })),
            )
            .unwrap();
        changes
            .track_owned(
                root,
                entity(&schema, "Child"),
                EntityState::Added,
                values(json!({ "Name": "Henriette" })),
            )
            .unwrap();
        changes
            .track_owned(
                root,
                entity(&schema, "Adopted"),
                EntityState::Unchanged,
                values(json!({ "Name": "Jesse" })),
            )
            .unwrap();
        changes
            .track_owned(
                root,
                entity(&schema, "Child"),
                EntityState::Deleted,
                values(json!({ "Name": "Gone" })),
            )
            .unwrap();

        let document = DocumentSerializer::new(&schema).serialize(&changes, root).unwrap();
        assert_eq!(
            Value::Object(document),
            json!({
                "_id": "65a1",
                "LastName": "Andersen",
                "Address": { "City": "Seattle" },
                "Children": [
                    { "Name": "Henriette", "_t": "Child" },
                    { "Name": "Jesse", "_t": "Adopted" },
                ],
            })
        );
    }

    #[test]
    fn test_empty_collection_is_omitted() {
        let schema = create_test_schema();
        let mut changes = ChangeSet::new();
        let root = changes.track(
            entity(&schema, "Family"),
            EntityState::Added,
            values(json!({ "Id": "65a2", "LastName": "Wakefield" })),
        );

        let document = DocumentSerializer::new(&schema).serialize(&changes, root).unwrap();
        assert_eq!(
            Value::Object(document),
            json!({ "_id": "65a2", "LastName": "Wakefield" })
        );
    }
}
