//! Tracked entity snapshots
//!
//! A [`ChangeSet`] is an arena of [`UpdateEntry`] values addressed by stable
//! [`EntryId`]s. Embedded entities record their owner as an explicit
//! child-to-owner edge, so walking up to a root document is an index lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::metadata::EntityType;

use super::error::{UpdateError, UpdateResult};

/// A document body or a set of property values
pub type Document = Map<String, Value>;

/// Lifecycle state of a tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityState {
    Detached,
    Unchanged,
    Deleted,
    Modified,
    Added,
}

impl EntityState {
    /// Whether saving must write something for this state
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityState::Detached => "Detached",
            EntityState::Unchanged => "Unchanged",
            EntityState::Deleted => "Deleted",
            EntityState::Modified => "Modified",
            EntityState::Added => "Added",
        };
        write!(f, "{}", name)
    }
}

/// Stable handle of an entry inside its change set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One tracked entity: its type, state and property values keyed by
/// property name
#[derive(Debug, Clone)]
pub struct UpdateEntry {
    id: EntryId,
    entity_type: Arc<EntityType>,
    state: EntityState,
    current_values: Document,
    original_values: Document,
}

impl UpdateEntry {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn set_state(&mut self, state: EntityState) {
        self.state = state;
    }

    pub fn current_values(&self) -> &Document {
        &self.current_values
    }

    pub fn current_value(&self, property: &str) -> Option<&Value> {
        self.current_values.get(property)
    }

    pub fn set_current_value(&mut self, property: impl Into<String>, value: Value) {
        self.current_values.insert(property.into(), value);
    }

    /// Value as last loaded or saved; falls back to the current value
    pub fn original_value(&self, property: &str) -> Option<&Value> {
        self.original_values
            .get(property)
            .or_else(|| self.current_values.get(property))
    }

    /// Mark the current values as saved
    pub fn accept_changes(&mut self) {
        self.state = match self.state {
            EntityState::Deleted | EntityState::Detached => EntityState::Detached,
            _ => EntityState::Unchanged,
        };
        self.original_values = self.current_values.clone();
    }
}

/// All tracked entities of one unit of work
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    entries: Vec<UpdateEntry>,
    owners: HashMap<EntryId, EntryId>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an entity; values of an `Added` entity have no originals
    pub fn track(
        &mut self,
        entity_type: Arc<EntityType>,
        state: EntityState,
        values: Document,
    ) -> EntryId {
        let id = EntryId(self.entries.len());
        let original_values = if state == EntityState::Added {
            Document::new()
        } else {
            values.clone()
        };
        self.entries.push(UpdateEntry {
            id,
            entity_type,
            state,
            current_values: values,
            original_values,
        });
        id
    }

    /// Track an entity embedded in the document of `owner`
    pub fn track_owned(
        &mut self,
        owner: EntryId,
        entity_type: Arc<EntityType>,
        state: EntityState,
        values: Document,
    ) -> UpdateResult<EntryId> {
        if self.entry(owner).is_none() {
            return Err(UpdateError::UnknownEntry(owner));
        }
        let id = self.track(entity_type, state, values);
        self.owners.insert(id, owner);
        Ok(id)
    }

    pub fn entry(&self, id: EntryId) -> Option<&UpdateEntry> {
        self.entries.get(id.0)
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut UpdateEntry> {
        self.entries.get_mut(id.0)
    }

    pub fn owner_of(&self, id: EntryId) -> Option<EntryId> {
        self.owners.get(&id).copied()
    }

    /// Entries directly embedded in `owner`, in tracking order
    pub fn owned_entries(&self, owner: EntryId) -> impl Iterator<Item = &UpdateEntry> + '_ {
        self.entries
            .iter()
            .filter(move |e| self.owners.get(&e.id) == Some(&owner))
    }

    /// Entries whose state requires a write
    pub fn pending(&self) -> Vec<EntryId> {
        self.entries
            .iter()
            .filter(|e| e.state.is_pending())
            .map(|e| e.id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpdateEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn accept_all_changes(&mut self) {
        for entry in &mut self.entries {
            entry.accept_changes();
        }
    }
}
