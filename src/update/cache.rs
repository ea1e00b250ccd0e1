//! Shared cache of write-model factories

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::metadata::EntityType;

use super::entry::EntityState;
use super::error::UpdateResult;
use super::factory::WriteModelFactory;

/// Factories keyed by (entity type, state).
///
/// Lookups never take a lock over the whole map. Concurrent misses for one
/// key may each build a factory, but only the first one published is kept
/// and every caller gets that instance.
#[derive(Debug, Default)]
pub struct WriteModelFactoryCache {
    cache: DashMap<(String, EntityState), Arc<dyn WriteModelFactory>>,
}

impl WriteModelFactoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_add<F>(
        &self,
        entity_type: &Arc<EntityType>,
        state: EntityState,
        create: F,
    ) -> UpdateResult<Arc<dyn WriteModelFactory>>
    where
        F: FnOnce(&Arc<EntityType>, EntityState) -> UpdateResult<Arc<dyn WriteModelFactory>>,
    {
        let key = (entity_type.name.clone(), state);
        if let Some(factory) = self.cache.get(&key) {
            return Ok(factory.value().clone());
        }

        trace!(entity_type = %entity_type.name, %state, "write model factory cache miss");
        let created = create(entity_type, state)?;
        Ok(self.cache.entry(key).or_insert(created).value().clone())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
