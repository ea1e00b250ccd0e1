//! Choice of write-model factory per entry

use std::sync::Arc;

use crate::metadata::{DocumentSchema, EntityType};

use super::cache::WriteModelFactoryCache;
use super::entry::{EntityState, UpdateEntry};
use super::error::{UpdateError, UpdateResult};
use super::factory::{
    DeleteOneModelFactory, InsertOneModelFactory, ReplaceOneModelFactory, WriteModelFactory,
};
use super::value_generation::ValueGeneratorSelector;

/// Picks the factory for an entry's type and state.
///
/// `Added` inserts, `Deleted` deletes, and `Modified` or `Unchanged` replace
/// the whole document, since a change anywhere inside an embedded subtree
/// rewrites its root.
#[derive(Debug, Clone)]
pub struct WriteModelFactorySelector {
    schema: Arc<DocumentSchema>,
    generators: Arc<ValueGeneratorSelector>,
    cache: Arc<WriteModelFactoryCache>,
}

impl WriteModelFactorySelector {
    pub fn new(
        schema: Arc<DocumentSchema>,
        generators: Arc<ValueGeneratorSelector>,
        cache: Arc<WriteModelFactoryCache>,
    ) -> Self {
        Self {
            schema,
            generators,
            cache,
        }
    }

    /// A selector with its own generator selector and cache
    pub fn with_schema(schema: Arc<DocumentSchema>) -> Self {
        Self::new(
            schema,
            Arc::new(ValueGeneratorSelector::new()),
            Arc::new(WriteModelFactoryCache::new()),
        )
    }

    pub fn cache(&self) -> &Arc<WriteModelFactoryCache> {
        &self.cache
    }

    pub fn select(&self, entry: &UpdateEntry) -> UpdateResult<Arc<dyn WriteModelFactory>> {
        self.select_for(entry.entity_type(), entry.state())
    }

    pub fn select_for(
        &self,
        entity_type: &Arc<EntityType>,
        state: EntityState,
    ) -> UpdateResult<Arc<dyn WriteModelFactory>> {
        self.cache
            .get_or_add(entity_type, state, |entity_type, state| self.create(entity_type, state))
    }

    fn create(
        &self,
        entity_type: &Arc<EntityType>,
        state: EntityState,
    ) -> UpdateResult<Arc<dyn WriteModelFactory>> {
        let schema = self.schema.clone();
        let generators = self.generators.clone();
        let entity_type = entity_type.clone();
        let factory: Arc<dyn WriteModelFactory> = match state {
            EntityState::Added => {
                Arc::new(InsertOneModelFactory::new(schema, generators, entity_type))
            }
            EntityState::Deleted => {
                Arc::new(DeleteOneModelFactory::new(schema, generators, entity_type))
            }
            EntityState::Modified | EntityState::Unchanged => {
                Arc::new(ReplaceOneModelFactory::new(schema, generators, entity_type))
            }
            EntityState::Detached => return Err(UpdateError::InvalidEntityState(state)),
        };
        Ok(factory)
    }
}
