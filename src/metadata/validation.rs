//! Validation of a model after conventions have run

use std::collections::{HashMap, HashSet};

use crate::query::TypeMappingSource;

use super::error::{SchemaError, SchemaResult};
use super::model::ModelBuilder;

/// Checks a convention-complete model before it is frozen
pub struct ModelValidator<'a> {
    model: &'a ModelBuilder,
    type_mappings: TypeMappingSource,
}

impl<'a> ModelValidator<'a> {
    pub fn new(model: &'a ModelBuilder) -> Self {
        Self {
            model,
            type_mappings: TypeMappingSource,
        }
    }

    /// Run every check, stopping at the first failure
    pub fn validate(&self) -> SchemaResult<()> {
        self.validate_keys()?;
        self.validate_type_mappings()?;
        self.validate_ownership()?;
        self.ensure_distinct_collection_names()?;
        self.validate_derived_types()
    }

    fn validate_keys(&self) -> SchemaResult<()> {
        for t in self.model.entity_types() {
            for key in t.primary_key.iter().flatten() {
                if t.find_declared_property(key).is_none() {
                    return Err(SchemaError::UnknownKeyProperty {
                        entity_type: t.name.clone(),
                        property: key.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_type_mappings(&self) -> SchemaResult<()> {
        for t in self.model.entity_types() {
            if let Some(p) = t
                .declared_properties()
                .find(|p| self.type_mappings.find_mapping(&p.clr_type).is_none())
            {
                return Err(SchemaError::PropertyNotMapped {
                    entity_type: t.name.clone(),
                    property: p.name.clone(),
                    clr_type: p.clr_type.to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_ownership(&self) -> SchemaResult<()> {
        for t in self.model.entity_types() {
            if t.is_owned && t.ownership.is_none() {
                return Err(SchemaError::OwnedTypeWithoutOwner(t.name.clone()));
            }
            for nav in t.declared_navigations() {
                let target_is_owned = self
                    .model
                    .entity_type(&nav.target_type)
                    .is_some_and(|target| target.is_owned);
                if target_is_owned && !nav.is_ownership {
                    return Err(SchemaError::InverseToOwnedType {
                        entity_type: t.name.clone(),
                        navigation: nav.name.clone(),
                        owned_type: nav.target_type.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn ensure_distinct_collection_names(&self) -> SchemaResult<()> {
        let mut collections = HashSet::new();
        for t in self.model.entity_types() {
            if t.base_type.is_some() || t.is_owned {
                continue;
            }
            let collection = t.collection_name.clone().unwrap_or_else(|| t.name.clone());
            if !collections.insert(collection.clone()) {
                return Err(SchemaError::DuplicateCollectionName {
                    collection,
                    entity_type: t.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_derived_types(&self) -> SchemaResult<()> {
        let mut discriminators: HashMap<(&str, &str), &str> = HashMap::new();
        for t in self.model.entity_types() {
            let in_hierarchy = t.base_type.is_some() || !t.derived_type_names().is_empty();
            if !in_hierarchy || t.is_abstract {
                continue;
            }
            let discriminator = match t.discriminator.as_deref() {
                Some(d) if !d.trim().is_empty() => d,
                _ => return Err(SchemaError::MissingDiscriminator(t.name.clone())),
            };
            let root = self.model.root_type_name(&t.name);
            if discriminators
                .insert((root, discriminator), t.name.as_str())
                .is_some()
            {
                return Err(SchemaError::DuplicateDiscriminator {
                    discriminator: discriminator.to_string(),
                    entity_type: t.name.clone(),
                    root_type: root.to_string(),
                });
            }
        }
        Ok(())
    }
}
