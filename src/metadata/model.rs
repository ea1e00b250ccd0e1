//! Entity schema model for document mapping

use std::collections::{BTreeMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::ClrType;

use super::conventions::ConventionSet;
use super::error::{SchemaError, SchemaResult};
use super::validation::ModelValidator;

/// Element holding the discriminator of polymorphic documents
pub const DEFAULT_DISCRIMINATOR_ELEMENT: &str = "_t";

/// When the store or the client generates a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueGenerated {
    #[default]
    Never,
    OnAdd,
    OnAddOrUpdate,
}

/// A scalar property of an entity type
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    /// Entity type declaring this property (set when added to a type)
    pub declaring_type: String,
    pub clr_type: ClrType,
    /// Document element name; `Some("")` marks a property with no physical field
    pub element_name: Option<String>,
    pub is_shadow: bool,
    pub is_concurrency_token: bool,
    pub value_generated: Option<ValueGenerated>,
}

impl Property {
    /// Create a new property
    pub fn new(name: impl Into<String>, clr_type: ClrType) -> Self {
        Self {
            name: name.into(),
            declaring_type: String::new(),
            clr_type,
            element_name: None,
            is_shadow: false,
            is_concurrency_token: false,
            value_generated: None,
        }
    }

    /// Set the document element name
    pub fn with_element_name(mut self, element_name: impl Into<String>) -> Self {
        self.element_name = Some(element_name.into());
        self
    }

    /// Mark the property as having no physical field in the document
    pub fn not_persisted(mut self) -> Self {
        self.element_name = Some(String::new());
        self
    }

    /// Mark the property as a shadow property
    pub fn shadow(mut self) -> Self {
        self.is_shadow = true;
        self
    }

    /// Mark the property as an optimistic concurrency token
    pub fn concurrency_token(mut self) -> Self {
        self.is_concurrency_token = true;
        self
    }

    /// Set when the property value is generated
    pub fn with_value_generated(mut self, value_generated: ValueGenerated) -> Self {
        self.value_generated = Some(value_generated);
        self
    }

    /// Resolved document element name (empty when not persisted)
    pub fn element(&self) -> &str {
        self.element_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_persisted(&self) -> bool {
        !self.element().is_empty()
    }

    /// Resolved value generation strategy
    pub fn generation(&self) -> ValueGenerated {
        self.value_generated.unwrap_or_default()
    }
}

/// A navigation from one entity type to another
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    pub name: String,
    pub declaring_type: String,
    pub target_type: String,
    pub is_collection: bool,
    /// Principal-to-dependent side of an ownership (the target is embedded)
    pub is_ownership: bool,
}

impl Navigation {
    /// A to-one navigation
    pub fn reference(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: String::new(),
            target_type: target_type.into(),
            is_collection: false,
            is_ownership: false,
        }
    }

    /// A to-many navigation
    pub fn collection(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            is_collection: true,
            ..Self::reference(name, target_type)
        }
    }

    /// Mark the target as owned through this navigation
    pub fn owned(mut self) -> Self {
        self.is_ownership = true;
        self
    }
}

/// The single owning relationship of an embedded entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    pub owner_type: String,
    /// Navigation on the owner through which this type is embedded
    pub navigation: String,
    pub is_collection: bool,
}

/// An entity type: a root document type or an embedded (owned) type
#[derive(Debug, Clone)]
pub struct EntityType {
    /// Runtime type identity
    pub name: String,
    pub base_type: Option<String>,
    pub is_abstract: bool,
    pub is_owned: bool,
    /// Embedded, non-queryable document (owned or keyless)
    pub is_complex_type: bool,
    pub collection_name: Option<String>,
    pub discriminator: Option<String>,
    /// Explicit element name used when this type is embedded
    pub containing_property_name: Option<String>,
    /// Names of the key properties
    pub primary_key: Option<Vec<String>>,
    pub ownership: Option<Ownership>,
    properties: Vec<Property>,
    navigations: Vec<Navigation>,
    /// All derived types, breadth first (filled at finalization)
    derived_types: Vec<String>,
}

impl EntityType {
    /// Create a new entity type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: None,
            is_abstract: false,
            is_owned: false,
            is_complex_type: false,
            collection_name: None,
            discriminator: None,
            containing_property_name: None,
            primary_key: None,
            ownership: None,
            properties: Vec::new(),
            navigations: Vec::new(),
            derived_types: Vec::new(),
        }
    }

    /// Set the base type
    pub fn with_base_type(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    /// Mark the type abstract
    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark the type as owned (embedded in its owner's document)
    pub fn as_owned(mut self) -> Self {
        self.is_owned = true;
        self
    }

    /// Set the collection name
    pub fn with_collection_name(mut self, collection_name: impl Into<String>) -> Self {
        self.collection_name = Some(collection_name.into());
        self
    }

    /// Set the discriminator value
    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    /// Set the element name used when embedded
    pub fn with_containing_property_name(mut self, name: impl Into<String>) -> Self {
        self.containing_property_name = Some(name.into());
        self
    }

    /// Set the primary key
    pub fn with_key(mut self, properties: &[&str]) -> Self {
        self.primary_key = Some(properties.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Add a property
    pub fn with_property(mut self, property: Property) -> Self {
        self.add_property(property);
        self
    }

    /// Add a navigation
    pub fn with_navigation(mut self, navigation: Navigation) -> Self {
        self.add_navigation(navigation);
        self
    }

    /// Add a property declared on this type
    pub fn add_property(&mut self, mut property: Property) {
        property.declaring_type = self.name.clone();
        self.properties.push(property);
    }

    /// Add a navigation declared on this type
    pub fn add_navigation(&mut self, mut navigation: Navigation) {
        navigation.declaring_type = self.name.clone();
        self.navigations.push(navigation);
    }

    pub fn declared_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub(crate) fn declared_properties_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.properties.iter_mut()
    }

    pub(crate) fn remove_properties(&mut self, names: &[String]) {
        self.properties.retain(|p| !names.contains(&p.name));
    }

    pub fn declared_navigations(&self) -> impl Iterator<Item = &Navigation> {
        self.navigations.iter()
    }

    /// Find a property declared on this type
    pub fn find_declared_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Find a navigation declared on this type
    pub fn find_declared_navigation(&self, name: &str) -> Option<&Navigation> {
        self.navigations.iter().find(|n| n.name == name)
    }

    /// Names of all derived types, breadth first
    pub fn derived_type_names(&self) -> &[String] {
        &self.derived_types
    }

    pub fn clr_type(&self) -> ClrType {
        ClrType::Entity(self.name.clone())
    }

    pub fn is_derived_type(&self) -> bool {
        self.base_type.is_some()
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EntityType {}

impl Hash for EntityType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A finalized, validated schema
#[derive(Debug, Clone, Default)]
pub struct DocumentSchema {
    entity_types: BTreeMap<String, Arc<EntityType>>,
    discriminator_element: String,
}

impl DocumentSchema {
    /// Find an entity type by name
    pub fn find_entity_type(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.entity_types.get(name)
    }

    /// Get an entity type by name
    pub fn entity_type(&self, name: &str) -> SchemaResult<&Arc<EntityType>> {
        self.find_entity_type(name)
            .ok_or_else(|| SchemaError::UnknownEntityType(name.to_string()))
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.entity_types.values()
    }

    /// Element name used for discriminators
    pub fn discriminator_element(&self) -> &str {
        &self.discriminator_element
    }

    pub fn base_type(&self, entity_type: &EntityType) -> Option<&Arc<EntityType>> {
        entity_type
            .base_type
            .as_deref()
            .and_then(|name| self.find_entity_type(name))
    }

    /// The type followed by its base types, most derived first
    pub fn base_chain(&self, entity_type: &Arc<EntityType>) -> Vec<Arc<EntityType>> {
        let mut chain = vec![entity_type.clone()];
        while let Some(base) = chain.last().and_then(|t| self.base_type(t)) {
            chain.push(base.clone());
        }
        chain
    }

    /// Least-derived type of the hierarchy
    pub fn root_type(&self, entity_type: &Arc<EntityType>) -> Arc<EntityType> {
        let mut current = entity_type.clone();
        while let Some(base) = self.base_type(&current) {
            current = base.clone();
        }
        current
    }

    /// All derived types, breadth first
    pub fn derived_types(&self, entity_type: &EntityType) -> Vec<Arc<EntityType>> {
        entity_type
            .derived_types
            .iter()
            .filter_map(|name| self.find_entity_type(name).cloned())
            .collect()
    }

    /// Whether `derived` is `base` or derives from it
    pub fn is_assignable_from(&self, base: &EntityType, derived: &EntityType) -> bool {
        let mut current = Some(derived);
        while let Some(t) = current {
            if t.name == base.name {
                return true;
            }
            current = self.base_type(t).map(|b| b.as_ref());
        }
        false
    }

    /// Whether two types belong to one line of inheritance
    pub fn are_related(&self, a: &EntityType, b: &EntityType) -> bool {
        self.is_assignable_from(a, b) || self.is_assignable_from(b, a)
    }

    /// Find a property declared on the type or inherited from a base type
    pub fn find_property(&self, entity_type: &EntityType, name: &str) -> Option<&Property> {
        let mut current = self.find_entity_type(&entity_type.name);
        while let Some(t) = current {
            if let Some(p) = t.find_declared_property(name) {
                return Some(p);
            }
            current = self.base_type(t);
        }
        None
    }

    /// Find a navigation declared on the type or inherited from a base type
    pub fn find_navigation(&self, entity_type: &EntityType, name: &str) -> Option<&Navigation> {
        let mut current = self.find_entity_type(&entity_type.name);
        while let Some(t) = current {
            if let Some(n) = t.find_declared_navigation(name) {
                return Some(n);
            }
            current = self.base_type(t);
        }
        None
    }

    /// All properties including inherited ones, base type first
    pub fn properties(&self, entity_type: &Arc<EntityType>) -> Vec<Property> {
        self.base_chain(entity_type)
            .iter()
            .rev()
            .flat_map(|t| t.declared_properties().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// All navigations including inherited ones, base type first
    pub fn navigations(&self, entity_type: &Arc<EntityType>) -> Vec<Navigation> {
        self.base_chain(entity_type)
            .iter()
            .rev()
            .flat_map(|t| t.declared_navigations().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Primary key properties, declared on the hierarchy root
    pub fn primary_key(&self, entity_type: &Arc<EntityType>) -> Vec<Property> {
        let root = self.root_type(entity_type);
        root.primary_key
            .iter()
            .flatten()
            .filter_map(|name| root.find_declared_property(name).cloned())
            .collect()
    }

    /// Element name of an embedded type inside its owner's document
    pub fn containing_property_name<'a>(&self, entity_type: &'a EntityType) -> Option<&'a str> {
        entity_type
            .containing_property_name
            .as_deref()
            .or_else(|| entity_type.ownership.as_ref().map(|o| o.navigation.as_str()))
    }

    /// Whether instances of the type are stored as top-level documents
    pub fn is_document_root(&self, entity_type: &Arc<EntityType>) -> bool {
        !self.root_type(entity_type).is_owned
    }

    /// The hierarchy root bound to the physical collection
    pub fn collection_entity_type(
        &self,
        entity_type: &Arc<EntityType>,
    ) -> SchemaResult<Arc<EntityType>> {
        let root = self.root_type(entity_type);
        if root.is_owned {
            return Err(SchemaError::NotACollectionType(entity_type.name.clone()));
        }
        Ok(root)
    }

    /// Physical collection holding documents of the type
    pub fn collection_name(&self, entity_type: &Arc<EntityType>) -> SchemaResult<String> {
        let root = self.collection_entity_type(entity_type)?;
        Ok(root
            .collection_name
            .clone()
            .unwrap_or_else(|| root.name.clone()))
    }

    /// Whether the type takes part in an inheritance hierarchy
    pub fn is_polymorphic(&self, entity_type: &EntityType) -> bool {
        entity_type.base_type.is_some() || !entity_type.derived_types.is_empty()
    }

    /// Discriminator value of the type
    pub fn discriminator<'a>(&self, entity_type: &'a EntityType) -> &'a str {
        entity_type
            .discriminator
            .as_deref()
            .unwrap_or(entity_type.name.as_str())
    }
}

/// Collects raw entity types and finalizes them into a [`DocumentSchema`]
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    entity_types: BTreeMap<String, EntityType>,
    discriminator_element: String,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            entity_types: BTreeMap::new(),
            discriminator_element: DEFAULT_DISCRIMINATOR_ELEMENT.to_string(),
        }
    }

    /// Add an entity type
    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.add_entity_type(entity_type);
        self
    }

    /// Set the discriminator element name
    pub fn with_discriminator_element(mut self, element: impl Into<String>) -> Self {
        self.discriminator_element = element.into();
        self
    }

    pub fn add_entity_type(&mut self, entity_type: EntityType) {
        self.entity_types.insert(entity_type.name.clone(), entity_type);
    }

    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.get(name)
    }

    pub fn entity_type_mut(&mut self, name: &str) -> Option<&mut EntityType> {
        self.entity_types.get_mut(name)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.values()
    }

    pub fn entity_types_mut(&mut self) -> impl Iterator<Item = &mut EntityType> {
        self.entity_types.values_mut()
    }

    /// Hierarchy root of a raw type, by name
    pub fn root_type_name<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        while let Some(base) = self
            .entity_types
            .get(current)
            .and_then(|t| t.base_type.as_deref())
        {
            if !self.entity_types.contains_key(base) {
                break;
            }
            current = base;
        }
        current
    }

    /// Run the conventions in order, validate, and freeze the schema
    pub fn finalize(mut self, conventions: &ConventionSet) -> SchemaResult<DocumentSchema> {
        self.link_derived_types()?;
        for convention in conventions.iter() {
            trace!(convention = convention.name(), "applying model convention");
            convention.apply(&mut self)?;
        }

        ModelValidator::new(&self).validate()?;

        let schema = DocumentSchema {
            entity_types: self
                .entity_types
                .into_iter()
                .map(|(name, t)| (name, Arc::new(t)))
                .collect(),
            discriminator_element: self.discriminator_element,
        };
        debug!(
            entity_types = schema.entity_types.len(),
            "document schema finalized"
        );
        Ok(schema)
    }

    fn link_derived_types(&mut self) -> SchemaResult<()> {
        for t in self.entity_types.values() {
            let mut visited = vec![t.name.as_str()];
            let mut current = t;
            while let Some(base) = current.base_type.as_deref() {
                if visited.contains(&base) {
                    return Err(SchemaError::CyclicBaseType {
                        entity_type: t.name.clone(),
                    });
                }
                current = self.entity_types.get(base).ok_or_else(|| {
                    SchemaError::UnknownBaseType {
                        entity_type: current.name.clone(),
                        base_type: base.to_string(),
                    }
                })?;
                visited.push(base);
            }
        }

        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for t in self.entity_types.values() {
            if let Some(base) = &t.base_type {
                children.entry(base.clone()).or_default().push(t.name.clone());
            }
        }

        let names: Vec<String> = self.entity_types.keys().cloned().collect();
        for name in names {
            let mut derived = Vec::new();
            let mut queue: VecDeque<&String> = children.get(&name).into_iter().flatten().collect();
            while let Some(next) = queue.pop_front() {
                if derived.contains(next) {
                    continue;
                }
                derived.push(next.clone());
                queue.extend(children.get(next).into_iter().flatten());
            }
            if let Some(t) = self.entity_types.get_mut(&name) {
                t.derived_types = derived;
            }
        }
        Ok(())
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
