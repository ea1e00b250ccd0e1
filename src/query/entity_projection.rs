//! Shapes of whole documents and embedded document arrays
//!
//! An [`EntityProjection`] answers member-binding requests against the
//! document (or sub-document) it describes. Bound accessors are memoized per
//! projection instance, keyed by declaring type and member name, so repeated
//! binds within one query compilation resolve without touching metadata.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::ast::ClrType;
use crate::metadata::{DocumentSchema, EntityType, Navigation, Property};

use super::error::{QueryError, QueryResult};
use super::expression::{AccessExpression, KeyAccess, ObjectAccess, QueryExpression, RootReference};
use super::type_mapping::TypeMappingSource;

/// Declaring type and member name
type MemberKey = (String, String);

/// The shape of a document or embedded sub-document
pub struct EntityProjection {
    entity_type: Arc<EntityType>,
    access: AccessExpression,
    property_cache: RefCell<HashMap<MemberKey, KeyAccess>>,
    navigation_cache: RefCell<HashMap<MemberKey, QueryExpression>>,
}

impl EntityProjection {
    pub fn new(entity_type: Arc<EntityType>, access: AccessExpression) -> Self {
        Self {
            entity_type,
            access,
            property_cache: RefCell::new(HashMap::new()),
            navigation_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Projection of a root document under the given alias
    pub fn root(entity_type: Arc<EntityType>, alias: &str) -> Self {
        let root = RootReference::new(entity_type.clone(), alias);
        Self::new(entity_type, AccessExpression::Root(root))
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    pub fn access(&self) -> &AccessExpression {
        &self.access
    }

    pub fn name(&self) -> &str {
        self.access.name()
    }

    pub fn clr_type(&self) -> ClrType {
        self.entity_type.clr_type()
    }

    /// The same document viewed as a more derived type
    pub fn with_entity_type(&self, entity_type: Arc<EntityType>) -> Self {
        Self::new(entity_type, self.access.clone())
    }

    /// Bind a scalar property to a field access.
    ///
    /// Outside client evaluation, a property with no physical field binds to
    /// nothing rather than to an empty path.
    pub fn bind_property(
        &self,
        schema: &DocumentSchema,
        property: &Property,
        client_eval: bool,
    ) -> QueryResult<Option<KeyAccess>> {
        self.check_declaring_type(schema, &property.declaring_type, &property.name)?;

        let key = (property.declaring_type.clone(), property.name.clone());
        let cached = self.property_cache.borrow().get(&key).cloned();
        let access = match cached {
            Some(access) => access,
            None => {
                let access = KeyAccess {
                    property: property.clone(),
                    name: property.element().to_string(),
                    access: self.access.clone(),
                    type_mapping: TypeMappingSource.find_mapping(&property.clr_type),
                };
                self.property_cache.borrow_mut().insert(key, access.clone());
                access
            }
        };

        if !client_eval && access.name.is_empty() {
            return Ok(None);
        }
        Ok(Some(access))
    }

    /// Bind a navigation to an embedded object or array projection
    pub fn bind_navigation(
        &self,
        schema: &DocumentSchema,
        navigation: &Navigation,
    ) -> QueryResult<QueryExpression> {
        self.check_declaring_type(schema, &navigation.declaring_type, &navigation.name)?;

        let key = (navigation.declaring_type.clone(), navigation.name.clone());
        if let Some(cached) = self.navigation_cache.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let bound: QueryExpression = if navigation.is_collection {
            ObjectArrayProjection::new(schema, navigation, self.access.clone(), None)?.into()
        } else {
            let target = schema.entity_type(&navigation.target_type)?.clone();
            let object = ObjectAccess {
                navigation: navigation.clone(),
                name: embedded_name(schema, navigation, &target)?,
                access: self.access.clone(),
            };
            EntityProjection::new(target, AccessExpression::Object(Box::new(object))).into()
        };
        self.navigation_cache.borrow_mut().insert(key, bound.clone());
        Ok(bound)
    }

    /// Bind a member by name.
    ///
    /// When `requested` names a type derived from this projection's type the
    /// member is looked up on that subtype, so members declared below the
    /// projected type still resolve.
    pub fn bind_member(
        &self,
        schema: &DocumentSchema,
        name: &str,
        requested: Option<&ClrType>,
        client_eval: bool,
    ) -> QueryResult<Option<QueryExpression>> {
        let mut entity_type = self.entity_type.clone();
        if let Some(ClrType::Entity(requested)) = requested {
            let requested = schema.entity_type(requested)?;
            if !schema.is_assignable_from(requested, &entity_type) {
                entity_type = schema
                    .derived_types(&entity_type)
                    .into_iter()
                    .find(|derived| schema.is_assignable_from(requested, derived))
                    .ok_or_else(|| QueryError::UnrelatedEntityType {
                        entity_type: self.entity_type.name.clone(),
                        requested: requested.name.clone(),
                    })?;
            }
        }

        if let Some(property) = schema.find_property(&entity_type, name) {
            return Ok(self
                .bind_property(schema, property, client_eval)?
                .map(|k| QueryExpression::Sql(k.into())));
        }
        if let Some(navigation) = schema.find_navigation(&entity_type, name) {
            return self.bind_navigation(schema, navigation).map(Some);
        }
        Ok(None)
    }

    fn check_declaring_type(
        &self,
        schema: &DocumentSchema,
        declaring_type: &str,
        member: &str,
    ) -> QueryResult<()> {
        let related = schema
            .find_entity_type(declaring_type)
            .is_some_and(|declaring| schema.are_related(&self.entity_type, declaring));
        if related {
            Ok(())
        } else {
            Err(QueryError::UnrelatedMember {
                entity_type: self.entity_type.name.clone(),
                member: format!("{}.{}", declaring_type, member),
            })
        }
    }
}

impl PartialEq for EntityProjection {
    fn eq(&self, other: &Self) -> bool {
        self.entity_type == other.entity_type && self.access == other.access
    }
}

impl fmt::Debug for EntityProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProjection")
            .field("entity_type", &self.entity_type.name)
            .field("access", &self.access)
            .finish()
    }
}

/// An embedded array of documents reached through a to-many navigation
#[derive(Debug, PartialEq)]
pub struct ObjectArrayProjection {
    navigation: Navigation,
    name: String,
    access: AccessExpression,
    inner: Rc<EntityProjection>,
}

impl ObjectArrayProjection {
    /// Array projection for `navigation` below `access`; elements default to
    /// a fresh projection rooted at an empty alias
    pub fn new(
        schema: &DocumentSchema,
        navigation: &Navigation,
        access: AccessExpression,
        inner: Option<Rc<EntityProjection>>,
    ) -> QueryResult<Self> {
        let target = schema.entity_type(&navigation.target_type)?.clone();
        let name = embedded_name(schema, navigation, &target)?;
        let inner = inner.unwrap_or_else(|| Rc::new(EntityProjection::root(target, "")));
        Ok(Self {
            navigation: navigation.clone(),
            name,
            access,
            inner,
        })
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> &AccessExpression {
        &self.access
    }

    /// Shape of each array element
    pub fn inner(&self) -> &Rc<EntityProjection> {
        &self.inner
    }

    pub fn path(&self) -> Vec<&str> {
        let mut path = self.access.path();
        path.push(&self.name);
        path
    }

    pub fn clr_type(&self) -> ClrType {
        ClrType::Collection(Box::new(ClrType::Entity(self.navigation.target_type.clone())))
    }
}

/// Element name of the navigation's target inside its owner
fn embedded_name(
    schema: &DocumentSchema,
    navigation: &Navigation,
    target: &EntityType,
) -> QueryResult<String> {
    schema
        .containing_property_name(target)
        .map(str::to_string)
        .ok_or_else(|| QueryError::NotEmbedded {
            entity_type: navigation.declaring_type.clone(),
            navigation: navigation.name.clone(),
        })
}
