//! Model conventions applied during schema finalization
//!
//! A [`ConventionSet`] is an ordered list of conventions supplied by the
//! caller. Each convention fills in metadata the model author left unset;
//! explicitly configured values are never overwritten.

use std::fmt;

use crate::ast::ClrType;

use super::error::{SchemaError, SchemaResult};
use super::model::{ModelBuilder, Ownership, ValueGenerated};

/// Element name of single-property primary keys
pub const KEY_ELEMENT: &str = "_id";

/// A single finalization step over the raw model
pub trait ModelConvention: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, model: &mut ModelBuilder) -> SchemaResult<()>;
}

/// Ordered conventions run by [`ModelBuilder::finalize`]
#[derive(Debug)]
pub struct ConventionSet {
    conventions: Vec<Box<dyn ModelConvention>>,
}

impl ConventionSet {
    /// A set with no conventions
    pub fn empty() -> Self {
        Self {
            conventions: Vec::new(),
        }
    }

    /// Append a convention
    pub fn with(mut self, convention: impl ModelConvention + 'static) -> Self {
        self.conventions.push(Box::new(convention));
        self
    }

    /// Default conventions using the given collection naming
    pub fn with_collection_naming(naming: CollectionNaming) -> Self {
        Self::empty()
            .with(OwnershipConvention)
            .with(KeyDiscoveryConvention)
            .with(OwnedDocumentConvention)
            .with(ElementNameConvention::default())
            .with(CollectionNameConvention { naming })
            .with(DiscriminatorConvention)
            .with(ValueGenerationConvention)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ModelConvention> {
        self.conventions.iter().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.conventions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conventions.is_empty()
    }
}

impl Default for ConventionSet {
    fn default() -> Self {
        Self::with_collection_naming(CollectionNaming::default())
    }
}

/// How collection names are derived from type names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionNaming {
    /// `Family` -> `families`
    #[default]
    PluralCamelCase,
    /// `Family` -> `family`
    CamelCase,
    /// `Family` -> `Family`
    TypeName,
}

impl CollectionNaming {
    pub fn collection_name(&self, type_name: &str) -> String {
        match self {
            CollectionNaming::PluralCamelCase => pluralize(&to_lower_camel_case(type_name)),
            CollectionNaming::CamelCase => to_lower_camel_case(type_name),
            CollectionNaming::TypeName => type_name.to_string(),
        }
    }
}

/// Lower-case the leading capital or run of capitals: `HTTPServer` -> `httpServer`
pub fn to_lower_camel_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut end = 0;
    while end < chars.len()
        && chars[end].is_ascii_uppercase()
        && !chars.get(end + 1).is_some_and(|c| c.is_ascii_lowercase())
    {
        end += 1;
    }
    if end == 0 && chars.first().is_some_and(|c| c.is_ascii_uppercase()) {
        end = 1;
    }

    let mut result: String = chars[..end].iter().map(|c| c.to_ascii_lowercase()).collect();
    result.extend(&chars[end..]);
    result
}

/// Naive English plural: `city` -> `cities`, `key` -> `keys`, `news` unchanged
pub fn pluralize(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    if s.is_empty() || lower.ends_with('s') {
        s.to_string()
    } else if lower.ends_with('y') && !lower.ends_with("ey") {
        format!("{}ies", &s[..s.len() - 1])
    } else {
        format!("{}s", s)
    }
}

/// Owning navigations mark their targets as owned and record the ownership
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipConvention;

impl ModelConvention for OwnershipConvention {
    fn name(&self) -> &'static str {
        "ownership"
    }

    fn apply(&self, model: &mut ModelBuilder) -> SchemaResult<()> {
        let mut ownerships = Vec::new();
        for t in model.entity_types() {
            for nav in t.declared_navigations() {
                if model.entity_type(&nav.target_type).is_none() {
                    return Err(SchemaError::UnknownNavigationTarget {
                        entity_type: t.name.clone(),
                        navigation: nav.name.clone(),
                        target: nav.target_type.clone(),
                    });
                }
                if nav.is_ownership {
                    ownerships.push((
                        nav.target_type.clone(),
                        Ownership {
                            owner_type: t.name.clone(),
                            navigation: nav.name.clone(),
                            is_collection: nav.is_collection,
                        },
                    ));
                }
            }
        }

        for (target, ownership) in ownerships {
            let Some(owned) = model.entity_type_mut(&target) else {
                continue;
            };
            match &owned.ownership {
                Some(existing) if *existing != ownership => {
                    return Err(SchemaError::MultipleOwners {
                        entity_type: target,
                        first: existing.owner_type.clone(),
                        second: ownership.owner_type,
                    });
                }
                _ => {
                    owned.is_owned = true;
                    owned.ownership = Some(ownership);
                }
            }
        }
        Ok(())
    }
}

/// A property named `Id` or `<Type>Id` becomes the key of root types
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDiscoveryConvention;

impl ModelConvention for KeyDiscoveryConvention {
    fn name(&self) -> &'static str {
        "key-discovery"
    }

    fn apply(&self, model: &mut ModelBuilder) -> SchemaResult<()> {
        for t in model.entity_types_mut() {
            if t.primary_key.is_some() || t.base_type.is_some() || t.is_owned {
                continue;
            }
            let type_key = format!("{}id", t.name.to_ascii_lowercase());
            let key = t
                .declared_properties()
                .find(|p| {
                    let name = p.name.to_ascii_lowercase();
                    name == "id" || name == type_key
                })
                .map(|p| p.name.clone());
            if let Some(key) = key {
                t.primary_key = Some(vec![key]);
            }
        }
        Ok(())
    }
}

/// Owned and keyless types become complex types; owned types lose their keys
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnedDocumentConvention;

impl ModelConvention for OwnedDocumentConvention {
    fn name(&self) -> &'static str {
        "owned-document"
    }

    fn apply(&self, model: &mut ModelBuilder) -> SchemaResult<()> {
        for t in model.entity_types_mut() {
            if t.is_owned {
                if let Some(key) = t.primary_key.take() {
                    let shadow_keys: Vec<String> = key
                        .into_iter()
                        .filter(|k| t.find_declared_property(k).is_some_and(|p| p.is_shadow))
                        .collect();
                    t.remove_properties(&shadow_keys);
                }
                t.is_complex_type = true;
            } else if t.primary_key.is_none() && t.base_type.is_none() {
                t.is_complex_type = true;
            }
        }

        for t in model.entity_types() {
            assert!(
                !(t.is_owned && t.primary_key.is_some()),
                "owned entity type {} retained a primary key after normalization",
                t.name
            );
        }
        Ok(())
    }
}

/// Single-property keys of root types are stored as `_id`
#[derive(Debug, Clone)]
pub struct ElementNameConvention {
    pub key_element: String,
    /// Lower-camel-case every other element name
    pub camel_case: bool,
}

impl Default for ElementNameConvention {
    fn default() -> Self {
        Self {
            key_element: KEY_ELEMENT.to_string(),
            camel_case: false,
        }
    }
}

impl ModelConvention for ElementNameConvention {
    fn name(&self) -> &'static str {
        "element-name"
    }

    fn apply(&self, model: &mut ModelBuilder) -> SchemaResult<()> {
        for t in model.entity_types_mut() {
            let key = match &t.primary_key {
                Some(key) if key.len() == 1 && t.base_type.is_none() => Some(key[0].clone()),
                _ => None,
            };
            let camel_case = self.camel_case;
            for p in t.declared_properties_mut() {
                if p.element_name.is_some() {
                    continue;
                }
                if key.as_deref() == Some(p.name.as_str()) {
                    p.element_name = Some(self.key_element.clone());
                } else if camel_case {
                    p.element_name = Some(to_lower_camel_case(&p.name));
                }
            }
        }
        Ok(())
    }
}

/// Root document types without a collection name get one from their type name
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionNameConvention {
    pub naming: CollectionNaming,
}

impl ModelConvention for CollectionNameConvention {
    fn name(&self) -> &'static str {
        "collection-name"
    }

    fn apply(&self, model: &mut ModelBuilder) -> SchemaResult<()> {
        for t in model.entity_types_mut() {
            if t.base_type.is_none() && !t.is_owned && t.collection_name.is_none() {
                t.collection_name = Some(self.naming.collection_name(&t.name));
            }
        }
        Ok(())
    }
}

/// Discriminators default to the type name
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscriminatorConvention;

impl ModelConvention for DiscriminatorConvention {
    fn name(&self) -> &'static str {
        "discriminator"
    }

    fn apply(&self, model: &mut ModelBuilder) -> SchemaResult<()> {
        for t in model.entity_types_mut() {
            if t.discriminator.is_none() {
                t.discriminator = Some(t.name.clone());
            }
        }
        Ok(())
    }
}

/// Single ObjectId, Guid or integer keys of root types are generated on add
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueGenerationConvention;

impl ModelConvention for ValueGenerationConvention {
    fn name(&self) -> &'static str {
        "value-generation"
    }

    fn apply(&self, model: &mut ModelBuilder) -> SchemaResult<()> {
        for t in model.entity_types_mut() {
            let key = match &t.primary_key {
                Some(key) if key.len() == 1 && !t.is_owned => key[0].clone(),
                _ => continue,
            };
            for p in t.declared_properties_mut() {
                if p.name != key || p.value_generated.is_some() {
                    continue;
                }
                if matches!(
                    p.clr_type.unwrap_nullable(),
                    ClrType::ObjectId
                        | ClrType::Guid
                        | ClrType::Int16
                        | ClrType::Int32
                        | ClrType::Int64
                ) {
                    p.value_generated = Some(ValueGenerated::OnAdd);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityType, Navigation, Property};

    #[test]
    fn test_lower_camel_case() {
        assert_eq!(to_lower_camel_case("Family"), "family");
        assert_eq!(to_lower_camel_case("HTTPServer"), "httpServer");
        assert_eq!(to_lower_camel_case("IPhone"), "iPhone");
        assert_eq!(to_lower_camel_case("ABC"), "abc");
        assert_eq!(to_lower_camel_case("already"), "already");
        assert_eq!(to_lower_camel_case(""), "");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("family"), "families");
        assert_eq!(pluralize("key"), "keys");
        assert_eq!(pluralize("employee"), "employees");
        assert_eq!(pluralize("news"), "news");
        assert_eq!(pluralize("httpServer"), "httpServers");
    }

    #[test]
    fn test_collection_naming_strategies() {
        assert_eq!(CollectionNaming::PluralCamelCase.collection_name("Company"), "companies");
        assert_eq!(CollectionNaming::CamelCase.collection_name("Company"), "company");
        assert_eq!(CollectionNaming::TypeName.collection_name("Company"), "Company");
    }

    #[test]
    fn test_owned_types_lose_keys() {
        let schema = ModelBuilder::new()
            .with_entity_type(
                EntityType::new("Order")
                    .with_property(Property::new("OrderId", ClrType::Int32))
                    .with_navigation(Navigation::collection("Lines", "OrderLine").owned()),
            )
            .with_entity_type(
                EntityType::new("OrderLine")
                    .with_property(Property::new("LineId", ClrType::Int32).shadow())
                    .with_property(Property::new("Sku", ClrType::String))
                    .with_key(&["LineId"]),
            )
            .finalize(&ConventionSet::default())
            .unwrap();

        let order = schema.entity_type("Order").unwrap();
        assert_eq!(order.primary_key, Some(vec!["OrderId".to_string()]));
        assert!(!order.is_complex_type);
        assert_eq!(order.collection_name.as_deref(), Some("orders"));

        let line = schema.entity_type("OrderLine").unwrap();
        assert!(line.is_owned);
        assert!(line.is_complex_type);
        assert!(line.primary_key.is_none());
        assert!(line.find_declared_property("LineId").is_none());
        assert_eq!(
            line.ownership,
            Some(Ownership {
                owner_type: "Order".to_string(),
                navigation: "Lines".to_string(),
                is_collection: true,
            })
        );
        assert!(line.collection_name.is_none());
    }

    #[test]
    fn test_key_conventions() {
        let schema = ModelBuilder::new()
            .with_entity_type(
                EntityType::new("Company")
                    .with_property(Property::new("CompanyId", ClrType::ObjectId))
                    .with_property(Property::new("Name", ClrType::String)),
            )
            .finalize(&ConventionSet::default())
            .unwrap();

        let company = schema.entity_type("Company").unwrap();
        let id = company.find_declared_property("CompanyId").unwrap();
        assert_eq!(id.element(), KEY_ELEMENT);
        assert_eq!(id.generation(), ValueGenerated::OnAdd);
        assert_eq!(company.find_declared_property("Name").unwrap().element(), "Name");
    }

    #[test]
    fn test_explicit_values_are_kept() {
        let schema = ModelBuilder::new()
            .with_entity_type(
                EntityType::new("Person")
                    .with_collection_name("people")
                    .with_property(
                        Property::new("Id", ClrType::Int32)
                            .with_value_generated(ValueGenerated::Never),
                    ),
            )
            .finalize(&ConventionSet::default())
            .unwrap();

        let person = schema.entity_type("Person").unwrap();
        assert_eq!(person.collection_name.as_deref(), Some("people"));
        assert_eq!(
            person.find_declared_property("Id").unwrap().generation(),
            ValueGenerated::Never
        );
    }

    #[test]
    fn test_multiple_owners_rejected() {
        let result = ModelBuilder::new()
            .with_entity_type(
                EntityType::new("Customer")
                    .with_property(Property::new("Id", ClrType::Int32))
                    .with_navigation(Navigation::reference("Address", "Address").owned()),
            )
            .with_entity_type(
                EntityType::new("Supplier")
                    .with_property(Property::new("Id", ClrType::Int32))
                    .with_navigation(Navigation::reference("Address", "Address").owned()),
            )
            .with_entity_type(EntityType::new("Address"))
            .finalize(&ConventionSet::default());

        assert_eq!(
            result.unwrap_err(),
            SchemaError::MultipleOwners {
                entity_type: "Address".to_string(),
                first: "Customer".to_string(),
                second: "Supplier".to_string(),
            }
        );
    }
}
