//! Store type mappings for scalar values

use crate::ast::ClrType;

/// How a runtime type is stored in a document.
///
/// Every supported type is stored as-is, so a mapping only records the
/// runtime type it was resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeMapping {
    clr_type: ClrType,
}

impl TypeMapping {
    pub fn new(clr_type: ClrType) -> Self {
        Self { clr_type }
    }

    pub fn clr_type(&self) -> &ClrType {
        &self.clr_type
    }
}

/// Resolves default type mappings
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeMappingSource;

impl TypeMappingSource {
    /// Mapping for the type, or `None` if documents cannot hold it directly
    pub fn find_mapping(&self, clr_type: &ClrType) -> Option<TypeMapping> {
        self.is_mappable(clr_type)
            .then(|| TypeMapping::new(clr_type.clone()))
    }

    fn is_mappable(&self, clr_type: &ClrType) -> bool {
        match clr_type {
            ClrType::String | ClrType::Bytes | ClrType::ObjectId => true,
            ClrType::Nullable(inner) => self.is_mappable(inner),
            ClrType::Sequence(e)
            | ClrType::Collection(e)
            | ClrType::List(e)
            | ClrType::Array(e) => {
                self.is_mappable(e)
            }
            other => other.is_value_type(),
        }
    }
}
