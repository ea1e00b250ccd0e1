//! Client-side value generation for keys and concurrency tokens

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

use crate::ast::ClrType;
use crate::metadata::{Property, ValueGenerated};

use super::entry::UpdateEntry;
use super::error::{UpdateError, UpdateResult};

/// Produces fresh values for one property
pub trait ValueGenerator: fmt::Debug + Send + Sync {
    fn next(&self) -> Value;
}

/// 12-byte object ids rendered as 24 hex digits: seconds since the epoch,
/// a per-generator random tag, then a wrapping counter
#[derive(Debug)]
pub struct ObjectIdValueGenerator {
    tag: [u8; 5],
    counter: AtomicU32,
}

impl ObjectIdValueGenerator {
    pub fn new() -> Self {
        let random = Uuid::new_v4();
        let bytes = random.as_bytes();
        let mut tag = [0u8; 5];
        tag.copy_from_slice(&bytes[..5]);
        let start = u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]);
        Self {
            tag,
            counter: AtomicU32::new(start),
        }
    }
}

impl Default for ObjectIdValueGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueGenerator for ObjectIdValueGenerator {
    fn next(&self) -> Value {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        let counter = self.counter.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = Vec::with_capacity(12);
        bytes.extend_from_slice(&seconds.to_be_bytes());
        bytes.extend_from_slice(&self.tag);
        bytes.extend_from_slice(&counter.to_be_bytes()[1..]);
        Value::from(bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>())
    }
}

/// Random v4 uuids
#[derive(Debug, Default)]
pub struct GuidValueGenerator;

impl ValueGenerator for GuidValueGenerator {
    fn next(&self) -> Value {
        Value::from(Uuid::new_v4().to_string())
    }
}

/// Increasing integers starting from a seed
#[derive(Debug)]
pub struct SequentialValueGenerator {
    next: AtomicI64,
}

impl SequentialValueGenerator {
    pub fn starting_at(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}

impl Default for SequentialValueGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl ValueGenerator for SequentialValueGenerator {
    fn next(&self) -> Value {
        Value::from(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// One generator per (declaring type, property), shared across saves
#[derive(Debug, Default)]
pub struct ValueGeneratorSelector {
    cache: DashMap<(String, String), Arc<dyn ValueGenerator>>,
}

impl ValueGeneratorSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, property: &Property) -> UpdateResult<Arc<dyn ValueGenerator>> {
        let key = (property.declaring_type.clone(), property.name.clone());
        if let Some(generator) = self.cache.get(&key) {
            return Ok(generator.value().clone());
        }

        trace!(
            entity_type = %property.declaring_type,
            property = %property.name,
            "creating value generator"
        );
        let created = create_generator(property)?;
        Ok(self.cache.entry(key).or_insert(created).value().clone())
    }

    /// Fill in values the store expects the client to generate.
    ///
    /// On add, unset generated properties get a value. Properties generated
    /// on add or update get a fresh value on every write.
    pub fn generate_values(
        &self,
        properties: &[Property],
        entry: &mut UpdateEntry,
        adding: bool,
    ) -> UpdateResult<()> {
        for property in properties {
            let generate = match property.generation() {
                ValueGenerated::Never => false,
                ValueGenerated::OnAdd => adding && is_unset(entry.current_value(&property.name)),
                ValueGenerated::OnAddOrUpdate => true,
            };
            if generate {
                let value = self.select(property)?.next();
                entry.set_current_value(property.name.clone(), value);
            }
        }
        Ok(())
    }
}

fn create_generator(property: &Property) -> UpdateResult<Arc<dyn ValueGenerator>> {
    match property.clr_type.unwrap_nullable() {
        ClrType::ObjectId => Ok(Arc::new(ObjectIdValueGenerator::new())),
        ClrType::Guid => Ok(Arc::new(GuidValueGenerator)),
        ClrType::Int16 | ClrType::Int32 | ClrType::Int64 => {
            Ok(Arc::new(SequentialValueGenerator::default()))
        }
        other => Err(UpdateError::NoValueGenerator {
            entity_type: property.declaring_type.clone(),
            property: property.name.clone(),
            clr_type: other.to_string(),
        }),
    }
}

/// Missing, null or the type's default value
fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Number(n)) => n.as_i64() == Some(0),
        Some(Value::String(s)) => {
            s.is_empty() || s.chars().all(|c| c == '0' || c == '-')
        }
        Some(_) => false,
    }
}
