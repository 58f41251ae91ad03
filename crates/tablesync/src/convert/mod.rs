//! Type converters between record field types and column values.
//!
//! Each domain type maps to one [`TypeConverter`], looked up by
//! [`DomainType`] key in a [`ConverterRegistry`]. The registry is built
//! explicitly and handed to whoever needs it; there is no process-wide
//! table.

mod builtin;
mod extra;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::core::{FieldValue, Row, SqlValue};
use crate::entity::{DomainType, FieldDef, Record};
use crate::error::{Result, SyncError};

pub use builtin::{
    BoolConverter, F32Converter, F64Converter, I32Converter, I64Converter, StringConverter,
    TimestampConverter,
};
pub use extra::UuidConverter;

/// Bidirectional mapping for one domain type.
pub trait TypeConverter: Send + Sync {
    /// Column type for a field of this domain type, without size suffix.
    fn database_type(&self, field: &FieldDef) -> String;

    /// Size used when the field declares none.
    ///
    /// `None` defers to the dialect's default for the database type.
    fn default_size(&self, _field: &FieldDef) -> Option<u32> {
        None
    }

    /// Read `field` off the record and produce the value to store.
    fn to_database_value(&self, record: &dyn Record, field: &str) -> Result<SqlValue>;

    /// Read `column` from a result row back into the domain type.
    fn from_database_value(&self, row: &Row, column: &str) -> Result<FieldValue>;
}

/// Current value of a record field, failing if the record does not have it.
pub(crate) fn field_value(record: &dyn Record, field: &str) -> Result<FieldValue> {
    record
        .get_field(field)
        .ok_or_else(|| SyncError::UnknownField {
            record: record.record_name().to_string(),
            field: field.to_string(),
        })
}

/// Column value from a row; a missing column reads as NULL.
pub(crate) fn column_value<'a>(row: &'a Row, column: &str) -> &'a SqlValue {
    const NULL: &SqlValue = &SqlValue::Null;
    row.get(column).unwrap_or(NULL)
}

/// Converters keyed by domain type.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tablesync::convert::{ConverterRegistry, UuidConverter};
///
/// let mut registry = ConverterRegistry::with_builtins();
/// registry.register::<uuid::Uuid>(Arc::new(UuidConverter));
/// assert!(registry.resolve_type::<uuid::Uuid>().is_some());
/// ```
#[derive(Default, Clone)]
pub struct ConverterRegistry {
    converters: HashMap<DomainType, Arc<dyn TypeConverter>>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with converters for `String`, `i32`, `i64`, `f64`, `f32`,
    /// `bool` and `DateTime<Utc>`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register::<String>(Arc::new(StringConverter));
        registry.register::<i32>(Arc::new(I32Converter));
        registry.register::<i64>(Arc::new(I64Converter));
        registry.register::<f64>(Arc::new(F64Converter));
        registry.register::<f32>(Arc::new(F32Converter));
        registry.register::<bool>(Arc::new(BoolConverter));
        registry.register::<chrono::DateTime<chrono::Utc>>(Arc::new(TimestampConverter));
        registry
    }

    /// Register a converter for domain type `T`. The latest registration wins.
    pub fn register<T: ?Sized + 'static>(&mut self, converter: Arc<dyn TypeConverter>) {
        self.register_key(DomainType::of::<T>(), converter);
    }

    /// Register a converter under an explicit key.
    pub fn register_key(&mut self, key: DomainType, converter: Arc<dyn TypeConverter>) {
        if self.converters.insert(key.clone(), converter).is_some() {
            debug!("Replaced converter for {}", key.as_str());
        }
    }

    /// Converter for a domain type key.
    pub fn resolve(&self, key: &DomainType) -> Option<Arc<dyn TypeConverter>> {
        self.converters.get(key).cloned()
    }

    pub fn resolve_type<T: ?Sized + 'static>(&self) -> Option<Arc<dyn TypeConverter>> {
        self.resolve(&DomainType::of::<T>())
    }

    /// Converter for a key, or a configuration error naming it.
    pub fn require(&self, key: &DomainType) -> Result<Arc<dyn TypeConverter>> {
        self.resolve(key).ok_or_else(|| {
            SyncError::Config(format!("No converter registered for type {}", key.as_str()))
        })
    }

    pub fn contains(&self, key: &DomainType) -> bool {
        self.converters.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn type_keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.converters.keys().map(DomainType::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("types", &self.type_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstConverter(&'static str);

    impl TypeConverter for ConstConverter {
        fn database_type(&self, _field: &FieldDef) -> String {
            self.0.to_string()
        }

        fn to_database_value(&self, _record: &dyn Record, _field: &str) -> Result<SqlValue> {
            Ok(SqlValue::Null)
        }

        fn from_database_value(&self, _row: &Row, _column: &str) -> Result<FieldValue> {
            Ok(FieldValue::Null)
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ConverterRegistry::with_builtins();
        for key in [
            DomainType::of::<String>(),
            DomainType::of::<i32>(),
            DomainType::of::<i64>(),
            DomainType::of::<f64>(),
            DomainType::of::<f32>(),
            DomainType::of::<bool>(),
            DomainType::of::<chrono::DateTime<chrono::Utc>>(),
        ] {
            assert!(registry.contains(&key), "missing {}", key.as_str());
        }
        assert!(registry.resolve_type::<u8>().is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ConverterRegistry::with_builtins();
        registry.register::<String>(Arc::new(ConstConverter("CHAR")));

        let field = FieldDef::of::<String>("code");
        let converter = registry.resolve_type::<String>().unwrap();
        assert_eq!(converter.database_type(&field), "CHAR");
    }

    #[test]
    fn test_require_unknown_type() {
        let registry = ConverterRegistry::new();
        let err = registry.require(&DomainType::of::<u16>()).err().unwrap();
        assert!(err.to_string().contains("u16"));
    }

    #[test]
    fn test_missing_column_reads_null() {
        let row = Row::new();
        assert_eq!(column_value(&row, "x"), &SqlValue::Null);
    }
}
