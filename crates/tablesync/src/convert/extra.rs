//! Opt-in converters that are not part of the built-in set.

use uuid::Uuid;

use crate::core::{FieldValue, Row, SqlValue};
use crate::entity::{FieldDef, Record};
use crate::error::{Result, SyncError};

use super::{column_value, field_value, TypeConverter};

/// `uuid::Uuid` as CHAR(36) in hyphenated form.
///
/// The record exposes the field as `FieldValue::Text`; values are validated
/// and normalized to lower-case on both write and read.
pub struct UuidConverter;

impl UuidConverter {
    fn normalize(text: &str, column: &str) -> Result<String> {
        Uuid::parse_str(text.trim())
            .map(|u| u.hyphenated().to_string())
            .map_err(|e| SyncError::conversion(column, "Uuid", e))
    }
}

impl TypeConverter for UuidConverter {
    fn database_type(&self, _field: &FieldDef) -> String {
        "CHAR".to_string()
    }

    fn default_size(&self, _field: &FieldDef) -> Option<u32> {
        Some(36)
    }

    fn to_database_value(&self, record: &dyn Record, field: &str) -> Result<SqlValue> {
        match field_value(record, field)? {
            FieldValue::Null => Ok(SqlValue::Null),
            FieldValue::Text(s) => Self::normalize(&s, field).map(SqlValue::Text),
            other => Err(SyncError::conversion(field, "Uuid", other.kind())),
        }
    }

    fn from_database_value(&self, row: &Row, column: &str) -> Result<FieldValue> {
        let value = column_value(row, column);
        if value.is_null() {
            return Ok(FieldValue::Null);
        }
        let text = value
            .as_text()
            .ok_or_else(|| SyncError::conversion(column, "Uuid", value.kind()))?;
        Self::normalize(text, column).map(FieldValue::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagged(Option<String>);

    impl Record for Tagged {
        fn get_field(&self, field: &str) -> Option<FieldValue> {
            (field == "tag").then(|| self.0.clone().into())
        }
    }

    #[test]
    fn test_uuid_normalized_on_write() {
        let id = Uuid::new_v4();
        let upper = id.hyphenated().to_string().to_uppercase();
        let stored = UuidConverter
            .to_database_value(&Tagged(Some(upper)), "tag")
            .unwrap();
        assert_eq!(stored, SqlValue::Text(id.hyphenated().to_string()));
    }

    #[test]
    fn test_uuid_read_back() {
        let id = Uuid::new_v4();
        let row = Row::new().with("tag", SqlValue::Bytes(id.to_string().into_bytes()));
        assert_eq!(
            UuidConverter.from_database_value(&row, "tag").unwrap(),
            FieldValue::Text(id.to_string())
        );
    }

    #[test]
    fn test_invalid_uuid_rejected() {
        let err = UuidConverter
            .to_database_value(&Tagged(Some("not-a-uuid".into())), "tag")
            .unwrap_err();
        assert!(matches!(err, SyncError::TypeConversion { .. }));
        assert_eq!(
            UuidConverter
                .to_database_value(&Tagged(None), "tag")
                .unwrap(),
            SqlValue::Null
        );
    }

    #[test]
    fn test_uuid_column_type() {
        let field = FieldDef::of::<Uuid>("tag");
        assert_eq!(UuidConverter.database_type(&field), "CHAR");
        assert_eq!(UuidConverter.default_size(&field), Some(36));
    }
}
