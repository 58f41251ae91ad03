//! Converters for the built-in scalar domain types.
//!
//! Reads accept both typed values and the textual form MySQL's text protocol
//! delivers; anything that does not parse is a `TypeConversion` error.

use chrono::{DateTime, Utc};

use crate::core::{FieldValue, Row, SqlValue};
use crate::entity::{FieldDef, Record};
use crate::error::{Result, SyncError};

use super::{column_value, field_value, TypeConverter};

fn mismatch(field: &str, expected: &str, found: &FieldValue) -> SyncError {
    SyncError::conversion(field, expected, found.kind())
}

fn parse_text<T: std::str::FromStr>(value: &SqlValue, column: &str, expected: &str) -> Result<T> {
    let text = value
        .as_text()
        .ok_or_else(|| SyncError::conversion(column, expected, value.kind()))?;
    text.trim()
        .parse()
        .map_err(|_| SyncError::conversion(column, expected, format!("'{}'", text)))
}

fn read_i64(value: &SqlValue, column: &str, expected: &str) -> Result<i64> {
    match value {
        SqlValue::Int(v) => Ok(*v),
        SqlValue::UInt(v) => {
            i64::try_from(*v).map_err(|_| SyncError::conversion(column, expected, v))
        }
        SqlValue::Text(_) | SqlValue::Bytes(_) => parse_text(value, column, expected),
        other => Err(SyncError::conversion(column, expected, other.kind())),
    }
}

fn read_f64(value: &SqlValue, column: &str, expected: &str) -> Result<f64> {
    match value {
        SqlValue::Double(v) => Ok(*v),
        SqlValue::Float(v) => Ok(f64::from(*v)),
        SqlValue::Int(v) => Ok(*v as f64),
        SqlValue::UInt(v) => Ok(*v as f64),
        SqlValue::Text(_) | SqlValue::Bytes(_) => parse_text(value, column, expected),
        SqlValue::Null => Err(SyncError::conversion(column, expected, "NULL")),
    }
}

/// `String` as VARCHAR, or TEXT/MEDIUMTEXT/LONGTEXT when the field asks for it.
pub struct StringConverter;

impl TypeConverter for StringConverter {
    fn database_type(&self, field: &FieldDef) -> String {
        field
            .text_storage
            .map(|s| s.database_type())
            .unwrap_or("VARCHAR")
            .to_string()
    }

    fn to_database_value(&self, record: &dyn Record, field: &str) -> Result<SqlValue> {
        match field_value(record, field)? {
            FieldValue::Null => Ok(SqlValue::Null),
            FieldValue::Text(s) => Ok(SqlValue::Text(s)),
            other => Err(mismatch(field, "String", &other)),
        }
    }

    fn from_database_value(&self, row: &Row, column: &str) -> Result<FieldValue> {
        match column_value(row, column) {
            SqlValue::Null => Ok(FieldValue::Null),
            SqlValue::Text(s) => Ok(FieldValue::Text(s.clone())),
            SqlValue::Bytes(b) => String::from_utf8(b.clone())
                .map(FieldValue::Text)
                .map_err(|_| SyncError::conversion(column, "String", "invalid UTF-8")),
            other => Ok(FieldValue::Text(other.to_string())),
        }
    }
}

/// `i32` as INT.
pub struct I32Converter;

impl TypeConverter for I32Converter {
    fn database_type(&self, _field: &FieldDef) -> String {
        "INT".to_string()
    }

    fn to_database_value(&self, record: &dyn Record, field: &str) -> Result<SqlValue> {
        match field_value(record, field)? {
            FieldValue::Null => Ok(SqlValue::Null),
            FieldValue::I32(v) => Ok(SqlValue::Int(i64::from(v))),
            other => Err(mismatch(field, "i32", &other)),
        }
    }

    fn from_database_value(&self, row: &Row, column: &str) -> Result<FieldValue> {
        match column_value(row, column) {
            SqlValue::Null => Ok(FieldValue::Null),
            value => {
                let wide = read_i64(value, column, "i32")?;
                i32::try_from(wide)
                    .map(FieldValue::I32)
                    .map_err(|_| SyncError::conversion(column, "i32", wide))
            }
        }
    }
}

/// `i64` as BIGINT.
pub struct I64Converter;

impl TypeConverter for I64Converter {
    fn database_type(&self, _field: &FieldDef) -> String {
        "BIGINT".to_string()
    }

    fn to_database_value(&self, record: &dyn Record, field: &str) -> Result<SqlValue> {
        match field_value(record, field)? {
            FieldValue::Null => Ok(SqlValue::Null),
            FieldValue::I64(v) => Ok(SqlValue::Int(v)),
            other => Err(mismatch(field, "i64", &other)),
        }
    }

    fn from_database_value(&self, row: &Row, column: &str) -> Result<FieldValue> {
        match column_value(row, column) {
            SqlValue::Null => Ok(FieldValue::Null),
            value => read_i64(value, column, "i64").map(FieldValue::I64),
        }
    }
}

/// `f64` as DOUBLE.
pub struct F64Converter;

impl TypeConverter for F64Converter {
    fn database_type(&self, _field: &FieldDef) -> String {
        "DOUBLE".to_string()
    }

    fn to_database_value(&self, record: &dyn Record, field: &str) -> Result<SqlValue> {
        match field_value(record, field)? {
            FieldValue::Null => Ok(SqlValue::Null),
            FieldValue::F64(v) => Ok(SqlValue::Double(v)),
            other => Err(mismatch(field, "f64", &other)),
        }
    }

    fn from_database_value(&self, row: &Row, column: &str) -> Result<FieldValue> {
        match column_value(row, column) {
            SqlValue::Null => Ok(FieldValue::Null),
            value => read_f64(value, column, "f64").map(FieldValue::F64),
        }
    }
}

/// `f32` as FLOAT.
pub struct F32Converter;

impl TypeConverter for F32Converter {
    fn database_type(&self, _field: &FieldDef) -> String {
        "FLOAT".to_string()
    }

    fn to_database_value(&self, record: &dyn Record, field: &str) -> Result<SqlValue> {
        match field_value(record, field)? {
            FieldValue::Null => Ok(SqlValue::Null),
            FieldValue::F32(v) => Ok(SqlValue::Float(v)),
            other => Err(mismatch(field, "f32", &other)),
        }
    }

    fn from_database_value(&self, row: &Row, column: &str) -> Result<FieldValue> {
        match column_value(row, column) {
            SqlValue::Null => Ok(FieldValue::Null),
            SqlValue::Float(v) => Ok(FieldValue::F32(*v)),
            // Text goes straight to f32 so the shortest decimal form round-trips.
            value @ (SqlValue::Text(_) | SqlValue::Bytes(_)) => {
                parse_text(value, column, "f32").map(FieldValue::F32)
            }
            value => read_f64(value, column, "f32").map(|v| FieldValue::F32(v as f32)),
        }
    }
}

/// `bool` as TINYINT(1), stored as 0 or 1.
pub struct BoolConverter;

impl TypeConverter for BoolConverter {
    fn database_type(&self, _field: &FieldDef) -> String {
        "TINYINT".to_string()
    }

    fn default_size(&self, _field: &FieldDef) -> Option<u32> {
        Some(1)
    }

    fn to_database_value(&self, record: &dyn Record, field: &str) -> Result<SqlValue> {
        match field_value(record, field)? {
            FieldValue::Null => Ok(SqlValue::Null),
            FieldValue::Bool(v) => Ok(SqlValue::Int(i64::from(v))),
            other => Err(mismatch(field, "bool", &other)),
        }
    }

    fn from_database_value(&self, row: &Row, column: &str) -> Result<FieldValue> {
        let value = column_value(row, column);
        if value.is_null() {
            return Ok(FieldValue::Null);
        }
        if let Some(text) = value.as_text() {
            match text.trim().to_ascii_lowercase().as_str() {
                "true" => return Ok(FieldValue::Bool(true)),
                "false" => return Ok(FieldValue::Bool(false)),
                _ => {}
            }
        }
        read_i64(value, column, "bool").map(|v| FieldValue::Bool(v != 0))
    }
}

/// `DateTime<Utc>` as BIGINT epoch milliseconds.
pub struct TimestampConverter;

impl TypeConverter for TimestampConverter {
    fn database_type(&self, _field: &FieldDef) -> String {
        "BIGINT".to_string()
    }

    fn to_database_value(&self, record: &dyn Record, field: &str) -> Result<SqlValue> {
        match field_value(record, field)? {
            FieldValue::Null => Ok(SqlValue::Null),
            FieldValue::Timestamp(t) => Ok(SqlValue::Int(t.timestamp_millis())),
            other => Err(mismatch(field, "DateTime<Utc>", &other)),
        }
    }

    fn from_database_value(&self, row: &Row, column: &str) -> Result<FieldValue> {
        match column_value(row, column) {
            SqlValue::Null => Ok(FieldValue::Null),
            value => {
                let millis = read_i64(value, column, "DateTime<Utc>")?;
                DateTime::<Utc>::from_timestamp_millis(millis)
                    .map(FieldValue::Timestamp)
                    .ok_or_else(|| SyncError::conversion(column, "DateTime<Utc>", millis))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::TextStorage;

    struct One(&'static str, FieldValue);

    impl Record for One {
        fn get_field(&self, field: &str) -> Option<FieldValue> {
            (field == self.0).then(|| self.1.clone())
        }
    }

    /// Write through the converter, then read the stored value back from a
    /// row the way the text protocol would deliver it.
    fn round_trip(converter: &dyn TypeConverter, value: FieldValue) -> FieldValue {
        let stored = converter
            .to_database_value(&One("f", value), "f")
            .unwrap();
        let wire = match stored {
            SqlValue::Null => SqlValue::Null,
            SqlValue::Text(s) => SqlValue::Bytes(s.into_bytes()),
            other => SqlValue::Bytes(other.to_string().into_bytes()),
        };
        converter
            .from_database_value(&Row::new().with("f", wire), "f")
            .unwrap()
    }

    #[test]
    fn test_string_database_type() {
        let c = StringConverter;
        assert_eq!(c.database_type(&FieldDef::of::<String>("a")), "VARCHAR");
        assert_eq!(
            c.database_type(&FieldDef::of::<String>("a").long_text()),
            "LONGTEXT"
        );
        assert_eq!(
            c.database_type(&FieldDef::of::<String>("a").text_storage(TextStorage::MediumText)),
            "MEDIUMTEXT"
        );
    }

    #[test]
    fn test_round_trips() {
        let cases: Vec<(&dyn TypeConverter, FieldValue)> = vec![
            (&StringConverter, FieldValue::Text(String::new())),
            (&StringConverter, FieldValue::Text("ünïcödé".into())),
            (&I32Converter, FieldValue::I32(0)),
            (&I32Converter, FieldValue::I32(-2_147_483_648)),
            (&I64Converter, FieldValue::I64(i64::MAX)),
            (&F64Converter, FieldValue::F64(-0.5)),
            (&F32Converter, FieldValue::F32(123.123)),
            (&BoolConverter, FieldValue::Bool(false)),
            (&BoolConverter, FieldValue::Bool(true)),
            (
                &TimestampConverter,
                FieldValue::Timestamp(DateTime::<Utc>::from_timestamp_millis(0).unwrap()),
            ),
            (
                &TimestampConverter,
                FieldValue::Timestamp(
                    DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap(),
                ),
            ),
            (&I32Converter, FieldValue::Null),
            (&StringConverter, FieldValue::Null),
        ];

        for (converter, value) in cases {
            assert_eq!(round_trip(converter, value.clone()), value);
        }
    }

    #[test]
    fn test_bool_stored_as_integer() {
        let stored = BoolConverter
            .to_database_value(&One("b", FieldValue::Bool(true)), "b")
            .unwrap();
        assert_eq!(stored, SqlValue::Int(1));
    }

    #[test]
    fn test_timestamp_stored_as_millis() {
        let t = DateTime::<Utc>::from_timestamp_millis(86_400_000).unwrap();
        let stored = TimestampConverter
            .to_database_value(&One("t", FieldValue::Timestamp(t)), "t")
            .unwrap();
        assert_eq!(stored, SqlValue::Int(86_400_000));
    }

    #[test]
    fn test_unparseable_value_is_conversion_error() {
        let row = Row::new().with("age", SqlValue::Bytes(b"abc".to_vec()));
        let err = I32Converter.from_database_value(&row, "age").unwrap_err();
        assert!(matches!(err, SyncError::TypeConversion { .. }));
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_out_of_range_i32() {
        let row = Row::new().with("n", SqlValue::Int(i64::from(i32::MAX) + 1));
        assert!(I32Converter.from_database_value(&row, "n").is_err());
    }

    #[test]
    fn test_typed_values_accepted() {
        let row = Row::new()
            .with("i", SqlValue::Int(7))
            .with("d", SqlValue::Double(1.5))
            .with("b", SqlValue::Int(0));
        assert_eq!(
            I64Converter.from_database_value(&row, "i").unwrap(),
            FieldValue::I64(7)
        );
        assert_eq!(
            F64Converter.from_database_value(&row, "d").unwrap(),
            FieldValue::F64(1.5)
        );
        assert_eq!(
            BoolConverter.from_database_value(&row, "b").unwrap(),
            FieldValue::Bool(false)
        );
    }

    #[test]
    fn test_wrong_field_type_rejected() {
        let err = I32Converter
            .to_database_value(&One("n", FieldValue::Text("1".into())), "n")
            .unwrap_err();
        assert!(matches!(err, SyncError::TypeConversion { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = StringConverter
            .to_database_value(&One("a", FieldValue::Null), "b")
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownField { .. }));
    }
}
