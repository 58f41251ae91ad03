//! Value types exchanged between records, converters and the database.
//!
//! - [`SqlValue`]: what is written to / read from a column
//! - [`FieldValue`]: what a record field holds in its domain type
//! - [`Row`]: one result row, addressed by column name

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{Result, SyncError};

/// A database-writable value.
///
/// MySQL's text protocol returns every non-NULL value as bytes, so readers
/// must accept `Text`/`Bytes` for any column type and parse them.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Signed integer.
    Int(i64),
    /// Unsigned integer (BIGINT UNSIGNED, last insert ids).
    UInt(u64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Character data.
    Text(String),
    /// Raw bytes as delivered by the text protocol.
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short type label used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Int(_) => "integer",
            SqlValue::UInt(_) => "unsigned integer",
            SqlValue::Float(_) => "float",
            SqlValue::Double(_) => "double",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
        }
    }

    /// Borrow the value as UTF-8 text, if it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            SqlValue::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Interpret the value as a signed integer, parsing text if needed.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::UInt(v) => i64::try_from(*v).ok(),
            SqlValue::Text(_) | SqlValue::Bytes(_) => self.as_text()?.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::UInt(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Double(v) => write!(f, "{}", v),
            SqlValue::Text(s) => write!(f, "'{}'", s),
            SqlValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "'{}'", s),
                Err(_) => write!(f, "<{} bytes>", b.len()),
            },
        }
    }
}

impl From<mysql_async::Value> for SqlValue {
    fn from(value: mysql_async::Value) -> Self {
        use mysql_async::Value;
        match value {
            Value::NULL => SqlValue::Null,
            Value::Bytes(b) => SqlValue::Bytes(b),
            Value::Int(i) => SqlValue::Int(i),
            Value::UInt(u) => SqlValue::UInt(u),
            Value::Float(f) => SqlValue::Float(f),
            Value::Double(d) => SqlValue::Double(d),
            Value::Date(y, mo, d, h, mi, s, us) => SqlValue::Text(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
                y, mo, d, h, mi, s, us
            )),
            Value::Time(neg, days, h, mi, s, us) => SqlValue::Text(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                if neg { "-" } else { "" },
                u32::from(h) + days * 24,
                mi,
                s,
                us
            )),
        }
    }
}

impl From<SqlValue> for mysql_async::Value {
    fn from(value: SqlValue) -> Self {
        use mysql_async::Value;
        match value {
            SqlValue::Null => Value::NULL,
            SqlValue::Int(i) => Value::Int(i),
            SqlValue::UInt(u) => Value::UInt(u),
            SqlValue::Float(f) => Value::Float(f),
            SqlValue::Double(d) => Value::Double(d),
            SqlValue::Text(s) => Value::Bytes(s.into_bytes()),
            SqlValue::Bytes(b) => Value::Bytes(b),
        }
    }
}

/// The value of a record field in its domain type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Field is unset (`None`).
    Null,
    Text(String),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// Point in time, stored as epoch milliseconds.
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Short type label used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Text(_) => "String",
            FieldValue::I32(_) => "i32",
            FieldValue::I64(_) => "i64",
            FieldValue::F32(_) => "f32",
            FieldValue::F64(_) => "f64",
            FieldValue::Bool(_) => "bool",
            FieldValue::Timestamp(_) => "DateTime<Utc>",
        }
    }
}

macro_rules! field_value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    FieldValue::$variant(v)
                }
            }

            impl From<Option<$ty>> for FieldValue {
                fn from(v: Option<$ty>) -> Self {
                    v.map(FieldValue::$variant).unwrap_or(FieldValue::Null)
                }
            }

            impl TryFrom<FieldValue> for $ty {
                type Error = SyncError;

                fn try_from(v: FieldValue) -> Result<Self> {
                    match v {
                        FieldValue::$variant(inner) => Ok(inner),
                        other => Err(SyncError::conversion(
                            "<field>",
                            stringify!($ty),
                            other.kind(),
                        )),
                    }
                }
            }

            impl TryFrom<FieldValue> for Option<$ty> {
                type Error = SyncError;

                fn try_from(v: FieldValue) -> Result<Self> {
                    match v {
                        FieldValue::Null => Ok(None),
                        other => <$ty>::try_from(other).map(Some),
                    }
                }
            }
        )*
    };
}

field_value_conversions! {
    String => Text,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    DateTime<Utc> => Timestamp,
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// One result row. Column lookup ignores ASCII case, matching MySQL's
/// treatment of column identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column value.
    pub fn push(&mut self, column: impl Into<String>, value: SqlValue) {
        self.columns.push((column.into(), value));
    }

    /// Builder form of [`Row::push`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: SqlValue) -> Self {
        self.push(column, value);
        self
    }

    /// Look up a column value by name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, v)| v)
    }

    /// Look up a column value by position.
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.columns.get(index).map(|(_, v)| v)
    }

    /// Get a column as text, failing if it is missing or not textual.
    pub fn get_string(&self, column: &str) -> Result<String> {
        match self.get(column) {
            Some(v) => v
                .as_text()
                .map(str::to_string)
                .ok_or_else(|| SyncError::conversion(column, "String", v.kind())),
            None => Err(SyncError::conversion(column, "String", "missing column")),
        }
    }

    /// Get a column as text, mapping NULL or a missing column to `None`.
    pub fn get_opt_string(&self, column: &str) -> Result<Option<String>> {
        match self.get(column) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(_) => self.get_string(column).map(Some),
        }
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in result order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}

impl From<mysql_async::Row> for Row {
    fn from(row: mysql_async::Row) -> Self {
        let names: Vec<String> = row
            .columns_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();
        let values = row.unwrap();
        Row {
            columns: names
                .into_iter()
                .zip(values.into_iter().map(SqlValue::from))
                .collect(),
        }
    }
}
