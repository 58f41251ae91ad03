//! Column-equality filters with bound parameters.

use crate::core::traits::Dialect;
use crate::core::{FieldValue, SqlValue};

/// Domain value to the parameter written for it when no converter applies:
/// booleans as 1/0, timestamps as epoch milliseconds.
pub fn to_sql_value(value: FieldValue) -> SqlValue {
    match value {
        FieldValue::Null => SqlValue::Null,
        FieldValue::Text(s) => SqlValue::Text(s),
        FieldValue::I32(v) => SqlValue::Int(i64::from(v)),
        FieldValue::I64(v) => SqlValue::Int(v),
        FieldValue::F32(v) => SqlValue::Float(v),
        FieldValue::F64(v) => SqlValue::Double(v),
        FieldValue::Bool(v) => SqlValue::Int(i64::from(v)),
        FieldValue::Timestamp(t) => SqlValue::Int(t.timestamp_millis()),
    }
}

/// `column = value` conditions joined with AND.
///
/// ```rust
/// use tablesync::manager::QueryArguments;
///
/// let args = QueryArguments::new().arg("active", true).arg("name", "Ada");
/// assert_eq!(args.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryArguments {
    args: Vec<(String, SqlValue)>,
}

impl QueryArguments {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn arg(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        self.args
            .push((column.into(), to_sql_value(value.into())));
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// WHERE expression and its parameters. NULL values compare with IS NULL.
    pub(crate) fn to_where(&self, dialect: &dyn Dialect) -> (String, Vec<SqlValue>) {
        let mut conditions = Vec::with_capacity(self.args.len());
        let mut params = Vec::with_capacity(self.args.len());
        for (column, value) in &self.args {
            let column = dialect.quote_ident(column);
            if value.is_null() {
                conditions.push(format!("{} IS NULL", column));
            } else {
                conditions.push(format!("{} = ?", column));
                params.push(value.clone());
            }
        }
        (conditions.join(" AND "), params)
    }
}
