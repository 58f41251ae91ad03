//! Error types for schema synchronization and persistence.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for connection and driver errors.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for schema inspection and DDL errors.
pub const EXIT_SCHEMA_ERROR: u8 = 3;
/// Exit code for row-level read/write errors.
pub const EXIT_DATA_ERROR: u8 = 4;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for tablesync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Driver-level database error
    #[error("Database error: {0}")]
    Database(#[from] mysql_async::Error),

    /// Existence or column query against the live schema failed
    #[error("Failed to inspect table {table}: {message}")]
    TableInspection { table: String, message: String },

    /// A CREATE/ALTER statement was rejected
    #[error("DDL failed on {table}{}: {message}\n  Statement: {sql}", column_suffix(.column))]
    DdlExecution {
        table: String,
        column: Option<String>,
        sql: String,
        message: String,
    },

    /// A stored value could not be parsed back into its domain type
    #[error("Cannot read column {column} as {expected}: found {found}")]
    TypeConversion {
        column: String,
        expected: String,
        found: String,
    },

    /// The declared record shape cannot be mapped onto a table
    #[error("Invalid record definition for {record}: {message}")]
    RecordDefinition { record: String, message: String },

    /// Update or delete was requested for a record that has no id yet
    #[error("Record in table {0} has not been persisted")]
    NotPersisted(String),

    /// A record was asked for a field it does not declare
    #[error("Record {record} has no field named {field}")]
    UnknownField { record: String, field: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn column_suffix(column: &Option<String>) -> String {
    column
        .as_deref()
        .map(|c| format!(" (column {})", c))
        .unwrap_or_default()
}

impl SyncError {
    /// Create a TableInspection error.
    pub fn inspection(table: impl Into<String>, message: impl ToString) -> Self {
        SyncError::TableInspection {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a DdlExecution error carrying the failing statement.
    pub fn ddl(
        table: impl Into<String>,
        column: Option<&str>,
        sql: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        SyncError::DdlExecution {
            table: table.into(),
            column: column.map(str::to_string),
            sql: sql.into(),
            message: message.to_string(),
        }
    }

    /// Create a TypeConversion error.
    pub fn conversion(
        column: impl Into<String>,
        expected: impl Into<String>,
        found: impl ToString,
    ) -> Self {
        SyncError::TypeConversion {
            column: column.into(),
            expected: expected.into(),
            found: found.to_string(),
        }
    }

    /// Create a RecordDefinition error.
    pub fn definition(record: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::RecordDefinition {
            record: record.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Yaml(_) => EXIT_CONFIG_ERROR,
            SyncError::Database(_) => EXIT_CONNECTION_ERROR,
            SyncError::TableInspection { .. }
            | SyncError::DdlExecution { .. }
            | SyncError::RecordDefinition { .. } => EXIT_SCHEMA_ERROR,
            SyncError::TypeConversion { .. }
            | SyncError::NotPersisted(_)
            | SyncError::UnknownField { .. } => EXIT_DATA_ERROR,
            SyncError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for tablesync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
