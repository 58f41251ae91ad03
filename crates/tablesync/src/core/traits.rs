//! Core traits separating the sync engine from a concrete database.
//!
//! - [`Database`]: executes SQL statements on one connection
//! - [`SchemaBackend`]: inspects the live schema and applies DDL
//! - [`Dialect`]: SQL syntax and type sizing rules for a database engine
//!
//! # Design Patterns
//!
//! - **Strategy**: `Dialect` provides interchangeable SQL rendering
//! - **Adapter**: `SchemaBackend` lets the reconciler run against a live
//!   database or an in-memory snapshot without knowing which

use async_trait::async_trait;

use crate::error::Result;

use super::ddl::DdlOp;
use super::schema::{ColumnDescriptor, IndexDescriptor};
use super::value::{Row, SqlValue};

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rows inserted, updated or deleted.
    pub affected_rows: u64,
    /// AUTO_INCREMENT value generated by an INSERT.
    pub last_insert_id: Option<u64>,
}

/// Execute SQL against a single database connection.
///
/// Parameters are positional and bound to `?` placeholders. Each call holds
/// the connection only for the duration of that statement.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run a statement that returns no rows (DDL, INSERT, UPDATE, DELETE).
    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<ExecOutcome>;

    /// Run a query and collect its rows.
    async fn query(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>>;

    /// Get the database type identifier (e.g., "mysql").
    fn db_type(&self) -> &str;
}

/// Live schema access used by the reconciler.
#[async_trait]
pub trait SchemaBackend: Send + Sync {
    /// Check whether a table exists (case-insensitive).
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Read the live column descriptors of a table, in ordinal order.
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Non-primary indexes covering a column, ordered by name.
    async fn indexes(&self, table: &str, column: &str) -> Result<Vec<IndexDescriptor>>;

    /// Names of the non-primary indexes covering a column.
    async fn index_names(&self, table: &str, column: &str) -> Result<Vec<String>> {
        Ok(self
            .indexes(table, column)
            .await?
            .into_iter()
            .map(|i| i.name)
            .collect())
    }

    /// Render an operation as the SQL text [`apply`](Self::apply) would run.
    fn render(&self, op: &DdlOp) -> String;

    /// Apply one operation to the live schema.
    async fn apply(&self, op: &DdlOp) -> Result<()>;
}

/// Options for building a SELECT query.
#[derive(Debug, Clone, Default)]
pub struct SelectQueryOptions {
    /// Table name.
    pub table: String,
    /// Columns to select; empty selects `*`.
    pub columns: Vec<String>,
    /// Raw filter expression appended as a WHERE clause.
    pub where_clause: Option<String>,
    /// Maximum number of rows.
    pub limit: Option<u64>,
}

/// SQL syntax strategy for a database engine.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "mysql").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_ident(&self, name: &str) -> String;

    /// Size assumed for a type when no explicit size is declared or reported.
    ///
    /// Declared and live columns both resolve through this so that an
    /// omitted size never registers as a difference.
    fn default_size(&self, database_type: &str) -> u32;

    /// Render a DDL operation as SQL text.
    fn render_ddl(&self, op: &DdlOp) -> String;

    /// Build a SELECT query.
    fn build_select_query(&self, opts: &SelectQueryOptions) -> String;

    /// Build a parameterized INSERT of the given columns.
    fn build_insert(&self, table: &str, columns: &[&str]) -> String;

    /// Build a parameterized UPDATE of `columns`, keyed on `key_column`.
    fn build_update(&self, table: &str, columns: &[&str], key_column: &str) -> String;

    /// Build a parameterized DELETE keyed on `key_column`.
    fn build_delete(&self, table: &str, key_column: &str) -> String;

    /// Build a COUNT query; `column` of `None` counts rows.
    fn build_count(&self, table: &str, column: Option<&str>, where_clause: Option<&str>) -> String;
}
