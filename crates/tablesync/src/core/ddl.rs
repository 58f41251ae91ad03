//! Structural DDL operations produced by the reconciler.
//!
//! Operations are dialect-neutral; a [`Dialect`](super::Dialect) renders them
//! to SQL text and a [`SchemaBackend`](super::SchemaBackend) applies them.

use serde::Serialize;

use super::schema::ColumnDescriptor;

/// Primary key reconstruction attached to an added key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKeyRebuild {
    /// Whether the live table currently has a primary key to drop.
    pub drop_existing: bool,
    /// All declared primary key columns, new one included.
    pub columns: Vec<String>,
}

/// Why a column is restated with MODIFY COLUMN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifyReason {
    Nullability,
    Type,
}

/// One schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DdlOp {
    /// Create the table with every declared column.
    CreateTable {
        table: String,
        columns: Vec<ColumnDescriptor>,
    },

    /// Add a declared column that the live table lacks.
    AddColumn {
        table: String,
        column: ColumnDescriptor,
        primary_key: Option<PrimaryKeyRebuild>,
    },

    /// Drop a live column that is no longer declared.
    DropColumn { table: String, column: String },

    /// Drop a named index covering a column that should not be unique.
    DropIndex {
        table: String,
        column: String,
        index: String,
    },

    /// Add a unique key on a single column.
    AddUnique { table: String, column: String },

    /// Restate a column definition in place.
    ModifyColumn {
        table: String,
        column: ColumnDescriptor,
        reason: ModifyReason,
    },

    /// Restate a column under its own name with a new size.
    ChangeColumn {
        table: String,
        column: ColumnDescriptor,
    },
}

impl DdlOp {
    /// Table the operation applies to.
    pub fn table(&self) -> &str {
        match self {
            DdlOp::CreateTable { table, .. }
            | DdlOp::AddColumn { table, .. }
            | DdlOp::DropColumn { table, .. }
            | DdlOp::DropIndex { table, .. }
            | DdlOp::AddUnique { table, .. }
            | DdlOp::ModifyColumn { table, .. }
            | DdlOp::ChangeColumn { table, .. } => table,
        }
    }

    /// Column the operation is about, if it targets one.
    pub fn column(&self) -> Option<&str> {
        match self {
            DdlOp::CreateTable { .. } => None,
            DdlOp::AddColumn { column, .. }
            | DdlOp::ModifyColumn { column, .. }
            | DdlOp::ChangeColumn { column, .. } => Some(&column.name),
            DdlOp::DropColumn { column, .. }
            | DdlOp::DropIndex { column, .. }
            | DdlOp::AddUnique { column, .. } => Some(column),
        }
    }

    /// Short label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DdlOp::CreateTable { .. } => "create_table",
            DdlOp::AddColumn { .. } => "add_column",
            DdlOp::DropColumn { .. } => "drop_column",
            DdlOp::DropIndex { .. } => "drop_index",
            DdlOp::AddUnique { .. } => "add_unique",
            DdlOp::ModifyColumn { .. } => "modify_column",
            DdlOp::ChangeColumn { .. } => "change_column",
        }
    }
}
