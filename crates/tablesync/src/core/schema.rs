//! Column, table and diff types shared by declared and live schemas.
//!
//! The same [`ColumnDescriptor`] describes a column declared by a record type
//! and a column read back from the database, so the two can be compared
//! field by field.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical description of one table column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name (case-insensitive identifier).
    pub name: String,

    /// Upper-case dialect type name without size suffix (e.g. "VARCHAR").
    pub database_type: String,

    /// Length/display width; 0 when the type takes no qualifier.
    pub size: u32,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Part of the primary key.
    pub primary_key: bool,

    /// AUTO_INCREMENT column.
    pub auto_increment: bool,

    /// Covered by a single-column unique index.
    pub unique: bool,
}

impl ColumnDescriptor {
    /// Create a nullable column with no key flags.
    pub fn new(name: impl Into<String>, database_type: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            database_type: database_type.into(),
            size,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            unique: false,
        }
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl PartialEq for ColumnDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.database_type == other.database_type
            && self.size == other.size
            && self.nullable == other.nullable
            && self.primary_key == other.primary_key
            && self.auto_increment == other.auto_increment
            && self.unique == other.unique
    }
}

impl Eq for ColumnDescriptor {}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.database_type)?;
        if self.size > 0 {
            write!(f, "({})", self.size)?;
        }
        if !self.nullable {
            write!(f, " not-null")?;
        }
        if self.primary_key {
            write!(f, " pk")?;
        }
        if self.auto_increment {
            write!(f, " auto-increment")?;
        }
        if self.unique {
            write!(f, " unique")?;
        }
        Ok(())
    }
}

/// A non-primary index covering a column, as the live schema reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub unique: bool,
}

/// Where a column's value comes from on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBinding {
    /// Field name as the record exposes it.
    pub field: String,
    /// Column name in the table.
    pub column: String,
    /// Registry key of the field's domain type.
    pub type_key: String,
    /// Inherited surrogate key, read and written through `Entity::id`.
    pub surrogate_key: bool,
}

/// Declared shape of a record type's table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Record type name (for diagnostics).
    pub record: String,

    /// Table name.
    pub table: String,

    /// Columns sorted by name.
    pub columns: Vec<ColumnDescriptor>,

    /// Field-to-column bindings, in the same order as `columns`.
    pub bindings: Vec<FieldBinding>,

    /// Skip populating the surrogate key on insert/update/read.
    pub no_id: bool,

    /// Never alter an existing table.
    pub immutable_schema: bool,
}

impl EntityMetadata {
    /// Find a declared column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.is_named(name))
    }

    /// Declared primary key column names, in column order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Bindings that are populated from rows on read.
    pub fn readable_bindings(&self) -> impl Iterator<Item = &FieldBinding> {
        let skip_key = self.no_id;
        self.bindings.iter().filter(move |b| {
            !(skip_key
                && self
                    .column(&b.column)
                    .map(|c| c.primary_key)
                    .unwrap_or(false))
        })
    }

    /// Binding for a column, by column name.
    pub fn binding_for_column(&self, column: &str) -> Option<&FieldBinding> {
        self.bindings
            .iter()
            .find(|b| b.column.eq_ignore_ascii_case(column))
    }

    /// Column name of the surrogate key, if the table declares exactly one.
    pub fn id_column(&self) -> Option<&str> {
        match self.primary_key().as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }
}

/// Name-level comparison between declared and live columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Declared columns missing from the live table, in declared order.
    pub added: Vec<ColumnDescriptor>,

    /// Live column names that are no longer declared, in live order.
    pub removed: Vec<String>,

    /// (declared, live) pairs that exist on both sides but differ.
    pub changed: Vec<(ColumnDescriptor, ColumnDescriptor)>,
}

impl SchemaDiff {
    /// Compare declared columns against the live table.
    pub fn compute(declared: &[ColumnDescriptor], live: &[ColumnDescriptor]) -> Self {
        let added = declared
            .iter()
            .filter(|d| !live.iter().any(|l| l.is_named(&d.name)))
            .cloned()
            .collect();

        let removed = live
            .iter()
            .filter(|l| !declared.iter().any(|d| d.is_named(&l.name)))
            .map(|l| l.name.clone())
            .collect();

        let changed = declared
            .iter()
            .filter_map(|d| {
                live.iter()
                    .find(|l| l.is_named(&d.name))
                    .filter(|l| *l != d)
                    .map(|l| (d.clone(), l.clone()))
            })
            .collect();

        Self {
            added,
            removed,
            changed,
        }
    }

    /// True when the live table already matches.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
