//! In-memory live schema.
//!
//! [`MemorySchemaBackend`] keeps tables as plain column lists and applies
//! [`DdlOp`]s to them with MySQL's rules for keys and indexes. It backs
//! dry-run reconciliation ([`SyncMode::Plan`](crate::config::SyncMode)) and
//! lets the reconciler be exercised without a server.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::traits::{Dialect, SchemaBackend};
use crate::core::{ColumnDescriptor, DdlOp, IndexDescriptor, PrimaryKeyRebuild};
use crate::error::{Result, SyncError};

use super::mysql::MysqlDialect;

#[derive(Debug, Clone)]
struct MemoryIndex {
    name: String,
    column: String,
    unique: bool,
}

#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<ColumnDescriptor>,
    indexes: Vec<MemoryIndex>,
}

impl MemoryTable {
    fn new(columns: Vec<ColumnDescriptor>) -> Self {
        let mut table = Self {
            columns: Vec::new(),
            indexes: Vec::new(),
        };
        for mut column in columns {
            if column.primary_key {
                column.nullable = false;
            }
            let unique = column.unique && !column.primary_key;
            let name = column.name.clone();
            table.columns.push(column);
            if unique {
                table.add_index(&name, true);
            }
        }
        table.refresh_unique();
        table
    }

    fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.is_named(name))
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDescriptor> {
        self.columns.iter_mut().find(|c| c.is_named(name))
    }

    fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    fn is_indexed(&self, column: &str) -> bool {
        self.column(column).map(|c| c.primary_key).unwrap_or(false)
            || self
                .indexes
                .iter()
                .any(|i| i.column.eq_ignore_ascii_case(column))
    }

    /// Add an index named after the column, suffixed `_2`, `_3`... if taken.
    fn add_index(&mut self, column: &str, unique: bool) -> String {
        let mut name = column.to_string();
        let mut n = 2;
        while self
            .indexes
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(&name))
        {
            name = format!("{}_{}", column, n);
            n += 1;
        }
        self.indexes.push(MemoryIndex {
            name: name.clone(),
            column: column.to_string(),
            unique,
        });
        name
    }

    fn refresh_unique(&mut self) {
        let indexes = &self.indexes;
        for column in &mut self.columns {
            column.unique = !column.primary_key
                && indexes
                    .iter()
                    .any(|i| i.unique && i.column.eq_ignore_ascii_case(&column.name));
        }
    }

    fn check_auto_increment(&self) -> std::result::Result<(), String> {
        for column in self.columns.iter().filter(|c| c.auto_increment) {
            if !self.is_indexed(&column.name) {
                return Err(
                    "Incorrect table definition; there can be only one auto column \
                     and it must be defined as a key"
                        .to_string(),
                );
            }
        }
        if self.columns.iter().filter(|c| c.auto_increment).count() > 1 {
            return Err("Incorrect table definition; there can be only one auto column".into());
        }
        Ok(())
    }

    fn restate(&mut self, declared: &ColumnDescriptor, table: &str) -> std::result::Result<(), String> {
        let column = self
            .column_mut(&declared.name)
            .ok_or_else(|| format!("Unknown column '{}' in '{}'", declared.name, table))?;
        column.database_type = declared.database_type.clone();
        column.size = declared.size;
        column.nullable = declared.nullable && !column.primary_key;
        column.auto_increment = declared.auto_increment;
        self.check_auto_increment()
    }

    fn apply(&mut self, op: &DdlOp) -> std::result::Result<(), String> {
        match op {
            DdlOp::CreateTable { .. } => Err("table already exists".to_string()),
            DdlOp::AddColumn {
                table,
                column,
                primary_key,
            } => {
                if self.column(&column.name).is_some() {
                    return Err(format!("Duplicate column name '{}'", column.name));
                }
                let mut added = column.clone();
                added.primary_key = false;
                added.unique = false;
                self.columns.push(added);

                if let Some(PrimaryKeyRebuild {
                    drop_existing,
                    columns,
                }) = primary_key
                {
                    let has_key = self.has_primary_key();
                    if *drop_existing && !has_key {
                        return Err("Can't DROP 'PRIMARY'; check that column/key exists".into());
                    }
                    if !*drop_existing && has_key {
                        return Err("Multiple primary key defined".into());
                    }
                    for c in &mut self.columns {
                        c.primary_key = columns.iter().any(|k| c.is_named(k));
                        if c.primary_key {
                            c.nullable = false;
                        }
                    }
                    if let Some(missing) = columns.iter().find(|k| self.column(k).is_none()) {
                        return Err(format!(
                            "Key column '{}' doesn't exist in table '{}'",
                            missing, table
                        ));
                    }
                }
                if column.unique && !column.primary_key {
                    self.add_index(&column.name, true);
                }
                self.refresh_unique();
                self.check_auto_increment()
            }
            DdlOp::DropColumn { column, .. } => {
                if self.column(column).is_none() {
                    return Err(format!("Can't DROP '{}'; check that column/key exists", column));
                }
                if self.columns.len() == 1 {
                    return Err("You can't delete all columns with ALTER TABLE; \
                                use DROP TABLE instead"
                        .into());
                }
                self.columns.retain(|c| !c.is_named(column));
                self.indexes
                    .retain(|i| !i.column.eq_ignore_ascii_case(column));
                self.refresh_unique();
                Ok(())
            }
            DdlOp::DropIndex { index, .. } => {
                let before = self.indexes.len();
                self.indexes.retain(|i| !i.name.eq_ignore_ascii_case(index));
                if self.indexes.len() == before {
                    return Err(format!("Can't DROP '{}'; check that column/key exists", index));
                }
                self.refresh_unique();
                Ok(())
            }
            DdlOp::AddUnique { table, column } => {
                if self.column(column).is_none() {
                    return Err(format!(
                        "Key column '{}' doesn't exist in table '{}'",
                        column, table
                    ));
                }
                self.add_index(column, true);
                self.refresh_unique();
                Ok(())
            }
            DdlOp::ModifyColumn { table, column, .. } | DdlOp::ChangeColumn { table, column } => {
                self.restate(column, table)
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, MemoryTable>,
    executed: Vec<String>,
    index_lookups: Vec<(String, String)>,
}

/// A [`SchemaBackend`] over tables held in memory.
///
/// Table names are case-insensitive. Every successfully applied operation is
/// recorded as the SQL MySQL would have run.
#[derive(Debug, Default)]
pub struct MemorySchemaBackend {
    dialect: MysqlDialect,
    state: Mutex<State>,
    failures: Vec<(&'static str, String)>,
}

impl MemorySchemaBackend {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table. Unique columns get an index named after the column.
    #[must_use]
    pub fn with_table(mut self, table: &str, columns: Vec<ColumnDescriptor>) -> Self {
        self.state
            .get_mut()
            .tables
            .insert(table.to_lowercase(), MemoryTable::new(columns));
        self
    }

    /// Seed an extra index on an existing column.
    #[must_use]
    pub fn with_index(mut self, table: &str, index: &str, column: &str, unique: bool) -> Self {
        if let Some(t) = self.state.get_mut().tables.get_mut(&table.to_lowercase()) {
            t.indexes.push(MemoryIndex {
                name: index.to_string(),
                column: column.to_string(),
                unique,
            });
            t.refresh_unique();
        }
        self
    }

    /// Make every operation of `kind` (see [`DdlOp::kind`]) on `column` fail.
    #[must_use]
    pub fn failing_on(mut self, kind: &'static str, column: &str) -> Self {
        self.failures.push((kind, column.to_string()));
        self
    }

    /// Copy one table's live shape out of another backend.
    pub async fn snapshot(source: &dyn SchemaBackend, table: &str) -> Result<Self> {
        let backend = Self::new();
        if !source.table_exists(table).await? {
            return Ok(backend);
        }

        let columns = source.describe_table(table).await?;
        let mut indexes = Vec::new();
        for column in &columns {
            for index in source.indexes(table, &column.name).await? {
                indexes.push(MemoryIndex {
                    name: index.name,
                    column: column.name.clone(),
                    unique: index.unique,
                });
            }
        }

        let mut copy = MemoryTable::new(Vec::new());
        copy.columns = columns;
        copy.indexes = indexes;
        // A unique column whose unique index was not reported still needs one.
        let orphaned: Vec<String> = copy
            .columns
            .iter()
            .filter(|c| {
                c.unique
                    && !copy
                        .indexes
                        .iter()
                        .any(|i| i.unique && i.column.eq_ignore_ascii_case(&c.name))
            })
            .map(|c| c.name.clone())
            .collect();
        for column in orphaned {
            copy.add_index(&column, true);
        }
        copy.refresh_unique();

        backend
            .state
            .lock()
            .await
            .tables
            .insert(table.to_lowercase(), copy);
        Ok(backend)
    }

    /// Current columns of a table.
    pub async fn columns(&self, table: &str) -> Option<Vec<ColumnDescriptor>> {
        self.state
            .lock()
            .await
            .tables
            .get(&table.to_lowercase())
            .map(|t| t.columns.clone())
    }

    /// SQL of every operation applied so far, in order.
    pub async fn executed(&self) -> Vec<String> {
        self.state.lock().await.executed.clone()
    }

    /// `(table, column)` of every index lookup, in order.
    pub async fn index_lookups(&self) -> Vec<(String, String)> {
        self.state.lock().await.index_lookups.clone()
    }

    fn injected_failure(&self, op: &DdlOp) -> bool {
        self.failures.iter().any(|(kind, column)| {
            *kind == op.kind()
                && op
                    .column()
                    .map(|c| c.eq_ignore_ascii_case(column))
                    .unwrap_or(false)
        })
    }
}

#[async_trait]
impl SchemaBackend for MemorySchemaBackend {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .await
            .tables
            .contains_key(&table.to_lowercase()))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        self.columns(table)
            .await
            .ok_or_else(|| SyncError::inspection(table, format!("Table '{}' doesn't exist", table)))
    }

    async fn indexes(&self, table: &str, column: &str) -> Result<Vec<IndexDescriptor>> {
        let mut state = self.state.lock().await;
        state
            .index_lookups
            .push((table.to_string(), column.to_string()));
        let t = state
            .tables
            .get(&table.to_lowercase())
            .ok_or_else(|| SyncError::inspection(table, format!("Table '{}' doesn't exist", table)))?;
        Ok(t.indexes
            .iter()
            .filter(|i| i.column.eq_ignore_ascii_case(column))
            .map(|i| IndexDescriptor {
                name: i.name.clone(),
                unique: i.unique,
            })
            .collect())
    }

    fn render(&self, op: &DdlOp) -> String {
        self.dialect.render_ddl(op)
    }

    async fn apply(&self, op: &DdlOp) -> Result<()> {
        let sql = self.render(op);
        let fail = |message: String| SyncError::ddl(op.table(), op.column(), sql.clone(), message);

        if self.injected_failure(op) {
            return Err(fail("injected failure".to_string()));
        }

        let mut state = self.state.lock().await;
        let key = op.table().to_lowercase();
        match op {
            DdlOp::CreateTable { table, columns } => {
                if state.tables.contains_key(&key) {
                    return Err(fail(format!("Table '{}' already exists", table)));
                }
                let created = MemoryTable::new(columns.clone());
                created.check_auto_increment().map_err(fail)?;
                state.tables.insert(key, created);
            }
            _ => {
                let table = state
                    .tables
                    .get_mut(&key)
                    .ok_or_else(|| fail(format!("Table '{}' doesn't exist", op.table())))?;
                // Operate on a copy so a rejected statement leaves no trace.
                let mut updated = table.clone();
                updated.apply(op).map_err(fail)?;
                *table = updated;
            }
        }

        debug!("memory schema: {}", sql);
        state.executed.push(sql);
        Ok(())
    }
}
