//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Provides MySQL-specific identifier quoting, type sizing, DDL rendering and
//! the parameterized DML the entity manager runs.

use crate::core::traits::{Dialect, SelectQueryOptions};
use crate::core::{ColumnDescriptor, DdlOp, PrimaryKeyRebuild};

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    /// Split a catalog `COLUMN_TYPE` into base type and integer size.
    ///
    /// `int(11)` gives `("INT", Some(11))`, `int(10) unsigned` gives
    /// `("INT UNSIGNED", Some(10))`. A non-integer qualifier such as
    /// `decimal(10,2)` stays in the type text with no size.
    pub fn parse_column_type(column_type: &str) -> (String, Option<u32>) {
        let trimmed = column_type.trim();
        if let (Some(open), Some(close)) = (trimmed.find('('), trimmed.rfind(')')) {
            if open < close {
                if let Ok(size) = trimmed[open + 1..close].trim().parse::<u32>() {
                    let base = format!("{} {}", &trimmed[..open], &trimmed[close + 1..]);
                    let base = base.split_whitespace().collect::<Vec<_>>().join(" ");
                    return (base.to_uppercase(), Some(size));
                }
            }
        }
        (trimmed.to_uppercase(), None)
    }

    /// Build a live column descriptor from `information_schema.COLUMNS` fields.
    pub fn column_from_catalog(
        &self,
        name: &str,
        column_type: &str,
        is_nullable: &str,
        column_key: &str,
        extra: &str,
    ) -> ColumnDescriptor {
        let (database_type, size) = Self::parse_column_type(column_type);
        let size = size.unwrap_or_else(|| self.default_size(&database_type));

        let mut column = ColumnDescriptor::new(name, database_type, size);
        column.primary_key = column_key.eq_ignore_ascii_case("PRI");
        column.nullable = is_nullable.eq_ignore_ascii_case("YES") && !column.primary_key;
        column.unique = column_key.eq_ignore_ascii_case("UNI") && !column.primary_key;
        column.auto_increment = extra.to_ascii_lowercase().contains("auto_increment");
        column
    }

    /// `TYPE(size)`, or the bare type when the size is 0.
    fn type_with_size(column: &ColumnDescriptor) -> String {
        if column.size > 0 {
            format!("{}({})", column.database_type, column.size)
        } else {
            column.database_type.clone()
        }
    }

    /// Full column definition as used by CREATE TABLE and ADD COLUMN.
    fn column_definition(&self, column: &ColumnDescriptor) -> String {
        let mut def = format!(
            "{} {}",
            self.quote_ident(&column.name),
            Self::type_with_size(column)
        );
        if !column.nullable {
            def.push_str(" NOT NULL");
        }
        if column.auto_increment {
            def.push_str(" AUTO_INCREMENT");
        }
        if column.unique {
            def.push_str(" UNIQUE");
        }
        def
    }

    /// Column restatement for MODIFY/CHANGE: type, size, nullability and
    /// auto-increment. Unique is left to its own index operations.
    fn column_restatement(column: &ColumnDescriptor) -> String {
        let mut def = Self::type_with_size(column);
        def.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
        if column.auto_increment {
            def.push_str(" AUTO_INCREMENT");
        }
        def
    }

    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn alter(&self, table: &str, body: &str) -> String {
        format!("ALTER TABLE {} {}", self.quote_ident(table), body)
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        // Names containing backticks are escaped by doubling them
        format!("`{}`", name.replace('`', "``"))
    }

    fn default_size(&self, database_type: &str) -> u32 {
        match database_type.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" => 11,
            "BIGINT" => 20,
            "MEDIUMINT" => 9,
            "SMALLINT" => 6,
            "TINYINT" => 1,
            "VARCHAR" => 1024,
            _ => 0,
        }
    }

    fn render_ddl(&self, op: &DdlOp) -> String {
        match op {
            DdlOp::CreateTable { table, columns } => {
                let mut defs: Vec<String> =
                    columns.iter().map(|c| self.column_definition(c)).collect();
                let pk: Vec<String> = columns
                    .iter()
                    .filter(|c| c.primary_key)
                    .map(|c| c.name.clone())
                    .collect();
                if !pk.is_empty() {
                    defs.push(format!("PRIMARY KEY ({})", self.column_list(&pk)));
                }
                format!(
                    "CREATE TABLE {} ({})",
                    self.quote_ident(table),
                    defs.join(", ")
                )
            }
            DdlOp::AddColumn {
                table,
                column,
                primary_key,
            } => {
                let mut body = format!("ADD COLUMN {}", self.column_definition(column));
                if let Some(PrimaryKeyRebuild {
                    drop_existing,
                    columns,
                }) = primary_key
                {
                    if *drop_existing {
                        body.push_str(", DROP PRIMARY KEY");
                    }
                    body.push_str(&format!(", ADD PRIMARY KEY ({})", self.column_list(columns)));
                }
                self.alter(table, &body)
            }
            DdlOp::DropColumn { table, column } => {
                self.alter(table, &format!("DROP COLUMN {}", self.quote_ident(column)))
            }
            DdlOp::DropIndex { table, index, .. } => {
                self.alter(table, &format!("DROP INDEX {}", self.quote_ident(index)))
            }
            DdlOp::AddUnique { table, column } => {
                self.alter(table, &format!("ADD UNIQUE ({})", self.quote_ident(column)))
            }
            DdlOp::ModifyColumn { table, column, .. } => self.alter(
                table,
                &format!(
                    "MODIFY COLUMN {} {}",
                    self.quote_ident(&column.name),
                    Self::column_restatement(column)
                ),
            ),
            DdlOp::ChangeColumn { table, column } => {
                let name = self.quote_ident(&column.name);
                self.alter(
                    table,
                    &format!(
                        "CHANGE COLUMN {} {} {}",
                        name,
                        name,
                        Self::column_restatement(column)
                    ),
                )
            }
        }
    }

    fn build_select_query(&self, opts: &SelectQueryOptions) -> String {
        let cols = if opts.columns.is_empty() {
            "*".to_string()
        } else {
            self.column_list(&opts.columns)
        };

        let mut sql = format!("SELECT {} FROM {}", cols, self.quote_ident(&opts.table));

        if let Some(ref where_clause) = opts.where_clause {
            if !where_clause.trim().is_empty() {
                sql.push_str(&format!(" WHERE {}", where_clause));
            }
        }

        if let Some(limit) = opts.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }

    fn build_insert(&self, table: &str, columns: &[&str]) -> String {
        if columns.is_empty() {
            return format!("INSERT INTO {} () VALUES ()", self.quote_ident(table));
        }
        let cols = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_ident(table),
            cols,
            placeholders
        )
    }

    fn build_update(&self, table: &str, columns: &[&str], key_column: &str) -> String {
        let assignments = columns
            .iter()
            .map(|c| format!("{} = ?", self.quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.quote_ident(table),
            assignments,
            self.quote_ident(key_column)
        )
    }

    fn build_delete(&self, table: &str, key_column: &str) -> String {
        format!(
            "DELETE FROM {} WHERE {} = ?",
            self.quote_ident(table),
            self.quote_ident(key_column)
        )
    }

    fn build_count(&self, table: &str, column: Option<&str>, where_clause: Option<&str>) -> String {
        let counted = column
            .map(|c| self.quote_ident(c))
            .unwrap_or_else(|| "*".to_string());
        let mut sql = format!(
            "SELECT COUNT({}) FROM {}",
            counted,
            self.quote_ident(table)
        );
        if let Some(filter) = where_clause.filter(|w| !w.trim().is_empty()) {
            sql.push_str(&format!(" WHERE {}", filter));
        }
        sql
    }
}
