//! Live schema inspection and DDL application against MySQL.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::traits::{Database, Dialect, SchemaBackend};
use crate::core::{ColumnDescriptor, DdlOp, IndexDescriptor, SqlValue};
use crate::error::Result;

use super::MysqlDialect;

const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) AS cnt \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND LOWER(TABLE_NAME) = LOWER(?)";

const COLUMNS_SQL: &str = "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, EXTRA \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND LOWER(TABLE_NAME) = LOWER(?) \
     ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_SQL: &str = "SELECT COLUMN_NAME \
     FROM information_schema.STATISTICS \
     WHERE TABLE_SCHEMA = DATABASE() AND LOWER(TABLE_NAME) = LOWER(?) \
     AND INDEX_NAME = 'PRIMARY'";

const INDEXES_SQL: &str = "SELECT INDEX_NAME, MIN(NON_UNIQUE) AS NON_UNIQUE \
     FROM information_schema.STATISTICS \
     WHERE TABLE_SCHEMA = DATABASE() AND LOWER(TABLE_NAME) = LOWER(?) \
     AND LOWER(COLUMN_NAME) = LOWER(?) AND INDEX_NAME <> 'PRIMARY' \
     GROUP BY INDEX_NAME \
     ORDER BY INDEX_NAME";

/// [`SchemaBackend`] reading `information_schema` of the connected database.
pub struct MysqlSchemaBackend {
    db: Arc<dyn Database>,
    dialect: MysqlDialect,
}

impl MysqlSchemaBackend {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            dialect: MysqlDialect::new(),
        }
    }

    pub fn dialect(&self) -> &MysqlDialect {
        &self.dialect
    }

    /// Columns of the table's real `PRIMARY` index.
    async fn primary_key_columns(&self, table: &str) -> Result<Vec<String>> {
        let rows = self
            .db
            .query(PRIMARY_KEY_SQL, vec![SqlValue::Text(table.to_string())])
            .await?;
        rows.iter().map(|r| r.get_string("COLUMN_NAME")).collect()
    }
}

#[async_trait]
impl SchemaBackend for MysqlSchemaBackend {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let rows = self
            .db
            .query(TABLE_EXISTS_SQL, vec![SqlValue::Text(table.to_string())])
            .await?;
        let count = rows
            .first()
            .and_then(|r| r.get_index(0))
            .and_then(SqlValue::to_i64)
            .unwrap_or(0);
        Ok(count > 0)
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows = self
            .db
            .query(COLUMNS_SQL, vec![SqlValue::Text(table.to_string())])
            .await?;

        let mut columns = rows
            .iter()
            .map(|row| {
                let name = row.get_string("COLUMN_NAME")?;
                let column_type = row.get_string("COLUMN_TYPE")?;
                let is_nullable = row.get_string("IS_NULLABLE")?;
                let column_key = row.get_opt_string("COLUMN_KEY")?.unwrap_or_default();
                let extra = row.get_opt_string("EXTRA")?.unwrap_or_default();
                Ok(self.dialect.column_from_catalog(
                    &name,
                    &column_type,
                    &is_nullable,
                    &column_key,
                    &extra,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        if columns.iter().any(|c| c.primary_key) {
            let key_columns = self.primary_key_columns(table).await?;
            // Without a PRIMARY KEY, MySQL reports the first UNIQUE NOT NULL
            // column as PRI.
            for column in columns.iter_mut().filter(|c| c.primary_key) {
                if !key_columns
                    .iter()
                    .any(|k| k.eq_ignore_ascii_case(&column.name))
                {
                    column.primary_key = false;
                    column.unique = true;
                }
            }
        }

        Ok(columns)
    }

    async fn indexes(&self, table: &str, column: &str) -> Result<Vec<IndexDescriptor>> {
        let rows = self
            .db
            .query(
                INDEXES_SQL,
                vec![
                    SqlValue::Text(table.to_string()),
                    SqlValue::Text(column.to_string()),
                ],
            )
            .await?;
        rows.iter()
            .map(|r| {
                let non_unique = r
                    .get("NON_UNIQUE")
                    .and_then(SqlValue::to_i64)
                    .unwrap_or(1);
                Ok(IndexDescriptor {
                    name: r.get_string("INDEX_NAME")?,
                    unique: non_unique == 0,
                })
            })
            .collect()
    }

    fn render(&self, op: &DdlOp) -> String {
        self.dialect.render_ddl(op)
    }

    async fn apply(&self, op: &DdlOp) -> Result<()> {
        self.db.execute(&self.render(op), Vec::new()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Row;
    use crate::test_support::ScriptedDatabase;

    fn text(s: &str) -> SqlValue {
        SqlValue::Bytes(s.as_bytes().to_vec())
    }

    fn column_row(name: &str, ty: &str, nullable: &str, key: &str, extra: &str) -> Row {
        Row::new()
            .with("COLUMN_NAME", text(name))
            .with("COLUMN_TYPE", text(ty))
            .with("IS_NULLABLE", text(nullable))
            .with("COLUMN_KEY", text(key))
            .with("EXTRA", text(extra))
    }

    #[tokio::test]
    async fn test_table_exists() {
        let db = Arc::new(ScriptedDatabase::new());
        db.push_rows(vec![Row::new().with("cnt", SqlValue::Int(1))]);
        db.push_rows(vec![Row::new().with("cnt", text("0"))]);
        let backend = MysqlSchemaBackend::new(db.clone());

        assert!(backend.table_exists("Demo").await.unwrap());
        assert!(!backend.table_exists("missing").await.unwrap());

        let queries = db.statements();
        assert!(queries[0].0.contains("information_schema.TABLES"));
        assert_eq!(queries[0].1, vec![SqlValue::Text("Demo".into())]);
    }

    #[tokio::test]
    async fn test_describe_table_maps_catalog_rows() {
        let db = Arc::new(ScriptedDatabase::new());
        db.push_rows(vec![
            column_row("id", "int(11)", "NO", "PRI", "auto_increment"),
            column_row("strValue", "varchar(512)", "YES", "", ""),
            column_row("uniqueStr", "varchar(512)", "NO", "UNI", ""),
            column_row("dvalue", "double", "YES", "", ""),
        ]);
        db.push_rows(vec![Row::new().with("COLUMN_NAME", text("id"))]);
        let backend = MysqlSchemaBackend::new(db.clone());

        let columns = backend.describe_table("demo").await.unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnDescriptor::new("id", "INT", 11)
                    .not_null()
                    .primary_key()
                    .auto_increment(),
                ColumnDescriptor::new("strValue", "VARCHAR", 512),
                ColumnDescriptor::new("uniqueStr", "VARCHAR", 512)
                    .not_null()
                    .unique(),
                ColumnDescriptor::new("dvalue", "DOUBLE", 0),
            ]
        );
        assert!(db.statements()[0].0.contains("ORDER BY ORDINAL_POSITION"));
        assert!(db.statements()[1].0.contains("INDEX_NAME = 'PRIMARY'"));
    }

    #[tokio::test]
    async fn test_describe_table_without_primary_key() {
        let db = Arc::new(ScriptedDatabase::new());
        db.push_rows(vec![
            column_row("code", "varchar(8)", "NO", "PRI", ""),
            column_row("label", "varchar(20)", "YES", "", ""),
        ]);
        db.push_rows(Vec::new());
        let backend = MysqlSchemaBackend::new(db.clone());

        let columns = backend.describe_table("tag").await.unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnDescriptor::new("code", "VARCHAR", 8).not_null().unique(),
                ColumnDescriptor::new("label", "VARCHAR", 20),
            ]
        );
        assert_eq!(db.statements().len(), 2);
    }

    #[tokio::test]
    async fn test_describe_table_skips_key_lookup_without_pri() {
        let db = Arc::new(ScriptedDatabase::new());
        db.push_rows(vec![column_row("label", "varchar(20)", "YES", "MUL", "")]);
        let backend = MysqlSchemaBackend::new(db.clone());

        let columns = backend.describe_table("tag").await.unwrap();
        assert_eq!(columns, vec![ColumnDescriptor::new("label", "VARCHAR", 20)]);
        assert_eq!(db.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_index_names_scoped_to_column() {
        let db = Arc::new(ScriptedDatabase::new());
        db.push_rows(vec![
            Row::new()
                .with("INDEX_NAME", text("uniqueStr"))
                .with("NON_UNIQUE", SqlValue::Int(0)),
            Row::new()
                .with("INDEX_NAME", text("uniqueStr_lookup"))
                .with("NON_UNIQUE", text("1")),
        ]);
        let backend = MysqlSchemaBackend::new(db.clone());

        let indexes = backend.indexes("demo", "uniqueStr").await.unwrap();
        assert_eq!(
            indexes,
            vec![
                IndexDescriptor {
                    name: "uniqueStr".into(),
                    unique: true
                },
                IndexDescriptor {
                    name: "uniqueStr_lookup".into(),
                    unique: false
                },
            ]
        );

        let (sql, params) = &db.statements()[0];
        assert!(sql.contains("INDEX_NAME <> 'PRIMARY'"));
        assert_eq!(
            params,
            &vec![
                SqlValue::Text("demo".into()),
                SqlValue::Text("uniqueStr".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_apply_executes_rendered_sql() {
        let db = Arc::new(ScriptedDatabase::new());
        let backend = MysqlSchemaBackend::new(db.clone());
        let op = DdlOp::DropColumn {
            table: "demo".into(),
            column: "legacy_flag".into(),
        };

        backend.apply(&op).await.unwrap();
        assert_eq!(
            db.statements()[0].0,
            "ALTER TABLE `demo` DROP COLUMN `legacy_flag`"
        );
    }

    #[tokio::test]
    async fn test_apply_surfaces_database_error() {
        let db = Arc::new(ScriptedDatabase::new());
        db.fail_next("Duplicate column name 'score'");
        let backend = MysqlSchemaBackend::new(db.clone());
        let op = DdlOp::DropColumn {
            table: "demo".into(),
            column: "score".into(),
        };
        assert!(backend.apply(&op).await.is_err());
    }
}
