//! Row-level persistence for one record type.
//!
//! An [`EntityManager`] is built per record type. Construction derives the
//! table metadata, runs the configured schema sync, and from then on every
//! read and write goes through the same metadata and converters, so rows
//! always match the table that was just reconciled.

mod args;

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info};

pub use args::{to_sql_value, QueryArguments};

use crate::config::SyncMode;
use crate::convert::{ConverterRegistry, TypeConverter};
use crate::core::traits::{Database, Dialect, SchemaBackend, SelectQueryOptions};
use crate::core::{EntityMetadata, FieldBinding, FieldValue, Row, SqlValue};
use crate::drivers::{MysqlDialect, MysqlSchemaBackend};
use crate::entity::{describe, DomainType, Entity, EntityView};
use crate::error::{Result, SyncError};
use crate::reconcile::{self, ReconcileReport};

/// CRUD operations for record type `E`.
pub struct EntityManager<E: Entity> {
    db: Arc<dyn Database>,
    registry: Arc<ConverterRegistry>,
    dialect: MysqlDialect,
    metadata: EntityMetadata,
    /// Converter per binding, same order as `metadata.bindings`.
    converters: Vec<Arc<dyn TypeConverter>>,
    sync_report: Option<ReconcileReport>,
    _record: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityManager<E> {
    /// Build a manager and reconcile the table, applying DDL.
    pub async fn new(db: Arc<dyn Database>, registry: Arc<ConverterRegistry>) -> Result<Self> {
        Self::with_mode(db, registry, SyncMode::Apply).await
    }

    /// Build a manager, syncing the schema per `mode`.
    pub async fn with_mode(
        db: Arc<dyn Database>,
        registry: Arc<ConverterRegistry>,
        mode: SyncMode,
    ) -> Result<Self> {
        let backend = MysqlSchemaBackend::new(db.clone());
        Self::with_backend(db, registry, &backend, mode).await
    }

    /// Build a manager whose schema sync runs against `backend`.
    pub async fn with_backend(
        db: Arc<dyn Database>,
        registry: Arc<ConverterRegistry>,
        backend: &dyn SchemaBackend,
        mode: SyncMode,
    ) -> Result<Self> {
        let dialect = MysqlDialect::new();
        let metadata = describe(&E::descriptor(), &registry, &dialect)?;
        let converters = metadata
            .bindings
            .iter()
            .map(|b| registry.require(&DomainType::named(b.type_key.as_str())))
            .collect::<Result<Vec<_>>>()?;

        let sync_report = reconcile::sync(backend, &metadata, mode).await?;
        if let Some(report) = &sync_report {
            if report.changed() {
                info!(
                    "{}: {} schema statement(s) {}",
                    metadata.table,
                    report.applied.len(),
                    if report.dry_run { "planned" } else { "applied" }
                );
            }
        }

        Ok(Self {
            db,
            registry,
            dialect,
            metadata,
            converters,
            sync_report,
            _record: PhantomData,
        })
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    pub fn table(&self) -> &str {
        &self.metadata.table
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Outcome of the schema sync run at construction, unless skipped.
    pub fn sync_report(&self) -> Option<&ReconcileReport> {
        self.sync_report.as_ref()
    }

    fn is_key(&self, binding: &FieldBinding) -> bool {
        self.metadata
            .column(&binding.column)
            .map(|c| c.primary_key)
            .unwrap_or(false)
    }

    /// Bindings with their converters, skipping the key for `no_id` records.
    fn readable(&self) -> impl Iterator<Item = (&FieldBinding, &Arc<dyn TypeConverter>)> {
        self.metadata
            .bindings
            .iter()
            .zip(&self.converters)
            .filter(move |(b, _)| !(self.metadata.no_id && self.is_key(b)))
    }

    fn key_column(&self) -> Result<&str> {
        self.metadata.id_column().ok_or_else(|| {
            SyncError::definition(
                &self.metadata.record,
                "operation requires a single-column primary key",
            )
        })
    }

    /// Value of the key column, failing if the record has none yet.
    fn key_value(&self, entity: &E) -> Result<(String, SqlValue)> {
        let key = self.key_column()?.to_string();
        let value = if self.metadata.no_id {
            SqlValue::Null
        } else {
            let (binding, converter) = self
                .metadata
                .bindings
                .iter()
                .zip(&self.converters)
                .find(|(b, _)| b.column.eq_ignore_ascii_case(&key))
                .ok_or_else(|| SyncError::definition(&self.metadata.record, "key is not bound"))?;
            converter.to_database_value(&EntityView(entity), &binding.field)?
        };
        if value.is_null() {
            return Err(SyncError::NotPersisted(self.metadata.table.clone()));
        }
        Ok((key, value))
    }

    fn from_row(&self, row: &Row) -> Result<E> {
        let mut entity = E::default();
        for (binding, converter) in self.readable() {
            let value = converter.from_database_value(row, &binding.column)?;
            if binding.surrogate_key {
                match value {
                    FieldValue::I32(id) => entity.set_id(id),
                    FieldValue::Null => {}
                    other => {
                        return Err(SyncError::conversion(&binding.column, "i32", other.kind()))
                    }
                }
            } else {
                entity.set_field(&binding.field, value)?;
            }
        }
        entity.set_persisted(true);
        Ok(entity)
    }

    /// Insert a new row. Unset fields are omitted so column defaults and
    /// AUTO_INCREMENT apply; the generated id is written back.
    pub async fn insert(&self, entity: &mut E) -> Result<()> {
        let mut columns = Vec::new();
        let mut params = Vec::new();
        {
            let view = EntityView(&*entity);
            for (binding, converter) in self.readable() {
                let value = converter.to_database_value(&view, &binding.field)?;
                if value.is_null() {
                    continue;
                }
                columns.push(binding.column.as_str());
                params.push(value);
            }
        }

        let sql = self.dialect.build_insert(&self.metadata.table, &columns);
        let outcome = self.db.execute(&sql, params).await?;

        let has_surrogate = self.metadata.bindings.iter().any(|b| b.surrogate_key);
        if has_surrogate && !self.metadata.no_id {
            if let Some(id) = outcome.last_insert_id {
                let id = i32::try_from(id).map_err(|_| SyncError::conversion("id", "i32", id))?;
                entity.set_id(id);
            }
        }
        entity.set_persisted(true);
        debug!("{}: inserted row {:?}", self.metadata.table, entity.id());
        Ok(())
    }

    /// Write every non-key field of a stored record. Returns rows affected.
    pub async fn update(&self, entity: &E) -> Result<u64> {
        let (key, key_value) = self.key_value(entity)?;
        let view = EntityView(entity);

        let mut columns = Vec::new();
        let mut params = Vec::new();
        for (binding, converter) in self.readable() {
            if self.is_key(binding) {
                continue;
            }
            columns.push(binding.column.as_str());
            params.push(converter.to_database_value(&view, &binding.field)?);
        }
        if columns.is_empty() {
            return Ok(0);
        }
        params.push(key_value);

        let sql = self.dialect.build_update(&self.metadata.table, &columns, &key);
        let outcome = self.db.execute(&sql, params).await?;
        Ok(outcome.affected_rows)
    }

    /// Insert when the record has never been stored, update otherwise.
    pub async fn save(&self, entity: &mut E) -> Result<()> {
        if entity.is_persisted() {
            self.update(entity).await.map(|_| ())
        } else {
            self.insert(entity).await
        }
    }

    /// Delete a stored record by key. Returns whether a row was removed.
    pub async fn delete(&self, entity: &mut E) -> Result<bool> {
        let (key, key_value) = self.key_value(entity)?;
        let sql = self.dialect.build_delete(&self.metadata.table, &key);
        let outcome = self.db.execute(&sql, vec![key_value]).await?;
        entity.set_persisted(false);
        Ok(outcome.affected_rows > 0)
    }

    /// Fetch one record by id.
    pub async fn read(&self, id: i32) -> Result<Option<E>> {
        let key = self.dialect.quote_ident(self.key_column()?);
        let rows = self
            .select(Some(format!("{} = ?", key)), vec![SqlValue::Int(i64::from(id))])
            .await?;
        rows.first().map(|row| self.from_row(row)).transpose()
    }

    /// Every row of the table.
    pub async fn list(&self) -> Result<Vec<E>> {
        self.list_rows(None, Vec::new()).await
    }

    /// Rows matching a raw SQL filter expression (the WHERE body).
    pub async fn list_where(&self, filter: &str) -> Result<Vec<E>> {
        self.list_rows(Some(filter.to_string()), Vec::new()).await
    }

    /// Rows matching every `column = value` argument.
    pub async fn list_where_args(&self, args: &QueryArguments) -> Result<Vec<E>> {
        if args.is_empty() {
            return self.list().await;
        }
        let (filter, params) = args.to_where(&self.dialect);
        self.list_rows(Some(filter), params).await
    }

    /// Number of rows in the table.
    pub async fn count(&self) -> Result<u64> {
        self.count_rows(None, Vec::new()).await
    }

    /// Number of rows matching a raw SQL filter expression.
    pub async fn count_where(&self, filter: &str) -> Result<u64> {
        self.count_rows(Some(filter), Vec::new()).await
    }

    /// Number of rows matching every `column = value` argument.
    pub async fn count_where_args(&self, args: &QueryArguments) -> Result<u64> {
        if args.is_empty() {
            return self.count().await;
        }
        let (filter, params) = args.to_where(&self.dialect);
        self.count_rows(Some(&filter), params).await
    }

    async fn select(&self, filter: Option<String>, params: Vec<SqlValue>) -> Result<Vec<Row>> {
        let opts = SelectQueryOptions {
            table: self.metadata.table.clone(),
            columns: self.readable().map(|(b, _)| b.column.clone()).collect(),
            where_clause: filter,
            limit: None,
        };
        let sql = self.dialect.build_select_query(&opts);
        self.db.query(&sql, params).await
    }

    async fn list_rows(&self, filter: Option<String>, params: Vec<SqlValue>) -> Result<Vec<E>> {
        let rows = self.select(filter, params).await?;
        rows.iter().map(|row| self.from_row(row)).collect()
    }

    async fn count_rows(&self, filter: Option<&str>, params: Vec<SqlValue>) -> Result<u64> {
        let counted = if self.metadata.no_id {
            None
        } else {
            self.metadata.id_column()
        };
        let sql = self
            .dialect
            .build_count(&self.metadata.table, counted, filter);
        let rows = self.db.query(&sql, params).await?;
        let value = rows
            .first()
            .and_then(|r| r.get_index(0))
            .cloned()
            .unwrap_or(SqlValue::Null);
        value
            .to_i64()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| SyncError::conversion("COUNT", "u64", value.kind()))
    }
}
