//! # tablesync
//!
//! Declare a record type once and keep its MySQL table in sync.
//!
//! A record type describes its fields through an [`EntityDescriptor`]. From
//! that descriptor the library derives the table's declared columns, compares
//! them with the live table and issues the DDL needed to converge:
//!
//! - **Create** missing tables with the declared primary key
//! - **Add and drop** columns by name
//! - **Alter** nullability, size and uniqueness of existing columns
//! - **Plan mode** that reports the DDL without touching the database
//! - **Row operations** (insert, update, read, list, count, delete) through
//!   pluggable per-type converters
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tablesync::{
//!     Config, ConverterRegistry, Entity, EntityDescriptor, EntityManager, FieldDef, FieldValue,
//!     MysqlDatabase, Record,
//! };
//!
//! #[derive(Default)]
//! struct User {
//!     id: Option<i32>,
//!     persisted: bool,
//!     name: Option<String>,
//! }
//!
//! impl Record for User {
//!     fn get_field(&self, field: &str) -> Option<FieldValue> {
//!         (field == "name").then(|| self.name.clone().into())
//!     }
//! }
//!
//! impl Entity for User {
//!     fn descriptor() -> EntityDescriptor {
//!         EntityDescriptor::new::<User>().field(FieldDef::of::<String>("name").size(64))
//!     }
//!     fn id(&self) -> Option<i32> { self.id }
//!     fn set_id(&mut self, id: i32) { self.id = Some(id) }
//!     fn is_persisted(&self) -> bool { self.persisted }
//!     fn set_persisted(&mut self, persisted: bool) { self.persisted = persisted }
//!     fn set_field(&mut self, field: &str, value: FieldValue) -> tablesync::Result<()> {
//!         if field == "name" {
//!             self.name = value.try_into()?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> tablesync::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let db = Arc::new(MysqlDatabase::connect(&config.database).await?);
//!     let users: EntityManager<User> =
//!         EntityManager::new(db, Arc::new(ConverterRegistry::with_builtins())).await?;
//!
//!     let mut user = User { name: Some("ada".into()), ..Default::default() };
//!     users.insert(&mut user).await?;
//!     println!("{} users", users.count().await?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod core;
pub mod drivers;
pub mod entity;
pub mod error;
pub mod manager;
pub mod reconcile;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, SyncConfig, SyncMode};
pub use convert::{ConverterRegistry, TypeConverter};
pub use core::{ColumnDescriptor, DdlOp, EntityMetadata, FieldValue, Row, SqlValue};
pub use drivers::{MemorySchemaBackend, MysqlDatabase, MysqlDialect, MysqlSchemaBackend};
pub use entity::{describe, DomainType, Entity, EntityDescriptor, FieldDef, Record, TextStorage};
pub use error::{Result, SyncError};
pub use manager::{EntityManager, QueryArguments};
pub use reconcile::{dry_run, plan, reconcile, sync, Plan, ReconcileReport};
