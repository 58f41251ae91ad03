//! Core abstractions shared by the sync engine and its drivers.
//!
//! - [`schema`]: column descriptors, entity metadata and schema diffs
//! - [`ddl`]: structural DDL operations
//! - [`value`]: database values, domain values and result rows
//! - [`traits`]: database, schema backend and dialect traits
//!
//! Everything here is database-agnostic; the MySQL specifics live under
//! `drivers/mysql`.

pub mod ddl;
pub mod schema;
pub mod traits;
pub mod value;

pub use ddl::{DdlOp, ModifyReason, PrimaryKeyRebuild};
pub use schema::{ColumnDescriptor, EntityMetadata, FieldBinding, IndexDescriptor, SchemaDiff};
pub use traits::{Database, Dialect, ExecOutcome, SchemaBackend, SelectQueryOptions};
pub use value::{FieldValue, Row, SqlValue};
