//! Database driver implementations.
//!
//! - [`mysql`]: MySQL/MariaDB dialect, connection and live schema backend
//! - [`memory`]: in-memory schema backend for dry runs and tests
//!
//! Each driver implements the core traits from [`crate::core::traits`]:
//! `Dialect` for SQL syntax, `Database` for statement execution and
//! `SchemaBackend` for schema inspection and DDL.

pub mod memory;
pub mod mysql;

pub use memory::MemorySchemaBackend;
pub use mysql::{MysqlDatabase, MysqlDialect, MysqlSchemaBackend};
