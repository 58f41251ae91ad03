//! MySQL/MariaDB database driver.
//!
//! This module provides MySQL-specific implementations for:
//! - [`MysqlDialect`]: SQL syntax strategy
//! - [`MysqlDatabase`]: statement execution over one `mysql_async` connection
//! - [`MysqlSchemaBackend`]: live schema inspection and DDL application
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+
//!
//! MySQL 8.0.19 and later no longer report integer display widths, so an
//! `int` column reads back with the default width of 11.

mod connection;
mod dialect;
mod schema;

pub use connection::MysqlDatabase;
pub use dialect::MysqlDialect;
pub use schema::MysqlSchemaBackend;
