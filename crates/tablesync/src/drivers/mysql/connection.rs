//! MySQL/MariaDB connection implementing [`Database`].
//!
//! Holds one `mysql_async` connection behind a mutex; statements run one at a
//! time and the lock is released as soon as each statement completes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Params, SslOpts};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::core::traits::{Database, ExecOutcome};
use crate::core::value::{Row, SqlValue};
use crate::error::Result;

/// A single MySQL connection.
pub struct MysqlDatabase {
    conn: Mutex<Conn>,
    endpoint: String,
}

impl MysqlDatabase {
    /// Open a connection from configuration and verify it with `SELECT 1`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut conn = Conn::new(Self::opts(config)).await?;
        conn.query_drop("SELECT 1").await?;

        info!("Connected to MySQL: {}", config.endpoint());

        Ok(Self {
            conn: Mutex::new(conn),
            endpoint: config.endpoint(),
        })
    }

    fn opts(config: &DatabaseConfig) -> Opts {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "verify-ca" => Some(SslOpts::default().with_danger_skip_domain_validation(true)),
            "verify-full" => Some(SslOpts::default()),
            _ => {
                warn!(
                    "Unknown ssl_mode '{}', defaulting to prefer",
                    config.ssl_mode
                );
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        builder.into()
    }

    /// `host:port/database` this connection points at.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Round-trip a ping and report the latency.
    pub async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        self.conn.lock().await.ping().await?;
        Ok(started.elapsed())
    }

    /// Server version string.
    pub async fn server_version(&self) -> Result<String> {
        let mut conn = self.conn.lock().await;
        let version: Option<String> = conn.query_first("SELECT VERSION()").await?;
        Ok(version.unwrap_or_default())
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<()> {
        self.conn.into_inner().disconnect().await?;
        Ok(())
    }
}

fn positional(params: Vec<SqlValue>) -> Params {
    Params::Positional(params.into_iter().map(mysql_async::Value::from).collect())
}

#[async_trait]
impl Database for MysqlDatabase {
    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<ExecOutcome> {
        debug!("execute: {}", sql);
        let mut conn = self.conn.lock().await;
        if params.is_empty() {
            conn.query_drop(sql).await?;
        } else {
            conn.exec_drop(sql, positional(params)).await?;
        }
        Ok(ExecOutcome {
            affected_rows: conn.affected_rows(),
            last_insert_id: conn.last_insert_id(),
        })
    }

    async fn query(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>> {
        debug!("query: {}", sql);
        let mut conn = self.conn.lock().await;
        let rows: Vec<mysql_async::Row> = if params.is_empty() {
            conn.query(sql).await?
        } else {
            conn.exec(sql, positional(params)).await?
        };
        Ok(rows.into_iter().map(Row::from).collect())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ssl_mode: &str) -> DatabaseConfig {
        DatabaseConfig {
            host: "db.internal".to_string(),
            port: 3307,
            database: "app".to_string(),
            user: "svc".to_string(),
            password: "pw".to_string(),
            ssl_mode: ssl_mode.to_string(),
        }
    }

    #[test]
    fn test_opts_from_config() {
        let opts = MysqlDatabase::opts(&config("disable"));
        assert_eq!(opts.ip_or_hostname(), "db.internal");
        assert_eq!(opts.tcp_port(), 3307);
        assert_eq!(opts.db_name(), Some("app"));
        assert_eq!(opts.user(), Some("svc"));
        assert!(opts.ssl_opts().is_none());
    }

    #[test]
    fn test_opts_tls_modes() {
        assert!(MysqlDatabase::opts(&config("prefer")).ssl_opts().is_some());
        assert!(MysqlDatabase::opts(&config("verify-full"))
            .ssl_opts()
            .is_some_and(|s| !s.accept_invalid_certs()));
    }

    #[test]
    fn test_positional_params() {
        let params = positional(vec![SqlValue::Int(1), SqlValue::Null]);
        assert_eq!(
            params,
            Params::Positional(vec![mysql_async::Value::Int(1), mysql_async::Value::NULL])
        );
    }
}
