//! In-crate test double for [`Database`].

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::traits::{Database, ExecOutcome};
use crate::core::value::{Row, SqlValue};
use crate::error::{Result, SyncError};

/// Records every statement and replays queued results in order.
///
/// Queries with nothing queued return no rows; executes return a default
/// outcome.
#[derive(Default)]
pub(crate) struct ScriptedDatabase {
    statements: Mutex<Vec<(String, Vec<SqlValue>)>>,
    rows: Mutex<VecDeque<Vec<Row>>>,
    outcomes: Mutex<VecDeque<ExecOutcome>>,
    failures: Mutex<VecDeque<String>>,
}

impl ScriptedDatabase {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_rows(&self, rows: Vec<Row>) {
        self.rows.lock().unwrap().push_back(rows);
    }

    pub(crate) fn push_outcome(&self, outcome: ExecOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Fail the next statement of either kind with a server error.
    pub(crate) fn fail_next(&self, message: &str) {
        self.failures.lock().unwrap().push_back(message.to_string());
    }

    pub(crate) fn statements(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.statements.lock().unwrap().clone()
    }

    pub(crate) fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }

    fn record(&self, sql: &str, params: Vec<SqlValue>) -> Result<()> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params));
        match self.failures.lock().unwrap().pop_front() {
            Some(message) => Err(SyncError::Database(mysql_async::Error::Server(
                mysql_async::ServerError {
                    code: 1064,
                    message,
                    state: "42000".to_string(),
                },
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Database for ScriptedDatabase {
    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<ExecOutcome> {
        self.record(sql, params)?;
        Ok(self.outcomes.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn query(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>> {
        self.record(sql, params)?;
        Ok(self.rows.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn db_type(&self) -> &str {
        "scripted"
    }
}
