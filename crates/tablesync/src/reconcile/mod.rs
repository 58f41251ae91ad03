//! Schema reconciliation.
//!
//! Compares a record type's declared [`EntityMetadata`] with the live table
//! and converges the table toward it:
//!
//! 1. a missing table is created with every declared column;
//! 2. declared columns missing from the table are added;
//! 3. live columns no longer declared are dropped;
//! 4. each remaining column that differs goes through, in order, unique
//!    index removal, unique index addition, nullability, size and type.
//!
//! Planning ([`plan_changes`]) is pure; [`reconcile`] plans against the
//! live schema of a [`SchemaBackend`] and applies the result statement by
//! statement. DDL is not transactional: a failed statement is reported and
//! stops the remaining steps for that column only, and the next pass
//! retries whatever is still divergent.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SyncMode;
use crate::core::traits::SchemaBackend;
use crate::core::{
    ColumnDescriptor, DdlOp, EntityMetadata, ModifyReason, PrimaryKeyRebuild, SchemaDiff,
};
use crate::drivers::MemorySchemaBackend;
use crate::error::{Result, SyncError};

/// One step in converging a changed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ColumnStep {
    /// Run a fixed operation.
    Apply(DdlOp),
    /// Look up the indexes covering the column and drop each by name.
    DropUniqueIndexes { table: String, column: String },
}

impl ColumnStep {
    fn describe(&self, render: impl Fn(&DdlOp) -> String) -> String {
        match self {
            ColumnStep::Apply(op) => render(op),
            ColumnStep::DropUniqueIndexes { column, .. } => {
                format!("drop unique indexes on {}", column)
            }
        }
    }
}

/// Steps for one column that exists on both sides but differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnPlan {
    pub column: String,
    pub steps: Vec<ColumnStep>,
    /// Differences the reconciler does not alter (key membership).
    pub warnings: Vec<String>,
}

/// Everything needed to converge one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Set when the table does not exist; nothing else is planned then.
    pub create: Option<DdlOp>,
    pub additions: Vec<DdlOp>,
    pub removals: Vec<DdlOp>,
    pub changes: Vec<ColumnPlan>,
}

impl Plan {
    /// True when no statement would be issued.
    pub fn is_empty(&self) -> bool {
        self.create.is_none()
            && self.additions.is_empty()
            && self.removals.is_empty()
            && self.changes.iter().all(|c| c.steps.is_empty())
    }
}

/// A statement that ran successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedDdl {
    pub op: DdlOp,
    pub sql: String,
}

/// A statement or lookup that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DdlFailure {
    pub column: Option<String>,
    /// Statement text; `None` when the index lookup itself failed.
    pub sql: Option<String>,
    pub message: String,
}

/// Outcome of one reconciliation pass over one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub table: String,
    /// The table did not exist and was created.
    pub created: bool,
    /// Run against an in-memory copy; nothing reached the database.
    pub dry_run: bool,
    pub applied: Vec<AppliedDdl>,
    pub failures: Vec<DdlFailure>,
    /// Changes withheld because the record's schema is immutable.
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
}

impl ReconcileReport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Default::default()
        }
    }

    /// SQL text of the applied statements, in order.
    pub fn statements(&self) -> Vec<&str> {
        self.applied.iter().map(|a| a.sql.as_str()).collect()
    }

    /// No statement failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether the pass changed anything.
    pub fn changed(&self) -> bool {
        self.created || !self.applied.is_empty()
    }
}

/// CREATE TABLE for every declared column, in declared (sorted) order.
pub fn plan_create(metadata: &EntityMetadata) -> DdlOp {
    DdlOp::CreateTable {
        table: metadata.table.clone(),
        columns: metadata.columns.clone(),
    }
}

/// Plan against a live table, or a CREATE when `live` is `None`.
pub fn plan(metadata: &EntityMetadata, live: Option<&[ColumnDescriptor]>) -> Plan {
    match live {
        Some(live) => plan_changes(metadata, live),
        None => Plan {
            create: Some(plan_create(metadata)),
            ..Default::default()
        },
    }
}

/// Plan the statements that converge an existing table.
pub fn plan_changes(metadata: &EntityMetadata, live: &[ColumnDescriptor]) -> Plan {
    let table = metadata.table.as_str();
    let diff = SchemaDiff::compute(&metadata.columns, live);
    let live_has_key = live.iter().any(|c| c.primary_key);
    let declared_key: Vec<String> = metadata
        .primary_key()
        .into_iter()
        .map(str::to_string)
        .collect();

    let additions = diff
        .added
        .into_iter()
        .map(|column| {
            let primary_key = column.primary_key.then(|| PrimaryKeyRebuild {
                drop_existing: live_has_key,
                columns: declared_key.clone(),
            });
            DdlOp::AddColumn {
                table: table.to_string(),
                column,
                primary_key,
            }
        })
        .collect();

    let removals = diff
        .removed
        .into_iter()
        .map(|column| DdlOp::DropColumn {
            table: table.to_string(),
            column,
        })
        .collect();

    let changes = diff
        .changed
        .iter()
        .map(|(declared, live)| plan_column(table, declared, live))
        .collect();

    Plan {
        create: None,
        additions,
        removals,
        changes,
    }
}

fn plan_column(table: &str, declared: &ColumnDescriptor, live: &ColumnDescriptor) -> ColumnPlan {
    let mut steps = Vec::new();
    let mut warnings = Vec::new();

    if live.unique && !declared.unique {
        steps.push(ColumnStep::DropUniqueIndexes {
            table: table.to_string(),
            column: live.name.clone(),
        });
    }
    if !live.unique && declared.unique {
        steps.push(ColumnStep::Apply(DdlOp::AddUnique {
            table: table.to_string(),
            column: declared.name.clone(),
        }));
    }

    let nullability_differs = live.nullable != declared.nullable;
    if nullability_differs {
        steps.push(ColumnStep::Apply(DdlOp::ModifyColumn {
            table: table.to_string(),
            column: declared.clone(),
            reason: ModifyReason::Nullability,
        }));
    }

    let size_differs = live.size != declared.size;
    if size_differs {
        steps.push(ColumnStep::Apply(DdlOp::ChangeColumn {
            table: table.to_string(),
            column: declared.clone(),
        }));
    }

    // Both restatements above already carry the declared type.
    if live.database_type != declared.database_type && !size_differs && !nullability_differs {
        steps.push(ColumnStep::Apply(DdlOp::ModifyColumn {
            table: table.to_string(),
            column: declared.clone(),
            reason: ModifyReason::Type,
        }));
    }

    if live.primary_key != declared.primary_key {
        warnings.push(format!(
            "{}.{}: primary key membership differs (declared {}, live {}); not altered",
            table, declared.name, declared.primary_key, live.primary_key
        ));
    }
    if live.auto_increment != declared.auto_increment {
        warnings.push(format!(
            "{}.{}: auto-increment differs (declared {}, live {}); not altered",
            table, declared.name, declared.auto_increment, live.auto_increment
        ));
    }

    ColumnPlan {
        column: declared.name.clone(),
        steps,
        warnings,
    }
}

fn inspection_error(table: &str, err: SyncError) -> SyncError {
    match err {
        SyncError::TableInspection { .. } => err,
        other => SyncError::inspection(table, other),
    }
}

fn failure_message(err: &SyncError) -> String {
    match err {
        SyncError::DdlExecution { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Apply one operation, recording the outcome. Returns whether it succeeded.
async fn run(backend: &dyn SchemaBackend, op: DdlOp, report: &mut ReconcileReport) -> bool {
    let sql = backend.render(&op);
    match backend.apply(&op).await {
        Ok(()) => {
            info!("{}: {}", report.table, sql);
            report.applied.push(AppliedDdl { op, sql });
            true
        }
        Err(e) => {
            let message = failure_message(&e);
            warn!(
                "{}: DDL failed{}: {}\n  Statement: {}",
                report.table,
                op.column()
                    .map(|c| format!(" for column {}", c))
                    .unwrap_or_default(),
                message,
                sql
            );
            report.failures.push(DdlFailure {
                column: op.column().map(str::to_string),
                sql: Some(sql),
                message,
            });
            false
        }
    }
}

/// Converge the live table toward `metadata` and report what ran.
///
/// Inspection failures and a failed CREATE TABLE are returned as errors.
/// Any other failed statement is recorded in the report and the pass moves
/// on to the next column.
pub async fn reconcile(
    backend: &dyn SchemaBackend,
    metadata: &EntityMetadata,
) -> Result<ReconcileReport> {
    let table = metadata.table.as_str();
    let mut report = ReconcileReport::new(table);

    let exists = backend
        .table_exists(table)
        .await
        .map_err(|e| inspection_error(table, e))?;

    if !exists {
        let op = plan_create(metadata);
        let sql = backend.render(&op);
        backend.apply(&op).await.map_err(|e| {
            SyncError::ddl(table, None, sql.clone(), failure_message(&e))
        })?;
        info!("Created table {}: {}", table, sql);
        report.created = true;
        report.applied.push(AppliedDdl { op, sql });
        return Ok(report);
    }

    let live = backend
        .describe_table(table)
        .await
        .map_err(|e| inspection_error(table, e))?;
    let plan = plan_changes(metadata, &live);

    for change in &plan.changes {
        for warning in &change.warnings {
            warn!("{}", warning);
        }
        report.warnings.extend(change.warnings.iter().cloned());
    }

    if plan.is_empty() {
        debug!("{}: schema is up to date", table);
        return Ok(report);
    }

    if metadata.immutable_schema {
        let render = |op: &DdlOp| backend.render(op);
        report.skipped = plan
            .additions
            .iter()
            .chain(&plan.removals)
            .map(|op| render(op))
            .chain(
                plan.changes
                    .iter()
                    .flat_map(|c| c.steps.iter().map(|s| s.describe(render))),
            )
            .collect();
        warn!(
            "{}: schema is immutable, {} change(s) not applied",
            table,
            report.skipped.len()
        );
        return Ok(report);
    }

    for op in plan.additions {
        run(backend, op, &mut report).await;
    }
    for op in plan.removals {
        run(backend, op, &mut report).await;
    }

    for change in plan.changes {
        'steps: for step in change.steps {
            match step {
                ColumnStep::Apply(op) => {
                    if !run(backend, op, &mut report).await {
                        break 'steps;
                    }
                }
                ColumnStep::DropUniqueIndexes { table, column } => {
                    let names = match backend.index_names(&table, &column).await {
                        Ok(names) => names,
                        Err(e) => {
                            warn!("{}: index lookup for {} failed: {}", table, column, e);
                            report.failures.push(DdlFailure {
                                column: Some(column),
                                sql: None,
                                message: e.to_string(),
                            });
                            break 'steps;
                        }
                    };
                    for index in names {
                        let op = DdlOp::DropIndex {
                            table: table.clone(),
                            column: column.clone(),
                            index,
                        };
                        if !run(backend, op, &mut report).await {
                            break 'steps;
                        }
                    }
                }
            }
        }
    }

    if !report.is_clean() {
        warn!(
            "{}: {} statement(s) failed, rerun to retry",
            table,
            report.failures.len()
        );
    }
    Ok(report)
}

/// Reconcile against an in-memory copy of the live table.
///
/// Reads the live schema but never changes it; the report lists the
/// statements a real pass would issue.
pub async fn dry_run(
    backend: &dyn SchemaBackend,
    metadata: &EntityMetadata,
) -> Result<ReconcileReport> {
    let table = metadata.table.as_str();
    let copy = MemorySchemaBackend::snapshot(backend, table)
        .await
        .map_err(|e| inspection_error(table, e))?;
    let mut report = reconcile(&copy, metadata).await?;
    report.dry_run = true;
    Ok(report)
}

/// Run the pass selected by `mode`. `Skip` returns `None`.
pub async fn sync(
    backend: &dyn SchemaBackend,
    metadata: &EntityMetadata,
    mode: SyncMode,
) -> Result<Option<ReconcileReport>> {
    match mode {
        SyncMode::Apply => reconcile(backend, metadata).await.map(Some),
        SyncMode::Plan => dry_run(backend, metadata).await.map(Some),
        SyncMode::Skip => {
            debug!("{}: schema sync skipped", metadata.table);
            Ok(None)
        }
    }
}
