//! Reconciliation against the in-memory schema backend.

use tablesync::core::traits::SchemaBackend;
use tablesync::{
    describe, dry_run, reconcile, sync, ColumnDescriptor, ConverterRegistry, EntityDescriptor,
    EntityMetadata, FieldDef, MemorySchemaBackend, MysqlDialect, SyncMode,
};

fn metadata(descriptor: EntityDescriptor) -> EntityMetadata {
    describe(
        &descriptor,
        &ConverterRegistry::with_builtins(),
        &MysqlDialect::new(),
    )
    .unwrap()
}

fn id() -> ColumnDescriptor {
    ColumnDescriptor::new("id", "INT", 11)
        .not_null()
        .primary_key()
        .auto_increment()
}

fn account() -> EntityDescriptor {
    EntityDescriptor::named("Account")
        .field(FieldDef::of::<String>("name").size(50))
        .field(FieldDef::of::<bool>("active"))
}

fn sorted(mut columns: Vec<ColumnDescriptor>) -> Vec<ColumnDescriptor> {
    columns.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    columns
}

#[tokio::test]
async fn test_missing_table_is_created_then_stable() {
    let backend = MemorySchemaBackend::new();
    let meta = metadata(account());

    let report = reconcile(&backend, &meta).await.unwrap();
    assert!(report.created);
    assert_eq!(
        report.statements(),
        vec![
            "CREATE TABLE `account` (`active` TINYINT(1), \
             `id` INT(11) NOT NULL AUTO_INCREMENT, \
             `name` VARCHAR(50), PRIMARY KEY (`id`))"
        ]
    );

    let again = reconcile(&backend, &meta).await.unwrap();
    assert!(!again.created);
    assert!(again.applied.is_empty());
    assert_eq!(backend.executed().await.len(), 1);
}

#[tokio::test]
async fn test_create_order_ignores_declaration_order() {
    let reversed = EntityDescriptor::named("Account")
        .field(FieldDef::of::<bool>("active"))
        .field(FieldDef::of::<String>("name").size(50));

    let a = MemorySchemaBackend::new();
    let b = MemorySchemaBackend::new();
    reconcile(&a, &metadata(account())).await.unwrap();
    reconcile(&b, &metadata(reversed)).await.unwrap();
    assert_eq!(a.executed().await, b.executed().await);
}

#[tokio::test]
async fn test_added_and_removed_columns() {
    let backend = MemorySchemaBackend::new().with_table(
        "account",
        vec![
            id(),
            ColumnDescriptor::new("name", "VARCHAR", 50),
            ColumnDescriptor::new("legacy_flag", "TINYINT", 1),
        ],
    );
    let meta = metadata(
        EntityDescriptor::named("Account")
            .field(FieldDef::of::<String>("name").size(50))
            .field(FieldDef::of::<f64>("score")),
    );

    let report = reconcile(&backend, &meta).await.unwrap();
    assert_eq!(
        report.statements(),
        vec![
            "ALTER TABLE `account` ADD COLUMN `score` DOUBLE",
            "ALTER TABLE `account` DROP COLUMN `legacy_flag`",
        ]
    );
    assert!(report.is_clean());
    assert!(!report
        .statements()
        .iter()
        .any(|s| s.contains("MODIFY") || s.contains("CHANGE")));
}

#[tokio::test]
async fn test_new_columns_only_add() {
    let backend = MemorySchemaBackend::new().with_table(
        "account",
        vec![id(), ColumnDescriptor::new("name", "VARCHAR", 50)],
    );
    let meta = metadata(
        account()
            .field(FieldDef::of::<i64>("balance").not_null())
            .field(FieldDef::of::<String>("email").size(120).unique()),
    );

    let report = reconcile(&backend, &meta).await.unwrap();
    assert_eq!(report.applied.len(), 3);
    assert!(report
        .applied
        .iter()
        .all(|a| a.op.kind() == "add_column"));
    assert_eq!(
        report.statements()[1],
        "ALTER TABLE `account` ADD COLUMN `balance` BIGINT(20) NOT NULL"
    );
    assert_eq!(
        report.statements()[2],
        "ALTER TABLE `account` ADD COLUMN `email` VARCHAR(120) UNIQUE"
    );
}

#[tokio::test]
async fn test_dropping_unique_looks_up_index() {
    let backend = MemorySchemaBackend::new().with_table(
        "account",
        vec![
            ColumnDescriptor::new("active", "TINYINT", 1),
            id(),
            ColumnDescriptor::new("name", "VARCHAR", 50).unique(),
        ],
    );

    let report = reconcile(&backend, &metadata(account())).await.unwrap();
    assert_eq!(
        backend.index_lookups().await,
        vec![("account".to_string(), "name".to_string())]
    );
    assert_eq!(
        report.statements(),
        vec!["ALTER TABLE `account` DROP INDEX `name`"]
    );
}

#[tokio::test]
async fn test_duplicate_unique_indexes_all_dropped() {
    let backend = MemorySchemaBackend::new()
        .with_table(
            "account",
            vec![
                ColumnDescriptor::new("active", "TINYINT", 1),
                id(),
                ColumnDescriptor::new("name", "VARCHAR", 50).unique(),
            ],
        )
        .with_index("account", "name_2", "name", true);

    let report = reconcile(&backend, &metadata(account())).await.unwrap();
    assert_eq!(
        report.statements(),
        vec![
            "ALTER TABLE `account` DROP INDEX `name`",
            "ALTER TABLE `account` DROP INDEX `name_2`",
        ]
    );
    let columns = backend.columns("account").await.unwrap();
    assert!(columns.iter().all(|c| !c.unique));
}

#[tokio::test]
async fn test_column_changes_run_in_order() {
    let backend = MemorySchemaBackend::new().with_table(
        "account",
        vec![
            ColumnDescriptor::new("active", "TINYINT", 1),
            id(),
            ColumnDescriptor::new("name", "VARCHAR", 20),
        ],
    );
    let meta = metadata(
        EntityDescriptor::named("Account")
            .field(FieldDef::of::<String>("name").size(50).not_null().unique())
            .field(FieldDef::of::<bool>("active")),
    );

    let report = reconcile(&backend, &meta).await.unwrap();
    assert_eq!(
        report.statements(),
        vec![
            "ALTER TABLE `account` ADD UNIQUE (`name`)",
            "ALTER TABLE `account` MODIFY COLUMN `name` VARCHAR(50) NOT NULL",
            "ALTER TABLE `account` CHANGE COLUMN `name` `name` VARCHAR(50) NOT NULL",
        ]
    );
}

#[tokio::test]
async fn test_converges_and_is_idempotent() {
    let backend = MemorySchemaBackend::new().with_table(
        "account",
        vec![
            ColumnDescriptor::new("active", "INT", 11),
            id(),
            ColumnDescriptor::new("name", "VARCHAR", 20).unique(),
            ColumnDescriptor::new("nickname", "VARCHAR", 20),
            ColumnDescriptor::new("code", "VARCHAR", 8).not_null(),
        ],
    );
    let meta = metadata(
        account()
            .field(FieldDef::of::<String>("code").size(16))
            .field(FieldDef::of::<String>("email").size(120).unique()),
    );

    let first = reconcile(&backend, &meta).await.unwrap();
    assert!(first.is_clean());
    assert!(first.changed());

    let live = backend.columns("account").await.unwrap();
    assert_eq!(sorted(live), meta.columns);

    let second = reconcile(&backend, &meta).await.unwrap();
    assert!(second.applied.is_empty());
    assert!(second.failures.is_empty());
}

#[tokio::test]
async fn test_failed_statement_skips_rest_of_column_only() {
    let backend = MemorySchemaBackend::new()
        .with_table(
            "account",
            vec![
                ColumnDescriptor::new("active", "TINYINT", 1).not_null(),
                id(),
                ColumnDescriptor::new("name", "VARCHAR", 20),
            ],
        )
        .failing_on("modify_column", "name");
    let meta = metadata(
        EntityDescriptor::named("Account")
            .field(FieldDef::of::<String>("name").size(50).not_null())
            .field(FieldDef::of::<bool>("active"))
            .field(FieldDef::of::<i32>("visits")),
    );

    let report = reconcile(&backend, &meta).await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].column.as_deref(), Some("name"));
    assert!(report.failures[0]
        .sql
        .as_deref()
        .unwrap()
        .starts_with("ALTER TABLE `account` MODIFY COLUMN `name`"));

    // The size change after the failed step is not attempted; other work is.
    let statements = report.statements();
    assert!(statements.iter().all(|s| !s.contains("CHANGE COLUMN `name`")));
    assert!(statements.contains(&"ALTER TABLE `account` ADD COLUMN `visits` INT(11)"));
    assert!(statements.contains(&"ALTER TABLE `account` MODIFY COLUMN `active` TINYINT(1) NULL"));

    // The next pass retries what is still divergent.
    let retry = reconcile(&backend, &meta).await.unwrap();
    assert_eq!(retry.failures.len(), 1);
    assert!(retry.applied.is_empty());
}

#[tokio::test]
async fn test_immutable_schema_lists_changes_only() {
    let backend = MemorySchemaBackend::new().with_table(
        "account",
        vec![id(), ColumnDescriptor::new("name", "VARCHAR", 20)],
    );
    let meta = metadata(account().immutable_schema());

    let report = reconcile(&backend, &meta).await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(
        report.skipped,
        vec![
            "ALTER TABLE `account` ADD COLUMN `active` TINYINT(1)".to_string(),
            "ALTER TABLE `account` CHANGE COLUMN `name` `name` VARCHAR(50) NULL".to_string(),
        ]
    );
    assert!(backend.executed().await.is_empty());
}

#[tokio::test]
async fn test_immutable_schema_still_creates_missing_table() {
    let backend = MemorySchemaBackend::new();
    let report = reconcile(&backend, &metadata(account().immutable_schema()))
        .await
        .unwrap();
    assert!(report.created);
}

#[tokio::test]
async fn test_plan_mode_leaves_backend_untouched() {
    let backend = MemorySchemaBackend::new().with_table(
        "account",
        vec![id(), ColumnDescriptor::new("name", "VARCHAR", 50).unique()],
    );
    let meta = metadata(account());

    let planned = dry_run(&backend, &meta).await.unwrap();
    assert!(planned.dry_run);
    assert_eq!(
        planned.statements(),
        vec![
            "ALTER TABLE `account` ADD COLUMN `active` TINYINT(1)",
            "ALTER TABLE `account` DROP INDEX `name`",
        ]
    );
    assert!(backend.executed().await.is_empty());

    let applied = sync(&backend, &meta, SyncMode::Apply)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(applied.statements(), planned.statements());
}

#[tokio::test]
async fn test_skip_mode_does_nothing() {
    let backend = MemorySchemaBackend::new();
    let report = sync(&backend, &metadata(account()), SyncMode::Skip)
        .await
        .unwrap();
    assert!(report.is_none());
    assert!(!backend.table_exists("account").await.unwrap());
}
