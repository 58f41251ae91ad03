//! Derive declared table metadata from an entity descriptor.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::convert::ConverterRegistry;
use crate::core::{ColumnDescriptor, Dialect, EntityMetadata, FieldBinding};
use crate::error::{Result, SyncError};

use super::descriptor::{EntityDescriptor, BASE_ID_FIELD, RESERVED_FIELDS};

/// Build the declared column set for a record type.
///
/// Fields tagged `ignore`, reserved names and fields whose domain type has no
/// registered converter are skipped. Sizes left unspecified resolve through
/// the converter, then the dialect, so the result compares directly against
/// columns read back from the database. Columns come out sorted by name.
pub fn describe(
    descriptor: &EntityDescriptor,
    registry: &ConverterRegistry,
    dialect: &dyn Dialect,
) -> Result<EntityMetadata> {
    let record = descriptor.record.as_str();
    let table = descriptor.table_name();
    let inherits_id = descriptor.has_base_id();

    let mut entries: Vec<(ColumnDescriptor, FieldBinding)> = Vec::new();
    let mut seen = HashSet::new();

    for field in descriptor.all_fields() {
        if field.ignore {
            debug!("{}: field {} is ignored", record, field.name);
            continue;
        }
        if RESERVED_FIELDS.contains(&field.name.as_str()) {
            continue;
        }

        let Some(converter) = registry.resolve(&field.domain_type) else {
            info!(
                "{}: no converter for type {} of field {}, skipping",
                record,
                field.domain_type.as_str(),
                field.name
            );
            continue;
        };

        let column_name = field.column_name().to_string();
        if !seen.insert(column_name.to_lowercase()) {
            return Err(SyncError::definition(
                record,
                format!("duplicate column name {}", column_name),
            ));
        }

        let database_type = converter.database_type(field).to_uppercase();
        let size = field
            .size
            .or_else(|| converter.default_size(field))
            .unwrap_or_else(|| dialect.default_size(&database_type));

        let mut column = ColumnDescriptor::new(column_name.clone(), database_type, size);
        column.nullable = !field.not_null;
        column.primary_key = field.primary_key;
        column.auto_increment = field.auto_increment;
        column.unique = field.unique;

        // Key columns are implicitly NOT NULL and already unique.
        if column.primary_key {
            column.nullable = false;
            column.unique = false;
        }

        let binding = FieldBinding {
            field: field.name.clone(),
            column: column_name,
            type_key: field.domain_type.as_str().to_string(),
            surrogate_key: inherits_id && field.name == BASE_ID_FIELD,
        };
        entries.push((column, binding));
    }

    if entries.is_empty() {
        return Err(SyncError::definition(record, "no persistable fields"));
    }

    let auto_increment = entries.iter().filter(|(c, _)| c.auto_increment).count();
    if auto_increment > 1 {
        return Err(SyncError::definition(
            record,
            format!("{} auto-increment columns, at most one allowed", auto_increment),
        ));
    }

    entries.sort_by(|(a, _), (b, _)| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    let (columns, bindings): (Vec<_>, Vec<_>) = entries.into_iter().unzip();

    Ok(EntityMetadata {
        record: record.to_string(),
        table,
        columns,
        bindings,
        no_id: descriptor.no_id,
        immutable_schema: descriptor.immutable_schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mysql::MysqlDialect;
    use crate::entity::{DomainType, FieldDef};

    struct Demo;
    struct Opaque;

    fn demo() -> EntityDescriptor {
        EntityDescriptor::new::<Demo>()
            .field(FieldDef::of::<String>("strValue").size(512))
            .field(FieldDef::of::<String>("longStrValue").long_text())
            .field(FieldDef::of::<i32>("iValue"))
            .field(FieldDef::of::<f64>("dvalue"))
            .field(FieldDef::of::<bool>("bvalue"))
            .field(FieldDef::of::<f32>("fvalue"))
            .field(FieldDef::of::<String>("uniqueStr").size(512).unique().not_null())
    }

    fn run(descriptor: &EntityDescriptor) -> Result<EntityMetadata> {
        describe(
            descriptor,
            &ConverterRegistry::with_builtins(),
            &MysqlDialect::new(),
        )
    }

    #[test]
    fn test_demo_columns() {
        let meta = run(&demo()).unwrap();
        assert_eq!(meta.table, "demo");

        let names: Vec<_> = meta.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "bvalue",
                "dvalue",
                "fvalue",
                "id",
                "iValue",
                "longStrValue",
                "strValue",
                "uniqueStr"
            ]
        );

        let id = meta.column("id").unwrap();
        assert_eq!(
            *id,
            ColumnDescriptor::new("id", "INT", 11)
                .not_null()
                .primary_key()
                .auto_increment()
        );
        assert_eq!(
            *meta.column("strValue").unwrap(),
            ColumnDescriptor::new("strValue", "VARCHAR", 512)
        );
        assert_eq!(
            *meta.column("longStrValue").unwrap(),
            ColumnDescriptor::new("longStrValue", "LONGTEXT", 0)
        );
        assert_eq!(
            *meta.column("bvalue").unwrap(),
            ColumnDescriptor::new("bvalue", "TINYINT", 1)
        );
        assert_eq!(
            *meta.column("uniqueStr").unwrap(),
            ColumnDescriptor::new("uniqueStr", "VARCHAR", 512)
                .not_null()
                .unique()
        );
        assert_eq!(meta.id_column(), Some("id"));
    }

    #[test]
    fn test_bindings_follow_column_order() {
        let meta = run(&demo()).unwrap();
        for (column, binding) in meta.columns.iter().zip(&meta.bindings) {
            assert_eq!(column.name, binding.column);
        }
        let id = meta.binding_for_column("id").unwrap();
        assert!(id.surrogate_key);
        assert!(!meta.binding_for_column("iValue").unwrap().surrogate_key);
    }

    #[test]
    fn test_default_varchar_size() {
        let d = EntityDescriptor::new::<Demo>().field(FieldDef::of::<String>("name"));
        let meta = run(&d).unwrap();
        assert_eq!(meta.column("name").unwrap().size, 1024);
    }

    #[test]
    fn test_skips_ignored_reserved_and_unmapped_fields() {
        let d = EntityDescriptor::new::<Demo>()
            .field(FieldDef::of::<String>("cache").ignore())
            .field(FieldDef::of::<bool>("persisted"))
            .field(FieldDef::with_type("blob", DomainType::of::<Opaque>()))
            .field(FieldDef::of::<i64>("count"));
        let meta = run(&d).unwrap();
        let names: Vec<_> = meta.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["count", "id"]);
    }

    #[test]
    fn test_primary_key_normalized() {
        let d = EntityDescriptor::new::<Demo>()
            .without_base_id()
            .field(FieldDef::of::<String>("code").size(8).primary_key().unique());
        let meta = run(&d).unwrap();
        let code = meta.column("code").unwrap();
        assert!(!code.nullable);
        assert!(!code.unique);
        assert!(code.primary_key);
    }

    #[test]
    fn test_column_override_and_table_tag() {
        let d = EntityDescriptor::new::<Demo>()
            .table("Widgets")
            .field(FieldDef::of::<String>("displayName").column("display_name"));
        let meta = run(&d).unwrap();
        assert_eq!(meta.table, "widgets");
        let binding = meta.binding_for_column("display_name").unwrap();
        assert_eq!(binding.field, "displayName");
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let d = EntityDescriptor::new::<Demo>()
            .field(FieldDef::of::<String>("name"))
            .field(FieldDef::of::<String>("label").column("NAME"));
        let err = run(&d).unwrap_err();
        assert!(matches!(err, SyncError::RecordDefinition { .. }));
    }

    #[test]
    fn test_second_auto_increment_rejected() {
        let d = EntityDescriptor::new::<Demo>().field(FieldDef::of::<i64>("seq").auto_increment());
        assert!(matches!(
            run(&d),
            Err(SyncError::RecordDefinition { .. })
        ));
    }

    #[test]
    fn test_no_fields_rejected() {
        let d = EntityDescriptor::new::<Demo>().without_base_id();
        assert!(run(&d).is_err());
    }

    #[test]
    fn test_entity_tags_carried() {
        let meta = run(&demo().no_id().immutable_schema()).unwrap();
        assert!(meta.no_id);
        assert!(meta.immutable_schema);
    }
}
