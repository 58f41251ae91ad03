//! Builder types a record uses to declare its fields and table tags.

use std::any::type_name;

use serde::Serialize;

/// Name of the inherited surrogate key field.
pub const BASE_ID_FIELD: &str = "id";

/// Field names that belong to the persistence layer rather than the record.
pub const RESERVED_FIELDS: &[&str] = &["persisted", "INVALID_ID"];

/// Registry key identifying a field's domain type.
///
/// Keys are the Rust type name, so `DomainType::of::<String>()` and a
/// converter registered with `register::<String>` always agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DomainType(String);

impl DomainType {
    /// Key for a Rust type. Use the inner type for `Option<T>` fields.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(type_name::<T>().to_string())
    }

    /// Key from an explicit name, for types registered under a custom key.
    pub fn named(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Storage class for long character fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextStorage {
    /// TEXT (64 KiB).
    Text,
    /// MEDIUMTEXT (16 MiB).
    MediumText,
    /// LONGTEXT (4 GiB).
    LongText,
}

impl TextStorage {
    pub fn database_type(&self) -> &'static str {
        match self {
            TextStorage::Text => "TEXT",
            TextStorage::MediumText => "MEDIUMTEXT",
            TextStorage::LongText => "LONGTEXT",
        }
    }
}

/// One declared field and its persistence tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub domain_type: DomainType,
    /// Column name override; defaults to the field name.
    pub column: Option<String>,
    pub ignore: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
    pub unique: bool,
    pub size: Option<u32>,
    pub text_storage: Option<TextStorage>,
}

impl FieldDef {
    /// Declare a field of domain type `T`.
    pub fn of<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::with_type(name, DomainType::of::<T>())
    }

    /// Declare a field with an explicit domain type key.
    pub fn with_type(name: impl Into<String>, domain_type: DomainType) -> Self {
        Self {
            name: name.into(),
            domain_type,
            column: None,
            ignore: false,
            primary_key: false,
            auto_increment: false,
            not_null: false,
            unique: false,
            size: None,
            text_storage: None,
        }
    }

    /// Column name this field maps to.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    #[must_use]
    pub fn text_storage(mut self, storage: TextStorage) -> Self {
        self.text_storage = Some(storage);
        self
    }

    /// Shorthand for `text_storage(TextStorage::LongText)`.
    #[must_use]
    pub fn long_text(self) -> Self {
        self.text_storage(TextStorage::LongText)
    }
}

/// Everything a record type declares about its table.
///
/// ```rust
/// use tablesync::entity::{EntityDescriptor, FieldDef};
///
/// struct Account;
///
/// let descriptor = EntityDescriptor::new::<Account>()
///     .table("accounts")
///     .field(FieldDef::of::<String>("email").size(255).not_null().unique())
///     .field(FieldDef::of::<bool>("active"));
///
/// assert_eq!(descriptor.table_name(), "accounts");
/// assert_eq!(descriptor.all_fields().count(), 3);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct EntityDescriptor {
    /// Record type name, used for the default table name and diagnostics.
    pub record: String,
    pub table: Option<String>,
    /// Fields inherited from the base record, listed before `fields`.
    pub inherited: Vec<FieldDef>,
    pub fields: Vec<FieldDef>,
    pub no_id: bool,
    pub immutable_schema: bool,
}

impl EntityDescriptor {
    /// Descriptor for record type `R`, inheriting the surrogate `id` key.
    pub fn new<R: ?Sized + 'static>() -> Self {
        Self::named(simple_type_name::<R>())
    }

    /// Descriptor for a record with an explicit name.
    pub fn named(record: impl Into<String>) -> Self {
        Self {
            record: record.into(),
            table: None,
            inherited: base_fields(),
            fields: Vec::new(),
            no_id: false,
            immutable_schema: false,
        }
    }

    /// Override the table name.
    #[must_use]
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = Some(name.into());
        self
    }

    /// Keep the key column but never write or read it.
    #[must_use]
    pub fn no_id(mut self) -> Self {
        self.no_id = true;
        self
    }

    /// Create the table if missing but never alter it.
    #[must_use]
    pub fn immutable_schema(mut self) -> Self {
        self.immutable_schema = true;
        self
    }

    /// Drop the inherited surrogate key; the record declares its own key.
    #[must_use]
    pub fn without_base_id(mut self) -> Self {
        self.inherited.retain(|f| f.name != BASE_ID_FIELD);
        self
    }

    /// Add fields inherited from an intermediate record type.
    #[must_use]
    pub fn inherit(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.inherited.extend(fields);
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Table name: the explicit tag or the record name, lower-cased.
    pub fn table_name(&self) -> String {
        self.table
            .as_deref()
            .unwrap_or(&self.record)
            .to_lowercase()
    }

    /// Inherited fields followed by the record's own.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.inherited.iter().chain(self.fields.iter())
    }

    /// Whether the record still carries the inherited surrogate key.
    pub fn has_base_id(&self) -> bool {
        self.inherited.iter().any(|f| f.name == BASE_ID_FIELD)
    }
}

/// Fields every record inherits: the auto-increment `id` key.
pub fn base_fields() -> Vec<FieldDef> {
    vec![FieldDef::of::<i32>(BASE_ID_FIELD)
        .primary_key()
        .auto_increment()
        .not_null()]
}

/// `my_app::model::Account<T>` -> `Account`.
fn simple_type_name<T: ?Sized + 'static>() -> String {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
