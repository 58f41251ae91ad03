//! Record declarations and their mapping onto table metadata.
//!
//! A record type implements [`Entity`]: it returns an [`EntityDescriptor`]
//! naming its fields and tags, and exposes field values through
//! [`Record::get_field`] / [`Entity::set_field`]. [`describe`] turns the
//! descriptor into [`EntityMetadata`](crate::core::EntityMetadata), the
//! declared side of every schema comparison.

mod descriptor;
mod introspect;

pub use descriptor::{
    base_fields, DomainType, EntityDescriptor, FieldDef, TextStorage, BASE_ID_FIELD,
    RESERVED_FIELDS,
};
pub use introspect::describe;

use crate::core::FieldValue;
use crate::error::Result;

/// Sentinel id of a record that has never been inserted.
pub const INVALID_ID: i32 = -1;

/// Read access to a record's declared fields.
///
/// Object-safe so converters can take `&dyn Record`.
pub trait Record: Send + Sync {
    /// Current value of a declared field, or `None` if the field is unknown.
    fn get_field(&self, field: &str) -> Option<FieldValue>;

    /// Type name used in diagnostics.
    fn record_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A record type whose rows live in one table.
///
/// The surrogate key and persisted flag are held by the record but managed
/// by [`EntityManager`](crate::manager::EntityManager); `get_field` and
/// `set_field` only need to cover the record's own fields.
pub trait Entity: Record + Default + 'static {
    /// Fields and tags of this record type.
    fn descriptor() -> EntityDescriptor;

    fn id(&self) -> Option<i32>;

    fn set_id(&mut self, id: i32);

    /// Whether this instance corresponds to a stored row.
    fn is_persisted(&self) -> bool;

    fn set_persisted(&mut self, persisted: bool);

    /// Assign a declared field from a value read out of the database.
    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<()>;
}

/// Exposes an entity's surrogate key alongside its own fields.
pub(crate) struct EntityView<'a, E: Entity>(pub &'a E);

impl<E: Entity> Record for EntityView<'_, E> {
    fn get_field(&self, field: &str) -> Option<FieldValue> {
        if field == BASE_ID_FIELD {
            if let Some(value) = self.0.get_field(field) {
                return Some(value);
            }
            return Some(self.0.id().into());
        }
        self.0.get_field(field)
    }

    fn record_name(&self) -> &'static str {
        self.0.record_name()
    }
}
