//! Bundled demo record exercising every built-in converter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tablesync::{
    ConverterRegistry, DomainType, Entity, EntityDescriptor, FieldDef, FieldValue, Record,
    Result, SyncError,
};
use tablesync::convert::UuidConverter;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Demo {
    pub id: Option<i32>,
    #[serde(skip)]
    pub persisted: bool,
    pub str_value: Option<String>,
    pub long_str_value: Option<String>,
    pub i_value: Option<i32>,
    pub d_value: Option<f64>,
    pub b_value: Option<bool>,
    pub f_value: Option<f32>,
    pub unique_str: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub token: Option<String>,
}

impl Demo {
    /// A populated instance whose unique column differs on every call.
    pub fn sample() -> Self {
        let token = uuid::Uuid::new_v4().to_string();
        Self {
            str_value: Some("hello".into()),
            long_str_value: Some("a longer body of text".into()),
            i_value: Some(42),
            d_value: Some(3.5),
            b_value: Some(true),
            f_value: Some(1.25),
            unique_str: Some(format!("demo-{}", token)),
            created_at: Some(Utc::now()),
            token: Some(token),
            ..Default::default()
        }
    }
}

/// Built-in converters plus the UUID converter the demo's `token` uses.
pub fn registry() -> Arc<ConverterRegistry> {
    let mut registry = ConverterRegistry::with_builtins();
    registry.register::<uuid::Uuid>(Arc::new(UuidConverter));
    Arc::new(registry)
}

impl Record for Demo {
    fn get_field(&self, field: &str) -> Option<FieldValue> {
        Some(match field {
            "strValue" => self.str_value.clone().into(),
            "longStrValue" => self.long_str_value.clone().into(),
            "iValue" => self.i_value.into(),
            "dvalue" => self.d_value.into(),
            "bvalue" => self.b_value.into(),
            "fvalue" => self.f_value.into(),
            "uniqueStr" => self.unique_str.clone().into(),
            "createdAt" => self.created_at.into(),
            "token" => self.token.clone().into(),
            _ => return None,
        })
    }
}

impl Entity for Demo {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new::<Demo>()
            .field(FieldDef::of::<String>("strValue").size(512))
            .field(FieldDef::of::<String>("longStrValue").long_text())
            .field(FieldDef::of::<i32>("iValue"))
            .field(FieldDef::of::<f64>("dvalue"))
            .field(FieldDef::of::<bool>("bvalue"))
            .field(FieldDef::of::<f32>("fvalue"))
            .field(
                FieldDef::of::<String>("uniqueStr")
                    .size(512)
                    .unique()
                    .not_null(),
            )
            .field(FieldDef::of::<DateTime<Utc>>("createdAt"))
            .field(FieldDef::with_type("token", DomainType::of::<uuid::Uuid>()))
    }

    fn id(&self) -> Option<i32> {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = Some(id);
    }

    fn is_persisted(&self) -> bool {
        self.persisted
    }

    fn set_persisted(&mut self, persisted: bool) {
        self.persisted = persisted;
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<()> {
        match field {
            "strValue" => self.str_value = value.try_into()?,
            "longStrValue" => self.long_str_value = value.try_into()?,
            "iValue" => self.i_value = value.try_into()?,
            "dvalue" => self.d_value = value.try_into()?,
            "bvalue" => self.b_value = value.try_into()?,
            "fvalue" => self.f_value = value.try_into()?,
            "uniqueStr" => self.unique_str = value.try_into()?,
            "createdAt" => self.created_at = value.try_into()?,
            "token" => self.token = value.try_into()?,
            other => {
                return Err(SyncError::UnknownField {
                    record: "Demo".into(),
                    field: other.into(),
                })
            }
        }
        Ok(())
    }
}
