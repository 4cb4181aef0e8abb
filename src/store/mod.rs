//! Object-store collaborator: persistence, validation and serialization behind one trait.
//!
//! Backends implement lookup, save and delete. Construction, field assignment, operator
//! attachment, serialization and credential checks are schema-driven and shared.

mod memory;
mod postgres;
mod validation;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;
pub use validation::{value_eq, FieldValidator};

use crate::config::ModelMeta;
use crate::error::ApiError;
use crate::query::{Order, Query};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// The authenticated identity acting on a request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operator {
    pub class_name: String,
    pub id: String,
}

/// One stored object. Field keys are internal names.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    /// `None` until first saved.
    pub id: Option<String>,
    pub fields: Map<String, Value>,
    pub operator: Option<Operator>,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn require_id(&self) -> Result<&str, ApiError> {
        self.id
            .as_deref()
            .ok_or_else(|| ApiError::Internal("object has not been saved".into()))
    }

    /// True when the attached operator is this very object.
    pub fn is_operated_by_self(&self, model: &ModelMeta) -> bool {
        match (&self.operator, &self.id) {
            (Some(op), Some(id)) => op.class_name == model.class_name && &op.id == id,
            _ => false,
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn find(&self, model: &ModelMeta, query: &Query) -> Result<Vec<Document>, ApiError>;

    /// Fetch one object by id; the query may narrow it further. Fails with NotFound.
    async fn get(&self, model: &ModelMeta, id: &str, query: &Query) -> Result<Document, ApiError>;

    /// Insert a new object or replace an existing one; returns the stored state.
    async fn save(&self, model: &ModelMeta, doc: Document) -> Result<Document, ApiError>;

    async fn delete(&self, model: &ModelMeta, doc: Document) -> Result<(), ApiError>;

    async fn find_one(&self, model: &ModelMeta, query: &Query) -> Result<Option<Document>, ApiError> {
        let mut query = query.clone();
        query.limit = Some(1);
        Ok(self.find(model, &query).await?.into_iter().next())
    }

    /// New, unsaved object from external input.
    fn construct(&self, model: &ModelMeta, fields: Map<String, Value>) -> Result<Document, ApiError> {
        Ok(Document {
            id: None,
            fields: FieldValidator::input(model, fields)?,
            operator: None,
        })
    }

    fn set_fields(
        &self,
        model: &ModelMeta,
        mut doc: Document,
        fields: Map<String, Value>,
    ) -> Result<Document, ApiError> {
        for (name, value) in FieldValidator::input(model, fields)? {
            doc.fields.insert(name, value);
        }
        Ok(doc)
    }

    fn apply_operator(
        &self,
        _model: &ModelMeta,
        mut doc: Document,
        operator: Option<&Operator>,
    ) -> Result<Document, ApiError> {
        doc.operator = operator.cloned();
        Ok(doc)
    }

    /// External representation: `id` first, then every readable field by external key.
    fn serialize(&self, model: &ModelMeta, doc: &Document) -> Value {
        let mut out = Map::new();
        out.insert(
            "id".into(),
            doc.id.clone().map(Value::String).unwrap_or(Value::Null),
        );
        for field in model.fields.iter().filter(|f| !f.write_only) {
            out.insert(
                field.key.clone(),
                doc.fields.get(&field.name).cloned().unwrap_or(Value::Null),
            );
        }
        Value::Object(out)
    }

    /// Check a supplied credential against the stored field value.
    fn verify_credential(
        &self,
        model: &ModelMeta,
        doc: &Document,
        field: &str,
        supplied: &Value,
    ) -> Result<(), ApiError> {
        let meta = model
            .field_named(field)
            .filter(|f| f.auth_by)
            .ok_or_else(|| ApiError::Internal(format!("{} is not a credential field", field)))?;
        match doc.fields.get(&meta.name) {
            Some(stored) if !stored.is_null() && value_eq(stored, supplied) => Ok(()),
            _ => Err(ApiError::field(meta.key.clone(), "value does not match")),
        }
    }
}

/// Ordering used by stores for `_order`; nulls sort first, numbers numerically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

pub(crate) fn sort_documents(docs: &mut [Document], order: &[(String, Order)]) {
    if order.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for (field, dir) in order {
            let (x, y) = if field == "id" {
                (
                    a.id.clone().map(Value::String).unwrap_or(Value::Null),
                    b.id.clone().map(Value::String).unwrap_or(Value::Null),
                )
            } else {
                (
                    a.fields.get(field).cloned().unwrap_or(Value::Null),
                    b.fields.get(field).cloned().unwrap_or(Value::Null),
                )
            };
            let ord = compare_values(&x, &y);
            let ord = if *dir == Order::Desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}
