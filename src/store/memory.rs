//! In-process object store. Objects keep insertion order; ids are random UUIDs.

use crate::config::ModelMeta;
use crate::error::ApiError;
use crate::query::Query;
use crate::store::validation::{has_value, not_unique};
use crate::store::{sort_documents, value_eq, Document, FieldValidator, ObjectStore};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects of `class_name`.
    pub fn count(&self, class_name: &str) -> usize {
        self.read().get(class_name).map_or(0, Vec::len)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Document>>> {
        self.collections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Document>>> {
        self.collections.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn matches(doc: &Document, filters: &[(String, Value)]) -> bool {
    filters.iter().all(|(field, expected)| {
        if field == "id" {
            return doc.id.as_deref() == expected.as_str();
        }
        value_eq(doc.fields.get(field).unwrap_or(&Value::Null), expected)
    })
}

fn not_found(model: &ModelMeta, id: &str) -> ApiError {
    ApiError::NotFound(format!("{} '{}' not found", model.class_name, id))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn find(&self, model: &ModelMeta, query: &Query) -> Result<Vec<Document>, ApiError> {
        let resolved = query.resolve(model)?;
        let mut found: Vec<Document> = self
            .read()
            .get(&model.class_name)
            .map(|rows| rows.iter().filter(|d| matches(d, &resolved.filters)).cloned().collect())
            .unwrap_or_default();
        sort_documents(&mut found, &resolved.order);
        Ok(found
            .into_iter()
            .skip(resolved.skip.unwrap_or(0))
            .take(resolved.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn get(&self, model: &ModelMeta, id: &str, query: &Query) -> Result<Document, ApiError> {
        let resolved = query.resolve(model)?;
        self.read()
            .get(&model.class_name)
            .and_then(|rows| {
                rows.iter()
                    .find(|d| d.id.as_deref() == Some(id) && matches(d, &resolved.filters))
                    .cloned()
            })
            .ok_or_else(|| not_found(model, id))
    }

    async fn save(&self, model: &ModelMeta, mut doc: Document) -> Result<Document, ApiError> {
        FieldValidator::prepare_save(model, &mut doc, Utc::now())?;
        let mut collections = self.write();
        let rows = collections.entry(model.class_name.clone()).or_default();

        let conflicts: Vec<_> = model
            .unique_fields()
            .filter(|f| has_value(&doc.fields, f))
            .filter(|f| {
                let value = &doc.fields[&f.name];
                rows.iter().any(|r| {
                    r.id != doc.id && r.fields.get(&f.name).map_or(false, |v| value_eq(v, value))
                })
            })
            .collect();
        if !conflicts.is_empty() {
            return Err(not_unique(conflicts));
        }

        let operator = doc.operator.take();
        match doc.id.clone() {
            None => {
                doc.id = Some(uuid::Uuid::new_v4().simple().to_string());
                rows.push(doc.clone());
            }
            Some(id) => {
                let slot = rows
                    .iter_mut()
                    .find(|r| r.id.as_deref() == Some(id.as_str()))
                    .ok_or_else(|| not_found(model, &id))?;
                *slot = doc.clone();
            }
        }
        tracing::debug!(class = %model.class_name, id = ?doc.id, "object saved");
        doc.operator = operator;
        Ok(doc)
    }

    async fn delete(&self, model: &ModelMeta, doc: Document) -> Result<(), ApiError> {
        FieldValidator::check_guard(model, &doc, "delete")?;
        let id = doc.require_id()?;
        let mut collections = self.write();
        let rows = collections
            .get_mut(&model.class_name)
            .ok_or_else(|| not_found(model, id))?;
        let at = rows
            .iter()
            .position(|r| r.id.as_deref() == Some(id))
            .ok_or_else(|| not_found(model, id))?;
        rows.remove(at);
        tracing::debug!(class = %model.class_name, id, "object deleted");
        Ok(())
    }
}
