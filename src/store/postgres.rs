//! PostgreSQL object store: one JSONB document table per model.

use crate::config::{FieldMeta, ModelMeta};
use crate::error::ApiError;
use crate::query::Query;
use crate::sql::{self, QueryBuf, SqlParam};
use crate::store::validation::{has_value, not_unique};
use crate::store::{Document, FieldValidator, ObjectStore};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgPool, Postgres, Row};

pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Clone, Debug)]
pub struct PgDocumentStore {
    pool: PgPool,
    schema: String,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_schema(pool, DEFAULT_SCHEMA)
    }

    pub fn with_schema(pool: PgPool, schema: impl Into<String>) -> Self {
        PgDocumentStore {
            pool,
            schema: schema.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema, one table per model and one unique index per unique field,
    /// if they do not exist.
    pub async fn ensure_tables(&self, models: &[ModelMeta]) -> Result<(), ApiError> {
        sqlx::query(&sql::create_schema(&self.schema))
            .execute(&self.pool)
            .await?;
        for model in models {
            sqlx::query(&sql::create_table(&self.schema, model))
                .execute(&self.pool)
                .await?;
            for field in model.unique_fields() {
                sqlx::query(&sql::create_unique_index(&self.schema, model, &field.name))
                    .execute(&self.pool)
                    .await?;
            }
            tracing::debug!(class = %model.class_name, schema = %self.schema, "document table ready");
        }
        Ok(())
    }

    async fn fetch_all(&self, q: QueryBuf) -> Result<Vec<Document>, ApiError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind(sqlx::query(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(to_document).collect()
    }

    async fn fetch_optional(&self, q: QueryBuf) -> Result<Option<Document>, ApiError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind(sqlx::query(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(to_document).transpose()
    }

    async fn check_unique(&self, model: &ModelMeta, doc: &Document) -> Result<(), ApiError> {
        let mut conflicts = Vec::new();
        for field in model.unique_fields().filter(|f| has_value(&doc.fields, f)) {
            let value = doc.fields[&field.name].clone();
            let q = sql::find_conflict(&self.schema, model, &field.name, value, doc.id.as_deref());
            tracing::debug!(sql = %q.sql, params = ?q.params, "query");
            let hit = bind(sqlx::query(&q.sql), &q.params)
                .fetch_optional(&self.pool)
                .await?;
            if hit.is_some() {
                conflicts.push(field);
            }
        }
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(not_unique(conflicts))
        }
    }
}

fn bind<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for p in params {
        query = match p {
            SqlParam::Text(s) => query.bind(s.as_str()),
            SqlParam::Json(v) => query.bind(v),
            SqlParam::Int(n) => query.bind(*n),
        };
    }
    query
}

fn to_document(row: &PgRow) -> Result<Document, ApiError> {
    let id: String = row.try_get("id")?;
    let payload: Value = row.try_get("payload")?;
    let fields = match payload {
        Value::Object(map) => map,
        other => {
            return Err(ApiError::Internal(format!(
                "stored payload for '{}' is not an object: {}",
                id, other
            )))
        }
    };
    Ok(Document {
        id: Some(id),
        fields,
        operator: None,
    })
}

/// The unique field guarded by the index named `constraint`.
fn field_for_index<'a>(model: &'a ModelMeta, constraint: &str) -> Option<&'a FieldMeta> {
    model
        .unique_fields()
        .find(|f| sql::unique_index_name(model, &f.name) == constraint)
}

fn not_found(model: &ModelMeta, id: &str) -> ApiError {
    ApiError::NotFound(format!("{} '{}' not found", model.class_name, id))
}

#[async_trait]
impl ObjectStore for PgDocumentStore {
    async fn find(&self, model: &ModelMeta, query: &Query) -> Result<Vec<Document>, ApiError> {
        let resolved = query.resolve(model)?;
        self.fetch_all(sql::select(&self.schema, model, &resolved, None))
            .await
    }

    async fn get(&self, model: &ModelMeta, id: &str, query: &Query) -> Result<Document, ApiError> {
        let resolved = query.resolve(model)?;
        self.fetch_optional(sql::select(&self.schema, model, &resolved, Some(id)))
            .await?
            .ok_or_else(|| not_found(model, id))
    }

    async fn save(&self, model: &ModelMeta, mut doc: Document) -> Result<Document, ApiError> {
        FieldValidator::prepare_save(model, &mut doc, Utc::now())?;
        self.check_unique(model, &doc).await?;
        let payload = Value::Object(doc.fields.clone());
        let q = match &doc.id {
            None => sql::insert(&self.schema, model, &uuid::Uuid::new_v4().simple().to_string(), payload),
            Some(id) => sql::update(&self.schema, model, id, payload),
        };
        let stored = match self.fetch_optional(q).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Err(not_found(model, doc.id.as_deref().unwrap_or_default())),
            Err(ApiError::Db(sqlx::Error::Database(e))) if e.is_unique_violation() => {
                let field = e.constraint().and_then(|c| field_for_index(model, c));
                return Err(match field {
                    Some(field) => not_unique([field]),
                    None => ApiError::Db(sqlx::Error::Database(e)),
                });
            }
            Err(e) => return Err(e),
        };
        Ok(Document {
            operator: doc.operator,
            ..stored
        })
    }

    async fn delete(&self, model: &ModelMeta, doc: Document) -> Result<(), ApiError> {
        FieldValidator::check_guard(model, &doc, "delete")?;
        let id = doc.require_id()?;
        let q = sql::delete(&self.schema, model, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bind(sqlx::query(&q.sql), &q.params)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(not_found(model, id));
        }
        Ok(())
    }
}
