//! Builds parameterized statements over per-model document tables.
//!
//! Each model lives in one table `(id TEXT, payload JSONB, created_at, updated_at)`.
//! Filters use JSONB containment; field names only come from model metadata.

use crate::config::ModelMeta;
use crate::naming::to_snake_case;
use crate::query::{Order, ResolvedQuery};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Quote a JSON key as a string literal for `payload->'key'`.
fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// Table name for a model: `UserProfile` -> `user_profile`.
pub fn table_name(model: &ModelMeta) -> String {
    to_snake_case(&model.class_name)
}

#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Text(String),
    Json(Value),
    Int(i64),
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl QueryBuf {
    fn push_param(&mut self, v: SqlParam) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema))
}

pub fn create_table(schema: &str, model: &ModelMeta) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY,
            payload JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
        qualified_table(schema, &table_name(model))
    )
}

/// SELECT matching a resolved query. `id` narrows to one row when given.
pub fn select(schema: &str, model: &ModelMeta, query: &ResolvedQuery, id: Option<&str>) -> QueryBuf {
    let mut q = QueryBuf::default();
    let table = qualified_table(schema, &table_name(model));
    let mut where_parts = Vec::new();
    if let Some(id) = id {
        let n = q.push_param(SqlParam::Text(id.to_string()));
        where_parts.push(format!("id = ${}", n));
    }
    let mut contains = Map::new();
    for (field, value) in &query.filters {
        if field == "id" {
            let id = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
            let n = q.push_param(SqlParam::Text(id));
            where_parts.push(format!("id = ${}", n));
        } else {
            contains.insert(field.clone(), value.clone());
        }
    }
    if !contains.is_empty() {
        let n = q.push_param(SqlParam::Json(Value::Object(contains)));
        where_parts.push(format!("payload @> ${}", n));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    let order_clause = if query.order.is_empty() {
        " ORDER BY created_at ASC, id ASC".to_string()
    } else {
        let parts: Vec<String> = query
            .order
            .iter()
            .map(|(field, dir)| {
                let expr = if field == "id" {
                    "id".to_string()
                } else {
                    format!("payload->{}", literal(field))
                };
                let dir = match dir {
                    Order::Asc => "ASC NULLS FIRST",
                    Order::Desc => "DESC NULLS LAST",
                };
                format!("{} {}", expr, dir)
            })
            .collect();
        format!(" ORDER BY {}", parts.join(", "))
    };

    let mut tail = String::new();
    if let Some(limit) = query.limit {
        let n = q.push_param(SqlParam::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
        tail.push_str(&format!(" LIMIT ${}", n));
    }
    if let Some(skip) = query.skip {
        let n = q.push_param(SqlParam::Int(i64::try_from(skip).unwrap_or(i64::MAX)));
        tail.push_str(&format!(" OFFSET ${}", n));
    }

    q.sql = format!(
        "SELECT id, payload FROM {}{}{}{}",
        table, where_clause, order_clause, tail
    );
    q
}

pub fn insert(schema: &str, model: &ModelMeta, id: &str, payload: Value) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "INSERT INTO {} (id, payload) VALUES ($1, $2) RETURNING id, payload",
            qualified_table(schema, &table_name(model))
        ),
        params: vec![SqlParam::Text(id.to_string()), SqlParam::Json(payload)],
    }
}

pub fn update(schema: &str, model: &ModelMeta, id: &str, payload: Value) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "UPDATE {} SET payload = $2, updated_at = NOW() WHERE id = $1 RETURNING id, payload",
            qualified_table(schema, &table_name(model))
        ),
        params: vec![SqlParam::Text(id.to_string()), SqlParam::Json(payload)],
    }
}

pub fn delete(schema: &str, model: &ModelMeta, id: &str) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "DELETE FROM {} WHERE id = $1",
            qualified_table(schema, &table_name(model))
        ),
        params: vec![SqlParam::Text(id.to_string())],
    }
}

/// Name of the unique index over `field`, cut to PostgreSQL's 63-byte identifier limit.
pub fn unique_index_name(model: &ModelMeta, field: &str) -> String {
    let mut name = format!("{}_{}_key", table_name(model), field);
    while name.len() > 63 {
        name.pop();
    }
    name
}

/// Unique index over one payload field. JSON `null` and absent values are not indexed.
pub fn create_unique_index(schema: &str, model: &ModelMeta, field: &str) -> String {
    let expr = format!("payload->{}", literal(field));
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} (({})) WHERE {} <> 'null'::jsonb",
        quoted(&unique_index_name(model, field)),
        qualified_table(schema, &table_name(model)),
        expr,
        expr
    )
}

/// Any other row holding `value` in `field`. `exclude_id` skips the row being updated.
pub fn find_conflict(
    schema: &str,
    model: &ModelMeta,
    field: &str,
    value: Value,
    exclude_id: Option<&str>,
) -> QueryBuf {
    let mut q = QueryBuf::default();
    let v = q.push_param(SqlParam::Json(value));
    let mut sql = format!(
        "SELECT id FROM {} WHERE payload->{} = ${}",
        qualified_table(schema, &table_name(model)),
        literal(field),
        v
    );
    if let Some(id) = exclude_id {
        let n = q.push_param(SqlParam::Text(id.to_string()));
        sql.push_str(&format!(" AND id <> ${}", n));
    }
    sql.push_str(" LIMIT 1");
    q.sql = sql;
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldKind, FieldMeta};
    use serde_json::json;

    fn song() -> ModelMeta {
        ModelMeta::new("SongRelease").field(FieldMeta::new("year", FieldKind::Integer))
    }

    #[test]
    fn select_uses_containment_order_and_paging() {
        let query = ResolvedQuery {
            filters: vec![("year".into(), json!(2021))],
            limit: Some(10),
            skip: Some(20),
            order: vec![("year".into(), Order::Desc)],
        };
        let q = select("public", &song(), &query, None);
        assert_eq!(
            q.sql,
            "SELECT id, payload FROM \"public\".\"song_release\" WHERE payload @> $1 \
             ORDER BY payload->'year' DESC NULLS LAST LIMIT $2 OFFSET $3"
        );
        assert_eq!(
            q.params,
            vec![SqlParam::Json(json!({ "year": 2021 })), SqlParam::Int(10), SqlParam::Int(20)]
        );
    }

    #[test]
    fn select_by_id_defaults_to_insertion_order() {
        let q = select("public", &song(), &ResolvedQuery::default(), Some("abc"));
        assert!(q.sql.ends_with("WHERE id = $1 ORDER BY created_at ASC, id ASC"));
        assert_eq!(q.params, vec![SqlParam::Text("abc".into())]);
    }

    #[test]
    fn unique_index_covers_non_null_values() {
        assert_eq!(
            create_unique_index("public", &song(), "year"),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"song_release_year_key\" ON \"public\".\"song_release\" \
             ((payload->'year')) WHERE payload->'year' <> 'null'::jsonb"
        );
        let long = "f".repeat(80);
        let name = unique_index_name(&song(), &long);
        assert_eq!(name.len(), 63);
        assert!(name.starts_with("song_release_fff"));
    }

    #[test]
    fn identifiers_and_keys_are_escaped() {
        assert_eq!(quoted("we\"ird"), "\"we\"\"ird\"");
        let q = find_conflict("s", &song(), "it's", json!("x"), Some("1"));
        assert!(q.sql.contains("payload->'it''s' = $1 AND id <> $2"));
    }
}
