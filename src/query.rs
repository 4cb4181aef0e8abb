//! Query strings: parse, stringify, compose, and resolve against a model.
//!
//! Filters are equality matches. Nested keys use brackets (`author[name]=jo`).
//! Reserved keys: `_limit`, `_skip`, `_order` (comma separated, `-field` for descending).
//! Other `_`-prefixed keys are kept as directives and ignored by the shipped stores.

use crate::config::{FieldKind, ModelMeta};
use crate::error::ApiError;
use serde_json::{Map, Value};
use url::form_urlencoded;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Keys as supplied: internal field names or external keys.
    pub filters: Map<String, Value>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub order: Vec<(String, Order)>,
    pub directives: Map<String, Value>,
}

/// A query whose keys are internal field names (or `id`) and whose values are typed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedQuery {
    pub filters: Vec<(String, Value)>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub order: Vec<(String, Order)>,
}

impl Query {
    pub fn parse(qs: &str) -> Result<Self, ApiError> {
        let mut tree = Map::new();
        for (key, value) in form_urlencoded::parse(qs.trim_start_matches('?').as_bytes()) {
            if key.is_empty() {
                continue;
            }
            let path = split_key(&key)?;
            insert_path(&mut tree, &path, Value::String(value.into_owned()))?;
        }
        Self::from_tree(tree)
    }

    /// Parse an optional query string; `None` and `""` give the empty query.
    pub fn parse_opt(qs: Option<&str>) -> Result<Self, ApiError> {
        match qs {
            Some(s) if !s.is_empty() => Self::parse(s),
            _ => Ok(Query::default()),
        }
    }

    /// Query from a structured filter, e.g. an ensure matcher.
    pub fn from_filter(filter: Map<String, Value>) -> Result<Self, ApiError> {
        Self::from_tree(filter)
    }

    pub fn by(key: impl Into<String>, value: Value) -> Self {
        let mut filters = Map::new();
        filters.insert(key.into(), value);
        Query {
            filters,
            ..Default::default()
        }
    }

    fn from_tree(tree: Map<String, Value>) -> Result<Self, ApiError> {
        let mut q = Query::default();
        for (key, value) in tree {
            match key.as_str() {
                "_limit" => q.limit = Some(parse_count("_limit", &value)?),
                "_skip" => q.skip = Some(parse_count("_skip", &value)?),
                "_order" => q.order = parse_order(&value)?,
                k if k.starts_with('_') => {
                    q.directives.insert(key, value);
                }
                _ => {
                    q.filters.insert(key, value);
                }
            }
        }
        Ok(q)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
            && self.limit.is_none()
            && self.skip.is_none()
            && self.order.is_empty()
            && self.directives.is_empty()
    }

    /// Map keys to internal field names and coerce string values to each field's kind.
    pub fn resolve(&self, model: &ModelMeta) -> Result<ResolvedQuery, ApiError> {
        let mut filters = Vec::with_capacity(self.filters.len());
        for (key, value) in &self.filters {
            if key == "id" || key == "_id" {
                let id = match value {
                    Value::String(s) => Value::String(s.clone()),
                    Value::Number(n) => Value::String(n.to_string()),
                    _ => return Err(ApiError::BadRequest("id filter must be a scalar".into())),
                };
                filters.push(("id".to_string(), id));
                continue;
            }
            let field = model
                .field_for(key)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown filter field '{}'", key)))?;
            if field.write_only {
                return Err(ApiError::BadRequest(format!("cannot filter by '{}'", key)));
            }
            filters.push((field.name.clone(), coerce(key, value, field.kind)?));
        }
        let mut order = Vec::with_capacity(self.order.len());
        for (key, dir) in &self.order {
            let name = if key == "id" {
                "id".to_string()
            } else {
                model
                    .field_for(key)
                    .map(|f| f.name.clone())
                    .ok_or_else(|| ApiError::BadRequest(format!("unknown order field '{}'", key)))?
            };
            order.push((name, *dir));
        }
        Ok(ResolvedQuery {
            filters,
            limit: self.limit,
            skip: self.skip,
            order,
        })
    }
}

/// Serialize a structured filter to a query string; nested maps and lists use brackets.
pub fn stringify(value: &Value) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    if let Value::Object(map) = value {
        for (k, v) in map {
            flatten(k.clone(), v, &mut pairs);
        }
    }
    let mut ser = form_urlencoded::Serializer::new(String::new());
    for (k, v) in &pairs {
        ser.append_pair(k, v);
    }
    ser.finish()
}

/// Join a generated query string with the request's own; the request's keys win.
pub fn compose(generated: &str, request: Option<&str>) -> String {
    match request.map(|r| r.trim_start_matches('?')).filter(|r| !r.is_empty()) {
        None => generated.to_string(),
        Some(r) if generated.is_empty() => r.to_string(),
        Some(r) => format!("{}&{}", generated, r),
    }
}

fn flatten(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten(format!("{}[{}]", prefix, k), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten(format!("{}[{}]", prefix, i), v, out);
            }
        }
        Value::String(s) => out.push((prefix, s.clone())),
        Value::Null => out.push((prefix, "null".into())),
        other => out.push((prefix, other.to_string())),
    }
}

fn split_key(key: &str) -> Result<Vec<String>, ApiError> {
    let malformed = || ApiError::BadRequest(format!("malformed query key '{}'", key));
    let (head, mut rest) = match key.find('[') {
        Some(i) => (&key[..i], &key[i..]),
        None => return Ok(vec![key.to_string()]),
    };
    if head.is_empty() {
        return Err(malformed());
    }
    let mut path = vec![head.to_string()];
    while !rest.is_empty() {
        let close = rest.find(']').ok_or_else(malformed)?;
        if !rest.starts_with('[') || close == 1 {
            return Err(malformed());
        }
        path.push(rest[1..close].to_string());
        rest = &rest[close + 1..];
    }
    Ok(path)
}

fn insert_path(tree: &mut Map<String, Value>, path: &[String], value: Value) -> Result<(), ApiError> {
    match path {
        [] => Ok(()),
        [last] => {
            tree.insert(last.clone(), value);
            Ok(())
        }
        [head, rest @ ..] => {
            let entry = tree
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            match entry {
                Value::Object(child) => insert_path(child, rest, value),
                _ => Err(ApiError::BadRequest(format!("conflicting query key '{}'", head))),
            }
        }
    }
}

/// Non-negative and within `i64`, so stores can pass it to SQL unchanged.
fn parse_count(name: &str, value: &Value) -> Result<usize, ApiError> {
    let n = match value {
        Value::String(s) => s.parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    n.filter(|n| *n >= 0)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be a non-negative integer", name)))
}

fn parse_order(value: &Value) -> Result<Vec<(String, Order)>, ApiError> {
    let text = value
        .as_str()
        .ok_or_else(|| ApiError::BadRequest("_order must be a string".into()))?;
    Ok(text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('-') {
            Some(field) => (field.to_string(), Order::Desc),
            None => (s.trim_start_matches('+').to_string(), Order::Asc),
        })
        .collect())
}

fn coerce(key: &str, value: &Value, kind: FieldKind) -> Result<Value, ApiError> {
    let s = match value {
        Value::String(s) => s.as_str(),
        Value::Object(_) | Value::Array(_) if kind != FieldKind::Json => {
            return Err(ApiError::BadRequest(format!("unsupported filter on '{}'", key)));
        }
        other => return Ok(other.clone()),
    };
    let bad = |what: &str| ApiError::BadRequest(format!("filter '{}' must be {}", key, what));
    if s == "null" && kind != FieldKind::String {
        return Ok(Value::Null);
    }
    Ok(match kind {
        FieldKind::String | FieldKind::Datetime => Value::String(s.to_string()),
        FieldKind::Integer => Value::Number(s.parse::<i64>().map_err(|_| bad("an integer"))?.into()),
        FieldKind::Float => {
            let f: f64 = s.parse().map_err(|_| bad("a number"))?;
            serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(|| bad("a finite number"))?
        }
        FieldKind::Boolean => {
            if s.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                return Err(bad("true or false"));
            }
        }
        FieldKind::Json => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldMeta;
    use serde_json::json;

    fn song() -> ModelMeta {
        ModelMeta::new("Song")
            .field(FieldMeta::new("name", FieldKind::String))
            .field(FieldMeta::new("year", FieldKind::Integer))
            .field(FieldMeta::new("is_single", FieldKind::Boolean))
    }

    #[test]
    fn counts_outside_the_sql_range_are_rejected() {
        for qs in ["_limit=18446744073709551615", "_skip=-1", "_limit=ten"] {
            assert!(matches!(Query::parse(qs), Err(ApiError::BadRequest(_))), "{}", qs);
        }
        assert_eq!(Query::parse("_limit=9223372036854775807").unwrap().limit, Some(i64::MAX as usize));
    }

    #[test]
    fn parses_filters_and_directives() {
        let q = Query::parse("name=Hello%20World&_limit=10&_skip=5&_order=-year,name&_includes=album").unwrap();
        assert_eq!(q.filters.get("name"), Some(&json!("Hello World")));
        assert_eq!(q.limit, Some(10));
        assert_eq!(q.skip, Some(5));
        assert_eq!(q.order, vec![("year".into(), Order::Desc), ("name".into(), Order::Asc)]);
        assert!(q.directives.contains_key("_includes"));
    }

    #[test]
    fn stringify_then_parse_keeps_nested_structure() {
        let filter = json!({ "name": "a&b", "meta": { "tag": "x" } });
        let qs = stringify(&filter);
        let q = Query::parse(&qs).unwrap();
        assert_eq!(q.filters.get("name"), Some(&json!("a&b")));
        assert_eq!(q.filters.get("meta"), Some(&json!({ "tag": "x" })));
    }

    #[test]
    fn compose_lets_request_keys_override() {
        let composed = compose("name=a&year=1", Some("year=2"));
        assert_eq!(composed, "name=a&year=1&year=2");
        let q = Query::parse(&composed).unwrap();
        assert_eq!(q.filters.get("year"), Some(&json!("2")));
        assert_eq!(compose("name=a", None), "name=a");
        assert_eq!(compose("", Some("?year=2")), "year=2");
    }

    #[test]
    fn resolve_maps_keys_and_coerces_values() {
        let q = Query::parse("year=2021&isSingle=true&name=x").unwrap();
        let r = q.resolve(&song()).unwrap();
        assert_eq!(
            r.filters,
            vec![
                ("year".to_string(), json!(2021)),
                ("is_single".to_string(), json!(true)),
                ("name".to_string(), json!("x")),
            ]
        );
    }

    #[test]
    fn resolve_rejects_unknown_fields_and_bad_values() {
        assert!(matches!(
            Query::parse("genre=pop").unwrap().resolve(&song()),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            Query::parse("year=recent").unwrap().resolve(&song()),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(Query::parse("a[b=1").is_err());
        assert!(Query::parse("[a]=1").is_err());
        assert!(Query::parse("a=1&a[b]=2").is_err());
    }
}
