//! Field validation from model metadata: input normalization, kinds, rules, save checks.

use crate::config::{FieldKind, FieldMeta, ModelMeta, UpdateGuard, ValidationRule, CREATED_AT, UPDATED_AT};
use crate::error::{ApiError, FieldMessages};
use crate::store::Document;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Map, Value};

pub struct FieldValidator;

impl FieldValidator {
    /// Map external input onto internal field names. Unknown keys, read-only fields
    /// and values of the wrong kind are rejected; all problems are reported at once.
    pub fn input(model: &ModelMeta, input: Map<String, Value>) -> Result<Map<String, Value>, ApiError> {
        let mut out = Map::new();
        let mut errors = FieldMessages::new();
        for (key, value) in input {
            let Some(field) = model.field_for(&key) else {
                let message = if key == "id" { "field is readonly" } else { "key is not allowed" };
                errors.insert(key, message.into());
                continue;
            };
            if field.read_only {
                errors.insert(field.key.clone(), "field is readonly".into());
                continue;
            }
            if let Err(message) = check_kind(field.kind, &value) {
                errors.insert(field.key.clone(), message);
                continue;
            }
            out.insert(field.name.clone(), value);
        }
        if errors.is_empty() {
            Ok(out)
        } else {
            Err(failure(errors))
        }
    }

    /// Run before every save: update guard, operator assignment, timestamps, then
    /// required and rule checks against the full object.
    pub fn prepare_save(model: &ModelMeta, doc: &mut Document, now: DateTime<Utc>) -> Result<(), ApiError> {
        if !doc.is_new() {
            Self::check_guard(model, doc, "update")?;
        }
        if let Some(op) = &doc.operator {
            for field in model.fields.iter().filter(|f| f.assign_operator) {
                let unset = doc.fields.get(&field.name).map_or(true, Value::is_null);
                if unset {
                    doc.fields.insert(field.name.clone(), Value::String(op.id.clone()));
                }
            }
        }
        if model.timestamps {
            let stamp = Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true));
            if doc.is_new() || doc.fields.get(CREATED_AT).map_or(true, Value::is_null) {
                doc.fields.insert(CREATED_AT.into(), stamp.clone());
            }
            doc.fields.insert(UPDATED_AT.into(), stamp);
        }
        Self::validate(model, &doc.fields)
    }

    /// Required fields present, rules satisfied.
    pub fn validate(model: &ModelMeta, fields: &Map<String, Value>) -> Result<(), ApiError> {
        let mut errors = FieldMessages::new();
        for field in &model.fields {
            let value = fields.get(&field.name);
            if field.required && value.map_or(true, Value::is_null) {
                errors.insert(field.key.clone(), "value required".into());
                continue;
            }
            if let (Some(v), Some(rule)) = (value, &field.validation) {
                if let Err(message) = check_rule(v, rule) {
                    errors.insert(field.key.clone(), message);
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(failure(errors))
        }
    }

    /// Enforce the model's update guard for `action` on an existing object.
    pub fn check_guard(model: &ModelMeta, doc: &Document, action: &str) -> Result<(), ApiError> {
        match model.update_guard {
            UpdateGuard::Anyone => Ok(()),
            UpdateGuard::SelfOnly if doc.is_operated_by_self(model) => Ok(()),
            UpdateGuard::SelfOnly => Err(ApiError::UnauthorizedAction(format!(
                "not allowed to {} this {}",
                action, model.class_name
            ))),
        }
    }
}

fn failure(errors: FieldMessages) -> ApiError {
    let message = errors
        .iter()
        .map(|(k, m)| format!("{}: {}", k, m))
        .collect::<Vec<_>>()
        .join(", ");
    ApiError::Validation {
        message,
        fields: errors,
    }
}

fn check_kind(kind: FieldKind, v: &Value) -> Result<(), String> {
    if v.is_null() {
        return Ok(());
    }
    let ok = match kind {
        FieldKind::String => v.is_string(),
        FieldKind::Integer => v.is_i64() || v.is_u64(),
        FieldKind::Float => v.is_number(),
        FieldKind::Boolean => v.is_boolean(),
        FieldKind::Datetime => v
            .as_str()
            .map_or(false, |s| DateTime::parse_from_rfc3339(s).is_ok()),
        FieldKind::Json => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("must be {}", kind_label(kind)))
    }
}

fn kind_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::String => "a string",
        FieldKind::Integer => "an integer",
        FieldKind::Float => "a number",
        FieldKind::Boolean => "a boolean",
        FieldKind::Datetime => "an RFC 3339 datetime",
        FieldKind::Json => "JSON",
    }
}

fn check_rule(v: &Value, rule: &ValidationRule) -> Result<(), String> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        check_format(v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(format!("must be at most {} characters", max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(format!("must be at least {} characters", min));
            }
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern).map_err(|_| "has an invalid pattern rule".to_string())?;
            if !re.is_match(s) {
                return Err("does not match required pattern".into());
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(format!(
                "must be one of: {}",
                allowed.iter().take(5).map(Value::to_string).collect::<Vec<_>>().join(", ")
            ));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(format!("must be at least {}", min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(format!("must be at most {}", max));
            }
        }
    }
    Ok(())
}

fn check_format(v: &Value, format: &str) -> Result<(), String> {
    let Some(s) = v.as_str() else {
        return Ok(());
    };
    match format.to_lowercase().as_str() {
        "email" if !s.contains('@') || s.len() < 3 => Err("must be a valid email".into()),
        "uuid" if uuid::Uuid::parse_str(s).is_err() => Err("must be a valid UUID".into()),
        _ => Ok(()),
    }
}

/// Loose equality: numbers compare by value regardless of representation.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

/// True when `field` carries a value in `fields`.
pub(crate) fn has_value(fields: &Map<String, Value>, field: &FieldMeta) -> bool {
    fields.get(&field.name).map_or(false, |v| !v.is_null())
}

/// Unique-constraint failure naming each conflicting field by external key.
pub(crate) fn not_unique<'a>(fields: impl IntoIterator<Item = &'a FieldMeta>) -> ApiError {
    let fields: FieldMessages = fields
        .into_iter()
        .map(|f| (f.key.clone(), "value is not unique".to_string()))
        .collect();
    let message = fields
        .keys()
        .map(|k| format!("{}: value is not unique", k))
        .collect::<Vec<_>>()
        .join(", ");
    ApiError::UniqueConstraint { message, fields }
}
