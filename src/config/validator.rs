//! Config validation: referential integrity and API consistency.

use crate::config::types::FullConfig;
use crate::error::ConfigError;
use crate::naming::NameMapper;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Path segments reserved for the ensure and session routes.
const RESERVED_SEGMENTS: &[&str] = &["ensure", "session"];

fn resource_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.~-]*$").expect("static pattern"))
}

/// A resource name must be a single, non-reserved URL path segment.
pub fn validate_resource_name(name: &str) -> Result<(), ConfigError> {
    if !resource_name_pattern().is_match(name) || RESERVED_SEGMENTS.contains(&name) {
        return Err(ConfigError::InvalidResourceName(name.to_string()));
    }
    Ok(())
}

pub fn validate(config: &FullConfig, mapper: &dyn NameMapper) -> Result<(), ConfigError> {
    let mut class_names = HashSet::new();
    for model in &config.models {
        if !class_names.insert(model.class_name.as_str()) {
            return Err(ConfigError::DuplicateModel(model.class_name.clone()));
        }
        let mut field_names = HashSet::new();
        for field in &model.fields {
            if field.name.is_empty() || !field_names.insert(field.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{}: duplicate or empty field name '{}'",
                    model.class_name, field.name
                )));
            }
            if field.read_only && field.required && !field.assign_operator {
                return Err(ConfigError::Validation(format!(
                    "{}.{}: a required field cannot be read-only",
                    model.class_name, field.name
                )));
            }
        }
    }

    let mut path_segments = HashSet::new();
    for entry in &config.resources {
        let model = config
            .models
            .iter()
            .find(|m| m.class_name == entry.class_name)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: entry.class_name.clone(),
            })?;
        let segment = entry
            .options
            .name
            .clone()
            .unwrap_or_else(|| mapper.class_to_path(&model.class_name));
        validate_resource_name(&segment)?;
        if !path_segments.insert(segment.clone()) {
            return Err(ConfigError::DuplicatePathSegment(segment));
        }
        if entry.options.auth.is_some() {
            if !model.fields.iter().any(|f| f.auth_identity) {
                return Err(ConfigError::MissingAuthField {
                    class_name: model.class_name.clone(),
                    kind: "identity",
                });
            }
            if !model.fields.iter().any(|f| f.auth_by) {
                return Err(ConfigError::MissingAuthField {
                    class_name: model.class_name.clone(),
                    kind: "credential",
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{FieldConfig, ModelConfig, ResourceEntry, ResourceOptions};
    use crate::naming::DefaultNameMapper;

    fn model(class_name: &str) -> ModelConfig {
        serde_json::from_value(serde_json::json!({
            "class_name": class_name,
            "fields": [{ "name": "name", "required": true }]
        }))
        .unwrap()
    }

    fn entry(class_name: &str, options: ResourceOptions) -> ResourceEntry {
        ResourceEntry {
            class_name: class_name.into(),
            options,
        }
    }

    #[test]
    fn resource_names_are_single_segments() {
        assert!(validate_resource_name("songs").is_ok());
        assert!(validate_resource_name("user-profiles").is_ok());
        assert!(validate_resource_name("a/b").is_err());
        assert!(validate_resource_name(":id").is_err());
        assert!(validate_resource_name("").is_err());
        assert!(validate_resource_name("ensure").is_err());
    }

    #[test]
    fn duplicate_path_segments_are_rejected() {
        let config = FullConfig {
            models: vec![model("Song"), model("Track")],
            resources: vec![
                entry("Song", ResourceOptions::new()),
                entry("Track", ResourceOptions::new().name("songs")),
            ],
        };
        let err = validate(&config, &DefaultNameMapper).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePathSegment(s) if s == "songs"));
    }

    #[test]
    fn resources_must_reference_models() {
        let config = FullConfig {
            models: vec![model("Song")],
            resources: vec![entry("Album", ResourceOptions::new())],
        };
        assert!(matches!(
            validate(&config, &DefaultNameMapper),
            Err(ConfigError::MissingReference { kind: "model", .. })
        ));
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let mut song = model("Song");
        song.fields.push(song.fields[0].clone());
        let config = FullConfig {
            models: vec![song],
            resources: vec![],
        };
        assert!(matches!(validate(&config, &DefaultNameMapper), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn auth_requires_identity_and_credential_fields() {
        let mut user = model("User");
        user.fields.push(FieldConfig {
            auth_identity: true,
            ..user.fields[0].clone()
        });
        user.fields[1].name = "username".into();
        let config = FullConfig {
            models: vec![user],
            resources: vec![entry("User", ResourceOptions::new().auth(Default::default()))],
        };
        assert!(matches!(
            validate(&config, &DefaultNameMapper),
            Err(ConfigError::MissingAuthField { kind: "credential", .. })
        ));
    }
}
