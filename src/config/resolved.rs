//! Resolved model and resource config: validated and flattened for runtime use.

use crate::config::actions::ActionSet;
use crate::config::types::{
    FieldConfig, FieldKind, ModelConfig, ResourceOptions, UpdateGuard, ValidationRule,
};
use crate::config::validator::validate_resource_name;
use crate::error::ConfigError;
use crate::naming::{to_camel_case, DefaultNameMapper, NameMapper};
use std::sync::Arc;
use std::time::Duration;

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

#[derive(Clone, Debug, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    /// External (wire) key.
    pub key: String,
    /// Set by hand; [`ModelMeta::keyed_by`] leaves it alone.
    pub explicit_key: bool,
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub auth_identity: bool,
    pub auth_by: bool,
    pub assign_operator: bool,
    pub validation: Option<ValidationRule>,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        FieldMeta {
            key: to_camel_case(&name),
            explicit_key: false,
            name,
            kind,
            required: false,
            unique: false,
            read_only: false,
            write_only: false,
            auth_identity: false,
            auth_by: false,
            assign_operator: false,
            validation: None,
        }
    }

    fn from_config(c: &FieldConfig, mapper: &dyn NameMapper) -> Self {
        FieldMeta {
            name: c.name.clone(),
            key: c.key.clone().unwrap_or_else(|| mapper.field_to_key(&c.name)),
            explicit_key: c.key.is_some(),
            kind: c.kind,
            required: c.required,
            unique: c.unique,
            read_only: c.read_only,
            write_only: c.write_only,
            auth_identity: c.auth_identity,
            auth_by: c.auth_by,
            assign_operator: c.assign_operator,
            validation: c.validation.clone(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self.explicit_key = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn auth_identity(mut self) -> Self {
        self.auth_identity = true;
        self
    }

    pub fn auth_by(mut self) -> Self {
        self.auth_by = true;
        self
    }

    pub fn assign_operator(mut self) -> Self {
        self.assign_operator = true;
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.validation = Some(rule);
        self
    }

    /// True when `k` is this field's internal name or external key.
    pub fn answers_to(&self, k: &str) -> bool {
        self.name == k || self.key == k
    }
}

/// Model metadata shared by handlers and object stores.
/// Timestamp fields, when enabled, always trail the declared fields.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelMeta {
    pub class_name: String,
    pub fields: Vec<FieldMeta>,
    pub timestamps: bool,
    pub update_guard: UpdateGuard,
}

impl ModelMeta {
    pub fn new(class_name: impl Into<String>) -> Self {
        ModelMeta {
            class_name: class_name.into(),
            fields: timestamp_fields(),
            timestamps: true,
            update_guard: UpdateGuard::Anyone,
        }
    }

    pub fn from_config(config: &ModelConfig, mapper: &dyn NameMapper) -> Self {
        let mut fields: Vec<FieldMeta> = config
            .fields
            .iter()
            .map(|f| FieldMeta::from_config(f, mapper))
            .collect();
        if config.timestamps {
            fields.extend(timestamp_fields());
        }
        ModelMeta {
            class_name: config.class_name.clone(),
            fields,
            timestamps: config.timestamps,
            update_guard: config.update_guard,
        }
        .keyed_by(mapper)
    }

    /// Derive every external key through `mapper`, except keys set by hand.
    pub fn keyed_by(mut self, mapper: &dyn NameMapper) -> Self {
        for field in self.fields.iter_mut().filter(|f| !f.explicit_key) {
            field.key = mapper.field_to_key(&field.name);
        }
        self
    }

    pub fn field(mut self, field: FieldMeta) -> Self {
        let at = if self.timestamps {
            self.fields.len().saturating_sub(2)
        } else {
            self.fields.len()
        };
        self.fields.insert(at, field);
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        if self.timestamps {
            self.fields.retain(|f| f.name != CREATED_AT && f.name != UPDATED_AT);
            self.timestamps = false;
        }
        self
    }

    pub fn update_guard(mut self, guard: UpdateGuard) -> Self {
        self.update_guard = guard;
        self
    }

    pub fn field_named(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look a field up by internal name or external key.
    pub fn field_for(&self, name_or_key: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.answers_to(name_or_key))
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldMeta> {
        self.fields.iter().filter(|f| f.unique)
    }

    pub fn identity_fields(&self) -> impl Iterator<Item = &FieldMeta> {
        self.fields.iter().filter(|f| f.auth_identity)
    }

    pub fn credential_fields(&self) -> impl Iterator<Item = &FieldMeta> {
        self.fields.iter().filter(|f| f.auth_by)
    }
}

fn timestamp_fields() -> Vec<FieldMeta> {
    [CREATED_AT, UPDATED_AT]
        .into_iter()
        .map(|name| FieldMeta::new(name, FieldKind::Datetime).read_only())
        .collect()
}

/// Internal name and external key of a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldKeys {
    pub name: String,
    pub key: String,
}

impl FieldKeys {
    fn of(f: &FieldMeta) -> Self {
        FieldKeys {
            name: f.name.clone(),
            key: f.key.clone(),
        }
    }

    pub fn answers_to(&self, k: &str) -> bool {
        self.name == k || self.key == k
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthConfig {
    pub token_lifetime: Duration,
    pub identity_fields: Vec<FieldKeys>,
    pub credential_fields: Vec<FieldKeys>,
    pub singular_name: String,
}

/// Domain-wide defaults every resource inherits from.
#[derive(Clone, Debug)]
pub struct DefaultConfig {
    pub actions: ActionSet,
    pub name_mapper: Arc<dyn NameMapper>,
    pub bulk: bool,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        DefaultConfig {
            actions: ActionSet::all(),
            name_mapper: Arc::new(DefaultNameMapper),
            bulk: true,
        }
    }
}

/// Fully resolved configuration of one resource. Immutable after registration.
#[derive(Clone, Debug)]
pub struct ResourceConfig {
    pub class_name: String,
    pub resource_name: String,
    pub singular_name: String,
    pub actions: ActionSet,
    pub name_mapper: Arc<dyn NameMapper>,
    pub bulk: bool,
    pub auth: Option<AuthConfig>,
}

impl ResourceConfig {
    pub fn resolve(
        model: &ModelMeta,
        options: &ResourceOptions,
        defaults: &DefaultConfig,
    ) -> Result<Self, ConfigError> {
        let class_name = model.class_name.as_str();
        let name_mapper = options
            .name_mapper
            .clone()
            .unwrap_or_else(|| defaults.name_mapper.clone());
        let actions = ActionSet::resolve(
            class_name,
            options.enable.as_deref(),
            options.disable.as_deref(),
            &defaults.actions,
        )?;
        let resource_name = options
            .name
            .clone()
            .unwrap_or_else(|| name_mapper.class_to_path(class_name));
        validate_resource_name(&resource_name)?;
        let singular_name = options
            .singular_name
            .clone()
            .unwrap_or_else(|| name_mapper.class_to_singular(class_name));

        let auth = match &options.auth {
            None => None,
            Some(auth) => {
                let identity_fields: Vec<FieldKeys> = model.identity_fields().map(FieldKeys::of).collect();
                if identity_fields.is_empty() {
                    return Err(ConfigError::MissingAuthField {
                        class_name: class_name.to_string(),
                        kind: "identity",
                    });
                }
                let credential_fields: Vec<FieldKeys> = model.credential_fields().map(FieldKeys::of).collect();
                if credential_fields.is_empty() {
                    return Err(ConfigError::MissingAuthField {
                        class_name: class_name.to_string(),
                        kind: "credential",
                    });
                }
                Some(AuthConfig {
                    token_lifetime: auth.token_lifetime(),
                    identity_fields,
                    credential_fields,
                    singular_name: singular_name.clone(),
                })
            }
        };

        Ok(ResourceConfig {
            class_name: class_name.to_string(),
            resource_name,
            singular_name,
            actions,
            name_mapper,
            bulk: options.bulk.unwrap_or(defaults.bulk),
            auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::actions::ActionKind;
    use crate::config::types::AuthOptions;

    fn user() -> ModelMeta {
        ModelMeta::new("User")
            .field(FieldMeta::new("username", FieldKind::String).unique().auth_identity().required())
            .field(FieldMeta::new("password", FieldKind::String).write_only().auth_by().required())
    }

    #[test]
    fn declared_fields_precede_timestamps() {
        let names: Vec<_> = user().fields.iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["username", "password", "created_at", "updated_at"]);
        assert_eq!(user().field_for("createdAt").map(|f| f.name.as_str()), Some("created_at"));
    }

    #[derive(Debug)]
    struct UpperKeys;

    impl NameMapper for UpperKeys {
        fn class_to_path(&self, class_name: &str) -> String {
            DefaultNameMapper.class_to_path(class_name)
        }

        fn path_to_class(&self, path: &str) -> String {
            DefaultNameMapper.path_to_class(path)
        }

        fn field_to_key(&self, field: &str) -> String {
            field.to_uppercase()
        }

        fn class_to_singular(&self, class_name: &str) -> String {
            DefaultNameMapper.class_to_singular(class_name)
        }
    }

    #[test]
    fn keyed_by_keeps_hand_set_keys() {
        let model = user().field(FieldMeta::new("pin_code", FieldKind::String).key("pin")).keyed_by(&UpperKeys);
        let keys: Vec<_> = model.fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["USERNAME", "PASSWORD", "pin", "CREATED_AT", "UPDATED_AT"]);
    }

    #[test]
    fn unset_options_inherit_defaults() {
        let config = ResourceConfig::resolve(&user(), &ResourceOptions::new(), &DefaultConfig::default()).unwrap();
        assert_eq!(config.resource_name, "users");
        assert_eq!(config.singular_name, "user");
        assert_eq!(config.actions, ActionSet::all());
        assert!(config.bulk);
        assert!(config.auth.is_none());
    }

    #[test]
    fn explicit_options_win() {
        let options = ResourceOptions::new().name("members").enable("CRE").bulk(false);
        let config = ResourceConfig::resolve(&user(), &options, &DefaultConfig::default()).unwrap();
        assert_eq!(config.resource_name, "members");
        assert!(config.actions.contains(ActionKind::Ensure));
        assert!(!config.actions.contains(ActionKind::List));
        assert!(!config.bulk);
    }

    #[test]
    fn auth_collects_identity_and_credential_fields() {
        let options = ResourceOptions::new().auth(AuthOptions::with_lifetime(Duration::from_secs(60)));
        let config = ResourceConfig::resolve(&user(), &options, &DefaultConfig::default()).unwrap();
        let auth = config.auth.unwrap();
        assert_eq!(auth.token_lifetime, Duration::from_secs(60));
        assert_eq!(auth.identity_fields[0].name, "username");
        assert_eq!(auth.credential_fields[0].name, "password");
        assert_eq!(auth.singular_name, "user");
    }

    #[test]
    fn auth_without_credential_field_is_rejected() {
        let song = ModelMeta::new("Song").field(FieldMeta::new("name", FieldKind::String).auth_identity());
        let options = ResourceOptions::new().auth(AuthOptions::default());
        let err = ResourceConfig::resolve(&song, &options, &DefaultConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAuthField { kind: "credential", .. }));
    }
}
