//! Raw config types: model definitions and per-resource API options, loadable from JSON.

use crate::naming::NameMapper;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default session token lifetime: one year.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Datetime,
    Json,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    /// External key; derived from the name mapper when absent.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub write_only: bool,
    /// Identifies the object at session login (e.g. a username).
    #[serde(default)]
    pub auth_identity: bool,
    /// Checked against the supplied credential at session login (e.g. a password).
    #[serde(default)]
    pub auth_by: bool,
    /// Filled with the operator's id on save when unset.
    #[serde(default)]
    pub assign_operator: bool,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateGuard {
    #[default]
    Anyone,
    /// Only the object itself, acting as operator, may update it.
    SelfOnly,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub class_name: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default = "default_true")]
    pub timestamps: bool,
    #[serde(default)]
    pub update_guard: UpdateGuard,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthOptions {
    #[serde(default)]
    pub token_lifetime_secs: Option<u64>,
}

impl AuthOptions {
    pub fn with_lifetime(lifetime: Duration) -> Self {
        AuthOptions {
            token_lifetime_secs: Some(lifetime.as_secs()),
        }
    }

    pub fn token_lifetime(&self) -> Duration {
        self.token_lifetime_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME)
    }
}

/// Per-resource API options. Every unset option inherits from the domain default.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceOptions {
    /// Resource path segment; derived from the class name when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Enabled action letters (`C R U D L E`).
    #[serde(default)]
    pub enable: Option<String>,
    /// Disabled action letters, subtracted from `enable` or `CRUDL`.
    #[serde(default)]
    pub disable: Option<String>,
    #[serde(default)]
    pub singular_name: Option<String>,
    /// Install PATCH/DELETE on the collection for bulk updates and deletes.
    #[serde(default)]
    pub bulk: Option<bool>,
    /// Session authentication; adds `POST /{resource}/session`.
    #[serde(default)]
    pub auth: Option<AuthOptions>,
    #[serde(skip)]
    pub name_mapper: Option<Arc<dyn NameMapper>>,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn enable(mut self, letters: impl Into<String>) -> Self {
        self.enable = Some(letters.into());
        self
    }

    pub fn disable(mut self, letters: impl Into<String>) -> Self {
        self.disable = Some(letters.into());
        self
    }

    pub fn singular_name(mut self, name: impl Into<String>) -> Self {
        self.singular_name = Some(name.into());
        self
    }

    pub fn bulk(mut self, bulk: bool) -> Self {
        self.bulk = Some(bulk);
        self
    }

    pub fn auth(mut self, auth: AuthOptions) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn name_mapper(mut self, mapper: Arc<dyn NameMapper>) -> Self {
        self.name_mapper = Some(mapper);
        self
    }
}

/// One entry of `resources.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub class_name: String,
    #[serde(flatten)]
    pub options: ResourceOptions,
}

/// All config in one struct for in-memory loading.
#[derive(Clone, Debug, Default)]
pub struct FullConfig {
    pub models: Vec<ModelConfig>,
    pub resources: Vec<ResourceEntry>,
}
