//! Named API domains: registered resources and their route tables.

use crate::auth::{HmacSigner, TokenSigner};
use crate::config::{resolve_models, DefaultConfig, FullConfig, ModelMeta, ResourceConfig, ResourceOptions, ServerSettings};
use crate::error::{ApiError, ConfigError};
use crate::handlers::{RequestContext, ResourceBinding};
use crate::response::Reply;
use crate::routes::{HttpMethod, RouteBuilder, RouteTable};
use crate::store::ObjectStore;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub const DEFAULT_DOMAIN: &str = "default";

/// Holds every domain of the process. Pass it by reference; there is no global instance.
pub struct Registry {
    signer: Arc<dyn TokenSigner>,
    domains: RwLock<HashMap<String, Arc<ApiDomain>>>,
}

impl Registry {
    pub fn new(signer: Arc<dyn TokenSigner>) -> Self {
        Registry {
            signer,
            domains: RwLock::new(HashMap::new()),
        }
    }

    /// Registry signing session tokens with the configured secret key.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self::new(Arc::new(HmacSigner::new(&settings.secret_key)))
    }

    /// The domain called `name`, created with default config on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<ApiDomain> {
        self.get_or_create_with(name, DefaultConfig::default)
    }

    /// Like [`Registry::get_or_create`]; `defaults` only runs when the domain is new.
    pub fn get_or_create_with(&self, name: &str, defaults: impl FnOnce() -> DefaultConfig) -> Arc<ApiDomain> {
        if let Some(domain) = self.get(name) {
            return domain;
        }
        let mut domains = self.domains.write().unwrap_or_else(PoisonError::into_inner);
        domains
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(domain = name, "api domain created");
                Arc::new(ApiDomain::new(name, defaults(), self.signer.clone()))
            })
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ApiDomain>> {
        self.domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn domain_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// What registration produced for one resource.
#[derive(Clone, Debug)]
pub struct ResourceDescriptor {
    pub config: ResourceConfig,
    pub route_ids: Vec<String>,
}

/// One independent namespace of resources and routes.
pub struct ApiDomain {
    name: String,
    defaults: DefaultConfig,
    signer: Arc<dyn TokenSigner>,
    routes: RwLock<RouteTable>,
    bindings: RwLock<Vec<Arc<ResourceBinding>>>,
}

impl std::fmt::Debug for ApiDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiDomain")
            .field("name", &self.name)
            .field("routes", &self.routes().len())
            .finish_non_exhaustive()
    }
}

impl ApiDomain {
    pub fn new(name: impl Into<String>, defaults: DefaultConfig, signer: Arc<dyn TokenSigner>) -> Self {
        ApiDomain {
            name: name.into(),
            defaults,
            signer,
            routes: RwLock::new(RouteTable::new()),
            bindings: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defaults(&self) -> &DefaultConfig {
        &self.defaults
    }

    pub fn signer(&self) -> &Arc<dyn TokenSigner> {
        &self.signer
    }

    /// Resolve `options` against the domain defaults and append the model's routes.
    /// Field keys follow the resource's name mapper. Registering the same model twice
    /// appends its routes twice.
    pub fn register(
        &self,
        model: ModelMeta,
        store: Arc<dyn ObjectStore>,
        options: ResourceOptions,
    ) -> Result<ResourceDescriptor, ConfigError> {
        let mapper = options
            .name_mapper
            .clone()
            .unwrap_or_else(|| self.defaults.name_mapper.clone());
        let model = model.keyed_by(mapper.as_ref());
        let config = ResourceConfig::resolve(&model, &options, &self.defaults)?;
        let binding = Arc::new(ResourceBinding {
            model,
            config: config.clone(),
            store,
            signer: self.signer.clone(),
        });
        let routes = RouteBuilder::build(&binding);
        let route_ids: Vec<String> = routes.iter().map(|r| r.id.clone()).collect();
        tracing::info!(
            domain = %self.name,
            class = %config.class_name,
            resource = %config.resource_name,
            actions = %config.actions,
            routes = routes.len(),
            "resource registered"
        );
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(routes);
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(binding);
        Ok(ResourceDescriptor { config, route_ids })
    }

    /// Validate a loaded config and register every resource entry against one store.
    pub fn register_config(
        &self,
        config: &FullConfig,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Vec<ResourceDescriptor>, ConfigError> {
        let models = resolve_models(config, self.defaults.name_mapper.as_ref())?;
        let mut descriptors = Vec::with_capacity(config.resources.len());
        for entry in &config.resources {
            let model = models
                .iter()
                .find(|m| m.class_name == entry.class_name)
                .cloned()
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "model",
                    id: entry.class_name.clone(),
                })?;
            descriptors.push(self.register(model, store.clone(), entry.options.clone())?);
        }
        Ok(descriptors)
    }

    /// Snapshot of the route table.
    pub fn routes(&self) -> RouteTable {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First registered binding for `class_name`.
    pub fn binding(&self, class_name: &str) -> Option<Arc<ResourceBinding>> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|b| b.model.class_name == class_name)
            .cloned()
    }

    /// Resolve a URL path segment back to its registered model.
    pub fn model_for_path(&self, segment: &str) -> Option<Arc<ResourceBinding>> {
        let bindings = self.bindings.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(b) = bindings.iter().find(|b| b.config.resource_name == segment) {
            return Some(b.clone());
        }
        let class_name = self.defaults.name_mapper.path_to_class(segment);
        bindings.iter().find(|b| b.model.class_name == class_name).cloned()
    }

    /// Route and run a request without a web framework. `ctx.resource_id` is filled from
    /// the matched `:id` segment.
    pub async fn dispatch(&self, method: HttpMethod, path: &str, mut ctx: RequestContext) -> Result<Reply, ApiError> {
        let (handler, params) = {
            let table = self.routes.read().unwrap_or_else(PoisonError::into_inner);
            let found = table
                .find(method, path)
                .ok_or_else(|| ApiError::NotFound(format!("no route for {} {}", method, path)))?;
            (found.route.handler.clone(), found.params)
        };
        if let Some(id) = params.get("id") {
            ctx.resource_id = Some(id.clone());
        }
        handler.call(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionKind, AuthOptions, FieldKind, FieldMeta, ModelConfig, FieldConfig, ResourceEntry};
    use crate::naming::{DefaultNameMapper, NameMapper};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::new(Arc::new(HmacSigner::new("test")))
    }

    fn song() -> ModelMeta {
        ModelMeta::new("Song").field(FieldMeta::new("name", FieldKind::String).unique())
    }

    #[test]
    fn same_name_gives_same_domain() {
        let registry = registry();
        let a = registry.get_or_create("music");
        let b = registry.get_or_create("music");
        let other = registry.get_or_create(DEFAULT_DOMAIN);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(registry.domain_names(), vec!["default".to_string(), "music".to_string()]);
        assert_eq!(a.defaults().actions.len(), 5);
    }

    #[test]
    fn registration_appends_routes_in_order() {
        let domain = registry().get_or_create(DEFAULT_DOMAIN);
        let store = Arc::new(MemoryStore::new());
        let descriptor = domain.register(song(), store.clone(), ResourceOptions::new()).unwrap();
        assert_eq!(descriptor.route_ids.len(), 7);
        assert_eq!(descriptor.route_ids[0], "Song.list");

        domain.register(song(), store, ResourceOptions::new().enable("CR")).unwrap();
        assert_eq!(domain.routes().len(), 9);
        assert!(domain.model_for_path("songs").is_some());
        assert!(domain.binding("Song").is_some());
        assert!(domain.binding("Album").is_none());
    }

    #[test]
    fn defaults_are_built_once_per_domain() {
        let registry = registry();
        let calls = std::cell::Cell::new(0);
        let build = || {
            calls.set(calls.get() + 1);
            DefaultConfig::default()
        };
        let a = registry.get_or_create_with("music", build);
        let b = registry.get_or_create_with("music", build);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.get(), 1);
    }

    #[derive(Debug)]
    struct SnakeKeys;

    impl NameMapper for SnakeKeys {
        fn class_to_path(&self, class_name: &str) -> String {
            DefaultNameMapper.class_to_path(class_name)
        }

        fn path_to_class(&self, path: &str) -> String {
            DefaultNameMapper.path_to_class(path)
        }

        fn field_to_key(&self, field: &str) -> String {
            field.to_string()
        }

        fn class_to_singular(&self, class_name: &str) -> String {
            DefaultNameMapper.class_to_singular(class_name)
        }
    }

    #[tokio::test]
    async fn resource_name_mapper_sets_wire_keys() {
        let domain = registry().get_or_create(DEFAULT_DOMAIN);
        let model = ModelMeta::new("Track")
            .field(FieldMeta::new("release_year", FieldKind::Integer))
            .field(FieldMeta::new("disc_no", FieldKind::Integer).key("disc"));
        domain
            .register(model, Arc::new(MemoryStore::new()), ResourceOptions::new().name_mapper(Arc::new(SnakeKeys)))
            .unwrap();

        let ctx = RequestContext::new().json(json!({ "release_year": 2021, "disc": 2 })).unwrap();
        let created = domain.dispatch(HttpMethod::Post, "/tracks", ctx).await.unwrap().payload.unwrap();
        assert_eq!(created["release_year"], 2021);
        assert_eq!(created["disc"], 2);
        assert!(created["created_at"].is_string());
        assert!(created.get("releaseYear").is_none());
        assert!(created.get("createdAt").is_none());
    }

    #[test]
    fn bad_options_are_config_errors() {
        let domain = registry().get_or_create(DEFAULT_DOMAIN);
        let store = Arc::new(MemoryStore::new());
        let err = domain
            .register(song(), store.clone(), ResourceOptions::new().enable("CRX"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAction { letter: 'X', .. }));
        let err = domain
            .register(song(), store, ResourceOptions::new().auth(AuthOptions::default()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingAuthField { .. }));
        assert!(domain.routes().is_empty());
    }

    #[test]
    fn register_config_uses_loaded_models() {
        let domain = registry().get_or_create(DEFAULT_DOMAIN);
        let config = FullConfig {
            models: vec![ModelConfig {
                class_name: "Album".into(),
                fields: vec![serde_json::from_value::<FieldConfig>(json!({ "name": "title" })).unwrap()],
                timestamps: true,
                update_guard: Default::default(),
            }],
            resources: vec![ResourceEntry {
                class_name: "Album".into(),
                options: ResourceOptions::new().enable("LE"),
            }],
        };
        let descriptors = domain.register_config(&config, Arc::new(MemoryStore::new())).unwrap();
        assert_eq!(descriptors[0].config.resource_name, "albums");
        assert!(descriptors[0].config.actions.contains(ActionKind::Ensure));
        assert_eq!(domain.routes().len(), 2);
    }

    #[tokio::test]
    async fn dispatch_prefers_static_segments() {
        let domain = registry().get_or_create(DEFAULT_DOMAIN);
        domain
            .register(song(), Arc::new(MemoryStore::new()), ResourceOptions::new().enable("CRE"))
            .unwrap();
        let ctx = RequestContext::new().json(json!({ "name": "Hello" })).unwrap();
        let ensured = domain.dispatch(HttpMethod::Post, "/songs/ensure", ctx).await.unwrap();
        let id = ensured.payload.unwrap()["id"].as_str().unwrap().to_string();

        let read = domain
            .dispatch(HttpMethod::Get, &format!("/songs/{}", id), RequestContext::new())
            .await
            .unwrap();
        assert_eq!(read.payload.unwrap()["name"], "Hello");

        let missing = domain.dispatch(HttpMethod::Delete, "/songs/x", RequestContext::new()).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));
    }
}
