#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use graph_api::{
    api_router, ApiDomain, AuthOptions, FieldKind, FieldMeta, HmacSigner, MemoryStore, ModelMeta, Registry, ResourceOptions,
    ServerSettings, UpdateGuard, DEFAULT_DOMAIN,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub fn song() -> ModelMeta {
    ModelMeta::new("Song")
        .field(FieldMeta::new("name", FieldKind::String).required().unique())
        .field(FieldMeta::new("release_year", FieldKind::Integer))
}

pub fn user() -> ModelMeta {
    ModelMeta::new("User")
        .field(FieldMeta::new("username", FieldKind::String).required().unique().auth_identity())
        .field(FieldMeta::new("password", FieldKind::String).required().write_only().auth_by())
        .field(FieldMeta::new("nickname", FieldKind::String))
        .update_guard(UpdateGuard::SelfOnly)
}

pub fn article() -> ModelMeta {
    ModelMeta::new("Article")
        .field(FieldMeta::new("title", FieldKind::String).required())
        .field(FieldMeta::new("author_id", FieldKind::String).read_only().assign_operator())
}

/// A domain with Song, User (with session) and Article on one in-memory store.
pub fn domain() -> Arc<ApiDomain> {
    let registry = Registry::new(Arc::new(HmacSigner::new("integration-secret")));
    let domain = registry.get_or_create(DEFAULT_DOMAIN);
    let store = Arc::new(MemoryStore::new());
    domain.register(song(), store.clone(), ResourceOptions::new().enable("CRUDLE")).unwrap();
    domain
        .register(user(), store.clone(), ResourceOptions::new().auth(AuthOptions::default()))
        .unwrap();
    domain.register(article(), store, ResourceOptions::new()).unwrap();
    domain
}

/// Log to the test writer when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn app() -> Router {
    app_with(ServerSettings::default())
}

pub fn app_with(settings: ServerSettings) -> Router {
    init_tracing();
    api_router(domain(), settings)
}

pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply { status, body }
}

pub async fn get(app: &Router, uri: &str) -> Reply {
    send(app, Method::GET, uri, None, None).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> Reply {
    send(app, Method::POST, uri, Some(body), None).await
}
