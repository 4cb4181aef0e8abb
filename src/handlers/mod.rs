//! Framework-neutral handlers: one per operation, all taking a [`RequestContext`].

pub mod crud;
pub mod ensure;
pub mod session;

use crate::auth::TokenSigner;
use crate::config::{ModelMeta, ResourceConfig};
use crate::error::ApiError;
use crate::query::{compose, stringify, Query};
use crate::response::Reply;
use crate::routes::Operation;
use crate::store::{Document, ObjectStore, Operator};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One request as handlers see it.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// The `:id` path segment, for item routes.
    pub resource_id: Option<String>,
    /// Raw URL query string, without the leading `?`.
    pub query: Option<String>,
    pub operator: Option<Operator>,
    pub body: Option<Map<String, Value>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn query(mut self, qs: impl Into<String>) -> Self {
        let qs = qs.into();
        self.query = (!qs.is_empty()).then_some(qs);
        self
    }

    pub fn operator(mut self, operator: Option<Operator>) -> Self {
        self.operator = operator;
        self
    }

    pub fn body(mut self, body: Map<String, Value>) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a JSON body; anything but an object is rejected.
    pub fn json(self, body: Value) -> Result<Self, ApiError> {
        match body {
            Value::Object(map) => Ok(self.body(map)),
            Value::Null => Ok(self),
            _ => Err(ApiError::BadRequest("request body must be a JSON object".into())),
        }
    }

    pub(crate) fn require_id(&self) -> Result<&str, ApiError> {
        self.resource_id
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("missing resource id".into()))
    }

    pub(crate) fn url_query(&self) -> Result<Query, ApiError> {
        Query::parse_opt(self.query.as_deref())
    }

    pub(crate) fn body_or_empty(&self) -> Map<String, Value> {
        self.body.clone().unwrap_or_default()
    }

    /// Compose a structured filter with the URL query; URL keys win.
    pub(crate) fn composed_query(&self, filter: &Value) -> Result<Query, ApiError> {
        Query::parse(&compose(&stringify(filter), self.query.as_deref()))
    }
}

#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn call(&self, ctx: RequestContext) -> Result<Reply, ApiError>;
}

/// Everything a resource's handlers need: model, resolved config, store, signer.
pub struct ResourceBinding {
    pub model: ModelMeta,
    pub config: ResourceConfig,
    pub store: Arc<dyn ObjectStore>,
    pub signer: Arc<dyn TokenSigner>,
}

impl std::fmt::Debug for ResourceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBinding")
            .field("class_name", &self.model.class_name)
            .field("resource_name", &self.config.resource_name)
            .finish_non_exhaustive()
    }
}

impl ResourceBinding {
    pub(crate) fn apply(&self, doc: Document, operator: Option<&Operator>) -> Result<Document, ApiError> {
        self.store.apply_operator(&self.model, doc, operator)
    }

    pub(crate) fn serialize(&self, doc: &Document) -> Value {
        self.store.serialize(&self.model, doc)
    }

    /// Re-read a saved object through the URL query when one was given.
    pub(crate) async fn refetch(&self, doc: Document, ctx: &RequestContext) -> Result<Document, ApiError> {
        if ctx.query.is_none() {
            return Ok(doc);
        }
        let query = ctx.url_query()?;
        let fresh = self.store.get(&self.model, doc.require_id()?, &query).await?;
        self.apply(fresh, ctx.operator.as_ref())
    }
}

/// Dispatches a route to its operation's handler.
pub struct ActionHandler {
    operation: Operation,
    binding: Arc<ResourceBinding>,
}

impl ActionHandler {
    pub fn new(operation: Operation, binding: Arc<ResourceBinding>) -> Self {
        ActionHandler { operation, binding }
    }
}

#[async_trait]
impl RouteHandler for ActionHandler {
    async fn call(&self, ctx: RequestContext) -> Result<Reply, ApiError> {
        let res = self.binding.as_ref();
        tracing::debug!(
            class = %res.model.class_name,
            operation = self.operation.name(),
            id = ?ctx.resource_id,
            "dispatch"
        );
        match self.operation {
            Operation::List => crud::list(res, &ctx).await,
            Operation::Read => crud::read(res, &ctx).await,
            Operation::Create => crud::create(res, &ctx).await,
            Operation::Update => crud::update(res, &ctx).await,
            Operation::UpdateMany => crud::update_many(res, &ctx).await,
            Operation::Delete => crud::delete(res, &ctx).await,
            Operation::DeleteMany => crud::delete_many(res, &ctx).await,
            Operation::Ensure => ensure::ensure(res, &ctx).await,
            Operation::Session => session::session(res, &ctx).await,
        }
    }
}
