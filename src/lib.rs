//! Graph API SDK: declarative CRUD route generation over a pluggable object store.
//!
//! Register a model with a [`ApiDomain`] and get list, read, create, update, delete,
//! ensure and session routes. Handlers are framework-neutral; [`api_router`] mounts a
//! domain on axum.

pub mod adapter;
pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod naming;
pub mod query;
pub mod registry;
pub mod response;
pub mod routes;
pub mod sql;
pub mod state;
pub mod store;

pub use adapter::api_router;
pub use auth::{HmacSigner, TokenClaims, TokenSigner};
pub use config::{
    load_from_path, ActionKind, ActionSet, AuthOptions, CorsSettings, DefaultConfig, FieldKind, FieldMeta, FullConfig,
    ModelMeta, ResourceConfig, ResourceOptions, ServerSettings, UpdateGuard,
};
pub use error::{ApiError, ConfigError};
pub use handlers::{RequestContext, RouteHandler};
pub use naming::{DefaultNameMapper, NameMapper};
pub use query::Query;
pub use registry::{ApiDomain, Registry, ResourceDescriptor, DEFAULT_DOMAIN};
pub use response::{Reply, ReplyStatus};
pub use routes::{HttpMethod, Operation, Route, RouteTable};
pub use state::AppState;
pub use store::{Document, MemoryStore, ObjectStore, Operator, PgDocumentStore};
