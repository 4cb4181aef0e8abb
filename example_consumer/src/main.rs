//! Example consumer: serves users, articles and songs from one domain.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Set `DATABASE_URL` to persist in Postgres; otherwise objects live in memory.

use graph_api::{
    api_router, AuthOptions, FieldKind, FieldMeta, MemoryStore, ModelMeta, ObjectStore, PgDocumentStore, Registry,
    ResourceOptions, ServerSettings, UpdateGuard, DEFAULT_DOMAIN,
};
use std::sync::Arc;
use tokio::net::TcpListener;

fn models() -> Vec<ModelMeta> {
    vec![
        ModelMeta::new("User")
            .field(FieldMeta::new("username", FieldKind::String).required().unique().auth_identity())
            .field(FieldMeta::new("email", FieldKind::String).unique().auth_identity())
            .field(FieldMeta::new("password", FieldKind::String).required().write_only().auth_by())
            .update_guard(UpdateGuard::SelfOnly),
        ModelMeta::new("Article")
            .field(FieldMeta::new("title", FieldKind::String).required())
            .field(FieldMeta::new("body", FieldKind::String))
            .field(FieldMeta::new("author_id", FieldKind::String).read_only().assign_operator()),
        ModelMeta::new("Song")
            .field(FieldMeta::new("name", FieldKind::String).required().unique())
            .field(FieldMeta::new("release_year", FieldKind::Integer)),
    ]
}

async fn store(models: &[ModelMeta]) -> Result<Arc<dyn ObjectStore>, Box<dyn std::error::Error>> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await?;
            let store = PgDocumentStore::new(pool);
            store.ensure_tables(models).await?;
            tracing::info!("using postgres store");
            Ok(Arc::new(store))
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set; using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("graph_api=info")),
        )
        .init();

    let settings = ServerSettings::load();
    let registry = Registry::from_settings(&settings);
    let domain = registry.get_or_create(DEFAULT_DOMAIN);
    let models = models();
    let store = store(&models).await?;

    for model in models {
        let options = match model.class_name.as_str() {
            "User" => ResourceOptions::new().auth(AuthOptions::default()),
            "Song" => ResourceOptions::new().enable("CRUDLE"),
            _ => ResourceOptions::new(),
        };
        domain.register(model, store.clone(), options)?;
    }

    let app = api_router(domain, settings);
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
