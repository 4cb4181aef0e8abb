//! Web framework adapters over the route table.

pub mod axum;

pub use self::axum::api_router;
