//! Request extractors for the axum adapter.

pub mod operator;

pub use operator::{CurrentOperator, BEARER_PREFIX};
