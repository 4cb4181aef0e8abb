//! Shared application state for the axum adapter.

use crate::config::ServerSettings;
use crate::registry::ApiDomain;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct AppState {
    pub domain: Arc<ApiDomain>,
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    pub fn new(domain: Arc<ApiDomain>, settings: ServerSettings) -> Self {
        AppState {
            domain,
            settings: Arc::new(settings),
        }
    }
}
