//! Installs a domain's route table on an axum `Router`.

use crate::config::{CorsSettings, ServerSettings};
use crate::error::ApiError;
use crate::extractors::CurrentOperator;
use crate::handlers::{RequestContext, RouteHandler};
use crate::registry::ApiDomain;
use crate::routes::{common_routes, HttpMethod};
use crate::state::AppState;
use crate::store::Operator;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, RawQuery, State},
    http::{HeaderName, HeaderValue, Method},
    response::IntoResponse,
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

/// Router serving every route of `domain` plus `/health` and `/version`, with CORS and
/// a request body limit from `settings`.
pub fn api_router(domain: Arc<ApiDomain>, settings: ServerSettings) -> Router {
    let state = AppState::new(domain, settings);
    let table = state.domain.routes();
    let mut by_path: Vec<(String, MethodRouter<AppState>)> = Vec::new();
    let mut installed: HashSet<(String, HttpMethod)> = HashSet::new();

    for route in table.iter() {
        if !installed.insert((route.url_pattern.clone(), route.method)) {
            tracing::warn!(
                route = %route.id,
                method = %route.method,
                path = %route.url_pattern,
                "duplicate route skipped; the first registration serves it"
            );
            continue;
        }
        let endpoint = endpoint(route.method, route.handler.clone());
        match by_path.iter().position(|(p, _)| *p == route.url_pattern) {
            Some(at) => {
                let (path, existing) = by_path.remove(at);
                by_path.insert(at, (path, existing.merge(endpoint)));
            }
            None => by_path.push((route.url_pattern.clone(), endpoint)),
        }
        tracing::info!(method = %route.method, path = %route.url_pattern, route = %route.id, "route installed");
    }

    let mut router: Router<AppState> = Router::new();
    for (path, method_router) in by_path {
        router = router.route(&path, method_router);
    }
    let cors = cors_layer(&state.settings.cors);
    let body_limit = state.settings.body_limit;
    router
        .merge(common_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Delete => MethodFilter::DELETE,
    }
}

/// axum endpoint running one framework-neutral route handler.
fn endpoint(method: HttpMethod, handler: Arc<dyn RouteHandler>) -> MethodRouter<AppState> {
    on(
        method_filter(method),
        move |State(state): State<AppState>,
              CurrentOperator(operator): CurrentOperator,
              params: Option<Path<HashMap<String, String>>>,
              RawQuery(query): RawQuery,
              body: Bytes| {
            let handler = handler.clone();
            async move {
                let debug = state.settings.debug;
                let ctx = match build_context(params, query, operator, &body) {
                    Ok(ctx) => ctx,
                    Err(e) => return e.into_response_with(debug),
                };
                match handler.call(ctx).await {
                    Ok(reply) => reply.into_response(),
                    Err(e) => e.into_response_with(debug),
                }
            }
        },
    )
}

fn build_context(
    params: Option<Path<HashMap<String, String>>>,
    query: Option<String>,
    operator: Option<Operator>,
    body: &[u8],
) -> Result<RequestContext, ApiError> {
    let mut ctx = RequestContext::new().operator(operator);
    if let Some(Path(mut params)) = params {
        ctx.resource_id = params.remove("id");
    }
    if let Some(qs) = query {
        ctx = ctx.query(qs);
    }
    if body.iter().any(|b| !b.is_ascii_whitespace()) {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))?;
        ctx = ctx.json(value)?;
    }
    Ok(ctx)
}

fn cors_layer(cors: &CorsSettings) -> CorsLayer {
    let origin = if cors.allow_origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(split_list(&cors.allow_origin).filter_map(|o| HeaderValue::from_str(o).ok()))
    };
    let methods = if cors.allow_methods.trim() == "*" {
        AllowMethods::any()
    } else {
        AllowMethods::list(split_list(&cors.allow_methods).filter_map(|m| Method::from_bytes(m.as_bytes()).ok()))
    };
    let headers = if cors.allow_headers.trim() == "*" {
        AllowHeaders::any()
    } else {
        AllowHeaders::list(split_list(&cors.allow_headers).filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok()))
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(cors.max_age_secs))
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|p| !p.is_empty())
}
