//! Route entries, the per-domain route table, and framework-neutral path matching.

use crate::config::ActionKind;
use crate::handlers::RouteHandler;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which handler a route dispatches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Read,
    Create,
    Update,
    UpdateMany,
    Delete,
    DeleteMany,
    Ensure,
    Session,
}

/// Where a route is mounted relative to the resource base path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mount {
    Collection,
    Item,
    Ensure,
    Session,
}

impl Operation {
    pub fn kind(self) -> ActionKind {
        match self {
            Operation::List => ActionKind::List,
            Operation::Read => ActionKind::Read,
            Operation::Create => ActionKind::Create,
            Operation::Update | Operation::UpdateMany => ActionKind::Update,
            Operation::Delete | Operation::DeleteMany => ActionKind::Delete,
            Operation::Ensure => ActionKind::Ensure,
            Operation::Session => ActionKind::Session,
        }
    }

    pub fn method(self) -> HttpMethod {
        match self {
            Operation::List | Operation::Read => HttpMethod::Get,
            Operation::Create | Operation::Ensure | Operation::Session => HttpMethod::Post,
            Operation::Update | Operation::UpdateMany => HttpMethod::Patch,
            Operation::Delete | Operation::DeleteMany => HttpMethod::Delete,
        }
    }

    pub fn mount(self) -> Mount {
        match self {
            Operation::List
            | Operation::Create
            | Operation::UpdateMany
            | Operation::DeleteMany => Mount::Collection,
            Operation::Read | Operation::Update | Operation::Delete => Mount::Item,
            Operation::Ensure => Mount::Ensure,
            Operation::Session => Mount::Session,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::UpdateMany => "update_many",
            Operation::Delete => "delete",
            Operation::DeleteMany => "delete_many",
            Operation::Ensure => "ensure",
            Operation::Session => "session",
        }
    }
}

#[derive(Clone)]
pub struct Route {
    /// `{Class}.{operation}`, e.g. `Song.update_many`.
    pub id: String,
    pub kind: ActionKind,
    pub operation: Operation,
    pub method: HttpMethod,
    /// Uses `:name` placeholders.
    pub url_pattern: String,
    pub handler: Arc<dyn RouteHandler>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("url_pattern", &self.url_pattern)
            .finish_non_exhaustive()
    }
}

pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: HashMap<String, String>,
}

/// Ordered routes of one domain.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, routes: impl IntoIterator<Item = Route>) {
        self.routes.extend(routes);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == id)
    }

    /// Match `method` and `path` against the table. At each segment a literal beats a
    /// placeholder; among equally specific routes the first registered wins.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<RouteMatch<'_>> {
        let segments: Vec<&str> = split_path(path).collect();
        let mut best: Option<(Vec<bool>, RouteMatch<'_>)> = None;
        for route in self.routes.iter().filter(|r| r.method == method) {
            let Some((specificity, params)) = match_pattern(&route.url_pattern, &segments) else {
                continue;
            };
            let better = best.as_ref().map_or(true, |(s, _)| specificity > *s);
            if better {
                best = Some((specificity, RouteMatch { route, params }));
            }
        }
        best.map(|(_, m)| m)
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a Route;
    type IntoIter = std::slice::Iter<'a, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('?')
        .next()
        .unwrap_or_default()
        .split('/')
        .filter(|s| !s.is_empty())
}

fn match_pattern(pattern: &str, segments: &[&str]) -> Option<(Vec<bool>, HashMap<String, String>)> {
    let parts: Vec<&str> = split_path(pattern).collect();
    if parts.len() != segments.len() {
        return None;
    }
    let mut specificity = Vec::with_capacity(parts.len());
    let mut params = HashMap::new();
    for (part, seg) in parts.iter().zip(segments) {
        match part.strip_prefix(':') {
            Some(name) => {
                specificity.push(false);
                params.insert(name.to_string(), seg.to_string());
            }
            None if part == seg => specificity.push(true),
            None => return None,
        }
    }
    Some((specificity, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::handlers::RequestContext;
    use crate::response::Reply;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl RouteHandler for Noop {
        async fn call(&self, _ctx: RequestContext) -> Result<Reply, ApiError> {
            Ok(Reply::no_content())
        }
    }

    fn route(operation: Operation, url: &str) -> Route {
        Route {
            id: format!("Song.{}", operation.name()),
            kind: operation.kind(),
            operation,
            method: operation.method(),
            url_pattern: url.to_string(),
            handler: Arc::new(Noop),
        }
    }

    fn table() -> RouteTable {
        let mut t = RouteTable::new();
        t.extend([
            route(Operation::List, "/songs"),
            route(Operation::Read, "/songs/:id"),
            route(Operation::Update, "/songs/:id"),
            route(Operation::Ensure, "/songs/ensure"),
            route(Operation::Create, "/songs"),
        ]);
        t
    }

    #[test]
    fn literal_segments_beat_placeholders() {
        let t = table();
        let m = t.find(HttpMethod::Post, "/songs/ensure").unwrap();
        assert_eq!(m.route.operation, Operation::Ensure);
        assert!(m.params.is_empty());
        assert!(t.find(HttpMethod::Get, "/songs/ensure").is_some_and(|m| m.route.operation == Operation::Read));
    }

    #[test]
    fn placeholders_capture_segments() {
        let t = table();
        let m = t.find(HttpMethod::Patch, "/songs/abc123?x=1").unwrap();
        assert_eq!(m.route.operation, Operation::Update);
        assert_eq!(m.params.get("id").map(String::as_str), Some("abc123"));
        assert!(t.find(HttpMethod::Delete, "/songs/abc123").is_none());
        assert!(t.find(HttpMethod::Get, "/albums").is_none());
    }

    #[test]
    fn bulk_operations_report_base_kind() {
        assert_eq!(Operation::UpdateMany.kind(), ActionKind::Update);
        assert_eq!(Operation::DeleteMany.method(), HttpMethod::Delete);
        assert_eq!(Operation::DeleteMany.mount(), Mount::Collection);
    }
}
