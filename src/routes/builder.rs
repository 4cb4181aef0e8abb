//! Derives a resource's routes from its resolved configuration.

use crate::config::{ActionKind, ResourceConfig};
use crate::handlers::{ActionHandler, ResourceBinding};
use crate::routes::route::{Mount, Operation, Route};
use std::sync::Arc;

pub struct RouteBuilder;

impl RouteBuilder {
    /// Enabled operations in installation order.
    pub fn operations(config: &ResourceConfig) -> Vec<Operation> {
        let on = |kind| config.actions.contains(kind);
        let mut ops = Vec::new();
        if on(ActionKind::List) {
            ops.push(Operation::List);
        }
        if on(ActionKind::Ensure) {
            ops.push(Operation::Ensure);
        }
        if on(ActionKind::Read) {
            ops.push(Operation::Read);
        }
        if on(ActionKind::Create) {
            ops.push(Operation::Create);
        }
        if on(ActionKind::Update) {
            ops.push(Operation::Update);
            if config.bulk {
                ops.push(Operation::UpdateMany);
            }
        }
        if on(ActionKind::Delete) {
            ops.push(Operation::Delete);
            if config.bulk {
                ops.push(Operation::DeleteMany);
            }
        }
        if config.auth.is_some() {
            ops.push(Operation::Session);
        }
        ops
    }

    pub fn url_pattern(config: &ResourceConfig, operation: Operation) -> String {
        let base = &config.resource_name;
        match operation.mount() {
            Mount::Collection => format!("/{}", base),
            Mount::Item => format!("/{}/:id", base),
            Mount::Ensure => format!("/{}/ensure", base),
            Mount::Session => format!("/{}/session", base),
        }
    }

    pub fn build(binding: &Arc<ResourceBinding>) -> Vec<Route> {
        Self::operations(&binding.config)
            .into_iter()
            .map(|operation| Route {
                id: format!("{}.{}", binding.config.class_name, operation.name()),
                kind: operation.kind(),
                operation,
                method: operation.method(),
                url_pattern: Self::url_pattern(&binding.config, operation),
                handler: Arc::new(ActionHandler::new(operation, binding.clone())),
            })
            .collect()
    }
}
