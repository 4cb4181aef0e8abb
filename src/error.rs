//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Per-field messages keyed by the field's external key.
pub type FieldMessages = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown action letter '{letter}' for {class_name}")]
    UnknownAction { class_name: String, letter: char },
    #[error("invalid resource name: {0}")]
    InvalidResourceName(String),
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("duplicate model: {0}")]
    DuplicateModel(String),
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("{class_name} has no {kind} field for session authentication")]
    MissingAuthField { class_name: String, kind: &'static str },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Validation { message: String, fields: FieldMessages },
    #[error("{message}")]
    UniqueConstraint { message: String, fields: FieldMessages },
    #[error("{0}")]
    UnauthorizedAction(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Validation failure on a single field.
    pub fn field(key: impl Into<String>, message: impl Into<String>) -> Self {
        let key = key.into();
        let message = message.into();
        let mut fields = FieldMessages::new();
        fields.insert(key.clone(), message.clone());
        ApiError::Validation {
            message: format!("{}: {}", key, message),
            fields,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation { .. }
            | ApiError::UniqueConstraint { .. }
            | ApiError::Authentication(_)
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnauthorizedAction(_) => StatusCode::UNAUTHORIZED,
            ApiError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Db(_) | ApiError::Config(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Wire name used in the `type` member of the error envelope.
    pub fn type_name(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::Validation { .. } => "ValidationFailure",
            ApiError::UniqueConstraint { .. } => "UniqueConstraintViolation",
            ApiError::UnauthorizedAction(_) => "UnauthorizedAction",
            ApiError::Authentication(_) => "AuthenticationFailure",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Db(sqlx::Error::RowNotFound) => "NotFound",
            ApiError::Db(_) | ApiError::Config(_) | ApiError::Internal(_) => "InternalError",
        }
    }

    /// Builds the error envelope. Internal errors only carry their text when `debug` is set.
    pub fn body(&self, debug: bool) -> ErrorBody {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return ErrorBody {
                error: ErrorDetail {
                    type_: self.type_name().to_string(),
                    message: "There is an internal server error.".to_string(),
                    fields: None,
                    debug: debug.then(|| format!("{:?}", self)),
                },
            };
        }
        let fields = match self {
            ApiError::Validation { fields, .. } | ApiError::UniqueConstraint { fields, .. } => {
                Some(fields.clone())
            }
            _ => None,
        };
        ErrorBody {
            error: ErrorDetail {
                type_: self.type_name().to_string(),
                message: self.to_string(),
                fields,
                debug: None,
            },
        }
    }

    pub fn into_response_with(self, debug: bool) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }
        (status, Json(self.body(debug))).into_response()
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize, Debug)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldMessages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}
