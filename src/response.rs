//! Handler results and the `{"data": ...}` response envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Success statuses a handler can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    NoContent,
}

impl ReplyStatus {
    pub fn code(self) -> u16 {
        match self {
            ReplyStatus::Ok => 200,
            ReplyStatus::NoContent => 204,
        }
    }
}

impl From<ReplyStatus> for StatusCode {
    fn from(status: ReplyStatus) -> Self {
        match status {
            ReplyStatus::Ok => StatusCode::OK,
            ReplyStatus::NoContent => StatusCode::NO_CONTENT,
        }
    }
}

/// What a route handler produces: a status and an optional payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub payload: Option<Value>,
}

impl Reply {
    pub fn ok(payload: Value) -> Self {
        Reply {
            status: ReplyStatus::Ok,
            payload: Some(payload),
        }
    }

    pub fn many(items: Vec<Value>) -> Self {
        Reply::ok(Value::Array(items))
    }

    pub fn no_content() -> Self {
        Reply {
            status: ReplyStatus::NoContent,
            payload: None,
        }
    }
}

#[derive(Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = StatusCode::from(self.status);
        match self.payload {
            Some(data) => (status, Json(Envelope { data })).into_response(),
            None => status.into_response(),
        }
    }
}
