//! Mapping of crate errors onto HTTP responses.
//!
//! Validation errors render as 400 with their machine-readable code and
//! details; aggregates become an array of items; not-found kinds map to
//! 404. Everything else is a 500 with a generic body so internals never
//! leak to clients.

use crate::Error;
use crate::error::{DomainError, PlatformError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::BTreeMap;

/// Wrapper that turns a crate error into an HTTP response.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError(error)
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum ErrorBody {
    Invalid {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        details: BTreeMap<String, String>,
    },
    Many {
        errors: Vec<ErrorBody>,
    },
    Plain {
        message: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = render(&self.0);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(body)).into_response()
    }
}

pub(super) fn render(error: &Error) -> (StatusCode, ErrorBody) {
    match error {
        Error::Domain(domain) => render_domain(domain),
        Error::Aggregate(items) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::Many {
                errors: items.iter().map(|item| render(item).1).collect(),
            },
        ),
        Error::Platform(PlatformError::UserBlockedBot(user_id)) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::Invalid {
                code: "user-blocked-bot".to_owned(),
                message: error.to_string(),
                details: BTreeMap::from([("user_id".to_owned(), user_id.to_string())]),
            },
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::Plain {
                message: "internal server error".to_owned(),
            },
        ),
    }
}

fn render_domain(error: &DomainError) -> (StatusCode, ErrorBody) {
    match error {
        DomainError::InvalidInput(input) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::Invalid {
                code: input.code.to_owned(),
                message: input.message.clone(),
                details: input.details.clone(),
            },
        ),
        DomainError::Aggregate(items) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::Many {
                errors: items.iter().map(|item| render_domain(item).1).collect(),
            },
        ),
        DomainError::NoStartedThread => (
            StatusCode::BAD_REQUEST,
            ErrorBody::Invalid {
                code: "no-started-thread".to_owned(),
                message: error.to_string(),
                details: BTreeMap::new(),
            },
        ),
        DomainError::BotNotFound(_)
        | DomainError::RunningInstanceNotFound(_)
        | DomainError::EntryNotFound(_)
        | DomainError::UsernameNotFound(_) => (
            StatusCode::NOT_FOUND,
            ErrorBody::Plain {
                message: error.to_string(),
            },
        ),
    }
}
