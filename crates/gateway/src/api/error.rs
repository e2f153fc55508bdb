//! The HTTP error shape shared by every endpoint.
//!
//! Errors carry a `type:surface` code (`rate_limit:chat`,
//! `bad_request:api`, ...). The type picks the status code, the pair picks
//! the user-facing message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimit,
    Offline,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::BadRequest => "bad_request",
            ErrorType::Unauthorized => "unauthorized",
            ErrorType::Forbidden => "forbidden",
            ErrorType::NotFound => "not_found",
            ErrorType::RateLimit => "rate_limit",
            ErrorType::Offline => "offline",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorType::Forbidden => StatusCode::FORBIDDEN,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorType::Offline => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Chat,
    Auth,
    Api,
    History,
    Document,
    Suggestions,
    Stream,
    Database,
    ActivateGateway,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Chat => "chat",
            Surface::Auth => "auth",
            Surface::Api => "api",
            Surface::History => "history",
            Surface::Document => "document",
            Surface::Suggestions => "suggestions",
            Surface::Stream => "stream",
            Surface::Database => "database",
            Surface::ActivateGateway => "activate_gateway",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatError {
    pub kind: ErrorType,
    pub surface: Surface,
    pub cause: Option<String>,
}

impl ChatError {
    pub fn new(kind: ErrorType, surface: Surface) -> Self {
        Self {
            kind,
            surface,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn bad_request(surface: Surface) -> Self {
        Self::new(ErrorType::BadRequest, surface)
    }

    pub fn unauthorized(surface: Surface) -> Self {
        Self::new(ErrorType::Unauthorized, surface)
    }

    pub fn forbidden(surface: Surface) -> Self {
        Self::new(ErrorType::Forbidden, surface)
    }

    pub fn not_found(surface: Surface) -> Self {
        Self::new(ErrorType::NotFound, surface)
    }

    pub fn code(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.surface.as_str())
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn message(&self) -> &'static str {
        use ErrorType::*;
        use Surface::*;

        if self.surface == Database {
            return "An error occurred while executing a database query.";
        }
        match (self.kind, self.surface) {
            (BadRequest, Api) => {
                "The request couldn't be processed. Please check your input and try again."
            }
            (BadRequest, ActivateGateway) => {
                "AI Gateway requires a valid credit card on file to service requests. \
                 Please add a card to your gateway account and try again."
            }
            (Unauthorized, Auth) => "You need to sign in before continuing.",
            (Forbidden, Auth) => "Your account does not have access to this feature.",
            (RateLimit, Chat) => {
                "You have exceeded your maximum number of messages for the day. \
                 Please try again later."
            }
            (NotFound, Chat) => {
                "The requested chat was not found. Please check the chat ID and try again."
            }
            (Forbidden, Chat) => {
                "This chat belongs to another user. Please check the chat ID and try again."
            }
            (Unauthorized, Chat) => {
                "You need to sign in to view this chat. Please sign in and try again."
            }
            (Offline, Chat) => {
                "We're having trouble sending your message. \
                 Please check your internet connection and try again."
            }
            (NotFound, Document) => {
                "The requested document was not found. Please check the document ID and try again."
            }
            (Forbidden, Document) => {
                "This document belongs to another user. Please check the document ID and try again."
            }
            (Unauthorized, Document) => {
                "You need to sign in to view this document. Please sign in and try again."
            }
            (BadRequest, Document) => {
                "The request to create or update the document was invalid. \
                 Please check your input and try again."
            }
            _ => "Something went wrong. Please try again later.",
        }
    }
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for ChatError {}

impl From<rc_domain::Error> for ChatError {
    fn from(e: rc_domain::Error) -> Self {
        let kind = match e {
            rc_domain::Error::NotFound(_) => ErrorType::NotFound,
            _ => ErrorType::BadRequest,
        };
        ChatError::new(kind, Surface::Database).with_cause(e.to_string())
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        // Database details stay in the logs.
        if self.surface == Surface::Database {
            tracing::error!(
                code = %self.code(),
                cause = self.cause.as_deref().unwrap_or(""),
                "database error"
            );
            return (
                self.status(),
                Json(serde_json::json!({
                    "code": "",
                    "message": "Something went wrong. Please try again later.",
                })),
            )
                .into_response();
        }

        (
            self.status(),
            Json(serde_json::json!({
                "code": self.code(),
                "message": self.message(),
                "cause": self.cause,
            })),
        )
            .into_response()
    }
}
