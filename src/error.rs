// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API error taxonomy.
//!
//! Every failure a client can observe collapses to one [`ErrorKind`]. Handlers
//! return [`ApiError`]; its response carries an [`ErrorRecord`] extension that
//! the error-collection middleware renders as `{ "code", "message" }`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

const REDACTED: &str = "internal server error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    BadRequest,
    InvalidCredentials,
    EmailNotVerified,
    UserNotAllowedToSignIn,
    WrongTokenType,
    TokenInvalid,
    InsufficientRole,
    Conflict,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorKind::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            ErrorKind::UserNotAllowedToSignIn => "USER_NOT_ALLOWED_TO_SIGN_IN",
            ErrorKind::WrongTokenType => "WRONG_TOKEN_TYPE",
            ErrorKind::TokenInvalid => "TOKEN_INVALID",
            ErrorKind::InsufficientRole => "INSUFFICIENT_ROLE",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::InvalidCredentials
            | ErrorKind::WrongTokenType
            | ErrorKind::TokenInvalid => StatusCode::UNAUTHORIZED,
            ErrorKind::EmailNotVerified
            | ErrorKind::UserNotAllowedToSignIn
            | ErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wire shape of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: ErrorKind,
    pub message: String,
}

/// Error attached to a response so the collection middleware can render it.
///
/// `status` is the metadata tag; when absent the response is a `400`.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub body: ErrorBody,
    pub status: Option<StatusCode>,
}

impl ErrorRecord {
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::BAD_REQUEST)
    }

    /// JSON response for this record.
    pub fn render(&self) -> Response {
        let mut response = (self.status(), Json(self.body.clone())).into_response();
        response.extensions_mut().insert(self.clone());
        response
    }
}

#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<StatusCode>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Override the status derived from the kind.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Deliberately vague: unknown user and wrong password look the same.
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorKind::InvalidCredentials, "invalid credentials")
    }

    pub fn email_not_verified() -> Self {
        Self::new(ErrorKind::EmailNotVerified, "email address not verified")
    }

    pub fn not_allowed_to_sign_in() -> Self {
        Self::new(ErrorKind::UserNotAllowedToSignIn, "user is not allowed to sign in")
    }

    pub fn wrong_token_type() -> Self {
        Self::new(ErrorKind::WrongTokenType, "wrong token type")
    }

    pub fn token_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenInvalid, message)
    }

    pub fn insufficient_role() -> Self {
        Self::new(ErrorKind::InsufficientRole, "insufficient role")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// The message is logged, never sent.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or_else(|| self.kind.status())
    }

    pub fn record(&self) -> ErrorRecord {
        let message = match self.kind {
            ErrorKind::Internal => REDACTED.to_string(),
            _ => self.message.clone(),
        };
        ErrorRecord {
            body: ErrorBody {
                code: self.kind,
                message,
            },
            status: Some(self.status()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.kind == ErrorKind::Internal {
            tracing::error!(error = %self.message, "internal error");
        } else {
            tracing::debug!(code = self.kind.code(), message = %self.message, "request failed");
        }
        self.record().render()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}
