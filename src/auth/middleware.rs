// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request filters.
//!
//! Each filter either stores a typed value in the request extensions and
//! continues, or answers with an [`ApiError`]. On protected routes they run
//! in a fixed order:
//!
//! ```text
//! recovery -> trace -> CORS -> collect_errors -> install_session
//!   -> jwt / federated_jwt -> require_kind -> require_roles -> handler
//! ```
//!
//! Usage on a route group:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/tokens/access", post(new_access_token))
//!     .route_layer(
//!         ServiceBuilder::new()
//!             .layer(from_fn_with_state(state.clone(), jwt))
//!             .layer(from_fn_with_state(TokenKind::Refresh, require_kind)),
//!     )
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use super::claims::{FederatedClaims, TokenClaims, TokenKind};
use super::error::AuthError;
use super::roles::Role;
use super::session::SessionData;
use crate::error::{ApiError, ErrorRecord};
use crate::state::AppState;

/// Roles a route group accepts. Holding any one of them is enough; `ADMIN`
/// always passes.
#[derive(Debug, Clone)]
pub struct RoleGate(Arc<[Role]>);

impl RoleGate {
    pub fn any_of<I>(roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        RoleGate(roles.into_iter().collect())
    }

    pub fn roles(&self) -> &[Role] {
        &self.0
    }
}

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Verify a first-party bearer token and store its [`TokenClaims`].
pub async fn jwt(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let claims = match bearer_token(request.headers()).and_then(|t| state.tokens.verify(t)) {
        Ok(claims) => claims,
        Err(err) => return ApiError::from(err).into_response(),
    };
    request.extensions_mut().insert(claims);
    next.run(request).await
}

/// Verify a federated bearer token and store its [`FederatedClaims`].
pub async fn federated_jwt(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims: FederatedClaims =
        match bearer_token(request.headers()).and_then(|t| state.tokens.verify_federated(t)) {
            Ok(claims) => claims,
            Err(err) => return ApiError::from(err).into_response(),
        };
    request.extensions_mut().insert(claims);
    next.run(request).await
}

/// Reject tokens whose kind is not `expected`. Runs after [`jwt`].
pub async fn require_kind(
    State(expected): State<TokenKind>,
    request: Request,
    next: Next,
) -> Response {
    match request.extensions().get::<TokenClaims>() {
        None => ApiError::token_invalid("missing token").into_response(),
        Some(claims) if claims.kind != expected => {
            tracing::debug!(%expected, actual = %claims.kind, "token kind mismatch");
            ApiError::wrong_token_type().into_response()
        }
        Some(_) => next.run(request).await,
    }
}

/// Reject tokens whose role claim does not satisfy the gate.
pub async fn require_roles(State(gate): State<RoleGate>, request: Request, next: Next) -> Response {
    match request.extensions().get::<TokenClaims>() {
        None => ApiError::token_invalid("missing token").into_response(),
        Some(claims) if !claims.role_claim().permits(gate.roles()) => {
            tracing::debug!(user_id = %claims.user_id, "role gate failed");
            ApiError::insufficient_role().into_response()
        }
        Some(_) => next.run(request).await,
    }
}

/// Decode the session cookie, if any, into the request extensions. Never
/// rejects; [`require_session`] does that for routes that need one.
pub async fn install_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if jar.get(state.sessions.name()).is_some() {
        match state.sessions.read(&jar) {
            Ok(session) => {
                request.extensions_mut().insert(session);
            }
            Err(err) => tracing::debug!(error = %err, "ignoring unusable session cookie"),
        }
    }
    next.run(request).await
}

/// Reject requests without a valid session.
pub async fn require_session(request: Request, next: Next) -> Response {
    if request.extensions().get::<SessionData>().is_none() {
        return ApiError::token_invalid("no valid session").into_response();
    }
    next.run(request).await
}

/// Render the error recorded on a response as `{ code, message }`.
///
/// The status comes from the record; a record without one is a `400`.
pub async fn collect_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(record) = response.extensions().get::<ErrorRecord>().cloned() else {
        return response;
    };

    let (parts, _) = response.into_parts();
    let mut rendered = record.render();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            rendered.headers_mut().append(name, value.clone());
        }
    }
    rendered
}
