// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated principals.
//!
//! ```rust,ignore
//! async fn token_info(Auth(claims): Auth) -> impl IntoResponse {
//!     // claims is the verified TokenClaims
//! }
//! ```

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};

use super::claims::{FederatedClaims, TokenClaims};
use super::middleware::bearer_token;
use super::session::SessionData;
use crate::error::ApiError;
use crate::state::AppState;

/// Verified first-party token claims.
///
/// Uses the claims stored by the `jwt` filter when present, otherwise verifies
/// the bearer token itself.
pub struct Auth(pub TokenClaims);

impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<TokenClaims>().cloned() {
            return Ok(Auth(claims));
        }
        let token = bearer_token(&parts.headers)?;
        let claims = state.tokens.verify(token)?;
        Ok(Auth(claims))
    }
}

/// Verified federated identity claims.
pub struct Federated(pub FederatedClaims);

impl FromRequestParts<AppState> for Federated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<FederatedClaims>().cloned() {
            return Ok(Federated(claims));
        }
        let token = bearer_token(&parts.headers)?;
        let claims = state.tokens.verify_federated(token)?;
        Ok(Federated(claims))
    }
}

/// Session installed by the `install_session` filter.
pub struct CurrentSession(pub SessionData);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionData>()
            .cloned()
            .map(CurrentSession)
            .ok_or_else(|| ApiError::token_invalid("no valid session"))
    }
}

/// JSON body whose rejection is an [`ApiError`] (`400 BAD_REQUEST`).
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
