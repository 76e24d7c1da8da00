// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token introspection and refresh-to-access exchange.

use axum::{extract::State, response::Response, Json};
use chrono::SecondsFormat;

use super::data;
use crate::auth::{Auth, Validator};
use crate::models::{AccessTokenResp, DataResponse, TokenInfo};
use crate::state::AppState;

/// Subject, kind and expiry of the bearer token. Roles are not included.
#[utoipa::path(
    post,
    path = "/auth/tokens/info",
    tag = "Tokens",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token metadata", body = DataResponse<TokenInfo>),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
    )
)]
pub async fn token_info(Auth(claims): Auth) -> Json<DataResponse<TokenInfo>> {
    Json(DataResponse::new(TokenInfo {
        uuid: claims.user_id,
        kind: claims.kind,
        expires: claims
            .expires_at()
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

/// Exchange a `REFRESH` token for a new `ACCESS` token.
///
/// Roles are copied from the refresh token, not re-read from the directory.
#[utoipa::path(
    post,
    path = "/auth/tokens/access",
    tag = "Tokens",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "New access token", body = DataResponse<AccessTokenResp>),
        (status = 401, description = "Missing, invalid or wrong kind of token", body = crate::error::ErrorBody),
    )
)]
pub async fn new_access_token(State(state): State<AppState>, Auth(claims): Auth) -> Response {
    Validator::new(&state)
        .with_claims(claims)
        .check_is_valid_refresh_token()
        .success(|v| async move {
            let claims = v.claims()?;
            let access_token = state
                .tokens
                .access_token(claims.user_id, &claims.role_claim())?;
            Ok(data(AccessTokenResp { access_token }))
        })
        .await
}
