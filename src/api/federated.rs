// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in with a token from the federated identity provider.

use axum::{extract::State, Json};

use super::{detached, signin::token_pair};
use crate::auth::{FederatedClaims, Federated, Role, RoleClaim};
use crate::directory::{DirectoryError, NewUser};
use crate::error::ApiError;
use crate::models::{AuthUser, DataResponse, LoginResp};
use crate::state::AppState;

/// Map federated claims to a local user.
///
/// The provider must vouch for the email. An unknown address gets a new,
/// verified, passwordless account.
pub(crate) async fn federated_user(
    state: &AppState,
    claims: &FederatedClaims,
) -> Result<(AuthUser, RoleClaim), ApiError> {
    let Some(email) = claims.verified_email() else {
        tracing::debug!(sub = %claims.sub, "federated token without a verified email");
        return Err(ApiError::email_not_verified());
    };

    let user = match state.users.find_user_by_email(email).await {
        Ok(user) => user,
        Err(DirectoryError::NotFound) => {
            let (first_name, last_name) = split_name(claims.name.as_deref());
            let user = state
                .users
                .create_user(NewUser {
                    username: email.to_string(),
                    email: email.to_string(),
                    first_name,
                    last_name,
                    password_hash: String::new(),
                    email_verified: true,
                    roles: RoleClaim::new([Role::SIGNIN]),
                })
                .await?;
            tracing::info!(user_id = %user.uuid, sub = %claims.sub, "provisioned federated account");
            user
        }
        Err(err) => return Err(err.into()),
    };

    let user = if user.is_verified() {
        user
    } else {
        // The provider vouched for this address.
        let users = state.users.clone();
        let uuid = user.uuid;
        detached(async move { Ok::<_, ApiError>(users.set_email_verified(uuid).await?) }).await?
    };

    let roles = state.users.user_roles(user.uuid).await?;
    if !roles.can_sign_in() {
        return Err(ApiError::not_allowed_to_sign_in());
    }
    Ok((user, roles))
}

fn split_name(name: Option<&str>) -> (String, String) {
    let name = name.map(str::trim).unwrap_or_default();
    // Providers fall back to the email as the display name.
    if name.is_empty() || name.contains('@') {
        return (String::new(), String::new());
    }
    match name.split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// Exchange a federated token for first-party tokens.
#[utoipa::path(
    post,
    path = "/auth/auth0/validate",
    tag = "Authentication",
    security(("federated" = [])),
    responses(
        (status = 200, description = "Refresh and access tokens", body = DataResponse<LoginResp>),
        (status = 401, description = "Missing or invalid federated token", body = crate::error::ErrorBody),
        (status = 403, description = "Email not vouched for, or sign-in not allowed", body = crate::error::ErrorBody),
    )
)]
pub async fn validate(
    State(state): State<AppState>,
    Federated(claims): Federated,
) -> Result<Json<DataResponse<LoginResp>>, ApiError> {
    let (user, roles) = federated_user(&state, &claims).await?;
    tracing::info!(user_id = %user.uuid, "signed in with federated token");
    Ok(Json(DataResponse::new(token_pair(&state, &user, &roles)?)))
}
