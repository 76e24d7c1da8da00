// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password and passwordless sign-in.

use axum::{body::Bytes, extract::State, response::Response, Json};
use url::Url;

use super::data;
use crate::auth::{otp, password, Auth, RoleClaim, TokenKind, Validator};
use crate::config::Config;
use crate::error::{ApiError, ErrorKind};
use crate::mail::{EmailType, QueueEmail};
use crate::models::{
    AuthUser, DataResponse, LoginBody, LoginResp, MessageResp, RefreshTokenResp,
};
use crate::state::AppState;

pub(crate) const PASSWORDLESS_SENT: &str = "check your email for a magic link to sign in";

/// Resolve and authenticate a username/password pair.
///
/// Checks run in order: user exists, email verified, role permits sign-in,
/// password matches. An unknown user still costs one password verification.
pub(crate) async fn authenticate(
    state: &AppState,
    body: LoginBody,
) -> Result<(AuthUser, RoleClaim), ApiError> {
    let password = body.password.clone();
    let validated = match Validator::new(state)
        .with_body(body)
        .load_user_from_username()
        .await
        .check_user_has_verified_email()
        .into_result()
    {
        Ok(validated) => validated,
        Err(err) => {
            if err.kind == ErrorKind::InvalidCredentials {
                password::verify(password, None).await?;
            }
            return Err(err);
        }
    };
    let user = validated.user()?.clone();

    let roles = state.users.user_roles(user.uuid).await?;
    if !roles.can_sign_in() {
        tracing::debug!(user_id = %user.uuid, "sign-in refused by role set");
        return Err(ApiError::not_allowed_to_sign_in());
    }

    let stored = user.has_password().then(|| user.password_hash.clone());
    if !password::verify(password, stored).await? {
        tracing::debug!(user_id = %user.uuid, "password mismatch");
        return Err(ApiError::invalid_credentials());
    }
    Ok((user, roles))
}

pub(crate) fn token_pair(
    state: &AppState,
    user: &AuthUser,
    roles: &RoleClaim,
) -> Result<LoginResp, ApiError> {
    Ok(LoginResp {
        refresh_token: state.tokens.refresh_token(user.uuid, roles)?,
        access_token: state.tokens.access_token(user.uuid, roles)?,
    })
}

/// Keep `url` only if it points back at this application.
///
/// Accepted: absolute http(s) URLs whose host is the `APP_URL` host or ends
/// with `APP_DOMAIN`.
pub(crate) fn safe_redirect(config: &Config, url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    let own_host = config.app_url.host_str().map(str::to_ascii_lowercase);
    let domain = config.app_domain.trim().trim_start_matches('.').to_ascii_lowercase();

    let same_host = own_host.as_deref() == Some(host.as_str());
    let in_domain = !domain.is_empty()
        && (host == domain || host.ends_with(&format!(".{domain}")));
    if same_host || in_domain {
        Some(parsed.to_string())
    } else {
        tracing::warn!(%host, "dropping redirect outside the application domain");
        None
    }
}

/// Mail a magic link if the user exists and is verified. The caller always
/// reports success.
pub(crate) async fn send_passwordless(state: &AppState, body: LoginBody) {
    let redirect = safe_redirect(&state.config, &body.redirect_url);
    let validated = Validator::new(state)
        .with_body(body)
        .load_user_from_username()
        .await
        .check_user_has_verified_email()
        .into_result();
    let validated = match validated {
        Ok(validated) => validated,
        Err(err) => {
            tracing::debug!(code = err.kind.code(), "no magic link sent");
            return;
        }
    };
    let Some(user) = validated.user.as_ref() else {
        return;
    };

    let token = match state.tokens.mint(
        TokenKind::Passwordless,
        user.uuid,
        None,
        Some(otp::nonce()),
        redirect.clone(),
    ) {
        Ok(token) => token,
        Err(err) => {
            tracing::error!(error = %err, "failed to mint passwordless token");
            return;
        }
    };
    let link = redirect.unwrap_or_else(|| state.config.link("/account/signin"));
    let email = QueueEmail::new(EmailType::Passwordless, user)
        .with_token(token, state.config.ttls.passwordless)
        .with_link(link);
    state.send_email(email).await;
}

/// Sign in with a username (or email) and password.
///
/// An empty password sends a magic link instead.
#[utoipa::path(
    post,
    path = "/auth/signin",
    tag = "Authentication",
    request_body = LoginBody,
    responses(
        (status = 200, description = "Refresh and access tokens", body = DataResponse<LoginResp>),
        (status = 400, description = "Malformed body", body = crate::error::ErrorBody),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody),
        (status = 403, description = "Email not verified or sign-in not allowed", body = crate::error::ErrorBody),
    )
)]
pub async fn signin(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let validated = Validator::new(&state).parse_login_body(&body).into_result()?;
    let body = validated.body;

    if body.password.is_empty() {
        send_passwordless(&state, body).await;
        return Ok(data(MessageResp::new(PASSWORDLESS_SENT)));
    }

    let (user, roles) = authenticate(&state, body).await?;
    tracing::info!(user_id = %user.uuid, "signed in");
    Ok(data(token_pair(&state, &user, &roles)?))
}

/// Email a magic link.
#[utoipa::path(
    post,
    path = "/auth/passwordless/email",
    tag = "Authentication",
    request_body = LoginBody,
    responses(
        (status = 200, description = "Sent if the account exists", body = DataResponse<MessageResp>),
        (status = 400, description = "Malformed body", body = crate::error::ErrorBody),
    )
)]
pub async fn passwordless_email(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DataResponse<MessageResp>>, ApiError> {
    let validated = Validator::new(&state).parse_login_body(&body).into_result()?;
    send_passwordless(&state, validated.body).await;
    Ok(Json(DataResponse::new(MessageResp::new(PASSWORDLESS_SENT))))
}

/// Redeem a magic link for a refresh token.
#[utoipa::path(
    post,
    path = "/auth/passwordless/signin",
    tag = "Authentication",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Refresh token", body = DataResponse<RefreshTokenResp>),
        (status = 401, description = "Missing, invalid or wrong kind of token", body = crate::error::ErrorBody),
        (status = 403, description = "Email not verified or sign-in not allowed", body = crate::error::ErrorBody),
    )
)]
pub async fn passwordless_signin(State(state): State<AppState>, Auth(claims): Auth) -> Response {
    Validator::new(&state)
        .with_claims(claims)
        .load_user_from_token()
        .await
        .check_user_has_verified_email()
        .success(|v| async move {
            let user = v.user()?;
            let roles = state.users.user_roles(user.uuid).await?;
            if !roles.can_sign_in() {
                return Err(ApiError::not_allowed_to_sign_in());
            }
            let refresh_token = state.tokens.refresh_token(user.uuid, &roles)?;
            tracing::info!(user_id = %user.uuid, "signed in with magic link");
            Ok(data(RefreshTokenResp { refresh_token }))
        })
        .await
}
