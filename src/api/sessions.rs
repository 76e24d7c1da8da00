// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cookie sessions.
//!
//! The sign-in variants mirror the bearer flows but answer with an encrypted
//! session cookie instead of tokens. Tokens are minted from the session on
//! demand through `/sessions/tokens/access`.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::SecondsFormat;

use super::{data, federated::federated_user, signin::authenticate};
use crate::auth::session::SessionData;
use crate::auth::middleware::bearer_token;
use crate::auth::{fingerprint, ApiJson, Auth, CurrentSession, Federated, Validator};
use crate::directory::{DirectoryError, UserUpdate};
use crate::error::ApiError;
use crate::models::{
    AccessTokenResp, ApiKeyBody, AuthUser, DataResponse, MessageResp, PublicUser, SessionInfo,
    UserUpdateBody, UserWithRoles,
};
use crate::state::AppState;

/// Install a fresh session for `user`. `opened_with` is the fingerprint of
/// the bearer credential the session was started from.
fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: &AuthUser,
    opened_with: Option<String>,
) -> Result<Response, ApiError> {
    let mut session = SessionData::new(user.public());
    session.refresh_token_fingerprint = opened_with;
    let cookie = state.sessions.cookie(&session)?;
    tracing::info!(user_id = %user.uuid, "session started");
    Ok((jar.add(cookie), data(user.public())).into_response())
}

/// Sign in with username and password and start a session.
#[utoipa::path(
    post,
    path = "/sessions/auth/signin",
    tag = "Sessions",
    request_body = crate::models::LoginBody,
    responses(
        (status = 200, description = "Session cookie set", body = DataResponse<PublicUser>),
        (status = 400, description = "Malformed body", body = crate::error::ErrorBody),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody),
        (status = 403, description = "Email not verified or sign-in not allowed", body = crate::error::ErrorBody),
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<Response, ApiError> {
    let validated = Validator::new(&state).parse_login_body(&body).into_result()?;
    let (user, _) = authenticate(&state, validated.body).await?;
    start_session(&state, jar, &user, None)
}

/// Redeem a magic link and start a session.
#[utoipa::path(
    post,
    path = "/sessions/auth/passwordless/validate",
    tag = "Sessions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Session cookie set", body = DataResponse<PublicUser>),
        (status = 401, description = "Missing, invalid or wrong kind of token", body = crate::error::ErrorBody),
        (status = 403, description = "Email not verified or sign-in not allowed", body = crate::error::ErrorBody),
    )
)]
pub async fn passwordless_validate(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Auth(claims): Auth,
) -> Response {
    let opened_with = bearer_token(&headers).ok().map(fingerprint);
    Validator::new(&state)
        .with_claims(claims)
        .load_user_from_token()
        .await
        .check_user_has_verified_email()
        .success(|v| async move {
            let user = v.user()?;
            if !state.users.user_roles(user.uuid).await?.can_sign_in() {
                return Err(ApiError::not_allowed_to_sign_in());
            }
            start_session(&state, jar, user, opened_with)
        })
        .await
}

/// Start a session from a federated token.
#[utoipa::path(
    post,
    path = "/sessions/auth0/signin",
    tag = "Sessions",
    security(("federated" = [])),
    responses(
        (status = 200, description = "Session cookie set", body = DataResponse<PublicUser>),
        (status = 401, description = "Missing or invalid federated token", body = crate::error::ErrorBody),
        (status = 403, description = "Email not vouched for, or sign-in not allowed", body = crate::error::ErrorBody),
    )
)]
pub async fn federated_signin(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Federated(claims): Federated,
) -> Result<Response, ApiError> {
    let (user, _) = federated_user(&state, &claims).await?;
    let opened_with = bearer_token(&headers).ok().map(fingerprint);
    start_session(&state, jar, &user, opened_with)
}

/// Start a session with an API key.
#[utoipa::path(
    post,
    path = "/sessions/api/keys/signin",
    tag = "Sessions",
    request_body = ApiKeyBody,
    responses(
        (status = 200, description = "Session cookie set", body = DataResponse<PublicUser>),
        (status = 401, description = "Unknown key", body = crate::error::ErrorBody),
        (status = 403, description = "Sign-in not allowed", body = crate::error::ErrorBody),
    )
)]
pub async fn api_key_signin(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<ApiKeyBody>,
) -> Result<Response, ApiError> {
    let key = body.key.trim();
    if key.is_empty() {
        return Err(ApiError::bad_request("key is required"));
    }
    let key_fingerprint = fingerprint(key);
    let user = match state.users.find_user_by_api_key(&key_fingerprint).await {
        Ok(user) => user,
        Err(DirectoryError::NotFound) => return Err(ApiError::invalid_credentials()),
        Err(err) => return Err(err.into()),
    };
    if !state.users.user_roles(user.uuid).await?.can_sign_in() {
        return Err(ApiError::not_allowed_to_sign_in());
    }
    start_session(&state, jar, &user, Some(key_fingerprint))
}

#[utoipa::path(
    get,
    path = "/sessions/info",
    tag = "Sessions",
    responses(
        (status = 200, description = "Current session", body = DataResponse<SessionInfo>),
        (status = 401, description = "No valid session", body = crate::error::ErrorBody),
    )
)]
pub async fn info(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Json<DataResponse<SessionInfo>> {
    let expires = session.expires_at(state.sessions.max_age());
    Json(DataResponse::new(SessionInfo {
        user: session.auth_user,
        created_at: session
            .created_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        expires: expires.to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

/// Destroy the session cookie.
#[utoipa::path(
    post,
    path = "/sessions/signout",
    tag = "Sessions",
    responses((status = 200, description = "Signed out", body = DataResponse<MessageResp>))
)]
pub async fn signout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let jar = jar.remove(state.sessions.removal_cookie());
    (jar, data(MessageResp::new("user signed out"))).into_response()
}

/// Mint an `ACCESS` token for the session's user, with current roles.
#[utoipa::path(
    post,
    path = "/sessions/tokens/access",
    tag = "Sessions",
    responses(
        (status = 200, description = "New access token", body = DataResponse<AccessTokenResp>),
        (status = 401, description = "No valid session", body = crate::error::ErrorBody),
    )
)]
pub async fn new_access_token(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<DataResponse<AccessTokenResp>>, ApiError> {
    let uuid = session.auth_user.uuid;
    let roles = match state.users.user_roles(uuid).await {
        Ok(roles) => roles,
        Err(DirectoryError::NotFound) => {
            return Err(ApiError::token_invalid("session user no longer exists"))
        }
        Err(err) => return Err(err.into()),
    };
    let access_token = state.tokens.access_token(uuid, &roles)?;
    Ok(Json(DataResponse::new(AccessTokenResp { access_token })))
}

/// Re-issue the session cookie with a new creation time and a fresh user
/// snapshot.
#[utoipa::path(
    post,
    path = "/sessions/refresh",
    tag = "Sessions",
    responses(
        (status = 200, description = "Session renewed", body = DataResponse<PublicUser>),
        (status = 401, description = "No valid session", body = crate::error::ErrorBody),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    CurrentSession(session): CurrentSession,
) -> Result<Response, ApiError> {
    let user = session_user(&state, &session).await?;
    start_session(&state, jar, &user, session.refresh_token_fingerprint)
}

#[utoipa::path(
    get,
    path = "/sessions/user",
    tag = "Sessions",
    responses(
        (status = 200, description = "Session user and roles", body = DataResponse<UserWithRoles>),
        (status = 401, description = "No valid session", body = crate::error::ErrorBody),
    )
)]
pub async fn user(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<DataResponse<UserWithRoles>>, ApiError> {
    let user = session_user(&state, &session).await?;
    let roles = state.users.user_roles(user.uuid).await?;
    Ok(Json(DataResponse::new(UserWithRoles {
        user: user.public(),
        roles: roles.roles().map(|r| r.as_str().to_string()).collect(),
    })))
}

/// Update the session user's profile and refresh the cookie snapshot.
#[utoipa::path(
    post,
    path = "/sessions/user/update",
    tag = "Sessions",
    request_body = UserUpdateBody,
    responses(
        (status = 200, description = "Updated user", body = DataResponse<PublicUser>),
        (status = 401, description = "No valid session", body = crate::error::ErrorBody),
        (status = 409, description = "Username taken", body = crate::error::ErrorBody),
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    jar: CookieJar,
    CurrentSession(session): CurrentSession,
    ApiJson(body): ApiJson<UserUpdateBody>,
) -> Result<Response, ApiError> {
    let updated = state
        .users
        .update_user(
            session.auth_user.uuid,
            UserUpdate {
                username: body.username,
                first_name: body.first_name,
                last_name: body.last_name,
            },
        )
        .await?;
    start_session(&state, jar, &updated, session.refresh_token_fingerprint)
}

async fn session_user(state: &AppState, session: &SessionData) -> Result<AuthUser, ApiError> {
    match state.users.find_user_by_uuid(session.auth_user.uuid).await {
        Ok(user) => Ok(user),
        Err(DirectoryError::NotFound) => Err(ApiError::token_invalid("session user no longer exists")),
        Err(err) => Err(err.into()),
    }
}
