// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account creation.

use axum::{extract::State, Json};

use crate::auth::{otp, password, ApiJson, Role, RoleClaim, TokenKind};
use crate::directory::{DirectoryError, NewUser};
use crate::error::ApiError;
use crate::mail::{EmailType, QueueEmail};
use crate::models::{AuthUser, DataResponse, MessageResp, SignupBody};
use crate::state::AppState;

const SIGNUP_SENT: &str = "check your email to verify your address";

/// Mint a `VERIFY_EMAIL` token for `user` and queue the verification mail.
pub(crate) async fn send_verification(
    state: &AppState,
    user: &AuthUser,
    to: &str,
) -> Result<(), ApiError> {
    let token = state.tokens.mint(
        TokenKind::VerifyEmail,
        user.uuid,
        None,
        Some(otp::derive(user)),
        None,
    )?;
    let email = QueueEmail::new(EmailType::Verify, user)
        .to(to)
        .with_token(token, state.config.ttls.short)
        .with_link(state.config.link("/account/verify"));
    state.send_email(email).await;
    Ok(())
}

/// Create an unverified account and email a verification link.
///
/// Signing up again with the address of an unverified account re-sends the
/// link; a verified address is a conflict.
#[utoipa::path(
    post,
    path = "/signup",
    tag = "Authentication",
    request_body = SignupBody,
    responses(
        (status = 200, description = "Verification email queued", body = DataResponse<MessageResp>),
        (status = 400, description = "Malformed body", body = crate::error::ErrorBody),
        (status = 409, description = "Email or username already registered", body = crate::error::ErrorBody),
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SignupBody>,
) -> Result<Json<DataResponse<MessageResp>>, ApiError> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("a valid email address is required"));
    }

    match state.users.find_user_by_email(&email).await {
        Ok(existing) if existing.is_verified() => {
            return Err(ApiError::conflict("email address already registered"));
        }
        Ok(existing) => {
            tracing::info!(user_id = %existing.uuid, "re-sending verification email");
            send_verification(&state, &existing, &existing.email).await?;
            return Ok(Json(DataResponse::new(MessageResp::new(SIGNUP_SENT))));
        }
        Err(DirectoryError::NotFound) => {}
        Err(err) => return Err(err.into()),
    }

    let password_hash = if body.password.is_empty() {
        String::new()
    } else {
        password::hash(body.password).await?
    };
    let user = state
        .users
        .create_user(NewUser {
            username: body.username,
            email,
            first_name: body.first_name,
            last_name: body.last_name,
            password_hash,
            email_verified: false,
            roles: RoleClaim::new([Role::SIGNIN]),
        })
        .await?;
    tracing::info!(user_id = %user.uuid, "account created");

    send_verification(&state, &user, &user.email).await?;
    Ok(Json(DataResponse::new(MessageResp::new(SIGNUP_SENT))))
}
