// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password reset.

use axum::{body::Bytes, extract::State, response::Response, Json};

use super::{data, detached};
use crate::auth::{otp, password, ApiJson, Auth, TokenKind, Validator};
use crate::error::ApiError;
use crate::mail::{EmailType, QueueEmail};
use crate::models::{DataResponse, LoginBody, MessageResp, PasswordBody};
use crate::state::AppState;

const RESET_SENT: &str = "check your email for a password reset link";

/// Email a `RESET_PASSWORD` link. Reports success whether or not the account
/// exists.
#[utoipa::path(
    post,
    path = "/auth/passwords/reset",
    tag = "Passwords",
    request_body = LoginBody,
    responses(
        (status = 200, description = "Sent if the account exists", body = DataResponse<MessageResp>),
        (status = 400, description = "Malformed body", body = crate::error::ErrorBody),
    )
)]
pub async fn send_reset_password(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DataResponse<MessageResp>>, ApiError> {
    let parsed = Validator::new(&state).parse_login_body(&body).into_result()?;

    let validated = Validator::new(&state)
        .with_body(parsed.body)
        .load_user_from_username()
        .await
        .check_user_has_verified_email()
        .into_result();
    match validated {
        Ok(v) => {
            let user = v.user()?;
            let token = state.tokens.mint(
                TokenKind::ResetPassword,
                user.uuid,
                None,
                Some(otp::derive(user)),
                None,
            )?;
            let email = QueueEmail::new(EmailType::PasswordReset, user)
                .with_token(token, state.config.ttls.short)
                .with_link(state.config.link("/account/password/reset"));
            state.send_email(email).await;
        }
        Err(err) => tracing::debug!(code = err.kind.code(), "no reset link sent"),
    }
    Ok(Json(DataResponse::new(MessageResp::new(RESET_SENT))))
}

/// Redeem a `RESET_PASSWORD` token and set a new password.
///
/// The write changes the hash every outstanding reset token was derived
/// from, so all of them stop working.
#[utoipa::path(
    post,
    path = "/auth/passwords/update",
    tag = "Passwords",
    security(("bearer" = [])),
    request_body = PasswordBody,
    responses(
        (status = 200, description = "Password updated", body = DataResponse<MessageResp>),
        (status = 400, description = "Missing password", body = crate::error::ErrorBody),
        (status = 401, description = "Missing, invalid, used or wrong kind of token", body = crate::error::ErrorBody),
    )
)]
pub async fn update_password(
    State(state): State<AppState>,
    Auth(claims): Auth,
    ApiJson(body): ApiJson<PasswordBody>,
) -> Response {
    Validator::new(&state)
        .with_claims(claims)
        .load_user_from_token()
        .await
        .check_otp_valid()
        .success(|v| async move {
            let user = v.user()?;
            if body.password.is_empty() {
                return Err(ApiError::bad_request("password is required"));
            }
            let hash = password::hash(body.password).await?;

            let users = state.users.clone();
            let uuid = user.uuid;
            detached(async move {
                Ok::<_, ApiError>(users.set_password_hash(uuid, hash).await?)
            })
            .await?;
            tracing::info!(user_id = %uuid, "password updated");

            state
                .send_email(QueueEmail::new(EmailType::PasswordUpdated, user))
                .await;
            Ok(data(MessageResp::new("password updated")))
        })
        .await
}
