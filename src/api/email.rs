// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Email verification and email address changes.

use axum::{extract::State, response::Response};

use super::{data, detached, signup::send_verification};
use crate::auth::{otp, ApiJson, Auth, TokenKind, Validator};
use crate::error::ApiError;
use crate::mail::{EmailType, QueueEmail};
use crate::models::{DataResponse, EmailBody, MessageResp};
use crate::state::AppState;

/// Redeem a `VERIFY_EMAIL` token.
///
/// Redeeming again after the address is verified succeeds without touching
/// the record, so concurrent redemptions all succeed and the first timestamp
/// stays.
#[utoipa::path(
    post,
    path = "/auth/email/verified",
    tag = "Email",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Email address verified", body = DataResponse<MessageResp>),
        (status = 401, description = "Missing, invalid, used or wrong kind of token", body = crate::error::ErrorBody),
    )
)]
pub async fn email_verified(State(state): State<AppState>, Auth(claims): Auth) -> Response {
    let validator = Validator::new(&state)
        .with_claims(claims)
        .load_user_from_token()
        .await;
    let validator = if validator.user_is_verified() {
        validator
    } else {
        validator.check_otp_valid()
    };

    validator
        .success(|v| async move {
            let user = v.user()?;
            if !user.is_verified() {
                let users = state.users.clone();
                let uuid = user.uuid;
                let updated = detached(async move {
                    Ok::<_, ApiError>(users.set_email_verified(uuid).await?)
                })
                .await?;
                tracing::info!(user_id = %uuid, verified_at = updated.email_verified_at, "email verified");
            }
            Ok(data(MessageResp::new("email address verified")))
        })
        .await
}

/// Email a `CHANGE_EMAIL` link to the caller's current address.
#[utoipa::path(
    post,
    path = "/auth/email/reset",
    tag = "Email",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Change link queued", body = DataResponse<MessageResp>),
        (status = 401, description = "Missing, invalid or wrong kind of token", body = crate::error::ErrorBody),
    )
)]
pub async fn send_change_email(State(state): State<AppState>, Auth(claims): Auth) -> Response {
    Validator::new(&state)
        .with_claims(claims)
        .load_user_from_token()
        .await
        .success(|v| async move {
            let user = v.user()?;
            let token = state.tokens.mint(
                TokenKind::ChangeEmail,
                user.uuid,
                None,
                Some(otp::derive(user)),
                None,
            )?;
            let email = QueueEmail::new(EmailType::Verify, user)
                .with_token(token, state.config.ttls.short)
                .with_link(state.config.link("/account/email/update"));
            state.send_email(email).await;
            Ok(data(MessageResp::new(
                "check your email for a link to change your address",
            )))
        })
        .await
}

/// Redeem a `CHANGE_EMAIL` token and switch to the address in the body.
///
/// The new address starts unverified and gets its own verification mail; the
/// old address is told about the change.
#[utoipa::path(
    post,
    path = "/auth/email/update",
    tag = "Email",
    security(("bearer" = [])),
    request_body = EmailBody,
    responses(
        (status = 200, description = "Email address changed", body = DataResponse<MessageResp>),
        (status = 400, description = "Missing or malformed address", body = crate::error::ErrorBody),
        (status = 401, description = "Missing, invalid, used or wrong kind of token", body = crate::error::ErrorBody),
        (status = 409, description = "Address already in use", body = crate::error::ErrorBody),
    )
)]
pub async fn update_email(
    State(state): State<AppState>,
    Auth(claims): Auth,
    ApiJson(body): ApiJson<EmailBody>,
) -> Response {
    Validator::new(&state)
        .with_claims(claims)
        .load_user_from_token()
        .await
        .check_otp_valid()
        .success(|v| async move {
            let user = v.user()?;
            let address = body.email.trim().to_lowercase();
            if address.is_empty() || !address.contains('@') {
                return Err(ApiError::bad_request("a valid email address is required"));
            }

            let users = state.users.clone();
            let uuid = user.uuid;
            let new_address = address.clone();
            let updated = detached(async move {
                Ok::<_, ApiError>(users.set_email_address(uuid, new_address).await?)
            })
            .await?;
            tracing::info!(user_id = %uuid, "email address changed");

            state
                .send_email(QueueEmail::new(EmailType::EmailChanged, user))
                .await;
            if !updated.is_verified() {
                send_verification(&state, &updated, &updated.email).await?;
            }
            Ok(data(MessageResp::new("email address updated")))
        })
        .await
}
