// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request validation pipeline.
//!
//! Steps run in order and the first failure sticks: later steps become no-ops
//! and [`Validator::success`] renders the recorded error instead of calling the
//! handler body.
//!
//! ```rust,ignore
//! Validator::new(&state)
//!     .with_claims(claims)
//!     .load_user_from_token()
//!     .await
//!     .check_otp_valid()
//!     .success(|v| async move { ... })
//!     .await
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};

use super::claims::{TokenClaims, TokenKind};
use super::otp;
use crate::directory::{DirectoryError, UserDirectory};
use crate::error::ApiError;
use crate::models::{AuthUser, LoginBody};
use crate::state::AppState;

pub struct Validator {
    users: Arc<dyn UserDirectory>,
    claims: Option<TokenClaims>,
    body: LoginBody,
    user: Option<AuthUser>,
    error: Option<ApiError>,
}

/// Everything the pipeline gathered, handed to the handler body.
#[derive(Debug)]
pub struct Validated {
    pub claims: Option<TokenClaims>,
    pub body: LoginBody,
    pub user: Option<AuthUser>,
}

impl Validated {
    /// The loaded user. Only valid after a `load_user_*` step.
    pub fn user(&self) -> Result<&AuthUser, ApiError> {
        self.user
            .as_ref()
            .ok_or_else(|| ApiError::internal("validator ran without loading a user"))
    }

    pub fn claims(&self) -> Result<&TokenClaims, ApiError> {
        self.claims
            .as_ref()
            .ok_or_else(|| ApiError::internal("validator ran without token claims"))
    }
}

impl Validator {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            claims: None,
            body: LoginBody::default(),
            user: None,
            error: None,
        }
    }

    pub fn with_claims(mut self, claims: TokenClaims) -> Self {
        self.claims = Some(claims);
        self
    }

    pub fn with_body(mut self, body: LoginBody) -> Self {
        self.body = body;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// A user is loaded and their address is verified.
    pub fn user_is_verified(&self) -> bool {
        self.user.as_ref().is_some_and(AuthUser::is_verified)
    }

    fn fail(&mut self, error: ApiError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Decode the shared sign-in body. An empty body is a `400`.
    pub fn parse_login_body(mut self, bytes: &[u8]) -> Self {
        if self.is_failed() {
            return self;
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            self.fail(ApiError::bad_request("request body is required"));
            return self;
        }
        match serde_json::from_slice::<LoginBody>(bytes) {
            Ok(body) => self.body = body,
            Err(err) => self.fail(ApiError::bad_request(format!("invalid request body: {err}"))),
        }
        self
    }

    /// Resolve the user named in the body. `username` wins over `email`; a
    /// username containing `@` is looked up as an email too.
    pub async fn load_user_from_username(mut self) -> Self {
        if self.is_failed() {
            return self;
        }
        let username = self.body.username.trim();
        let email = self.body.email.trim();

        let found = if !username.is_empty() {
            match self.users.find_user_by_username(username).await {
                Err(DirectoryError::NotFound) if username.contains('@') => {
                    self.users.find_user_by_email(username).await
                }
                other => other,
            }
        } else if !email.is_empty() {
            self.users.find_user_by_email(email).await
        } else {
            self.fail(ApiError::bad_request("username or email is required"));
            return self;
        };

        match found {
            Ok(user) => self.user = Some(user),
            Err(DirectoryError::NotFound) => self.fail(ApiError::invalid_credentials()),
            Err(err) => self.fail(err.into()),
        }
        self
    }

    /// Load the user the verified bearer token was minted for.
    pub async fn load_user_from_token(mut self) -> Self {
        if self.is_failed() {
            return self;
        }
        let Some(user_id) = self.claims.as_ref().map(|c| c.user_id) else {
            self.fail(ApiError::token_invalid("missing token"));
            return self;
        };
        match self.users.find_user_by_uuid(user_id).await {
            Ok(user) => self.user = Some(user),
            Err(DirectoryError::NotFound) => {
                tracing::debug!(%user_id, "token subject no longer exists");
                self.fail(ApiError::token_invalid("token subject does not exist"));
            }
            Err(err) => self.fail(err.into()),
        }
        self
    }

    pub fn check_user_has_verified_email(mut self) -> Self {
        if self.is_failed() {
            return self;
        }
        match &self.user {
            Some(user) if user.is_verified() => {}
            Some(_) => self.fail(ApiError::email_not_verified()),
            None => self.fail(ApiError::internal("no user loaded before verification check")),
        }
        self
    }

    pub fn check_is_valid_refresh_token(mut self) -> Self {
        if self.is_failed() {
            return self;
        }
        match &self.claims {
            Some(claims) if claims.kind == TokenKind::Refresh => {}
            Some(_) => self.fail(ApiError::wrong_token_type()),
            None => self.fail(ApiError::token_invalid("missing token")),
        }
        self
    }

    /// Recompute the user's passcode and compare it with the token's.
    pub fn check_otp_valid(mut self) -> Self {
        if self.is_failed() {
            return self;
        }
        let (Some(claims), Some(user)) = (&self.claims, &self.user) else {
            self.fail(ApiError::internal("otp check needs claims and a user"));
            return self;
        };
        let valid = claims
            .otp
            .as_deref()
            .is_some_and(|presented| otp::verify(user, presented));
        if !valid {
            tracing::debug!(user_id = %user.uuid, kind = %claims.kind, "stale one-time passcode");
            self.fail(ApiError::token_invalid("token has already been used"));
        }
        self
    }

    pub fn into_result(self) -> Result<Validated, ApiError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(Validated {
                claims: self.claims,
                body: self.body,
                user: self.user,
            }),
        }
    }

    /// Run `handler` unless a step failed; otherwise respond with the error.
    pub async fn success<F, Fut, R>(self, handler: F) -> Response
    where
        F: FnOnce(Validated) -> Fut,
        Fut: Future<Output = Result<R, ApiError>>,
        R: IntoResponse,
    {
        match self.into_result() {
            Ok(validated) => match handler(validated).await {
                Ok(response) => response.into_response(),
                Err(err) => err.into_response(),
            },
            Err(err) => err.into_response(),
        }
    }
}
