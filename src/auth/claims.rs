// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims: first-party tokens minted here and federated tokens minted by
//! the external identity provider.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::roles::RoleClaim;
use crate::config::TokenTtls;

/// Purpose of a first-party token. Never trusted without re-checking the kind
/// at the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    VerifyEmail,
    Passwordless,
    ResetPassword,
    ChangeEmail,
    Refresh,
    Access,
    Otp,
}

impl TokenKind {
    pub const ALL: [TokenKind; 7] = [
        TokenKind::VerifyEmail,
        TokenKind::Passwordless,
        TokenKind::ResetPassword,
        TokenKind::ChangeEmail,
        TokenKind::Refresh,
        TokenKind::Access,
        TokenKind::Otp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::VerifyEmail => "VERIFY_EMAIL",
            TokenKind::Passwordless => "PASSWORDLESS",
            TokenKind::ResetPassword => "RESET_PASSWORD",
            TokenKind::ChangeEmail => "CHANGE_EMAIL",
            TokenKind::Refresh => "REFRESH",
            TokenKind::Access => "ACCESS",
            TokenKind::Otp => "OTP",
        }
    }

    pub fn ttl(&self, ttls: &TokenTtls) -> Duration {
        match self {
            TokenKind::VerifyEmail | TokenKind::ResetPassword | TokenKind::ChangeEmail => {
                ttls.short
            }
            TokenKind::Passwordless => ttls.passwordless,
            TokenKind::Refresh => ttls.refresh,
            TokenKind::Access => ttls.access,
            TokenKind::Otp => ttls.otp,
        }
    }

    /// Kinds whose OTP must be re-checked against the live user record.
    pub fn carries_otp(&self) -> bool {
        matches!(
            self,
            TokenKind::VerifyEmail | TokenKind::ResetPassword | TokenKind::ChangeEmail
        )
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims of a first-party token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub kind: TokenKind,
    /// Present on `ACCESS` and `REFRESH` tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<RoleClaim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    /// Unique per mint, so two tokens issued in the same second still differ.
    pub jti: Uuid,
}

impl TokenClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.iat, 0).single().unwrap_or_default()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_default()
    }

    pub fn role_claim(&self) -> RoleClaim {
        self.roles.clone().unwrap_or_default()
    }
}

/// Claims of a token issued by the federated identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    /// A string or an array of strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
    pub iss: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

impl FederatedClaims {
    /// The email, but only when the provider vouches for it.
    pub fn verified_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .filter(|e| self.email_verified && !e.trim().is_empty())
    }
}
