// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! The identity record kept by the user directory, the public projection sent
//! to clients and stored in sessions, and the request and response bodies of
//! the auth routes. Wire names are camelCase.
//!
//! ## Model Categories
//!
//! - **Users**: [`AuthUser`] (server side only) and [`PublicUser`]
//! - **Requests**: login, signup, password, email, profile and admin bodies
//! - **Responses**: token pairs, token info, messages, all wrapped in [`DataResponse`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::claims::TokenKind;

// =============================================================================
// Users
// =============================================================================

/// Identity record for a human principal.
///
/// `email_verified_at` is a unix timestamp; `0` means unverified. Once set it
/// only goes back to `0` when the address changes. `password_hash` is empty
/// for passwordless-only accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified_at: i64,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuthUser {
    pub fn is_verified(&self) -> bool {
        self.email_verified_at > 0
    }

    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            uuid: self.uuid,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email_verified_at: self.email_verified_at,
        }
    }

    /// Display name used in emails.
    pub fn display_name(&self) -> &str {
        if self.first_name.is_empty() {
            &self.username
        } else {
            &self.first_name
        }
    }
}

/// What clients (and session cookies) see of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified_at: i64,
}

/// A user together with their role names.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: PublicUser,
    pub roles: Vec<String>,
}

// =============================================================================
// Requests
// =============================================================================

/// Body shared by the sign-in style routes. Every field is optional; which
/// ones matter depends on the route.
///
/// `callbackUrl` and `visitUrl` are accepted for client compatibility and
/// ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginBody {
    pub username: String,
    pub email: String,
    pub password: String,
    pub otp: String,
    pub callback_url: String,
    pub redirect_url: String,
    pub visit_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupBody {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PasswordBody {
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct EmailBody {
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ApiKeyBody {
    pub key: String,
}

/// Profile fields a user may change on their own account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct UserUpdateBody {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UserListQuery {
    pub offset: usize,
    pub records: usize,
}

impl Default for UserListQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            records: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserUpdateBody {
    pub uuid: Uuid,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    /// Empty or absent leaves the password unchanged.
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminAddUserBody {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub roles: Vec<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// Success envelope: every successful body is `{ "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageResp {
    pub message: String,
}

impl MessageResp {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResp {
    pub refresh_token: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResp {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResp {
    pub access_token: String,
}

/// Token metadata. Roles are deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenInfo {
    pub uuid: Uuid,
    pub kind: TokenKind,
    /// RFC 3339, UTC.
    pub expires: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyResp {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserStats {
    pub users: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user: PublicUser,
    /// RFC 3339, UTC.
    pub created_at: String,
    pub expires: String,
}
