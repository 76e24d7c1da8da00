// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # User Directory
//!
//! The facade the auth core uses to read and write identity records and role
//! sets. Implementations must be safe for concurrent use; the directory is
//! the serialization point for concurrent writes to the same user.
//!
//! - [`InMemoryDirectory`] keeps everything in a map behind a lock.
//! - [`DeadlineDirectory`] wraps any directory and bounds every call.

mod deadline;
mod memory;

pub use deadline::DeadlineDirectory;
pub use memory::InMemoryDirectory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::roles::RoleClaim;
use crate::error::ApiError;
use crate::models::AuthUser;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    /// The call did not finish before its deadline. Retriable.
    #[error("directory call timed out")]
    Timeout,

    #[error("directory backend error: {0}")]
    Backend(String),
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound => ApiError::not_found("user not found"),
            DirectoryError::Conflict(msg) => ApiError::conflict(msg),
            other => ApiError::internal(other.to_string()),
        }
    }
}

/// Fields for a new account.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    /// Create the account already verified (admin and federated creation).
    pub email_verified: bool,
    pub roles: RoleClaim,
}

/// Profile changes; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<AuthUser, DirectoryError>;

    async fn find_user_by_email(&self, email: &str) -> Result<AuthUser, DirectoryError>;

    async fn find_user_by_uuid(&self, uuid: Uuid) -> Result<AuthUser, DirectoryError>;

    /// Look up the owner of an API key by its fingerprint.
    async fn find_user_by_api_key(&self, fingerprint: &str) -> Result<AuthUser, DirectoryError>;

    /// Fails with [`DirectoryError::Conflict`] if the username or email is taken.
    async fn create_user(&self, user: NewUser) -> Result<AuthUser, DirectoryError>;

    async fn set_password_hash(&self, uuid: Uuid, hash: String) -> Result<AuthUser, DirectoryError>;

    /// Change the address and reset `email_verified_at` to 0.
    async fn set_email_address(&self, uuid: Uuid, email: String)
        -> Result<AuthUser, DirectoryError>;

    /// Mark the address verified. An already verified user keeps the earlier
    /// timestamp.
    async fn set_email_verified(&self, uuid: Uuid) -> Result<AuthUser, DirectoryError>;

    async fn update_user(&self, uuid: Uuid, update: UserUpdate)
        -> Result<AuthUser, DirectoryError>;

    async fn user_roles(&self, uuid: Uuid) -> Result<RoleClaim, DirectoryError>;

    async fn set_user_roles(&self, uuid: Uuid, roles: RoleClaim) -> Result<(), DirectoryError>;

    async fn add_api_key(&self, uuid: Uuid, fingerprint: String) -> Result<(), DirectoryError>;

    /// Users ordered by creation time.
    async fn list_users(&self, offset: usize, limit: usize)
        -> Result<Vec<AuthUser>, DirectoryError>;

    async fn count_users(&self) -> Result<usize, DirectoryError>;

    async fn delete_user(&self, uuid: Uuid) -> Result<(), DirectoryError>;
}
