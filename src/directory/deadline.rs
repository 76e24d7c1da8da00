// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deadline decorator for a [`UserDirectory`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{DirectoryError, NewUser, UserDirectory, UserUpdate};
use crate::auth::roles::RoleClaim;
use crate::models::AuthUser;

/// Fails any call that takes longer than `timeout` with
/// [`DirectoryError::Timeout`]. No retries here; the backend owns those.
pub struct DeadlineDirectory {
    inner: Arc<dyn UserDirectory>,
    timeout: Duration,
}

impl DeadlineDirectory {
    pub fn new(inner: Arc<dyn UserDirectory>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, call: F) -> Result<T, DirectoryError>
    where
        F: Future<Output = Result<T, DirectoryError>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "directory call timed out");
                Err(DirectoryError::Timeout)
            }
        }
    }
}

#[async_trait]
impl UserDirectory for DeadlineDirectory {
    async fn find_user_by_username(&self, username: &str) -> Result<AuthUser, DirectoryError> {
        self.bounded("find_user_by_username", self.inner.find_user_by_username(username))
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<AuthUser, DirectoryError> {
        self.bounded("find_user_by_email", self.inner.find_user_by_email(email))
            .await
    }

    async fn find_user_by_uuid(&self, uuid: Uuid) -> Result<AuthUser, DirectoryError> {
        self.bounded("find_user_by_uuid", self.inner.find_user_by_uuid(uuid))
            .await
    }

    async fn find_user_by_api_key(&self, fingerprint: &str) -> Result<AuthUser, DirectoryError> {
        self.bounded("find_user_by_api_key", self.inner.find_user_by_api_key(fingerprint))
            .await
    }

    async fn create_user(&self, user: NewUser) -> Result<AuthUser, DirectoryError> {
        self.bounded("create_user", self.inner.create_user(user)).await
    }

    async fn set_password_hash(&self, uuid: Uuid, hash: String) -> Result<AuthUser, DirectoryError> {
        self.bounded("set_password_hash", self.inner.set_password_hash(uuid, hash))
            .await
    }

    async fn set_email_address(
        &self,
        uuid: Uuid,
        email: String,
    ) -> Result<AuthUser, DirectoryError> {
        self.bounded("set_email_address", self.inner.set_email_address(uuid, email))
            .await
    }

    async fn set_email_verified(&self, uuid: Uuid) -> Result<AuthUser, DirectoryError> {
        self.bounded("set_email_verified", self.inner.set_email_verified(uuid))
            .await
    }

    async fn update_user(
        &self,
        uuid: Uuid,
        update: UserUpdate,
    ) -> Result<AuthUser, DirectoryError> {
        self.bounded("update_user", self.inner.update_user(uuid, update))
            .await
    }

    async fn user_roles(&self, uuid: Uuid) -> Result<RoleClaim, DirectoryError> {
        self.bounded("user_roles", self.inner.user_roles(uuid)).await
    }

    async fn set_user_roles(&self, uuid: Uuid, roles: RoleClaim) -> Result<(), DirectoryError> {
        self.bounded("set_user_roles", self.inner.set_user_roles(uuid, roles))
            .await
    }

    async fn add_api_key(&self, uuid: Uuid, fingerprint: String) -> Result<(), DirectoryError> {
        self.bounded("add_api_key", self.inner.add_api_key(uuid, fingerprint))
            .await
    }

    async fn list_users(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<AuthUser>, DirectoryError> {
        self.bounded("list_users", self.inner.list_users(offset, limit))
            .await
    }

    async fn count_users(&self) -> Result<usize, DirectoryError> {
        self.bounded("count_users", self.inner.count_users()).await
    }

    async fn delete_user(&self, uuid: Uuid) -> Result<(), DirectoryError> {
        self.bounded("delete_user", self.inner.delete_user(uuid)).await
    }
}
