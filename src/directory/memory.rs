// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory user directory.
//!
//! Usernames and emails are matched case-insensitively; emails are stored
//! lower-cased.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DirectoryError, NewUser, UserDirectory, UserUpdate};
use crate::auth::roles::RoleClaim;
use crate::models::AuthUser;

struct StoredUser {
    user: AuthUser,
    roles: RoleClaim,
    api_keys: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<Uuid, StoredUser>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn same(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn taken(
    users: &HashMap<Uuid, StoredUser>,
    except: Option<Uuid>,
    username: Option<&str>,
    email: Option<&str>,
) -> Option<String> {
    users
        .values()
        .filter(|s| Some(s.user.uuid) != except)
        .find_map(|s| {
            if username.is_some_and(|u| same(&s.user.username, u)) {
                Some("username already in use".to_string())
            } else if email.is_some_and(|e| same(&s.user.email, e)) {
                Some("email address already in use".to_string())
            } else {
                None
            }
        })
}

impl InMemoryDirectory {
    async fn modify<F>(&self, uuid: Uuid, f: F) -> Result<AuthUser, DirectoryError>
    where
        F: FnOnce(&mut AuthUser) + Send,
    {
        self.modify_unique(uuid, None, None, f).await
    }

    /// Conflict check and mutation under one write guard.
    async fn modify_unique<F>(
        &self,
        uuid: Uuid,
        username: Option<&str>,
        email: Option<&str>,
        f: F,
    ) -> Result<AuthUser, DirectoryError>
    where
        F: FnOnce(&mut AuthUser) + Send,
    {
        let mut users = self.users.write().await;
        if let Some(reason) = taken(&users, Some(uuid), username, email) {
            return Err(DirectoryError::Conflict(reason));
        }
        let stored = users.get_mut(&uuid).ok_or(DirectoryError::NotFound)?;
        f(&mut stored.user);
        stored.user.updated_at = Utc::now();
        Ok(stored.user.clone())
    }

    async fn find<P>(&self, predicate: P) -> Result<AuthUser, DirectoryError>
    where
        P: Fn(&StoredUser) -> bool + Send,
    {
        self.users
            .read()
            .await
            .values()
            .find(|s| predicate(s))
            .map(|s| s.user.clone())
            .ok_or(DirectoryError::NotFound)
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_user_by_username(&self, username: &str) -> Result<AuthUser, DirectoryError> {
        self.find(|s| same(&s.user.username, username)).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<AuthUser, DirectoryError> {
        self.find(|s| same(&s.user.email, email)).await
    }

    async fn find_user_by_uuid(&self, uuid: Uuid) -> Result<AuthUser, DirectoryError> {
        self.users
            .read()
            .await
            .get(&uuid)
            .map(|s| s.user.clone())
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_user_by_api_key(&self, fingerprint: &str) -> Result<AuthUser, DirectoryError> {
        self.find(|s| s.api_keys.contains(fingerprint)).await
    }

    async fn create_user(&self, new: NewUser) -> Result<AuthUser, DirectoryError> {
        let email = new.email.trim().to_lowercase();
        let username = match new.username.trim() {
            "" => email.clone(),
            name => name.to_string(),
        };

        let mut users = self.users.write().await;
        if let Some(reason) = taken(&users, None, Some(&username), Some(&email)) {
            return Err(DirectoryError::Conflict(reason));
        }

        let now = Utc::now();
        let user = AuthUser {
            uuid: Uuid::new_v4(),
            username,
            email,
            first_name: new.first_name,
            last_name: new.last_name,
            email_verified_at: if new.email_verified { now.timestamp() } else { 0 },
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(
            user.uuid,
            StoredUser {
                user: user.clone(),
                roles: new.roles,
                api_keys: HashSet::new(),
            },
        );
        Ok(user)
    }

    async fn set_password_hash(&self, uuid: Uuid, hash: String) -> Result<AuthUser, DirectoryError> {
        self.modify(uuid, |u| u.password_hash = hash).await
    }

    async fn set_email_address(
        &self,
        uuid: Uuid,
        email: String,
    ) -> Result<AuthUser, DirectoryError> {
        let email = email.trim().to_lowercase();
        let wanted = email.clone();
        self.modify_unique(uuid, None, Some(&wanted), |u| {
            if u.email != email {
                u.email = email;
                u.email_verified_at = 0;
            }
        })
        .await
    }

    async fn set_email_verified(&self, uuid: Uuid) -> Result<AuthUser, DirectoryError> {
        self.modify(uuid, |u| {
            if u.email_verified_at == 0 {
                u.email_verified_at = Utc::now().timestamp();
            }
        })
        .await
    }

    async fn update_user(
        &self,
        uuid: Uuid,
        update: UserUpdate,
    ) -> Result<AuthUser, DirectoryError> {
        let username = update
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let wanted = username.clone();
        self.modify_unique(uuid, wanted.as_deref(), None, |u| {
            if let Some(name) = username {
                u.username = name;
            }
            if let Some(first) = update.first_name {
                u.first_name = first;
            }
            if let Some(last) = update.last_name {
                u.last_name = last;
            }
        })
        .await
    }

    async fn user_roles(&self, uuid: Uuid) -> Result<RoleClaim, DirectoryError> {
        self.users
            .read()
            .await
            .get(&uuid)
            .map(|s| s.roles.clone())
            .ok_or(DirectoryError::NotFound)
    }

    async fn set_user_roles(&self, uuid: Uuid, roles: RoleClaim) -> Result<(), DirectoryError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&uuid).ok_or(DirectoryError::NotFound)?;
        stored.roles = roles;
        Ok(())
    }

    async fn add_api_key(&self, uuid: Uuid, fingerprint: String) -> Result<(), DirectoryError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&uuid).ok_or(DirectoryError::NotFound)?;
        stored.api_keys.insert(fingerprint);
        Ok(())
    }

    async fn list_users(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<AuthUser>, DirectoryError> {
        let users = self.users.read().await;
        let mut all: Vec<AuthUser> = users.values().map(|s| s.user.clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.uuid.cmp(&b.uuid)));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_users(&self) -> Result<usize, DirectoryError> {
        Ok(self.users.read().await.len())
    }

    async fn delete_user(&self, uuid: Uuid) -> Result<(), DirectoryError> {
        self.users
            .write()
            .await
            .remove(&uuid)
            .map(|_| ())
            .ok_or(DirectoryError::NotFound)
    }
}
