// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing with Argon2id.
//!
//! Hashing is CPU bound, so the async wrappers run it on the blocking pool.
//! Verification against a missing or empty hash still does the full amount of
//! work against a fixed dummy hash, keeping "no such user" and "wrong
//! password" indistinguishable by timing.

use std::sync::LazyLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::internal(err.to_string())
    }
}

static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password("edb-dummy-password").unwrap_or_default()
});

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// `false` for a wrong password, an empty hash or an unparsable hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let (target, real) = if hash.is_empty() {
        (DUMMY_HASH.as_str(), false)
    } else {
        (hash, true)
    };
    let Ok(parsed) = PasswordHash::new(target) else {
        return false;
    };
    let matches = Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok();
    real && matches
}

/// Hash on the blocking pool.
pub async fn hash(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// Verify on the blocking pool. `hash = None` burns the same time and fails.
pub async fn verify(password: String, hash: Option<String>) -> Result<bool, PasswordError> {
    let hash = hash.unwrap_or_default();
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?)
}
