// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Store
//!
//! Sessions live entirely in a cookie. The serialized [`SessionData`] is
//! encrypted with AES-256-GCM (`SESSION_ENCRYPTION_KEY`) and the result is
//! authenticated with HMAC-SHA256 (`SESSION_KEY`) together with the cookie
//! name and a timestamp:
//!
//! ```text
//! base64url(nonce || ciphertext) "." unix_ts "." base64url(hmac(name|ts|payload))
//! ```
//!
//! No tokens are ever stored in the session.

use std::time::Duration;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::models::PublicUser;

const NONCE_SIZE: usize = 12;

type HmacSha256 = Hmac<Sha256>;

/// What a session remembers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub auth_user: PublicUser,
    pub created_at: DateTime<Utc>,
    /// Fingerprint of the bearer token the session was opened with, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_fingerprint: Option<String>,
}

impl SessionData {
    pub fn new(auth_user: PublicUser) -> Self {
        Self {
            auth_user,
            created_at: Utc::now(),
            refresh_token_fingerprint: None,
        }
    }

    pub fn expires_at(&self, max_age: Duration) -> DateTime<Utc> {
        self.created_at + chrono::Duration::seconds(max_age.as_secs() as i64)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session")]
    Missing,

    #[error("session cookie is malformed")]
    Malformed,

    #[error("session signature is invalid")]
    BadSignature,

    #[error("session could not be decrypted")]
    Decrypt,

    #[error("session has expired")]
    Expired,

    #[error("invalid session key: {0}")]
    Key(String),

    #[error("failed to encode session: {0}")]
    Encode(String),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Key(_) | SessionError::Encode(_) => ApiError::internal(err.to_string()),
            other => ApiError::token_invalid(other.to_string()),
        }
    }
}

pub struct SessionStore {
    name: String,
    mac_key: Vec<u8>,
    cipher: Aes256Gcm,
    max_age: Duration,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        let cipher = Aes256Gcm::new_from_slice(&config.encryption_key)
            .map_err(|e| SessionError::Key(e.to_string()))?;
        <HmacSha256 as Mac>::new_from_slice(&config.key).map_err(|e| SessionError::Key(e.to_string()))?;
        Ok(Self {
            name: config.name.clone(),
            mac_key: config.key.clone(),
            cipher,
            max_age: config.max_age,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Encrypt and sign `data` into a cookie value.
    pub fn seal(&self, data: &SessionData) -> Result<String, SessionError> {
        let plaintext = serde_json::to_vec(data).map_err(|e| SessionError::Encode(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|e| SessionError::Encode(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        let payload = Base64UrlUnpadded::encode_string(&sealed);
        let timestamp = Utc::now().timestamp();
        let mac = self.mac(timestamp, &payload)?.finalize().into_bytes();
        Ok(format!(
            "{payload}.{timestamp}.{}",
            Base64UrlUnpadded::encode_string(&mac)
        ))
    }

    /// Verify, decrypt and check the age of a cookie value.
    pub fn open(&self, value: &str) -> Result<SessionData, SessionError> {
        let mut parts = value.split('.');
        let (Some(payload), Some(timestamp), Some(mac), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SessionError::Malformed);
        };
        let timestamp: i64 = timestamp.parse().map_err(|_| SessionError::Malformed)?;
        let tag = Base64UrlUnpadded::decode_vec(mac).map_err(|_| SessionError::Malformed)?;
        self.mac(timestamp, payload)?
            .verify_slice(&tag)
            .map_err(|_| SessionError::BadSignature)?;

        let sealed = Base64UrlUnpadded::decode_vec(payload).map_err(|_| SessionError::Malformed)?;
        if sealed.len() <= NONCE_SIZE {
            return Err(SessionError::Malformed);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SessionError::Decrypt)?;
        let data: SessionData =
            serde_json::from_slice(&plaintext).map_err(|_| SessionError::Malformed)?;

        if Utc::now() > data.expires_at(self.max_age) {
            return Err(SessionError::Expired);
        }
        Ok(data)
    }

    /// Session cookie carrying `data`.
    pub fn cookie(&self, data: &SessionData) -> Result<Cookie<'static>, SessionError> {
        let value = self.seal(data)?;
        Ok(Cookie::build((self.name.clone(), value))
            .path("/")
            .max_age(time::Duration::seconds(self.max_age.as_secs() as i64))
            .http_only(true)
            .secure(true)
            .same_site(SameSite::None)
            .build())
    }

    /// Cookie to hand to [`CookieJar::remove`] on sign-out.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), String::new()))
            .path("/")
            .http_only(true)
            .secure(true)
            .same_site(SameSite::None)
            .build()
    }

    /// Read the session from a request's cookies.
    pub fn read(&self, jar: &CookieJar) -> Result<SessionData, SessionError> {
        let cookie = jar.get(&self.name).ok_or(SessionError::Missing)?;
        self.open(cookie.value())
    }

    fn mac(&self, timestamp: i64, payload: &str) -> Result<HmacSha256, SessionError> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.mac_key).map_err(|e| SessionError::Key(e.to_string()))?;
        mac.update(self.name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b"|");
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}
