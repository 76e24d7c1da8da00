// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Email Queue
//!
//! Emails are not sent here. A JSON [`QueueEmail`] record is published on a
//! channel and a separate consumer renders and delivers it:
//!
//! ```json
//! { "name": "Ada", "to": "ada@example.org", "token": "...", "emailType": "verify",
//!   "ttl": "10 minutes", "linkUrl": "https://edb.example.org/account/verify" }
//! ```
//!
//! Publishing failures never fail a request; see [`deliver`].

mod memory;
mod redis;

pub use self::memory::InMemoryMailer;
pub use self::redis::RedisEmailPublisher;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AuthUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Verify,
    PasswordReset,
    PasswordUpdated,
    Passwordless,
    EmailChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEmail {
    pub name: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub email_type: EmailType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
}

impl QueueEmail {
    pub fn new(email_type: EmailType, user: &AuthUser) -> Self {
        Self {
            name: user.display_name().to_string(),
            to: user.email.clone(),
            token: None,
            email_type,
            ttl: None,
            link_url: None,
        }
    }

    /// Send to an address other than the user's current one.
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to = address.into();
        self
    }

    pub fn with_token(mut self, token: String, ttl: Duration) -> Self {
        self.token = Some(token);
        self.ttl = Some(format_ttl(ttl));
        self
    }

    pub fn with_link(mut self, url: impl Into<String>) -> Self {
        self.link_url = Some(url.into());
        self
    }
}

/// `600s` -> `"10 minutes"`, `3600s` -> `"1 hour"`.
pub fn format_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    let (n, unit) = if secs >= 86_400 && secs % 86_400 == 0 {
        (secs / 86_400, "day")
    } else if secs >= 3_600 && secs % 3_600 == 0 {
        (secs / 3_600, "hour")
    } else {
        ((secs / 60).max(1), "minute")
    };
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to encode email: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("message bus error: {0}")]
    Bus(#[from] ::redis::RedisError),

    #[error("publishing timed out")]
    Timeout,
}

#[async_trait]
pub trait EmailPublisher: Send + Sync {
    async fn publish(&self, email: &QueueEmail) -> Result<(), MailError>;
}

/// Publish with a deadline. Failures are logged, not returned: the caller's
/// response must not reveal whether an email went out.
pub async fn deliver(publisher: &dyn EmailPublisher, email: &QueueEmail, timeout: Duration) {
    let outcome = match tokio::time::timeout(timeout, publisher.publish(email)).await {
        Ok(result) => result,
        Err(_) => Err(MailError::Timeout),
    };
    match outcome {
        Ok(()) => tracing::debug!(email_type = ?email.email_type, "email queued"),
        Err(err) => tracing::warn!(email_type = ?email.email_type, error = %err, "failed to queue email"),
    }
}
