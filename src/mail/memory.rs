// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Publisher that keeps emails in memory.
//!
//! Used when no message bus is configured (local development) and by tests,
//! which inspect [`InMemoryMailer::sent`].

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EmailPublisher, EmailType, MailError, QueueEmail};

#[derive(Default)]
pub struct InMemoryMailer {
    sent: Mutex<Vec<QueueEmail>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<QueueEmail> {
        self.sent.lock().await.clone()
    }

    /// Most recent email of `email_type` sent to `to`.
    pub async fn last(&self, to: &str, email_type: EmailType) -> Option<QueueEmail> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|e| e.to == to && e.email_type == email_type)
            .cloned()
    }
}

#[async_trait]
impl EmailPublisher for InMemoryMailer {
    async fn publish(&self, email: &QueueEmail) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            email_type = ?email.email_type,
            "email recorded (no message bus configured)"
        );
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}
