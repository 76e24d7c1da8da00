// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Redis pub/sub publisher.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{EmailPublisher, MailError, QueueEmail};
use crate::config::RedisConfig;

/// `PUBLISH`es each record on the configured channel. The connection manager
/// reconnects on its own and is cheap to clone per call.
#[derive(Clone)]
pub struct RedisEmailPublisher {
    conn: ConnectionManager,
    channel: String,
}

impl RedisEmailPublisher {
    pub async fn connect(config: &RedisConfig) -> Result<Self, MailError> {
        let client = redis::Client::open(config.url())?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(addr = %config.addr, channel = %config.channel, "connected to email queue");
        Ok(Self {
            conn,
            channel: config.channel.clone(),
        })
    }
}

#[async_trait]
impl EmailPublisher for RedisEmailPublisher {
    async fn publish(&self, email: &QueueEmail) -> Result<(), MailError> {
        let payload = serde_json::to_string(email)?;
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&self.channel, payload).await?;
        if receivers == 0 {
            tracing::warn!(channel = %self.channel, "email published but no consumer is listening");
        }
        Ok(())
    }
}
