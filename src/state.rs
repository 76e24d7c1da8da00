// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::keys::KeyStore;
use crate::auth::session::{SessionError, SessionStore};
use crate::auth::tokens::TokenCodec;
use crate::config::Config;
use crate::directory::{DeadlineDirectory, UserDirectory};
use crate::mail::{self, EmailPublisher, QueueEmail};

/// Shared, read-only handles used by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenCodec>,
    pub sessions: Arc<SessionStore>,
    pub users: Arc<dyn UserDirectory>,
    pub mailer: Arc<dyn EmailPublisher>,
}

impl AppState {
    /// Wire up the state. The directory is wrapped so every call carries the
    /// configured deadline.
    pub fn new(
        config: Config,
        keys: KeyStore,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn EmailPublisher>,
    ) -> Result<Self, SessionError> {
        let tokens = Arc::new(TokenCodec::new(Arc::new(keys), &config));
        let sessions = Arc::new(SessionStore::new(&config.session)?);
        let users: Arc<dyn UserDirectory> =
            Arc::new(DeadlineDirectory::new(users, config.dependency_timeout));
        Ok(Self {
            config: Arc::new(config),
            tokens,
            sessions,
            users,
            mailer,
        })
    }

    /// Queue an email; failures are logged only.
    pub async fn send_email(&self, email: QueueEmail) {
        mail::deliver(self.mailer.as_ref(), &email, self.config.dependency_timeout).await;
    }
}
