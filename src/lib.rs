// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EDB Server - authentication gateway for the EDB genomics services.
//!
//! Users sign in with a password, a magic link, an API key or a token from
//! the federated identity provider, and receive signed tokens or an encrypted
//! session cookie. Protected routes check token kind and roles before the
//! genomics module handlers run.
//!
//! ## Modules
//!
//! - `api` - HTTP routes and the global middleware stack (Axum)
//! - `auth` - Token codec, keys, roles, sessions, request filters
//! - `directory` - User directory interface and the in-memory backend
//! - `mail` - Email queue records and publishers (Redis pub/sub)

pub mod api;
pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod mail;
pub mod models;
pub mod state;

#[cfg(test)]
mod testutil;
