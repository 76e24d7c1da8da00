// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! First-party tokens, federated tokens and cookie sessions for the EDB
//! gateway.
//!
//! ## Auth Flow
//!
//! 1. A client signs in (password, magic link, federated token or API key)
//! 2. The gateway answers with a `REFRESH` token (and usually an `ACCESS`
//!    token), or installs an encrypted session cookie
//! 3. Protected routes run, in order:
//!    - bearer verification (first-party or federated key)
//!    - token kind assertion
//!    - role assertion (`ADMIN` passes every gate)
//!
//! ## Security
//!
//! - Tokens are RS256 with a `kid` header; verification accepts every
//!   configured first-party public key
//! - One-time tokens carry a passcode derived from the user's password hash
//!   and verification state, so they expire as soon as either changes
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod keys;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod roles;
pub mod session;
pub mod tokens;
pub mod validator;

pub use claims::{FederatedClaims, TokenClaims, TokenKind};
pub use error::AuthError;
pub use extractor::{ApiJson, Auth, CurrentSession, Federated};
pub use keys::KeyStore;
pub use roles::{Role, RoleClaim};
pub use tokens::TokenCodec;
pub use validator::Validator;

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of an API key. Only fingerprints are stored.
pub fn fingerprint(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// Fresh opaque API key.
pub fn new_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("edb_{}", Base64UrlUnpadded::encode_string(&bytes))
}
