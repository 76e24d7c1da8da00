// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time passcodes bound to live user state.
//!
//! The passcode is an HMAC-SHA256 keyed by the user's password hash over the
//! uuid, email and verification timestamp. Changing the password, the email
//! or the verification state changes the passcode, which invalidates every
//! outstanding token that carries the old one. Nothing is stored server side.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::models::AuthUser;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(user: &AuthUser) -> Option<HmacSha256> {
    // HMAC takes keys of any length, so this only fails in theory.
    let mut mac = HmacSha256::new_from_slice(user.password_hash.as_bytes()).ok()?;
    mac.update(user.uuid.as_bytes());
    mac.update(b"\0");
    mac.update(user.email.as_bytes());
    mac.update(b"\0");
    mac.update(user.email_verified_at.to_string().as_bytes());
    Some(mac)
}

/// Passcode for the user's current state.
pub fn derive(user: &AuthUser) -> String {
    mac_for(user)
        .map(|mac| Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Constant-time comparison of `otp` against the user's current passcode.
pub fn verify(user: &AuthUser, otp: &str) -> bool {
    let Ok(tag) = Base64UrlUnpadded::decode_vec(otp) else {
        return false;
    };
    mac_for(user).is_some_and(|mac| mac.verify_slice(&tag).is_ok())
}

/// Random value for tokens that are not bound to user state.
pub fn nonce() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}
