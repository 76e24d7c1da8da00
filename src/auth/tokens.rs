// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Token Codec
//!
//! Mints and verifies RS256 tokens. First-party tokens are signed with the
//! configured private key and verified against every first-party public key
//! (selected by `kid` when the header names one). Federated tokens are only
//! ever verified, against the provider's key and issuer.
//!
//! The codec checks signature, expiry and issuer. The token kind is checked by
//! the consumer; see [`TokenCodec::verify_kind`].

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};
use uuid::Uuid;

use super::claims::{FederatedClaims, TokenClaims, TokenKind};
use super::error::AuthError;
use super::keys::KeyStore;
use super::roles::RoleClaim;
use crate::config::{Config, TokenTtls};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

pub struct TokenCodec {
    keys: Arc<KeyStore>,
    issuer: String,
    ttls: TokenTtls,
    federated_issuer: String,
    federated_audience: Option<String>,
}

impl TokenCodec {
    pub fn new(keys: Arc<KeyStore>, config: &Config) -> Self {
        Self {
            keys,
            issuer: config.jwt.issuer.clone(),
            ttls: config.ttls,
            federated_issuer: config.jwt.auth0_issuer.clone(),
            federated_audience: config.jwt.auth0_audience.clone(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Mint a token of `kind`; the lifetime comes from the kind.
    pub fn mint(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        roles: Option<&RoleClaim>,
        otp: Option<String>,
        redirect_url: Option<String>,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let ttl = kind.ttl(&self.ttls).as_secs() as i64;
        let claims = TokenClaims {
            user_id,
            kind,
            roles: roles.cloned(),
            otp,
            redirect_url,
            iat: now,
            exp: now + ttl,
            iss: self.issuer.clone(),
            jti: Uuid::new_v4(),
        };
        self.sign(&claims)
    }

    pub fn access_token(&self, user_id: Uuid, roles: &RoleClaim) -> Result<String, AuthError> {
        self.mint(TokenKind::Access, user_id, Some(roles), None, None)
    }

    pub fn refresh_token(&self, user_id: Uuid, roles: &RoleClaim) -> Result<String, AuthError> {
        self.mint(TokenKind::Refresh, user_id, Some(roles), None, None)
    }

    /// Sign arbitrary claims with the current signing key.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        let signing = self.keys.signing_key();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(signing.kid.clone());
        encode(&header, claims, &signing.key).map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify a first-party token.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let candidates = self.keys.verifying_keys(header.kid.as_deref());
        if candidates.is_empty() {
            return Err(AuthError::NoMatchingKey);
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_aud = false;

        let mut last = AuthError::InvalidSignature;
        for key in candidates {
            match decode::<TokenClaims>(token, key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => match AuthError::from(e) {
                    AuthError::InvalidSignature => last = AuthError::InvalidSignature,
                    other => return Err(other),
                },
            }
        }
        Err(last)
    }

    /// Verify a first-party token and assert its kind.
    pub fn verify_kind(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, KindError> {
        let claims = self.verify(token).map_err(KindError::Invalid)?;
        if claims.kind != expected {
            return Err(KindError::WrongKind {
                expected,
                actual: claims.kind,
            });
        }
        Ok(claims)
    }

    /// Verify a token issued by the federated identity provider.
    pub fn verify_federated(&self, token: &str) -> Result<FederatedClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[self.federated_issuer.as_str()]);
        match &self.federated_audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }

        let data = decode::<FederatedClaims>(token, self.keys.federated_key(), &validation)?;
        Ok(data.claims)
    }
}

/// Outcome of [`TokenCodec::verify_kind`] when it fails.
#[derive(Debug, thiserror::Error)]
pub enum KindError {
    #[error(transparent)]
    Invalid(AuthError),

    #[error("expected a {expected} token, got {actual}")]
    WrongKind {
        expected: TokenKind,
        actual: TokenKind,
    },
}

impl From<KindError> for crate::error::ApiError {
    fn from(err: KindError) -> Self {
        match err {
            KindError::Invalid(e) => e.into(),
            KindError::WrongKind { expected, actual } => {
                tracing::debug!(%expected, %actual, "token kind mismatch");
                crate::error::ApiError::wrong_token_type()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::Role;
    use crate::testutil::{
        federated_token, test_codec, test_config, FEDERATED_PRIVATE_KEY, ROTATED_PRIVATE_KEY,
        ROTATED_PUBLIC_KEY,
    };
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::EncodingKey;

    fn roles() -> RoleClaim {
        RoleClaim::new([Role::SIGNIN, Role::RDF])
    }

    #[test]
    fn mint_then_verify() {
        let codec = test_codec();
        let user = Uuid::new_v4();
        let token = codec.access_token(user, &roles()).unwrap();

        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.role_claim(), roles());
        assert_eq!(claims.iss, "edb");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn header_names_the_signing_kid() {
        let codec = test_codec();
        let token = codec.refresh_token(Uuid::new_v4(), &roles()).unwrap();
        let header = decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("jwtRS256"));
        assert_eq!(header.alg, Algorithm::RS256);
    }

    #[test]
    fn tokens_minted_together_differ() {
        let codec = test_codec();
        let user = Uuid::new_v4();
        let a = codec.access_token(user, &roles()).unwrap();
        let b = codec.access_token(user, &roles()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = test_codec();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            user_id: Uuid::new_v4(),
            kind: TokenKind::Access,
            roles: None,
            otp: None,
            redirect_url: None,
            iat: now - 7200,
            exp: now - 3600,
            iss: "edb".into(),
            jti: Uuid::new_v4(),
        };
        let token = codec.sign(&claims).unwrap();
        assert!(matches!(codec.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let codec = test_codec();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            user_id: Uuid::new_v4(),
            kind: TokenKind::Access,
            roles: None,
            otp: None,
            redirect_url: None,
            iat: now,
            exp: now + 60,
            iss: "someone-else".into(),
            jti: Uuid::new_v4(),
        };
        let token = codec.sign(&claims).unwrap();
        assert!(matches!(codec.verify(&token), Err(AuthError::InvalidIssuer)));
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let codec = test_codec();
        let token = codec.access_token(Uuid::new_v4(), &roles()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["roles"] = "ADMIN".into();
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(matches!(codec.verify(&forged), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = test_codec();
        assert!(matches!(codec.verify("not.a.token"), Err(AuthError::MalformedToken)));
        assert!(matches!(codec.verify(""), Err(AuthError::MalformedToken)));
    }

    #[test]
    fn unknown_kind_is_malformed() {
        let codec = test_codec();
        let token = codec.access_token(Uuid::new_v4(), &roles()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["kind"] = "SUPER".into();

        let key = EncodingKey::from_rsa_pem(crate::testutil::FIRST_PARTY_PRIVATE_KEY.as_bytes())
            .unwrap();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("jwtRS256".into());
        let token = encode(&header, &payload, &key).unwrap();
        assert!(matches!(codec.verify(&token), Err(AuthError::MalformedToken)));
    }

    #[test]
    fn verify_kind_rejects_other_kinds() {
        let codec = test_codec();
        let token = codec.refresh_token(Uuid::new_v4(), &roles()).unwrap();
        assert!(codec.verify_kind(&token, TokenKind::Refresh).is_ok());
        for kind in TokenKind::ALL.into_iter().filter(|k| *k != TokenKind::Refresh) {
            assert!(matches!(
                codec.verify_kind(&token, kind),
                Err(KindError::WrongKind { .. })
            ));
        }
    }

    #[test]
    fn federated_token_does_not_verify_as_first_party() {
        let codec = test_codec();
        let token = federated_token("a@x.org", true);
        assert!(codec.verify_federated(&token).is_ok());
        assert!(codec.verify(&token).is_err());
    }

    #[test]
    fn first_party_token_does_not_verify_as_federated() {
        let codec = test_codec();
        let token = codec.access_token(Uuid::new_v4(), &roles()).unwrap();
        assert!(codec.verify_federated(&token).is_err());
    }

    #[test]
    fn federated_issuer_is_checked() {
        let codec = test_codec();
        let now = Utc::now().timestamp();
        let claims = FederatedClaims {
            sub: "auth0|1".into(),
            email: Some("a@x.org".into()),
            email_verified: true,
            name: None,
            aud: None,
            iss: "https://evil.example/".into(),
            exp: now + 300,
            iat: Some(now),
        };
        let key = EncodingKey::from_rsa_pem(FEDERATED_PRIVATE_KEY.as_bytes()).unwrap();
        let token = encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap();
        assert!(matches!(
            codec.verify_federated(&token),
            Err(AuthError::InvalidIssuer)
        ));
    }

    #[test]
    fn rotated_key_still_verifies() {
        let mut keys = crate::testutil::test_keys();
        keys.add_verifying_key("2025-12", ROTATED_PUBLIC_KEY.as_bytes())
            .unwrap();
        let codec = TokenCodec::new(Arc::new(keys), &test_config());

        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            user_id: Uuid::new_v4(),
            kind: TokenKind::Access,
            roles: None,
            otp: None,
            redirect_url: None,
            iat: now,
            exp: now + 300,
            iss: "edb".into(),
            jti: Uuid::new_v4(),
        };
        let old_key = EncodingKey::from_rsa_pem(ROTATED_PRIVATE_KEY.as_bytes()).unwrap();

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("2025-12".into());
        let with_kid = encode(&header, &claims, &old_key).unwrap();
        assert_eq!(codec.verify(&with_kid).unwrap().user_id, claims.user_id);

        let without_kid = encode(&Header::new(Algorithm::RS256), &claims, &old_key).unwrap();
        assert!(codec.verify(&without_kid).is_ok());

        header.kid = Some("retired-long-ago".into());
        let unknown_kid = encode(&header, &claims, &old_key).unwrap();
        assert!(matches!(codec.verify(&unknown_kid), Err(AuthError::NoMatchingKey)));
    }
}
