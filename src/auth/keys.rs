// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Store
//!
//! Loaded once at startup and read-only afterwards:
//!
//! - the first-party RSA private key (PKCS#1 or PKCS#8 PEM) used for signing
//! - its public key, plus any `*.pub` files in `JWT_KEYS_DIR`, for verification
//! - the federated provider's public key
//!
//! Any missing or malformed file is fatal. Rotation means dropping the new
//! public key into the keys directory and restarting.

use std::fs;
use std::path::{Path, PathBuf};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::config::JwtConfig;

const PRIVATE_TAGS: [&str; 2] = ["RSA PRIVATE KEY", "PRIVATE KEY"];
const PUBLIC_TAGS: [&str; 2] = ["PUBLIC KEY", "RSA PUBLIC KEY"];

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("failed to read key file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed key {name}: {reason}")]
    Malformed { name: String, reason: String },
}

pub struct SigningKey {
    pub kid: String,
    pub key: EncodingKey,
}

pub struct VerifyingKey {
    pub kid: String,
    pub key: DecodingKey,
}

pub struct KeyStore {
    signing: SigningKey,
    verifying: Vec<VerifyingKey>,
    federated: DecodingKey,
}

impl KeyStore {
    /// Load every key named by the configuration.
    pub fn load(config: &JwtConfig) -> Result<Self, KeyStoreError> {
        let private_pem = read(&config.private_key_path)?;
        let public_pem = read(&config.public_key_path)?;
        let federated_pem = read(&config.auth0_public_key_path)?;

        let kid = key_id(&config.public_key_path);
        let mut store = Self::from_pem(&kid, &private_pem, &public_pem, &federated_pem)?;

        if let Some(dir) = &config.keys_dir {
            let entries = fs::read_dir(dir).map_err(|source| KeyStoreError::Read {
                path: dir.clone(),
                source,
            })?;
            let mut paths: Vec<PathBuf> = entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "pub"))
                .collect();
            paths.sort();
            for path in paths {
                let pem = read(&path)?;
                store.add_verifying_key(&key_id(&path), &pem)?;
            }
        }

        store.check_signing_pair()?;

        tracing::info!(
            signing_kid = %store.signing.kid,
            verifying_keys = store.verifying.len(),
            "loaded token keys"
        );
        Ok(store)
    }

    pub fn from_pem(
        kid: &str,
        private_pem: &[u8],
        public_pem: &[u8],
        federated_pem: &[u8],
    ) -> Result<Self, KeyStoreError> {
        check_tag("private key", private_pem, &PRIVATE_TAGS)?;
        let signing = EncodingKey::from_rsa_pem(private_pem).map_err(|e| malformed("private key", e))?;

        let federated = decoding_key("federated public key", federated_pem)?;
        let mut store = Self {
            signing: SigningKey {
                kid: kid.to_string(),
                key: signing,
            },
            verifying: Vec::new(),
            federated,
        };
        store.add_verifying_key(kid, public_pem)?;
        store.check_signing_pair()?;
        Ok(store)
    }

    /// The verifying key filed under the signing `kid` must accept what the
    /// signing key produces.
    fn check_signing_pair(&self) -> Result<(), KeyStoreError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.signing.kid.clone());
        let sample = serde_json::json!({ "sub": "key-check" });
        let token = jsonwebtoken::encode(&header, &sample, &self.signing.key)
            .map_err(|e| malformed("private key", e))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        let paired = self
            .verifying_keys(Some(&self.signing.kid))
            .into_iter()
            .any(|key| jsonwebtoken::decode::<serde_json::Value>(&token, key, &validation).is_ok());
        if !paired {
            return Err(KeyStoreError::Malformed {
                name: self.signing.kid.clone(),
                reason: "public key does not match the private key".to_string(),
            });
        }
        Ok(())
    }

    /// Accept tokens signed by another (typically older) key.
    ///
    /// A `kid` already present is replaced.
    pub fn add_verifying_key(&mut self, kid: &str, pem: &[u8]) -> Result<(), KeyStoreError> {
        let key = decoding_key(kid, pem)?;
        self.verifying.retain(|k| k.kid != kid);
        self.verifying.push(VerifyingKey {
            kid: kid.to_string(),
            key,
        });
        Ok(())
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    /// Candidate keys for a token: the one matching `kid`, or all of them.
    pub fn verifying_keys(&self, kid: Option<&str>) -> Vec<&DecodingKey> {
        match kid {
            Some(kid) => self
                .verifying
                .iter()
                .filter(|k| k.kid == kid)
                .map(|k| &k.key)
                .collect(),
            None => self.verifying.iter().map(|k| &k.key).collect(),
        }
    }

    pub fn federated_key(&self) -> &DecodingKey {
        &self.federated
    }
}

fn read(path: &Path) -> Result<Vec<u8>, KeyStoreError> {
    fs::read(path).map_err(|source| KeyStoreError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// `keys/2026-01.pub` -> `2026-01`, `jwtRS256.key.pub` -> `jwtRS256`.
fn key_id(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("default");
    name.split('.').next().unwrap_or(name).to_string()
}

fn check_tag(name: &str, pem_bytes: &[u8], allowed: &[&str]) -> Result<(), KeyStoreError> {
    let parsed = pem::parse(pem_bytes).map_err(|e| malformed(name, e))?;
    if !allowed.contains(&parsed.tag()) {
        return Err(KeyStoreError::Malformed {
            name: name.to_string(),
            reason: format!("unexpected PEM block {:?}", parsed.tag()),
        });
    }
    Ok(())
}

fn decoding_key(name: &str, pem_bytes: &[u8]) -> Result<DecodingKey, KeyStoreError> {
    check_tag(name, pem_bytes, &PUBLIC_TAGS)?;
    DecodingKey::from_rsa_pem(pem_bytes).map_err(|e| malformed(name, e))
}

fn malformed(name: &str, err: impl std::fmt::Display) -> KeyStoreError {
    KeyStoreError::Malformed {
        name: name.to_string(),
        reason: err.to_string(),
    }
}
