// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once at startup. `consts.env` and `version.env` are
//! loaded first (if present) so deployments can keep static values on disk,
//! then the process environment is consulted. Any invalid value aborts
//! startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `NAME` / `APP_NAME` | Service and product names (`/about`) | `edb-server` / `edb` |
//! | `VERSION` / `UPDATED` / `COPYRIGHT` | Release metadata (`/about`) | crate version / empty / empty |
//! | `APP_URL` | Base URL for links placed in emails | `http://localhost:3000` |
//! | `APP_DOMAIN` | Host suffix allowed in passwordless redirects | empty (no check) |
//! | `APP_ENV` | `development` switches to pretty logs | `production` |
//! | `HOST` / `PORT` | Bind address | `0.0.0.0` / `8080` |
//! | `REDIS_ADDR` | Email bus address (`host:port`); empty logs emails instead | empty |
//! | `REDIS_USERNAME` / `REDIS_PASSWORD` | Email bus credentials | empty |
//! | `EMAIL_QUEUE_CHANNEL` | Channel email records are published on | `email-queue` |
//! | `SESSION_NAME` | Session cookie name | `edb-session` |
//! | `SESSION_KEY` | HMAC key, exactly 64 bytes | Required |
//! | `SESSION_ENCRYPTION_KEY` | AES key, exactly 32 bytes | Required |
//! | `PASSWORDLESS_TOKEN_TTL_MINS` | Magic link lifetime | `10` |
//! | `ACCESS_TOKEN_TTL_MINS` | Access token lifetime | `15` |
//! | `OTP_TOKEN_TTL_MINS` | OTP token lifetime | `20` |
//! | `SHORT_TTL_MINS` | Verify / reset / change-email token lifetime | `10` |
//! | `REFRESH_TOKEN_TTL_HOURS` | Refresh token lifetime | `168` |
//! | `JWT_ISSUER` | Issuer of first-party tokens | `edb` |
//! | `JWT_PRIVATE_KEY` / `JWT_PUBLIC_KEY` | First-party PEM files | `jwtRS256.key` / `jwtRS256.key.pub` |
//! | `JWT_KEYS_DIR` | Extra `*.pub` verification keys (rotation) | unset |
//! | `AUTH0_PUBLIC_KEY` | Federated provider PEM file | `auth0.key.pub` |
//! | `AUTH0_ISSUER` | Expected federated issuer | Required |
//! | `AUTH0_AUDIENCE` | Expected federated audience | unset (not checked) |
//! | `CORS_ORIGINS` | Comma-separated allowed origins | `http://localhost:3000,http://localhost:8000` |
//! | `DEPENDENCY_TIMEOUT_MS` | Deadline for directory and queue calls | `5000` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const SESSION_KEY_LEN: usize = 64;
pub const SESSION_ENCRYPTION_KEY_LEN: usize = 32;

/// Sessions live for seven days.
pub const SESSION_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("development") {
            AppEnv::Development
        } else {
            AppEnv::Production
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub addr: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub channel: String,
}

impl RedisConfig {
    /// Connection URL understood by the `redis` crate.
    pub fn url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!("redis://{user}:{pass}@{}/0", self.addr),
            (None, Some(pass)) => format!("redis://:{pass}@{}/0", self.addr),
            _ => format!("redis://{}/0", self.addr),
        }
    }
}

#[derive(Clone)]
pub struct SessionConfig {
    pub name: String,
    pub key: Vec<u8>,
    pub encryption_key: Vec<u8>,
    pub max_age: Duration,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("name", &self.name)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

/// Lifetimes per token kind.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtls {
    pub passwordless: Duration,
    pub access: Duration,
    pub otp: Duration,
    pub short: Duration,
    pub refresh: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            passwordless: minutes(10),
            access: minutes(15),
            otp: minutes(20),
            short: minutes(10),
            refresh: Duration::from_secs(168 * 3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub keys_dir: Option<PathBuf>,
    pub auth0_public_key_path: PathBuf,
    pub auth0_issuer: String,
    pub auth0_audience: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub app_name: String,
    pub app_url: Url,
    pub app_domain: String,
    pub version: String,
    pub updated: String,
    pub copyright: String,
    pub app_env: AppEnv,
    pub host: String,
    pub port: u16,
    pub redis: Option<RedisConfig>,
    pub email_channel: String,
    pub session: SessionConfig,
    pub ttls: TokenTtls,
    pub jwt: JwtConfig,
    pub cors_origins: Vec<String>,
    pub dependency_timeout: Duration,
}

impl Config {
    /// Load `consts.env` / `version.env` and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        for file in ["consts.env", "version.env"] {
            if dotenvy::from_filename(file).is_ok() {
                tracing::debug!(file, "loaded environment file");
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let app_url = or("APP_URL", "http://localhost:3000");
        let app_url = Url::parse(&app_url).map_err(|e| ConfigError::Invalid {
            name: "APP_URL",
            reason: e.to_string(),
        })?;

        let session_key = get("SESSION_KEY").ok_or(ConfigError::Missing("SESSION_KEY"))?;
        let session_key = exact_len("SESSION_KEY", session_key, SESSION_KEY_LEN)?;
        let encryption_key =
            get("SESSION_ENCRYPTION_KEY").ok_or(ConfigError::Missing("SESSION_ENCRYPTION_KEY"))?;
        let encryption_key = exact_len(
            "SESSION_ENCRYPTION_KEY",
            encryption_key,
            SESSION_ENCRYPTION_KEY_LEN,
        )?;

        let defaults = TokenTtls::default();
        let ttls = TokenTtls {
            passwordless: minutes(parse_num(
                "PASSWORDLESS_TOKEN_TTL_MINS",
                get("PASSWORDLESS_TOKEN_TTL_MINS"),
                defaults.passwordless.as_secs() / 60,
            )?),
            access: minutes(parse_num(
                "ACCESS_TOKEN_TTL_MINS",
                get("ACCESS_TOKEN_TTL_MINS"),
                defaults.access.as_secs() / 60,
            )?),
            otp: minutes(parse_num(
                "OTP_TOKEN_TTL_MINS",
                get("OTP_TOKEN_TTL_MINS"),
                defaults.otp.as_secs() / 60,
            )?),
            short: minutes(parse_num(
                "SHORT_TTL_MINS",
                get("SHORT_TTL_MINS"),
                defaults.short.as_secs() / 60,
            )?),
            refresh: Duration::from_secs(
                parse_num(
                    "REFRESH_TOKEN_TTL_HOURS",
                    get("REFRESH_TOKEN_TTL_HOURS"),
                    defaults.refresh.as_secs() / 3600,
                )? * 3600,
            ),
        };

        let email_channel = or("EMAIL_QUEUE_CHANNEL", "email-queue");
        let redis = get("REDIS_ADDR").map(|addr| RedisConfig {
            addr,
            username: get("REDIS_USERNAME"),
            password: get("REDIS_PASSWORD"),
            channel: email_channel.clone(),
        });

        let port = parse_num("PORT", get("PORT"), 8080)?;
        let port = u16::try_from(port).map_err(|_| ConfigError::Invalid {
            name: "PORT",
            reason: format!("{port} is out of range"),
        })?;

        let jwt = JwtConfig {
            issuer: or("JWT_ISSUER", "edb"),
            private_key_path: or("JWT_PRIVATE_KEY", "jwtRS256.key").into(),
            public_key_path: or("JWT_PUBLIC_KEY", "jwtRS256.key.pub").into(),
            keys_dir: get("JWT_KEYS_DIR").map(PathBuf::from),
            auth0_public_key_path: or("AUTH0_PUBLIC_KEY", "auth0.key.pub").into(),
            auth0_issuer: get("AUTH0_ISSUER").ok_or(ConfigError::Missing("AUTH0_ISSUER"))?,
            auth0_audience: get("AUTH0_AUDIENCE"),
        };

        let cors_origins = or("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            name: or("NAME", "edb-server"),
            app_name: or("APP_NAME", "edb"),
            app_url,
            app_domain: or("APP_DOMAIN", ""),
            version: or("VERSION", env!("CARGO_PKG_VERSION")),
            updated: or("UPDATED", ""),
            copyright: or("COPYRIGHT", ""),
            app_env: AppEnv::parse(&or("APP_ENV", "production")),
            host: or("HOST", "0.0.0.0"),
            port,
            redis,
            email_channel,
            session: SessionConfig {
                name: or("SESSION_NAME", "edb-session"),
                key: session_key,
                encryption_key,
                max_age: SESSION_MAX_AGE,
            },
            ttls,
            jwt,
            cors_origins,
            dependency_timeout: Duration::from_millis(parse_num(
                "DEPENDENCY_TIMEOUT_MS",
                get("DEPENDENCY_TIMEOUT_MS"),
                5000,
            )?),
        })
    }

    /// Absolute link under `APP_URL`.
    pub fn link(&self, path: &str) -> String {
        self.app_url
            .join(path)
            .map(String::from)
            .unwrap_or_else(|_| format!("{}{}", self.app_url, path.trim_start_matches('/')))
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

fn parse_num(name: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("expected a whole number, got {raw:?}"),
        }),
    }
}

fn exact_len(name: &'static str, value: String, len: usize) -> Result<Vec<u8>, ConfigError> {
    let bytes = value.into_bytes();
    if bytes.len() != len {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("must be exactly {len} bytes, got {}", bytes.len()),
        });
    }
    Ok(bytes)
}
