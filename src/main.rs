// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use edb_server::{
    api::{self, ModuleRoutes},
    auth::KeyStore,
    config::{AppEnv, Config},
    directory::InMemoryDirectory,
    mail::{EmailPublisher, InMemoryMailer, RedisEmailPublisher},
    state::AppState,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the process environment wins anyway.
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.app_env);

    let keys = match KeyStore::load(&config.jwt) {
        Ok(keys) => keys,
        Err(err) => {
            tracing::error!(error = %err, "cannot load token keys");
            return ExitCode::FAILURE;
        }
    };

    let mailer: Arc<dyn EmailPublisher> = match &config.redis {
        Some(redis) => match RedisEmailPublisher::connect(redis).await {
            Ok(publisher) => {
                tracing::info!(addr = %redis.addr, channel = %redis.channel, "email queue connected");
                Arc::new(publisher)
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot connect to the email queue");
                return ExitCode::FAILURE;
            }
        },
        None => {
            tracing::warn!("REDIS_ADDR is not set; emails are logged, not queued");
            Arc::new(InMemoryMailer::new())
        }
    };

    tracing::warn!("using the in-memory user directory; accounts are lost on restart");
    let users = Arc::new(InMemoryDirectory::new());

    let addr = format!("{}:{}", config.host, config.port);
    let name = config.app_name.clone();
    let version = config.version.clone();
    let state = match AppState::new(config, keys, users, mailer) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "cannot initialise session store");
            return ExitCode::FAILURE;
        }
    };
    let app = api::router(state, ModuleRoutes::new());

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "cannot bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, %name, %version, "listening (docs at /docs)");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;
    if let Err(err) = served {
        tracing::error!(error = %err, "server failed");
        return ExitCode::FAILURE;
    }
    tracing::info!("shutdown complete");
    ExitCode::SUCCESS
}

fn init_tracing(env: AppEnv) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match env {
        AppEnv::Development => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
        AppEnv::Production => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
