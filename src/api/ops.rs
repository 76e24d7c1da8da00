// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operational endpoints: build metadata, client info and liveness.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{request::Parts, HeaderMap},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{DataResponse, MessageResp};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct AboutResp {
    pub name: String,
    pub version: String,
    pub updated: String,
    pub copyright: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfoResp {
    pub arch: String,
    pub ip_addr: String,
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded
        .or(real)
        .map(String::from)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_default()
}

#[utoipa::path(
    get,
    path = "/about",
    tag = "Ops",
    responses((status = 200, description = "Build metadata", body = AboutResp))
)]
pub async fn about(State(state): State<AppState>) -> Json<AboutResp> {
    let config = &state.config;
    Json(AboutResp {
        name: config.app_name.clone(),
        version: config.version.clone(),
        updated: config.updated.clone(),
        copyright: config.copyright.clone(),
    })
}

#[utoipa::path(
    get,
    path = "/info",
    tag = "Ops",
    responses((status = 200, description = "Server architecture and client address", body = DataResponse<InfoResp>))
)]
pub async fn info(parts: Parts) -> Json<DataResponse<InfoResp>> {
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    Json(DataResponse::new(InfoResp {
        arch: std::env::consts::ARCH.to_string(),
        ip_addr: client_ip(&parts.headers, peer),
    }))
}

#[utoipa::path(
    get,
    path = "/ping",
    tag = "Ops",
    responses((status = 200, description = "Service is alive", body = MessageResp))
)]
pub async fn ping() -> Json<MessageResp> {
    Json(MessageResp::new("pong"))
}
