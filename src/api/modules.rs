// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mount point for the genomics module handlers.
//!
//! The gateway does not implement the modules itself. The embedding binary
//! registers them here and [`super::router`] mounts them under `/modules`:
//! public routes as-is, restricted routes behind an `ACCESS` bearer token
//! and the `RDF` role.

use axum::{
    middleware::from_fn_with_state,
    routing::MethodRouter,
    Router,
};
use tower::ServiceBuilder;

use crate::auth::claims::TokenKind;
use crate::auth::middleware::{jwt, require_kind, require_roles, RoleGate};
use crate::auth::Role;
use crate::state::AppState;

/// Module routes, split by access level. Paths are relative to `/modules`.
#[derive(Default)]
pub struct ModuleRoutes {
    public: Router<AppState>,
    restricted: Router<AppState>,
    restricted_count: usize,
    public_count: usize,
}

impl ModuleRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route open to anyone.
    pub fn public(mut self, path: &str, route: MethodRouter<AppState>) -> Self {
        self.public = self.public.route(path, route);
        self.public_count += 1;
        self
    }

    /// Route that needs an `ACCESS` token carrying `RDF` (or `ADMIN`).
    pub fn restricted(mut self, path: &str, route: MethodRouter<AppState>) -> Self {
        self.restricted = self.restricted.route(path, route);
        self.restricted_count += 1;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.public_count == 0 && self.restricted_count == 0
    }

    /// One router for `/modules`, or `None` when nothing was registered.
    pub(crate) fn into_router(self, state: &AppState) -> Option<Router<AppState>> {
        if self.is_empty() {
            return None;
        }
        let mut router = self.public;
        if self.restricted_count > 0 {
            let gated = self.restricted.route_layer(
                ServiceBuilder::new()
                    .layer(from_fn_with_state(state.clone(), jwt))
                    .layer(from_fn_with_state(TokenKind::Access, require_kind))
                    .layer(from_fn_with_state(RoleGate::any_of([Role::RDF]), require_roles)),
            );
            router = router.merge(gated);
        }
        Some(router)
    }
}
