// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only user management.
//!
//! Every route here sits behind an `ACCESS` token whose role claim includes
//! `ADMIN`; the handlers assume the gate already ran.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::detached;
use crate::auth::{password, ApiJson, Auth, Role, RoleClaim};
use crate::directory::{DirectoryError, NewUser, UserUpdate};
use crate::error::ApiError;
use crate::models::{
    AdminAddUserBody, AdminUserUpdateBody, AuthUser, DataResponse, MessageResp, UserListQuery,
    UserStats, UserWithRoles,
};
use crate::state::AppState;

/// Largest page `POST /admin/users` returns.
const MAX_PAGE: usize = 1000;

fn role_claim(names: &[String]) -> RoleClaim {
    RoleClaim::new(names.iter().map(|name| Role::new(name)))
}

async fn with_roles(state: &AppState, user: AuthUser) -> Result<UserWithRoles, ApiError> {
    let roles = state.users.user_roles(user.uuid).await?;
    Ok(UserWithRoles {
        user: user.public(),
        roles: roles.roles().map(|r| r.as_str().to_string()).collect(),
    })
}

/// Roles the gateway itself knows about.
#[utoipa::path(
    get,
    path = "/admin/roles",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Known roles", body = DataResponse<Vec<String>>),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
    )
)]
pub async fn roles() -> Json<DataResponse<Vec<String>>> {
    Json(DataResponse::new(
        [Role::ADMIN, Role::RDF, Role::SIGNIN]
            .iter()
            .map(|r| r.as_str().to_string())
            .collect(),
    ))
}

/// Page through users in creation order.
#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "Admin",
    security(("bearer" = [])),
    request_body = UserListQuery,
    responses(
        (status = 200, description = "One page of users", body = DataResponse<Vec<UserWithRoles>>),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
    )
)]
pub async fn users(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DataResponse<Vec<UserWithRoles>>>, ApiError> {
    // An empty body asks for the first page.
    let query: UserListQuery = if body.iter().all(u8::is_ascii_whitespace) {
        UserListQuery::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::bad_request(format!("invalid request body: {err}")))?
    };
    let page = state
        .users
        .list_users(query.offset, query.records.min(MAX_PAGE))
        .await?;

    let mut out = Vec::with_capacity(page.len());
    for user in page {
        out.push(with_roles(&state, user).await?);
    }
    Ok(Json(DataResponse::new(out)))
}

#[utoipa::path(
    get,
    path = "/admin/users/stats",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User counts", body = DataResponse<UserStats>),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
    )
)]
pub async fn stats(State(state): State<AppState>) -> Result<Json<DataResponse<UserStats>>, ApiError> {
    let users = state.users.count_users().await?;
    Ok(Json(DataResponse::new(UserStats { users })))
}

/// Update any account. A new email is stored as verified; an empty password
/// leaves the current one.
#[utoipa::path(
    post,
    path = "/admin/users/update",
    tag = "Admin",
    security(("bearer" = [])),
    request_body = AdminUserUpdateBody,
    responses(
        (status = 200, description = "Updated user", body = DataResponse<UserWithRoles>),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
        (status = 404, description = "No such user", body = crate::error::ErrorBody),
        (status = 409, description = "Username or email taken", body = crate::error::ErrorBody),
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Auth(claims): Auth,
    ApiJson(body): ApiJson<AdminUserUpdateBody>,
) -> Result<Json<DataResponse<UserWithRoles>>, ApiError> {
    let current = state.users.find_user_by_uuid(body.uuid).await?;

    let username = body
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty() && u != &current.username);
    let email = body
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case(&current.email));
    ensure_free(&state, current.uuid, username.as_deref(), email.as_deref()).await?;

    let password_hash = match body.password.filter(|p| !p.is_empty()) {
        Some(password) => Some(password::hash(password).await?),
        None => None,
    };
    let roles = body.roles.map(|names| role_claim(&names));

    let users = state.users.clone();
    let uuid = current.uuid;
    let update = UserUpdate {
        username,
        first_name: body.first_name,
        last_name: body.last_name,
    };
    let user = detached(async move {
        if let Some(email) = email {
            users.set_email_address(uuid, email).await?;
            users.set_email_verified(uuid).await?;
        }
        let mut user = users.update_user(uuid, update).await?;
        if let Some(roles) = roles {
            users.set_user_roles(uuid, roles).await?;
        }
        if let Some(hash) = password_hash {
            user = users.set_password_hash(uuid, hash).await?;
        }
        Ok::<_, ApiError>(user)
    })
    .await?;

    tracing::info!(admin_id = %claims.user_id, user_id = %user.uuid, "admin updated user");
    Ok(Json(DataResponse::new(with_roles(&state, user).await?)))
}

/// Fail with `CONFLICT` before any write if another account holds the
/// username or email.
async fn ensure_free(
    state: &AppState,
    uuid: Uuid,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(name) = username {
        match state.users.find_user_by_username(name).await {
            Ok(other) if other.uuid != uuid => {
                return Err(ApiError::conflict("username already in use"))
            }
            Ok(_) | Err(DirectoryError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
    }
    if let Some(email) = email {
        match state.users.find_user_by_email(email).await {
            Ok(other) if other.uuid != uuid => {
                return Err(ApiError::conflict("email address already in use"))
            }
            Ok(_) | Err(DirectoryError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Create a verified account. Roles default to `SIGNIN`.
#[utoipa::path(
    post,
    path = "/admin/users/add",
    tag = "Admin",
    security(("bearer" = [])),
    request_body = AdminAddUserBody,
    responses(
        (status = 200, description = "Created user", body = DataResponse<UserWithRoles>),
        (status = 400, description = "Missing username or email", body = crate::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
        (status = 409, description = "Username or email taken", body = crate::error::ErrorBody),
    )
)]
pub async fn add_user(
    State(state): State<AppState>,
    Auth(claims): Auth,
    ApiJson(body): ApiJson<AdminAddUserBody>,
) -> Result<Json<DataResponse<UserWithRoles>>, ApiError> {
    let username = body.username.trim();
    let email = body.email.trim();
    if username.is_empty() || email.is_empty() {
        return Err(ApiError::bad_request("username and email are required"));
    }

    let password_hash = if body.password.is_empty() {
        String::new()
    } else {
        password::hash(body.password).await?
    };
    let roles = match role_claim(&body.roles) {
        roles if roles.is_empty() => RoleClaim::new([Role::SIGNIN]),
        roles => roles,
    };

    let user = state
        .users
        .create_user(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            first_name: body.first_name,
            last_name: body.last_name,
            password_hash,
            email_verified: true,
            roles,
        })
        .await?;
    tracing::info!(admin_id = %claims.user_id, user_id = %user.uuid, "admin created user");
    Ok(Json(DataResponse::new(with_roles(&state, user).await?)))
}

#[utoipa::path(
    delete,
    path = "/admin/users/delete/{uuid}",
    tag = "Admin",
    security(("bearer" = [])),
    params(("uuid" = Uuid, Path, description = "User to delete")),
    responses(
        (status = 200, description = "User deleted", body = DataResponse<MessageResp>),
        (status = 400, description = "Attempt to delete yourself", body = crate::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
        (status = 404, description = "No such user", body = crate::error::ErrorBody),
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Auth(claims): Auth,
    Path(uuid): Path<Uuid>,
) -> Result<Json<DataResponse<MessageResp>>, ApiError> {
    if uuid == claims.user_id {
        return Err(ApiError::bad_request("admins cannot delete their own account"));
    }
    state.users.delete_user(uuid).await?;
    tracing::info!(admin_id = %claims.user_id, user_id = %uuid, "admin deleted user");
    Ok(Json(DataResponse::new(MessageResp::new("user deleted"))))
}
