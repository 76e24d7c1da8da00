// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account endpoints for the bearer of an `ACCESS` token.

use axum::{extract::State, Json};

use crate::auth::{fingerprint, new_api_key, ApiJson, Auth};
use crate::directory::{DirectoryError, UserUpdate};
use crate::error::ApiError;
use crate::models::{ApiKeyResp, DataResponse, PublicUser, UserUpdateBody, UserWithRoles};
use crate::state::AppState;

/// The token subject with their current directory roles.
#[utoipa::path(
    post,
    path = "/auth/users",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User and roles", body = DataResponse<UserWithRoles>),
        (status = 401, description = "Missing, invalid or wrong kind of token", body = crate::error::ErrorBody),
    )
)]
pub async fn user(
    State(state): State<AppState>,
    Auth(claims): Auth,
) -> Result<Json<DataResponse<UserWithRoles>>, ApiError> {
    let user = match state.users.find_user_by_uuid(claims.user_id).await {
        Ok(user) => user,
        Err(DirectoryError::NotFound) => {
            return Err(ApiError::token_invalid("token subject does not exist"))
        }
        Err(err) => return Err(err.into()),
    };
    let roles = state.users.user_roles(user.uuid).await?;
    Ok(Json(DataResponse::new(UserWithRoles {
        user: user.public(),
        roles: roles.roles().map(|r| r.as_str().to_string()).collect(),
    })))
}

#[utoipa::path(
    post,
    path = "/auth/users/update",
    tag = "Users",
    security(("bearer" = [])),
    request_body = UserUpdateBody,
    responses(
        (status = 200, description = "Updated user", body = DataResponse<PublicUser>),
        (status = 401, description = "Missing, invalid or wrong kind of token", body = crate::error::ErrorBody),
        (status = 409, description = "Username taken", body = crate::error::ErrorBody),
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Auth(claims): Auth,
    ApiJson(body): ApiJson<UserUpdateBody>,
) -> Result<Json<DataResponse<PublicUser>>, ApiError> {
    let user = state
        .users
        .update_user(
            claims.user_id,
            UserUpdate {
                username: body.username,
                first_name: body.first_name,
                last_name: body.last_name,
            },
        )
        .await?;
    Ok(Json(DataResponse::new(user.public())))
}

/// Issue a new API key. Only its fingerprint is stored, so the key is shown
/// once.
#[utoipa::path(
    post,
    path = "/auth/users/api-keys",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "New API key", body = DataResponse<ApiKeyResp>),
        (status = 401, description = "Missing, invalid or wrong kind of token", body = crate::error::ErrorBody),
    )
)]
pub async fn new_api_key_for_user(
    State(state): State<AppState>,
    Auth(claims): Auth,
) -> Result<Json<DataResponse<ApiKeyResp>>, ApiError> {
    let key = new_api_key();
    state
        .users
        .add_api_key(claims.user_id, fingerprint(&key))
        .await?;
    tracing::info!(user_id = %claims.user_id, "api key issued");
    Ok(Json(DataResponse::new(ApiKeyResp { key })))
}

#[cfg(test)]
mod tests {
    use crate::auth::{Role, RoleClaim, TokenKind};
    use crate::testutil::{body_json, post_empty, post_json, set_cookie, test_state, TestUser};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn user_reports_directory_roles() {
        let t = test_state();
        let ada = t
            .create_user(TestUser::verified("a", "a@x.org").with_roles([Role::SIGNIN, Role::RDF]))
            .await;
        let token = t.access_token(&ada, &RoleClaim::new([Role::SIGNIN]));
        let response = t.send(post_empty("/auth/users", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["uuid"], ada.uuid.to_string());
        assert_eq!(body["data"]["roles"], json!(["RDF", "SIGNIN"]));
        assert!(body["data"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn refresh_token_is_not_access() {
        let t = test_state();
        let ada = t.create_user(TestUser::verified("a", "a@x.org")).await;
        let refresh = t
            .state
            .tokens
            .refresh_token(ada.uuid, &RoleClaim::new([Role::SIGNIN]))
            .unwrap();
        let response = t.send(post_empty("/auth/users", Some(&refresh))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "WRONG_TOKEN_TYPE");
    }

    #[tokio::test]
    async fn update_profile_and_conflict() {
        let t = test_state();
        let ada = t.create_user(TestUser::verified("a", "a@x.org")).await;
        t.create_user(TestUser::verified("b", "b@x.org")).await;
        let token = t.access_token(&ada, &RoleClaim::new([Role::SIGNIN]));

        let response = t
            .send(post_json(
                "/auth/users/update",
                Some(&token),
                json!({"firstName": "Ada", "lastName": "Lovelace"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["firstName"], "Ada");
        assert_eq!(body["data"]["username"], "a");

        let response = t
            .send(post_json("/auth/users/update", Some(&token), json!({"username": "b"})))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn issued_api_key_opens_a_session() {
        let t = test_state();
        let ada = t.create_user(TestUser::verified("a", "a@x.org")).await;
        let token = t.access_token(&ada, &RoleClaim::new([Role::SIGNIN]));

        let response = t.send(post_empty("/auth/users/api-keys", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let key = body_json(response).await["data"]["key"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(key.starts_with("edb_"));

        let response = t
            .send(post_json("/sessions/api/keys/signin", None, json!({"key": key})))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).is_some());
    }

    #[tokio::test]
    async fn api_keys_need_access_token() {
        let t = test_state();
        let ada = t.create_user(TestUser::verified("a", "a@x.org")).await;
        let token = t
            .state
            .tokens
            .mint(TokenKind::VerifyEmail, ada.uuid, None, Some("x".into()), None)
            .unwrap();
        let response = t.send(post_empty("/auth/users/api-keys", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
