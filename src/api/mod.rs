// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP surface.
//!
//! Routes are grouped by the credential they need. Each group carries its
//! own filter stack as a route layer; the global stack wraps everything:
//!
//! ```text
//! catch-panic -> request-id -> trace -> CORS -> collect_errors -> install_session
//! ```

use std::any::Any;
use std::future::Future;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::claims::TokenKind;
use crate::auth::middleware::{
    collect_errors, federated_jwt, install_session, jwt, require_kind, require_roles,
    require_session, RoleGate,
};
use crate::auth::Role;
use crate::config::Config;
use crate::error::{ApiError, ErrorBody, ErrorKind};
use crate::models::{
    AccessTokenResp, AdminAddUserBody, AdminUserUpdateBody, ApiKeyBody, ApiKeyResp, DataResponse,
    EmailBody, LoginBody, LoginResp, MessageResp, PasswordBody, PublicUser, SessionInfo,
    SignupBody, TokenInfo, UserListQuery, UserStats, UserUpdateBody, UserWithRoles,
};
use crate::state::AppState;

pub mod admin;
pub mod email;
pub mod federated;
pub mod modules;
pub mod ops;
pub mod passwords;
pub mod sessions;
pub mod signin;
pub mod signup;
pub mod tokens;
pub mod users;

pub use modules::ModuleRoutes;

/// Wrap `value` in the `{ "data": ... }` envelope.
pub(crate) fn data<T: Serialize>(value: T) -> Response {
    Json(DataResponse::new(value)).into_response()
}

/// Run a directory write on its own task so a dropped client connection
/// cannot cancel it halfway.
pub(crate) async fn detached<F, T>(write: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(write)
        .await
        .map_err(|err| ApiError::internal(format!("directory write did not complete: {err}")))?
}

/// Routes that need a first-party bearer token of `kind`.
fn bearer(state: &AppState, kind: TokenKind, routes: Router<AppState>) -> Router<AppState> {
    routes.route_layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(state.clone(), jwt))
            .layer(from_fn_with_state(kind, require_kind)),
    )
}

/// Routes that need an `ACCESS` token whose roles pass `gate`.
fn bearer_with_roles(state: &AppState, gate: RoleGate, routes: Router<AppState>) -> Router<AppState> {
    routes.route_layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(state.clone(), jwt))
            .layer(from_fn_with_state(TokenKind::Access, require_kind))
            .layer(from_fn_with_state(gate, require_roles)),
    )
}

pub fn router(state: AppState, modules: ModuleRoutes) -> Router {
    let public = Router::new()
        .route("/about", get(ops::about))
        .route("/info", get(ops::info))
        .route("/ping", get(ops::ping))
        .route("/signup", post(signup::signup))
        .route("/auth/signin", post(signin::signin))
        .route("/auth/passwordless/email", post(signin::passwordless_email))
        .route("/auth/passwords/reset", post(passwords::send_reset_password))
        .route("/sessions/auth/signin", post(sessions::signin))
        .route("/sessions/api/keys/signin", post(sessions::api_key_signin))
        .route("/sessions/signout", post(sessions::signout))
        .route("/sessions/info", get(sessions::info));

    // Any first-party kind.
    let any_token = Router::new()
        .route("/auth/tokens/info", post(tokens::token_info))
        .route_layer(from_fn_with_state(state.clone(), jwt));

    let verify_email = bearer(
        &state,
        TokenKind::VerifyEmail,
        Router::new().route("/auth/email/verified", post(email::email_verified)),
    );

    let passwordless = bearer(
        &state,
        TokenKind::Passwordless,
        Router::new()
            .route("/auth/passwordless/signin", post(signin::passwordless_signin))
            .route(
                "/sessions/auth/passwordless/validate",
                post(sessions::passwordless_validate),
            ),
    );

    let refresh = bearer(
        &state,
        TokenKind::Refresh,
        Router::new().route("/auth/tokens/access", post(tokens::new_access_token)),
    );

    let reset_password = bearer(
        &state,
        TokenKind::ResetPassword,
        Router::new().route("/auth/passwords/update", post(passwords::update_password)),
    );

    let change_email = bearer(
        &state,
        TokenKind::ChangeEmail,
        Router::new().route("/auth/email/update", post(email::update_email)),
    );

    let access = bearer(
        &state,
        TokenKind::Access,
        Router::new()
            .route("/auth/email/reset", post(email::send_change_email))
            .route("/auth/users", post(users::user))
            .route("/auth/users/update", post(users::update_user))
            .route("/auth/users/api-keys", post(users::new_api_key_for_user)),
    );

    let federated = Router::new()
        .route("/auth/auth0/validate", post(federated::validate))
        .route("/sessions/auth0/signin", post(sessions::federated_signin))
        .route_layer(from_fn_with_state(state.clone(), federated_jwt));

    let session = Router::new()
        .route("/sessions/tokens/access", post(sessions::new_access_token))
        .route("/sessions/refresh", post(sessions::refresh))
        .route("/sessions/user", get(sessions::user))
        .route("/sessions/user/update", post(sessions::update_user))
        .route_layer(from_fn(require_session));

    let admin = bearer_with_roles(
        &state,
        RoleGate::any_of([Role::ADMIN]),
        Router::new()
            .route("/admin/roles", get(admin::roles))
            .route("/admin/users", post(admin::users))
            .route("/admin/users/stats", get(admin::stats))
            .route("/admin/users/update", post(admin::update_user))
            .route("/admin/users/add", post(admin::add_user))
            .route("/admin/users/delete/{uuid}", delete(admin::delete_user)),
    );

    let mut routes = public
        .merge(any_token)
        .merge(verify_email)
        .merge(passwordless)
        .merge(refresh)
        .merge(reset_password)
        .merge(change_email)
        .merge(access)
        .merge(federated)
        .merge(session)
        .merge(admin);
    if let Some(modules) = modules.into_router(&state) {
        routes = routes.nest("/modules", modules);
    }

    let app = routes
        .with_state(state.clone())
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));
    with_middleware(app, &state)
}

/// Apply the global filter stack.
fn with_middleware(app: Router, state: &AppState) -> Router {
    app.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors(&state.config))
            .layer(from_fn(collect_errors))
            .layer(from_fn_with_state(state.clone(), install_session)),
    )
}

fn cors(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");
    ApiError::internal(detail).into_response()
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("First-party token minted by this gateway"))
                    .build(),
            ),
        );
        components.add_security_scheme(
            "federated",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Token issued by the federated identity provider"))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        ops::about,
        ops::info,
        ops::ping,
        signup::signup,
        signin::signin,
        signin::passwordless_email,
        signin::passwordless_signin,
        email::email_verified,
        email::send_change_email,
        email::update_email,
        passwords::send_reset_password,
        passwords::update_password,
        tokens::token_info,
        tokens::new_access_token,
        federated::validate,
        users::user,
        users::update_user,
        users::new_api_key_for_user,
        sessions::signin,
        sessions::passwordless_validate,
        sessions::federated_signin,
        sessions::api_key_signin,
        sessions::info,
        sessions::signout,
        sessions::new_access_token,
        sessions::refresh,
        sessions::user,
        sessions::update_user,
        admin::roles,
        admin::users,
        admin::stats,
        admin::update_user,
        admin::add_user,
        admin::delete_user
    ),
    components(
        schemas(
            ErrorBody,
            ErrorKind,
            TokenKind,
            PublicUser,
            UserWithRoles,
            LoginBody,
            SignupBody,
            PasswordBody,
            EmailBody,
            ApiKeyBody,
            UserUpdateBody,
            UserListQuery,
            AdminUserUpdateBody,
            AdminAddUserBody,
            LoginResp,
            AccessTokenResp,
            TokenInfo,
            MessageResp,
            ApiKeyResp,
            UserStats,
            SessionInfo
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Ops", description = "Build info and liveness"),
        (name = "Authentication", description = "Sign-up, sign-in and magic links"),
        (name = "Email", description = "Address verification and change"),
        (name = "Passwords", description = "Password reset"),
        (name = "Tokens", description = "Token introspection and exchange"),
        (name = "Users", description = "The signed-in account"),
        (name = "Sessions", description = "Cookie sessions"),
        (name = "Admin", description = "User management")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RoleClaim;
    use crate::testutil::{
        body_json, federated_token, get, post_empty, test_state, TestUser, ROTATED_PRIVATE_KEY,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let t = test_state();
        let response = t.send(get("/ping", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[test]
    fn openapi_lists_routes_and_schemes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/auth/signin"));
        assert!(doc.paths.paths.contains_key("/admin/users/delete/{uuid}"));
        let schemes = &doc.components.unwrap().security_schemes;
        assert!(schemes.contains_key("bearer"));
        assert!(schemes.contains_key("federated"));
    }

    async fn boom() -> &'static str {
        panic!("secret detail")
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let t = test_state();
        let app = with_middleware(
            Router::new().route("/boom", axum::routing::get(boom)),
            &t.state,
        );
        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["code"], "INTERNAL");
        assert!(!body["message"].as_str().unwrap().contains("secret"));
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origins() {
        let t = test_state();
        let preflight = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/auth/signin")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap()
        };

        let response = t.send(preflight("http://localhost:3000")).await;
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
        assert_eq!(headers.get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "43200");

        let response = t.send(preflight("https://evil.example")).await;
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    /// Every route guarded by a first-party token kind.
    const KIND_GUARDED: &[(&str, &str, TokenKind)] = &[
        ("POST", "/auth/email/verified", TokenKind::VerifyEmail),
        ("POST", "/auth/passwordless/signin", TokenKind::Passwordless),
        ("POST", "/sessions/auth/passwordless/validate", TokenKind::Passwordless),
        ("POST", "/auth/tokens/access", TokenKind::Refresh),
        ("POST", "/auth/passwords/update", TokenKind::ResetPassword),
        ("POST", "/auth/email/update", TokenKind::ChangeEmail),
        ("POST", "/auth/email/reset", TokenKind::Access),
        ("POST", "/auth/users", TokenKind::Access),
        ("POST", "/auth/users/update", TokenKind::Access),
        ("POST", "/auth/users/api-keys", TokenKind::Access),
        ("GET", "/admin/roles", TokenKind::Access),
        ("POST", "/admin/users", TokenKind::Access),
        ("GET", "/admin/users/stats", TokenKind::Access),
        ("POST", "/admin/users/update", TokenKind::Access),
        ("POST", "/admin/users/add", TokenKind::Access),
        ("DELETE", "/admin/users/delete/00000000-0000-0000-0000-000000000000", TokenKind::Access),
    ];

    #[tokio::test]
    async fn kind_guarded_routes_reject_every_other_kind() {
        let t = test_state();
        let root = t
            .create_user(TestUser::verified("root", "root@x.org").with_roles([Role::ADMIN]))
            .await;
        let roles = RoleClaim::new([Role::ADMIN, Role::SIGNIN]);

        for &(method, uri, wanted) in KIND_GUARDED {
            for kind in TokenKind::ALL.into_iter().filter(|k| *k != wanted) {
                let token = t
                    .state
                    .tokens
                    .mint(kind, root.uuid, Some(&roles), Some("x".into()), None)
                    .unwrap();
                let request = Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap();
                let response = t.send(request).await;
                assert_eq!(
                    response.status(),
                    StatusCode::UNAUTHORIZED,
                    "{method} {uri} with {kind}"
                );
                assert_eq!(
                    body_json(response).await["code"],
                    "WRONG_TOKEN_TYPE",
                    "{method} {uri} with {kind}"
                );
            }
        }
    }

    #[tokio::test]
    async fn federated_tokens_only_open_federated_routes() {
        let t = test_state();
        t.create_user(TestUser::verified("a", "a@x.org")).await;
        let federated = federated_token("a@x.org", true);
        for uri in ["/auth/tokens/info", "/auth/users", "/auth/tokens/access"] {
            let response = t.send(post_empty(uri, Some(&federated))).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body_json(response).await["code"], "TOKEN_INVALID");
        }
    }

    #[tokio::test]
    async fn first_party_tokens_do_not_open_federated_routes() {
        let t = test_state();
        let ada = t.create_user(TestUser::verified("a", "a@x.org")).await;
        let access = t.access_token(&ada, &RoleClaim::new([Role::SIGNIN]));
        for uri in ["/auth/auth0/validate", "/sessions/auth0/signin"] {
            let response = t.send(post_empty(uri, Some(&access))).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn foreign_signature_is_rejected() {
        let t = test_state();
        let ada = t.create_user(TestUser::verified("a", "a@x.org")).await;
        let token = t.access_token(&ada, &RoleClaim::new([Role::SIGNIN]));
        let claims = t.state.tokens.verify(&token).unwrap();

        // Signed by a key the gateway has never been given.
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("jwtRS256".to_string());
        let key = EncodingKey::from_rsa_pem(ROTATED_PRIVATE_KEY.as_bytes()).unwrap();
        let forged = encode(&header, &claims, &key).unwrap();

        let response = t.send(post_empty("/auth/users", Some(&forged))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let t = test_state();
        let response = t.send(get("/nope", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
