//! Route definitions for the ledger server
//!
//! Routes are grouped by the roles they admit. Each gated group carries its
//! own [`role_guard`] layer.

use crate::{
    auth::{handlers as auth, jwt::JwtService, RoleSet},
    handlers,
    middleware::{role_guard, Gate},
    openapi::ApiDoc,
    AppState,
};
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Json, Router,
};
use utoipa::OpenApi;

/// Routes reachable without a token
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/register", post(auth::register_user))
        .route("/login", post(auth::login_user))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}

/// Routes open to every authenticated role
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // Account
        .route("/me", get(auth::current_user))
        .route("/change-password", post(auth::change_password))
        // Ledger entries
        .route(
            "/ledger",
            get(handlers::list_entries).post(handlers::create_entry),
        )
        .route(
            "/ledger/{id}",
            get(handlers::get_entry)
                .put(handlers::update_entry)
                .delete(handlers::delete_entry),
        )
        // Lookups and reporting
        .route("/meta/provinces", get(handlers::provinces))
        .route("/meta/nature-options", get(handlers::nature_options))
        .route(
            "/meta/suggestions/project_items",
            get(handlers::project_item_suggestions),
        )
        .route(
            "/meta/suggestions/locations",
            get(handlers::location_suggestions),
        )
        .route("/meta/export/ledger", get(handlers::export_ledger))
        .route(
            "/meta/stats/ledger_by_user",
            get(handlers::ledger_stats_by_user),
        )
        // Short aliases kept for older clients
        .route("/provinces", get(handlers::provinces))
        .route("/nature-options", get(handlers::nature_options))
        .route(
            "/suggestions/project_items",
            get(handlers::project_item_suggestions),
        )
}

/// Administration routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(handlers::list_users))
        .route("/admin/users/{id}/role", put(handlers::update_user_role))
        .route("/admin/users/{id}", delete(handlers::delete_user))
        .route("/admin/statistics", get(handlers::statistics))
        .route("/admin/logs", get(handlers::activity_logs))
        .route("/admin/export/logs", get(handlers::export_logs))
}

/// Put a route group behind the role gate. The gate also sees requests whose
/// method has no handler, so those are rejected as 401 before any 405.
fn gated(routes: Router<AppState>, jwt: &JwtService, allowed: RoleSet) -> Router<AppState> {
    routes.layer(from_fn_with_state(Gate::new(jwt.clone(), allowed), role_guard))
}

/// All API routes, to be nested under `/api`
pub fn api_routes(jwt: &JwtService) -> Router<AppState> {
    Router::new()
        .merge(public_routes())
        .merge(gated(user_routes(), jwt, RoleSet::ANY))
        .merge(gated(admin_routes(), jwt, RoleSet::ADMIN_ONLY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_app;
    use axum::{
        body::Body,
        http::{
            header::{AUTHORIZATION, CONTENT_TYPE},
            Method, Request, StatusCode,
        },
    };
    use http_body_util::BodyExt;
    use ledger_core::{LedgerConfig, Role};
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let mut config = LedgerConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        AppState::new(config).await.unwrap()
    }

    fn request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json_request(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check_route() {
        let app = create_app(test_state().await);

        let response = app
            .oneshot(request(Method::GET, "/api/health", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ledger_requires_token() {
        let app = create_app(test_state().await);

        let response = app
            .oneshot(request(Method::GET, "/api/ledger", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], 401);
        assert_eq!(body["error"], "missing_auth_header");
    }

    #[tokio::test]
    async fn test_admin_routes_reject_basic_role() {
        let state = test_state().await;
        let token = state.jwt.issue(42, "bob", Role::User).unwrap();
        let app = create_app(state);

        let response = app
            .oneshot(request(Method::GET, "/api/admin/statistics", Some(&token)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Insufficient permissions");
    }

    #[tokio::test]
    async fn test_aliases_share_handlers() {
        let state = test_state().await;
        let token = state.jwt.issue(1, "admin", Role::Admin).unwrap();
        let app = create_app(state);

        let meta = json_body(
            app.clone()
                .oneshot(request(Method::GET, "/api/meta/provinces", Some(&token)))
                .await
                .unwrap(),
        )
        .await;
        let alias = json_body(
            app.oneshot(request(Method::GET, "/api/provinces", Some(&token)))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(meta["data"], alias["data"]);
        assert!(!meta["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_openapi_document_is_public() {
        let app = create_app(test_state().await);

        let response = app
            .oneshot(request(Method::GET, "/api/openapi.json", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["paths"]["/api/ledger"].is_object());
    }

    #[tokio::test]
    async fn test_unreadable_bodies_use_the_envelope() {
        let app = create_app(test_state().await);

        let mistyped = json_request("/api/register", None, r#"{"username": 5, "password": "secret123"}"#);
        let broken = json_request("/api/register", None, "{not json");
        let untyped = Request::builder()
            .method(Method::POST)
            .uri("/api/register")
            .body(Body::from(r#"{"username": "alice", "password": "secret123"}"#))
            .unwrap();

        for request in [mistyped, broken, untyped] {
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = json_body(response).await;
            assert_eq!(body["success"], false);
            assert_eq!(body["code"], 400);
            assert_eq!(body["error"], "VALIDATION_ERROR");
            assert!(body["data"].is_null());
        }
    }

    #[tokio::test]
    async fn test_audit_failures_do_not_abort_requests() {
        let state = test_state().await;
        sqlx::query("DROP TABLE activity_logs")
            .execute(state.database.pool())
            .await
            .unwrap();
        let app = create_app(state.clone());

        let response = app
            .clone()
            .oneshot(json_request(
                "/api/register",
                None,
                r#"{"username": "alice", "password": "secret123"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        let user_id = body["data"]["id"].as_i64().unwrap();

        let token = state.jwt.issue(user_id, "alice", Role::User).unwrap();
        let entry = serde_json::json!({
            "province": "上海",
            "project_name": "Audit outage",
            "date": "2024-03-01",
            "location": "会议室A",
            "personnel": "张三",
            "nature": "会议纪要",
            "specific_matters": "讨论项目进度"
        });
        let response = app
            .oneshot(json_request("/api/ledger", Some(&token), &entry.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(state.ledger.count().await.unwrap(), 1);
    }
}
