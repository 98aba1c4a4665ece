//! Tests for token handling and the role gate

use super::*;
use crate::middleware::{role_guard, Gate};
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::from_fn_with_state,
    routing::any,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tower::ServiceExt;

fn service() -> JwtService {
    JwtService::new("test-secret", Duration::hours(24))
}

/// Helper function to create headers with Bearer token
fn headers_with_bearer_token(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let auth_value = format!("Bearer {}", token);
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth_value).unwrap());
    headers
}

/// Router whose only handler counts its invocations
fn guarded_router(jwt: JwtService, allowed: RoleSet) -> (Router, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new()
        .route(
            "/guarded",
            any(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "handled"
                }
            }),
        )
        .layer(from_fn_with_state(Gate::new(jwt, allowed), role_guard));
    (router, calls)
}

fn guarded_request(method: Method, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/guarded");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[test]
fn test_issue_and_verify_round_trip() {
    let jwt = service();
    let token = jwt.issue(7, "alice", Role::PowerUser).unwrap();

    let claims = jwt.verify(&token).unwrap();
    assert_eq!(claims.sub, "7");
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.role, Role::PowerUser);
    assert_eq!(claims.exp - claims.iat, 24 * 3600);
    assert_eq!(claims.user_id().unwrap(), 7);
}

#[test]
fn test_configured_lifetime_is_bounded() {
    let mut config = ledger_core::AuthConfig::default();
    config.token_ttl_hours = i64::MAX;
    let jwt = JwtService::from_config(&config);
    assert_eq!(jwt.ttl_seconds(), ledger_core::MAX_TOKEN_TTL_HOURS * 3600);

    config.token_ttl_hours = 12;
    assert_eq!(JwtService::from_config(&config).ttl_seconds(), 12 * 3600);
}

#[test]
fn test_expired_token_rejected() {
    let jwt = service();
    let issued = Utc::now() - Duration::hours(25);
    let token = jwt.issue_at(7, "alice", Role::User, issued).unwrap();

    assert_eq!(jwt.verify(&token).unwrap_err(), AuthError::TokenExpired);
}

#[test]
fn test_wrong_secret_rejected() {
    let token = service().issue(7, "alice", Role::User).unwrap();
    let other = JwtService::new("another-secret", Duration::hours(24));

    assert_eq!(other.verify(&token).unwrap_err(), AuthError::InvalidSignature);
}

#[test]
fn test_tampered_role_rejected() {
    let jwt = service();
    let token = jwt.issue(7, "alice", Role::User).unwrap();
    let parts: Vec<&str> = token.split('.').collect();
    assert_eq!(parts.len(), 3);

    let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
    let mut claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    claims["role"] = serde_json::json!("admin");
    let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

    assert_eq!(jwt.verify(&tampered).unwrap_err(), AuthError::InvalidSignature);
}

#[test]
fn test_malformed_token_rejected() {
    assert_eq!(
        service().verify("not-a-token").unwrap_err(),
        AuthError::InvalidToken
    );
}

#[test]
fn test_header_parsing() {
    let jwt = service();
    assert_eq!(
        jwt.verify_header(&HeaderMap::new()).unwrap_err(),
        AuthError::MissingAuthHeader
    );

    let mut basic = HeaderMap::new();
    basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
    assert_eq!(jwt.verify_header(&basic).unwrap_err(), AuthError::InvalidToken);

    let token = jwt.issue(3, "carol", Role::Admin).unwrap();
    let claims = jwt.verify_header(&headers_with_bearer_token(&token)).unwrap();
    assert_eq!(claims.role, Role::Admin);
}

#[test]
fn test_ownership_rule() {
    let basic = AuthUser {
        id: 1,
        username: "alice".to_string(),
        role: Role::User,
    };
    assert!(basic.can_modify(1));
    assert!(!basic.can_modify(2));
    assert_eq!(basic.owner_scope(), Some(1));

    for role in [Role::PowerUser, Role::Admin] {
        let elevated = AuthUser { role, ..basic.clone() };
        assert!(elevated.can_modify(2));
        assert_eq!(elevated.owner_scope(), None);
    }
}

#[tokio::test]
async fn test_extractor_verifies_header() {
    let jwt = service();
    let token = jwt.issue(9, "dave", Role::User).unwrap();
    let mut request = Request::builder()
        .uri("/test")
        .body(Body::empty())
        .unwrap();
    *request.headers_mut() = headers_with_bearer_token(&token);
    let (mut parts, _) = request.into_parts();

    let user = AuthUser::from_request_parts(&mut parts, &jwt).await.unwrap();
    assert_eq!(user.id, 9);
    assert_eq!(user.username, "dave");

    let (mut bare, _) = Request::builder()
        .uri("/test")
        .body(Body::empty())
        .unwrap()
        .into_parts();
    let err = AuthUser::from_request_parts(&mut bare, &jwt)
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::MissingAuthHeader);
}

#[tokio::test]
async fn test_gate_rejects_role_outside_set() {
    let jwt = service();
    let token = jwt.issue(1, "alice", Role::User).unwrap();
    let (router, calls) = guarded_router(jwt, RoleSet::ADMIN_ONLY);

    let response = router
        .oneshot(guarded_request(Method::DELETE, Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_gate_admits_elevated_roles() {
    let jwt = service();
    let power = jwt.issue(2, "erin", Role::PowerUser).unwrap();
    let basic = jwt.issue(3, "frank", Role::User).unwrap();
    let (router, calls) = guarded_router(jwt, RoleSet(&[Role::PowerUser, Role::Admin]));

    let response = router
        .clone()
        .oneshot(guarded_request(Method::GET, Some(&power)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(guarded_request(Method::GET, Some(&basic)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gate_short_circuits_preflight() {
    let (router, calls) = guarded_router(service(), RoleSet::ADMIN_ONLY);

    let response = router
        .oneshot(guarded_request(Method::OPTIONS, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_gate_requires_valid_token() {
    let jwt = service();
    let expired = jwt
        .issue_at(1, "alice", Role::Admin, Utc::now() - Duration::hours(48))
        .unwrap();
    let (router, calls) = guarded_router(jwt, RoleSet::ANY);

    let response = router
        .clone()
        .oneshot(guarded_request(Method::GET, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(guarded_request(Method::GET, Some(&expired)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
