//! Code exchange, logout and session persistence

mod common;

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{client_for, client_with, config_for, jwt};
use vaultcore::{
    ApiClient, AuthService, ErrorCode, FileSessionStore, IdentityConfig, MemorySessionStore,
    SessionStore,
};

const LOGOUT_PATH: &str = "/realms/vaultcore/protocol/openid-connect/logout";

fn admin_token() -> String {
    jwt(json!({
        "sub": "u-42",
        "email": "grace@example.com",
        "name": "Grace Hopper",
        "exp": Utc::now().timestamp() + 600,
        "realm_access": { "roles": ["USER", "ADMIN"] }
    }))
}

async fn mount_login(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({
            "code": "auth-code",
            "redirectUri": "http://localhost:5173/callback"
        })))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_with_code_stores_session() {
    let server = MockServer::start().await;
    let access = admin_token();
    mount_login(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "accessToken": &access, "refreshToken": "R1" })),
    )
    .await;

    let service = AuthService::new(client_for(&server, None, None));
    let outcome = service.login_with_code("auth-code").await.unwrap();

    assert!(outcome.is_admin);
    assert!(outcome.roles.contains("USER"));
    let identity = outcome.identity.unwrap();
    assert_eq!(identity.display_name, "Grace Hopper");
    assert_eq!(identity.email.as_deref(), Some("grace@example.com"));

    assert_eq!(service.client().session().access_token(), Some(access));
    assert_eq!(service.client().session().refresh_token().as_deref(), Some("R1"));
    assert!(service.is_authenticated());
    assert!(service.is_admin());
}

#[tokio::test]
async fn test_login_without_refresh_token_leaves_no_session() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "accessToken": admin_token() })),
    )
    .await;

    let service = AuthService::new(client_for(&server, Some("old"), Some("old-refresh")));
    let err = service.login_with_code("auth-code").await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::AuthenticationFailed);
    assert!(!service.client().session().has_session());
    assert!(service.client().session().refresh_token().is_none());
}

#[tokio::test]
async fn test_rejected_code_reports_backend_message() {
    let server = MockServer::start().await;
    mount_login(
        &server,
        ResponseTemplate::new(400).set_body_json(json!({ "message": "Code already used" })),
    )
    .await;

    let service = AuthService::new(client_for(&server, None, None));
    let err = service.login_with_code("auth-code").await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::AuthenticationFailed);
    assert!(err.to_string().contains("Code already used"));
    assert!(!service.is_authenticated());
}

#[tokio::test]
async fn test_logout_ends_provider_session_and_clears_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGOUT_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("client_id=vaultcore-frontend"))
        .and(body_string_contains("refresh_token=R1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let service = AuthService::new(client_for(&server, Some("T1"), Some("R1")));
    service.logout().await;

    assert!(service.client().session().access_token().is_none());
    assert!(service.client().session().refresh_token().is_none());
}

#[tokio::test]
async fn test_logout_without_refresh_token_skips_provider() {
    let server = MockServer::start().await;
    Mock::given(path(LOGOUT_PATH))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let service = AuthService::new(client_for(&server, Some("T1"), None));
    service.logout().await;

    assert!(!service.client().session().has_session());
}

#[tokio::test]
async fn test_logout_clears_session_when_provider_unreachable() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    config.timeout = 2;
    config.identity = IdentityConfig {
        url: "http://127.0.0.1:9".to_string(),
        ..IdentityConfig::default()
    };

    let service = AuthService::new(client_with(
        config,
        MemorySessionStore::with_tokens("T1", Some("R1")),
    ));
    service.logout().await;

    assert!(!service.client().session().has_session());
    assert!(service.client().session().refresh_token().is_none());
}

#[tokio::test]
async fn test_session_file_survives_restart() {
    let server = MockServer::start().await;
    let access = admin_token();
    mount_login(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "accessToken": &access, "refreshToken": "R1" })),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("session.json");

    let first = ApiClient::new(
        config_for(&server),
        Arc::new(FileSessionStore::new(&session_path)),
    )
    .unwrap();
    AuthService::new(first)
        .login_with_code("auth-code")
        .await
        .unwrap();

    let reopened = AuthService::new(
        ApiClient::new(
            config_for(&server),
            Arc::new(FileSessionStore::new(&session_path)),
        )
        .unwrap(),
    );
    assert!(reopened.is_authenticated());
    assert_eq!(
        reopened.current_user().unwrap().subject.as_deref(),
        Some("u-42")
    );

    reopened.logout().await;
    let after_logout = FileSessionStore::new(&session_path);
    assert!(!after_logout.has_session());
}
