//! Shared fixtures for client integration tests

#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::MockServer;

use vaultcore::{
    ApiClient, ClientConfig, IdentityConfig, MemorySessionStore, SessionKey, SessionStore,
};

/// Unsigned JWT carrying `claims` as its payload
pub fn jwt(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// Config pointing both the API and the identity provider at `server`
pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        api_url: server.uri(),
        timeout: 5,
        use_proxy: false,
        session_path: None,
        identity: IdentityConfig {
            url: server.uri(),
            ..IdentityConfig::default()
        },
    }
}

pub fn client_with(config: ClientConfig, session: MemorySessionStore) -> ApiClient {
    ApiClient::new(config, Arc::new(session)).expect("client should build")
}

/// Client against `server` whose session holds the given tokens
pub fn client_for(server: &MockServer, access: Option<&str>, refresh: Option<&str>) -> ApiClient {
    let session = MemorySessionStore::new();
    if let Some(access) = access {
        session.set(SessionKey::AccessToken, access);
    }
    if let Some(refresh) = refresh {
        session.set(SessionKey::RefreshToken, refresh);
    }
    client_with(config_for(server), session)
}

/// Counts session-expired notifications
pub fn count_expiries(client: &ApiClient) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let hook_count = Arc::clone(&count);
    client.on_session_expired(move || {
        hook_count.fetch_add(1, Ordering::SeqCst);
    });
    count
}
