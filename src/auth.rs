//! Identity-provider login flow for the VaultCore client
//!
//! The identity provider runs an OpenID Connect authorization-code flow in the
//! browser; the backend exchanges the resulting code for a token pair. This
//! service builds the provider URLs, performs the exchange, reports who is
//! signed in, and logs out.

use chrono::{DateTime, Utc};
use reqwest::Url;
use std::collections::BTreeSet;
use tracing::{info, warn};
use validator::Validate;

use vaultcore_protocol::{LoginRequest, LoginResponse, LogoutForm};

use crate::client::{error_message, ApiClient};
use crate::config::IdentityConfig;
use crate::error::{Result, VaultError};
use crate::token::{self, Identity};

pub const LOGIN_ENDPOINT: &str = "/api/auth/login";

/// Result of a successful code exchange
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: Option<Identity>,
    pub roles: BTreeSet<String>,
    pub is_admin: bool,
}

/// Snapshot of the stored session as seen through its access token
#[derive(Debug, Clone, Default)]
pub struct SessionStatus {
    pub authenticated: bool,
    /// A token is stored but it has expired
    pub expired: bool,
    pub has_refresh_token: bool,
    pub identity: Option<Identity>,
    pub roles: BTreeSet<String>,
    pub is_admin: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Authentication service
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn identity_config(&self) -> &IdentityConfig {
        &self.client.config().identity
    }

    /// Where to send the user to sign in
    pub fn login_url(&self) -> Result<String> {
        self.authorization_url("auth", true)
    }

    /// Where to send the user to create an account
    pub fn register_url(&self) -> Result<String> {
        self.authorization_url("registrations", false)
    }

    fn authorization_url(&self, endpoint: &str, force_login: bool) -> Result<String> {
        let identity = self.identity_config();
        let base = format!("{}/{endpoint}", identity.openid_connect_url());
        let mut url = Url::parse(&base)
            .map_err(|e| VaultError::invalid_endpoint(format!("Invalid identity provider URL {base}: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &identity.client_id)
                .append_pair("response_type", "code")
                .append_pair("scope", "openid")
                .append_pair("redirect_uri", &identity.redirect_uri);
            if force_login {
                query.append_pair("prompt", "login");
            }
        }

        Ok(url.into())
    }

    /// Exchange an authorization code for a token pair and store it. Any
    /// failure leaves no session behind.
    pub async fn login_with_code(&self, code: &str) -> Result<LoginOutcome> {
        let request = LoginRequest {
            code: code.to_string(),
            redirect_uri: self.identity_config().redirect_uri.clone(),
        };
        request.validate()?;

        match self.exchange_code(&request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.client.session().clear();
                Err(e)
            }
        }
    }

    async fn exchange_code(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        let response = self.client.base().post_json(LOGIN_ENDPOINT, request).await?;

        if !response.status.is_success() {
            return Err(VaultError::authentication(format!(
                "Login rejected ({}): {}",
                response.status.as_u16(),
                error_message(&response.body)
            )));
        }

        let tokens: LoginResponse = serde_json::from_str(&response.body)
            .map_err(|e| VaultError::authentication_with_source("Invalid token response", e))?;

        let (Some(access_token), Some(refresh_token)) = (
            tokens.access_token.filter(|t| !t.is_empty()),
            tokens.refresh_token.filter(|t| !t.is_empty()),
        ) else {
            return Err(VaultError::authentication("Invalid token response"));
        };

        self.client
            .session()
            .replace_tokens(&access_token, Some(&refresh_token));

        let outcome = LoginOutcome {
            identity: token::extract_identity(&access_token),
            roles: token::extract_roles(&access_token),
            is_admin: token::is_admin(&access_token),
        };
        info!(admin = outcome.is_admin, "Logged in");

        Ok(outcome)
    }

    /// End the session at the identity provider (best effort) and clear it
    /// locally. The local session is cleared even if the provider is
    /// unreachable.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.client.session().refresh_token() {
            let identity = self.identity_config();
            let url = format!("{}/logout", identity.openid_connect_url());
            let form = LogoutForm {
                client_id: identity.client_id.clone(),
                refresh_token,
            };

            match self.client.base().post_form(&url, &form).await {
                Ok(response) if !response.status.is_success() => {
                    warn!(status = response.status.as_u16(), "Identity provider rejected logout");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Identity provider logout failed"),
            }
        }

        self.client.session().clear();
        info!("Logged out");
    }

    fn access_token(&self) -> Option<String> {
        self.client.session().access_token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token()
            .is_some_and(|token| !token::is_expired(&token))
    }

    pub fn is_admin(&self) -> bool {
        self.access_token()
            .is_some_and(|token| token::is_admin(&token))
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.access_token()
            .and_then(|token| token::extract_identity(&token))
    }

    pub fn roles(&self) -> BTreeSet<String> {
        self.access_token()
            .map(|token| token::extract_roles(&token))
            .unwrap_or_default()
    }

    pub fn status(&self) -> SessionStatus {
        let has_refresh_token = self.client.session().refresh_token().is_some();

        let Some(access_token) = self.access_token() else {
            return SessionStatus {
                has_refresh_token,
                ..SessionStatus::default()
            };
        };

        let expired = token::is_expired(&access_token);
        SessionStatus {
            authenticated: !expired,
            expired,
            has_refresh_token,
            identity: token::extract_identity(&access_token),
            roles: token::extract_roles(&access_token),
            is_admin: token::is_admin(&access_token),
            expires_at: token::expires_at(&access_token),
        }
    }
}
