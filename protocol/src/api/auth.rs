//! Authentication API DTOs
//!
//! Bodies for the authorization-code exchange and the token refresh endpoint.
//! The backend speaks camelCase JSON.

use serde::{Deserialize, Serialize};
use validator::Validate;

// ============================================================================
// Login DTOs
// ============================================================================

/// Exchange of an identity-provider authorization code for a token pair
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 4096))]
    pub code: String,
    /// Must match the redirect URI used when the code was issued
    #[validate(url)]
    pub redirect_uri: String,
}

/// Login response. Both tokens are optional on the wire so a partial
/// response can be reported instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

// ============================================================================
// Token Refresh DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Refresh response. Some backends rotate the refresh token and some do not,
/// so `refresh_token` may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

// ============================================================================
// Logout DTOs
// ============================================================================

/// Form body for the identity provider's end-session endpoint
#[derive(Debug, Clone, Serialize)]
pub struct LogoutForm {
    pub client_id: String,
    pub refresh_token: String,
}
