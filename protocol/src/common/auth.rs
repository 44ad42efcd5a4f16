//! Access-token claims

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role list as issued by the identity provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleList {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims carried in the payload of an access token.
///
/// Every field is optional: tokens from different realms and clients carry
/// different subsets, and callers decide what a missing claim means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (stable user identifier)
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Human display name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    /// Expiration time (Unix timestamp, seconds; some issuers send fractions)
    #[serde(default)]
    pub exp: Option<f64>,
    /// Issued at time (Unix timestamp, seconds)
    #[serde(default)]
    pub iat: Option<f64>,
    #[serde(default)]
    pub realm_access: Option<RoleList>,
    /// Per-client role lists keyed by client id
    #[serde(default)]
    pub resource_access: Option<HashMap<String, RoleList>>,
}
