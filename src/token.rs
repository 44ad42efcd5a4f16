//! Local inspection of bearer tokens
//!
//! Reads the payload of a JWT-shaped access token without verifying its
//! signature. Every function here fails closed: a token that cannot be read
//! has no identity, no roles, and is expired.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use vaultcore_protocol::AccessTokenClaims;

/// Roles that grant access to the admin console
pub const ADMIN_ROLES: [&str; 2] = ["ADMIN", "ROLE_ADMIN"];

/// Display name used when the token carries neither `name` nor
/// `preferred_username`
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// Who the token was issued to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: Option<String>,
    pub email: Option<String>,
    pub display_name: String,
}

/// Decode the claims of `token`.
///
/// Returns `None` unless the token has exactly three dot-separated segments
/// and the middle one is base64-encoded JSON claims.
pub fn decode(token: &str) -> Option<AccessTokenClaims> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = decode_segment(payload)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

// JWTs use the URL-safe alphabet without padding, but some issuers pad or use
// the standard alphabet.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    if trimmed.is_empty() {
        return None;
    }

    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()
}

/// Whether `token` is expired right now.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// Whether `token` is expired at `now`. Unreadable tokens and tokens
/// without an `exp` claim are expired.
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match expiry_millis(token) {
        Some(exp_ms) => now.timestamp_millis() >= exp_ms,
        None => true,
    }
}

/// Expiry instant of `token`, if it can be read.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    expiry_millis(token).and_then(DateTime::from_timestamp_millis)
}

// `exp` in milliseconds, truncated; non-finite values count as missing.
fn expiry_millis(token: &str) -> Option<i64> {
    let exp = decode(token)?.exp?;
    exp.is_finite().then(|| (exp * 1000.0).trunc() as i64)
}

pub fn extract_identity(token: &str) -> Option<Identity> {
    let claims = decode(token)?;

    let display_name = claims
        .name
        .filter(|name| !name.is_empty())
        .or(claims.preferred_username.filter(|name| !name.is_empty()))
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

    Some(Identity {
        subject: claims.sub,
        email: claims.email,
        display_name,
    })
}

/// Realm roles merged with every client's roles, de-duplicated.
/// Empty for an unreadable token.
pub fn extract_roles(token: &str) -> BTreeSet<String> {
    let Some(claims) = decode(token) else {
        return BTreeSet::new();
    };

    let realm_roles = claims.realm_access.into_iter().flat_map(|access| access.roles);
    let resource_roles = claims
        .resource_access
        .into_iter()
        .flat_map(|clients| clients.into_values())
        .flat_map(|access| access.roles);

    realm_roles.chain(resource_roles).collect()
}

pub fn is_admin(token: &str) -> bool {
    let roles = extract_roles(token);
    ADMIN_ROLES.iter().any(|role| roles.contains(*role))
}


#[cfg(test)]
mod tests {
    use super::test_tokens::jwt;
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert!(decode("not-a-jwt").is_none());
        assert!(decode("").is_none());
        assert!(decode("a.b").is_none());
        assert!(decode("a.b.c").is_none());
        assert!(decode("a.b.c.d").is_none());
        assert!(decode("a..c").is_none());
    }

    #[test]
    fn test_decode_rejects_non_json_payload() {
        let payload = URL_SAFE_NO_PAD.encode("not json");
        assert!(decode(&format!("h.{payload}.s")).is_none());

        let payload = URL_SAFE_NO_PAD.encode("[]");
        assert!(decode(&format!("h.{payload}.s")).is_none());
    }

    #[test]
    fn test_decode_accepts_padded_standard_base64() {
        let payload = STANDARD.encode(r#"{"sub":"u-1","name":"Ada?"}"#);
        let claims = decode(&format!("h.{payload}.s")).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_missing_exp_is_expired() {
        let token = jwt(json!({ "sub": "u-1" }));
        assert!(is_expired(&token));
        assert!(is_expired("garbage"));
    }

    #[test]
    fn test_expiry_boundaries() {
        let now = Utc::now();
        let past = jwt(json!({ "exp": (now - Duration::seconds(1)).timestamp() }));
        let future = jwt(json!({ "exp": (now + Duration::seconds(1)).timestamp() }));

        assert!(is_expired_at(&past, now));
        assert!(!is_expired_at(&future, now));
    }

    #[test]
    fn test_expired_exactly_at_exp() {
        let exp = 1_700_000_000;
        let token = jwt(json!({ "exp": exp }));
        let at = DateTime::from_timestamp(exp, 0).unwrap();
        assert!(is_expired_at(&token, at));
        assert!(!is_expired_at(&token, at - Duration::milliseconds(1)));
        assert_eq!(expires_at(&token), Some(at));
    }

    #[test]
    fn test_fractional_exp_is_read() {
        let token = jwt(json!({ "sub": "u-1", "name": "Ada", "exp": 4102444800.5 }));
        assert_eq!(extract_identity(&token).unwrap().display_name, "Ada");
        assert!(!is_expired(&token));

        let at = DateTime::from_timestamp_millis(4_102_444_800_500).unwrap();
        assert_eq!(expires_at(&token), Some(at));
        assert!(is_expired_at(&token, at));
        assert!(!is_expired_at(&token, at - Duration::milliseconds(1)));
    }

    #[test]
    fn test_identity_display_name_fallbacks() {
        let full = jwt(json!({
            "sub": "u-1",
            "email": "ada@example.com",
            "name": "Ada Lovelace",
            "preferred_username": "ada"
        }));
        let identity = extract_identity(&full).unwrap();
        assert_eq!(identity.subject.as_deref(), Some("u-1"));
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
        assert_eq!(identity.display_name, "Ada Lovelace");

        let username_only = jwt(json!({ "sub": "u-1", "preferred_username": "ada" }));
        assert_eq!(extract_identity(&username_only).unwrap().display_name, "ada");

        let bare = jwt(json!({ "sub": "u-1" }));
        assert_eq!(extract_identity(&bare).unwrap().display_name, "User");

        assert!(extract_identity("a.b").is_none());
    }

    #[test]
    fn test_role_merge_deduplicates() {
        let token = jwt(json!({
            "realm_access": { "roles": ["USER", "ADMIN"] },
            "resource_access": {
                "app-a": { "roles": ["ADMIN"] },
                "app-b": { "roles": ["AUDITOR"] },
                "app-c": {}
            }
        }));

        let roles = extract_roles(&token);
        let expected: BTreeSet<String> = ["ADMIN", "AUDITOR", "USER"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(roles, expected);
    }

    #[test]
    fn test_role_merge_realm_and_resource() {
        let token = jwt(json!({
            "realm_access": { "roles": ["USER"] },
            "resource_access": { "app-a": { "roles": ["ADMIN"] } }
        }));
        let roles = extract_roles(&token);
        assert_eq!(roles.len(), 2);
        assert!(roles.contains("USER"));
        assert!(roles.contains("ADMIN"));
    }

    #[test]
    fn test_malformed_token_has_no_roles() {
        assert!(extract_roles("not-a-jwt").is_empty());
        assert!(!is_admin("not-a-jwt"));
    }

    #[test]
    fn test_is_admin() {
        let admin = jwt(json!({ "realm_access": { "roles": ["ROLE_ADMIN"] } }));
        let user = jwt(json!({ "realm_access": { "roles": ["USER"] } }));
        assert!(is_admin(&admin));
        assert!(!is_admin(&user));
    }
}
