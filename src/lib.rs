//! VaultCore client
//!
//! Authenticated access to the VaultCore API: a persisted session, local
//! inspection of access tokens, and an HTTP client that refreshes the session
//! transparently when the backend rejects an access token.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod store;
pub mod token;
pub mod version;

pub use auth::{AuthService, LoginOutcome, SessionStatus};
pub use client::{ApiClient, BaseClient, RequestOptions, SessionExpiredHook};
pub use config::{ClientConfig, ClientConfigBuilder, IdentityConfig};
pub use error::{ErrorCode, Result, VaultError};
pub use store::{FileSessionStore, MemorySessionStore, SessionKey, SessionStore};
pub use token::Identity;
