//! API DTOs module
//!
//! This module contains the data transfer objects for the authentication
//! endpoints. Business endpoints are opaque to the client and have no DTOs here.

pub mod auth;

pub use auth::*;
