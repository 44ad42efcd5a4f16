//! Wire types shared between the VaultCore client and its backends
//!
//! - `api`: request and response bodies for the authentication endpoints
//! - `common`: token claims and error bodies used across endpoints

pub mod api;
pub mod common;

pub use api::*;
pub use common::*;
