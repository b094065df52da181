//! Token exchange against the authentication backend
//!
//! - [`client`] - HTTP entry points (Google token, password, registration, logout)
//! - [`response`] - schema-checked decoding of the backend's answers

pub mod client;
pub mod response;

pub use client::{AuthEndpoint, TokenExchangeClient, LOGOUT_PATH, PROFILE_PATH};
pub use response::{decode_auth_response, Exchanged};
