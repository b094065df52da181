//! Testing utilities for the sign-in flow
//!
//! Fakes for the host environment seams plus canned data, shared by the unit
//! tests and the integration tests under `tests/` (feature `testing`).
//!
//! - [`fixtures`] - settings, records and backend bodies
//! - [`mock`] - fake document, identity SDK and router
//!
//! ```rust
//! use rentme_auth::testing::{fixtures::TestFixtures, mock::FakeIdentitySdk};
//!
//! let sdk = FakeIdentitySdk::new();
//! let settings = TestFixtures::settings("http://127.0.0.1:8080");
//! assert!(sdk.initialize_calls().is_empty());
//! assert_eq!(settings.api.base_url, "http://127.0.0.1:8080");
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;
pub use mock::{FakeIdentitySdk, FakeScriptHost, RecordingNavigator};

/// Common test constants
pub mod constants {
    pub const TEST_CLIENT_ID: &str = "1234567890-test.apps.googleusercontent.com";
    pub const TEST_USER_ID: &str = "123";
    pub const TEST_EMAIL: &str = "a@b.com";
    pub const TEST_PASSWORD: &str = "correct horse battery staple";
    pub const TEST_CREDENTIAL: &str = "tok-1";
    /// Name of the backend's HTTP-only session cookie
    pub const TEST_SESSION_COOKIE: &str = "jwt_token";
}
