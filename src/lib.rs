#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the rentme-auth client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod errors;
pub mod exchange;
pub mod flow;
pub mod models;
pub mod redirect;
pub mod sdk;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use errors::{
    ConfigurationError, ExchangeError, MalformedSessionError, SdkLoadError, StorageError,
};
pub use exchange::{AuthEndpoint, Exchanged, TokenExchangeClient};
pub use flow::{FlowEnvironment, SignInFlow};
pub use models::{FailureReason, IdentityCredential, RedirectOutcome, SessionRecord, UserRole};
pub use redirect::{Navigator, RedirectController, RedirectQuery, RedirectState, Route};
pub use sdk::{IdentitySdk, MountPoint, ScriptHost, SdkLoader, SignInInitiator};
pub use session::{BrowserCookieJar, ClientStorage, SessionGate, SessionStore};
pub use settings::{RentmeSettings, SessionMode};
