//! Identity provider SDK integration
//!
//! - [`loader`] - inserts the provider script once and reports readiness
//! - [`initiator`] - configures the SDK and renders its sign-in button

pub mod initiator;
pub mod loader;

pub use initiator::{
    ButtonOptions, CredentialCallback, IdConfiguration, IdentitySdk, MountPoint, SignInConfig,
    SignInInitiator, SignInSignals,
};
pub use loader::{ScriptElement, ScriptHost, SdkLoader, GOOGLE_SDK_URL};
