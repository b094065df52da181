use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::IdentityCredential;
use crate::settings::{validate_client_id, GoogleSettings};
use crate::utils::logging::LoggingHelper;

/// Callback the provider invokes with the user's identity token
pub type CredentialCallback = Arc<dyn Fn(IdentityCredential) + Send + Sync>;

/// Configuration handed to the provider's `initialize`
#[derive(Clone)]
pub struct IdConfiguration {
    pub client_id: String,
    pub callback: CredentialCallback,
    pub auto_select: bool,
    pub cancel_on_tap_outside: bool,
}

impl std::fmt::Debug for IdConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdConfiguration")
            .field("client_id", &self.client_id)
            .field("auto_select", &self.auto_select)
            .field("cancel_on_tap_outside", &self.cancel_on_tap_outside)
            .finish_non_exhaustive()
    }
}

/// Appearance of the provider-rendered button
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonOptions {
    pub theme: String,
    pub size: String,
    pub width: String,
    pub text: String,
    pub shape: String,
    pub logo_alignment: String,
}

impl Default for ButtonOptions {
    fn default() -> Self {
        Self {
            theme: "outline".to_string(),
            size: "large".to_string(),
            width: "100%".to_string(),
            text: "signin_with".to_string(),
            shape: "rectangular".to_string(),
            logo_alignment: "left".to_string(),
        }
    }
}

/// Element the sign-in button renders into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub id: String,
    pub attached: bool,
}

impl MountPoint {
    #[must_use]
    pub fn attached(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attached: true,
        }
    }

    #[must_use]
    pub fn detached(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attached: false,
        }
    }
}

/// The identity provider SDK surface the initiator needs
///
/// Injected instead of read from a global slot so tests can substitute a fake.
pub trait IdentitySdk: Send + Sync {
    fn initialize(&self, config: IdConfiguration);
    fn render_button(&self, mount: &MountPoint, options: &ButtonOptions);
}

/// Application-side sign-in configuration
#[derive(Debug, Clone, Default)]
pub struct SignInConfig {
    pub client_id: Option<String>,
    pub auto_select: bool,
    pub cancel_on_outside_tap: bool,
}

impl From<&GoogleSettings> for SignInConfig {
    fn from(google: &GoogleSettings) -> Self {
        Self {
            client_id: google.client_id.clone(),
            auto_select: google.auto_select,
            cancel_on_outside_tap: google.cancel_on_tap_outside,
        }
    }
}

#[derive(Debug, Default)]
struct SignalState {
    sdk_loaded: AtomicBool,
    is_signing_in: AtomicBool,
}

/// UI signals shared with the rendering layer
///
/// `sdk_loaded` hides the loading placeholder, `is_signing_in` shows the
/// processing indicator. Neither takes part in the protocol.
#[derive(Debug, Clone, Default)]
pub struct SignInSignals {
    state: Arc<SignalState>,
}

impl SignInSignals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sdk_loaded(&self) -> bool {
        self.state.sdk_loaded.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_signing_in(&self) -> bool {
        self.state.is_signing_in.load(Ordering::Acquire)
    }

    pub fn set_sdk_loaded(&self, loaded: bool) {
        self.state.sdk_loaded.store(loaded, Ordering::Release);
    }

    pub fn set_signing_in(&self, signing_in: bool) {
        self.state.is_signing_in.store(signing_in, Ordering::Release);
    }
}

/// Configures the provider SDK and renders its button
///
/// One initiator belongs to one loader resolution; each mount point is
/// initialized at most once.
pub struct SignInInitiator {
    sdk: Arc<dyn IdentitySdk>,
    button: ButtonOptions,
    initialized_mounts: Mutex<HashSet<String>>,
}

impl SignInInitiator {
    #[must_use]
    pub fn new(sdk: Arc<dyn IdentitySdk>) -> Self {
        Self {
            sdk,
            button: ButtonOptions::default(),
            initialized_mounts: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn with_button_options(mut self, button: ButtonOptions) -> Self {
        self.button = button;
        self
    }

    /// Initialize the SDK and render the button into `mount`
    ///
    /// Returns `false` without touching the SDK when the client id is absent or
    /// a placeholder, or when `mount` was already initialized. A detached mount
    /// still initializes the SDK; only the render is skipped.
    pub fn initialize(
        &self,
        config: &SignInConfig,
        on_credential: CredentialCallback,
        mount: &MountPoint,
    ) -> bool {
        let client_id = match validate_client_id(config.client_id.as_deref()) {
            Ok(id) => id.to_string(),
            Err(e) => {
                LoggingHelper::log_configuration_error(&e);
                return false;
            }
        };

        {
            let mut mounts = match self.initialized_mounts.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !mounts.insert(mount.id.clone()) {
                log::debug!("Sign-in already initialized for mount '{}'", mount.id);
                return false;
            }
        }

        log::info!("Initializing Google Sign-In...");
        self.sdk.initialize(IdConfiguration {
            client_id,
            callback: on_credential,
            auto_select: config.auto_select,
            cancel_on_tap_outside: config.cancel_on_outside_tap,
        });

        if mount.attached {
            self.sdk.render_button(mount, &self.button);
        } else {
            log::debug!("Mount '{}' not attached, skipping button render", mount.id);
        }

        log::info!("Google Sign-In initialized successfully");
        true
    }
}
