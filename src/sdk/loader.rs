use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::SdkLoadError;
use crate::utils::logging::LoggingHelper;

/// Default Google Identity Services script
pub const GOOGLE_SDK_URL: &str = "https://accounts.google.com/gsi/client";

/// Script element as inserted into the hosting document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptElement {
    pub src: String,
    pub async_load: bool,
    pub defer: bool,
}

impl ScriptElement {
    /// Non-blocking, deferred script pointing at `src`
    #[must_use]
    pub fn deferred(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            async_load: true,
            defer: true,
        }
    }
}

/// The document the identity SDK gets loaded into
///
/// Insertion is synchronous; readiness is reported through `script_loaded`,
/// which resolves once the element fires its load or error event.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// The SDK global is already installed
    fn sdk_present(&self) -> bool;

    /// A script element with this `src` is already in the document
    fn has_script(&self, src: &str) -> bool;

    fn append_script(&self, script: ScriptElement);

    /// Wait for the element with this `src` to finish loading
    async fn script_loaded(&self, src: &str) -> Result<(), SdkLoadError>;
}

/// Makes sure the identity SDK is present exactly once
#[derive(Clone)]
pub struct SdkLoader {
    host: Arc<dyn ScriptHost>,
    src: String,
}

impl SdkLoader {
    #[must_use]
    pub fn new(host: Arc<dyn ScriptHost>, src: impl Into<String>) -> Self {
        Self {
            host,
            src: src.into(),
        }
    }

    #[must_use]
    pub fn src(&self) -> &str {
        &self.src
    }

    /// Resolve once the SDK is usable
    ///
    /// Calling this again, or concurrently, never inserts a second script:
    /// later callers find the pending element and wait on it.
    ///
    /// # Errors
    ///
    /// Returns [`SdkLoadError`] when the script reports a load error
    pub async fn ensure_loaded(&self) -> Result<(), SdkLoadError> {
        if self.host.sdk_present() {
            log::debug!("Identity SDK already present");
            return Ok(());
        }

        if self.host.has_script(&self.src) {
            log::debug!("Identity SDK script already requested, waiting for it");
        } else {
            self.host.append_script(ScriptElement::deferred(&self.src));
        }

        match self.host.script_loaded(&self.src).await {
            Ok(()) => {
                LoggingHelper::log_sdk_loaded(&self.src);
                Ok(())
            }
            Err(e) => {
                LoggingHelper::log_sdk_load_failed(&e);
                Err(e)
            }
        }
    }
}
