//! Fake implementations of the host environment seams

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use crate::errors::SdkLoadError;
use crate::models::IdentityCredential;
use crate::redirect::Navigator;
use crate::sdk::{ButtonOptions, IdConfiguration, IdentitySdk, MountPoint, ScriptElement, ScriptHost};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-memory document that records inserted scripts
///
/// Script loads resolve from a shared outcome slot: preset for the
/// auto-loading and failing variants, filled by [`FakeScriptHost::complete_load`]
/// for the manual one.
pub struct FakeScriptHost {
    present: AtomicBool,
    scripts: Mutex<Vec<ScriptElement>>,
    outcome: watch::Sender<Option<Result<(), String>>>,
    waiters: watch::Sender<usize>,
}

impl FakeScriptHost {
    fn with_outcome(present: bool, outcome: Option<Result<(), String>>) -> Self {
        Self {
            present: AtomicBool::new(present),
            scripts: Mutex::new(Vec::new()),
            outcome: watch::Sender::new(outcome),
            waiters: watch::Sender::new(0),
        }
    }

    /// The SDK global is installed before anything runs
    #[must_use]
    pub fn with_sdk_present() -> Self {
        Self::with_outcome(true, Some(Ok(())))
    }

    /// Inserted scripts load immediately
    #[must_use]
    pub fn auto_loading() -> Self {
        Self::with_outcome(false, Some(Ok(())))
    }

    /// Inserted scripts stay pending until [`FakeScriptHost::complete_load`]
    #[must_use]
    pub fn manual() -> Self {
        Self::with_outcome(false, None)
    }

    /// Inserted scripts fire their error event with `reason`
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self::with_outcome(false, Some(Err(reason.to_string())))
    }

    #[must_use]
    pub fn inserted_scripts(&self) -> Vec<ScriptElement> {
        lock(&self.scripts).clone()
    }

    /// Resolve every pending and future load
    pub fn complete_load(&self, result: Result<(), String>) {
        self.outcome.send_replace(Some(result));
    }

    /// Wait until `count` callers are blocked in `script_loaded`
    pub async fn wait_for_waiters(&self, count: usize) {
        let mut waiters = self.waiters.subscribe();
        let _ = waiters.wait_for(|n| *n >= count).await;
    }
}

#[async_trait]
impl ScriptHost for FakeScriptHost {
    fn sdk_present(&self) -> bool {
        self.present.load(Ordering::Acquire)
    }

    fn has_script(&self, src: &str) -> bool {
        lock(&self.scripts).iter().any(|s| s.src == src)
    }

    fn append_script(&self, script: ScriptElement) {
        lock(&self.scripts).push(script);
    }

    async fn script_loaded(&self, src: &str) -> Result<(), SdkLoadError> {
        let mut outcome = self.outcome.subscribe();
        self.waiters.send_modify(|n| *n += 1);

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map(|value| value.clone().unwrap_or(Ok(())))
            .unwrap_or_else(|_| Err("document closed".to_string()));

        match settled {
            Ok(()) => {
                self.present.store(true, Ordering::Release);
                Ok(())
            }
            Err(reason) => Err(SdkLoadError {
                src: src.to_string(),
                reason,
            }),
        }
    }
}

/// Identity SDK double recording every call
pub struct FakeIdentitySdk {
    configs: Mutex<Vec<IdConfiguration>>,
    renders: Mutex<Vec<(MountPoint, ButtonOptions)>>,
    initialized: watch::Sender<usize>,
}

impl Default for FakeIdentitySdk {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeIdentitySdk {
    #[must_use]
    pub fn new() -> Self {
        Self {
            configs: Mutex::new(Vec::new()),
            renders: Mutex::new(Vec::new()),
            initialized: watch::Sender::new(0),
        }
    }

    #[must_use]
    pub fn initialize_calls(&self) -> Vec<IdConfiguration> {
        lock(&self.configs).clone()
    }

    #[must_use]
    pub fn render_calls(&self) -> Vec<(MountPoint, ButtonOptions)> {
        lock(&self.renders).clone()
    }

    /// Simulate the user completing the provider's consent dialog
    ///
    /// # Panics
    ///
    /// Panics when the SDK was never initialized
    pub fn sign_in_with(&self, credential: &str) {
        let callback = lock(&self.configs)
            .last()
            .map(|config| config.callback.clone())
            .expect("sign_in_with called before initialize");
        callback(IdentityCredential::new(credential));
    }

    /// Wait until `initialize` was called at least `count` times
    pub async fn wait_for_initialize(&self, count: usize) {
        let mut initialized = self.initialized.subscribe();
        let _ = initialized.wait_for(|n| *n >= count).await;
    }
}

impl IdentitySdk for FakeIdentitySdk {
    fn initialize(&self, config: IdConfiguration) {
        lock(&self.configs).push(config);
        self.initialized.send_modify(|n| *n += 1);
    }

    fn render_button(&self, mount: &MountPoint, options: &ButtonOptions) {
        lock(&self.renders).push((mount.clone(), options.clone()));
    }
}

/// Router double keeping every pushed path
#[derive(Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pushed(&self) -> Vec<String> {
        lock(&self.paths).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn push(&self, path: &str) {
        lock(&self.paths).push(path.to_string());
    }
}
