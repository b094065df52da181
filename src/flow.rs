//! Sign-in flow orchestration
//!
//! Wires loader, initiator, exchange client, session store and navigator into
//! the interactive entry points of the login surface. Exchange and session
//! failures never surface as `Err`: they end in a [`RedirectOutcome::Failure`]
//! and the inline error of [`SignInFlow::last_error`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::errors::{ConfigurationError, ExchangeError};
use crate::exchange::{AuthEndpoint, Exchanged, TokenExchangeClient};
use crate::models::{
    FailureReason, IdentityCredential, PasswordCredentials, RedirectOutcome, RegistrationRequest,
};
use crate::redirect::{Navigator, RedirectController, Route};
use crate::sdk::{
    CredentialCallback, IdentitySdk, MountPoint, ScriptHost, SdkLoader, SignInConfig,
    SignInInitiator, SignInSignals,
};
use crate::session::{BrowserCookieJar, ClientStorage, SessionStore};
use crate::settings::{RentmeSettings, RouteSettings};
use crate::utils::logging::LoggingHelper;

/// Host-provided pieces of the environment the flow runs in
#[derive(Clone)]
pub struct FlowEnvironment {
    pub script_host: Arc<dyn ScriptHost>,
    pub sdk: Arc<dyn IdentitySdk>,
    pub navigator: Arc<dyn Navigator>,
    pub storage: Arc<dyn ClientStorage>,
    pub cookies: Arc<BrowserCookieJar>,
}

/// One mounted login surface
pub struct SignInFlow {
    loader: SdkLoader,
    initiator: SignInInitiator,
    config: SignInConfig,
    client: TokenExchangeClient,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    routes: RouteSettings,
    signals: SignInSignals,
    mounted: Arc<AtomicBool>,
    last_error: Mutex<Option<FailureReason>>,
}

impl SignInFlow {
    /// Build a flow from settings and the host environment
    ///
    /// # Errors
    ///
    /// Returns an error when the API base URL is unusable
    pub fn new(settings: &RentmeSettings, env: FlowEnvironment) -> Result<Self, ConfigurationError> {
        let client = TokenExchangeClient::from_settings(&settings.api, env.cookies.clone())?;
        let store = SessionStore::new(settings.session.mode, env.storage, env.cookies);

        Ok(Self {
            loader: SdkLoader::new(env.script_host, settings.google.sdk_url.clone()),
            initiator: SignInInitiator::new(env.sdk),
            config: SignInConfig::from(&settings.google),
            client,
            store,
            navigator: env.navigator,
            routes: settings.routes.clone(),
            signals: SignInSignals::new(),
            mounted: Arc::new(AtomicBool::new(true)),
            last_error: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn signals(&self) -> SignInSignals {
        self.signals.clone()
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub fn client(&self) -> &TokenExchangeClient {
        &self.client
    }

    /// Redirect controller sharing this flow's store and router
    #[must_use]
    pub fn redirect_controller(&self) -> RedirectController {
        RedirectController::new(self.store.clone(), self.routes.clone(), self.navigator.clone())
    }

    /// Reason of the most recent failed attempt, for the inline alert
    #[must_use]
    pub fn last_error(&self) -> Option<FailureReason> {
        *self.lock_last_error()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Tear the surface down; pending completions become no-ops
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    /// Full Google sign-in: load the SDK, render the button, wait for the
    /// user's credential, then exchange it
    ///
    /// Returns `None` when the SDK cannot load, the client id is not
    /// configured, `mount` was already initialized, the provider goes away
    /// without a credential, or the surface was unmounted meanwhile.
    pub async fn run_google(&self, mount: &MountPoint) -> Option<RedirectOutcome> {
        if self.loader.ensure_loaded().await.is_err() {
            return None;
        }
        if !self.is_mounted() {
            return None;
        }
        self.signals.set_sdk_loaded(true);

        let (sender, receiver) = oneshot::channel();
        if !self
            .initiator
            .initialize(&self.config, single_fire(sender), mount)
        {
            return None;
        }

        let Ok(credential) = receiver.await else {
            log::debug!("Identity provider released the callback without a credential");
            return None;
        };
        self.handle_credential(&credential).await
    }

    /// Exchange a credential the provider already delivered
    pub async fn handle_credential(&self, credential: &IdentityCredential) -> Option<RedirectOutcome> {
        log::info!("Google credential received, authenticating...");
        self.begin()?;
        let result = self.client.exchange_google(credential).await;
        self.finish(AuthEndpoint::Google, result)
    }

    /// Email/password login
    pub async fn submit_password(&self, credentials: &PasswordCredentials) -> Option<RedirectOutcome> {
        self.begin()?;
        let result = self.client.login(credentials).await;
        self.finish(AuthEndpoint::Login, result)
    }

    /// Registration followed by sign-in
    pub async fn submit_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Option<RedirectOutcome> {
        self.begin()?;
        let result = self.client.register(request).await;
        self.finish(AuthEndpoint::Register, result)
    }

    /// Backend logout, local clear, then back to the login route
    ///
    /// The local session is cleared even when the backend call fails.
    pub async fn logout(&self) {
        if !self.client.logout().await {
            log::warn!("Backend logout failed, clearing local session anyway");
        }
        self.store.clear();
        if self.is_mounted() {
            self.navigate(Route::Login(None));
        }
    }

    fn begin(&self) -> Option<()> {
        if !self.is_mounted() {
            return None;
        }
        self.signals.set_signing_in(true);
        *self.lock_last_error() = None;
        Some(())
    }

    fn finish(
        &self,
        endpoint: AuthEndpoint,
        result: Result<Exchanged, ExchangeError>,
    ) -> Option<RedirectOutcome> {
        if !self.is_mounted() {
            log::debug!("Surface unmounted, discarding {} result", endpoint.path());
            return None;
        }

        match result {
            Ok(exchanged) => {
                self.store
                    .write(&exchanged.record, exchanged.token.as_deref());
                // a rejected overlapping submission may have set it meanwhile
                *self.lock_last_error() = None;
                self.signals.set_signing_in(false);
                self.navigate(Route::Dashboard);
                Some(RedirectOutcome::Success(exchanged.record))
            }
            Err(e) => {
                let reason = endpoint.failure_reason(&e);
                LoggingHelper::log_attempt_failed(reason);
                *self.lock_last_error() = Some(reason);
                // the running exchange still owns the processing indicator
                if !matches!(e, ExchangeError::InFlight) {
                    self.signals.set_signing_in(false);
                }
                Some(RedirectOutcome::Failure(reason))
            }
        }
    }

    fn navigate(&self, route: Route) {
        let path = route.path(&self.routes);
        LoggingHelper::log_redirect(&path);
        self.navigator.push(&path);
    }

    fn lock_last_error(&self) -> std::sync::MutexGuard<'_, Option<FailureReason>> {
        match self.last_error.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Callback resolving `sender` on its first invocation only
fn single_fire(sender: oneshot::Sender<IdentityCredential>) -> CredentialCallback {
    let slot = Mutex::new(Some(sender));
    Arc::new(move |credential| {
        let sender = match slot.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(sender) => {
                if sender.send(credential).is_err() {
                    log::debug!("Credential arrived after the sign-in flow went away");
                }
            }
            None => log::debug!("Ignoring repeated credential callback"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryStorage;
    use crate::testing::fixtures::TestFixtures;
    use crate::testing::mock::{FakeIdentitySdk, FakeScriptHost, RecordingNavigator};

    fn flow_with(host: FakeScriptHost, client_id: Option<&str>) -> (SignInFlow, Arc<FakeIdentitySdk>) {
        let sdk = Arc::new(FakeIdentitySdk::new());
        let mut settings = TestFixtures::settings("http://127.0.0.1:9");
        settings.google.client_id = client_id.map(ToString::to_string);
        let env = FlowEnvironment {
            script_host: Arc::new(host),
            sdk: sdk.clone(),
            navigator: Arc::new(RecordingNavigator::new()),
            storage: Arc::new(MemoryStorage::new()),
            cookies: Arc::new(BrowserCookieJar::new("127.0.0.1")),
        };
        (SignInFlow::new(&settings, env).unwrap(), sdk)
    }

    #[test]
    fn test_single_fire_delivers_first_credential_only() {
        let (sender, mut receiver) = oneshot::channel();
        let callback = single_fire(sender);

        callback(IdentityCredential::new("tok-1"));
        callback(IdentityCredential::new("tok-2"));

        assert_eq!(receiver.try_recv().unwrap().credential, "tok-1");
    }

    #[tokio::test]
    async fn test_sdk_load_failure_leaves_flag_unset() {
        let (flow, sdk) = flow_with(FakeScriptHost::failing("blocked"), Some("client-123"));

        assert_eq!(flow.run_google(&MountPoint::attached("google-button")).await, None);
        assert!(!flow.signals().sdk_loaded());
        assert!(sdk.initialize_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_client_id_never_initializes() {
        let (flow, sdk) = flow_with(FakeScriptHost::auto_loading(), Some("YOUR_GOOGLE_CLIENT_ID"));

        assert_eq!(flow.run_google(&MountPoint::attached("google-button")).await, None);
        assert!(flow.signals().sdk_loaded());
        assert!(sdk.initialize_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unmounted_flow_ignores_submissions() {
        let (flow, _) = flow_with(FakeScriptHost::auto_loading(), Some("client-123"));
        flow.unmount();

        let outcome = flow.submit_password(&TestFixtures::password_credentials()).await;
        assert_eq!(outcome, None);
        assert!(!flow.signals().is_signing_in());
        assert_eq!(flow.last_error(), None);
    }

    #[tokio::test]
    async fn test_network_failure_sets_inline_error() {
        let (flow, _) = flow_with(FakeScriptHost::auto_loading(), Some("client-123"));

        let outcome = flow.submit_password(&TestFixtures::password_credentials()).await;

        assert_eq!(outcome, Some(RedirectOutcome::Failure(FailureReason::NetworkError)));
        assert_eq!(flow.last_error(), Some(FailureReason::NetworkError));
        assert!(!flow.signals().is_signing_in());
        assert_eq!(flow.store().read(), None);
    }
}
