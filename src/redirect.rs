//! Redirect handling after the backend finishes an OAuth round trip
//!
//! The controller settles exactly once per mount. Session data is persisted
//! before the navigator is asked to move, so the destination page never races
//! the write.

use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

use crate::errors::MalformedSessionError;
use crate::models::{FailureReason, RedirectOutcome, SessionRecord, UserRole};
use crate::session::SessionStore;
use crate::settings::{RouteSettings, SessionMode};
use crate::utils::logging::LoggingHelper;

/// Router seam of the hosting application
pub trait Navigator: Send + Sync {
    fn push(&self, path: &str);
}

/// Destination after an authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Login(Option<FailureReason>),
}

impl Route {
    /// Concrete path under the configured routes
    #[must_use]
    pub fn path(&self, routes: &RouteSettings) -> String {
        match self {
            Self::Dashboard => routes.dashboard.clone(),
            Self::Login(None) => routes.login.clone(),
            Self::Login(Some(reason)) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("error", reason.as_str())
                    .finish();
                format!("{}?{query}", routes.login)
            }
        }
    }
}

/// Query parameters the redirect surface understands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectQuery {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub success: Option<String>,
}

impl RedirectQuery {
    /// Parse a raw query string, with or without the leading `?`
    ///
    /// The first occurrence of a repeated key wins.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let mut parsed = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "token" => &mut parsed.token,
                "userId" => &mut parsed.user_id,
                "email" => &mut parsed.email,
                "role" => &mut parsed.role,
                "success" => &mut parsed.success,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        parsed
    }

    /// Query of a full callback URL
    ///
    /// # Errors
    ///
    /// Returns an error when `url` is not an absolute URL
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url)?;
        Ok(Self::parse(parsed.query().unwrap_or_default()))
    }

    /// `success` is exactly the string `true`
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.success.as_deref() == Some("true")
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    fn session_record(&self) -> Result<SessionRecord, String> {
        let role = self
            .role
            .as_deref()
            .ok_or_else(|| "role is missing".to_string())?
            .parse::<UserRole>()?;
        SessionRecord::new(
            self.user_id.clone().unwrap_or_default(),
            self.email.clone().unwrap_or_default(),
            role,
        )
    }
}

/// Lifecycle of one redirect surface mount
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RedirectState {
    #[default]
    Pending,
    Authenticated(SessionRecord),
    Unauthenticated(FailureReason),
}

impl RedirectState {
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Evaluates the redirect query once and navigates accordingly
pub struct RedirectController {
    store: SessionStore,
    routes: RouteSettings,
    navigator: Arc<dyn Navigator>,
    state: Mutex<RedirectState>,
}

impl RedirectController {
    #[must_use]
    pub fn new(store: SessionStore, routes: RouteSettings, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            store,
            routes,
            navigator,
            state: Mutex::new(RedirectState::Pending),
        }
    }

    #[must_use]
    pub fn state(&self) -> RedirectState {
        self.lock_state().clone()
    }

    /// The loading affordance should be shown
    #[must_use]
    pub fn is_loading(&self) -> bool {
        !self.lock_state().is_settled()
    }

    /// Evaluate in the store's configured mode
    pub fn evaluate(&self, query: &RedirectQuery) -> RedirectState {
        match self.store.mode() {
            SessionMode::Secure => self.evaluate_secure(query),
            SessionMode::Legacy => self.evaluate_legacy(query),
        }
    }

    /// Token-in-URL variant
    ///
    /// A non-empty `token` authenticates when the accompanying user fields
    /// form a complete session; the token is persisted as-is.
    pub fn evaluate_legacy(&self, query: &RedirectQuery) -> RedirectState {
        let mut state = self.lock_state();
        if state.is_settled() {
            return state.clone();
        }

        let outcome = match query.token() {
            None => {
                log::error!("OAuth2 authentication failed: no token received");
                RedirectOutcome::Failure(FailureReason::OauthFailed)
            }
            Some(token) => match query.session_record() {
                Ok(record) => {
                    self.store.write(&record, Some(token));
                    RedirectOutcome::Success(record)
                }
                Err(e) => {
                    log::error!("OAuth2 redirect carried a token but incomplete user data: {e}");
                    RedirectOutcome::Failure(FailureReason::InvalidUserData)
                }
            },
        };

        self.commit(state, outcome)
    }

    /// Cookie-based variant
    ///
    /// Only the `success` flag is read from the URL; user details come from
    /// the script-readable `user_info` cookie the backend set.
    pub fn evaluate_secure(&self, query: &RedirectQuery) -> RedirectState {
        let mut state = self.lock_state();
        if state.is_settled() {
            return state.clone();
        }

        let outcome = if query.succeeded() {
            match self.store.read_user_info_cookie() {
                Ok(record) => {
                    self.store.write(&record, None);
                    RedirectOutcome::Success(record)
                }
                Err(e) => {
                    if e == MalformedSessionError::Missing {
                        log::error!("No user info cookie found");
                    } else {
                        LoggingHelper::log_session_unreadable(&e);
                    }
                    RedirectOutcome::Failure(e.failure_reason())
                }
            }
        } else {
            log::error!("OAuth2 authentication failed");
            RedirectOutcome::Failure(FailureReason::OauthFailed)
        };

        self.commit(state, outcome)
    }

    /// Route for a finished attempt
    #[must_use]
    pub fn decide(outcome: &RedirectOutcome) -> Route {
        match outcome {
            RedirectOutcome::Success(_) => Route::Dashboard,
            RedirectOutcome::Failure(reason) => Route::Login(Some(*reason)),
        }
    }

    /// Record the settled state, then navigate once the lock is released
    fn commit(
        &self,
        mut state: MutexGuard<'_, RedirectState>,
        outcome: RedirectOutcome,
    ) -> RedirectState {
        let path = Self::decide(&outcome).path(&self.routes);
        let settled = match outcome {
            RedirectOutcome::Success(record) => RedirectState::Authenticated(record),
            RedirectOutcome::Failure(reason) => {
                LoggingHelper::log_attempt_failed(reason);
                RedirectState::Unauthenticated(reason)
            }
        };
        *state = settled.clone();
        drop(state);

        // the router may read the controller back while handling the push
        LoggingHelper::log_redirect(&path);
        self.navigator.push(&path);
        settled
    }

    fn lock_state(&self) -> MutexGuard<'_, RedirectState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
