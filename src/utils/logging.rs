// Centralized logging for the sign-in flow so each event has one wording.
// Tokens and passwords never pass through here.
use log::{debug, error, info, warn};

use crate::errors::{ConfigurationError, MalformedSessionError, SdkLoadError};
use crate::models::{FailureReason, SessionRecord};

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log identity SDK readiness
    pub fn log_sdk_loaded(src: &str) {
        info!("✅ Google SDK loaded successfully ({src})");
    }

    /// Log an SDK script load failure
    pub fn log_sdk_load_failed(err: &SdkLoadError) {
        error!("❌ Failed to load Google SDK: {err}");
    }

    /// Log a sign-in configuration problem; the caller aborts quietly
    pub fn log_configuration_error(err: &ConfigurationError) {
        error!("❌ Google Client ID not configured: {err}");
    }

    /// Log the start of a backend exchange
    pub fn log_exchange_start(endpoint: &str) {
        info!("🔄 Sending credentials to backend ({endpoint})");
    }

    /// Log a backend rejection with its raw body
    pub fn log_exchange_rejected(endpoint: &str, status: u16, body: &str) {
        error!("Backend authentication failed: {endpoint} answered HTTP {status}: {body}");
    }

    /// Log an established session
    pub fn log_exchange_success(endpoint: &str, record: &SessionRecord) {
        info!(
            "Login successful via {endpoint} for user {} (role {})",
            record.user_id, record.role
        );
    }

    /// Log an attempt that ended without a session
    pub fn log_attempt_failed(reason: FailureReason) {
        warn!("Authentication attempt failed: {reason}");
    }

    /// Log a persisted session snapshot
    pub fn log_session_written(record: &SessionRecord) {
        debug!(
            "Session stored: userId={}, email={}, role={}",
            record.user_id, record.email, record.role
        );
    }

    /// Log a missing or corrupt session carrier
    pub fn log_session_unreadable(err: &MalformedSessionError) {
        match err {
            MalformedSessionError::Missing => debug!("No session data present"),
            other => error!("Failed to parse user info: {other}"),
        }
    }

    /// Log removal of the non-sensitive carrier
    pub fn log_session_cleared() {
        info!("Session data cleared from client storage");
    }

    /// Warn that the token-in-URL mode is active
    pub fn log_legacy_mode_in_use() {
        warn!("⚠️  Legacy session mode: bearer token is kept in script-readable storage");
    }

    /// Log where the redirect controller is sending the user
    pub fn log_redirect(destination: &str) {
        info!("Redirecting to {destination}");
    }
}
