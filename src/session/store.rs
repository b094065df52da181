use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::MalformedSessionError;
use crate::models::{id_as_string, SessionRecord, UserRole};
use crate::session::cookie::{BrowserCookieJar, SESSION_COOKIE_MAX_AGE_SECS, USER_INFO_COOKIE};
use crate::session::storage::ClientStorage;
use crate::settings::SessionMode;
use crate::utils::logging::LoggingHelper;

/// Canonical client storage keys
pub const KEY_USER_ID: &str = "userId";
pub const KEY_EMAIL: &str = "email";
pub const KEY_ROLE: &str = "role";
/// Bearer token key, only ever written in legacy mode
pub const KEY_TOKEN: &str = "token";

/// Keys older builds of the frontend wrote; removed on clear
const LEGACY_DRIFT_KEYS: &[&str] = &["user_id", "user_email", "user_role", "jwt_token"];

/// Wire shape of the `user_info` cookie
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoCookie {
    #[serde(deserialize_with = "id_as_string")]
    user_id: String,
    email: String,
    role: String,
}

/// What a protected page should do after consulting the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionGate {
    Allowed(SessionRecord),
    RedirectToLogin,
}

/// Persisted session state split over two carriers
///
/// The non-sensitive carrier is the script-readable `user_info` cookie plus
/// its mirror in client storage. It feeds the UI and must never be used as
/// an authorization check. In secure mode the bearer token lives only in the
/// backend's HTTP-only cookie.
#[derive(Clone)]
pub struct SessionStore {
    mode: SessionMode,
    storage: Arc<dyn ClientStorage>,
    cookies: Arc<BrowserCookieJar>,
}

impl SessionStore {
    #[must_use]
    pub fn new(
        mode: SessionMode,
        storage: Arc<dyn ClientStorage>,
        cookies: Arc<BrowserCookieJar>,
    ) -> Self {
        Self {
            mode,
            storage,
            cookies,
        }
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Persist `record`; `token` is kept only in legacy mode
    pub fn write(&self, record: &SessionRecord, token: Option<&str>) {
        match self.mode {
            SessionMode::Secure => {
                if token.is_some() {
                    log::debug!("Secure session mode: not persisting bearer token");
                }
                self.write_user_info_cookie(record);
            }
            SessionMode::Legacy => {
                LoggingHelper::log_legacy_mode_in_use();
                if let Some(token) = token.filter(|t| !t.is_empty()) {
                    self.storage.set(KEY_TOKEN, token);
                }
            }
        }
        self.mirror(record);
        LoggingHelper::log_session_written(record);
    }

    /// Current session, if one is established and readable
    ///
    /// A missing or malformed carrier yields `None`, never an error.
    #[must_use]
    pub fn read(&self) -> Option<SessionRecord> {
        self.read_checked()
            .map_err(|e| LoggingHelper::log_session_unreadable(&e))
            .ok()
    }

    /// Like [`SessionStore::read`], keeping the reason a read failed
    ///
    /// In secure mode a decoded cookie is mirrored into client storage.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedSessionError::Missing`] when no session is stored
    pub fn read_checked(&self) -> Result<SessionRecord, MalformedSessionError> {
        match self.mode {
            SessionMode::Secure => {
                let record = self.read_user_info_cookie()?;
                self.mirror(&record);
                Ok(record)
            }
            SessionMode::Legacy => self.read_storage().ok_or(MalformedSessionError::Missing),
        }
    }

    /// Parse the `user_info` cookie, telling absence apart from corruption
    ///
    /// # Errors
    ///
    /// Returns [`MalformedSessionError::Missing`] when the cookie is absent and
    /// another variant when it does not decode into a complete session
    pub fn read_user_info_cookie(&self) -> Result<SessionRecord, MalformedSessionError> {
        let raw = self
            .cookies
            .script_cookie(USER_INFO_COOKIE)
            .filter(|v| !v.is_empty())
            .ok_or(MalformedSessionError::Missing)?;
        decode_user_info(&raw)
    }

    /// Legacy bearer token, if one was stored
    #[must_use]
    pub fn legacy_token(&self) -> Option<String> {
        match self.mode {
            SessionMode::Legacy => self.storage.get(KEY_TOKEN).filter(|t| !t.is_empty()),
            SessionMode::Secure => None,
        }
    }

    /// Remove every non-sensitive entry
    ///
    /// The HTTP-only session cookie is untouched; only a backend logout can
    /// expire it.
    pub fn clear(&self) {
        for key in [KEY_USER_ID, KEY_EMAIL, KEY_ROLE, KEY_TOKEN]
            .iter()
            .chain(LEGACY_DRIFT_KEYS)
        {
            self.storage.remove(key);
        }
        self.cookies.remove_script_cookie(USER_INFO_COOKIE);
        LoggingHelper::log_session_cleared();
    }

    /// Gate for protected pages: the session or a bounce to login
    #[must_use]
    pub fn restore(&self) -> SessionGate {
        match self.read() {
            Some(record) => SessionGate::Allowed(record),
            None => SessionGate::RedirectToLogin,
        }
    }

    fn write_user_info_cookie(&self, record: &SessionRecord) {
        let payload = UserInfoCookie {
            user_id: record.user_id.clone(),
            email: record.email.clone(),
            role: record.role.as_str().to_string(),
        };
        match serde_json::to_string(&payload) {
            Ok(json) => self.cookies.set_script_cookie(
                USER_INFO_COOKIE,
                &urlencoding::encode(&json),
                SESSION_COOKIE_MAX_AGE_SECS,
            ),
            Err(e) => log::error!("Failed to encode user_info cookie: {e}"),
        }
    }

    fn mirror(&self, record: &SessionRecord) {
        self.storage.set(KEY_USER_ID, &record.user_id);
        self.storage.set(KEY_EMAIL, &record.email);
        self.storage.set(KEY_ROLE, record.role.as_str());
    }

    fn read_storage(&self) -> Option<SessionRecord> {
        let user_id = self.storage.get(KEY_USER_ID)?;
        let email = self.storage.get(KEY_EMAIL)?;
        let role = self.storage.get(KEY_ROLE)?.parse::<UserRole>().ok()?;
        SessionRecord::new(user_id, email, role).ok()
    }
}

/// Decode a URL-encoded JSON `user_info` value
///
/// `+` is read as a space, matching form encoding used by servlet backends.
///
/// # Errors
///
/// Returns an error when the value is not valid JSON or lacks a field
pub fn decode_user_info(raw: &str) -> Result<SessionRecord, MalformedSessionError> {
    let form_decoded = raw.replace('+', " ");
    let decoded = urlencoding::decode(&form_decoded)
        .map_err(|e| MalformedSessionError::InvalidJson(e.to_string()))?;
    let info: UserInfoCookie = serde_json::from_str(&decoded)
        .map_err(|e| MalformedSessionError::InvalidJson(e.to_string()))?;
    let role = info
        .role
        .parse::<UserRole>()
        .map_err(MalformedSessionError::Incomplete)?;
    SessionRecord::new(info.user_id, info.email, role).map_err(MalformedSessionError::Incomplete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::storage::MemoryStorage;

    fn record() -> SessionRecord {
        SessionRecord::new("123", "a@b.com", UserRole::Renter).unwrap()
    }

    fn store(mode: SessionMode) -> (SessionStore, Arc<MemoryStorage>, Arc<BrowserCookieJar>) {
        let storage = Arc::new(MemoryStorage::new());
        let jar = Arc::new(BrowserCookieJar::new("localhost"));
        (
            SessionStore::new(mode, storage.clone(), jar.clone()),
            storage,
            jar,
        )
    }

    #[test]
    fn test_secure_write_never_persists_token() {
        let (store, storage, jar) = store(SessionMode::Secure);
        store.write(&record(), Some("bearer-abc"));

        let entries = storage.snapshot();
        assert_eq!(entries.get(KEY_USER_ID).map(String::as_str), Some("123"));
        assert_eq!(entries.get(KEY_EMAIL).map(String::as_str), Some("a@b.com"));
        assert_eq!(entries.get(KEY_ROLE).map(String::as_str), Some("RENTER"));
        assert!(entries.values().all(|v| !v.contains("bearer-abc")));
        assert!(!jar.script_cookie(USER_INFO_COOKIE).unwrap().contains("bearer-abc"));
        assert_eq!(store.legacy_token(), None);
    }

    #[test]
    fn test_secure_round_trip() {
        let (store, _, _) = store(SessionMode::Secure);
        store.write(&record(), None);
        assert_eq!(store.read(), Some(record()));
    }

    #[test]
    fn test_legacy_round_trip_keeps_token() {
        let (store, storage, _) = store(SessionMode::Legacy);
        store.write(&record(), Some("bearer-abc"));

        assert_eq!(store.read(), Some(record()));
        assert_eq!(store.legacy_token().as_deref(), Some("bearer-abc"));
        assert_eq!(storage.get(KEY_TOKEN).as_deref(), Some("bearer-abc"));
    }

    #[test]
    fn test_secure_read_decodes_backend_cookie() {
        let (store, storage, jar) = store(SessionMode::Secure);
        jar.set_script_cookie(
            USER_INFO_COOKIE,
            "%7B%22userId%22%3A42%2C%22email%22%3A%22owner%40rentme.test%22%2C%22role%22%3A%22VEHICLE_OWNER%22%7D",
            60,
        );

        let read = store.read().unwrap();
        assert_eq!(read.user_id, "42");
        assert_eq!(read.email, "owner@rentme.test");
        assert_eq!(read.role, UserRole::VehicleOwner);
        assert_eq!(storage.get(KEY_USER_ID).as_deref(), Some("42"));
    }

    #[test]
    fn test_secure_read_of_garbage_cookie_is_none() {
        let (store, _, jar) = store(SessionMode::Secure);
        jar.set_script_cookie(USER_INFO_COOKIE, "not%20json", 60);

        assert_eq!(store.read(), None);
        assert!(matches!(
            store.read_user_info_cookie(),
            Err(MalformedSessionError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_missing_cookie_is_distinguished() {
        let (store, _, _) = store(SessionMode::Secure);
        assert_eq!(
            store.read_user_info_cookie(),
            Err(MalformedSessionError::Missing)
        );
        assert_eq!(store.restore(), SessionGate::RedirectToLogin);
    }

    #[test]
    fn test_unknown_role_is_incomplete() {
        let raw = urlencoding::encode(r#"{"userId":1,"email":"a@b.com","role":"PILOT"}"#);
        assert!(matches!(
            decode_user_info(&raw),
            Err(MalformedSessionError::Incomplete(_))
        ));
    }

    #[test]
    fn test_plus_decodes_as_space() {
        let record = decode_user_info(
            "%7B%22userId%22%3A%227%22%2C%22email%22%3A%22a%2Bb%40c.com%22%2C%22role%22%3A%22ADMIN%22%2C%22note%22%3A%22x+y%22%7D",
        )
        .unwrap();
        assert_eq!(record.email, "a+b@c.com");
        assert_eq!(record.role, UserRole::Admin);
    }

    #[test]
    fn test_clear_removes_canonical_and_drift_keys() {
        let (store, storage, jar) = store(SessionMode::Legacy);
        store.write(&record(), Some("bearer-abc"));
        storage.set("user_id", "old");
        storage.set("jwt_token", "old-token");
        jar.set_script_cookie(USER_INFO_COOKIE, "x", 60);

        store.clear();

        assert!(storage.snapshot().is_empty());
        assert_eq!(jar.script_cookie(USER_INFO_COOKIE), None);
        assert_eq!(store.read(), None);
    }

    #[test]
    fn test_restore_allows_established_session() {
        let (store, _, _) = store(SessionMode::Secure);
        store.write(&record(), None);
        assert_eq!(store.restore(), SessionGate::Allowed(record()));
    }
}
