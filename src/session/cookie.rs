use chrono::{DateTime, Utc};
use cookie::{Cookie, Expiration};
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use crate::errors::StorageError;

/// Script-readable cookie carrying the `{userId, email, role}` snapshot
pub const USER_INFO_COOKIE: &str = "user_info";

/// Lifetime the backend gives its auth cookies
pub const SESSION_COOKIE_MAX_AGE_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    host_only: bool,
    path: String,
    http_only: bool,
    secure: bool,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        if self.host_only {
            return host == self.domain;
        }
        host == self.domain || host.ends_with(&format!(".{}", self.domain))
    }

    fn matches_path(&self, path: &str) -> bool {
        if self.path == "/" || path == self.path {
            return true;
        }
        path.starts_with(&self.path)
            && (self.path.ends_with('/') || path[self.path.len()..].starts_with('/'))
    }

    fn same_slot(&self, other: &Self) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

/// Browser-style cookie jar shared by the HTTP client and the session store
///
/// The HTTP client sends and accepts every cookie, as a fetch with
/// `credentials: include` would. Script code only sees cookies without the
/// `HttpOnly` attribute through [`BrowserCookieJar::script_cookie`].
#[derive(Debug)]
pub struct BrowserCookieJar {
    origin_host: String,
    cookies: RwLock<Vec<StoredCookie>>,
}

impl BrowserCookieJar {
    /// Jar for a document served from `origin_host`
    #[must_use]
    pub fn new(origin_host: impl Into<String>) -> Self {
        Self {
            origin_host: origin_host.into().to_ascii_lowercase(),
            cookies: RwLock::new(Vec::new()),
        }
    }

    /// Jar whose document origin is the host of `url`
    #[must_use]
    pub fn for_url(url: &Url) -> Self {
        Self::new(url.host_str().unwrap_or("localhost"))
    }

    /// Value of a non-HttpOnly cookie visible to the document
    #[must_use]
    pub fn script_cookie(&self, name: &str) -> Option<String> {
        let now = Utc::now();
        self.read()
            .iter()
            .find(|c| {
                c.name == name
                    && !c.http_only
                    && !c.is_expired(now)
                    && c.matches_host(&self.origin_host)
            })
            .map(|c| c.value.clone())
    }

    /// Set a cookie the way `document.cookie = ...` does: never HttpOnly
    pub fn set_script_cookie(&self, name: &str, value: &str, max_age_secs: i64) {
        let cookie = StoredCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: self.origin_host.clone(),
            host_only: true,
            path: "/".to_string(),
            http_only: false,
            secure: false,
            expires_at: Some(expiry_after(Utc::now(), max_age_secs)),
        };
        self.upsert(cookie);
    }

    /// Drop script-visible cookies named `name`; HttpOnly ones are out of reach
    pub fn remove_script_cookie(&self, name: &str) {
        self.write().retain(|c| c.name != name || c.http_only);
    }

    /// Whether any cookie, script-visible or not, is held for `url`
    #[must_use]
    pub fn has_cookies_for(&self, url: &Url) -> bool {
        self.cookie_header(url).is_some()
    }

    /// Load a jar previously written by [`BrowserCookieJar::save`]
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(origin_host: &str, path: &Path) -> Result<Self, StorageError> {
        let jar = Self::new(origin_host);
        if !path.exists() {
            return Ok(jar);
        }
        let content = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let stored: Vec<StoredCookie> =
            serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
                path: path.display().to_string(),
                source,
            })?;
        let now = Utc::now();
        *jar.write() = stored.into_iter().filter(|c| !c.is_expired(now)).collect();
        Ok(jar)
    }

    /// Persist every unexpired cookie
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let now = Utc::now();
        let live: Vec<StoredCookie> = self
            .read()
            .iter()
            .filter(|c| !c.is_expired(now))
            .cloned()
            .collect();
        let json = serde_json::to_string_pretty(&live).map_err(|source| StorageError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn store_set_cookie(&self, raw: &str, url: &Url) {
        let parsed = match Cookie::parse(raw.to_string()) {
            Ok(cookie) => cookie,
            Err(e) => {
                log::warn!("Ignoring unparsable Set-Cookie header: {e}");
                return;
            }
        };

        let Some(request_host) = url.host_str().map(str::to_ascii_lowercase) else {
            return;
        };
        let (domain, host_only) = match parsed.domain() {
            Some(domain) => (domain.trim_start_matches('.').to_ascii_lowercase(), false),
            None => (request_host.clone(), true),
        };
        if !host_only && request_host != domain && !request_host.ends_with(&format!(".{domain}")) {
            log::warn!("Rejecting cookie '{}' for foreign domain {domain}", parsed.name());
            return;
        }

        let now = Utc::now();
        let expires_at = match parsed.max_age() {
            Some(max_age) => Some(expiry_after(now, max_age.whole_seconds())),
            None => match parsed.expires() {
                Some(Expiration::DateTime(at)) => {
                    DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0)
                }
                _ => None,
            },
        };

        let cookie = StoredCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            host_only,
            path: parsed
                .path()
                .map_or_else(|| default_path(url), ToString::to_string),
            http_only: parsed.http_only().unwrap_or(false),
            secure: parsed.secure().unwrap_or(false),
            expires_at,
        };

        if cookie.is_expired(now) {
            self.write().retain(|c| !c.same_slot(&cookie));
        } else {
            self.upsert(cookie);
        }
    }

    fn cookie_header(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        let path = url.path();
        let https = url.scheme() == "https";
        let now = Utc::now();

        let pairs: Vec<String> = self
            .read()
            .iter()
            .filter(|c| {
                !c.is_expired(now) && c.matches_host(host) && c.matches_path(path) && (!c.secure || https)
            })
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    fn upsert(&self, cookie: StoredCookie) {
        let mut cookies = self.write();
        cookies.retain(|c| !c.same_slot(&cookie));
        cookies.push(cookie);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<StoredCookie>> {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<StoredCookie>> {
        self.cookies.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Expiry `max_age_secs` from `now`, clamped to the latest representable instant
fn expiry_after(now: DateTime<Utc>, max_age_secs: i64) -> DateTime<Utc> {
    if max_age_secs <= 0 {
        return now;
    }
    chrono::Duration::try_seconds(max_age_secs)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// RFC 6265 default-path: the request path up to its last `/`
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

impl reqwest::cookie::CookieStore for BrowserCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            match header.to_str() {
                Ok(raw) => self.store_set_cookie(raw, url),
                Err(_) => log::warn!("Ignoring non-ASCII Set-Cookie header"),
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.cookie_header(url)
            .and_then(|header| HeaderValue::from_str(&header).ok())
    }
}
