use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::errors::ConfigurationError;

/// Client ids copied from setup guides and never replaced
static PLACEHOLDER_CLIENT_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*your[-_ ]?google[-_ ]?client[-_ ]?id\s*$").unwrap()
});

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RentmeSettings {
    pub api: ApiSettings,
    pub google: GoogleSettings,
    pub session: SessionSettings,
    pub routes: RouteSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the authentication backend, without trailing slash
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub client_id: Option<String>,
    pub sdk_url: String,
    pub auto_select: bool,
    pub cancel_on_tap_outside: bool,
}

/// Which redirect/storage variant the session store runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Token stays in the backend's HTTP-only cookie
    #[default]
    Secure,
    /// Token arrives in the redirect URL and is kept in client storage.
    /// Deprecated: exposes the bearer token to script and to URL logs.
    Legacy,
}

impl std::str::FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "secure" => Ok(Self::Secure),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("unknown session mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionSettings {
    pub mode: SessionMode,
    /// JSON file backing client storage; in-memory when unset
    pub storage_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub login: String,
    pub dashboard: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            sdk_url: "https://accounts.google.com/gsi/client".to_string(),
            auto_select: false,
            cancel_on_tap_outside: true,
        }
    }
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            dashboard: "/dashboard".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RentmeSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read or parsed
    /// - Logger initialization fails
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_env_file();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        settings.logging.init_logger()?;

        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `RENTME_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or is not valid TOML
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        let default_config_path = PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_toml_file(&default_config_path)?;
            log::info!("Loaded base settings from {}", default_config_path.display());
        }

        if let Ok(secrets_dir) = std::env::var("RENTME_SECRETS_DIR") {
            let secrets_path = PathBuf::from(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_toml_file(&secrets_path)?;
                log::info!("Overriding settings from {}", secrets_path.display());
            } else {
                log::info!(
                    "RENTME_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse one TOML settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let toml_content = fs::read_to_string(path)?;
        Ok(basic_toml::from_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_api_env_overrides(&mut settings.api);
        Self::apply_google_env_overrides(&mut settings.google);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_api_env_overrides(api: &mut ApiSettings) {
        if let Ok(base_url) = std::env::var("API_BASE_URL") {
            api.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(timeout) = std::env::var("API_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                api.timeout_seconds = timeout;
            }
        }
    }

    fn apply_google_env_overrides(google: &mut GoogleSettings) {
        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .or_else(|_| std::env::var("NEXT_PUBLIC_GOOGLE_CLIENT_ID"));
        if let Ok(client_id) = client_id {
            google.client_id = Some(client_id);
        }
        if let Ok(sdk_url) = std::env::var("GOOGLE_SDK_URL") {
            google.sdk_url = sdk_url;
        }
    }

    fn apply_session_env_overrides(session: &mut SessionSettings) {
        if let Ok(mode) = std::env::var("SESSION_MODE") {
            match mode.parse::<SessionMode>() {
                Ok(mode) => session.mode = mode,
                Err(e) => log::warn!("Ignoring SESSION_MODE: {e}"),
            }
        }
        if let Ok(path) = std::env::var("SESSION_STORAGE_PATH") {
            if !path.trim().is_empty() {
                session.storage_path = Some(path);
            }
        }
    }

    fn apply_logging_env_overrides(logging: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging.level = log_level;
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }
}

impl LoggingSettings {
    /// Logger filtering by `level`, in `RUST_LOG` directive syntax
    #[must_use]
    pub fn logger_builder(&self) -> env_logger::Builder {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&self.level);
        builder
    }

    /// Install the logger for `level`
    ///
    /// # Errors
    ///
    /// Returns an error if a logger is already installed
    pub fn init_logger(&self) -> Result<(), log::SetLoggerError> {
        self.logger_builder().try_init()
    }
}

impl GoogleSettings {
    /// The configured client id, if it is usable
    ///
    /// # Errors
    ///
    /// Returns an error when the id is absent, blank, or a known placeholder
    pub fn usable_client_id(&self) -> Result<&str, ConfigurationError> {
        validate_client_id(self.client_id.as_deref())
    }
}

/// Reject absent, blank, and placeholder client ids
///
/// # Errors
///
/// Returns the matching [`ConfigurationError`]
pub fn validate_client_id(client_id: Option<&str>) -> Result<&str, ConfigurationError> {
    match client_id {
        None => Err(ConfigurationError::MissingClientId),
        Some(id) if id.trim().is_empty() => Err(ConfigurationError::MissingClientId),
        Some(id) if PLACEHOLDER_CLIENT_ID.is_match(id) => {
            Err(ConfigurationError::PlaceholderClientId(id.to_string()))
        }
        Some(id) => Ok(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clean_env_vars() {
        for var in [
            "API_BASE_URL",
            "API_TIMEOUT_SECONDS",
            "GOOGLE_CLIENT_ID",
            "NEXT_PUBLIC_GOOGLE_CLIENT_ID",
            "GOOGLE_SDK_URL",
            "SESSION_MODE",
            "SESSION_STORAGE_PATH",
            "RENTME_SECRETS_DIR",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let settings = RentmeSettings::default();
        assert_eq!(settings.api.base_url, "http://localhost:8080");
        assert_eq!(settings.session.mode, SessionMode::Secure);
        assert_eq!(settings.routes.login, "/login");
        assert_eq!(settings.routes.dashboard, "/dashboard");
        assert!(settings.google.client_id.is_none());
        assert!(settings.google.cancel_on_tap_outside);
        assert!(!settings.google.auto_select);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clean_env_vars();
        std::env::set_var("API_BASE_URL", "https://api.rentme.test/");
        std::env::set_var("NEXT_PUBLIC_GOOGLE_CLIENT_ID", "frontend-id");
        std::env::set_var("SESSION_MODE", "legacy");
        std::env::set_var("API_TIMEOUT_SECONDS", "not-a-number");

        let mut settings = RentmeSettings::default();
        RentmeSettings::apply_env_overrides(&mut settings);

        assert_eq!(settings.api.base_url, "https://api.rentme.test");
        assert_eq!(settings.google.client_id.as_deref(), Some("frontend-id"));
        assert_eq!(settings.session.mode, SessionMode::Legacy);
        assert_eq!(settings.api.timeout_seconds, 15);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_google_client_id_env_takes_precedence() {
        clean_env_vars();
        std::env::set_var("GOOGLE_CLIENT_ID", "server-id");
        std::env::set_var("NEXT_PUBLIC_GOOGLE_CLIENT_ID", "frontend-id");

        let mut settings = RentmeSettings::default();
        RentmeSettings::apply_env_overrides(&mut settings);
        assert_eq!(settings.google.client_id.as_deref(), Some("server-id"));

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_unknown_session_mode_is_ignored() {
        clean_env_vars();
        std::env::set_var("SESSION_MODE", "paranoid");

        let mut settings = RentmeSettings::default();
        RentmeSettings::apply_env_overrides(&mut settings);
        assert_eq!(settings.session.mode, SessionMode::Secure);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_logging_level_drives_logger_filter() {
        std::env::set_var("RUST_LOG", "debug");
        let mut settings = RentmeSettings::default();
        RentmeSettings::apply_env_overrides(&mut settings);
        std::env::remove_var("RUST_LOG");
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(
            settings.logging.logger_builder().build().filter(),
            log::LevelFilter::Debug
        );

        let from_file = LoggingSettings {
            level: "warn,rentme_auth=trace".to_string(),
        };
        let logger = from_file.logger_builder().build();
        assert_eq!(logger.filter(), log::LevelFilter::Trace);
        assert_eq!(
            LoggingSettings::default().logger_builder().build().filter(),
            log::LevelFilter::Info
        );
    }

    #[test]
    fn test_partial_toml_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Settings.toml");
        std::fs::write(
            &path,
            "[google]\nclient_id = \"abc.apps.googleusercontent.com\"\n\n[session]\nmode = \"legacy\"\n",
        )
        .unwrap();

        let settings = RentmeSettings::from_toml_file(&path).unwrap();
        assert_eq!(
            settings.google.client_id.as_deref(),
            Some("abc.apps.googleusercontent.com")
        );
        assert_eq!(settings.session.mode, SessionMode::Legacy);
        assert_eq!(settings.api.base_url, "http://localhost:8080");
        assert_eq!(settings.google.sdk_url, "https://accounts.google.com/gsi/client");
    }

    #[test]
    fn test_client_id_validation() {
        assert_eq!(validate_client_id(None), Err(ConfigurationError::MissingClientId));
        assert_eq!(
            validate_client_id(Some("   ")),
            Err(ConfigurationError::MissingClientId)
        );
        assert!(matches!(
            validate_client_id(Some("YOUR_GOOGLE_CLIENT_ID")),
            Err(ConfigurationError::PlaceholderClientId(_))
        ));
        assert!(matches!(
            validate_client_id(Some("your-google-client-id")),
            Err(ConfigurationError::PlaceholderClientId(_))
        ));
        assert_eq!(
            validate_client_id(Some("123.apps.googleusercontent.com")),
            Ok("123.apps.googleusercontent.com")
        );
    }
}
