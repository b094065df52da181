use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marketplace role carried by every established session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Renter,
    VehicleOwner,
    Admin,
}

impl UserRole {
    /// Wire name used by the backend and in persisted storage
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Renter => "RENTER",
            Self::VehicleOwner => "VEHICLE_OWNER",
            Self::Admin => "ADMIN",
        }
    }

    /// Dashboard section a collaborator page should show for this role
    #[must_use]
    pub fn dashboard_section(self) -> &'static str {
        match self {
            Self::Renter => "renter",
            Self::VehicleOwner => "owner",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "RENTER" => Ok(Self::Renter),
            "VEHICLE_OWNER" => Ok(Self::VehicleOwner),
            "ADMIN" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Authenticated session as established by the backend
///
/// All three fields are non-empty; construct through [`SessionRecord::new`]
/// or the exchange decoder, never field by field from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
}

impl SessionRecord {
    /// Build a record, rejecting empty identifiers
    ///
    /// # Errors
    ///
    /// Returns a description of the first missing field
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        role: UserRole,
    ) -> Result<Self, String> {
        let user_id = user_id.into();
        let email = email.into();
        if user_id.trim().is_empty() {
            return Err("userId is empty".to_string());
        }
        if email.trim().is_empty() {
            return Err("email is empty".to_string());
        }
        Ok(Self {
            user_id,
            email,
            role,
        })
    }
}

/// Opaque identity token handed over by the provider SDK
///
/// Consumed once by the exchange client; `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityCredential {
    pub credential: String,
}

impl IdentityCredential {
    #[must_use]
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
        }
    }
}

impl fmt::Debug for IdentityCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCredential")
            .field("credential", &format_args!("<{} bytes>", self.credential.len()))
            .finish()
    }
}

/// Email/password pair for the password login entry point
#[derive(Clone, Serialize)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for PasswordCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Account registration payload
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    pub role: UserRole,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("contact_number", &self.contact_number)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Profile returned by `GET /api/v1/users/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(deserialize_with = "id_as_string")]
    pub user_id: String,
    pub full_name: Option<String>,
    pub email: String,
    pub role: UserRole,
    pub auth_provider: Option<String>,
}

/// Why an authentication attempt did not establish a session
///
/// The string forms are the `error` query values the login surface understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    OauthFailed,
    InvalidCredentials,
    InvalidUserData,
    MissingUserInfo,
    NetworkError,
    RegistrationFailed,
    RequestInProgress,
}

impl FailureReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OauthFailed => "oauth_failed",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidUserData => "invalid_user_data",
            Self::MissingUserInfo => "missing_user_info",
            Self::NetworkError => "network_error",
            Self::RegistrationFailed => "registration_failed",
            Self::RequestInProgress => "request_in_progress",
        }
    }

    /// Human-readable text for the inline alert of an interactive surface
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::OauthFailed => "Google sign-in failed. Please try again.",
            Self::InvalidCredentials => "Invalid email or password.",
            Self::InvalidUserData | Self::MissingUserInfo => {
                "We could not read your account details. Please sign in again."
            }
            Self::NetworkError => "Could not reach the server. Check your connection.",
            Self::RegistrationFailed => "Registration failed. Please check your details.",
            Self::RequestInProgress => "Sign-in is already in progress.",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one authentication attempt, consumed once to pick a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Success(SessionRecord),
    Failure(FailureReason),
}

impl RedirectOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Accept identifiers sent either as JSON numbers or strings
///
/// # Errors
///
/// Fails for any JSON type other than a number or a string
pub fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(serde_json::Number),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n.to_string()),
        RawId::Text(s) => Ok(s),
    }
}
