//! Test fixtures providing pre-built test objects

use serde_json::{json, Value};

use super::constants::{TEST_CLIENT_ID, TEST_EMAIL, TEST_PASSWORD, TEST_USER_ID};
use crate::models::{PasswordCredentials, RegistrationRequest, SessionRecord, UserRole};
use crate::settings::{RentmeSettings, SessionMode};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Settings pointing at `base_url` with a usable client id
    #[must_use]
    pub fn settings(base_url: &str) -> RentmeSettings {
        let mut settings = RentmeSettings::default();
        settings.api.base_url = base_url.trim_end_matches('/').to_string();
        settings.api.timeout_seconds = 5;
        settings.google.client_id = Some(TEST_CLIENT_ID.to_string());
        settings
    }

    /// Same as [`TestFixtures::settings`] in the given session mode
    #[must_use]
    pub fn settings_with_mode(base_url: &str, mode: SessionMode) -> RentmeSettings {
        let mut settings = Self::settings(base_url);
        settings.session.mode = mode;
        settings
    }

    #[must_use]
    pub fn renter_record() -> SessionRecord {
        SessionRecord {
            user_id: TEST_USER_ID.to_string(),
            email: TEST_EMAIL.to_string(),
            role: UserRole::Renter,
        }
    }

    #[must_use]
    pub fn password_credentials() -> PasswordCredentials {
        PasswordCredentials {
            email: TEST_EMAIL.to_string(),
            password: TEST_PASSWORD.to_string(),
        }
    }

    #[must_use]
    pub fn registration_request(role: UserRole) -> RegistrationRequest {
        RegistrationRequest {
            full_name: "Ann Example".to_string(),
            email: TEST_EMAIL.to_string(),
            password: TEST_PASSWORD.to_string(),
            contact_number: Some("+94771234567".to_string()),
            role,
        }
    }

    /// 2xx body of the auth endpoints, with a numeric `userId`
    #[must_use]
    pub fn auth_success_body(user_id: u64, email: &str, role: UserRole) -> Value {
        json!({
            "success": true,
            "message": "Login successful",
            "userId": user_id,
            "email": email,
            "role": role.as_str(),
        })
    }

    /// `Set-Cookie` value of the backend's script-readable `user_info` cookie
    #[must_use]
    pub fn user_info_set_cookie(record: &SessionRecord) -> String {
        let json = json!({
            "userId": record.user_id,
            "email": record.email,
            "role": record.role.as_str(),
        });
        format!(
            "user_info={}; Path=/; Max-Age=86400",
            urlencoding::encode(&json.to_string())
        )
    }
}
