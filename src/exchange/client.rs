use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{ConfigurationError, ExchangeError, MalformedSessionError};
use crate::exchange::response::{decode_auth_response, Exchanged};
use crate::models::{
    FailureReason, IdentityCredential, PasswordCredentials, RegistrationRequest, UserProfile,
};
use crate::session::cookie::BrowserCookieJar;
use crate::settings::ApiSettings;
use crate::utils::logging::LoggingHelper;

pub const LOGOUT_PATH: &str = "/api/v1/auth/logout";
pub const PROFILE_PATH: &str = "/api/v1/users/me";

/// Backend endpoints that establish a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEndpoint {
    Google,
    Login,
    Register,
}

impl AuthEndpoint {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Google => "/api/v1/auth/google",
            Self::Login => "/api/v1/auth/login",
            Self::Register => "/api/v1/auth/register",
        }
    }

    /// Reason reported when the backend rejects the attempt with a non-2xx status
    #[must_use]
    pub fn rejection_reason(self) -> FailureReason {
        match self {
            Self::Google => FailureReason::OauthFailed,
            Self::Login => FailureReason::InvalidCredentials,
            Self::Register => FailureReason::RegistrationFailed,
        }
    }

    /// Collapse any exchange error into the redirect reason for this endpoint
    #[must_use]
    pub fn failure_reason(self, error: &ExchangeError) -> FailureReason {
        error.failure_reason(self.rejection_reason())
    }
}

#[derive(Serialize)]
struct GoogleTokenBody<'a> {
    token: &'a str,
}

/// Releases the in-flight flag even when the exchange future is dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Exchanges identity tokens or passwords for a backend session
///
/// Requests carry and accept cookies through the shared [`BrowserCookieJar`],
/// so the backend's HTTP-only session cookie lands in the jar without ever
/// being visible to the session store. Only one exchange runs at a time per
/// client; overlapping calls fail with [`ExchangeError::InFlight`].
pub struct TokenExchangeClient {
    http: Client,
    base_url: String,
    in_flight: AtomicBool,
}

impl TokenExchangeClient {
    /// Build a client for `base_url` sharing `jar`
    ///
    /// # Errors
    ///
    /// Returns an error when `base_url` is not an absolute http(s) URL or the
    /// HTTP client cannot be constructed
    pub fn new(
        base_url: &str,
        jar: Arc<BrowserCookieJar>,
        timeout: Duration,
    ) -> Result<Self, ConfigurationError> {
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|_| ConfigurationError::InvalidBaseUrl(base_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigurationError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = Client::builder()
            .cookie_provider(jar)
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            in_flight: AtomicBool::new(false),
        })
    }

    /// Build a client from the `[api]` settings section
    ///
    /// # Errors
    ///
    /// See [`TokenExchangeClient::new`]
    pub fn from_settings(
        api: &ApiSettings,
        jar: Arc<BrowserCookieJar>,
    ) -> Result<Self, ConfigurationError> {
        Self::new(&api.base_url, jar, Duration::from_secs(api.timeout_seconds.max(1)))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// An exchange is currently running
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Trade a provider identity token for a session
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, malformed body,
    /// or when another exchange is in flight
    pub async fn exchange_google(
        &self,
        credential: &IdentityCredential,
    ) -> Result<Exchanged, ExchangeError> {
        self.post_auth(
            AuthEndpoint::Google,
            &GoogleTokenBody {
                token: &credential.credential,
            },
        )
        .await
    }

    /// Password login
    ///
    /// # Errors
    ///
    /// Same conditions as [`TokenExchangeClient::exchange_google`]
    pub async fn login(&self, credentials: &PasswordCredentials) -> Result<Exchanged, ExchangeError> {
        self.post_auth(AuthEndpoint::Login, credentials).await
    }

    /// Create an account and sign it in
    ///
    /// # Errors
    ///
    /// Same conditions as [`TokenExchangeClient::exchange_google`]
    pub async fn register(&self, request: &RegistrationRequest) -> Result<Exchanged, ExchangeError> {
        self.post_auth(AuthEndpoint::Register, request).await
    }

    /// Ask the backend to expire its session cookies
    ///
    /// Returns whether the backend acknowledged; failures are only logged.
    pub async fn logout(&self) -> bool {
        let url = self.endpoint(LOGOUT_PATH);
        match self.http.post(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                log::warn!("Logout answered with HTTP {}", response.status().as_u16());
                false
            }
            Err(e) => {
                log::error!("Logout error: {e}");
                false
            }
        }
    }

    /// Profile of the signed-in user, authenticated by the session cookie
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or a body that
    /// is not a profile
    pub async fn current_user(&self) -> Result<UserProfile, ExchangeError> {
        let url = self.endpoint(PROFILE_PATH);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ExchangeError::Network {
                endpoint: PROFILE_PATH.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExchangeError::Status {
                endpoint: PROFILE_PATH.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| ExchangeError::Network {
            endpoint: PROFILE_PATH.to_string(),
            source,
        })?;
        serde_json::from_str(&body)
            .map_err(|e| MalformedSessionError::InvalidJson(e.to_string()).into())
    }

    async fn post_auth<B: Serialize + ?Sized>(
        &self,
        endpoint: AuthEndpoint,
        body: &B,
    ) -> Result<Exchanged, ExchangeError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            log::warn!("Ignoring {} request: exchange already in flight", endpoint.path());
            return Err(ExchangeError::InFlight);
        };

        LoggingHelper::log_exchange_start(endpoint.path());
        let response = self
            .http
            .post(self.endpoint(endpoint.path()))
            .json(body)
            .send()
            .await
            .map_err(|source| ExchangeError::Network {
                endpoint: endpoint.path().to_string(),
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ExchangeError::Network {
            endpoint: endpoint.path().to_string(),
            source,
        })?;

        if !status.is_success() {
            LoggingHelper::log_exchange_rejected(endpoint.path(), status.as_u16(), &text);
            return Err(ExchangeError::Status {
                endpoint: endpoint.path().to_string(),
                status: status.as_u16(),
            });
        }

        let exchanged = decode_auth_response(&text)?;
        LoggingHelper::log_exchange_success(endpoint.path(), &exchanged.record);
        Ok(exchanged)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::session::cookie::USER_INFO_COOKIE;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> (TokenExchangeClient, Arc<BrowserCookieJar>) {
        let jar = Arc::new(BrowserCookieJar::new("127.0.0.1"));
        let client =
            TokenExchangeClient::new(&server.uri(), jar.clone(), Duration::from_secs(5)).unwrap();
        (client, jar)
    }

    fn success_body() -> serde_json::Value {
        json!({"success": true, "userId": 123, "email": "a@b.com", "role": "RENTER"})
    }

    #[tokio::test]
    async fn test_google_exchange_posts_token_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/google"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"token": "tok-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let exchanged = client
            .exchange_google(&IdentityCredential::new("tok-1"))
            .await
            .unwrap();

        assert_eq!(exchanged.record.user_id, "123");
        assert_eq!(exchanged.record.email, "a@b.com");
        assert_eq!(exchanged.record.role, UserRole::Renter);
        assert!(!client.is_in_flight());
    }

    #[tokio::test]
    async fn test_login_posts_email_and_password() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .and(body_json(json!({"email": "user@example.com", "password": "password123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "userId": 42, "email": "user@example.com", "role": "VEHICLE_OWNER"
            })))
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let exchanged = client
            .login(&PasswordCredentials {
                email: "user@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(exchanged.record.user_id, "42");
        assert_eq!(exchanged.record.role, UserRole::VehicleOwner);
    }

    #[tokio::test]
    async fn test_rejection_maps_to_endpoint_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid email or password"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/google"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Google authentication failed"))
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let login_err = client
            .login(&PasswordCredentials {
                email: "wrong@example.com".to_string(),
                password: "wrongpassword".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(login_err, ExchangeError::Status { status: 401, .. }));
        assert_eq!(
            AuthEndpoint::Login.failure_reason(&login_err),
            FailureReason::InvalidCredentials
        );

        let google_err = client
            .exchange_google(&IdentityCredential::new("bad"))
            .await
            .unwrap_err();
        assert_eq!(
            AuthEndpoint::Google.failure_reason(&google_err),
            FailureReason::OauthFailed
        );
    }

    #[tokio::test]
    async fn test_incomplete_body_is_invalid_user_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "email": "a@b.com"})))
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let err = client
            .exchange_google(&IdentityCredential::new("tok-1"))
            .await
            .unwrap_err();
        assert_eq!(
            AuthEndpoint::Google.failure_reason(&err),
            FailureReason::InvalidUserData
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let jar = Arc::new(BrowserCookieJar::new("127.0.0.1"));
        let client =
            TokenExchangeClient::new("http://127.0.0.1:9", jar, Duration::from_secs(2)).unwrap();

        let err = client
            .exchange_google(&IdentityCredential::new("tok-1"))
            .await
            .unwrap_err();
        assert_eq!(
            AuthEndpoint::Google.failure_reason(&err),
            FailureReason::NetworkError
        );
        assert!(!client.is_in_flight());
    }

    #[tokio::test]
    async fn test_second_call_while_in_flight_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/google"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_body())
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let credential = IdentityCredential::new("tok-1");
        let (first, second) = tokio::join!(
            client.exchange_google(&credential),
            client.exchange_google(&credential)
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(ExchangeError::InFlight)));
    }

    #[tokio::test]
    async fn test_session_cookies_are_accepted_and_sent_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/google"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_body())
                    .append_header("set-cookie", "jwt_token=secret-jwt; Path=/; Max-Age=86400; HttpOnly")
                    .append_header(
                        "set-cookie",
                        "user_info=%7B%22userId%22%3A123%2C%22email%22%3A%22a%40b.com%22%2C%22role%22%3A%22RENTER%22%7D; Path=/; Max-Age=86400",
                    ),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/logout"))
            .and(header_regex("cookie", "jwt_token=secret-jwt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("set-cookie", "jwt_token=; Path=/; Max-Age=0; HttpOnly")
                    .append_header("set-cookie", "user_info=; Path=/; Max-Age=0"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (client, jar) = client_for(&server);
        client
            .exchange_google(&IdentityCredential::new("tok-1"))
            .await
            .unwrap();

        assert_eq!(jar.script_cookie("jwt_token"), None);
        assert!(jar.script_cookie(USER_INFO_COOKIE).is_some());

        assert!(client.logout().await);
        assert_eq!(jar.script_cookie(USER_INFO_COOKIE), None);
    }

    #[tokio::test]
    async fn test_profile_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "userId": 5, "fullName": "Ann Driver", "email": "ann@rentme.test",
                "role": "RENTER", "authProvider": "GOOGLE", "isActive": true
            })))
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let profile = client.current_user().await.unwrap();
        assert_eq!(profile.user_id, "5");
        assert_eq!(profile.full_name.as_deref(), Some("Ann Driver"));
        assert_eq!(profile.auth_provider.as_deref(), Some("GOOGLE"));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let jar = Arc::new(BrowserCookieJar::new("localhost"));
        assert!(matches!(
            TokenExchangeClient::new("ftp://backend", jar.clone(), Duration::from_secs(1)),
            Err(ConfigurationError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            TokenExchangeClient::new("not a url", jar, Duration::from_secs(1)),
            Err(ConfigurationError::InvalidBaseUrl(_))
        ));
    }
}
