//! Schema-checked decoding of authentication responses
//!
//! The backend answers with loosely typed JSON. Everything downstream works
//! with a [`SessionRecord`] or a [`MalformedSessionError`], never with raw
//! field presence.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::MalformedSessionError;
use crate::models::{SessionRecord, UserRole};

/// A session the backend just established
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchanged {
    pub record: SessionRecord,
    /// Bearer token, only present when the backend still returns it in the body
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponseBody {
    success: Option<bool>,
    user_id: Option<Value>,
    email: Option<String>,
    role: Option<String>,
    token: Option<String>,
    message: Option<String>,
}

/// Decode a 2xx body into an established session
///
/// # Errors
///
/// Returns an error when the body is not JSON, reports `success: false`, or
/// lacks any of `userId`, `email`, `role`
pub fn decode_auth_response(body: &str) -> Result<Exchanged, MalformedSessionError> {
    let parsed: AuthResponseBody = serde_json::from_str(body)
        .map_err(|e| MalformedSessionError::InvalidJson(e.to_string()))?;

    match parsed.success {
        Some(true) => {}
        Some(false) => {
            if let Some(message) = &parsed.message {
                log::warn!("Backend reported unsuccessful authentication: {message}");
            }
            return Err(MalformedSessionError::Unsuccessful);
        }
        None => return Err(MalformedSessionError::Incomplete("success".to_string())),
    }

    let user_id = match parsed.user_id {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s,
        _ => return Err(MalformedSessionError::Incomplete("userId".to_string())),
    };
    let email = parsed
        .email
        .ok_or_else(|| MalformedSessionError::Incomplete("email".to_string()))?;
    let role = parsed
        .role
        .ok_or_else(|| MalformedSessionError::Incomplete("role".to_string()))?
        .parse::<UserRole>()
        .map_err(MalformedSessionError::Incomplete)?;

    let record = SessionRecord::new(user_id, email, role).map_err(MalformedSessionError::Incomplete)?;
    Ok(Exchanged {
        record,
        token: parsed.token.filter(|t| !t.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_complete_body() {
        let exchanged = decode_auth_response(
            r#"{"success":true,"message":"Google login successful","userId":123,"email":"a@b.com","role":"RENTER"}"#,
        )
        .unwrap();
        assert_eq!(
            exchanged.record,
            SessionRecord::new("123", "a@b.com", UserRole::Renter).unwrap()
        );
        assert_eq!(exchanged.token, None);
    }

    #[test]
    fn test_string_user_id_and_token_are_kept() {
        let exchanged = decode_auth_response(
            r#"{"success":true,"userId":"u-9","email":"a@b.com","role":"ADMIN","token":"jwt"}"#,
        )
        .unwrap();
        assert_eq!(exchanged.record.user_id, "u-9");
        assert_eq!(exchanged.token.as_deref(), Some("jwt"));
    }

    #[test]
    fn test_missing_fields_are_incomplete() {
        let cases = [
            r#"{"success":true,"email":"a@b.com","role":"RENTER"}"#,
            r#"{"success":true,"userId":1,"role":"RENTER"}"#,
            r#"{"success":true,"userId":1,"email":"a@b.com"}"#,
            r#"{"userId":1,"email":"a@b.com","role":"RENTER"}"#,
            r#"{"success":true,"userId":null,"email":"a@b.com","role":"RENTER"}"#,
            r#"{"success":true,"userId":1,"email":"","role":"RENTER"}"#,
        ];
        for body in cases {
            assert!(
                matches!(
                    decode_auth_response(body),
                    Err(MalformedSessionError::Incomplete(_))
                ),
                "expected incomplete for {body}"
            );
        }
    }

    #[test]
    fn test_unsuccessful_and_non_json() {
        assert_eq!(
            decode_auth_response(r#"{"success":false,"message":"nope"}"#),
            Err(MalformedSessionError::Unsuccessful)
        );
        assert!(matches!(
            decode_auth_response("Invalid email or password"),
            Err(MalformedSessionError::InvalidJson(_))
        ));
    }
}
