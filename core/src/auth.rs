//! Challenge-response authentication.
//!
//! The service never sees the secret. Each call first fetches a single-use
//! challenge, and the request then carries
//! `md5_hex(challenge ++ md5_hex(secret))`. MD5 is what the server checks
//! against; it cannot be swapped for another digest.

use crate::value::{PostParams, Value};

pub const AUTH_METHOD_CHALLENGE: &str = "challenge";

/// Protocol version 1 makes the service treat text as UTF-8 instead of
/// ISO-8859-1.
pub const PROTOCOL_VERSION: i64 = 1;

/// Opaque single-use token issued by `getchallenge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge(String);

impl Challenge {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lowercase hex MD5 of `data`.
fn md5_hex(data: impl AsRef<[u8]>) -> String {
    format!("{:x}", md5::compute(data))
}

/// Compute the auth response for `challenge` and `secret`.
pub fn auth_response(challenge: &Challenge, secret: &str) -> String {
    md5_hex(format!("{}{}", challenge.as_str(), md5_hex(secret)))
}

/// Auth fields for exactly one call. Built right after the handshake and
/// dropped with the request.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    username: String,
    challenge: Challenge,
    response: String,
}

impl AuthContext {
    pub fn new(username: &str, challenge: Challenge, secret: &str) -> Self {
        let response = auth_response(&challenge, secret);
        Self {
            username: username.to_string(),
            challenge,
            response,
        }
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    /// Add the login, challenge, response and protocol version fields.
    pub fn apply(&self, params: &mut PostParams) {
        params.insert("username".to_string(), Value::from(self.username.as_str()));
        params.insert("auth_method".to_string(), Value::from(AUTH_METHOD_CHALLENGE));
        params.insert("auth_challenge".to_string(), Value::from(self.challenge.as_str()));
        params.insert("auth_response".to_string(), Value::from(self.response.as_str()));
        params.insert("ver".to_string(), Value::Int(PROTOCOL_VERSION));
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_matches_known_vector() {
        assert_eq!(md5_hex("pw"), "8fe4c11451281c094a6578e6ddbf5eed");
        assert_eq!(
            auth_response(&Challenge::new("abc"), "pw"),
            "e14a5af7bbe800c42eb139d69ff8927d"
        );
    }

    #[test]
    fn auth_response_depends_on_challenge() {
        let a = auth_response(&Challenge::new("c0:1:2:3:abc"), "p");
        assert_eq!(a, "4cf145de8cce33444c7bac19139a50f9");
        assert_ne!(a, auth_response(&Challenge::new("c0:1:2:3:abd"), "p"));
    }

    #[test]
    fn apply_injects_auth_fields() {
        let ctx = AuthContext::new("u", Challenge::new("abc"), "pw");
        let mut params = PostParams::new();
        ctx.apply(&mut params);
        assert_eq!(params["username"], Value::from("u"));
        assert_eq!(params["auth_method"], Value::from("challenge"));
        assert_eq!(params["auth_challenge"], Value::from("abc"));
        assert_eq!(params["auth_response"], Value::from("e14a5af7bbe800c42eb139d69ff8927d"));
        assert_eq!(params["ver"], Value::Int(1));
    }

    #[test]
    fn debug_hides_challenge_and_response() {
        let ctx = AuthContext::new("u", Challenge::new("abc"), "pw");
        let printed = format!("{ctx:?}");
        assert!(!printed.contains("abc"));
        assert!(!printed.contains("e14a5af7"));
    }
}
