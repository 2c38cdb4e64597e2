//! Client configuration.

use std::fmt;
use std::time::Duration;

use crate::types::{LineEndings, ReturnLineEndings};

pub const DEFAULT_ENDPOINT: &str = "https://www.livejournal.com/interface/xmlrpc";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials, endpoint and per-client preferences.
///
/// Login, secret and endpoint are fixed once the client is built; the
/// line-ending preferences can still be changed on the client afterwards.
#[derive(Clone)]
pub struct ClientConfig {
    login: String,
    secret: String,
    endpoint: String,
    timeout: Duration,
    line_endings: LineEndings,
    return_line_endings: ReturnLineEndings,
}

impl ClientConfig {
    pub fn new(login: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            secret: secret.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            line_endings: LineEndings::default(),
            return_line_endings: ReturnLineEndings::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_line_endings(mut self, line_endings: LineEndings) -> Self {
        self.line_endings = line_endings;
        self
    }

    pub fn with_return_line_endings(mut self, line_endings: ReturnLineEndings) -> Self {
        self.return_line_endings = line_endings;
        self
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn line_endings(&self) -> LineEndings {
        self.line_endings
    }

    pub fn return_line_endings(&self) -> ReturnLineEndings {
        self.return_line_endings
    }

    pub(crate) fn set_line_endings(&mut self, line_endings: LineEndings) {
        self.line_endings = line_endings;
    }

    pub(crate) fn set_return_line_endings(&mut self, line_endings: ReturnLineEndings) {
        self.return_line_endings = line_endings;
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("login", &self.login)
            .field("secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("line_endings", &self.line_endings)
            .field("return_line_endings", &self.return_line_endings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_public_service() {
        let config = ClientConfig::new("u", "p");
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.line_endings(), LineEndings::Unix);
        assert_eq!(config.return_line_endings(), ReturnLineEndings::Unix);
    }

    #[test]
    fn debug_redacts_secret() {
        let config = ClientConfig::new("u", "hunter2");
        let printed = format!("{config:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("hunter2"));
    }
}
