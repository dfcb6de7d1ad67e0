use std::time::Duration;

use crate::error::StoryError;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// Runtime settings. The API key is optional here and only checked when a
/// generation call needs it.
#[derive(Clone)]
pub struct Config {
    api_key: Option<String>,
    pub api_url: String,
    pub text_model: String,
    pub image_model: String,
    pub bind_addr: String,
    pub request_timeout: Duration,
    pub session_ttl: Duration,
    pub max_sessions: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("bind_addr", &self.bind_addr)
            .field("request_timeout", &self.request_timeout)
            .field("session_ttl", &self.session_ttl)
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let timeout_secs = parse_or(&lookup, "PIXEL_SAGA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let session_ttl_secs =
            parse_or(&lookup, "PIXEL_SAGA_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS);

        Self {
            api_key: lookup("GEMINI_API_KEY").or_else(|| lookup("API_KEY")),
            api_url: lookup("GEMINI_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            text_model: lookup("PIXEL_SAGA_TEXT_MODEL").unwrap_or(defaults.text_model),
            image_model: lookup("PIXEL_SAGA_IMAGE_MODEL").unwrap_or(defaults.image_model),
            bind_addr: lookup("PIXEL_SAGA_ADDR").unwrap_or(defaults.bind_addr),
            request_timeout: Duration::from_secs(timeout_secs),
            session_ttl: Duration::from_secs(session_ttl_secs),
            max_sessions: parse_or(&lookup, "PIXEL_SAGA_MAX_SESSIONS", DEFAULT_MAX_SESSIONS),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// The only place the credential is validated.
    pub fn api_key(&self) -> Result<&str, StoryError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(StoryError::MissingCredential),
        }
    }
}

/// Positive number from `key`, or `default` with a warning when it does not parse.
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + PartialEq + Default + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value != T::default() => value,
            _ => {
                tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_sessions, 1000);
        assert_eq!(config.api_key(), Err(StoryError::MissingCredential));
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_API_URL", "http://localhost:9000/v1beta/"),
            ("PIXEL_SAGA_TEXT_MODEL", "gemini-test"),
            ("PIXEL_SAGA_IMAGE_MODEL", "imagen-test"),
            ("PIXEL_SAGA_ADDR", "127.0.0.1:8080"),
            ("PIXEL_SAGA_TIMEOUT_SECS", "5"),
            ("PIXEL_SAGA_SESSION_TTL_SECS", "90"),
            ("PIXEL_SAGA_MAX_SESSIONS", "12"),
        ]));
        assert_eq!(config.api_key(), Ok("secret"));
        assert_eq!(config.api_url, "http://localhost:9000/v1beta");
        assert_eq!(config.text_model, "gemini-test");
        assert_eq!(config.image_model, "imagen-test");
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.session_ttl, Duration::from_secs(90));
        assert_eq!(config.max_sessions, 12);
    }

    #[test]
    fn falls_back_to_plain_api_key_variable() {
        let config = Config::from_lookup(lookup_from(&[("API_KEY", "legacy")]));
        assert_eq!(config.api_key(), Ok("legacy"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = Config::default().with_api_key("   ");
        assert_eq!(config.api_key(), Err(StoryError::MissingCredential));
    }

    #[test]
    fn bad_timeout_falls_back_to_default() {
        let config = Config::from_lookup(lookup_from(&[("PIXEL_SAGA_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn zero_session_limits_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("PIXEL_SAGA_SESSION_TTL_SECS", "0"),
            ("PIXEL_SAGA_MAX_SESSIONS", "-3"),
        ]));
        assert_eq!(config.session_ttl, Duration::from_secs(DEFAULT_SESSION_TTL_SECS));
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
    }

    #[test]
    fn debug_output_hides_the_key() {
        let config = Config::default().with_api_key("super-secret");
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
