use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Failures that abort story creation. None of them is retried here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoryError {
    #[error("API key not valid: no API key configured (set GEMINI_API_KEY)")]
    MissingCredential,

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("invalid story format received from the API: {0}")]
    InvalidResponseShape(String),

    #[error("no image was generated")]
    NoImageProduced,

    #[error("invalid story request: {0}")]
    InvalidRequest(String),
}

impl StoryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StoryError::MissingCredential => ErrorCategory::InvalidCredential,
            other => classify(&other.to_string()),
        }
    }

    /// Localized message for the story form.
    pub fn user_message(&self) -> &'static str {
        self.category().user_message()
    }
}

/// User-facing buckets an error message is sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidCredential,
    QuotaExceeded,
    DeadlineExceeded,
    Generic,
}

impl ErrorCategory {
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::InvalidCredential => {
                "La clave de la API de Gemini no es válida o no se ha proporcionado. Por favor, verifica la configuración de tu entorno."
            }
            ErrorCategory::QuotaExceeded => {
                "Has excedido tu cuota de uso de la API de Gemini. Por favor, revisa tu plan y facturación o inténtalo más tarde."
            }
            ErrorCategory::DeadlineExceeded => {
                "La solicitud ha tardado demasiado en responder. Por favor, inténtalo de nuevo más tarde."
            }
            ErrorCategory::Generic => {
                "Una fuerza misteriosa impidió que se creara la historia. Por favor, inténtalo de nuevo."
            }
        }
    }
}

static INVALID_CREDENTIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)API key not valid").expect("valid regex"));
static QUOTA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)quota|rate limit|resource_exhausted").expect("valid regex")
});
static DEADLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)deadline").expect("valid regex"));

/// Sorts an error message into exactly one category. Earlier patterns win.
pub fn classify(message: &str) -> ErrorCategory {
    if INVALID_CREDENTIAL.is_match(message) {
        ErrorCategory::InvalidCredential
    } else if QUOTA.is_match(message) {
        ErrorCategory::QuotaExceeded
    } else if DEADLINE.is_match(message) {
        ErrorCategory::DeadlineExceeded
    } else {
        ErrorCategory::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_invalid_key() {
        assert_eq!(
            classify("400 INVALID_ARGUMENT: API key not valid. Please pass a valid API key."),
            ErrorCategory::InvalidCredential
        );
        assert_eq!(classify("api KEY NOT VALID"), ErrorCategory::InvalidCredential);
    }

    #[test]
    fn classifies_quota_variants() {
        for message in [
            "429 RESOURCE_EXHAUSTED: You exceeded your current quota",
            "Rate limit reached for requests",
            "resource_exhausted",
            "Quota exceeded for metric",
        ] {
            assert_eq!(classify(message), ErrorCategory::QuotaExceeded, "{message}");
        }
    }

    #[test]
    fn classifies_deadline() {
        assert_eq!(
            classify("504 DEADLINE_EXCEEDED: Deadline expired before operation could complete."),
            ErrorCategory::DeadlineExceeded
        );
    }

    #[test]
    fn falls_back_to_generic() {
        assert_eq!(classify(""), ErrorCategory::Generic);
        assert_eq!(classify("connection refused"), ErrorCategory::Generic);
        assert_eq!(classify("500 INTERNAL: boom"), ErrorCategory::Generic);
    }

    #[test]
    fn earlier_patterns_take_precedence() {
        assert_eq!(
            classify("API key not valid and quota exhausted past deadline"),
            ErrorCategory::InvalidCredential
        );
        assert_eq!(
            classify("quota check hit the deadline"),
            ErrorCategory::QuotaExceeded
        );
    }

    #[test]
    fn story_errors_map_to_categories() {
        assert_eq!(
            StoryError::MissingCredential.category(),
            ErrorCategory::InvalidCredential
        );
        assert_eq!(
            StoryError::Upstream("429 RESOURCE_EXHAUSTED: slow down".into()).category(),
            ErrorCategory::QuotaExceeded
        );
        assert_eq!(
            StoryError::Upstream("deadline exceeded: operation timed out".into()).category(),
            ErrorCategory::DeadlineExceeded
        );
        assert_eq!(StoryError::NoImageProduced.category(), ErrorCategory::Generic);
        assert_eq!(
            StoryError::InvalidResponseShape("missing title".into()).category(),
            ErrorCategory::Generic
        );
    }

    #[test]
    fn every_category_has_a_distinct_message() {
        let messages = [
            ErrorCategory::InvalidCredential.user_message(),
            ErrorCategory::QuotaExceeded.user_message(),
            ErrorCategory::DeadlineExceeded.user_message(),
            ErrorCategory::Generic.user_message(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
