use thiserror::Error;

/// Result alias used across the crate.
pub type PassKeeperResult<T, E = PassKeeperError> = std::result::Result<T, E>;

/// Error outputs from `PassKeeper`.
///
/// Provider and store codes are passed through opaquely; mapping them to
/// human-readable text happens at the presentation boundary (see
/// [`crate::AuthErrorKind`]).
#[derive(Debug, Error, uniffi::Error)]
pub enum PassKeeperError {
    /// A required input is missing or malformed. Raised before any external call.
    #[error("validation_error: {field}: {reason}")]
    Validation {
        /// Name of the rejected field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// The identity provider rejected the operation.
    #[error("auth_error: {code}")]
    Auth {
        /// Provider-defined code, e.g. `auth/user-not-found`.
        code: String,
    },
    /// The document store rejected the operation.
    #[error("store_error: {code}: {message}")]
    Store {
        /// Store-defined code, e.g. `permission-denied`.
        code: String,
        /// Free-form detail reported by the store.
        message: String,
    },
    /// The biometric challenge failed or was cancelled.
    #[error("biometric_denied")]
    BiometricDenied,
    /// The operation requires a signed-in session.
    #[error("not_signed_in")]
    NotSignedIn,
    /// Network connection error with details.
    #[error("network_error: {url} ({status:?}): {error}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Error description.
        error: String,
    },
    /// Unexpected error serializing or parsing data.
    #[error("serialization_error: {error}")]
    Serialization {
        /// Error description.
        error: String,
    },
    /// The settings store failed to read or persist a value.
    #[error("settings_error: {error}")]
    Settings {
        /// Error description.
        error: String,
    },
    /// A foreign callback failed in a way it did not declare.
    #[error("unexpected_error: {error}")]
    Unexpected {
        /// Error description.
        error: String,
    },
}

impl PassKeeperError {
    pub(crate) fn validation(field: &str, reason: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn auth(code: impl Into<String>) -> Self {
        Self::Auth { code: code.into() }
    }

    pub(crate) fn store(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for PassKeeperError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Unexpected {
            error: error.reason,
        }
    }
}

impl From<serde_json::Error> for PassKeeperError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            error: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for PassKeeperError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network {
            url: error
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: error.status().map(|status| status.as_u16()),
            error: error.to_string(),
        }
    }
}
