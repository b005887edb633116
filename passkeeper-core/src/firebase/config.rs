use serde::{Deserialize, Serialize};

use crate::{PassKeeperError, PassKeeperResult};

const IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com";
const SECURE_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com";
const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Firebase project settings.
///
/// Deserializes straight from the web-app config object shown in the Firebase
/// console; keys other than `apiKey` and `projectId` are ignored unless they
/// override an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    /// Web API key.
    pub api_key: String,
    /// Project id, e.g. `psw-app-9b74e`.
    pub project_id: String,
    /// Base URL of the Identity Toolkit API.
    #[serde(default = "default_identity_endpoint")]
    pub identity_endpoint: String,
    /// Base URL of the Secure Token API.
    #[serde(default = "default_secure_token_endpoint")]
    pub secure_token_endpoint: String,
    /// Base URL of the Firestore API.
    #[serde(default = "default_firestore_endpoint")]
    pub firestore_endpoint: String,
}

fn default_identity_endpoint() -> String {
    IDENTITY_ENDPOINT.to_string()
}

fn default_secure_token_endpoint() -> String {
    SECURE_TOKEN_ENDPOINT.to_string()
}

fn default_firestore_endpoint() -> String {
    FIRESTORE_ENDPOINT.to_string()
}

impl FirebaseConfig {
    /// Config for `project_id` using the production endpoints.
    #[must_use]
    pub fn new(api_key: &str, project_id: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            project_id: project_id.to_string(),
            identity_endpoint: default_identity_endpoint(),
            secure_token_endpoint: default_secure_token_endpoint(),
            firestore_endpoint: default_firestore_endpoint(),
        }
    }

    /// Parses and checks a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`PassKeeperError::Serialization`] for malformed JSON and
    /// [`PassKeeperError::Validation`] for an empty key or project id or a
    /// non-HTTPS endpoint.
    pub fn from_json(json: &str) -> PassKeeperResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that required values are present and endpoints use HTTPS.
    ///
    /// # Errors
    ///
    /// See [`Self::from_json`].
    pub fn validate(&self) -> PassKeeperResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(PassKeeperError::validation("apiKey", "must not be empty"));
        }
        if self.project_id.trim().is_empty() {
            return Err(PassKeeperError::validation("projectId", "must not be empty"));
        }
        for (field, endpoint) in [
            ("identityEndpoint", &self.identity_endpoint),
            ("secureTokenEndpoint", &self.secure_token_endpoint),
            ("firestoreEndpoint", &self.firestore_endpoint),
        ] {
            if !endpoint.starts_with("https://") {
                return Err(PassKeeperError::validation(field, "must be an https URL"));
            }
        }
        Ok(())
    }

    pub(super) fn identity_url(&self, method: &str) -> String {
        format!(
            "{}/v1/accounts:{method}?key={}",
            self.identity_endpoint.trim_end_matches('/'),
            self.api_key
        )
    }

    pub(super) fn secure_token_url(&self) -> String {
        format!(
            "{}/v1/token?key={}",
            self.secure_token_endpoint.trim_end_matches('/'),
            self.api_key
        )
    }

    /// Resource name of the default database's document root.
    pub(super) fn documents_path(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    pub(super) fn firestore_url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}{path}",
            self.firestore_endpoint.trim_end_matches('/'),
            self.documents_path()
        )
    }

    #[cfg(test)]
    pub(crate) fn for_mock_server(url: &str) -> Self {
        Self {
            api_key: "test-key".to_string(),
            project_id: "demo".to_string(),
            identity_endpoint: url.to_string(),
            secure_token_endpoint: url.to_string(),
            firestore_endpoint: url.to_string(),
        }
    }
}

/// Parses a Firebase web-app config object.
///
/// # Errors
///
/// See [`FirebaseConfig::from_json`].
#[uniffi::export]
pub fn parse_firebase_config(json: &str) -> PassKeeperResult<FirebaseConfig> {
    FirebaseConfig::from_json(json)
}
