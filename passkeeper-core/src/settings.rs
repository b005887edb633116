use crate::PassKeeperResult;

/// Settings key under which the active locale tag is persisted.
pub const LANGUAGE_SETTING_KEY: &str = "app_language";

/// On-device key-value store that survives restarts.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PassKeeperError::Settings`] if the read fails.
    async fn get(&self, key: String) -> PassKeeperResult<Option<String>>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PassKeeperError::Settings`] if the write fails.
    async fn set(&self, key: String, value: String) -> PassKeeperResult<()>;
}
