//! Biometric gating of plaintext reveal.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Locale, PassKeeperError, PassKeeperResult};

/// Texts shown by the device biometric prompt.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct BiometricPrompt {
    /// Main prompt line.
    pub prompt_message: String,
    /// Label of the cancel button.
    pub cancel_label: String,
    /// Label of the device-passcode fallback button.
    pub fallback_label: String,
    /// Whether the device passcode fallback is disabled.
    pub disable_device_fallback: bool,
}

impl BiometricPrompt {
    /// Prompt texts for `locale`.
    #[must_use]
    pub fn for_locale(locale: Locale) -> Self {
        Self {
            prompt_message: locale.translate("biometric.prompt"),
            cancel_label: locale.translate("biometric.cancel"),
            fallback_label: locale.translate("biometric.fallback"),
            disable_device_fallback: false,
        }
    }
}

/// On-device biometric prompt, implemented by the host platform.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait BiometricAuthenticator: Send + Sync {
    /// Whether the device has biometric hardware.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability query fails.
    async fn has_hardware(&self) -> PassKeeperResult<bool>;

    /// Whether at least one biometric is enrolled.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability query fails.
    async fn is_enrolled(&self) -> PassKeeperResult<bool>;

    /// Runs one challenge. `true` means the user was authenticated; a
    /// cancelled prompt reports `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt could not be shown.
    async fn authenticate(&self, prompt: BiometricPrompt) -> PassKeeperResult<bool>;
}

/// Whether a record's secret is currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum RevealState {
    /// Secret is masked.
    Hidden,
    /// Secret is shown in plaintext.
    Revealed,
}

/// Per-record reveal state for the currently displayed list.
///
/// Every id starts hidden. Revealing requires a passing biometric challenge
/// when the device can run one; hiding never does. State lives only as long
/// as the list it belongs to and is dropped by [`VisibilityGate::reset`].
#[derive(uniffi::Object)]
pub struct VisibilityGate {
    biometric: Arc<dyn BiometricAuthenticator>,
    revealed: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for VisibilityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityGate")
            .field("revealed", &self.revealed_ids().len())
            .finish_non_exhaustive()
    }
}

impl VisibilityGate {
    fn revealed_set(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set holds plain ids; a panicked writer cannot leave it inconsistent.
        self.revealed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capability failures count as "no biometric" so users without working
    /// hardware are not locked out of their own records.
    async fn biometric_available(&self) -> bool {
        let hardware = match self.biometric.has_hardware().await {
            Ok(hardware) => hardware,
            Err(err) => {
                log::warn!("biometric hardware query failed: {err}");
                return false;
            }
        };
        if !hardware {
            return false;
        }
        match self.biometric.is_enrolled().await {
            Ok(enrolled) => enrolled,
            Err(err) => {
                log::warn!("biometric enrollment query failed: {err}");
                false
            }
        }
    }
}

#[uniffi::export]
impl VisibilityGate {
    /// Creates a gate with every record hidden.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(biometric: Arc<dyn BiometricAuthenticator>) -> Self {
        Self {
            biometric,
            revealed: Mutex::new(HashSet::new()),
        }
    }

    /// Current state of `id`.
    #[must_use]
    pub fn state(&self, id: &str) -> RevealState {
        if self.revealed_set().contains(id) {
            RevealState::Revealed
        } else {
            RevealState::Hidden
        }
    }

    /// Whether `id` is revealed.
    #[must_use]
    pub fn is_revealed(&self, id: &str) -> bool {
        self.state(id) == RevealState::Revealed
    }

    /// Ids currently revealed.
    #[must_use]
    pub fn revealed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.revealed_set().iter().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Reveals `id`, running one biometric challenge if the device supports it.
    ///
    /// # Errors
    ///
    /// Returns [`PassKeeperError::BiometricDenied`] when the challenge fails,
    /// is cancelled or cannot be shown; the record stays hidden.
    pub async fn reveal(&self, id: String, locale: Locale) -> PassKeeperResult<()> {
        if self.is_revealed(&id) {
            return Ok(());
        }

        if self.biometric_available().await {
            let approved = match self
                .biometric
                .authenticate(BiometricPrompt::for_locale(locale))
                .await
            {
                Ok(approved) => approved,
                Err(err) => {
                    log::warn!("biometric challenge failed to run: {err}");
                    false
                }
            };
            if !approved {
                log::info!("reveal of record {id} denied");
                return Err(PassKeeperError::BiometricDenied);
            }
        } else {
            log::debug!("no biometric capability, reveal of record {id} auto-approved");
        }

        self.revealed_set().insert(id);
        Ok(())
    }

    /// Hides `id`. Never prompts.
    pub fn hide(&self, id: &str) {
        self.revealed_set().remove(id);
    }

    /// Hides `id` if revealed, otherwise asks to reveal it.
    ///
    /// # Errors
    ///
    /// See [`VisibilityGate::reveal`].
    pub async fn toggle(&self, id: String, locale: Locale) -> PassKeeperResult<RevealState> {
        if self.is_revealed(&id) {
            self.hide(&id);
            return Ok(RevealState::Hidden);
        }
        self.reveal(id, locale).await?;
        Ok(RevealState::Revealed)
    }

    /// Hides everything; called whenever the list is reloaded.
    pub fn reset(&self) {
        self.revealed_set().clear();
    }
}
