//! Process-wide application state, passed explicitly instead of living in globals.

use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    Locale, PassKeeperResult, SessionManager, SettingsStore, Translator, LANGUAGE_SETTING_KEY,
};

/// Active locale and session, shared by every screen.
///
/// Both values are written only by explicit user actions (switching language,
/// signing in or out).
#[derive(uniffi::Object)]
pub struct AppContext {
    settings: Arc<dyn SettingsStore>,
    session: Arc<SessionManager>,
    locale: RwLock<Locale>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("locale", &self.locale())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl AppContext {
    /// Builds the context at app start, reading the persisted locale.
    ///
    /// A missing, unknown or unreadable setting falls back to the default
    /// locale.
    #[uniffi::constructor]
    pub async fn load(settings: Arc<dyn SettingsStore>, session: Arc<SessionManager>) -> Self {
        let locale = match settings.get(LANGUAGE_SETTING_KEY.to_string()).await {
            Ok(Some(tag)) => tag.parse().unwrap_or_else(|_| {
                log::warn!("ignoring unknown persisted locale {tag:?}");
                Locale::default()
            }),
            Ok(None) => Locale::default(),
            Err(err) => {
                log::error!("failed to load language setting: {err}");
                Locale::default()
            }
        };
        Self {
            settings,
            session,
            locale: RwLock::new(locale),
        }
    }

    /// The active locale.
    #[must_use]
    pub fn locale(&self) -> Locale {
        *self.locale.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// A translator for the active locale.
    #[must_use]
    pub fn translator(&self) -> Arc<Translator> {
        Arc::new(Translator::new(self.locale()))
    }

    /// Resolves `key` in the active locale.
    #[must_use]
    pub fn t(&self, key: &str) -> String {
        self.locale().translate(key)
    }

    /// The session facade.
    #[must_use]
    pub fn session(&self) -> Arc<SessionManager> {
        Arc::clone(&self.session)
    }

    /// Makes `locale` active and persists it.
    ///
    /// The in-memory switch happens first and sticks even if persisting fails.
    ///
    /// # Errors
    ///
    /// Returns the settings store's failure.
    pub async fn set_locale(&self, locale: Locale) -> PassKeeperResult<()> {
        *self.locale.write().unwrap_or_else(PoisonError::into_inner) = locale;
        self.settings
            .set(LANGUAGE_SETTING_KEY.to_string(), locale.tag().to_string())
            .await
            .inspect_err(|err| log::error!("failed to save language setting: {err}"))
    }

    /// Flips between the two shipped locales and returns the new one.
    ///
    /// # Errors
    ///
    /// See [`Self::set_locale`].
    pub async fn switch_locale(&self) -> PassKeeperResult<Locale> {
        let next = self.locale().toggled();
        self.set_locale(next).await?;
        Ok(next)
    }
}
