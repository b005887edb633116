//! Session and identity facade.
//!
//! Everything here forwards to an [`IdentityProvider`]; the facade only keeps
//! the last known signed-in user and tells subscribers when that changes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use crate::{Locale, PassKeeperError, PassKeeperResult};

/// Minimum password length the provider accepts.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// The signed-in identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AuthUser {
    /// Provider-assigned user id; owner id of the user's records.
    pub uid: String,
    /// Sign-in email.
    pub email: Option<String>,
    /// Display name chosen at registration.
    pub display_name: Option<String>,
}

/// Hosted identity provider, implemented by the platform or by
/// [`crate::firebase::FirebaseIdentity`].
///
/// Failures carry the provider's opaque code in [`PassKeeperError::Auth`].
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates an account and signs it in.
    ///
    /// # Errors
    ///
    /// Returns the provider's failure, e.g. `auth/email-already-in-use`.
    async fn create_account(&self, email: String, password: String)
        -> PassKeeperResult<AuthUser>;

    /// Signs in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the provider's failure, e.g. `auth/wrong-password`.
    async fn sign_in(&self, email: String, password: String) -> PassKeeperResult<AuthUser>;

    /// Ends the provider session.
    ///
    /// # Errors
    ///
    /// Returns the provider's failure.
    async fn sign_out(&self) -> PassKeeperResult<()>;

    /// Sets the display name of `user` and returns the updated user.
    ///
    /// # Errors
    ///
    /// Returns the provider's failure.
    async fn update_display_name(
        &self,
        user: AuthUser,
        display_name: String,
    ) -> PassKeeperResult<AuthUser>;

    /// Sends a password-reset email.
    ///
    /// # Errors
    ///
    /// Returns the provider's failure, e.g. `auth/too-many-requests`.
    async fn send_password_reset_email(&self, email: String) -> PassKeeperResult<()>;
}

/// Receives auth-state transitions.
#[uniffi::export(with_foreign)]
pub trait AuthStateListener: Send + Sync {
    /// Called once per transition with the new user, or `None` after sign-out.
    fn on_auth_state_changed(&self, user: Option<AuthUser>);
}

#[derive(Default)]
struct SessionState {
    current: RwLock<Option<AuthUser>>,
    listeners: Mutex<BTreeMap<u64, Arc<dyn AuthStateListener>>>,
    next_listener_id: AtomicU64,
}

impl SessionState {
    fn current(&self) -> Option<AuthUser> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stores `user` and notifies listeners if the signed-in uid changed.
    fn transition(&self, user: Option<AuthUser>) {
        let changed = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let changed = current.as_ref().map(|u| &u.uid) != user.as_ref().map(|u| &u.uid);
            current.clone_from(&user);
            changed
        };
        if !changed {
            return;
        }

        match &user {
            Some(user) => log::info!("signed in as {}", user.uid),
            None => log::info!("signed out"),
        }

        // Listeners may unsubscribe from inside the callback.
        let listeners: Vec<Arc<dyn AuthStateListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener.on_auth_state_changed(user.clone());
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Handle returned by [`SessionManager::on_auth_state_change`].
///
/// The listener stays registered until [`AuthSubscription::cancel`] is called
/// or the handle is dropped.
#[derive(uniffi::Object)]
pub struct AuthSubscription {
    id: u64,
    state: Weak<SessionState>,
}

impl std::fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[uniffi::export]
impl AuthSubscription {
    /// Stops delivering notifications. Calling it twice is harmless.
    pub fn cancel(&self) {
        if let Some(state) = self.state.upgrade() {
            state.unsubscribe(self.id);
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Session facade over an [`IdentityProvider`].
#[derive(uniffi::Object)]
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    state: Arc<SessionState>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("current", &self.state.current())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Returns the signed-in user or [`PassKeeperError::NotSignedIn`].
    ///
    /// # Errors
    ///
    /// Fails when nobody is signed in.
    pub fn require_user(&self) -> PassKeeperResult<AuthUser> {
        self.state.current().ok_or(PassKeeperError::NotSignedIn)
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl SessionManager {
    /// Creates a signed-out session over `provider`.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            state: Arc::new(SessionState::default()),
        }
    }

    /// Creates an account, signs it in and sets its display name.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty input, otherwise the provider's
    /// failure. If only the display-name update fails the account exists and
    /// stays signed in.
    pub async fn register(
        &self,
        email: String,
        password: String,
        display_name: String,
    ) -> PassKeeperResult<AuthUser> {
        require_filled("email", &email)?;
        require_filled("password", &password)?;
        require_filled("display_name", &display_name)?;

        let user = self.provider.create_account(email, password).await?;
        self.state.transition(Some(user.clone()));

        let user = self
            .provider
            .update_display_name(user, display_name)
            .await?;
        self.state.transition(Some(user.clone()));
        Ok(user)
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty input, otherwise the provider's
    /// failure.
    pub async fn login(&self, email: String, password: String) -> PassKeeperResult<AuthUser> {
        require_filled("email", &email)?;
        require_filled("password", &password)?;

        let user = self.provider.sign_in(email, password).await?;
        self.state.transition(Some(user.clone()));
        Ok(user)
    }

    /// Signs out. The session is kept if the provider refuses.
    ///
    /// # Errors
    ///
    /// Returns the provider's failure.
    pub async fn logout(&self) -> PassKeeperResult<()> {
        self.provider.sign_out().await?;
        self.state.transition(None);
        Ok(())
    }

    /// The last known signed-in user. Performs no I/O.
    #[must_use]
    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.current()
    }

    /// Sends a password-reset email.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or malformed address, otherwise
    /// the provider's failure.
    pub async fn request_password_reset(&self, email: String) -> PassKeeperResult<()> {
        validate_email(&email)?;
        self.provider.send_password_reset_email(email).await
    }

    /// Registers `listener` for auth-state transitions.
    ///
    /// Nothing is delivered on subscription; read [`Self::current_user`] for
    /// the starting state.
    #[must_use]
    pub fn on_auth_state_change(
        &self,
        listener: Arc<dyn AuthStateListener>,
    ) -> Arc<AuthSubscription> {
        let id = self.state.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.state
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, listener);
        Arc::new(AuthSubscription {
            id,
            state: Arc::downgrade(&self.state),
        })
    }

    /// Forwards a transition observed by the provider itself, such as a
    /// session restored at launch or revoked server-side.
    pub fn sync_auth_state(&self, user: Option<AuthUser>) {
        self.state.transition(user);
    }
}

/// Registration form as entered by the user.
#[derive(Clone, PartialEq, Eq, uniffi::Record)]
pub struct RegistrationForm {
    /// Chosen display name.
    pub display_name: String,
    /// Sign-in email.
    pub email: String,
    /// Chosen password.
    pub password: String,
    /// Password typed a second time.
    pub confirm_password: String,
}

impl std::fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Checks a registration form before it reaches the provider.
///
/// # Errors
///
/// Returns [`PassKeeperError::Validation`] for an empty field, mismatching
/// passwords or a password shorter than [`MIN_PASSWORD_LENGTH`].
#[uniffi::export]
#[allow(clippy::needless_pass_by_value)]
pub fn validate_registration(form: RegistrationForm) -> PassKeeperResult<()> {
    require_filled("display_name", &form.display_name)?;
    require_filled("email", &form.email)?;
    require_filled("password", &form.password)?;
    require_filled("confirm_password", &form.confirm_password)?;
    if form.password != form.confirm_password {
        return Err(PassKeeperError::validation(
            "confirm_password",
            "passwords do not match",
        ));
    }
    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PassKeeperError::validation(
            "password",
            "must be at least 6 characters",
        ));
    }
    Ok(())
}

/// Checks that `email` looks like `local@domain.tld`.
///
/// # Errors
///
/// Returns [`PassKeeperError::Validation`] for an empty or malformed address.
#[uniffi::export]
pub fn validate_email(email: &str) -> PassKeeperResult<()> {
    require_filled("email", email)?;
    let malformed = || PassKeeperError::validation("email", "not a valid email address");
    if email.chars().any(char::is_whitespace) {
        return Err(malformed());
    }
    let (local, domain) = email.split_once('@').ok_or_else(malformed)?;
    if local.is_empty() || domain.contains('@') {
        return Err(malformed());
    }
    let has_inner_dot = domain
        .char_indices()
        .any(|(index, c)| c == '.' && index > 0 && index + 1 < domain.len());
    if !has_inner_dot {
        return Err(malformed());
    }
    Ok(())
}

fn require_filled(field: &str, value: &str) -> PassKeeperResult<()> {
    if value.is_empty() {
        return Err(PassKeeperError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Known families of identity-provider error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum AuthErrorKind {
    /// No account for that email.
    UserNotFound,
    /// Password does not match.
    WrongPassword,
    /// Email is malformed.
    InvalidEmail,
    /// Email or password is wrong (provider does not say which).
    InvalidCredential,
    /// An account already uses that email.
    EmailAlreadyInUse,
    /// Password rejected as too weak.
    WeakPassword,
    /// The provider is throttling requests.
    TooManyRequests,
    /// Anything else.
    Other,
}

/// Screen an auth error is shown on; selects the fallback text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum AuthScreen {
    /// Sign-in screen.
    Login,
    /// Registration screen.
    Register,
    /// Password-reset screen.
    PasswordReset,
}

const AUTH_CODE_FAMILIES: &[(&str, AuthErrorKind)] = &[
    ("user-not-found", AuthErrorKind::UserNotFound),
    ("wrong-password", AuthErrorKind::WrongPassword),
    ("invalid-email", AuthErrorKind::InvalidEmail),
    ("invalid-credential", AuthErrorKind::InvalidCredential),
    ("email-already-in-use", AuthErrorKind::EmailAlreadyInUse),
    ("weak-password", AuthErrorKind::WeakPassword),
    ("too-many-requests", AuthErrorKind::TooManyRequests),
];

impl AuthErrorKind {
    /// Classifies a provider code. Matches on substrings so that full
    /// messages such as `Firebase: Error (auth/user-not-found).` work too.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        AUTH_CODE_FAMILIES
            .iter()
            .find(|(needle, _)| code.contains(needle))
            .map_or(Self::Other, |(_, kind)| *kind)
    }

    /// Translation key of the message to show on `screen`.
    #[must_use]
    pub const fn message_key(self, screen: AuthScreen) -> &'static str {
        match (screen, self) {
            (AuthScreen::Login, Self::UserNotFound) => "login.userNotFound",
            (AuthScreen::Login, Self::WrongPassword) => "login.wrongPassword",
            (AuthScreen::Login | AuthScreen::Register, Self::InvalidEmail) => {
                "login.invalidEmail"
            }
            (AuthScreen::Login, Self::InvalidCredential) => "login.invalidCredential",
            (AuthScreen::Login, _) => "login.loginFailed",
            (AuthScreen::Register, Self::EmailAlreadyInUse) => "register.emailInUse",
            (AuthScreen::Register, Self::WeakPassword) => "register.weakPassword",
            (AuthScreen::Register, _) => "register.registerFailed",
            (AuthScreen::PasswordReset, Self::UserNotFound) => "forgot.userNotFound",
            (AuthScreen::PasswordReset, Self::InvalidEmail) => "forgot.invalidEmail",
            (AuthScreen::PasswordReset, Self::TooManyRequests) => "forgot.tooManyRequests",
            (AuthScreen::PasswordReset, _) => "forgot.resetFailed",
        }
    }
}

/// Localized message for a provider error code shown on `screen`.
#[uniffi::export]
#[must_use]
pub fn auth_error_message(code: &str, screen: AuthScreen, locale: Locale) -> String {
    locale.translate(AuthErrorKind::from_code(code).message_key(screen))
}
