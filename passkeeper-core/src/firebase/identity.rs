use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::http::{kebab_case, read_json, ApiError, Request};
use super::FirebaseConfig;
use crate::{AuthUser, IdentityProvider, PassKeeperError, PassKeeperResult};

/// ID tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Maps an Identity Toolkit error message to the code Firebase's JS SDK
/// would report.
///
/// Messages may carry a detail suffix, e.g.
/// `WEAK_PASSWORD : Password should be at least 6 characters`.
fn auth_code(message: &str) -> String {
    let reason = message.split(" : ").next().unwrap_or_default().trim();
    let code = match reason {
        "EMAIL_NOT_FOUND" => "user-not-found",
        "INVALID_PASSWORD" => "wrong-password",
        "INVALID_EMAIL" => "invalid-email",
        "INVALID_LOGIN_CREDENTIALS" => "invalid-credential",
        "EMAIL_EXISTS" => "email-already-in-use",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "too-many-requests",
        "USER_DISABLED" => "user-disabled",
        "USER_NOT_FOUND" => "user-not-found",
        "TOKEN_EXPIRED" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => "user-token-expired",
        "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN" => "invalid-user-token",
        reason if reason.starts_with("WEAK_PASSWORD") => "weak-password",
        other => return format!("auth/{}", kebab_case(other)),
    };
    format!("auth/{code}")
}

fn reject(error: ApiError) -> PassKeeperError {
    PassKeeperError::auth(auth_code(&error.message))
}

struct Tokens {
    uid: String,
    id_token: SecretString,
    refresh_token: SecretString,
    expires_at: Instant,
}

impl Tokens {
    fn new(uid: String, id_token: String, refresh_token: String, expires_in: &str) -> Self {
        let lifetime = expires_in.parse().map_or(Duration::ZERO, Duration::from_secs);
        Self {
            uid,
            id_token: SecretString::from(id_token),
            refresh_token: SecretString::from(refresh_token),
            expires_at: Instant::now() + lifetime,
        }
    }

    fn needs_refresh(&self) -> bool {
        self.expires_at.saturating_duration_since(Instant::now()) < REFRESH_MARGIN
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    email: Option<String>,
    display_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'a str,
    refresh_token: &'a str,
}

/// The Secure Token API answers in snake case.
#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

/// Firebase Auth over the Identity Toolkit REST API.
///
/// Holds the ID and refresh tokens of the signed-in user in memory. Persisting
/// the session across launches is up to the host: save [`Self::refresh_token`]
/// and hand it back to [`Self::restore`].
#[derive(uniffi::Object)]
pub struct FirebaseIdentity {
    config: FirebaseConfig,
    request: Request,
    tokens: Mutex<Option<Tokens>>,
}

impl std::fmt::Debug for FirebaseIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseIdentity")
            .field("project_id", &self.config.project_id)
            .finish_non_exhaustive()
    }
}

impl FirebaseIdentity {
    async fn password_call(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> PassKeeperResult<AuthUser> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response = self
            .request
            .handle(self.request.post(&self.config.identity_url(method)).json(&body))
            .await?;
        let signed_in: SignInResponse = read_json(response, reject).await?;

        let user = AuthUser {
            uid: signed_in.local_id.clone(),
            email: signed_in.email.or_else(|| Some(email.to_string())),
            display_name: signed_in.display_name.filter(|name| !name.is_empty()),
        };
        *self.tokens.lock().await = Some(Tokens::new(
            signed_in.local_id,
            signed_in.id_token,
            signed_in.refresh_token,
            &signed_in.expires_in,
        ));
        Ok(user)
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> PassKeeperResult<Tokens> {
        let body = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
        };
        let response = self
            .request
            .handle(self.request.post(&self.config.secure_token_url()).json(&body))
            .await?;
        let refreshed: RefreshResponse = read_json(response, reject).await?;
        log::debug!("refreshed ID token for {}", refreshed.user_id);
        Ok(Tokens::new(
            refreshed.user_id,
            refreshed.id_token,
            refreshed.refresh_token,
            &refreshed.expires_in,
        ))
    }

    /// A valid ID token for the signed-in user, refreshed if it is about to
    /// expire.
    ///
    /// # Errors
    ///
    /// Returns [`PassKeeperError::NotSignedIn`] without a session, or the
    /// provider's failure if the refresh is rejected.
    pub async fn id_token(&self) -> PassKeeperResult<SecretString> {
        let mut guard = self.tokens.lock().await;
        let tokens = guard.as_mut().ok_or(PassKeeperError::NotSignedIn)?;
        if tokens.needs_refresh() {
            let refreshed = self
                .exchange_refresh_token(tokens.refresh_token.expose_secret())
                .await?;
            *tokens = refreshed;
        }
        Ok(SecretString::from(tokens.id_token.expose_secret().to_string()))
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl FirebaseIdentity {
    /// Creates a signed-out client for the project in `config`.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(config: FirebaseConfig) -> Self {
        Self {
            config,
            request: Request::new(),
            tokens: Mutex::new(None),
        }
    }

    /// This client as an [`IdentityProvider`] for [`crate::SessionManager`].
    #[must_use]
    pub fn as_identity_provider(self: Arc<Self>) -> Arc<dyn IdentityProvider> {
        self
    }

    /// Uid of the signed-in user, if any.
    pub async fn current_uid(&self) -> Option<String> {
        self.tokens.lock().await.as_ref().map(|t| t.uid.clone())
    }

    /// The refresh token of the current session, for the host to persist.
    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens
            .lock()
            .await
            .as_ref()
            .map(|t| t.refresh_token.expose_secret().to_string())
    }

    /// Re-establishes a session from a persisted refresh token.
    ///
    /// Pass the returned user to [`crate::SessionManager::sync_auth_state`].
    ///
    /// # Errors
    ///
    /// Returns the provider's failure, e.g. `auth/user-token-expired` when the
    /// token was revoked.
    pub async fn restore(&self, refresh_token: String) -> PassKeeperResult<AuthUser> {
        let tokens = self.exchange_refresh_token(&refresh_token).await?;
        let body = LookupRequest {
            id_token: tokens.id_token.expose_secret(),
        };
        let response = self
            .request
            .handle(self.request.post(&self.config.identity_url("lookup")).json(&body))
            .await?;
        let lookup: LookupResponse = read_json(response, reject).await?;
        let user = lookup
            .users
            .into_iter()
            .find(|user| user.local_id == tokens.uid)
            .map(|user| AuthUser {
                uid: user.local_id,
                email: user.email,
                display_name: user.display_name.filter(|name| !name.is_empty()),
            })
            .ok_or_else(|| PassKeeperError::auth("auth/user-not-found"))?;

        *self.tokens.lock().await = Some(tokens);
        log::info!("restored session for {}", user.uid);
        Ok(user)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn create_account(&self, email: String, password: String) -> PassKeeperResult<AuthUser> {
        self.password_call("signUp", &email, &password).await
    }

    async fn sign_in(&self, email: String, password: String) -> PassKeeperResult<AuthUser> {
        self.password_call("signInWithPassword", &email, &password)
            .await
    }

    async fn sign_out(&self) -> PassKeeperResult<()> {
        self.tokens.lock().await.take();
        Ok(())
    }

    async fn update_display_name(
        &self,
        user: AuthUser,
        display_name: String,
    ) -> PassKeeperResult<AuthUser> {
        let id_token = self.id_token().await?;
        let body = UpdateProfileRequest {
            id_token: id_token.expose_secret(),
            display_name: &display_name,
            return_secure_token: false,
        };
        let response = self
            .request
            .handle(self.request.post(&self.config.identity_url("update")).json(&body))
            .await?;
        let profile: ProfileResponse = read_json(response, reject).await?;
        Ok(AuthUser {
            uid: user.uid,
            email: profile.email.or(user.email),
            display_name: profile.display_name.or(Some(display_name)),
        })
    }

    async fn send_password_reset_email(&self, email: String) -> PassKeeperResult<()> {
        let body = OobCodeRequest {
            request_type: "PASSWORD_RESET",
            email: &email,
        };
        let response = self
            .request
            .handle(
                self.request
                    .post(&self.config.identity_url("sendOobCode"))
                    .json(&body),
            )
            .await?;
        let _: serde_json::Value = read_json(response, reject).await?;
        Ok(())
    }
}
