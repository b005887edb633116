//! `passkeeper`: developer CLI driving the PassKeeper core against a Firebase
//! project.
//!
//! The Firebase web config is read from `--config` (or `PASSKEEPER_CONFIG`);
//! the active language and the session's refresh token live in a JSON
//! settings file under the user's config directory.

mod confirm;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::{bail, eyre, Result, WrapErr};
use passkeeper_core::firebase::{FirebaseConfig, FirebaseIdentity, FirestoreStore};
use passkeeper_core::{
    auth_error_message, validate_registration, AppContext, AuthScreen, CredentialPatch,
    CredentialRecord, CredentialVault, Locale, NewCredential, PassKeeperError, RegistrationForm,
    SessionManager, SettingsStore, VisibilityGate,
};
use tracing_subscriber::EnvFilter;

use crate::confirm::TerminalConfirmation;
use crate::settings::{FileSettingsStore, REFRESH_TOKEN_KEY};

const MASK: &str = "••••••••";

#[derive(Parser)]
#[command(name = "passkeeper", version, about = "PassKeeper password manager CLI")]
struct Cli {
    /// Firebase web config (JSON with `apiKey` and `projectId`).
    #[arg(long, env = "PASSKEEPER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Settings file holding the language and session.
    #[arg(long, env = "PASSKEEPER_SETTINGS", global = true)]
    settings: Option<PathBuf>,

    /// Log debug output of the core to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and sign in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Repeat of the password; defaults to `--password`
        #[arg(long)]
        confirm_password: Option<String>,
        /// Display name
        #[arg(long)]
        name: String,
    },

    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Sign out and forget the saved session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Send a password-reset email
    ResetPassword {
        #[arg(long)]
        email: String,
    },

    /// List credentials, pinned first
    List,

    /// Add a credential
    Add {
        #[arg(long)]
        purpose: String,
        #[arg(long)]
        account: String,
        #[arg(long)]
        secret: String,
    },

    /// Change fields of a credential
    Edit {
        id: String,
        #[arg(long)]
        purpose: Option<String>,
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        secret: Option<String>,
    },

    /// Delete a credential
    Delete { id: String },

    /// Pin or unpin a credential
    Pin { id: String },

    /// Show a credential's secret after confirmation
    Reveal {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show the language, or switch to `zh` / `ja`
    Lang { locale: Option<Locale> },
}

fn init_tracing(verbose: bool) -> Result<()> {
    let fallback = if verbose {
        "warn,passkeeper=debug,passkeeper_core=debug"
    } else {
        "warn"
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("passkeeper").join("firebase.json"))
        .ok_or_else(|| eyre!("no config directory on this platform; pass --config"))
}

fn load_config(path: Option<PathBuf>) -> Result<FirebaseConfig> {
    let path = path.map_or_else(default_config_path, Ok)?;
    let json = std::fs::read_to_string(&path)
        .wrap_err_with(|| format!("reading Firebase config {}", path.display()))?;
    FirebaseConfig::from_json(&json)
        .wrap_err_with(|| format!("invalid Firebase config {}", path.display()))
}

/// Turns a core error into a message in the active language.
fn explain(err: PassKeeperError, screen: Option<AuthScreen>, context: &AppContext) -> eyre::Report {
    match (err, screen) {
        (PassKeeperError::Auth { code }, Some(screen)) => {
            tracing::debug!(%code, "auth failure");
            eyre!(auth_error_message(&code, screen, context.locale()))
        }
        (PassKeeperError::BiometricDenied, _) => eyre!(context.t("biometric.failed")),
        (PassKeeperError::NotSignedIn, _) => eyre!("not signed in; run `passkeeper login` first"),
        (err, _) => eyre!(err),
    }
}

struct App {
    context: AppContext,
    identity: Arc<FirebaseIdentity>,
    settings: Arc<FileSettingsStore>,
    vault: CredentialVault,
}

impl App {
    async fn start(config: FirebaseConfig, settings: Arc<FileSettingsStore>) -> Self {
        let identity = Arc::new(FirebaseIdentity::new(config.clone()));
        let session = Arc::new(SessionManager::new(
            Arc::clone(&identity).as_identity_provider(),
        ));
        let context = AppContext::load(settings.clone(), session).await;
        let store = Arc::new(FirestoreStore::new(config, Arc::clone(&identity)));
        let app = Self {
            context,
            identity,
            settings,
            vault: CredentialVault::new(store.as_document_store()),
        };
        app.restore_session().await;
        app
    }

    async fn restore_session(&self) {
        let token = match self.settings.get(REFRESH_TOKEN_KEY.to_string()).await {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(%err, "could not read saved session");
                return;
            }
        };
        match self.identity.restore(token).await {
            Ok(user) => self.context.session().sync_auth_state(Some(user)),
            Err(err) => {
                tracing::warn!(%err, "saved session is no longer valid");
                self.forget_session().await;
            }
        }
    }

    async fn save_session(&self) {
        let Some(token) = self.identity.refresh_token().await else {
            return;
        };
        if let Err(err) = self.settings.set(REFRESH_TOKEN_KEY.to_string(), token).await {
            tracing::warn!(%err, "could not save session");
        }
    }

    async fn forget_session(&self) {
        if let Err(err) = self
            .settings
            .set(REFRESH_TOKEN_KEY.to_string(), String::new())
            .await
        {
            tracing::warn!(%err, "could not clear saved session");
        }
    }

    fn owner_id(&self) -> Result<String> {
        self.context
            .session()
            .require_user()
            .map(|user| user.uid)
            .map_err(|err| explain(err, None, &self.context))
    }

    async fn find(&self, id: &str) -> Result<CredentialRecord> {
        let owner_id = self.owner_id()?;
        self.vault
            .list(owner_id)
            .await
            .map_err(|err| explain(err, None, &self.context))?
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| eyre!("no credential with id {id}"))
    }

    #[allow(clippy::too_many_lines)]
    async fn run(&self, command: Command) -> Result<()> {
        let context = &self.context;
        let session = context.session();

        match command {
            Command::Register {
                email,
                password,
                confirm_password,
                name,
            } => {
                validate_registration(RegistrationForm {
                    display_name: name.clone(),
                    email: email.clone(),
                    confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                    password: password.clone(),
                })
                .map_err(|err| explain(err, None, context))?;
                let user = session
                    .register(email, password, name)
                    .await
                    .map_err(|err| explain(err, Some(AuthScreen::Register), context))?;
                self.save_session().await;
                println!("{} {}", context.t("register.registerSuccess"), user.uid);
            }
            Command::Login { email, password } => {
                let user = session
                    .login(email, password)
                    .await
                    .map_err(|err| explain(err, Some(AuthScreen::Login), context))?;
                self.save_session().await;
                println!(
                    "{} {}",
                    context.t("home.welcome"),
                    user.display_name.or(user.email).unwrap_or(user.uid)
                );
            }
            Command::Logout => {
                session
                    .logout()
                    .await
                    .map_err(|err| explain(err, None, context))?;
                self.forget_session().await;
                println!("{}", context.t("home.logout"));
            }
            Command::Whoami => {
                let user = session
                    .require_user()
                    .map_err(|err| explain(err, None, context))?;
                println!("uid:   {}", user.uid);
                println!("email: {}", user.email.unwrap_or_default());
                println!("name:  {}", user.display_name.unwrap_or_default());
            }
            Command::ResetPassword { email } => {
                session
                    .request_password_reset(email)
                    .await
                    .map_err(|err| explain(err, Some(AuthScreen::PasswordReset), context))?;
                println!("{}", context.t("forgot.sentTitle"));
            }
            Command::List => {
                let records = self
                    .vault
                    .list(self.owner_id()?)
                    .await
                    .map_err(|err| {
                        tracing::error!(%err, "listing failed");
                        eyre!(context.t("home.loadFailed"))
                    })?;
                if records.is_empty() {
                    println!("{}", context.t("home.emptyTitle"));
                    return Ok(());
                }
                println!("{} {}", records.len(), context.t("home.totalPasswords"));
                for record in records {
                    let marker = if record.is_pinned { "*" } else { " " };
                    println!(
                        "{marker} {}  {}  {}  {MASK}",
                        record.id, record.purpose, record.account
                    );
                }
            }
            Command::Add {
                purpose,
                account,
                secret,
            } => {
                let credential = NewCredential {
                    purpose,
                    account,
                    secret,
                };
                if credential.validate().is_err() {
                    bail!(context.t("home.fillAllFieldsError"));
                }
                let id = self
                    .vault
                    .add(self.owner_id()?, credential)
                    .await
                    .map_err(|err| {
                        tracing::error!(%err, "add failed");
                        eyre!(context.t("home.addFailed"))
                    })?;
                println!("{} ({id})", context.t("home.addSuccess"));
            }
            Command::Edit {
                id,
                purpose,
                account,
                secret,
            } => {
                let patch = CredentialPatch {
                    purpose,
                    account,
                    secret,
                };
                if patch.validate().is_err() {
                    bail!(context.t("home.fillAllFieldsError"));
                }
                self.owner_id()?;
                self.vault.update(id, patch).await.map_err(|err| {
                    tracing::error!(%err, "update failed");
                    eyre!(context.t("home.updateFailed"))
                })?;
                println!("{}", context.t("home.updateSuccess"));
            }
            Command::Delete { id } => {
                self.owner_id()?;
                self.vault.delete(id).await.map_err(|err| {
                    tracing::error!(%err, "delete failed");
                    eyre!(context.t("home.deleteFailed"))
                })?;
                println!("{}", context.t("home.deleteSuccess"));
            }
            Command::Pin { id } => {
                let record = self.find(&id).await?;
                self.vault
                    .toggle_pin(id, record.is_pinned)
                    .await
                    .map_err(|err| {
                        tracing::error!(%err, "pin toggle failed");
                        eyre!(context.t("home.pinFailed"))
                    })?;
                let key = if record.is_pinned {
                    "home.unpinSuccess"
                } else {
                    "home.pinSuccess"
                };
                println!("{}", context.t(key));
            }
            Command::Reveal { id, yes } => {
                let record = self.find(&id).await?;
                let gate = VisibilityGate::new(Arc::new(TerminalConfirmation::new(!yes)));
                gate.reveal(record.id.clone(), context.locale())
                    .await
                    .map_err(|err| explain(err, None, context))?;
                println!("{}: {}", context.t("home.purpose"), record.purpose);
                println!("{}: {}", context.t("home.account"), record.account);
                println!("{}: {}", context.t("home.password"), record.secret);
            }
            Command::Lang { locale } => {
                let locale = match locale {
                    Some(locale) => {
                        context
                            .set_locale(locale)
                            .await
                            .map_err(|err| explain(err, None, context))?;
                        locale
                    }
                    None => context.locale(),
                };
                println!("{locale}");
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let settings_path = cli.settings.map_or_else(settings::default_path, Ok)?;
    let settings = Arc::new(FileSettingsStore::open(settings_path)?);
    let config = load_config(cli.config)?;

    let app = App::start(config, settings).await;
    app.run(cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_locale_and_flags() {
        let cli = Cli::try_parse_from(["passkeeper", "lang", "ja", "--config", "fb.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("fb.json")));
        assert!(matches!(cli.command, Command::Lang { locale: Some(Locale::Ja) }));

        assert!(Cli::try_parse_from(["passkeeper", "lang", "fr"]).is_err());

        let cli = Cli::try_parse_from(["passkeeper", "reveal", "doc-1", "--yes"]).unwrap();
        assert!(matches!(cli.command, Command::Reveal { yes: true, .. }));
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(dir.path().join("absent.json"))).unwrap_err();
        assert!(err.to_string().contains("reading Firebase config"));
    }

    #[test]
    fn test_load_config_reads_web_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firebase.json");
        std::fs::write(&path, r#"{"apiKey": "k", "projectId": "demo"}"#).unwrap();
        assert_eq!(load_config(Some(path)).unwrap(), FirebaseConfig::new("k", "demo"));
    }
}
