use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use eyre::{eyre, Result, WrapErr};
use passkeeper_core::{PassKeeperError, PassKeeperResult, SettingsStore};

/// Settings key holding the Firebase refresh token of the last session.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// `<config dir>/passkeeper/settings.json`.
pub fn default_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("passkeeper").join("settings.json"))
        .ok_or_else(|| eyre!("no config directory on this platform"))
}

/// Settings persisted as a flat JSON object.
///
/// Every write rewrites the whole file through a temporary sibling so a crash
/// never leaves half a file behind.
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettingsStore {
    /// Opens `path`, starting empty if it does not exist yet.
    pub fn open(path: PathBuf) -> Result<Self> {
        let values = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .wrap_err_with(|| format!("malformed settings file {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("reading {}", path.display()));
            }
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        fs::rename(tmp, &self.path)
    }
}

fn settings_error(err: impl std::fmt::Display) -> PassKeeperError {
    PassKeeperError::Settings {
        error: err.to_string(),
    }
}

#[async_trait::async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get(&self, key: String) -> PassKeeperResult<Option<String>> {
        let values = self.values.lock().map_err(settings_error)?;
        Ok(values.get(&key).filter(|value| !value.is_empty()).cloned())
    }

    async fn set(&self, key: String, value: String) -> PassKeeperResult<()> {
        let mut values = self.values.lock().map_err(settings_error)?;
        if value.is_empty() {
            values.remove(&key);
        } else {
            values.insert(key, value);
        }
        self.persist(&values).map_err(settings_error)
    }
}
