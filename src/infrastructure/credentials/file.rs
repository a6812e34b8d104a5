#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::CredentialStore;
use crate::domain::models::CredentialStoreName;
use crate::domain::models::TOKEN_KEY;

/// Owner read and write only, the file holds a bearer token.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Persists the token as `{"token": "..."}` in a single JSON file so it
/// survives restarts.
pub struct FileCredentialStore {
    pub file_path: PathBuf,
}

impl Default for FileCredentialStore {
    fn default() -> FileCredentialStore {
        return FileCredentialStore::new(PathBuf::from(Config::get(ConfigKey::CredentialsFile)));
    }
}

impl FileCredentialStore {
    pub fn new(file_path: PathBuf) -> FileCredentialStore {
        return FileCredentialStore { file_path };
    }

    async fn read(&self) -> Result<Option<String>> {
        let contents = match fs::read_to_string(&self.file_path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let json_data: Value = serde_json::from_str(&contents)?;
        let token = json_data
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .filter(|token| return !token.is_empty())
            .map(|token| return token.to_string());

        return Ok(token);
    }

    async fn write(&self, payload: &str) -> Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);

        let mut file = options.open(&self.file_path).await?;
        file.write_all(payload.as_bytes()).await?;
        file.flush().await?;

        // The mode above only applies to newly created files.
        #[cfg(unix)]
        fs::set_permissions(&self.file_path, std::fs::Permissions::from_mode(FILE_MODE)).await?;

        return Ok(());
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    fn name(&self) -> CredentialStoreName {
        return CredentialStoreName::File;
    }

    #[allow(clippy::implicit_return)]
    async fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut json_data = Map::new();
        json_data.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.write(&serde_json::to_string(&json_data)?).await?;

        tracing::debug!(path = ?self.file_path, "Saved credentials");
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn load(&self) -> Option<String> {
        return match self.read().await {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(path = ?self.file_path, error = ?err, "Ignoring unreadable credentials file");
                None
            }
        };
    }

    #[allow(clippy::implicit_return)]
    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.file_path).await {
            Ok(()) => {
                tracing::debug!(path = ?self.file_path, "Cleared credentials");
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        return Ok(());
    }
}
