use std::sync::Mutex;
use std::sync::PoisonError;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::CredentialStore;
use crate::domain::models::CredentialStoreName;

/// Keeps the token for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    #[cfg(test)]
    pub fn with_token(token: &str) -> MemoryCredentialStore {
        return MemoryCredentialStore {
            token: Mutex::new(Some(token.to_string())),
        };
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn name(&self) -> CredentialStoreName {
        return CredentialStoreName::Memory;
    }

    #[allow(clippy::implicit_return)]
    async fn save(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn load(&self) -> Option<String> {
        return self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
    }

    #[allow(clippy::implicit_return)]
    async fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        return Ok(());
    }
}
