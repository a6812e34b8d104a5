use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

/// Fixed key the bearer token is persisted under.
pub const TOKEN_KEY: &str = "token";

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CredentialStoreName {
    File,
    Memory,
}

impl CredentialStoreName {
    pub fn parse(text: String) -> Option<CredentialStoreName> {
        return CredentialStoreName::iter().find(|e| return e.to_string() == text);
    }
}

/// Holds one opaque bearer token. Expiry is the backend's business, the store
/// never inspects the token.
#[async_trait]
pub trait CredentialStore {
    fn name(&self) -> CredentialStoreName;

    async fn save(&self, token: &str) -> Result<()>;

    /// Unreadable storage loads as no token.
    async fn load(&self) -> Option<String>;

    /// Clearing an empty store succeeds.
    async fn clear(&self) -> Result<()>;
}

pub type CredentialStoreBox = Arc<dyn CredentialStore + Send + Sync>;
