pub mod file;
pub mod memory;

use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;

use crate::domain::models::CredentialStoreBox;
use crate::domain::models::CredentialStoreName;

pub struct CredentialStoreManager {}

impl CredentialStoreManager {
    pub fn get(name: CredentialStoreName) -> Result<CredentialStoreBox> {
        if name == CredentialStoreName::File {
            return Ok(Arc::<file::FileCredentialStore>::default());
        }

        if name == CredentialStoreName::Memory {
            return Ok(Arc::<memory::MemoryCredentialStore>::default());
        }

        bail!(format!("No credential store implemented for {name}"))
    }
}
