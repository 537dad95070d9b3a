//! SSH key source
//!
//! The keypair registered with the provider comes from a [`SshKeySource`].
//! [`SshKeygen`] shells out to `ssh-keygen` the way the machine hosts expect:
//! an unencrypted RSA key next to the machine record.

use crate::error::{DriverError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[async_trait]
pub trait SshKeySource: Send + Sync {
    /// OpenSSH public key to register, generating the pair if needed
    async fn public_key(&self) -> Result<Vec<u8>>;
}

/// Key pair on disk, generated with `ssh-keygen` when missing
#[derive(Debug, Clone)]
pub struct SshKeygen {
    private_key: PathBuf,
}

impl SshKeygen {
    pub fn new(private_key: impl AsRef<Path>) -> Self {
        Self {
            private_key: private_key.as_ref().to_path_buf(),
        }
    }

    pub fn private_key_path(&self) -> &Path {
        &self.private_key
    }

    pub fn public_key_path(&self) -> PathBuf {
        let mut path = self.private_key.clone().into_os_string();
        path.push(".pub");
        PathBuf::from(path)
    }

    async fn generate(&self) -> Result<()> {
        if let Some(dir) = self.private_key.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| DriverError::SshKey(format!("{}: {}", dir.display(), e)))?;
        }

        tracing::debug!("Generating SSH key {}", self.private_key.display());
        let output = Command::new("ssh-keygen")
            .args(["-t", "rsa", "-b", "4096", "-N", "", "-q", "-f"])
            .arg(&self.private_key)
            .output()
            .await
            .map_err(|e| DriverError::SshKey(format!("failed to run ssh-keygen: {}", e)))?;

        if !output.status.success() {
            return Err(DriverError::SshKey(format!(
                "ssh-keygen failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SshKeySource for SshKeygen {
    async fn public_key(&self) -> Result<Vec<u8>> {
        if !self.private_key.exists() {
            self.generate().await?;
        }

        let path = self.public_key_path();
        tokio::fs::read(&path)
            .await
            .map_err(|e| DriverError::SshKey(format!("{}: {}", path.display(), e)))
    }
}
