//! File-backed key store
//!
//! One JSON record per identity under a directory, named after the address.
//! Keys are generated locally with ethers' `LocalWallet`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapters::errors::KeyStoreError;
use crate::adapters::traits::KeyStore;
use crate::adapters::types::{Credential, Wallet};

#[derive(Debug, Serialize, Deserialize)]
struct KeyRecord {
    address: Address,
    private_key: String,
    created_at: DateTime<Utc>,
}

/// Stores identities as `<dir>/<address>.json`
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, address: Address) -> PathBuf {
        self.dir.join(format!("{:?}.json", address))
    }

    async fn read_record(path: &Path) -> Result<KeyRecord, KeyStoreError> {
        let data = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&data)
            .map_err(|e| KeyStoreError::Malformed(format!("{}: {}", path.display(), e)))
    }

    async fn read_all(&self) -> Result<Vec<KeyRecord>, KeyStoreError> {
        if !tokio::fs::try_exists(&self.dir).await? {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "[WALLET] Skipping unreadable key file"),
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn list_identities(&self) -> Result<Vec<Wallet>, KeyStoreError> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .map(|r| Wallet::new(r.address))
            .collect())
    }

    async fn create_identity(&self) -> Result<Wallet, KeyStoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let signer = LocalWallet::new(&mut rand::thread_rng());
        let address = signer.address();
        let path = self.record_path(address);
        if tokio::fs::try_exists(&path).await? {
            return Err(KeyStoreError::Malformed(format!(
                "identity {:?} already exists",
                address
            )));
        }

        let record = KeyRecord {
            address,
            private_key: hex::encode(signer.signer().to_bytes()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| KeyStoreError::Malformed(e.to_string()))?;
        tokio::fs::write(&path, json).await?;

        info!(address = ?address, "[WALLET] Created identity");
        Ok(Wallet::new(address))
    }

    async fn credential(&self, address: Address) -> Result<Credential, KeyStoreError> {
        let path = self.record_path(address);
        if !tokio::fs::try_exists(&path).await? {
            return Err(KeyStoreError::NotFound(format!("{:?}", address)));
        }
        let record = Self::read_record(&path).await?;
        Ok(Credential::new(record.private_key))
    }
}
