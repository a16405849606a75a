use super::{SecretSource, certificate_chain, credential, is_tls};
use crate::{
    error::ScanError,
    tls::{CredentialRef, RawChain},
};
use k8s_openapi::api::core::v1::Secret;
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path};
use tokio::fs;
use tracing::debug;

/// `kubectl get secrets -A -o json` prints a generic `v1/List`, which
/// `k8s_openapi::List` rejects since it expects `SecretList`
#[derive(Deserialize)]
struct SecretDump {
    #[serde(default)]
    items: Vec<Secret>,
}

/// Secrets captured ahead of time, either from a `kubectl get secrets -o json`
/// dump or from chains built in memory.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    entries: BTreeMap<CredentialRef, Vec<u8>>,
}

impl SnapshotSource {
    #[must_use]
    pub fn from_chains(chains: impl IntoIterator<Item = RawChain>) -> Self {
        Self {
            entries: chains
                .into_iter()
                .map(|chain| (chain.owner, chain.bytes))
                .collect(),
        }
    }

    /// Build a snapshot from a JSON list of secrets, keeping TLS secrets only
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Retrieval`] if the document is not a list of
    /// secrets, including secrets whose data is not base64
    pub fn from_json(json: &[u8]) -> Result<Self, ScanError> {
        let dump: SecretDump = serde_json::from_slice(json)
            .map_err(|e| ScanError::retrieval("failed to parse secrets snapshot", e))?;

        let entries = dump
            .items
            .iter()
            .filter(|secret| {
                let tls = is_tls(secret);
                if !tls {
                    debug!(secret = %credential(secret), "skipping non TLS secret");
                }
                tls
            })
            .map(|secret| {
                let chain = certificate_chain(secret);
                (chain.owner, chain.bytes)
            })
            .collect();

        Ok(Self { entries })
    }

    /// Read a snapshot file
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Retrieval`] if the file cannot be read or parsed
    pub async fn from_path(path: &Path) -> Result<Self, ScanError> {
        let json = fs::read(path).await.map_err(|e| {
            ScanError::retrieval(format!("failed to read {}", path.display()), e)
        })?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SecretSource for SnapshotSource {
    async fn list(&self) -> Result<Vec<CredentialRef>, ScanError> {
        Ok(self.entries.keys().cloned().collect())
    }

    async fn fetch(&self, credential: &CredentialRef) -> Result<RawChain, ScanError> {
        self.entries
            .get(credential)
            .map(|bytes| RawChain::new(credential.clone(), bytes.clone()))
            .ok_or_else(|| {
                ScanError::retrieval(
                    format!("failed to get secret {credential}"),
                    "not found in snapshot",
                )
            })
    }
}
