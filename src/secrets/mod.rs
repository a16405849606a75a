//! Retrieval of TLS secrets
//!
//! - `cluster` - Live cluster access through the Kubernetes API
//! - `snapshot` - Secrets read from a `kubectl get secrets -o json` dump

pub mod cluster;
pub mod snapshot;

pub use cluster::ClusterSource;
pub use snapshot::SnapshotSource;

use crate::{
    error::ScanError,
    tls::{CredentialRef, RawChain},
};
use k8s_openapi::api::core::v1::Secret;
use std::future::Future;

/// Secret types holding a TLS key pair
pub const TLS_SECRET_TYPES: [&str; 2] = ["kubernetes.io/tls", "SecretTypeTLS"];

/// Data key holding the PEM certificate chain
pub const CERTIFICATE_KEY: &str = "tls.crt";

/// Where credentials come from.
///
/// `list` is called once per run and its failure aborts the run. `fetch` is
/// called once per listed credential, concurrently, and its failure only
/// affects that credential.
pub trait SecretSource: Send + Sync {
    /// Enumerate the TLS secrets that can be scanned
    fn list(&self) -> impl Future<Output = Result<Vec<CredentialRef>, ScanError>> + Send;

    /// Fetch the raw certificate chain of one secret
    fn fetch(
        &self,
        credential: &CredentialRef,
    ) -> impl Future<Output = Result<RawChain, ScanError>> + Send;
}

/// The secret source selected on the command line
#[derive(Debug)]
pub enum SecretStore {
    Cluster(ClusterSource),
    Snapshot(SnapshotSource),
}

impl SecretSource for SecretStore {
    async fn list(&self) -> Result<Vec<CredentialRef>, ScanError> {
        match self {
            Self::Cluster(source) => source.list().await,
            Self::Snapshot(source) => source.list().await,
        }
    }

    async fn fetch(&self, credential: &CredentialRef) -> Result<RawChain, ScanError> {
        match self {
            Self::Cluster(source) => source.fetch(credential).await,
            Self::Snapshot(source) => source.fetch(credential).await,
        }
    }
}

/// True for the secret types that carry a TLS certificate chain
#[must_use]
pub fn is_tls_type(secret_type: &str) -> bool {
    TLS_SECRET_TYPES.contains(&secret_type)
}

#[must_use]
pub fn is_tls(secret: &Secret) -> bool {
    secret.type_.as_deref().is_some_and(is_tls_type)
}

#[must_use]
pub fn credential(secret: &Secret) -> CredentialRef {
    CredentialRef::new(
        secret.metadata.namespace.as_deref().unwrap_or_default(),
        secret.metadata.name.as_deref().unwrap_or_default(),
    )
}

/// `tls.crt` content of `secret`, empty when the key is absent
#[must_use]
pub fn certificate_chain(secret: &Secret) -> RawChain {
    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(CERTIFICATE_KEY))
        .map(|value| value.0.clone())
        .unwrap_or_default();

    RawChain::new(credential(secret), bytes)
}
