use super::{SecretSource, TLS_SECRET_TYPES, certificate_chain, credential};
use crate::{
    error::ScanError,
    tls::{CredentialRef, RawChain},
};
use k8s_openapi::api::core::v1::Secret;
use kube::{
    Api, Client, Config,
    api::ListParams,
    config::{KubeConfigOptions, Kubeconfig},
};
use std::{fmt, path::Path};
use tracing::debug;

/// Reads secrets from a live cluster through the Kubernetes API
#[derive(Clone)]
pub struct ClusterSource {
    client: Client,
    namespace: Option<String>,
}

impl fmt::Debug for ClusterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSource")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ClusterSource {
    /// Restrict listing to `namespace`, all namespaces when `None`
    #[must_use]
    pub const fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    /// Connect with the given kubeconfig file and context.
    ///
    /// Without a file the usual lookup applies: `KUBECONFIG`, then
    /// `~/.kube/config`, then the in-cluster service account.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Retrieval`] if the configuration cannot be loaded
    /// or the client cannot be built
    pub async fn connect(
        kubeconfig: Option<&Path>,
        context: Option<String>,
        namespace: Option<String>,
    ) -> Result<Self, ScanError> {
        let options = KubeConfigOptions {
            context,
            ..KubeConfigOptions::default()
        };

        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    ScanError::retrieval(format!("failed to read kubeconfig {}", path.display()), e)
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| ScanError::retrieval("failed to load kubeconfig", e))?
            }
            None if options.context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| ScanError::retrieval("failed to load kubeconfig", e))?,
            None => Config::infer()
                .await
                .map_err(|e| ScanError::retrieval("failed to find a cluster configuration", e))?,
        };

        debug!(cluster = %config.cluster_url, "connecting to cluster");

        let client = Client::try_from(config)
            .map_err(|e| ScanError::retrieval("failed to create Kubernetes client", e))?;

        Ok(Self::new(client, namespace))
    }

    fn scoped_api(&self) -> Api<Secret> {
        match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }
}

impl SecretSource for ClusterSource {
    async fn list(&self) -> Result<Vec<CredentialRef>, ScanError> {
        let api = self.scoped_api();

        let mut credentials = Vec::new();
        for secret_type in TLS_SECRET_TYPES {
            let params = ListParams::default().fields(&format!("type={secret_type}"));
            let secrets = api
                .list(&params)
                .await
                .map_err(|e| ScanError::retrieval("failed to list secrets", e))?;

            debug!(secret_type, count = secrets.items.len(), "listed secrets");
            credentials.extend(secrets.items.iter().map(credential));
        }

        Ok(credentials)
    }

    async fn fetch(&self, credential: &CredentialRef) -> Result<RawChain, ScanError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &credential.namespace);
        let secret = api.get(&credential.name).await.map_err(|e| {
            ScanError::retrieval(format!("failed to get secret {credential}"), e)
        })?;

        Ok(certificate_chain(&secret))
    }
}
