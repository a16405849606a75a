mod run;

use crate::{report::OutputFormat, scan::ScanConfig};
use std::path::PathBuf;

/// Where secrets are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// A live cluster reached through the Kubernetes API
    Cluster {
        kubeconfig: Option<PathBuf>,
        context: Option<String>,
        namespace: Option<String>,
    },
    /// A `kubectl get secrets -o json` dump
    Snapshot(PathBuf),
}

/// Action enum representing each possible command
#[derive(Debug)]
pub enum Action {
    Scan {
        source: SourceConfig,
        scan: ScanConfig,
        output: OutputFormat,
        metrics_file: Option<PathBuf>,
    },
}

impl Action {
    /// Execute the action
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails to execute
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::expiry::ExpiryPolicy;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn test_action_debug() {
        let action = Action::Scan {
            source: SourceConfig::Snapshot(fixture("secrets.json")),
            scan: ScanConfig::default(),
            output: OutputFormat::Text,
            metrics_file: None,
        };

        let debug_str = format!("{action:?}");
        assert!(debug_str.contains("Scan"));
        assert!(debug_str.contains("secrets.json"));
    }

    #[tokio::test]
    async fn test_execute_snapshot_with_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let metrics_file = dir.path().join("certpulse.prom");

        let action = Action::Scan {
            source: SourceConfig::Snapshot(fixture("secrets.json")),
            scan: ScanConfig {
                policy: ExpiryPolicy {
                    threshold_days: 30,
                    include_non_expiring: true,
                },
                ..ScanConfig::default()
            },
            output: OutputFormat::Json,
            metrics_file: Some(metrics_file.clone()),
        };

        action.execute().await.unwrap();

        let metrics = std::fs::read_to_string(&metrics_file).unwrap();
        assert!(metrics.contains("certpulse_certificates_total"));
        assert!(metrics.contains("legacy-tls"));
    }

    #[tokio::test]
    async fn test_execute_missing_snapshot() {
        let action = Action::Scan {
            source: SourceConfig::Snapshot(fixture("does-not-exist.json")),
            scan: ScanConfig::default(),
            output: OutputFormat::Text,
            metrics_file: None,
        };

        let err = action.execute().await.unwrap_err();
        assert!(format!("{err:#}").contains("does-not-exist.json"));
    }

    #[tokio::test]
    async fn test_execute_missing_kubeconfig() {
        let action = Action::Scan {
            source: SourceConfig::Cluster {
                kubeconfig: Some(PathBuf::from("/nonexistent/certpulse/kubeconfig")),
                context: None,
                namespace: None,
            },
            scan: ScanConfig::default(),
            output: OutputFormat::Text,
            metrics_file: None,
        };

        let err = action.execute().await.unwrap_err();
        let err = format!("{err:#}");
        assert!(err.contains("failed to connect to the cluster"));
        assert!(err.contains("failed to read kubeconfig"));
    }
}
