use super::{Action, SourceConfig};
use crate::{
    metrics,
    report::WriterSink,
    scan,
    secrets::{ClusterSource, SecretStore, SnapshotSource},
};
use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exit status after a second Ctrl-C, as a shell reports SIGINT
const INTERRUPTED: i32 = 130;

/// Execute the action's business logic by delegating to the appropriate module
pub async fn execute(action: Action) -> anyhow::Result<()> {
    match action {
        Action::Scan {
            source,
            scan,
            output,
            metrics_file,
        } => {
            let store = match source {
                SourceConfig::Cluster {
                    kubeconfig,
                    context,
                    namespace,
                } => SecretStore::Cluster(
                    ClusterSource::connect(kubeconfig.as_deref(), context, namespace)
                        .await
                        .context("failed to connect to the cluster")?,
                ),
                SourceConfig::Snapshot(path) => SecretStore::Snapshot(
                    SnapshotSource::from_path(&path)
                        .await
                        .context("failed to load secrets snapshot")?,
                ),
            };

            let sink = WriterSink::stdout(output);

            // first Ctrl-C cancels the scan and keeps what was reported, a
            // second one exits right away
            let cancel = CancellationToken::new();
            let interrupt = tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupted, press Ctrl-C again to exit now");
                        cancel.cancel();
                    }
                    if tokio::signal::ctrl_c().await.is_ok() {
                        std::process::exit(INTERRUPTED);
                    }
                }
            });

            let result = scan::run(Arc::new(store), &sink, &scan, cancel).await;
            interrupt.abort();
            let summary = result.context("failed to scan TLS secrets")?;

            if let Some(path) = metrics_file {
                metrics::write_textfile(&path).await?;
            }

            if summary.cancelled {
                warn!(
                    processed = summary.processed(),
                    listed = summary.listed,
                    "scan did not complete"
                );
            }

            Ok(())
        }
    }
}
