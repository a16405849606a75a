use crate::{
    cli::actions::{Action, SourceConfig},
    expiry::ExpiryPolicy,
    report::OutputFormat,
    scan::{DEFAULT_WORKERS, ScanConfig},
};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::ArgMatches;
use std::{path::PathBuf, time::Duration};

/// Extract where secrets come from: a snapshot file, or a cluster reached
/// through the Kubernetes API
fn extract_source(matches: &ArgMatches) -> SourceConfig {
    if let Some(path) = matches.get_one::<PathBuf>("from-file") {
        return SourceConfig::Snapshot(path.clone());
    }

    SourceConfig::Cluster {
        kubeconfig: matches.get_one::<PathBuf>("kubeconfig").cloned(),
        context: matches.get_one::<String>("context").cloned(),
        namespace: matches.get_one::<String>("namespace").cloned(),
    }
}

/// Convert `ArgMatches` into typed Action enum with validation
///
/// # Errors
///
/// Returns an error if the reference time or the output format are invalid
pub fn dispatch(matches: &ArgMatches) -> Result<Action> {
    // Extract expiry policy with defaults
    let policy = ExpiryPolicy {
        threshold_days: matches.get_one::<u32>("days").copied().unwrap_or(30),
        include_non_expiring: matches.get_flag("nonexpiring"),
    };

    // Extract worker count with default
    let workers = matches
        .get_one::<u16>("workers")
        .copied()
        .map_or(DEFAULT_WORKERS, usize::from);

    let timeout = matches
        .get_one::<u64>("timeout")
        .copied()
        .map(Duration::from_secs);

    // Extract and validate the reference time
    let now = matches
        .get_one::<String>("at")
        .map(|at| {
            DateTime::parse_from_rfc3339(at)
                .map(|time| time.with_timezone(&Utc))
                .with_context(|| format!("Invalid RFC 3339 time: {at}"))
        })
        .transpose()?;

    let output = matches
        .get_one::<String>("output")
        .map(|output| output.parse::<OutputFormat>())
        .transpose()
        .map_err(|e| anyhow!(e))?
        .unwrap_or_default();

    Ok(Action::Scan {
        source: extract_source(matches),
        scan: ScanConfig {
            policy,
            workers,
            timeout,
            now,
        },
        output,
        metrics_file: matches.get_one::<PathBuf>("metrics-file").cloned(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::cli::commands;
    use chrono::TimeZone;

    fn dispatch_args(args: &[&str]) -> Result<Action> {
        let mut argv = vec!["certpulse"];
        argv.extend_from_slice(args);
        let matches = commands::new().try_get_matches_from(argv).unwrap();
        dispatch(&matches)
    }

    #[test]
    fn test_dispatch_defaults() {
        let action = dispatch_args(&[]).unwrap();
        match action {
            Action::Scan {
                source,
                scan,
                output,
                metrics_file,
            } => {
                assert_eq!(
                    source,
                    SourceConfig::Cluster {
                        kubeconfig: None,
                        context: None,
                        namespace: None,
                    }
                );
                assert_eq!(scan.policy, ExpiryPolicy::default());
                assert_eq!(scan.workers, DEFAULT_WORKERS);
                assert!(scan.timeout.is_none());
                assert!(scan.now.is_none());
                assert_eq!(output, OutputFormat::Text);
                assert!(metrics_file.is_none());
            }
        }
    }

    #[test]
    fn test_dispatch_policy() {
        let action = dispatch_args(&["--days", "14", "--nonexpiring"]).unwrap();
        match action {
            Action::Scan { scan, .. } => {
                assert_eq!(scan.policy.threshold_days, 14);
                assert!(scan.policy.include_non_expiring);
            }
        }
    }

    #[test]
    fn test_dispatch_cluster_source() {
        let action = dispatch_args(&[
            "--kubeconfig",
            "/etc/kube/admin.conf",
            "--context",
            "staging",
            "--namespace",
            "ingress",
        ])
        .unwrap();
        match action {
            Action::Scan { source, .. } => {
                assert_eq!(
                    source,
                    SourceConfig::Cluster {
                        kubeconfig: Some(PathBuf::from("/etc/kube/admin.conf")),
                        context: Some("staging".to_string()),
                        namespace: Some("ingress".to_string()),
                    }
                );
            }
        }
    }

    #[test]
    fn test_dispatch_snapshot_source() {
        let action = dispatch_args(&["--from-file", "/tmp/secrets.json"]).unwrap();
        match action {
            Action::Scan { source, .. } => {
                assert_eq!(
                    source,
                    SourceConfig::Snapshot(PathBuf::from("/tmp/secrets.json"))
                );
            }
        }
    }

    #[test]
    fn test_dispatch_runtime_options() {
        let action = dispatch_args(&[
            "--workers",
            "2",
            "--timeout",
            "60",
            "--output",
            "json",
            "--metrics-file",
            "/var/lib/node_exporter/certpulse.prom",
        ])
        .unwrap();
        match action {
            Action::Scan {
                scan,
                output,
                metrics_file,
                ..
            } => {
                assert_eq!(scan.workers, 2);
                assert_eq!(scan.timeout, Some(Duration::from_secs(60)));
                assert_eq!(output, OutputFormat::Json);
                assert_eq!(
                    metrics_file,
                    Some(PathBuf::from("/var/lib/node_exporter/certpulse.prom"))
                );
            }
        }
    }

    #[test]
    fn test_dispatch_reference_time() {
        let action = dispatch_args(&["--at", "2026-05-01T10:00:00+02:00"]).unwrap();
        match action {
            Action::Scan { scan, .. } => {
                assert_eq!(
                    scan.now,
                    Some(Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap())
                );
            }
        }
    }

    #[test]
    fn test_dispatch_invalid_reference_time() {
        let err = dispatch_args(&["--at", "next tuesday"]).unwrap_err();
        assert!(err.to_string().contains("Invalid RFC 3339 time"));
    }
}
