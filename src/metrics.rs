use crate::{error::ScanError, expiry::Finding};
use anyhow::{Context, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, IntGaugeVec, Registry, opts,
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_vec_with_registry, register_int_gauge_with_registry,
};
use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tokio::fs;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

trait ResultExt<T> {
    fn or_exit(self, context: &str) -> T;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn or_exit(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                eprintln!("failed to initialize metric ({context}): {err}");
                std::process::exit(1);
            }
        }
    }
}

pub static SECRETS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!(
            "certpulse_secrets_total",
            "TLS secrets processed by outcome (scanned, skipped, failed)"
        ),
        &["outcome"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static CERTIFICATES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!(
            "certpulse_certificates_total",
            "Certificates classified, by classification"
        ),
        &["classification"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static SCAN_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!("certpulse_errors_total", "Scan errors by kind"),
        &["kind"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static CERT_EXPIRY_TIMESTAMP: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec_with_registry!(
        opts!(
            "certpulse_certificate_expiry_timestamp_seconds",
            "Certificate notAfter as a unix timestamp"
        ),
        &["namespace", "secret", "subject", "issuer"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static SCAN_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram_with_registry!(
        HistogramOpts::new("certpulse_scan_duration_seconds", "scan duration in seconds"),
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static LAST_SCAN: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "certpulse_last_scan_timestamp_seconds",
        "unix timestamp of the last completed scan",
        &REGISTRY
    )
    .or_exit("metric can be created")
});

/// Record one classified certificate
pub fn observe_finding(finding: &Finding) {
    let cert = &finding.certificate;
    CERTIFICATES_TOTAL
        .with_label_values(&[finding.classification.as_str()])
        .inc();
    CERT_EXPIRY_TIMESTAMP
        .with_label_values(&[
            cert.owner.namespace.as_str(),
            cert.owner.name.as_str(),
            cert.subject_cn.as_str(),
            cert.issuer_cn.as_str(),
        ])
        .set(cert.not_after.timestamp());
}

pub fn observe_error(error: &ScanError) {
    SCAN_ERRORS.with_label_values(&[error.kind()]).inc();
}

pub fn observe_secret(outcome: &str) {
    SECRETS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Encode all metrics in the Prometheus text format
///
/// # Errors
///
/// Returns an error if the metrics cannot be encoded
pub fn encode_metrics() -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    let encoder = prometheus::TextEncoder::new();

    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| format!("could not encode custom metrics: {e}"))?;

    Ok(buffer)
}

/// Write all metrics to `path` for the node exporter textfile collector.
///
/// The file is written next to its destination and renamed into place so a
/// scraper never reads a partial file.
///
/// # Errors
///
/// Returns an error if the metrics cannot be encoded or the file cannot be written
pub async fn write_textfile(path: &Path) -> Result<()> {
    let buffer = encode_metrics().map_err(anyhow::Error::msg)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &buffer)
        .await
        .with_context(|| format!("failed to write metrics to {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to move metrics into {}", path.display()))?;

    Ok(())
}
