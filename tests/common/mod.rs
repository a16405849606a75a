#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use certpulse::{
    expiry::{Classification, ExpiryPolicy, Finding},
    report::ReportSink,
    scan::ScanConfig,
    tls::{CredentialRef, RawChain},
};
use chrono::{DateTime, TimeZone, Utc};
use std::{io, path::PathBuf, sync::Mutex};

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn fixture_bytes(name: &str) -> Vec<u8> {
    std::fs::read(fixture(name)).unwrap()
}

pub fn chain(namespace: &str, name: &str, fixture_name: &str) -> RawChain {
    RawChain::new(
        CredentialRef::new(namespace, name),
        fixture_bytes(fixture_name),
    )
}

/// Eleven days before the test leaf certificate expires
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 21, 0, 0, 0).unwrap()
}

/// Report every certificate, flag the ones expiring within 30 days
pub fn verbose_config(workers: usize) -> ScanConfig {
    ScanConfig {
        policy: ExpiryPolicy {
            threshold_days: 30,
            include_non_expiring: true,
        },
        workers,
        timeout: None,
        now: Some(reference_time()),
    }
}

/// Keeps every reported finding in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    findings: Mutex<Vec<Finding>>,
}

impl CollectingSink {
    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.findings.lock().unwrap().len()
    }

    /// `(namespace/name, subject, classification)` sorted, to compare runs
    pub fn keys(&self) -> Vec<(String, String, Classification)> {
        let mut keys: Vec<_> = self
            .findings()
            .into_iter()
            .map(|f| {
                (
                    f.certificate.owner.to_string(),
                    f.certificate.subject_cn,
                    f.classification,
                )
            })
            .collect();
        keys.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        keys
    }
}

impl ReportSink for CollectingSink {
    fn report(&self, finding: &Finding) -> io::Result<()> {
        self.findings.lock().unwrap().push(finding.clone());
        Ok(())
    }
}
