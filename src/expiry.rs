//! Expiry classification of decoded certificates.

use crate::tls::Certificate;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Serialize;

/// How far ahead to look and what to report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Certificates expiring within this many days are reported
    pub threshold_days: u32,
    /// Also report certificates that are not expiring soon
    pub include_non_expiring: bool,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            threshold_days: 30,
            include_non_expiring: false,
        }
    }
}

impl ExpiryPolicy {
    /// The point in time a certificate must outlive to be considered healthy
    #[must_use]
    pub fn threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::try_days(i64::from(self.threshold_days))
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    ExpiringSoon,
    Healthy,
    Suppressed,
}

impl Classification {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ExpiringSoon => "expiring_soon",
            Self::Healthy => "healthy",
            Self::Suppressed => "suppressed",
        }
    }
}

/// A classified certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub certificate: Certificate,
    pub classification: Classification,
    /// Rendered report line, `None` for suppressed findings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Classify `cert` against `policy` as of `now`.
///
/// A certificate whose `notAfter` falls before `now + threshold_days` is
/// expiring soon, already expired certificates included.
#[must_use]
pub fn classify(cert: Certificate, policy: &ExpiryPolicy, now: DateTime<Utc>) -> Finding {
    let expires = cert.not_after.to_rfc3339_opts(SecondsFormat::Secs, true);

    let (classification, message) = if cert.not_after < policy.threshold(now) {
        let when = if cert.not_after <= now {
            format!("has expired on {expires}")
        } else {
            format!("expires within {} days on {expires}", policy.threshold_days)
        };
        (
            Classification::ExpiringSoon,
            Some(format!(
                "!!WARN: certificate {} in secret {} of namespace {} {when}",
                cert.subject_cn, cert.owner.name, cert.owner.namespace
            )),
        )
    } else if policy.include_non_expiring {
        (
            Classification::Healthy,
            Some(format!(
                "secret {} of namespace {}: issuer {} subject {} expires on {expires}",
                cert.owner.name, cert.owner.namespace, cert.issuer_cn, cert.subject_cn
            )),
        )
    } else {
        (Classification::Suppressed, None)
    };

    Finding {
        certificate: cert,
        classification,
        message,
    }
}
