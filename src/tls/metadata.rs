use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Identifies the secret a certificate came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CredentialRef {
    pub namespace: String,
    pub name: String,
}

impl CredentialRef {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Undecoded `tls.crt` content of one secret
#[derive(Debug, Clone)]
pub struct RawChain {
    pub owner: CredentialRef,
    pub bytes: Vec<u8>,
}

impl RawChain {
    #[must_use]
    pub const fn new(owner: CredentialRef, bytes: Vec<u8>) -> Self {
        Self { owner, bytes }
    }

    /// True when the certificate field is absent or only whitespace
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.iter().all(u8::is_ascii_whitespace)
    }
}

/// Certificate metadata decoded from one PEM block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    /// Issuer common name, empty if the issuer has none
    pub issuer_cn: String,
    /// Subject common name, empty if the subject has none
    pub subject_cn: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub owner: CredentialRef,
}
