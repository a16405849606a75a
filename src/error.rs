use crate::tls::CredentialRef;
use thiserror::Error;

/// Errors raised while retrieving and scanning credentials.
///
/// `Retrieval` is fatal when it happens while listing credentials and local
/// when it happens while fetching a single one. Every other variant is local
/// to a chain or a block: it is logged with the owner and the scan continues.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{context}: {message}")]
    Retrieval { context: String, message: String },

    #[error("{owner}: certificate {index} has an end marker before its begin marker")]
    Extraction { owner: CredentialRef, index: usize },

    #[error("{owner}: certificate {index} is not a valid PEM block: {reason}")]
    PemDecode {
        owner: CredentialRef,
        index: usize,
        reason: String,
    },

    #[error("{owner}: certificate {index} could not be parsed: {reason}")]
    CertParse {
        owner: CredentialRef,
        index: usize,
        reason: String,
    },
}

impl ScanError {
    #[must_use]
    pub fn retrieval(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Retrieval {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Short label used for metrics and structured logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Retrieval { .. } => "retrieval",
            Self::Extraction { .. } => "extraction",
            Self::PemDecode { .. } => "pem_decode",
            Self::CertParse { .. } => "cert_parse",
        }
    }

    /// Owner of the chain the error belongs to, if any
    #[must_use]
    pub const fn owner(&self) -> Option<&CredentialRef> {
        match self {
            Self::Retrieval { .. } => None,
            Self::Extraction { owner, .. }
            | Self::PemDecode { owner, .. }
            | Self::CertParse { owner, .. } => Some(owner),
        }
    }
}
