//! TLS certificate extraction
//!
//! This module turns the raw `tls.crt` content of a credential into decoded
//! certificate records.
//!
//! # Module Organization
//!
//! - `metadata` - Credential and certificate records
//! - `split` - Locating PEM blocks inside a chain
//! - `decode` - PEM envelope and X.509 decoding
//!
//! # Example
//!
//! ```rust,ignore
//! use certpulse::tls::{CredentialRef, decode, split};
//!
//! let owner = CredentialRef::new("web", "web-tls");
//! let chain = split(&bytes)?;
//! for block in &chain.blocks {
//!     let cert = decode(block, &owner)?;
//!     println!("{} expires {}", cert.subject_cn, cert.not_after);
//! }
//! ```

pub mod decode;
pub mod metadata;
pub mod split;

// Re-export commonly used types
pub use decode::decode;
pub use metadata::{Certificate, CredentialRef, RawChain};
pub use split::{MAX_CERTIFICATES, PemBlock, Split, split};
