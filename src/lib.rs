//! Find TLS certificates stored in Kubernetes secrets that are about to expire.
//!
//! The pipeline is: [`secrets`] (retrieval) -> [`tls::split`] -> [`tls::decode`]
//! -> [`expiry::classify`] -> [`report`], driven by [`scan::run`].

pub mod cli;
pub mod error;
pub mod expiry;
pub mod metrics;
pub mod report;
pub mod scan;
pub mod secrets;
pub mod tls;
