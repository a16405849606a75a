use crate::{
    error::ScanError,
    expiry::{Classification, ExpiryPolicy, Finding, classify},
    metrics,
    report::ReportSink,
    secrets::{CERTIFICATE_KEY, SecretSource},
    tls::{self, CredentialRef, MAX_CERTIFICATES, RawChain},
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, mpsc},
    task::{JoinHandle, JoinSet},
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default number of secrets fetched concurrently
pub const DEFAULT_WORKERS: usize = 8;

/// Settings for one scan
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub policy: ExpiryPolicy,
    /// Upper bound of concurrent fetches, at least one worker is always used
    pub workers: usize,
    /// Cancel the scan once this much time has passed
    pub timeout: Option<Duration>,
    /// Reference time for classification, `Utc::now()` when unset
    pub now: Option<DateTime<Utc>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            policy: ExpiryPolicy::default(),
            workers: DEFAULT_WORKERS,
            timeout: None,
            now: None,
        }
    }
}

/// Findings and local errors of one certificate chain, in block order
#[derive(Debug, Default)]
pub struct ChainReport {
    pub findings: Vec<Finding>,
    pub errors: Vec<ScanError>,
}

/// Counters for a whole scan
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// TLS secrets returned by the source
    pub listed: usize,
    /// Secrets whose chain was scanned
    pub scanned: usize,
    /// Secrets without certificate data
    pub skipped: usize,
    /// Secrets that could not be fetched
    pub failed: usize,
    pub expiring_soon: usize,
    pub healthy: usize,
    pub suppressed: usize,
    /// Certificates or chains that could not be decoded
    pub errors: usize,
    /// The scan was cancelled before every listed secret was processed
    pub cancelled: bool,
}

impl ScanSummary {
    #[must_use]
    pub const fn certificates(&self) -> usize {
        self.expiring_soon + self.healthy + self.suppressed
    }

    #[must_use]
    pub const fn processed(&self) -> usize {
        self.scanned + self.skipped + self.failed
    }

    const fn record(&mut self, finding: &Finding) {
        match finding.classification {
            Classification::ExpiringSoon => self.expiring_soon += 1,
            Classification::Healthy => self.healthy += 1,
            Classification::Suppressed => self.suppressed += 1,
        }
    }
}

/// Split, decode and classify one chain.
///
/// Failures are collected per block so that one bad certificate never hides
/// its siblings.
#[must_use]
pub fn scan_chain(raw: &RawChain, policy: &ExpiryPolicy, now: DateTime<Utc>) -> ChainReport {
    let owner = &raw.owner;

    let split = match tls::split(&raw.bytes) {
        Ok(split) => split,
        Err(e) => {
            return ChainReport {
                findings: Vec::new(),
                errors: vec![ScanError::Extraction {
                    owner: owner.clone(),
                    index: e.index,
                }],
            };
        }
    };

    if !split.is_balanced() {
        warn!(
            secret = %owner,
            begin = split.begin_markers,
            end = split.end_markers,
            "unbalanced certificate markers, only the matched pairs are scanned"
        );
    }
    if split.truncated {
        warn!(
            secret = %owner,
            limit = MAX_CERTIFICATES,
            "chain holds more certificates than the limit, ignoring the rest"
        );
    }
    if split.blocks.is_empty() {
        debug!(secret = %owner, "no certificate found in {CERTIFICATE_KEY}");
    }

    let mut report = ChainReport::default();
    for block in &split.blocks {
        match tls::decode(block, owner) {
            Ok(cert) => report.findings.push(classify(cert, policy, now)),
            Err(e) => report.errors.push(e),
        }
    }

    report
}

enum Outcome {
    Scanned(ChainReport),
    Skipped,
    Failed(ScanError),
    Panicked(String),
    Cancelled,
}

struct CredentialOutcome {
    credential: CredentialRef,
    outcome: Outcome,
}

/// Scan every TLS secret of `source` and report findings to `sink`.
///
/// Secrets are fetched by a pool of `config.workers` tasks pulling from a
/// shared queue. Findings of one chain are reported together and in block
/// order; there is no ordering across secrets. Only findings carrying a
/// message reach the sink.
///
/// Cancelling `cancel`, or reaching `config.timeout`, stops dequeuing secrets
/// and aborts fetches in flight. Everything reported before that is kept and
/// the returned summary is marked as cancelled. The deadline also covers the
/// listing: a scan cancelled before the secrets are listed returns an empty
/// summary marked as cancelled, and an already cancelled token never reaches
/// the source.
///
/// # Errors
///
/// Returns [`ScanError::Retrieval`] if the secrets cannot be listed. Errors
/// for individual secrets or certificates are logged and counted instead.
pub async fn run<S, R>(
    source: Arc<S>,
    sink: &R,
    config: &ScanConfig,
    cancel: CancellationToken,
) -> Result<ScanSummary, ScanError>
where
    S: SecretSource + 'static,
    R: ReportSink + ?Sized,
{
    let token = cancel.child_token();
    let deadline = config
        .timeout
        .map(|timeout| spawn_deadline(timeout, token.clone()));

    let result = scan_secrets(source, sink, config, token).await;

    if let Some(deadline) = deadline {
        deadline.abort();
    }

    result
}

async fn scan_secrets<S, R>(
    source: Arc<S>,
    sink: &R,
    config: &ScanConfig,
    token: CancellationToken,
) -> Result<ScanSummary, ScanError>
where
    S: SecretSource + 'static,
    R: ReportSink + ?Sized,
{
    let timer = metrics::SCAN_DURATION.start_timer();
    let now = config.now.unwrap_or_else(Utc::now);

    let listed = tokio::select! {
        biased;
        () = token.cancelled() => None,
        listed = source.list() => Some(listed),
    };
    let Some(listed) = listed else {
        timer.stop_and_discard();
        warn!("scan cancelled before the secrets were listed");
        return Ok(ScanSummary {
            cancelled: true,
            ..ScanSummary::default()
        });
    };
    let credentials = listed?;
    let workers = config.workers.clamp(1, credentials.len().max(1));

    let mut summary = ScanSummary {
        listed: credentials.len(),
        ..ScanSummary::default()
    };

    info!(
        secrets = credentials.len(),
        workers,
        days = config.policy.threshold_days,
        "scanning TLS secrets"
    );

    let (task_tx, task_rx) = mpsc::channel::<CredentialRef>(workers);
    let task_rx = Arc::new(Mutex::new(task_rx));
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<CredentialOutcome>();

    let mut pool = JoinSet::new();
    for _ in 0..workers {
        pool.spawn(worker(
            Arc::clone(&source),
            Arc::clone(&task_rx),
            result_tx.clone(),
            config.policy,
            now,
            token.clone(),
        ));
    }
    // workers own the remaining handles, the loops below end once they exit
    drop(task_rx);
    drop(result_tx);

    let feeder = tokio::spawn(feed(credentials, task_tx, token.clone()));

    while let Some(CredentialOutcome {
        credential,
        outcome,
    }) = result_rx.recv().await
    {
        handle_outcome(&credential, outcome, sink, &mut summary);
    }

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            error!("scan worker stopped: {e}");
        }
    }
    if let Err(e) = feeder.await {
        error!("scan feeder stopped: {e}");
    }

    summary.cancelled = summary.processed() < summary.listed;

    timer.observe_duration();
    metrics::LAST_SCAN.set(Utc::now().timestamp());

    info!(
        listed = summary.listed,
        scanned = summary.scanned,
        skipped = summary.skipped,
        failed = summary.failed,
        certificates = summary.certificates(),
        expiring_soon = summary.expiring_soon,
        errors = summary.errors,
        cancelled = summary.cancelled,
        "scan finished"
    );

    Ok(summary)
}

fn handle_outcome<R: ReportSink + ?Sized>(
    credential: &CredentialRef,
    outcome: Outcome,
    sink: &R,
    summary: &mut ScanSummary,
) {
    match outcome {
        Outcome::Scanned(report) => {
            summary.scanned += 1;
            metrics::observe_secret("scanned");

            for finding in &report.findings {
                summary.record(finding);
                metrics::observe_finding(finding);

                if finding.message.is_some()
                    && let Err(e) = sink.report(finding)
                {
                    error!(secret = %credential, "failed to write report: {e}");
                }
            }

            for e in &report.errors {
                summary.errors += 1;
                metrics::observe_error(e);
                warn!(secret = %e.owner().unwrap_or(credential), kind = e.kind(), "{e}");
            }
        }
        Outcome::Skipped => {
            summary.skipped += 1;
            metrics::observe_secret("skipped");
            warn!(secret = %credential, "secret has no {CERTIFICATE_KEY}, skipping");
        }
        Outcome::Failed(e) => {
            summary.failed += 1;
            metrics::observe_secret("failed");
            metrics::observe_error(&e);
            warn!(secret = %credential, kind = e.kind(), "{e}");
        }
        Outcome::Panicked(message) => {
            summary.failed += 1;
            metrics::observe_secret("failed");
            error!(secret = %credential, "panic while scanning secret: {message}");
        }
        Outcome::Cancelled => {
            debug!(secret = %credential, "fetch cancelled");
        }
    }
}

async fn feed(
    credentials: Vec<CredentialRef>,
    queue: mpsc::Sender<CredentialRef>,
    cancel: CancellationToken,
) {
    for credential in credentials {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = queue.send(credential) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

async fn worker<S: SecretSource>(
    source: Arc<S>,
    queue: Arc<Mutex<mpsc::Receiver<CredentialRef>>>,
    results: mpsc::UnboundedSender<CredentialOutcome>,
    policy: ExpiryPolicy,
    now: DateTime<Utc>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                credential = queue.recv() => credential,
            }
        };
        let Some(credential) = next else {
            break;
        };

        let outcome = AssertUnwindSafe(scan_credential(
            source.as_ref(),
            &credential,
            &policy,
            now,
            &cancel,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Outcome::Panicked(panic_message(panic.as_ref())));

        if results
            .send(CredentialOutcome {
                credential,
                outcome,
            })
            .is_err()
        {
            break;
        }
    }
}

async fn scan_credential<S: SecretSource>(
    source: &S,
    credential: &CredentialRef,
    policy: &ExpiryPolicy,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Outcome {
    debug!(secret = %credential, "fetching secret");

    let fetched = tokio::select! {
        biased;
        () = cancel.cancelled() => return Outcome::Cancelled,
        fetched = source.fetch(credential) => fetched,
    };

    match fetched {
        Ok(raw) if raw.is_empty() => Outcome::Skipped,
        Ok(raw) => Outcome::Scanned(scan_chain(&raw, policy, now)),
        Err(e) => Outcome::Failed(e),
    }
}

fn spawn_deadline(timeout: Duration, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            () = time::sleep(timeout) => {
                warn!(?timeout, "scan deadline reached, cancelling remaining secrets");
                token.cancel();
            }
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
