//! Report sinks for classified certificates.

use crate::expiry::Finding;
use std::{
    io::{self, Stdout, Write},
    str::FromStr,
    sync::{Mutex, PoisonError},
};

/// How findings are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The finding message, one per line
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Receives the findings that carry a message.
///
/// Implementations are shared between tasks and must write each finding as a
/// single unit.
pub trait ReportSink: Send + Sync {
    /// Write one finding
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails
    fn report(&self, finding: &Finding) -> io::Result<()>;
}

/// Writes one line per finding to any writer
#[derive(Debug)]
pub struct WriterSink<W> {
    format: OutputFormat,
    writer: Mutex<W>,
}

impl WriterSink<Stdout> {
    #[must_use]
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(io::stdout(), format)
    }
}

impl<W: Write + Send> WriterSink<W> {
    pub const fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            format,
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> ReportSink for WriterSink<W> {
    fn report(&self, finding: &Finding) -> io::Result<()> {
        let Some(message) = &finding.message else {
            return Ok(());
        };

        let line = match self.format {
            OutputFormat::Text => message.clone(),
            OutputFormat::Json => serde_json::to_string(finding).map_err(io::Error::other)?,
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::{
        expiry::{ExpiryPolicy, classify},
        tls::{Certificate, CredentialRef},
    };
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::sync::Arc;

    fn finding(days_left: i64, include_non_expiring: bool) -> Finding {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap();
        let cert = Certificate {
            issuer_cn: "Example CA".to_string(),
            subject_cn: "api.example.com".to_string(),
            not_before: now - TimeDelta::days(10),
            not_after: now + TimeDelta::days(days_left),
            owner: CredentialRef::new("api", "api-tls"),
        };
        classify(
            cert,
            &ExpiryPolicy {
                threshold_days: 30,
                include_non_expiring,
            },
            now,
        )
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn test_text_sink_writes_message() {
        let sink = WriterSink::new(Vec::new(), OutputFormat::Text);
        let f = finding(3, false);
        sink.report(&f).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, format!("{}\n", f.message.unwrap()));
    }

    #[test]
    fn test_sink_skips_suppressed() {
        let sink = WriterSink::new(Vec::new(), OutputFormat::Json);
        sink.report(&finding(300, false)).unwrap();
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn test_json_sink_writes_one_object_per_line() {
        let sink = WriterSink::new(Vec::new(), OutputFormat::Json);
        sink.report(&finding(3, false)).unwrap();
        sink.report(&finding(300, true)).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["classification"], "expiring_soon");
        assert_eq!(lines[1]["classification"], "healthy");
        assert_eq!(lines[1]["certificate"]["issuer_cn"], "Example CA");
    }

    #[test]
    fn test_concurrent_writes_do_not_interleave() {
        let sink = Arc::new(WriterSink::new(Vec::new(), OutputFormat::Text));
        let f = finding(3, false);
        let expected = f.message.clone().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sink = Arc::clone(&sink);
                let f = f.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        sink.report(&f).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sink = Arc::try_unwrap(sink).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 400);
        assert!(out.lines().all(|line| line == expected));
    }
}
