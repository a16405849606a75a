use thiserror::Error;

const BEGIN_MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";
const END_MARKER: &[u8] = b"-----END CERTIFICATE-----";

/// Maximum number of certificates taken from a single chain
pub const MAX_CERTIFICATES: usize = 10;

/// One PEM encoded certificate, borrowed from the chain it was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PemBlock<'a> {
    /// Position of the block within the chain, starting at 0
    pub index: usize,
    /// The block itself, begin and end markers included
    pub bytes: &'a [u8],
}

/// Result of splitting a chain into PEM blocks
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Split<'a> {
    pub blocks: Vec<PemBlock<'a>>,
    /// Begin markers seen, capped at [`MAX_CERTIFICATES`]
    pub begin_markers: usize,
    /// End markers seen, capped at [`MAX_CERTIFICATES`]
    pub end_markers: usize,
    /// More than [`MAX_CERTIFICATES`] begin markers were present
    pub truncated: bool,
}

impl Split<'_> {
    /// True when every begin marker found has an end marker
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.begin_markers == self.end_markers
    }
}

/// A begin/end marker pair whose end marker comes first
#[derive(Debug, Error, PartialEq, Eq)]
#[error("certificate {index} has an end marker before its begin marker")]
pub struct InvertedBlock {
    pub index: usize,
}

/// Split a certificate chain into its PEM blocks, in source order.
///
/// The i-th begin marker is paired with the i-th end marker. When the counts
/// differ only the shorter prefix is paired and the remaining markers are
/// ignored. A chain without markers yields an empty [`Split`].
///
/// # Errors
///
/// Returns [`InvertedBlock`] if a paired end marker starts before its begin
/// marker ends.
pub fn split(raw: &[u8]) -> Result<Split<'_>, InvertedBlock> {
    let (begins, truncated) = find_markers(raw, BEGIN_MARKER);
    let (ends, _) = find_markers(raw, END_MARKER);

    let mut blocks = Vec::with_capacity(begins.len().min(ends.len()));
    for (index, (&start, &end)) in begins.iter().zip(ends.iter()).enumerate() {
        if end < start + BEGIN_MARKER.len() {
            return Err(InvertedBlock { index });
        }

        let bytes = raw
            .get(start..end + END_MARKER.len())
            .ok_or(InvertedBlock { index })?;

        blocks.push(PemBlock { index, bytes });
    }

    Ok(Split {
        blocks,
        begin_markers: begins.len(),
        end_markers: ends.len(),
        truncated,
    })
}

/// Offsets of the first `MAX_CERTIFICATES` occurrences of `marker`, and
/// whether more occurrences follow.
fn find_markers(haystack: &[u8], marker: &[u8]) -> (Vec<usize>, bool) {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(relative) = haystack.get(pos..).and_then(|rest| find(rest, marker)) {
        if found.len() == MAX_CERTIFICATES {
            return (found, true);
        }
        let start = pos + relative;
        found.push(start);
        pos = start + marker.len();
    }

    (found, false)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
