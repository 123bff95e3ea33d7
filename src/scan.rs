//! Single-pass read stream scanning.
//!
//! [`scan_stream`] walks an ordered read stream exactly once: it drops
//! secondary and supplementary alignments, enforces the stream-consistency
//! invariants (all-paired or all-unpaired, mates adjacent), accumulates
//! aggregate [`ScanStats`], and optionally forwards every surviving record —
//! annotated with its resolved amplicon tag — to a caller-supplied
//! [`ReadSink`]. The stream is treated as forward-only: nothing here assumes
//! random access or re-iteration.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::amplicon::AmpliconSet;
use crate::detect::{choose_scheme, match_read, MatchResult};
use crate::errors::{AmpQcError, Result};
use crate::logging::log_scan_summary;
use crate::record::ReadRecord;

/// Destination for annotated reads, e.g. an output alignment writer.
///
/// The scanner's only obligation is to hand over each record together with
/// its resolved tag; serialization is the sink's concern.
pub trait ReadSink {
    /// Write one record. `tag` is the resolved scheme/amplicon annotation,
    /// `None` when no scheme matched unambiguously.
    fn write(&mut self, read: &ReadRecord, tag: Option<&str>) -> Result<()>;
}

/// Aggregate statistics for one pass over a read stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Records seen after secondary/supplementary filtering
    pub total_reads: u64,
    /// First-of-pair records
    pub reads1: u64,
    /// Second-of-pair records
    pub reads2: u64,
    /// Unpaired records
    pub unpaired_reads: u64,
    /// Mapped records
    pub mapped: u64,
    /// Reads or pairs matching at least one amplicon in any scheme
    pub match_any_amplicon: u64,
    /// Histogram of query lengths
    pub read_lengths: BTreeMap<usize, u64>,
    /// Histogram over the sorted combination of scheme names that matched at
    /// all (not necessarily unambiguously), one count per read or pair
    pub scheme_set_matches: BTreeMap<Vec<String>, u64>,
    /// Per-scheme naive totals: each scheme counts every combination that
    /// contains it; reported in the caller-supplied scheme order
    pub scheme_naive_counts: Vec<(String, u64)>,
    /// Winning scheme under the naive totals, `None` when nothing matched
    pub chosen_scheme: Option<String>,
}

/// Tracks mate adjacency while scanning a paired stream.
///
/// A first-of-pair parks its resolved tag here; the immediately following
/// second-of-pair claims it. Anything else is a fatal ordering violation.
enum PairingState {
    Idle,
    AwaitingMate { tag: Option<String> },
}

/// The tag attached to forwarded reads: sorted, `;`-joined
/// `scheme_shortname:amplicon` entries over schemes with an unambiguous
/// match, `None` when there are none.
fn annotation_tag(result: &MatchResult<'_>, sets: &[AmpliconSet]) -> Option<String> {
    let parts: Vec<String> = sets
        .iter()
        .filter_map(|set| {
            result.unambiguous(&set.name).map(|amp| format!("{}:{amp}", set.shortname))
        })
        .sorted()
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(";"))
    }
}

/// Scan an ordered read stream once, accumulating statistics and forwarding
/// annotated records to `sink` when one is given.
///
/// Matching runs once per read or pair (on the first mate); the resolved tag
/// is attached to both mates. Unmapped reads are counted but never matched.
///
/// # Errors
///
/// [`AmpQcError::MixedPairing`] when the stream mixes paired and unpaired
/// records, [`AmpQcError::MateOrder`] when paired records are not
/// mate-adjacent. Both are fatal: no partial statistics are returned.
pub fn scan_stream<I>(
    sets: &[AmpliconSet],
    reads: I,
    mut sink: Option<&mut dyn ReadSink>,
) -> Result<ScanStats>
where
    I: IntoIterator<Item = ReadRecord>,
{
    let mut stats = ScanStats::default();
    let mut stream_paired: Option<bool> = None;
    let mut state = PairingState::Idle;

    for read in reads {
        if read.is_secondary() || read.is_supplementary() {
            continue;
        }

        match stream_paired {
            None => stream_paired = Some(read.is_paired()),
            Some(paired) if paired != read.is_paired() => {
                return Err(AmpQcError::MixedPairing { name: read.name.clone() });
            }
            Some(_) => {}
        }

        stats.total_reads += 1;
        *stats.read_lengths.entry(read.query_length()).or_insert(0) += 1;
        if !read.is_unmapped() {
            stats.mapped += 1;
        }

        let matches: Option<MatchResult<'_>>;
        let tag: Option<String>;
        if read.is_paired() {
            if read.is_first_of_pair() {
                if !matches!(state, PairingState::Idle) {
                    return Err(AmpQcError::MateOrder { name: read.name.clone() });
                }
                stats.reads1 += 1;
                let result = (!read.is_unmapped()).then(|| match_read(&read, sets));
                tag = result.as_ref().and_then(|r| annotation_tag(r, sets));
                state = PairingState::AwaitingMate { tag: tag.clone() };
                matches = result;
            } else {
                let PairingState::AwaitingMate { tag: pending } =
                    std::mem::replace(&mut state, PairingState::Idle)
                else {
                    return Err(AmpQcError::MateOrder { name: read.name.clone() });
                };
                stats.reads2 += 1;
                // The pair was matched on the first mate; reuse its tag and
                // do not count the pair twice.
                matches = None;
                tag = pending;
            }
        } else {
            stats.unpaired_reads += 1;
            let result = (!read.is_unmapped()).then(|| match_read(&read, sets));
            tag = result.as_ref().and_then(|r| annotation_tag(r, sets));
            matches = result;
        }

        if let Some(result) = &matches {
            if !result.is_empty() {
                stats.match_any_amplicon += 1;
                let combination: Vec<String> =
                    result.schemes().map(String::from).sorted().collect();
                *stats.scheme_set_matches.entry(combination).or_insert(0) += 1;
            }
        }

        if let Some(sink) = sink.as_deref_mut() {
            sink.write(&read, tag.as_deref())?;
        }
    }

    let mut naive: Vec<(String, u64)> = sets.iter().map(|s| (s.name.clone(), 0)).collect();
    for (combination, count) in &stats.scheme_set_matches {
        for scheme in combination {
            if let Some(slot) = naive.iter_mut().find(|(name, _)| name == scheme) {
                slot.1 += count;
            }
        }
    }
    stats.scheme_naive_counts = naive;
    stats.chosen_scheme =
        choose_scheme(stats.scheme_naive_counts.iter().map(|(name, count)| (name.as_str(), *count)))
            .map(String::from);

    log_scan_summary(&stats);
    Ok(stats)
}
