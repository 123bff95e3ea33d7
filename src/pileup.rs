//! Per-reference-position allele statistics.
//!
//! The QC pass translates each aligned read's CIGAR into
//! reference-position-indexed allele observations ([`cigar_to_alleles`]) and
//! tallies them into a [`Pileup`]: one [`PositionStats`] per observed
//! position, each observation tagged with its [`BaseProfile`] context
//! (primer overlap, strand, amplicon identity). The pileup is owned by the
//! single streaming pass that fills it and is consumed once by the masking
//! engine.

use std::collections::BTreeMap;
use std::fmt;

use ahash::AHashMap;

use crate::amplicon::Amplicon;
use crate::errors::{AmpQcError, Result};

/// Context attached to one allele observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseProfile<'a> {
    /// The observed base lies inside a primer region
    pub in_primer: bool,
    /// The read aligned to the forward strand
    pub forward_strand: bool,
    /// Unambiguously assigned amplicon, if any
    pub amplicon_name: Option<&'a str>,
}

/// Allele counters for one reference position.
///
/// Counters only ever increase; `alts <= total` and every contextual
/// sub-count is bounded by its corresponding total. The `log` collects
/// human-readable failure reasons appended by the masking engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionStats {
    /// All observations at this position
    pub total: u64,
    /// Observations disagreeing with the reference base
    pub alts: u64,
    /// Alt observations inside a primer region
    pub alts_in_primer: u64,
    /// Ref observations inside a primer region
    pub refs_in_primer: u64,
    /// Alt observations from forward-strand reads
    pub alts_forward: u64,
    /// Ref observations from forward-strand reads
    pub refs_forward: u64,
    /// Alt observations per assigned amplicon
    pub alts_in_amplicons: BTreeMap<String, u64>,
    /// All observations per assigned amplicon (bias-test denominators)
    pub amplicon_totals: BTreeMap<String, u64>,
    /// QC failure reasons recorded for this position
    pub log: Vec<String>,
}

impl PositionStats {
    /// Count one observation that disagrees with the reference.
    ///
    /// Observations without an amplicon assignment are excluded from the
    /// per-amplicon maps but still counted everywhere else.
    pub fn add_alt(&mut self, profile: &BaseProfile<'_>) {
        self.alts += 1;
        if let Some(name) = profile.amplicon_name {
            *self.alts_in_amplicons.entry(name.to_string()).or_insert(0) += 1;
            *self.amplicon_totals.entry(name.to_string()).or_insert(0) += 1;
        }
        if profile.forward_strand {
            self.alts_forward += 1;
        }
        if profile.in_primer {
            self.alts_in_primer += 1;
        }
        self.total += 1;
    }

    /// Count one observation that agrees with the reference.
    pub fn add_ref(&mut self, profile: &BaseProfile<'_>) {
        if let Some(name) = profile.amplicon_name {
            *self.amplicon_totals.entry(name.to_string()).or_insert(0) += 1;
        }
        if profile.forward_strand {
            self.refs_forward += 1;
        }
        if profile.in_primer {
            self.refs_in_primer += 1;
        }
        self.total += 1;
    }

    /// Element-wise addition of all counters plus log concatenation.
    ///
    /// This is the merge operation for callers that shard by region or
    /// sample and combine per-position statistics afterwards.
    pub fn merge(&mut self, other: PositionStats) {
        self.total += other.total;
        self.alts += other.alts;
        self.alts_in_primer += other.alts_in_primer;
        self.refs_in_primer += other.refs_in_primer;
        self.alts_forward += other.alts_forward;
        self.refs_forward += other.refs_forward;
        for (name, count) in other.alts_in_amplicons {
            *self.alts_in_amplicons.entry(name).or_insert(0) += count;
        }
        for (name, count) in other.amplicon_totals {
            *self.amplicon_totals.entry(name).or_insert(0) += count;
        }
        self.log.extend(other.log);
    }
}

impl fmt::Display for PositionStats {
    /// Compact rendering for position reports: per-amplicon totals when the
    /// position is covered by several amplicons, `alts/total` when the alt
    /// fraction exceeds 0.2, `-` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.amplicon_totals.len() > 1 {
            let parts: Vec<String> =
                self.amplicon_totals.iter().map(|(name, count)| format!("{name}:{count}")).collect();
            return write!(f, "{}", parts.join("-"));
        }
        #[allow(clippy::cast_precision_loss)]
        if self.total > 0 && self.alts as f64 / self.total as f64 > 0.2 {
            return write!(f, "{}/{}", self.alts, self.total);
        }
        write!(f, "-")
    }
}

/// Translate one read's CIGAR and query sequence into reference-relative
/// allele observations.
///
/// Returns `(reference-relative position, observed base or inserted
/// substring)` pairs. Match/mismatch ops (`M`/`=`/`X`) emit one single-base
/// observation per consumed position; an insertion emits the whole inserted
/// substring at the current reference-relative position without advancing
/// the reference cursor; deletions and reference skips advance the reference
/// cursor only; soft clips advance the query cursor only; hard clips advance
/// nothing.
///
/// The CIGAR must agree with the query sequence: ops consuming more query
/// bases than `query` holds will panic, as such a record is malformed beyond
/// this crate's contract.
///
/// # Errors
///
/// [`AmpQcError::InvalidCigarOp`] for any op code other than
/// `M`/`I`/`D`/`N`/`S`/`H`/`=`/`X`.
pub fn cigar_to_alleles<'q>(query: &'q str, cigar: &[u32]) -> Result<Vec<(usize, &'q str)>> {
    let mut alleles = Vec::new();
    let mut q = 0usize; // query cursor
    let mut r = 0usize; // reference-relative cursor
    for &op in cigar {
        let len = (op >> 4) as usize;
        match op & 0xF {
            // M (0), = (7), X (8): match/mismatch
            0 | 7 | 8 => {
                for i in 0..len {
                    alleles.push((r + i, &query[q + i..q + i + 1]));
                }
                r += len;
                q += len;
            }
            // I: the inserted substring observed at the current position
            1 => {
                alleles.push((r, &query[q..q + len]));
                q += len;
            }
            // D: reference bases skipped by the query
            2 => r += len,
            // N: reference skip
            3 => r += len,
            // S: soft clip
            4 => q += len,
            // H: hard clip, bases absent from the query entirely
            5 => {}
            other => return Err(AmpQcError::InvalidCigarOp { op: other }),
        }
    }
    Ok(alleles)
}

/// Accumulates [`PositionStats`] across one QC pass.
///
/// Stats are created lazily on the first observation at a position and
/// mutated only by the single pass that owns the pileup.
#[derive(Debug, Clone, Default)]
pub struct Pileup {
    positions: AHashMap<usize, PositionStats>,
}

impl Pileup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one observation at a reference position, classifying it as alt
    /// or ref against the reference base.
    pub fn observe(&mut self, pos: usize, observed: &str, ref_base: &str, profile: &BaseProfile<'_>) {
        let stats = self.positions.entry(pos).or_default();
        if observed == ref_base {
            stats.add_ref(profile);
        } else {
            stats.add_alt(profile);
        }
    }

    /// Translate one aligned read and tally all of its observations.
    ///
    /// `reference` is indexed by absolute position; `reference_start` is the
    /// 0-based position of the alignment's first reference base. When the
    /// read's amplicon assignment is ambiguous (`amplicon` is `None`) the
    /// observations carry no amplicon name and are assumed to lie outside
    /// any primer region.
    ///
    /// # Errors
    ///
    /// Propagates [`AmpQcError::InvalidCigarOp`] from CIGAR translation.
    pub fn add_alignment(
        &mut self,
        reference: &str,
        reference_start: usize,
        query: &str,
        cigar: &[u32],
        forward_strand: bool,
        amplicon: Option<&Amplicon>,
    ) -> Result<()> {
        for (offset, observed) in cigar_to_alleles(query, cigar)? {
            let pos = reference_start + offset;
            let Some(ref_base) = reference.get(pos..pos + 1) else {
                // Observation past the end of the reference (e.g. a trailing
                // insertion); nothing to compare against.
                continue;
            };
            let profile = BaseProfile {
                in_primer: amplicon.is_some_and(|a| a.in_primer(pos as i64)),
                forward_strand,
                amplicon_name: amplicon.map(|a| a.shortname.as_str()),
            };
            self.observe(pos, observed, ref_base, &profile);
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, pos: usize) -> Option<&PositionStats> {
        self.positions.get(&pos)
    }

    /// Mutable statistics for a position, created lazily on first access.
    pub fn stats_mut(&mut self, pos: usize) -> &mut PositionStats {
        self.positions.entry(pos).or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Observed positions in ascending order.
    #[must_use]
    pub fn positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.positions.keys().copied().collect();
        positions.sort_unstable();
        positions
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PositionStats)> {
        self.positions.iter().map(|(pos, stats)| (*pos, stats))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut PositionStats)> {
        self.positions.iter_mut().map(|(pos, stats)| (*pos, stats))
    }

    /// Position-wise merge for sharded callers; see [`PositionStats::merge`].
    pub fn merge(&mut self, other: Pileup) {
        for (pos, stats) in other.positions {
            match self.positions.entry(pos) {
                std::collections::hash_map::Entry::Occupied(mut existing) => {
                    existing.get_mut().merge(stats);
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(stats);
                }
            }
        }
    }
}
