//! Bias testing and consensus masking.
//!
//! The masking engine consumes a [`Pileup`] and a consensus sequence: each
//! position with enough depth runs three bias checks (primer-region
//! enrichment and strand enrichment among alt calls, and per-amplicon
//! enrichment), and any failure replaces the consensus base with the unknown
//! symbol. The engine is deterministic: identical pileups always yield the
//! same masked sequence and log.

use std::collections::BTreeMap;

use crate::logging::log_mask_summary;
use crate::pileup::{Pileup, PositionStats};

/// Symbol written over masked consensus bases.
pub const UNKNOWN_BASE: char = 'N';

/// Masking policy knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskOptions {
    /// Maximum tolerated deviation of a proportion from 0.5
    pub bias_threshold: f64,
    /// Positions with fewer total observations are skipped entirely and
    /// never masked, regardless of bias
    pub min_depth: u64,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self { bias_threshold: 0.3, min_depth: 5 }
    }
}

/// Whether `n` successes out of `trials` deviate from an even split by more
/// than `threshold`.
///
/// An approximate, non-parametric stand-in for a binomial significance test:
/// cheap, threshold-driven, and not a guarantee of statistical rigor. Zero
/// trials is no evidence and never biased.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn test_bias(n: u64, trials: u64, threshold: f64) -> bool {
    if trials == 0 {
        return false;
    }
    let bias = (0.5 - (n as f64 / trials as f64)).abs();
    bias > threshold
}

/// Run the three bias checks for one position, appending a reason to the
/// position's log for each failing check. Returns whether the position
/// failed overall.
///
/// The primer and strand checks compare sub-populations of the *alt* calls
/// against the alt total (not alt-rate inside vs. outside the context); this
/// mirrors the reference behavior and should be confirmed against validation
/// data rather than changed here. The per-amplicon check runs for every
/// amplicon with a nonzero alt count, in sorted amplicon order.
pub fn check_for_failure(stats: &mut PositionStats, options: &MaskOptions) -> bool {
    let mut failed = false;

    // Overrepresentation of alt alleles in primer-covered regions
    if test_bias(stats.alts_in_primer, stats.alts, options.bias_threshold) {
        stats.log.push("alternative alleles biased in primer region".to_string());
        failed = true;
    }

    // Strand bias in alt calls
    if test_bias(stats.alts_forward, stats.alts, options.bias_threshold) {
        stats.log.push("strand bias in alternative alleles".to_string());
        failed = true;
    }

    // Amplicon bias
    let mut biased_amplicons: Vec<String> = Vec::new();
    for (amplicon, alts) in &stats.alts_in_amplicons {
        if *alts == 0 {
            continue;
        }
        let total = stats.amplicon_totals.get(amplicon).copied().unwrap_or(0);
        if test_bias(*alts, total, options.bias_threshold) {
            biased_amplicons.push(amplicon.clone());
        }
    }
    for amplicon in biased_amplicons {
        stats
            .log
            .push(format!("amplicon bias in alternative allele calls, amplicon {amplicon}"));
        failed = true;
    }

    failed
}

/// A masked consensus sequence plus the per-position failure log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskResult {
    /// The rewritten sequence, identical length to the input
    pub sequence: String,
    /// Failure reasons per masked position, in position order
    pub failures: BTreeMap<usize, Vec<String>>,
}

impl MaskResult {
    /// Number of masked positions.
    #[must_use]
    pub fn masked_positions(&self) -> usize {
        self.failures.len()
    }
}

/// Mask a consensus sequence against accumulated position statistics.
///
/// Every position meeting the depth threshold runs [`check_for_failure`];
/// failed positions have their base replaced with [`UNKNOWN_BASE`] and their
/// reasons collected into the result log. The pileup is consumed: position
/// statistics are evaluated exactly once.
#[must_use]
pub fn mask_sequence(
    name: &str,
    sequence: &str,
    mut pileup: Pileup,
    options: &MaskOptions,
) -> MaskResult {
    let mut bases: Vec<char> = sequence.chars().collect();
    let mut failures = BTreeMap::new();

    for (pos, stats) in pileup.iter_mut() {
        if stats.total < options.min_depth {
            continue;
        }
        if pos >= bases.len() {
            continue;
        }
        if check_for_failure(stats, options) {
            bases[pos] = UNKNOWN_BASE;
            failures.insert(pos, std::mem::take(&mut stats.log));
        }
    }

    let result = MaskResult { sequence: bases.into_iter().collect(), failures };
    log_mask_summary(name, sequence.len(), &result);
    result
}
