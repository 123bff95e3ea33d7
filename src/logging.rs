//! Formatted logging helpers for scan and masking summaries.

use crate::mask::MaskResult;
use crate::scan::ScanStats;

/// Formats a count with thousands separators (e.g. `1,234,567`).
#[must_use]
pub fn format_count(n: u64) -> String {
    let s = n.to_string();
    s.as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect::<Vec<_>>()
        .join(",")
}

/// Formats a fraction (0.0-1.0) as a percentage with the given number of
/// decimal places (e.g. `95.43%`).
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Logs a formatted summary of one stream scan.
#[allow(clippy::cast_precision_loss)]
pub fn log_scan_summary(stats: &ScanStats) {
    log::info!("Read Scan Summary:");
    log::info!("  Total reads: {}", format_count(stats.total_reads));
    if stats.total_reads > 0 {
        let mapped_rate = stats.mapped as f64 / stats.total_reads as f64;
        log::info!("  Mapped: {} ({})", format_count(stats.mapped), format_percent(mapped_rate, 2));
    }
    if stats.unpaired_reads > 0 {
        log::info!("  Unpaired reads: {}", format_count(stats.unpaired_reads));
    } else {
        log::info!(
            "  Paired reads: {} first, {} second",
            format_count(stats.reads1),
            format_count(stats.reads2)
        );
    }
    log::info!("  Matched any amplicon: {}", format_count(stats.match_any_amplicon));
    for (scheme, count) in &stats.scheme_naive_counts {
        log::info!("    {scheme}: {}", format_count(*count));
    }
    match &stats.chosen_scheme {
        Some(scheme) => log::info!("  Chosen amplicon scheme: {scheme}"),
        None => log::warn!("  No amplicon scheme matched; chosen scheme is none"),
    }
}

/// Logs a formatted summary of one masking run.
#[allow(clippy::cast_precision_loss)]
pub fn log_mask_summary(name: &str, sequence_len: usize, result: &MaskResult) {
    let masked = result.masked_positions();
    log::info!(
        "Masked {} of {} positions in '{name}'",
        format_count(masked as u64),
        format_count(sequence_len as u64)
    );
    if sequence_len > 0 && masked > 0 {
        let rate = masked as f64 / sequence_len as f64;
        log::info!("  Masked fraction: {}", format_percent(rate, 2));
    }
}
