#![deny(unsafe_code)]
// Clippy lint configuration for CI
// These lints are allowed because:
// - cast_*: genomic coordinates intentionally cast between numeric types
// - module_name_repetitions: public names read better fully qualified
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]

//! # ampqc - amplicon scheme detection and consensus self-QC
//!
//! This library determines which amplicon tiling scheme generated a set of
//! sequencing reads and masks consensus positions whose variant signal looks
//! like a PCR/primer artifact rather than a true biological variant.
//!
//! ## Overview
//!
//! The library is organized into two passes over an aligned read stream:
//!
//! ### Detection
//!
//! - **[`amplicon`]** - Amplicon scheme definitions and the interval index
//! - **[`detect`]** - Template-span resolution, amplicon matching and
//!   scheme voting
//! - **[`scan`]** - Single-pass stream scanning with pairing invariants,
//!   aggregate statistics and read forwarding
//!
//! ### Self-QC
//!
//! - **[`pileup`]** - CIGAR-to-allele translation and per-position allele
//!   statistics with primer/strand/amplicon context
//! - **[`mask`]** - Bias testing and consensus masking
//!
//! ### Utilities
//!
//! - **[`record`]** - The in-memory read record consumed by both passes
//! - **[`errors`]** - Error types
//! - **[`logging`]** - Formatted summary logging
//!
//! Alignment, BAM/SAM file I/O, scheme file parsing and pipeline
//! orchestration are external collaborators: reads arrive as an ordered,
//! forward-only sequence of [`record::ReadRecord`]s and schemes as parsed
//! [`amplicon::AmpliconSet`]s.
//!
//! ## Quick Start
//!
//! ```
//! use ampqc::{detect, Amplicon, AmpliconSet, RecordBuilder};
//!
//! let schemes = vec![AmpliconSet::new(
//!     "schemeX",
//!     "sx",
//!     vec![Amplicon::new("amp1", 100, 300, 120, 280)],
//! )];
//!
//! let reads = vec![RecordBuilder::new().start(150).build()];
//! assert_eq!(detect(&schemes, reads), Some("schemeX"));
//! ```
//!
//! Both passes are single-threaded and consume their stream exactly once;
//! callers that shard by region or sample merge the resulting
//! [`pileup::Pileup`]s with [`pileup::Pileup::merge`].

pub mod amplicon;
pub mod detect;
pub mod errors;
pub mod logging;
pub mod mask;
pub mod pileup;
pub mod record;
pub mod scan;

pub use amplicon::{Amplicon, AmpliconSet};
pub use detect::{choose_scheme, detect, match_read, template_span, MatchResult, SchemeDetector};
pub use errors::{AmpQcError, Result};
pub use mask::{mask_sequence, test_bias, MaskOptions, MaskResult, UNKNOWN_BASE};
pub use pileup::{cigar_to_alleles, BaseProfile, Pileup, PositionStats};
pub use record::{ReadRecord, RecordBuilder};
pub use scan::{scan_stream, ReadSink, ScanStats};
