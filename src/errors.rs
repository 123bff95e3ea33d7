//! Custom error types for ampqc operations.

use thiserror::Error;

/// Result type alias for ampqc operations
pub type Result<T> = std::result::Result<T, AmpQcError>;

/// Error type for ampqc operations.
///
/// All variants are fatal, deterministic functions of the input stream:
/// retrying without correcting the input is pointless. Benign no-signal
/// outcomes (no scheme chosen, position below the depth threshold) are
/// expressed as `Option`s on the relevant APIs, never as errors.
#[derive(Error, Debug)]
pub enum AmpQcError {
    /// A read stream mixed paired and unpaired records
    #[error("reads must be all paired or all unpaired (offending read '{name}')")]
    MixedPairing {
        /// Name of the first record that disagreed with the stream
        name: String,
    },

    /// Paired records were not in mate-adjacent order
    #[error("paired reads not in expected order (read '{name}'); cannot continue")]
    MateOrder {
        /// Name of the out-of-order record
        name: String,
    },

    /// Unrecognized CIGAR operation code
    #[error("invalid CIGAR operation {op}")]
    InvalidCigarOp {
        /// The unrecognized operation code (low nibble of the raw op)
        op: u32,
    },
}
