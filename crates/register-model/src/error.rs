use thiserror::Error;

use crate::Operation;

/// Convenience alias for results produced by the register model.
pub type RegisterResult<T> = Result<T, RegisterError>;

/// Error taxonomy for register construction, lookup, and transactions.
///
/// Every variant is returned immediately to the caller; nothing in the model
/// retries or silently coerces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// An explicit access code was combined with explicit behavior flags.
    #[error("bit {position}: `access` cannot be combined with `{flag}`")]
    ConfigurationConflict {
        /// Position of the bit being constructed.
        position: usize,
        /// First behavior flag found alongside the access code.
        flag: &'static str,
    },
    /// Access code text outside the recognized set.
    #[error("unknown access code `{0}`")]
    UnknownAccessCode(String),
    /// Bulk copy between collections of different widths.
    #[error("cannot copy a {source_size}-bit collection into a {target_size}-bit collection")]
    MismatchedSize {
        /// Width of the destination collection.
        target_size: usize,
        /// Width of the source collection.
        source_size: usize,
    },
    /// Named lookup found nothing while strict errors are enabled.
    #[error("register `{register}` has no bits named {requested:?}; valid names are {available:?}")]
    MissingBits {
        /// Register that was searched.
        register: String,
        /// Names that were requested.
        requested: Vec<String>,
        /// Field names the register does define.
        available: Vec<String>,
    },
    /// No collaborator in the ownership chain handles the transaction.
    #[error("no handler for {operation} found for register `{register}`")]
    MissingHandler {
        /// Register the transaction was requested for.
        register: String,
        /// Requested transaction kind.
        operation: Operation,
    },
    /// Operation argument outside its closed set.
    #[error("unsupported operation `{0}`, expected `read` or `write`")]
    UnsupportedOperation(String),
    /// Strict access query over bits that do not share one access code.
    #[error("bits of `{register}` mix access codes {codes:?}")]
    MixedAccess {
        /// Register owning the bits.
        register: String,
        /// Distinct codes found, in significance order.
        codes: Vec<crate::AccessCode>,
    },
    /// Register width is zero or exceeds the model value width.
    #[error("register width {size} is outside 1..={max}")]
    InvalidSize {
        /// Requested width.
        size: usize,
        /// Largest supported width.
        max: usize,
    },
    /// Field fragment does not fit inside the register.
    #[error("field `{name}` at {position} with width {width} does not fit a {size}-bit register")]
    FieldOutOfRange {
        /// Field being declared.
        name: String,
        /// Starting position as declared.
        position: usize,
        /// Fragment width.
        width: usize,
        /// Register width.
        size: usize,
    },
    /// Scrambled field whose fragments claim the same bit more than once.
    #[error("field `{name}`: fragment at {position} overlaps an earlier fragment")]
    OverlappingFragments {
        /// Field being declared.
        name: String,
        /// Starting position of the offending fragment as declared.
        position: usize,
    },
}

impl RegisterError {
    /// Returns `true` for errors raised while declaring bits or fields.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationConflict { .. }
                | Self::UnknownAccessCode(_)
                | Self::InvalidSize { .. }
                | Self::FieldOutOfRange { .. }
                | Self::OverlappingFragments { .. }
        )
    }
}
