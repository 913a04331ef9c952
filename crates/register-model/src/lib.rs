//! Bit-accurate model of memory-mapped hardware registers.
//!
//! A [`Register`] owns one [`Bit`] per position and a table of named fields.
//! Fields and bit ranges are manipulated through [`BitCollection`] views,
//! which compute every aggregate by significance so that lsb0 and msb0
//! registers with the same contents agree on every value.

/// Error taxonomy for construction, lookup, and transactions.
pub mod error;
pub use error::{RegisterError, RegisterResult};

/// Access codes and the bit behavior they imply.
pub mod access;
pub use access::{AccessBehavior, AccessCode};

/// Free-form metadata attached to bits and registers.
pub mod metadata;
pub use metadata::{merge_metadata, MetaValue, Metadata, MetadataScope};

/// Owner, feature gate, and transaction handler contracts.
pub mod hierarchy;
pub(crate) use hierarchy::ancestors;
pub use hierarchy::{FeatureGate, Operation, Owner, TransactionHandler, TransactionOptions, Ungated};

/// Shared configuration passed to registers.
pub mod context;
pub use context::Context;

/// Single-bit state machine.
pub mod bit;
pub use bit::{Bit, BitOptions, FeatureConstraint, ResetValue, WriteOptions};

/// Ordered views over register bits.
pub mod collection;
pub use collection::{
    BitCollection, BitIndex, BitOrder, Bits, BitsMut, CopySource, OverlayRun, ReadOptions,
};

/// Register container, lookup, and addressing.
pub mod register;
pub use register::{
    AddressOptions, FeatureFilter, FieldFragment, Hierarchy, NamedBits, Register, RegisterOptions,
    RegisterSnapshot, Selector, MAX_REGISTER_SIZE,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
