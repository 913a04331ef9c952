//! Collaborator contracts for the objects that own registers.
//!
//! A register only ever talks outward through these traits: it asks its
//! ancestors whether a feature is enabled, where its base address is, and
//! which handler performs a read or write transaction.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::{Metadata, MetaValue, Register, RegisterError};

/// Register transaction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operation {
    /// Read transaction (`read_register`).
    Read,
    /// Write transaction (`write_register`).
    Write,
}

impl Operation {
    /// Lowercase operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = RegisterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" | "read_register" => Ok(Self::Read),
            "write" | "write_register" => Ok(Self::Write),
            _ => Err(RegisterError::UnsupportedOperation(s.to_owned())),
        }
    }
}

/// Answers whether a named feature is enabled.
pub trait FeatureGate {
    /// Returns `true` when `feature` is enabled for this object.
    fn has_feature(&self, feature: &str) -> bool;
}

/// Gate that reports every feature as disabled.
///
/// Used for bits that are manipulated outside any register hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ungated;

impl FeatureGate for Ungated {
    fn has_feature(&self, _feature: &str) -> bool {
        false
    }
}

/// Free-form options forwarded to a transaction handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Handler-specific settings; the model never interprets them.
    pub settings: Metadata,
}

impl TransactionOptions {
    /// Creates an empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a handler setting.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Looks up a handler setting.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.settings.get(key)
    }
}

/// Performs register transactions against the modeled device.
///
/// Side effects such as emitting vectors into an output stream are entirely
/// the handler's responsibility; implementations that need to record state
/// use interior mutability.
pub trait TransactionHandler {
    /// Returns `true` when this handler implements `operation`.
    fn supports(&self, _operation: Operation) -> bool {
        true
    }

    /// Performs a write of the register's current data.
    fn write_register(&self, register: &Register, options: &TransactionOptions);

    /// Performs a read, comparing against the register's flagged bits.
    fn read_register(&self, register: &Register, options: &TransactionOptions);

    /// Base address override for `register`, consulted before the owner chain.
    fn base_address(&self, _register: &Register) -> Option<u64> {
        None
    }
}

/// A link in the ownership chain above a register.
///
/// Every capability is optional; the defaults describe an owner that
/// implements nothing, so lookups move on to the next link.
pub trait Owner: fmt::Debug {
    /// Class name used to scope default metadata tables.
    fn class_name(&self) -> &str {
        ""
    }

    /// The owner of this owner, if any.
    fn parent(&self) -> Option<Rc<dyn Owner>> {
        None
    }

    /// Dedicated controller that takes precedence for transactions.
    fn controller(&self) -> Option<Rc<dyn Owner>> {
        None
    }

    /// Feature query capability.
    fn feature_gate(&self) -> Option<&dyn FeatureGate> {
        None
    }

    /// Transaction capability.
    fn transaction_handler(&self) -> Option<&dyn TransactionHandler> {
        None
    }

    /// Base address for registers below this owner, optionally per domain.
    fn reg_base_address(&self, _domain: Option<&str>) -> Option<u64> {
        None
    }
}

/// Iterates `start` and each of its parents in turn.
pub(crate) fn ancestors(start: Option<Rc<dyn Owner>>) -> impl Iterator<Item = Rc<dyn Owner>> {
    std::iter::successors(start, |owner| owner.parent())
}
