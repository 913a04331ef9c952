//! Free-form per-bit and per-register attributes.

use std::collections::BTreeMap;
use std::fmt;

/// Named attribute map attached to bits and registers.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Value stored in a [`Metadata`] map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum MetaValue {
    /// Boolean attribute.
    Bool(bool),
    /// Integer attribute.
    Int(i128),
    /// Text attribute.
    Str(String),
    /// Ordered list of attributes.
    List(Vec<MetaValue>),
}

impl MetaValue {
    /// Returns the boolean payload, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i128> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text payload, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i128> for MetaValue {
    fn from(value: i128) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(i128::from(value))
    }
}

impl From<u32> for MetaValue {
    fn from(value: u32) -> Self {
        Self::Int(i128::from(value))
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<MetaValue>> From<Vec<T>> for MetaValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
            Self::List(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Scope a default metadata table applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataScope {
    /// Applies to every bit or register.
    Global,
    /// Applies to bits or registers whose owner reports this class name.
    Owner(String),
}

/// Layers `overrides` on top of `base`, later keys winning.
#[must_use]
pub fn merge_metadata(base: &Metadata, overrides: &Metadata) -> Metadata {
    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
