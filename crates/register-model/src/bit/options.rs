//! Construction options shared by single bits and multi-bit fields.

use crate::{AccessCode, MetaValue, Metadata};

/// Reset value of a bit or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ResetValue {
    /// Literal reset value.
    Value(u128),
    /// No defined reset state.
    Undefined,
    /// Reset state comes from backing memory contents.
    MemoryBacked,
}

impl Default for ResetValue {
    fn default() -> Self {
        Self::Value(0)
    }
}

impl From<u128> for ResetValue {
    fn from(value: u128) -> Self {
        Self::Value(value)
    }
}

impl ResetValue {
    /// Returns `true` for the `Undefined` and `MemoryBacked` sentinels.
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        !matches!(self, Self::Value(_))
    }

    /// Literal value, or `None` for a sentinel.
    #[must_use]
    pub const fn known(self) -> Option<u128> {
        match self {
            Self::Value(value) => Some(value),
            Self::Undefined | Self::MemoryBacked => None,
        }
    }

    /// The single-bit reset value at significance `index`; sentinels pass through.
    #[must_use]
    pub const fn bit(self, index: usize) -> Self {
        match self {
            Self::Value(value) => {
                if index < u128::BITS as usize {
                    Self::Value((value >> index) & 1)
                } else {
                    Self::Value(0)
                }
            }
            sentinel => sentinel,
        }
    }
}

/// Feature names gating a bit's existence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FeatureConstraint {
    /// Always enabled.
    #[default]
    None,
    /// Enabled when this feature is enabled.
    Single(String),
    /// Enabled when every listed feature is enabled.
    List(Vec<String>),
}

impl FeatureConstraint {
    /// Returns `true` when there is no constraint.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Constraint feature names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::None => &[],
            Self::Single(name) => std::slice::from_ref(name),
            Self::List(names) => names,
        }
    }

    /// Returns `true` when `name` is one of the constraint features.
    #[must_use]
    pub fn mentions(&self, name: &str) -> bool {
        self.names().iter().any(|feature| feature == name)
    }
}

impl From<&str> for FeatureConstraint {
    fn from(name: &str) -> Self {
        Self::Single(name.to_owned())
    }
}

impl From<Vec<&str>> for FeatureConstraint {
    fn from(names: Vec<&str>) -> Self {
        Self::List(names.into_iter().map(str::to_owned).collect())
    }
}

/// Options recognized when constructing a bit or declaring a field.
///
/// For fields the reset value is the whole field value and is sliced per
/// bit; every other option is applied to each bit as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitOptions {
    pub(crate) reset: Option<ResetValue>,
    pub(crate) access: Option<AccessCode>,
    pub(crate) readable: Option<bool>,
    pub(crate) writable: Option<bool>,
    pub(crate) clr_only: Option<bool>,
    pub(crate) set_only: Option<bool>,
    pub(crate) w1c: Option<bool>,
    pub(crate) read_data_matches_write: bool,
    pub(crate) overlay: Option<String>,
    pub(crate) store: bool,
    pub(crate) sticky_overlay: bool,
    pub(crate) sticky_store: bool,
    pub(crate) feature: FeatureConstraint,
    pub(crate) start: bool,
    pub(crate) nvm_dep: bool,
    pub(crate) meta: Metadata,
}

impl Default for BitOptions {
    fn default() -> Self {
        Self {
            reset: None,
            access: None,
            readable: None,
            writable: None,
            clr_only: None,
            set_only: None,
            w1c: None,
            read_data_matches_write: true,
            overlay: None,
            store: false,
            sticky_overlay: true,
            sticky_store: false,
            feature: FeatureConstraint::None,
            start: false,
            nvm_dep: false,
            meta: Metadata::new(),
        }
    }
}

impl BitOptions {
    /// Options for a default read-write bit with reset 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset (and initial data) value.
    #[must_use]
    pub fn reset(mut self, reset: impl Into<ResetValue>) -> Self {
        self.reset = Some(reset.into());
        self
    }

    /// Access code; exclusive with the explicit behavior flags.
    #[must_use]
    pub fn access(mut self, access: AccessCode) -> Self {
        self.access = Some(access);
        self
    }

    /// Explicit readable flag.
    #[must_use]
    pub fn readable(mut self, readable: bool) -> Self {
        self.readable = Some(readable);
        self
    }

    /// Explicit writable flag.
    #[must_use]
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = Some(writable);
        self
    }

    /// Explicit clear-only flag.
    #[must_use]
    pub fn clr_only(mut self, clr_only: bool) -> Self {
        self.clr_only = Some(clr_only);
        self
    }

    /// Explicit set-only flag.
    #[must_use]
    pub fn set_only(mut self, set_only: bool) -> Self {
        self.set_only = Some(set_only);
        self
    }

    /// Explicit write-one-to-clear flag.
    #[must_use]
    pub fn w1c(mut self, w1c: bool) -> Self {
        self.w1c = Some(w1c);
        self
    }

    /// Whether a plain read tags the bit for read.
    #[must_use]
    pub fn read_data_matches_write(mut self, matches: bool) -> Self {
        self.read_data_matches_write = matches;
        self
    }

    /// Initial overlay tag.
    #[must_use]
    pub fn overlay(mut self, overlay: impl Into<String>) -> Self {
        self.overlay = Some(overlay.into());
        self
    }

    /// Initial store flag.
    #[must_use]
    pub fn store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }

    /// Whether the overlay survives a flag clear (default `true`).
    #[must_use]
    pub fn sticky_overlay(mut self, sticky: bool) -> Self {
        self.sticky_overlay = sticky;
        self
    }

    /// Whether the store flag survives a flag clear (default `false`).
    #[must_use]
    pub fn sticky_store(mut self, sticky: bool) -> Self {
        self.sticky_store = sticky;
        self
    }

    /// Feature constraint gating the bit.
    #[must_use]
    pub fn feature(mut self, feature: impl Into<FeatureConstraint>) -> Self {
        self.feature = feature.into();
        self
    }

    /// Marks the bit as critical to a state machine start.
    #[must_use]
    pub fn start(mut self, start: bool) -> Self {
        self.start = start;
        self
    }

    /// Marks a dependency on non-volatile memory initial state.
    #[must_use]
    pub fn nvm_dep(mut self, nvm_dep: bool) -> Self {
        self.nvm_dep = nvm_dep;
        self
    }

    /// Free-form metadata entry.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// First explicit behavior flag, by option name.
    pub(crate) fn first_explicit_flag(&self) -> Option<&'static str> {
        [
            ("readable", self.readable),
            ("writable", self.writable),
            ("clr_only", self.clr_only),
            ("set_only", self.set_only),
            ("w1c", self.w1c),
        ]
        .into_iter()
        .find_map(|(name, flag)| flag.map(|_| name))
    }

    /// Returns `true` when neither an access code nor explicit flags were given.
    pub(crate) fn has_no_access_config(&self) -> bool {
        self.access.is_none() && self.first_explicit_flag().is_none()
    }
}
