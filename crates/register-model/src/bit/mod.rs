//! Single-bit state machine: value, access policy, and transaction flags.

/// Construction options, reset values, and feature constraints.
pub mod options;

pub use options::{BitOptions, FeatureConstraint, ResetValue};

use crate::{
    AccessBehavior, AccessCode, FeatureGate, MetaValue, Metadata, RegisterError, RegisterResult,
    Ungated,
};

/// Options controlling a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WriteOptions {
    /// Bypass writability and set-only/clear-only legality.
    pub force: bool,
}

impl WriteOptions {
    /// A forced write.
    #[must_use]
    pub const fn forced() -> Self {
        Self { force: true }
    }
}

/// One modeled register bit.
///
/// `position` is fixed at construction and always counts from the least
/// hardware-significant bit, whatever bit order the owning register displays.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Bit {
    position: usize,
    data: u8,
    reset_value: ResetValue,
    access: AccessCode,
    readable: bool,
    writable: bool,
    set_only: bool,
    clr_only: bool,
    w1c: bool,
    read_data_matches_write: bool,
    read_pending: bool,
    store_pending: bool,
    overlay: Option<String>,
    sticky_overlay: bool,
    sticky_store: bool,
    dirty: bool,
    written_since_reset: bool,
    feature: FeatureConstraint,
    start: bool,
    nvm_dep: bool,
    placeholder: bool,
    metadata: Metadata,
}

impl Bit {
    /// Creates a configured bit.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::ConfigurationConflict`] when an access code is
    /// combined with any explicit behavior flag.
    pub fn new(position: usize, options: &BitOptions) -> RegisterResult<Self> {
        let (access, behavior) = match options.access {
            Some(access) => {
                if let Some(flag) = options.first_explicit_flag() {
                    return Err(RegisterError::ConfigurationConflict { position, flag });
                }
                (access, access.behavior())
            }
            None => {
                let behavior = AccessBehavior {
                    readable: options.readable.unwrap_or(true),
                    writable: options.writable.unwrap_or(true),
                    w1c: options.w1c.unwrap_or(false),
                    clr_only: options.clr_only.unwrap_or(false),
                    set_only: options.set_only.unwrap_or(false),
                };
                (access_for(behavior), behavior)
            }
        };

        let reset_value = match options.reset.unwrap_or_default() {
            ResetValue::Value(value) => ResetValue::Value(value & 1),
            sentinel => sentinel,
        };

        Ok(Self {
            position,
            data: initial_data(reset_value),
            reset_value,
            access,
            readable: behavior.readable,
            writable: behavior.writable,
            set_only: behavior.set_only,
            clr_only: behavior.clr_only,
            w1c: behavior.w1c,
            read_data_matches_write: options.read_data_matches_write,
            read_pending: false,
            store_pending: options.store,
            overlay: options.overlay.clone(),
            sticky_overlay: options.sticky_overlay,
            sticky_store: options.sticky_store,
            dirty: false,
            written_since_reset: false,
            feature: options.feature.clone(),
            start: options.start,
            nvm_dep: options.nvm_dep,
            placeholder: false,
            metadata: options.meta.clone(),
        })
    }

    /// Creates the placeholder that fills positions outside any named field.
    ///
    /// Placeholders read as their reset value (0 unless the register declares
    /// otherwise) and are unwritable unless `writable` is set.
    #[must_use]
    pub fn placeholder(position: usize, writable: bool, reset: ResetValue) -> Self {
        let reset_value = match reset {
            ResetValue::Value(value) => ResetValue::Value(value & 1),
            sentinel => sentinel,
        };
        Self {
            position,
            data: initial_data(reset_value),
            reset_value,
            access: if writable {
                AccessCode::Rw
            } else {
                AccessCode::Ro
            },
            readable: true,
            writable,
            set_only: false,
            clr_only: false,
            w1c: false,
            read_data_matches_write: true,
            read_pending: false,
            store_pending: false,
            overlay: None,
            sticky_overlay: true,
            sticky_store: false,
            dirty: false,
            written_since_reset: false,
            feature: FeatureConstraint::None,
            start: false,
            nvm_dep: false,
            placeholder: true,
            metadata: Metadata::new(),
        }
    }

    /// Stable index counting from the least significant bit.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Current value, always 0 or 1.
    #[must_use]
    pub const fn data(&self) -> u8 {
        self.data
    }

    /// Declared reset value (0/1 or a sentinel).
    #[must_use]
    pub const fn reset_value(&self) -> ResetValue {
        self.reset_value
    }

    /// Access code in effect.
    #[must_use]
    pub const fn access(&self) -> AccessCode {
        self.access
    }

    /// Replaces the access code and re-derives the behavior flags.
    pub const fn set_access(&mut self, access: AccessCode) -> &mut Self {
        let behavior = access.behavior();
        self.access = access;
        self.readable = behavior.readable;
        self.writable = behavior.writable;
        self.w1c = behavior.w1c;
        self.clr_only = behavior.clr_only;
        self.set_only = behavior.set_only;
        self
    }

    /// Overrides the readable flag without touching the access code.
    pub const fn set_readable(&mut self, readable: bool) -> &mut Self {
        self.readable = readable;
        self
    }

    /// Overrides the writable flag without touching the access code.
    pub const fn set_writable(&mut self, writable: bool) -> &mut Self {
        self.writable = writable;
        self
    }

    /// Returns `true` when the bit participates in reads.
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        self.readable
    }

    /// Writability before feature gating is applied.
    #[must_use]
    pub const fn is_writable_by_access(&self) -> bool {
        self.writable
    }

    /// Effective writability; a feature-constrained bit is writable only
    /// while its features are enabled.
    #[must_use]
    pub fn is_writable(&self, gate: &dyn FeatureGate) -> bool {
        self.writable && self.is_enabled(gate)
    }

    /// Returns `true` for a set-only bit.
    #[must_use]
    pub const fn is_set_only(&self) -> bool {
        self.set_only
    }

    /// Returns `true` for a clear-only bit.
    #[must_use]
    pub const fn is_clr_only(&self) -> bool {
        self.clr_only
    }

    /// Returns `true` for a write-one-to-clear bit.
    #[must_use]
    pub const fn is_w1c(&self) -> bool {
        self.w1c
    }

    /// Returns `true` for a bit marked critical to a state machine start.
    #[must_use]
    pub const fn is_start(&self) -> bool {
        self.start
    }

    /// Returns `true` when the bit depends on non-volatile memory state.
    #[must_use]
    pub const fn is_nvm_dep(&self) -> bool {
        self.nvm_dep
    }

    /// Returns `true` for a placeholder outside any named field.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Whether a plain read tags the bit for read.
    #[must_use]
    pub const fn read_data_matches_write(&self) -> bool {
        self.read_data_matches_write
    }

    /// Writes `value & 1`.
    ///
    /// The data changes only when the value differs, the bit is writable (or
    /// the write is forced), and a set-only / clear-only bit is moving in its
    /// permitted direction (forced writes skip that check too).
    pub fn write(&mut self, value: u8, options: WriteOptions, gate: &dyn FeatureGate) -> &mut Self {
        let value = value & 1;
        let permitted = options.force
            || (self.is_writable(gate)
                && !(self.set_only && value == 0)
                && !(self.clr_only && value == 1));
        if permitted {
            if self.data != value {
                self.data = value;
                self.dirty = true;
            }
            self.written_since_reset = true;
        }
        self
    }

    /// Writes a value and applies an overlay in one step.
    pub fn write_with_overlay(
        &mut self,
        value: u8,
        overlay: impl Into<String>,
        options: WriteOptions,
        gate: &dyn FeatureGate,
    ) -> &mut Self {
        self.overlay(overlay);
        self.write(value, options, gate)
    }

    /// Tags the bit for read, optionally establishing the expected value first.
    ///
    /// An explicit value is force-written. Without one, the bit is tagged only
    /// when `read_data_matches_write` is set.
    pub fn read(&mut self, value: Option<u8>) -> &mut Self {
        let expected = value.is_some();
        if let Some(value) = value {
            self.write(value, WriteOptions::forced(), &Ungated);
        }
        if self.readable && (expected || self.read_data_matches_write) {
            self.read_pending = true;
        }
        self
    }

    /// Restores the reset value and clears the transaction flags.
    pub fn reset(&mut self) -> &mut Self {
        self.data = initial_data(self.reset_value);
        self.written_since_reset = false;
        self.clear_flags()
    }

    /// Clears read and dirty flags, and non-sticky store / overlay flags.
    pub fn clear_flags(&mut self) -> &mut Self {
        self.read_pending = false;
        self.dirty = false;
        if !self.sticky_store {
            self.store_pending = false;
        }
        if !self.sticky_overlay {
            self.overlay = None;
        }
        self
    }

    /// Clears only the read flag.
    pub const fn clear_read_flag(&mut self) -> &mut Self {
        self.read_pending = false;
        self
    }

    /// Returns `true` when the bit is tagged for read.
    #[must_use]
    pub const fn is_to_be_read(&self) -> bool {
        self.read_pending
    }

    /// Tags the bit to be captured from the next read.
    pub const fn store(&mut self) -> &mut Self {
        self.store_pending = true;
        self
    }

    /// Removes the store tag regardless of stickiness.
    pub const fn clear_store(&mut self) -> &mut Self {
        self.store_pending = false;
        self
    }

    /// Returns `true` when the bit is tagged for store.
    #[must_use]
    pub const fn is_to_be_stored(&self) -> bool {
        self.store_pending
    }

    /// Attaches an overlay tag.
    pub fn overlay(&mut self, name: impl Into<String>) -> &mut Self {
        self.overlay = Some(name.into());
        self
    }

    /// Removes the overlay tag regardless of stickiness.
    pub fn clear_overlay(&mut self) -> &mut Self {
        self.overlay = None;
        self
    }

    /// Current overlay tag.
    #[must_use]
    pub fn overlay_name(&self) -> Option<&str> {
        self.overlay.as_deref()
    }

    /// With `None`, tests for any overlay; otherwise for an exact tag match.
    #[must_use]
    pub fn has_overlay(&self, name: Option<&str>) -> bool {
        match (name, self.overlay.as_deref()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(wanted), Some(current)) => wanted == current,
        }
    }

    /// Whether the overlay survives [`Bit::clear_flags`].
    #[must_use]
    pub const fn sticky_overlay(&self) -> bool {
        self.sticky_overlay
    }

    /// Sets whether the overlay survives [`Bit::clear_flags`].
    pub const fn set_sticky_overlay(&mut self, sticky: bool) -> &mut Self {
        self.sticky_overlay = sticky;
        self
    }

    /// Whether the store flag survives [`Bit::clear_flags`].
    #[must_use]
    pub const fn sticky_store(&self) -> bool {
        self.sticky_store
    }

    /// Sets whether the store flag survives [`Bit::clear_flags`].
    pub const fn set_sticky_store(&mut self, sticky: bool) -> &mut Self {
        self.sticky_store = sticky;
        self
    }

    /// Returns `true` when the data changed since the flags were last cleared.
    #[must_use]
    pub const fn update_required(&self) -> bool {
        self.dirty
    }

    /// Returns `true` unless the reset is a sentinel and nothing has been
    /// written since reset.
    #[must_use]
    pub const fn has_known_value(&self) -> bool {
        !self.reset_value.is_sentinel() || self.written_since_reset
    }

    /// `1 << position`.
    #[must_use]
    pub fn mask(&self) -> u128 {
        shifted(1, self.position)
    }

    /// `(value & 1) << position`.
    #[must_use]
    pub fn setting(&self, value: u8) -> u128 {
        shifted(u128::from(value & 1), self.position)
    }

    /// `data << position`.
    #[must_use]
    pub fn data_in_position(&self) -> u128 {
        shifted(u128::from(self.data), self.position)
    }

    /// Feature constraint gating the bit.
    #[must_use]
    pub const fn feature(&self) -> &FeatureConstraint {
        &self.feature
    }

    /// Returns `true` when unconstrained or when every constraint feature is
    /// reported enabled by `gate`.
    #[must_use]
    pub fn is_enabled(&self, gate: &dyn FeatureGate) -> bool {
        self.feature
            .names()
            .iter()
            .all(|feature| gate.has_feature(feature))
    }

    /// With `None`, tests for any feature constraint; otherwise whether `name`
    /// is one of the constraint features.
    #[must_use]
    pub fn has_feature_constraint(&self, name: Option<&str>) -> bool {
        match name {
            None => !self.feature.is_none(),
            Some(name) => self.feature.mentions(name),
        }
    }

    /// Forces a set write-one-to-clear bit back to 0.
    pub const fn clear_w1c(&mut self) -> &mut Self {
        if self.w1c && self.data == 1 {
            self.data = 0;
        }
        self
    }

    /// Forces a set start bit back to 0.
    pub const fn clear_start(&mut self) -> &mut Self {
        if self.start && self.data == 1 {
            self.data = 0;
        }
        self
    }

    /// Merged metadata (owner defaults, then per-bit entries).
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Looks up one metadata entry.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    /// Sets one metadata entry.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub(crate) fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    /// Reproduces another bit's overlay, value, and read/store flags.
    pub(crate) fn mirror(&mut self, source: &Self) {
        self.overlay.clone_from(&source.overlay);
        self.write(source.data, WriteOptions::forced(), &Ungated);
        self.read_pending = source.read_pending;
        self.store_pending = source.store_pending;
    }

    /// Moves an already accumulated value into a freshly declared bit.
    pub(crate) const fn carry_data(&mut self, data: u8) {
        self.data = data & 1;
    }
}

fn initial_data(reset: ResetValue) -> u8 {
    match reset {
        ResetValue::Value(value) => u8::from(value & 1 == 1),
        ResetValue::Undefined | ResetValue::MemoryBacked => 0,
    }
}

fn shifted(value: u128, position: usize) -> u128 {
    u32::try_from(position)
        .ok()
        .and_then(|shift| value.checked_shl(shift))
        .unwrap_or(0)
}

fn access_for(behavior: AccessBehavior) -> AccessCode {
    if behavior.w1c {
        AccessCode::W1c
    } else if behavior.clr_only {
        AccessCode::Wc
    } else if behavior.set_only {
        AccessCode::Ws
    } else {
        match (behavior.readable, behavior.writable) {
            (true, false) => AccessCode::Ro,
            (false, true) => AccessCode::Wo,
            _ => AccessCode::Rw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Bit, BitOptions, ResetValue, WriteOptions};
    use crate::{AccessCode, FeatureGate, RegisterError, Ungated};

    struct Enabled(&'static [&'static str]);

    impl FeatureGate for Enabled {
        fn has_feature(&self, feature: &str) -> bool {
            self.0.contains(&feature)
        }
    }

    fn bit(options: &BitOptions) -> Bit {
        Bit::new(3, options).expect("valid bit options")
    }

    #[test]
    fn access_code_and_explicit_flags_are_exclusive() {
        let options = BitOptions::new().access(AccessCode::Ro).writable(false);
        assert_eq!(
            Bit::new(2, &options),
            Err(RegisterError::ConfigurationConflict {
                position: 2,
                flag: "writable"
            })
        );
    }

    #[test]
    fn explicit_flags_derive_an_access_code() {
        assert_eq!(bit(&BitOptions::new().writable(false)).access(), AccessCode::Ro);
        assert_eq!(bit(&BitOptions::new().readable(false)).access(), AccessCode::Wo);
        assert_eq!(bit(&BitOptions::new().set_only(true)).access(), AccessCode::Ws);
        assert_eq!(bit(&BitOptions::new()).access(), AccessCode::Rw);
    }

    #[test]
    fn writes_are_masked_to_one_bit_and_mark_dirty() {
        let mut b = bit(&BitOptions::new());
        b.write(0b10, WriteOptions::default(), &Ungated);
        assert_eq!(b.data(), 0);
        assert!(!b.update_required());

        b.write(0b11, WriteOptions::default(), &Ungated);
        assert_eq!(b.data(), 1);
        assert!(b.update_required());
    }

    #[test]
    fn read_only_bits_ignore_unforced_writes() {
        let mut b = bit(&BitOptions::new().access(AccessCode::Ro));
        b.write(1, WriteOptions::default(), &Ungated);
        assert_eq!(b.data(), 0);

        b.write(1, WriteOptions::forced(), &Ungated);
        assert_eq!(b.data(), 1);
    }

    #[test]
    fn set_only_bit_ignores_clearing_unless_forced() {
        let mut b = bit(&BitOptions::new().access(AccessCode::Ws));
        b.write(1, WriteOptions::default(), &Ungated);
        assert_eq!(b.data(), 1);

        b.write(0, WriteOptions::default(), &Ungated);
        assert_eq!(b.data(), 1);

        b.write(0, WriteOptions::forced(), &Ungated);
        assert_eq!(b.data(), 0);
    }

    #[test]
    fn clear_only_bit_ignores_setting_unless_forced() {
        let mut b = bit(&BitOptions::new().access(AccessCode::Wc).reset(1));
        b.write(1, WriteOptions::default(), &Ungated);
        b.write(0, WriteOptions::default(), &Ungated);
        assert_eq!(b.data(), 0);

        b.write(1, WriteOptions::default(), &Ungated);
        assert_eq!(b.data(), 0);

        b.write(1, WriteOptions::forced(), &Ungated);
        assert_eq!(b.data(), 1);
    }

    #[test]
    fn feature_constrained_bit_is_writable_only_while_enabled() {
        let mut b = bit(&BitOptions::new().feature("turbo"));
        b.write(1, WriteOptions::default(), &Enabled(&[]));
        assert_eq!(b.data(), 0);
        assert!(!b.is_enabled(&Enabled(&[])));

        b.write(1, WriteOptions::default(), &Enabled(&["turbo"]));
        assert_eq!(b.data(), 1);
    }

    #[test]
    fn feature_lists_require_every_feature() {
        let b = bit(&BitOptions::new().feature(vec!["a", "b"]));
        assert!(!b.is_enabled(&Enabled(&["a"])));
        assert!(b.is_enabled(&Enabled(&["a", "b"])));
        assert!(b.has_feature_constraint(None));
        assert!(b.has_feature_constraint(Some("b")));
        assert!(!b.has_feature_constraint(Some("c")));
        assert!(bit(&BitOptions::new()).is_enabled(&Ungated));
    }

    #[test]
    fn sentinel_reset_is_unknown_until_written() {
        let mut b = bit(&BitOptions::new().reset(ResetValue::Undefined));
        assert!(!b.has_known_value());
        assert_eq!(b.data(), 0);

        b.write(0, WriteOptions::default(), &Ungated);
        assert!(b.has_known_value());

        b.reset();
        assert!(!b.has_known_value());
    }

    #[test]
    fn forced_read_establishes_a_known_value() {
        let mut b = bit(&BitOptions::new().reset(ResetValue::MemoryBacked));
        b.read(Some(1));
        assert!(b.has_known_value());
        assert_eq!(b.data(), 1);
        assert!(b.is_to_be_read());
    }

    #[test]
    fn plain_read_honors_read_data_matches_write() {
        let mut tagged = bit(&BitOptions::new());
        tagged.read(None);
        assert!(tagged.is_to_be_read());

        let mut untagged = bit(&BitOptions::new().read_data_matches_write(false));
        untagged.read(None);
        assert!(!untagged.is_to_be_read());
        untagged.read(Some(0));
        assert!(untagged.is_to_be_read());

        let mut write_only = bit(&BitOptions::new().access(AccessCode::Wo));
        write_only.read(None);
        assert!(!write_only.is_to_be_read());
    }

    #[test]
    fn clear_flags_respects_sticky_policy() {
        let mut defaults = bit(&BitOptions::new());
        defaults.overlay("ov").store().read(None);
        defaults.write(1, WriteOptions::default(), &Ungated);
        defaults.clear_flags();
        assert!(defaults.has_overlay(Some("ov")));
        assert!(!defaults.is_to_be_stored());
        assert!(!defaults.is_to_be_read());
        assert!(!defaults.update_required());

        let mut inverted = bit(&BitOptions::new().sticky_overlay(false).sticky_store(true));
        inverted.overlay("ov").store();
        inverted.clear_flags();
        assert!(!inverted.has_overlay(None));
        assert!(inverted.is_to_be_stored());
    }

    #[test]
    fn reset_restores_value_and_clears_flags() {
        let mut b = bit(&BitOptions::new().reset(1));
        b.write(0, WriteOptions::default(), &Ungated);
        b.read(None);
        b.reset();
        assert_eq!(b.data(), 1);
        assert!(!b.is_to_be_read());
        assert!(!b.update_required());
    }

    #[test]
    fn reset_value_contributes_only_its_low_bit() {
        assert_eq!(bit(&BitOptions::new().reset(0b10)).data(), 0);
        assert_eq!(bit(&BitOptions::new().reset(0b11)).data(), 1);
        assert_eq!(bit(&BitOptions::new().reset(u128::MAX - 1)).data(), 0);
    }

    #[test]
    fn positional_helpers_shift_by_position() {
        let mut b = bit(&BitOptions::new());
        assert_eq!(b.mask(), 0b1000);
        assert_eq!(b.setting(3), 0b1000);
        assert_eq!(b.data_in_position(), 0);
        b.write(1, WriteOptions::default(), &Ungated);
        assert_eq!(b.data_in_position(), 0b1000);
    }

    #[test]
    fn w1c_and_start_helpers_only_touch_flagged_bits() {
        let mut w1c = bit(&BitOptions::new().access(AccessCode::W1c).reset(1));
        w1c.clear_w1c();
        assert_eq!(w1c.data(), 0);

        let mut plain = bit(&BitOptions::new().reset(1));
        plain.clear_w1c().clear_start();
        assert_eq!(plain.data(), 1);

        let mut start = bit(&BitOptions::new().start(true).reset(1));
        start.clear_start();
        assert_eq!(start.data(), 0);
    }

    #[test]
    fn set_access_rederives_behavior() {
        let mut b = bit(&BitOptions::new());
        b.set_access(AccessCode::Worz);
        assert!(!b.is_readable());
        assert!(b.is_writable_by_access());

        b.set_access(AccessCode::W1c);
        assert!(b.is_w1c());
        assert!(b.is_readable());
    }

    #[test]
    fn write_with_overlay_applies_both() {
        let mut b = bit(&BitOptions::new());
        b.write_with_overlay(1, "pin_data", WriteOptions::default(), &Ungated);
        assert_eq!(b.data(), 1);
        assert_eq!(b.overlay_name(), Some("pin_data"));
    }

    #[test]
    fn placeholders_are_unwritable_and_read_as_reset() {
        let mut b = Bit::placeholder(5, false, ResetValue::Value(0));
        assert!(b.is_placeholder());
        b.write(1, WriteOptions::default(), &Ungated);
        assert_eq!(b.data(), 0);
        assert!(b.has_known_value());
    }
}
