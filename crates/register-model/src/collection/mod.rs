//! Ordered views over a register's bits.
//!
//! A collection stores physical positions in significance order: index 0 is
//! the least significant bit of the collection's value. `bit_order` only
//! changes how labels map onto that order, so arithmetic results never depend
//! on it.

/// Status strings and overlay runs.
pub mod status;
/// Mutating operations and transaction requests.
pub mod write;

pub use status::OverlayRun;
pub use write::{CopySource, ReadOptions};

use std::collections::BTreeSet;
use std::ops::{Deref, Range, RangeInclusive};

use crate::{AccessCode, Bit, Register, RegisterError, RegisterResult};

/// Bit numbering convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BitOrder {
    /// Label 0 is the least significant bit.
    #[default]
    Lsb0,
    /// Label 0 is the most significant bit.
    Msb0,
}

impl BitOrder {
    /// Maps a label to a significance index in a run of `len` bits.
    #[must_use]
    pub const fn significance(self, label: usize, len: usize) -> Option<usize> {
        if label >= len {
            return None;
        }
        Some(match self {
            Self::Lsb0 => label,
            Self::Msb0 => len - 1 - label,
        })
    }

    /// Maps a significance index to a label in a run of `len` bits.
    ///
    /// The mapping is its own inverse.
    #[must_use]
    pub const fn label(self, significance: usize, len: usize) -> Option<usize> {
        self.significance(significance, len)
    }
}

/// Positional selector: one label, or an inclusive label range given in
/// either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitIndex {
    /// Single label.
    At(usize),
    /// Inclusive range; `Span(7, 4)` and `Span(4, 7)` select the same bits.
    Span(usize, usize),
    /// Selects nothing; produced by an empty exclusive range.
    Empty,
}

impl BitIndex {
    /// Labels selected, ascending.
    #[must_use]
    pub fn labels(self) -> Range<usize> {
        match self {
            Self::At(label) => label..label.saturating_add(1),
            Self::Span(a, b) => a.min(b)..a.max(b).saturating_add(1),
            Self::Empty => 0..0,
        }
    }
}

impl From<usize> for BitIndex {
    fn from(label: usize) -> Self {
        Self::At(label)
    }
}

impl From<RangeInclusive<usize>> for BitIndex {
    fn from(range: RangeInclusive<usize>) -> Self {
        Self::Span(*range.start(), *range.end())
    }
}

impl From<Range<usize>> for BitIndex {
    fn from(range: Range<usize>) -> Self {
        if range.is_empty() {
            Self::Empty
        } else {
            Self::Span(range.start, range.end - 1)
        }
    }
}

/// Ordered view over bits of one register.
///
/// Generic over the register reference: [`Bits`] borrows shared and only
/// inspects, [`BitsMut`] borrows exclusively and can also write.
#[derive(Debug, Clone)]
pub struct BitCollection<R> {
    register: R,
    positions: Vec<usize>,
    names: Vec<String>,
    bit_order: BitOrder,
}

/// Read-only view.
pub type Bits<'a> = BitCollection<&'a Register>;

/// Read-write view.
pub type BitsMut<'a> = BitCollection<&'a mut Register>;

impl<R> BitCollection<R> {
    pub(crate) const fn new(
        register: R,
        positions: Vec<usize>,
        names: Vec<String>,
        bit_order: BitOrder,
    ) -> Self {
        Self {
            register,
            positions,
            names,
            bit_order,
        }
    }

    /// Number of bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` for an empty view.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Physical register positions, least significant first.
    #[must_use]
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Field names the view was built from.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Field name when the view was built from exactly one field.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self.names.as_slice() {
            [name] => Some(name),
            _ => None,
        }
    }

    /// Numbering convention used for labels.
    #[must_use]
    pub const fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    /// Relabels the view with label 0 as the least significant bit.
    #[must_use]
    pub fn with_lsb0(mut self) -> Self {
        self.bit_order = BitOrder::Lsb0;
        self
    }

    /// Relabels the view with label 0 as the most significant bit.
    #[must_use]
    pub fn with_msb0(mut self) -> Self {
        self.bit_order = BitOrder::Msb0;
        self
    }

    /// Narrows the view to the selected labels.
    ///
    /// Labels are de-duplicated and out-of-range labels are dropped; the
    /// result keeps significance order. Returns `None` when nothing remains.
    #[must_use]
    pub fn select<I>(self, indices: impl IntoIterator<Item = I>) -> Option<Self>
    where
        I: Into<BitIndex>,
    {
        let len = self.positions.len();
        let chosen: BTreeSet<usize> = indices
            .into_iter()
            .flat_map(|index| index.into().labels())
            .filter_map(|label| self.bit_order.significance(label, len))
            .collect();
        if chosen.is_empty() {
            return None;
        }
        let positions = chosen.into_iter().map(|i| self.positions[i]).collect();
        Some(Self {
            positions,
            ..self
        })
    }
}

impl<R: Deref<Target = Register>> BitCollection<R> {
    fn bit_at(&self, significance: usize) -> &Bit {
        &self.register.physical_bits()[self.positions[significance]]
    }

    /// Owning register.
    #[must_use]
    pub fn register(&self) -> &Register {
        &self.register
    }

    /// Bits from most to least significant.
    pub fn shift_out_left(&self) -> impl Iterator<Item = &Bit> + '_ {
        let bits = self.register.physical_bits();
        self.positions.iter().rev().map(move |&p| &bits[p])
    }

    /// Bits from least to most significant.
    pub fn shift_out_right(&self) -> impl Iterator<Item = &Bit> + '_ {
        let bits = self.register.physical_bits();
        self.positions.iter().map(move |&p| &bits[p])
    }

    /// Bits from most to least significant, paired with their label.
    ///
    /// Under lsb0 the labels count down; under msb0 they count up.
    pub fn shift_out_left_with_index(&self) -> impl Iterator<Item = (&Bit, usize)> + '_ {
        let len = self.len();
        let order = self.bit_order;
        self.reverse_shift_out_with_index()
            .map(move |(bit, i)| (bit, order.label(i, len).unwrap_or(i)))
    }

    /// Bits from least to most significant, paired with their significance.
    pub fn shift_out_with_index(&self) -> impl Iterator<Item = (&Bit, usize)> + '_ {
        self.shift_out_right().enumerate().map(|(i, bit)| (bit, i))
    }

    /// Bits from most to least significant, paired with their significance.
    pub fn reverse_shift_out_with_index(&self) -> impl Iterator<Item = (&Bit, usize)> + '_ {
        let len = self.len();
        self.shift_out_left()
            .enumerate()
            .map(move |(i, bit)| (bit, len - 1 - i))
    }

    /// Bit at `label`, read in this view's bit order.
    #[must_use]
    pub fn bit(&self, label: usize) -> Option<&Bit> {
        self.bit_order
            .significance(label, self.len())
            .map(|i| self.bit_at(i))
    }

    /// The single bit of a one-bit view.
    #[must_use]
    pub fn only(&self) -> Option<&Bit> {
        match self.positions.as_slice() {
            [position] => self.register.physical_bits().get(*position),
            _ => None,
        }
    }

    /// Owned copies of the bits, least significant first.
    #[must_use]
    pub fn to_bits(&self) -> Vec<Bit> {
        self.shift_out_right().cloned().collect()
    }

    /// Aggregate value, or `None` when any bit lacks a known value.
    #[must_use]
    pub fn data(&self) -> Option<u128> {
        self.shift_out_with_index()
            .try_fold(0_u128, |acc, (bit, i)| {
                bit.has_known_value()
                    .then_some(acc | (u128::from(bit.data()) << i))
            })
    }

    /// Bitwise complement of [`BitCollection::data`] within the view width.
    #[must_use]
    pub fn data_b(&self) -> Option<u128> {
        self.data().map(|data| !data & self.width_mask())
    }

    /// Aggregate value with the bit order reversed.
    #[must_use]
    pub fn data_reverse(&self) -> Option<u128> {
        self.shift_out_left()
            .enumerate()
            .try_fold(0_u128, |acc, (i, bit)| {
                bit.has_known_value()
                    .then_some(acc | (u128::from(bit.data()) << i))
            })
    }

    /// Aggregate reset value, or `None` when any bit resets to a sentinel.
    #[must_use]
    pub fn reset_data(&self) -> Option<u128> {
        self.shift_out_with_index()
            .try_fold(0_u128, |acc, (bit, i)| {
                bit.reset_value().known().map(|v| acc | ((v & 1) << i))
            })
    }

    /// Returns `true` when every bit has a known value.
    #[must_use]
    pub fn has_known_value(&self) -> bool {
        self.shift_out_right().all(Bit::has_known_value)
    }

    /// Register-positional mask of the view.
    #[must_use]
    pub fn mask(&self) -> u128 {
        self.shift_out_right().fold(0, |acc, bit| acc | bit.mask())
    }

    /// Places `value` at the view's register positions.
    #[must_use]
    pub fn setting(&self, value: u128) -> u128 {
        self.shift_out_with_index().fold(0, |acc, (bit, i)| {
            acc | bit.setting(nth_bit(value, i))
        })
    }

    /// Current data at the view's register positions.
    #[must_use]
    pub fn data_in_position(&self) -> u128 {
        self.shift_out_right()
            .fold(0, |acc, bit| acc | bit.data_in_position())
    }

    /// Returns `true` when any bit is tagged for read.
    #[must_use]
    pub fn is_to_be_read(&self) -> bool {
        self.shift_out_right().any(Bit::is_to_be_read)
    }

    /// Returns `true` when any bit is tagged for store.
    #[must_use]
    pub fn is_to_be_stored(&self) -> bool {
        self.shift_out_right().any(Bit::is_to_be_stored)
    }

    /// Returns `true` when any bit changed since its flags were cleared.
    #[must_use]
    pub fn update_required(&self) -> bool {
        self.shift_out_right().any(Bit::update_required)
    }

    /// Returns `true` when any bit participates in reads.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.shift_out_right().any(Bit::is_readable)
    }

    /// Returns `true` when any bit currently accepts unforced writes.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        let gate = self.register.gate();
        self.shift_out_right().any(|bit| bit.is_writable(gate))
    }

    /// Access code of the least significant bit.
    #[must_use]
    pub fn access(&self) -> Option<AccessCode> {
        self.shift_out_right().next().map(Bit::access)
    }

    /// Access code shared by every bit.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MixedAccess`] when the bits disagree.
    pub fn access_strict(&self) -> RegisterResult<AccessCode> {
        let mut codes: Vec<AccessCode> = Vec::new();
        for bit in self.shift_out_right() {
            if !codes.contains(&bit.access()) {
                codes.push(bit.access());
            }
        }
        match codes.as_slice() {
            [code] => Ok(*code),
            _ => Err(RegisterError::MixedAccess {
                register: self.register.name().to_owned(),
                codes,
            }),
        }
    }

    /// Returns `true` when every bit is enabled by the register's hierarchy.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        let gate = self.register.gate();
        self.shift_out_right().all(|bit| bit.is_enabled(gate))
    }

    /// Returns `true` when any bit carries the feature constraint in question.
    #[must_use]
    pub fn has_feature_constraint(&self, name: Option<&str>) -> bool {
        self.shift_out_right()
            .any(|bit| bit.has_feature_constraint(name))
    }

    fn width_mask(&self) -> u128 {
        width_mask(self.len())
    }
}

pub(crate) fn width_mask(width: usize) -> u128 {
    u32::try_from(width)
        .ok()
        .and_then(|w| 1_u128.checked_shl(w))
        .map_or(u128::MAX, |top| top - 1)
}

pub(crate) fn nth_bit(value: u128, index: usize) -> u8 {
    u32::try_from(index)
        .ok()
        .and_then(|shift| value.checked_shr(shift))
        .map_or(0, |v| u8::from(v & 1 == 1))
}

#[cfg(test)]
mod tests {
    use super::{width_mask, BitIndex, BitOrder};
    use crate::{AccessCode, BitOptions, Register, RegisterError, RegisterOptions};

    fn ctrl() -> Register {
        let mut reg = Register::new("ctrl", 0x10, RegisterOptions::new().size(8))
            .expect("valid register");
        reg.add_bus("upper", 4, 4, BitOptions::new().reset(0xA))
            .expect("upper fits");
        reg.add_bus("lower", 0, 4, BitOptions::new().reset(0x5).access(AccessCode::Ro))
            .expect("lower fits");
        reg
    }

    #[test]
    fn labels_map_through_bit_order() {
        assert_eq!(BitOrder::Lsb0.significance(1, 8), Some(1));
        assert_eq!(BitOrder::Msb0.significance(1, 8), Some(6));
        assert_eq!(BitOrder::Msb0.significance(8, 8), None);
    }

    #[test]
    fn descending_spans_are_normalized() {
        assert_eq!(BitIndex::from(7..=4).labels(), 4..8);
        assert_eq!(BitIndex::from(4..8).labels(), 4..8);
        assert_eq!(BitIndex::from(3).labels(), 3..4);
    }

    #[test]
    fn empty_exclusive_ranges_select_nothing() {
        assert_eq!(BitIndex::from(3..3), BitIndex::Empty);
        assert_eq!(BitIndex::from(7..4), BitIndex::Empty);
        assert_eq!(BitIndex::from(3..3).labels().count(), 0);
        let reg = ctrl();
        assert!(reg.all().select([3..3]).is_none());
    }

    #[test]
    fn width_mask_saturates_at_value_width() {
        assert_eq!(width_mask(4), 0xF);
        assert_eq!(width_mask(128), u128::MAX);
    }

    #[test]
    fn traversal_yields_most_significant_first() {
        let reg = ctrl();
        let all = reg.all();
        let left: Vec<u8> = all.shift_out_left().map(|b| b.data()).collect();
        assert_eq!(left, [1, 0, 1, 0, 0, 1, 0, 1]);

        let labels: Vec<usize> = all.shift_out_left_with_index().map(|(_, i)| i).collect();
        assert_eq!(labels, [7, 6, 5, 4, 3, 2, 1, 0]);

        let msb0: Vec<usize> = reg
            .all()
            .with_msb0()
            .shift_out_left_with_index()
            .map(|(_, i)| i)
            .collect();
        assert_eq!(msb0, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn aggregate_values_follow_significance() {
        let reg = ctrl();
        let all = reg.all();
        assert_eq!(all.data(), Some(0xA5));
        assert_eq!(all.data_b(), Some(0x5A));
        assert_eq!(all.data_reverse(), Some(0xA5));
        assert_eq!(all.reset_data(), Some(0xA5));
        assert_eq!(all.with_msb0().data(), Some(0xA5));
    }

    #[test]
    fn positional_helpers_use_register_positions() {
        let reg = ctrl();
        let upper = reg.field("upper").expect("declared");
        assert_eq!(upper.mask(), 0xF0);
        assert_eq!(upper.setting(0x3), 0x30);
        assert_eq!(upper.data_in_position(), 0xA0);
    }

    #[test]
    fn selection_deduplicates_and_sorts() {
        let reg = ctrl();
        let picked = reg
            .all()
            .select([BitIndex::from(5..=4), BitIndex::At(4), BitIndex::At(0)])
            .expect("non-empty selection");
        assert_eq!(picked.positions(), [0, 4, 5]);
        assert_eq!(picked.data(), Some(0b101));
        assert!(reg.all().select([BitIndex::At(20)]).is_none());
    }

    #[test]
    fn single_bit_views_unwrap_with_only() {
        let reg = ctrl();
        let bit = reg.all().select([7_usize]).expect("in range");
        assert_eq!(bit.only().map(|b| b.position()), Some(7));
        assert!(reg.all().only().is_none());
        assert_eq!(reg.all().with_msb0().bit(0).map(|b| b.position()), Some(7));
    }

    #[test]
    fn strict_access_requires_agreement() {
        let reg = ctrl();
        assert_eq!(
            reg.field("lower").expect("declared").access_strict(),
            Ok(AccessCode::Ro)
        );
        assert!(matches!(
            reg.all().access_strict(),
            Err(RegisterError::MixedAccess { .. })
        ));
        assert_eq!(reg.all().access(), Some(AccessCode::Ro));
    }

    #[test]
    fn flag_queries_aggregate_with_any() {
        let reg = ctrl();
        let all = reg.all();
        assert!(all.is_readable());
        assert!(all.is_writable());
        assert!(!all.is_to_be_read());
        assert!(all.is_enabled());
        assert!(!all.has_feature_constraint(None));
    }
}
