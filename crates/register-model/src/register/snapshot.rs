use std::collections::BTreeMap;

use super::{FieldFragment, Register, RegisterOptions};
use crate::{
    AccessCode, Bit, BitOrder, FeatureConstraint, Metadata, RegisterError, RegisterResult,
    ResetValue,
};

/// Plain-data description of a register: geometry, field table, and the
/// full state of every bit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterSnapshot {
    /// Register name.
    pub name: String,
    /// Unresolved offset.
    pub offset: u64,
    /// Width in bits.
    pub size: usize,
    /// Bit numbering convention.
    pub bit_order: BitOrder,
    /// Default field access.
    pub access: AccessCode,
    /// Placeholder reset value.
    pub reset: ResetValue,
    /// Whether placeholders accept writes.
    pub init_as_writable: bool,
    /// Register-level feature constraint.
    pub feature: FeatureConstraint,
    /// Register metadata.
    pub metadata: Metadata,
    /// Field table; fragment positions are physical.
    pub fields: BTreeMap<String, Vec<FieldFragment>>,
    /// Bits indexed by physical position.
    pub bits: Vec<Bit>,
}

impl Register {
    /// Captures the register's state.
    #[must_use]
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            name: self.name.clone(),
            offset: self.offset,
            size: self.size,
            bit_order: self.bit_order,
            access: self.access,
            reset: self.reset,
            init_as_writable: self.init_as_writable,
            feature: self.feature.clone(),
            metadata: self.metadata.clone(),
            fields: self.fields.clone(),
            bits: self.bits.clone(),
        }
    }

    /// Rebuilds a register from a snapshot, attaching it to the hierarchy
    /// and context in `options`. Geometry, feature constraint and state come
    /// from the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MismatchedSize`] when the bit list does not
    /// cover the width position by position, [`RegisterError::FieldOutOfRange`]
    /// when a field leaves the register, and [`RegisterError::InvalidSize`]
    /// for an unsupported width.
    pub fn from_snapshot(
        snapshot: RegisterSnapshot,
        options: RegisterOptions,
    ) -> RegisterResult<Self> {
        let RegisterSnapshot {
            name,
            offset,
            size,
            bit_order,
            access,
            reset,
            init_as_writable,
            feature,
            metadata,
            fields,
            bits,
        } = snapshot;
        let misplaced = bits.iter().enumerate().any(|(i, bit)| bit.position() != i);
        if bits.len() != size || misplaced {
            return Err(RegisterError::MismatchedSize {
                target_size: size,
                source_size: bits.len(),
            });
        }
        if let Some((field, fragment)) = fields.iter().find_map(|(field, fragments)| {
            fragments
                .iter()
                .find(|f| {
                    f.width == 0
                        || !matches!(f.position.checked_add(f.width), Some(end) if end <= size)
                })
                .map(|f| (field, f))
        }) {
            return Err(RegisterError::FieldOutOfRange {
                name: field.clone(),
                position: fragment.position,
                width: fragment.width,
                size,
            });
        }

        let mut register = Self::new(
            name,
            offset,
            options
                .size(size)
                .bit_order(bit_order)
                .access(access)
                .reset(reset)
                .init_as_writable(init_as_writable)
                .feature(feature),
        )?;
        register.metadata = metadata;
        register.fields = fields;
        register.bits = bits;
        Ok(register)
    }
}
