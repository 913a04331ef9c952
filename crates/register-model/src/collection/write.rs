use std::ops::{Deref, DerefMut};

use super::{nth_bit, BitCollection};
use crate::{
    AccessCode, Bit, FeatureGate, Operation, Register, RegisterError, RegisterResult,
    TransactionOptions, WriteOptions,
};

/// Options for a collection read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReadOptions {
    /// Significance-ordered mask; bits where the mask is 0 have their read
    /// flag cleared instead of set.
    pub mask: Option<u128>,
}

impl ReadOptions {
    /// Read only the bits set in `mask`.
    #[must_use]
    pub const fn masked(mask: u128) -> Self {
        Self { mask: Some(mask) }
    }
}

/// Source of a bulk copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    /// Bits to mirror, least significant first.
    Bits(Vec<Bit>),
    /// Plain value; written with force, then every flag is cleared.
    Value(u128),
}

impl From<u128> for CopySource {
    fn from(value: u128) -> Self {
        Self::Value(value)
    }
}

impl From<&[Bit]> for CopySource {
    fn from(bits: &[Bit]) -> Self {
        Self::Bits(bits.to_vec())
    }
}

impl From<Vec<Bit>> for CopySource {
    fn from(bits: Vec<Bit>) -> Self {
        Self::Bits(bits)
    }
}

impl<R: Deref<Target = Register>> From<&BitCollection<R>> for CopySource {
    fn from(collection: &BitCollection<R>) -> Self {
        Self::Bits(collection.to_bits())
    }
}

impl<R: DerefMut<Target = Register>> BitCollection<R> {
    /// Applies `apply` to each bit with its significance index.
    fn for_each_bit(&mut self, mut apply: impl FnMut(&mut Bit, usize, &dyn FeatureGate)) {
        let (bits, gate) = self.register.split_mut();
        for (i, &position) in self.positions.iter().enumerate() {
            apply(&mut bits[position], i, gate);
        }
    }

    /// Writes `value` bit by bit, honoring each bit's access policy.
    pub fn write(&mut self, value: u128) -> &mut Self {
        self.write_with(value, WriteOptions::default())
    }

    /// Writes `value` bit by bit.
    pub fn write_with(&mut self, value: u128, options: WriteOptions) -> &mut Self {
        self.for_each_bit(|bit, i, gate| {
            bit.write(nth_bit(value, i), options, gate);
        });
        self
    }

    /// Tags the bits for read, optionally force-writing an expected value.
    pub fn read(&mut self, value: Option<u128>) -> &mut Self {
        self.read_with(value, ReadOptions::default())
    }

    /// Tags the bits for read; bits outside `options.mask` are untagged.
    pub fn read_with(&mut self, value: Option<u128>, options: ReadOptions) -> &mut Self {
        if let Some(value) = value {
            self.write_with(value, WriteOptions::forced());
        }
        self.for_each_bit(|bit, i, _| {
            if options.mask.is_some_and(|mask| nth_bit(mask, i) == 0) {
                bit.clear_read_flag();
            } else {
                bit.read(value.map(|v| nth_bit(v, i)));
            }
        });
        self
    }

    /// Writes locally, then asks the register's hierarchy to perform a write
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MissingHandler`] when nothing handles writes.
    pub fn write_request(
        &mut self,
        value: Option<u128>,
        options: &TransactionOptions,
    ) -> RegisterResult<&mut Self> {
        if let Some(value) = value {
            self.write(value);
        }
        self.register.request(Operation::Write, options)?;
        Ok(self)
    }

    /// Reads locally, then asks the register's hierarchy to perform a read
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MissingHandler`] when nothing handles reads.
    pub fn read_request(
        &mut self,
        value: Option<u128>,
        options: &TransactionOptions,
    ) -> RegisterResult<&mut Self> {
        self.read(value);
        self.register.request(Operation::Read, options)?;
        Ok(self)
    }

    /// Tags the bits for store, then performs a read transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MissingHandler`] when nothing handles reads.
    pub fn store_request(&mut self, options: &TransactionOptions) -> RegisterResult<&mut Self> {
        self.store();
        self.read_request(None, options)
    }

    /// Resets every bit.
    pub fn reset(&mut self) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.reset();
        });
        self
    }

    /// Clears transient flags on every bit.
    pub fn clear_flags(&mut self) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.clear_flags();
        });
        self
    }

    /// Clears only the read flags.
    pub fn clear_read_flag(&mut self) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.clear_read_flag();
        });
        self
    }

    /// Tags every bit with an overlay.
    pub fn overlay(&mut self, name: &str) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.overlay(name);
        });
        self
    }

    /// Removes overlays regardless of stickiness.
    pub fn clear_overlay(&mut self) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.clear_overlay();
        });
        self
    }

    /// Tags every bit for store.
    pub fn store(&mut self) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.store();
        });
        self
    }

    /// Sets whether overlays survive a flag clear.
    pub fn sticky_overlay(&mut self, sticky: bool) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.set_sticky_overlay(sticky);
        });
        self
    }

    /// Sets whether store flags survive a flag clear.
    pub fn sticky_store(&mut self, sticky: bool) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.set_sticky_store(sticky);
        });
        self
    }

    /// Assigns one access code to every bit.
    pub fn set_access(&mut self, access: AccessCode) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.set_access(access);
        });
        self
    }

    /// Clears set write-one-to-clear bits.
    pub fn clear_w1c(&mut self) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.clear_w1c();
        });
        self
    }

    /// Clears set start bits.
    pub fn clear_start(&mut self) -> &mut Self {
        self.for_each_bit(|bit, _, _| {
            bit.clear_start();
        });
        self
    }

    /// Shifts the value one place toward the most significant end.
    ///
    /// The vacated least significant bit takes `fill`; returns the bit shifted
    /// out of the top.
    pub fn shift_left(&mut self, fill: u8) -> u8 {
        let old: Vec<u8> = self.shift_out_right().map(Bit::data).collect();
        let out = old.last().copied().unwrap_or(0);
        self.for_each_bit(|bit, i, gate| {
            let next = if i == 0 { fill } else { old[i - 1] };
            bit.write(next, WriteOptions::default(), gate);
        });
        out
    }

    /// Shifts the value one place toward the least significant end.
    ///
    /// The vacated most significant bit takes `fill`; returns the bit shifted
    /// out of the bottom.
    pub fn shift_right(&mut self, fill: u8) -> u8 {
        let old: Vec<u8> = self.shift_out_right().map(Bit::data).collect();
        let out = old.first().copied().unwrap_or(0);
        self.for_each_bit(|bit, i, gate| {
            let next = old.get(i + 1).copied().unwrap_or(fill);
            bit.write(next, WriteOptions::default(), gate);
        });
        out
    }

    /// Copies another set of bits, or a plain value, into this view.
    ///
    /// Bit sources must match in width and are mirrored bit for bit: overlay,
    /// data, read and store flags. A plain value is force-written and all flags
    /// are cleared.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MismatchedSize`] when a bit source differs in
    /// width.
    pub fn copy_all(&mut self, source: impl Into<CopySource>) -> RegisterResult<&mut Self> {
        match source.into() {
            CopySource::Bits(bits) => {
                if bits.len() != self.len() {
                    return Err(RegisterError::MismatchedSize {
                        target_size: self.len(),
                        source_size: bits.len(),
                    });
                }
                self.for_each_bit(|bit, i, _| bit.mirror(&bits[i]));
            }
            CopySource::Value(value) => {
                self.write_with(value, WriteOptions::forced());
                self.clear_flags();
            }
        }
        Ok(self)
    }

    /// Removes the fields this view was built from, reverting their bits to
    /// placeholders. Returns the names that were removed.
    pub fn delete(mut self) -> Vec<String> {
        let names = std::mem::take(&mut self.names);
        self.register.delete_bit(&names)
    }
}
