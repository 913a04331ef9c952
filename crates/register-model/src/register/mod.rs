//! Register container: bit storage, field table, and hierarchy links.

/// Base address resolution and transaction dispatch.
pub mod address;
/// Field and position lookup.
pub mod lookup;
/// Serializable register description.
pub mod snapshot;

pub use address::AddressOptions;
pub use lookup::{FeatureFilter, NamedBits, Selector};
pub use snapshot::RegisterSnapshot;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use log::{debug, warn};

use crate::{
    ancestors, merge_metadata, AccessCode, Bit, BitOptions, BitOrder, Context, FeatureConstraint,
    FeatureGate, MetaValue, Metadata, Operation, Owner, RegisterError, RegisterResult, ResetValue,
    TransactionOptions,
};

/// Widest register the model can hold in one value.
pub const MAX_REGISTER_SIZE: usize = u128::BITS as usize;

/// One contiguous run of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FieldFragment {
    /// Lowest position of the run.
    pub position: usize,
    /// Number of bits in the run.
    pub width: usize,
}

impl FieldFragment {
    /// Creates a fragment.
    #[must_use]
    pub const fn new(position: usize, width: usize) -> Self {
        Self { position, width }
    }

    /// Positions covered, ascending.
    pub fn positions(self) -> std::ops::Range<usize> {
        self.position..self.position + self.width
    }
}

/// Construction options for a [`Register`].
#[derive(Debug, Clone)]
pub struct RegisterOptions {
    size: usize,
    bit_order: BitOrder,
    reset: ResetValue,
    access: AccessCode,
    feature: FeatureConstraint,
    init_as_writable: bool,
    meta: Metadata,
    owner: Option<Rc<dyn Owner>>,
    context: Context,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            size: 32,
            bit_order: BitOrder::Lsb0,
            reset: ResetValue::Value(0),
            access: AccessCode::Rw,
            feature: FeatureConstraint::None,
            init_as_writable: false,
            meta: Metadata::new(),
            owner: None,
            context: Context::default(),
        }
    }
}

impl RegisterOptions {
    /// 32-bit lsb0 register with no owner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Width in bits.
    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Bit numbering used for positions given to this register.
    #[must_use]
    pub fn bit_order(mut self, bit_order: BitOrder) -> Self {
        self.bit_order = bit_order;
        self
    }

    /// Reset value of bits outside any field.
    #[must_use]
    pub fn reset(mut self, reset: impl Into<ResetValue>) -> Self {
        self.reset = reset.into();
        self
    }

    /// Access applied to fields declared without access configuration.
    #[must_use]
    pub fn access(mut self, access: AccessCode) -> Self {
        self.access = access;
        self
    }

    /// Feature constraint on the register as a whole.
    #[must_use]
    pub fn feature(mut self, feature: impl Into<FeatureConstraint>) -> Self {
        self.feature = feature.into();
        self
    }

    /// Whether bits outside any field accept writes.
    #[must_use]
    pub fn init_as_writable(mut self, writable: bool) -> Self {
        self.init_as_writable = writable;
        self
    }

    /// Free-form register metadata entry.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Owning object in the hierarchy.
    #[must_use]
    pub fn owner(mut self, owner: Rc<dyn Owner>) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Shared configuration.
    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

/// A register's links outward: owner chain plus shared context.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    owner: Option<Rc<dyn Owner>>,
    context: Context,
}

impl Hierarchy {
    /// Direct owner.
    #[must_use]
    pub fn owner(&self) -> Option<Rc<dyn Owner>> {
        self.owner.clone()
    }

    /// Shared configuration.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    fn class_name(&self) -> Option<&str> {
        self.owner.as_deref().map(|owner| owner.class_name())
    }
}

impl FeatureGate for Hierarchy {
    /// Every ancestor that can answer feature queries is asked in turn, then
    /// the context's top level; any of them enabling the feature is enough.
    fn has_feature(&self, feature: &str) -> bool {
        ancestors(self.owner.clone())
            .chain(self.context.top_level())
            .any(|owner| {
                owner
                    .feature_gate()
                    .is_some_and(|gate| gate.has_feature(feature))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AddressCache {
    domain: Option<String>,
    base: u64,
}

/// A named, addressed array of bits with a field table.
///
/// `bits[i]` always holds the bit at physical position `i`, position 0 being
/// the least significant. Positions passed in and labels handed out are
/// interpreted through the register's [`BitOrder`].
#[derive(Debug, Clone)]
pub struct Register {
    name: String,
    offset: u64,
    size: usize,
    bit_order: BitOrder,
    bits: Vec<Bit>,
    fields: BTreeMap<String, Vec<FieldFragment>>,
    reset: ResetValue,
    access: AccessCode,
    feature: FeatureConstraint,
    init_as_writable: bool,
    metadata: Metadata,
    hierarchy: Hierarchy,
    address_cache: RefCell<Option<AddressCache>>,
    frozen: Cell<bool>,
}

impl Register {
    /// Creates a register whose every position holds a placeholder bit.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidSize`] for a zero width or one wider
    /// than [`MAX_REGISTER_SIZE`].
    pub fn new(
        name: impl Into<String>,
        offset: u64,
        options: RegisterOptions,
    ) -> RegisterResult<Self> {
        let RegisterOptions {
            size,
            bit_order,
            reset,
            access,
            feature,
            init_as_writable,
            meta,
            owner,
            context,
        } = options;
        if size == 0 || size > MAX_REGISTER_SIZE {
            return Err(RegisterError::InvalidSize {
                size,
                max: MAX_REGISTER_SIZE,
            });
        }

        let hierarchy = Hierarchy { owner, context };
        let defaults = hierarchy.context.reg_defaults(hierarchy.class_name());
        let metadata = merge_metadata(&defaults, &meta);
        let bits = (0..size)
            .map(|position| Bit::placeholder(position, init_as_writable, reset.bit(position)))
            .collect();

        Ok(Self {
            name: name.into(),
            offset,
            size,
            bit_order,
            bits,
            fields: BTreeMap::new(),
            reset,
            access,
            feature,
            init_as_writable,
            metadata,
            hierarchy,
            address_cache: RefCell::new(None),
            frozen: Cell::new(false),
        })
    }

    /// Register name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width in bits.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Bit numbering convention.
    #[must_use]
    pub const fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    /// Default access for fields declared without access configuration.
    #[must_use]
    pub const fn default_access(&self) -> AccessCode {
        self.access
    }

    /// Reset value applied to placeholder bits.
    #[must_use]
    pub const fn placeholder_reset(&self) -> ResetValue {
        self.reset
    }

    /// All bits, indexed by physical position.
    #[must_use]
    pub fn physical_bits(&self) -> &[Bit] {
        &self.bits
    }

    /// Feature gate backed by the owner chain.
    #[must_use]
    pub const fn gate(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Merged register metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Looks up one register metadata entry.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    /// Field table; fragment positions are physical, most significant
    /// fragment first.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, Vec<FieldFragment>> {
        &self.fields
    }

    /// Register-level feature constraint.
    #[must_use]
    pub const fn feature(&self) -> &FeatureConstraint {
        &self.feature
    }

    /// Returns `true` when the register's own feature constraint is satisfied.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.feature
            .names()
            .iter()
            .all(|feature| self.hierarchy.has_feature(feature))
    }

    /// Returns `true` when the register carries the feature constraint in
    /// question.
    #[must_use]
    pub fn has_feature_constraint(&self, name: Option<&str>) -> bool {
        match name {
            None => !self.feature.is_none(),
            Some(name) => self.feature.mentions(name),
        }
    }

    pub(crate) fn split_mut(&mut self) -> (&mut [Bit], &Hierarchy) {
        (&mut self.bits, &self.hierarchy)
    }

    /// Declares a one-bit field.
    ///
    /// # Errors
    ///
    /// See [`Register::add_bus_scramble`].
    pub fn add_bit(
        &mut self,
        name: impl Into<String>,
        position: usize,
        options: BitOptions,
    ) -> RegisterResult<&mut Self> {
        self.add_bus(name, position, 1, options)
    }

    /// Declares a contiguous field of `width` bits starting at `position`.
    ///
    /// # Errors
    ///
    /// See [`Register::add_bus_scramble`].
    pub fn add_bus(
        &mut self,
        name: impl Into<String>,
        position: usize,
        width: usize,
        options: BitOptions,
    ) -> RegisterResult<&mut Self> {
        self.add_bus_scramble(name, &[FieldFragment::new(position, width)], options)
    }

    /// Declares a field stored in one or more runs, most significant run
    /// first.
    ///
    /// Positions are read in the register's bit order. A literal reset value
    /// is sliced across the field and also becomes its data; otherwise the
    /// bits keep whatever value their positions already held. Fields declared
    /// without an access code or explicit flags take the register's default
    /// access.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::FieldOutOfRange`] for an empty run or one
    /// that leaves the register, [`RegisterError::OverlappingFragments`] when
    /// two fragments claim the same bit, and any error from [`Bit::new`].
    /// Nothing is changed on error.
    pub fn add_bus_scramble(
        &mut self,
        name: impl Into<String>,
        fragments: &[FieldFragment],
        options: BitOptions,
    ) -> RegisterResult<&mut Self> {
        let name = name.into();
        let physical = self.physical_fragments(&name, fragments)?;

        let mut options = options;
        if options.has_no_access_config() {
            options.access = Some(self.access);
        }
        let defaults = self
            .hierarchy
            .context
            .bit_defaults(self.hierarchy.class_name());
        let metadata = merge_metadata(&defaults, &options.meta);

        let positions = significance_positions(&physical);
        let mut declared = Vec::with_capacity(positions.len());
        for (i, &position) in positions.iter().enumerate() {
            let existing = &self.bits[position];
            let mut bit_options = options.clone();
            bit_options.reset = Some(match options.reset {
                Some(reset) => reset.bit(i),
                None => existing.reset_value(),
            });
            let mut bit = Bit::new(position, &bit_options)?;
            if !matches!(options.reset, Some(ResetValue::Value(_))) {
                bit.carry_data(existing.data());
            }
            bit.set_metadata(metadata.clone());
            declared.push(bit);
        }

        if self.fields.contains_key(&name) {
            warn!("register `{}`: redeclaring field `{name}`", self.name);
            self.delete_bit(&[name.as_str()]);
        }
        let owned = self.used_positions();
        if positions.iter().any(|p| owned.contains(p)) {
            warn!(
                "register `{}`: field `{name}` overlaps bits owned by another field",
                self.name
            );
        }

        for bit in declared {
            let position = bit.position();
            self.bits[position] = bit;
        }
        debug!(
            "register `{}`: declared field `{name}` over {physical:?}",
            self.name
        );
        self.fields.insert(name, physical);
        Ok(self)
    }

    /// Removes fields by name, reverting their bits to placeholders that keep
    /// the current data. Returns the names actually removed.
    pub fn delete_bit<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let mut removed = Vec::new();
        for name in names {
            let name = name.as_ref();
            let Some(fragments) = self.fields.remove(name) else {
                continue;
            };
            for position in fragments.iter().flat_map(|f| f.positions()) {
                let data = self.bits[position].data();
                let mut placeholder = Bit::placeholder(
                    position,
                    self.init_as_writable,
                    self.reset.bit(position),
                );
                placeholder.carry_data(data);
                self.bits[position] = placeholder;
            }
            debug!("register `{}`: deleted field `{name}`", self.name);
            removed.push(name.to_owned());
        }
        removed
    }

    fn physical_fragments(
        &self,
        name: &str,
        fragments: &[FieldFragment],
    ) -> RegisterResult<Vec<FieldFragment>> {
        let out_of_range = |fragment: &FieldFragment| RegisterError::FieldOutOfRange {
            name: name.to_owned(),
            position: fragment.position,
            width: fragment.width,
            size: self.size,
        };
        if fragments.is_empty() {
            return Err(RegisterError::FieldOutOfRange {
                name: name.to_owned(),
                position: 0,
                width: 0,
                size: self.size,
            });
        }
        let mut claimed = BTreeSet::new();
        let mut physical = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let end = fragment.position.checked_add(fragment.width);
            if fragment.width == 0 || !matches!(end, Some(end) if end <= self.size) {
                return Err(out_of_range(fragment));
            }
            let mapped = match self.bit_order {
                BitOrder::Lsb0 => *fragment,
                BitOrder::Msb0 => FieldFragment::new(
                    self.size - fragment.position - fragment.width,
                    fragment.width,
                ),
            };
            if !mapped.positions().all(|position| claimed.insert(position)) {
                return Err(RegisterError::OverlappingFragments {
                    name: name.to_owned(),
                    position: fragment.position,
                });
            }
            physical.push(mapped);
        }
        Ok(physical)
    }

    pub(crate) fn used_positions(&self) -> BTreeSet<usize> {
        self.fields
            .values()
            .flatten()
            .flat_map(|fragment| fragment.positions())
            .collect()
    }

    /// Whole-register value, or `None` when any bit is unknown.
    #[must_use]
    pub fn data(&self) -> Option<u128> {
        self.all().data()
    }

    /// Whole-register status string.
    #[must_use]
    pub fn status_str(&self, operation: Operation) -> String {
        self.all().status_str(operation)
    }

    /// Writes the whole register.
    pub fn write(&mut self, value: u128) -> &mut Self {
        self.all_mut().write(value);
        self
    }

    /// Tags the whole register for read.
    pub fn read(&mut self, value: Option<u128>) -> &mut Self {
        self.all_mut().read(value);
        self
    }

    /// Resets every bit.
    pub fn reset(&mut self) -> &mut Self {
        self.all_mut().reset();
        self
    }

    /// Clears transient flags on every bit.
    pub fn clear_flags(&mut self) -> &mut Self {
        self.all_mut().clear_flags();
        self
    }

    /// Writes the whole register, then requests a write transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MissingHandler`] when nothing handles writes.
    pub fn write_request(
        &mut self,
        value: Option<u128>,
        options: &TransactionOptions,
    ) -> RegisterResult<&mut Self> {
        self.all_mut().write_request(value, options)?;
        Ok(self)
    }

    /// Tags the whole register for read, then requests a read transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MissingHandler`] when nothing handles reads.
    pub fn read_request(
        &mut self,
        value: Option<u128>,
        options: &TransactionOptions,
    ) -> RegisterResult<&mut Self> {
        self.all_mut().read_request(value, options)?;
        Ok(self)
    }
}

/// Physical positions of a field, least significant first.
///
/// The last fragment holds the lowest bits of the field's value.
fn significance_positions(fragments: &[FieldFragment]) -> Vec<usize> {
    fragments
        .iter()
        .rev()
        .flat_map(|fragment| fragment.positions())
        .collect()
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self
            .data()
            .map_or_else(|| "undefined".to_owned(), |d| format!("{d:#x}"));
        writeln!(
            f,
            "{} @ {:#x} ({} bits, {:?}) = {data}",
            self.name, self.offset, self.size, self.bit_order
        )?;
        for named in self.named_bits(false) {
            let Some(name) = named.name.as_deref() else {
                continue;
            };
            let labels: Vec<usize> = named
                .bits
                .positions()
                .iter()
                .filter_map(|&p| self.label_of(p))
                .collect();
            let hi = labels.iter().copied().max().unwrap_or_default();
            let lo = labels.iter().copied().min().unwrap_or_default();
            writeln!(
                f,
                "  {name}[{hi}:{lo}] = {}",
                named.bits.status_str(Operation::Write)
            )?;
        }
        Ok(())
    }
}
