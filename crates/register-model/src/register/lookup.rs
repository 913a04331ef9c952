use std::collections::BTreeSet;
use std::ops::{Range, RangeInclusive};

use log::trace;

use super::{significance_positions, Hierarchy, Register};
use crate::{Bit, BitCollection, BitIndex, Bits, BitsMut, RegisterError, RegisterResult};

/// Argument to a register lookup: labels or a field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Labels in the register's bit order.
    Index(BitIndex),
    /// Field name.
    Name(String),
}

impl From<BitIndex> for Selector {
    fn from(index: BitIndex) -> Self {
        Self::Index(index)
    }
}

impl From<usize> for Selector {
    fn from(label: usize) -> Self {
        Self::Index(BitIndex::At(label))
    }
}

impl From<RangeInclusive<usize>> for Selector {
    fn from(range: RangeInclusive<usize>) -> Self {
        Self::Index(range.into())
    }
}

impl From<Range<usize>> for Selector {
    fn from(range: Range<usize>) -> Self {
        Self::Index(range.into())
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Feature gating applied to a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FeatureFilter {
    /// Keep bits the hierarchy currently enables.
    #[default]
    Default,
    /// Keep only bits without a feature constraint.
    None,
    /// Keep every bit.
    All,
    /// Keep bits constrained by one of these features.
    Features(Vec<String>),
}

impl FeatureFilter {
    fn keeps(&self, bit: &Bit, gate: &Hierarchy) -> bool {
        match self {
            Self::Default => bit.is_enabled(gate),
            Self::None => !bit.has_feature_constraint(None),
            Self::All => true,
            Self::Features(features) => features
                .iter()
                .any(|feature| bit.has_feature_constraint(Some(feature))),
        }
    }
}

/// One entry of [`Register::named_bits`].
#[derive(Debug, Clone)]
pub struct NamedBits<'a> {
    /// Field name, or `None` for a spacer over unused bits.
    pub name: Option<String>,
    /// Significance of this run's lowest bit within its field.
    pub offset: usize,
    /// Bits of the run.
    pub bits: Bits<'a>,
}

struct Resolved {
    positions: Vec<usize>,
    names: Vec<String>,
}

impl Register {
    /// Bits matching `selectors`, gated by each bit's own enablement.
    ///
    /// With no selectors the whole register is returned. Labels are
    /// de-duplicated and sorted; a lone field name keeps the field's own
    /// significance order.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MissingBits`] when a by-name lookup matches
    /// nothing and the context has strict errors enabled; otherwise an empty
    /// match is `Ok(None)`.
    pub fn bits<S: Into<Selector>>(
        &self,
        selectors: impl IntoIterator<Item = S>,
    ) -> RegisterResult<Option<Bits<'_>>> {
        self.bits_filtered(selectors, &FeatureFilter::Default)
    }

    /// [`Register::bits`] with an explicit feature filter.
    ///
    /// # Errors
    ///
    /// See [`Register::bits`].
    pub fn bits_filtered<S: Into<Selector>>(
        &self,
        selectors: impl IntoIterator<Item = S>,
        filter: &FeatureFilter,
    ) -> RegisterResult<Option<Bits<'_>>> {
        let resolved = self.resolve(selectors.into_iter().map(Into::into).collect(), filter)?;
        Ok(resolved.map(|r| BitCollection::new(self, r.positions, r.names, self.bit_order)))
    }

    /// Mutable form of [`Register::bits`].
    ///
    /// # Errors
    ///
    /// See [`Register::bits`].
    pub fn bits_mut<S: Into<Selector>>(
        &mut self,
        selectors: impl IntoIterator<Item = S>,
    ) -> RegisterResult<Option<BitsMut<'_>>> {
        self.bits_mut_filtered(selectors, &FeatureFilter::Default)
    }

    /// Mutable form of [`Register::bits_filtered`].
    ///
    /// # Errors
    ///
    /// See [`Register::bits`].
    pub fn bits_mut_filtered<S: Into<Selector>>(
        &mut self,
        selectors: impl IntoIterator<Item = S>,
        filter: &FeatureFilter,
    ) -> RegisterResult<Option<BitsMut<'_>>> {
        let resolved = self.resolve(selectors.into_iter().map(Into::into).collect(), filter)?;
        let Some(Resolved { positions, names }) = resolved else {
            return Ok(None);
        };
        let bit_order = self.bit_order;
        Ok(Some(BitCollection::new(self, positions, names, bit_order)))
    }

    /// A declared field, ignoring feature gating.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MissingBits`] when no field has this name.
    pub fn field(&self, name: &str) -> RegisterResult<Bits<'_>> {
        let positions = self.field_positions(name)?;
        Ok(BitCollection::new(self, positions, vec![name.to_owned()], self.bit_order))
    }

    /// Mutable form of [`Register::field`].
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MissingBits`] when no field has this name.
    pub fn field_mut(&mut self, name: &str) -> RegisterResult<BitsMut<'_>> {
        let positions = self.field_positions(name)?;
        let bit_order = self.bit_order;
        Ok(BitCollection::new(self, positions, vec![name.to_owned()], bit_order))
    }

    /// The whole register.
    #[must_use]
    pub fn all(&self) -> Bits<'_> {
        BitCollection::new(self, (0..self.size).collect(), Vec::new(), self.bit_order)
    }

    /// The whole register, mutably.
    pub fn all_mut(&mut self) -> BitsMut<'_> {
        let positions = (0..self.size).collect();
        let bit_order = self.bit_order;
        BitCollection::new(self, positions, Vec::new(), bit_order)
    }

    /// Returns `true` when a field with this name is declared.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Declared field names, sorted.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Fields (and optionally spacers over unused bits), most significant
    /// first.
    ///
    /// A field split into several runs yields one entry per run, each tagged
    /// with the run's offset inside the field's value.
    #[must_use]
    pub fn named_bits(&self, include_spacers: bool) -> Vec<NamedBits<'_>> {
        let mut runs: Vec<(usize, NamedBits<'_>)> = Vec::new();
        for (name, fragments) in &self.fields {
            let mut offset = 0;
            for fragment in fragments.iter().rev() {
                let positions: Vec<usize> = fragment.positions().collect();
                runs.push((
                    fragment.position + fragment.width - 1,
                    NamedBits {
                        name: Some(name.clone()),
                        offset,
                        bits: BitCollection::new(
                            self,
                            positions,
                            vec![name.clone()],
                            self.bit_order,
                        ),
                    },
                ));
                offset += fragment.width;
            }
        }

        if include_spacers {
            let used = self.used_positions();
            let mut gap: Vec<usize> = Vec::new();
            for position in 0..=self.size {
                if position < self.size && !used.contains(&position) {
                    gap.push(position);
                } else if let Some(&top) = gap.last() {
                    let positions = std::mem::take(&mut gap);
                    runs.push((
                        top,
                        NamedBits {
                            name: None,
                            offset: 0,
                            bits: BitCollection::new(self, positions, Vec::new(), self.bit_order),
                        },
                    ));
                }
            }
        }

        runs.sort_by(|a, b| b.0.cmp(&a.0));
        runs.into_iter().map(|(_, named)| named).collect()
    }

    /// Labels owned by some field, sorted.
    #[must_use]
    pub fn used_bits(&self) -> Vec<usize> {
        let used = self.used_positions();
        self.labels_where(|position| used.contains(&position))
    }

    /// Labels outside every field, sorted.
    #[must_use]
    pub fn empty_bits(&self) -> Vec<usize> {
        let used = self.used_positions();
        self.labels_where(|position| !used.contains(&position))
    }

    /// Label of a physical position in the register's bit order.
    pub(crate) const fn label_of(&self, position: usize) -> Option<usize> {
        self.bit_order.label(position, self.size)
    }

    fn labels_where(&self, keep: impl Fn(usize) -> bool) -> Vec<usize> {
        let labels: BTreeSet<usize> = (0..self.size)
            .filter(|&position| keep(position))
            .filter_map(|position| self.label_of(position))
            .collect();
        labels.into_iter().collect()
    }

    fn field_positions(&self, name: &str) -> RegisterResult<Vec<usize>> {
        self.fields
            .get(name)
            .map(|fragments| significance_positions(fragments))
            .ok_or_else(|| self.missing_bits(vec![name.to_owned()]))
    }

    fn missing_bits(&self, requested: Vec<String>) -> RegisterError {
        RegisterError::MissingBits {
            register: self.name.clone(),
            requested,
            available: self.field_names(),
        }
    }

    fn resolve(
        &self,
        selectors: Vec<Selector>,
        filter: &FeatureFilter,
    ) -> RegisterResult<Option<Resolved>> {
        let mut chosen: BTreeSet<usize> = BTreeSet::new();
        let mut names: Vec<String> = Vec::new();
        let mut requested: Vec<String> = Vec::new();
        let mut field_order: Option<Vec<usize>> = None;
        let mut positional = selectors.is_empty();

        if selectors.is_empty() {
            chosen.extend(0..self.size);
        }
        for selector in selectors {
            match selector {
                Selector::Index(index) => {
                    positional = true;
                    chosen.extend(
                        index
                            .labels()
                            .filter_map(|label| self.bit_order.significance(label, self.size)),
                    );
                }
                Selector::Name(name) => {
                    trace!("register `{}`: looking up field `{name}`", self.name);
                    if let Some(fragments) = self.fields.get(&name) {
                        let positions = significance_positions(fragments);
                        chosen.extend(positions.iter().copied());
                        field_order = Some(positions);
                        if !names.contains(&name) {
                            names.push(name.clone());
                        }
                    }
                    requested.push(name);
                }
            }
        }

        let mut positions: Vec<usize> = match field_order {
            Some(order) if names.len() == 1 && !positional => order,
            _ => chosen.into_iter().collect(),
        };
        positions.retain(|&position| filter.keeps(&self.bits[position], &self.hierarchy));

        if positions.is_empty() {
            if self.hierarchy.context.strict_errors() && !requested.is_empty() {
                return Err(self.missing_bits(requested));
            }
            return Ok(None);
        }
        Ok(Some(Resolved { positions, names }))
    }
}
