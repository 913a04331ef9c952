//! Shared configuration handed to every register.
//!
//! Replaces process-wide defaults: strict lookup policy, the top-level
//! fallback owner, and default metadata tables.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::{merge_metadata, MetaValue, Metadata, MetadataScope, Owner};

/// Configuration shared by a family of registers.
#[derive(Debug, Clone, Default)]
pub struct Context {
    strict_errors: bool,
    top_level: Option<Rc<dyn Owner>>,
    bit_metadata: BTreeMap<MetadataScope, Metadata>,
    reg_metadata: BTreeMap<MetadataScope, Metadata>,
}

impl Context {
    /// Creates a permissive context with no top level and no defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Named lookups that match nothing fail with `MissingBits` when enabled.
    #[must_use]
    pub fn with_strict_errors(mut self, strict: bool) -> Self {
        self.strict_errors = strict;
        self
    }

    /// Sets the fallback owner consulted after a register's own hierarchy.
    #[must_use]
    pub fn with_top_level(mut self, top_level: Rc<dyn Owner>) -> Self {
        self.top_level = Some(top_level);
        self
    }

    /// Adds a default metadata entry for bits in `scope`.
    #[must_use]
    pub fn with_bit_default(
        mut self,
        scope: MetadataScope,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Self {
        self.bit_metadata
            .entry(scope)
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Adds a default metadata entry for registers in `scope`.
    #[must_use]
    pub fn with_reg_default(
        mut self,
        scope: MetadataScope,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Self {
        self.reg_metadata
            .entry(scope)
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Returns `true` when named lookups are strict.
    #[must_use]
    pub const fn strict_errors(&self) -> bool {
        self.strict_errors
    }

    /// Fallback owner, if configured.
    #[must_use]
    pub fn top_level(&self) -> Option<Rc<dyn Owner>> {
        self.top_level.clone()
    }

    /// Default bit metadata for an owner class: global entries, then class entries.
    #[must_use]
    pub fn bit_defaults(&self, class_name: Option<&str>) -> Metadata {
        Self::scoped(&self.bit_metadata, class_name)
    }

    /// Default register metadata for an owner class: global entries, then class entries.
    #[must_use]
    pub fn reg_defaults(&self, class_name: Option<&str>) -> Metadata {
        Self::scoped(&self.reg_metadata, class_name)
    }

    fn scoped(tables: &BTreeMap<MetadataScope, Metadata>, class_name: Option<&str>) -> Metadata {
        let global = tables
            .get(&MetadataScope::Global)
            .cloned()
            .unwrap_or_default();
        match class_name.and_then(|name| tables.get(&MetadataScope::Owner(name.to_owned()))) {
            Some(class) => merge_metadata(&global, class),
            None => global,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Context;
    use crate::{MetaValue, MetadataScope};

    #[test]
    fn class_defaults_layer_over_global_defaults() {
        let context = Context::new()
            .with_bit_default(MetadataScope::Global, "sync", false)
            .with_bit_default(MetadataScope::Global, "group", "core")
            .with_bit_default(MetadataScope::Owner("Nvm".to_owned()), "sync", true);

        let nvm = context.bit_defaults(Some("Nvm"));
        assert_eq!(nvm.get("sync"), Some(&MetaValue::Bool(true)));
        assert_eq!(nvm.get("group"), Some(&MetaValue::from("core")));

        let other = context.bit_defaults(Some("Adc"));
        assert_eq!(other.get("sync"), Some(&MetaValue::Bool(false)));
        assert!(context.reg_defaults(None).is_empty());
    }

    #[test]
    fn default_context_is_permissive() {
        let context = Context::default();
        assert!(!context.strict_errors());
        assert!(context.top_level().is_none());
        assert!(Context::new().with_strict_errors(true).strict_errors());
    }
}
