use std::rc::Rc;

use log::{debug, trace};

use super::{AddressCache, Register};
use crate::{ancestors, Operation, Owner, RegisterError, RegisterResult, TransactionOptions};

/// Options for [`Register::address`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AddressOptions {
    /// Address domain passed to the hierarchy's base address query.
    pub domain: Option<String>,
    /// Return the offset alone, without the base address.
    pub relative: bool,
}

impl AddressOptions {
    /// Absolute address in `domain`.
    #[must_use]
    pub fn in_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            relative: false,
        }
    }

    /// Offset only.
    #[must_use]
    pub const fn relative() -> Self {
        Self {
            domain: None,
            relative: true,
        }
    }
}

impl Register {
    /// Unresolved offset inside the owner's address space.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Resolved address: offset plus base address unless `relative`.
    ///
    /// The base is looked up once per domain and cached; a frozen register
    /// keeps its cached base regardless of domain.
    #[must_use]
    pub fn address(&self, options: &AddressOptions) -> u64 {
        if options.relative {
            return self.offset;
        }
        self.offset.wrapping_add(self.base_address(options.domain.as_deref()))
    }

    /// Base address for `domain`, consulting the cache first.
    #[must_use]
    pub fn base_address(&self, domain: Option<&str>) -> u64 {
        if let Some(cache) = self.address_cache.borrow().as_ref() {
            if self.frozen.get() || cache.domain.as_deref() == domain {
                return cache.base;
            }
        }
        let base = self.lookup_base_address(domain);
        debug!(
            "register `{}`: base address {base:#x} for domain {domain:?}",
            self.name
        );
        *self.address_cache.borrow_mut() = Some(AddressCache {
            domain: domain.map(str::to_owned),
            base,
        });
        base
    }

    /// Pins the base address for `domain` without consulting the hierarchy.
    pub fn set_base_address(&mut self, base: u64, domain: Option<&str>) -> &mut Self {
        *self.address_cache.get_mut() = Some(AddressCache {
            domain: domain.map(str::to_owned),
            base,
        });
        self
    }

    /// Resolves the base address now and keeps it until [`Register::unfreeze`].
    pub fn freeze(&mut self) -> &mut Self {
        if self.address_cache.get_mut().is_none() {
            let base = self.lookup_base_address(None);
            *self.address_cache.get_mut() = Some(AddressCache { domain: None, base });
        }
        self.frozen.set(true);
        self
    }

    /// Drops the cached base address so the next lookup recomputes it.
    pub fn unfreeze(&mut self) -> &mut Self {
        self.frozen.set(false);
        *self.address_cache.get_mut() = None;
        self
    }

    /// Returns `true` while the base address is pinned.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    fn lookup_base_address(&self, domain: Option<&str>) -> u64 {
        let from_handler = self.handler_candidates().into_iter().find_map(|owner| {
            owner
                .transaction_handler()
                .and_then(|handler| handler.base_address(self))
        });
        from_handler
            .or_else(|| {
                ancestors(self.hierarchy.owner.clone())
                    .find_map(|owner| owner.reg_base_address(domain))
            })
            .unwrap_or(0)
    }

    /// Owners asked for a transaction handler, in priority order: the
    /// owner's controller, the owner, its parent, then the top level.
    fn handler_candidates(&self) -> Vec<Rc<dyn Owner>> {
        let owner = self.hierarchy.owner.clone();
        let controller = owner.as_ref().and_then(|o| o.controller());
        let parent = owner.as_ref().and_then(|o| o.parent());
        [controller, owner, parent, self.hierarchy.context.top_level()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Dispatches a transaction to the first handler that supports it.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::MissingHandler`] when no candidate supports
    /// `operation`.
    pub fn request(
        &self,
        operation: Operation,
        options: &TransactionOptions,
    ) -> RegisterResult<&Self> {
        for owner in self.handler_candidates() {
            trace!(
                "register `{}`: probing {owner:?} for {operation}",
                self.name
            );
            let Some(handler) = owner.transaction_handler() else {
                continue;
            };
            if !handler.supports(operation) {
                continue;
            }
            debug!("register `{}`: dispatching {operation}", self.name);
            match operation {
                Operation::Write => handler.write_register(self, options),
                Operation::Read => handler.read_register(self, options),
            }
            return Ok(self);
        }
        Err(RegisterError::MissingHandler {
            register: self.name.clone(),
            operation,
        })
    }
}
