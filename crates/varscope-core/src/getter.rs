// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Custom getters and the chain that composes them across nested scopes.
//!
//! Every scope may install a getter. Entering a scope links its getter in
//! front of the getters already active, so the innermost getter runs first
//! and decides whether, and with which request, to call the rest of the
//! chain. The end of the chain is the variable store.
//!
//! ```
//! use varscope_core::{getter_fn, GetterChain, MemoryStore, Shape, VariableRequest};
//!
//! let frozen = getter_fn(|mut request: VariableRequest, base| {
//!     request.trainable = false;
//!     base.call(request)
//! });
//! let chain = GetterChain::compose(Some(frozen), None).unwrap();
//!
//! let store = MemoryStore::new();
//! let mut request = VariableRequest::new("w");
//! request.shape = Some(Shape::from([2]));
//! let variable = chain.invoke(&store, request).unwrap();
//! assert!(!variable.trainable);
//! ```

use crate::error::Result;
use crate::store::VariableStore;
use crate::variable::{Variable, VariableRequest};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Intercepts a variable resolution.
///
/// Implementations either delegate through `base` (possibly with a rewritten
/// request, possibly post-processing the result) or fail.
pub trait VariableGetter {
    /// Resolves `request`, usually by calling `base`.
    fn get(&self, request: VariableRequest, base: BaseGetter<'_>) -> Result<Variable>;
}

struct FnGetter<F>(F);

impl<F> VariableGetter for FnGetter<F>
where
    F: Fn(VariableRequest, BaseGetter<'_>) -> Result<Variable>,
{
    fn get(&self, request: VariableRequest, base: BaseGetter<'_>) -> Result<Variable> {
        (self.0)(request, base)
    }
}

/// Wraps a closure as a [`VariableGetter`].
pub fn getter_fn<F>(f: F) -> Rc<dyn VariableGetter>
where
    F: Fn(VariableRequest, BaseGetter<'_>) -> Result<Variable> + 'static,
{
    Rc::new(FnGetter(f))
}

/// The rest of the chain, as seen from one getter.
#[derive(Clone, Copy)]
pub struct BaseGetter<'a> {
    next: Option<&'a GetterChain>,
    store: &'a dyn VariableStore,
}

impl<'a> BaseGetter<'a> {
    /// Resolves `request` with the remaining getters, then the store.
    pub fn call(&self, request: VariableRequest) -> Result<Variable> {
        match self.next {
            Some(chain) => chain.invoke(self.store, request),
            None => self.store.get_variable(&request),
        }
    }

    /// The store at the end of the chain.
    pub fn store(&self) -> &'a dyn VariableStore {
        self.store
    }
}

struct Link {
    getter: Rc<dyn VariableGetter>,
    next: Option<GetterChain>,
}

/// An immutable linked list of getters, innermost first.
///
/// Cloning is cheap: links are shared between a scope and the scopes derived
/// from it.
#[derive(Clone)]
pub struct GetterChain {
    head: Rc<Link>,
}

impl GetterChain {
    /// Links `getter` in front of `rest`. Returns `rest` unchanged when there
    /// is no new getter.
    pub fn compose(
        getter: Option<Rc<dyn VariableGetter>>,
        rest: Option<GetterChain>,
    ) -> Option<GetterChain> {
        match getter {
            None => rest,
            Some(getter) => Some(GetterChain {
                head: Rc::new(Link { getter, next: rest }),
            }),
        }
    }

    /// Runs the chain for `request`, ending at `store`.
    pub fn invoke(&self, store: &dyn VariableStore, request: VariableRequest) -> Result<Variable> {
        trace!(name = %request.name, depth = self.depth(), "invoking getter");
        let base = BaseGetter {
            next: self.head.next.as_ref(),
            store,
        };
        self.head.getter.get(request, base)
    }

    /// Number of getters in the chain (at least one).
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut link = &self.head;
        while let Some(next) = &link.next {
            depth += 1;
            link = &next.head;
        }
        depth
    }

    /// Returns true if both handles share the same head link.
    pub fn ptr_eq(&self, other: &GetterChain) -> bool {
        Rc::ptr_eq(&self.head, &other.head)
    }
}

impl fmt::Debug for GetterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetterChain").field("depth", &self.depth()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;
    use crate::types::Shape;
    use std::cell::RefCell;

    fn request(name: &str) -> VariableRequest {
        let mut request = VariableRequest::new(name);
        request.shape = Some(Shape::from([3]));
        request
    }

    fn recording(label: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) -> Rc<dyn VariableGetter> {
        let log = Rc::clone(log);
        getter_fn(move |request, base| {
            log.borrow_mut().push(label);
            base.call(request)
        })
    }

    #[test]
    fn test_compose_without_getter_keeps_rest() {
        assert!(GetterChain::compose(None, None).is_none());

        let log = Rc::new(RefCell::new(Vec::new()));
        let outer = GetterChain::compose(Some(recording("outer", &log)), None);
        let same = GetterChain::compose(None, outer.clone()).unwrap();
        assert!(same.ptr_eq(outer.as_ref().unwrap()));
    }

    #[test]
    fn test_innermost_runs_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let outer = GetterChain::compose(Some(recording("outer", &log)), None);
        let inner = GetterChain::compose(Some(recording("inner", &log)), outer).unwrap();
        assert_eq!(inner.depth(), 2);

        let store = MemoryStore::new();
        inner.invoke(&store, request("w")).unwrap();
        assert_eq!(*log.borrow(), vec!["inner", "outer"]);
        assert!(store.variable("w").is_some());
    }

    #[test]
    fn test_getter_can_veto() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let outer = GetterChain::compose(Some(recording("outer", &log)), None);
        let veto = getter_fn(|request: VariableRequest, _base| {
            Err(Error::argument(format!("'{}' is not allowed here", request.name)))
        });
        let chain = GetterChain::compose(Some(veto), outer).unwrap();

        let store = MemoryStore::new();
        assert!(chain.invoke(&store, request("w")).is_err());
        assert!(log.borrow().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_getter_rewrites_request_and_result() {
        let rename = getter_fn(|mut request: VariableRequest, base| {
            request.name = format!("{}_ema", request.name);
            let mut variable = base.call(request)?;
            variable.trainable = false;
            Ok(variable)
        });
        let chain = GetterChain::compose(Some(rename), None).unwrap();

        let store = MemoryStore::new();
        let variable = chain.invoke(&store, request("w")).unwrap();
        assert_eq!(variable.name, "w_ema");
        assert!(!variable.trainable);
        assert!(store.variable("w_ema").unwrap().trainable);
    }
}
