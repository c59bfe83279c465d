// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Small declarative macros shared by the varscope crates.
//!
//! # Macros Overview
//!
//! ## Scope guards
//! - [`defer!`] - Execute code on scope exit, including during unwinding
//! - [`scope_exit!`] - Alias of [`defer!`] that reads better at call sites
//!
//! ## Error Handling
//! - [`bail!`] - Early return with an error
//! - [`ensure!`] - Assertion that returns an error instead of panicking
//!
//! # Examples
//!
//! ```
//! use varscope_macros::*;
//! use std::cell::RefCell;
//!
//! let log = RefCell::new(Vec::new());
//!
//! {
//!     log.borrow_mut().push("enter");
//!     defer!(log.borrow_mut().push("leave"));
//!     log.borrow_mut().push("work");
//! }
//!
//! assert_eq!(*log.borrow(), vec!["enter", "work", "leave"]);
//! ```
//!
//! ```
//! use varscope_macros::*;
//!
//! fn segment(name: &str) -> Result<&str, String> {
//!     ensure!(!name.contains('/'), "segment '{}' contains a separator", name);
//!     Ok(name)
//! }
//!
//! assert!(segment("dense").is_ok());
//! assert!(segment("a/b").is_err());
//! ```

#![warn(missing_docs)]

mod control;
mod error;

/// Helper struct for the [`defer!`] and [`scope_exit!`] macros.
///
/// Runs the wrapped closure exactly once when dropped, so the closure also
/// runs when the enclosing scope unwinds from a panic.
#[doc(hidden)]
pub struct DeferGuard<F: FnOnce()>(pub Option<F>);

impl<F: FnOnce()> Drop for DeferGuard<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}
