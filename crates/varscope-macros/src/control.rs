// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scope guard macros.

/// Defer execution until scope exit (like Go's defer).
///
/// The deferred body runs when the enclosing block ends, whether it ends by
/// falling through, by an early `return`/`?`, or by a panic unwinding through
/// it. Several guards in the same block run in reverse order of declaration.
///
/// # Example
///
/// ```
/// use varscope_macros::defer;
/// use std::cell::RefCell;
///
/// let stack = RefCell::new(vec!["root"]);
///
/// fn nested(stack: &RefCell<Vec<&'static str>>) -> Result<(), String> {
///     stack.borrow_mut().push("inner");
///     defer!(stack.borrow_mut().pop());
///     Err("failed inside".to_string())
/// }
///
/// assert!(nested(&stack).is_err());
/// assert_eq!(*stack.borrow(), vec!["root"]);
/// ```
#[macro_export]
macro_rules! defer {
    ($($body:tt)*) => {
        let _guard = $crate::DeferGuard(Some(|| { $($body)*; }));
    };
}

/// Run cleanup code on scope exit.
///
/// # Example
///
/// ```
/// use varscope_macros::scope_exit;
/// use std::cell::RefCell;
///
/// let log = RefCell::new(Vec::new());
///
/// {
///     log.borrow_mut().push("start");
///     scope_exit!(log.borrow_mut().push("cleanup"));
///     log.borrow_mut().push("work");
/// }
///
/// assert_eq!(*log.borrow(), vec!["start", "work", "cleanup"]);
/// ```
#[macro_export]
macro_rules! scope_exit {
    ($($body:tt)*) => {
        $crate::defer!($($body)*);
    };
}
