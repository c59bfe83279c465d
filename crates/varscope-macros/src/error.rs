// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling macros.
//!
//! Both macros convert their message with `.into()`, so they work with any
//! error type implementing `From<String>` (or `From<&str>` for literals).

/// Early return with an error.
///
/// # Example
///
/// ```
/// use varscope_macros::bail;
///
/// fn depth(path: &str) -> Result<usize, String> {
///     if path.starts_with('/') {
///         bail!("path '{}' must be relative", path);
///     }
///     Ok(path.split('/').count())
/// }
///
/// assert!(depth("/a").is_err());
/// assert_eq!(depth("a/b").unwrap(), 2);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($msg.into())
    };
    ($fmt:literal, $($arg:tt)*) => {
        return Err(format!($fmt, $($arg)*).into())
    };
    ($err:expr $(,)?) => {
        return Err($err.into())
    };
}

/// Ensure a condition is true, or return an error.
///
/// # Example
///
/// ```
/// use varscope_macros::ensure;
///
/// fn shards(n: usize) -> Result<usize, String> {
///     ensure!(n > 0, "shard count must be positive");
///     Ok(n)
/// }
///
/// assert!(shards(0).is_err());
/// assert_eq!(shards(4).unwrap(), 4);
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:literal $(,)?) => {
        if !$cond {
            return Err($msg.into());
        }
    };
    ($cond:expr, $fmt:literal, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($fmt, $($arg)*).into());
        }
    };
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err.into());
        }
    };
}
