//! Cross-cutting types shared by the front end and the middle end.
//!
//! The central idea is `Valid<T>`: a wrapper that can only be constructed by
//! validating a `T`.  Passes take and return `Valid<Program>` so that the type
//! system documents which functions may assume a well-formed module and which
//! ones are still allowed to produce a malformed one mid-construction.

use std::fmt::Debug;

/// A value of type `T` that has passed its own validation.
///
/// The only ways to get a `Valid<T>` are [`T::validate`](crate::middle_end::lir::Program::validate)
/// (which actually checks) and [`skip_validation`] (which does not, and is
/// reserved for test fixtures that intentionally exercise malformed input).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Valid<T>(pub T);

impl<T> Valid<T> {
    /// Unwrap, discarding the validity guarantee.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Valid<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Wrap a value as `Valid` without actually validating it.
///
/// Only meant for test code that wants to feed a hand-built, possibly
/// malformed `Program`/`ast::Program` somewhere that expects `Valid<T>`.
pub fn skip_validation<T>(value: T) -> Valid<T> {
    Valid(value)
}

/// An accumulating bag of human-readable diagnostics.
///
/// Several validators in this crate want to report every problem they find
/// in one pass rather than stopping at the first one, so `ValidationError`
/// supports `+=` to merge two error sets together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationError(pub Vec<String>);

impl ValidationError {
    pub fn new() -> Self {
        ValidationError(Vec::new())
    }

    pub fn from_string(msg: String) -> Self {
        ValidationError(vec![msg])
    }

    pub fn from_str_ctx(ctx: &str, msg: &str) -> Self {
        ValidationError(vec![format!("in {ctx}: {msg}")])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::ops::AddAssign for ValidationError {
    fn add_assign(&mut self, rhs: Self) {
        self.0.extend(rhs.0);
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for msg in &self.0 {
            writeln!(f, "{msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
