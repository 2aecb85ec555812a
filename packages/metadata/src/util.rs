//! Utility Functions

use crate::error::Result;
use std::fmt;

/// Split a binding config at the first colon, trimming both parts.
/// `"dirProp: elProp"` yields `("dirProp", "elProp")`; without a colon the
/// defaults are returned unchanged.
pub fn split_at_colon(input: &str, defaults: (&str, &str)) -> (String, String) {
    split_at(input, ':', defaults)
}

/// Split a path config at the first period, trimming both parts.
pub fn split_at_period(input: &str, defaults: (&str, &str)) -> (String, String) {
    split_at(input, '.', defaults)
}

fn split_at(input: &str, character: char, defaults: (&str, &str)) -> (String, String) {
    match input.find(character) {
        Some(idx) => (
            input[..idx].trim().to_string(),
            input[idx + character.len_utf8()..].trim().to_string(),
        ),
        None => (defaults.0.to_string(), defaults.1.to_string()),
    }
}

/// Printable form of an opaque JSON value for diagnostics. Strings print
/// without quotes, everything else in JSON notation.
pub fn stringify_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A deferred result: a boxed thunk run by an explicit driver, never
/// implicitly. This is the only suspension mechanism in the resolver.
pub struct Deferred<T>(Box<dyn FnOnce() -> Result<T>>);

impl<T> Deferred<T> {
    pub fn new(thunk: impl FnOnce() -> Result<T> + 'static) -> Self {
        Deferred(Box::new(thunk))
    }

    /// Run the thunk, consuming the deferred.
    pub fn resolve(self) -> Result<T> {
        (self.0)()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

/// Outcome of an operation that may or may not need to suspend: either the
/// value is available immediately, or a deferred completion is handed back.
#[derive(Debug)]
pub enum SyncAsync<T> {
    Sync(T),
    Async(Deferred<T>),
}
