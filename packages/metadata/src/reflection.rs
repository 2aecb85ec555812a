//! Reflection Seams
//!
//! Constructor parameters, import origins and lifecycle-hook detection are
//! supplied by the embedding environment.

use crate::core::{LifecycleHook, RawParam, TypeRef};

pub trait ReflectorReader {
    /// Raw constructor/factory parameter descriptors, or `None` when the
    /// symbol has no reflectable parameter metadata.
    fn parameters(&self, symbol: &TypeRef) -> Option<Vec<RawParam>>;

    /// Import origin of the symbol in static-analysis environments.
    fn import_uri(&self, symbol: &TypeRef) -> Option<String>;
}

pub trait LifecycleReflector {
    fn has_lifecycle_hook(&self, hook: LifecycleHook, type_ref: &TypeRef) -> bool;
}
