//! Annotation Reader
//!
//! Seam to the external annotation-reading layer (reflection over
//! source-level decorators). The resolver only ever consumes this trait.

use crate::core::{DirectiveAnnotation, NgModuleAnnotation, PipeAnnotation, TypeRef};

pub trait AnnotationReader {
    /// Directive or component annotation of `type_ref`, if any.
    fn resolve_directive(&self, type_ref: &TypeRef) -> Option<DirectiveAnnotation>;

    fn resolve_pipe(&self, type_ref: &TypeRef) -> Option<PipeAnnotation>;

    fn resolve_module(&self, type_ref: &TypeRef) -> Option<NgModuleAnnotation>;

    fn is_directive(&self, type_ref: &TypeRef) -> bool;

    fn is_pipe(&self, type_ref: &TypeRef) -> bool;

    fn is_module(&self, type_ref: &TypeRef) -> bool;
}
