//! Diagnostic Errors
//!
//! Every failure the resolver can produce, as one closed taxonomy. All of
//! these are fatal to the current resolution and surface verbatim to the
//! invoking tool; `ComponentStillLoading` is the only case a caller is
//! expected to recover from (by retrying asynchronously).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetadataError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("Directive {directive} has no selector, please add it!")]
    MissingSelector { directive: String },

    /// `deps` is the comma-joined per-parameter token list, with a `?`
    /// placeholder for every parameter whose token could not be determined.
    #[error("Can't resolve all parameters for {symbol}: ({deps}).")]
    UnresolvedDependency { symbol: String, deps: String },

    /// `providers` echoes the full input list with the offending entry
    /// bracketed by `?` markers and `...` truncation after it.
    #[error("Invalid {context} - only instances of Provider and Type are allowed, got: [{providers}]")]
    InvalidProvider { context: String, providers: String },

    #[error("The AnalyzeForEntryComponents token only supports useValue!")]
    EntryComponentsOnlyUseValue,

    #[error("The AnalyzeForEntryComponents token only supports multi = true!")]
    EntryComponentsOnlyMulti,

    #[error("Unexpected {kind} '{value}' imported by the module '{module}'")]
    InvalidImport {
        kind: &'static str,
        value: String,
        module: String,
    },

    #[error("Unexpected value '{value}' exported by the module '{module}'")]
    InvalidExport { value: String, module: String },

    #[error("Can't export {kind} {value} from {module} as it was neither declared nor imported!")]
    UndeclaredExport {
        kind: &'static str,
        value: String,
        module: String,
    },

    #[error("Unexpected {kind} '{value}' declared by the module '{module}'")]
    InvalidDeclaration {
        kind: &'static str,
        value: String,
        module: String,
    },

    /// Non-type entries in the `bootstrap` / `entryComponents` properties.
    #[error("Unexpected value '{value}' used in the {property} property of '{owner}'")]
    InvalidPropertyEntry {
        property: &'static str,
        value: String,
        owner: String,
    },

    #[error("Type {type_name} is part of the declarations of 2 modules: {module1} and {module2}! \
             Please consider moving {type_name} to a higher module that imports {module1} and {module2}. \
             You can also create a new NgModule that exports and includes {type_name} \
             then import that NgModule in {module1} and {module2}.")]
    DirectiveInTwoModules {
        type_name: String,
        module1: String,
        module2: String,
    },

    #[error("Can't compile synchronously as {component} is still being loaded!")]
    ComponentStillLoading { component: String },

    #[error("No {kind} annotation found on {symbol}!")]
    MissingAnnotation {
        kind: &'static str,
        symbol: String,
    },

    /// Programmer usage-order violation, e.g. querying directive metadata
    /// before the declaring module has been resolved.
    #[error("Illegal state: {message}")]
    IllegalState { message: String },
}
