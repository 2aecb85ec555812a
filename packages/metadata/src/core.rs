//! Core Types
//!
//! Duplicates the annotation vocabulary of the runtime so the resolver does
//! not depend on it directly: view/change-detection enums, lifecycle hooks,
//! symbol handles, and the raw (unresolved) annotation records produced by
//! the external annotation-reading layer.

use crate::util::stringify_json;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ViewEncapsulation {
    Emulated = 0,
    Native = 1,
    None = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChangeDetectionStrategy {
    OnPush = 0,
    Default = 1,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub name: String,
}

pub fn custom_elements_schema() -> SchemaMetadata {
    SchemaMetadata {
        name: "custom-elements".to_string(),
    }
}

pub fn no_errors_schema() -> SchemaMetadata {
    SchemaMetadata {
        name: "no-errors-schema".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleHook {
    OnInit,
    OnDestroy,
    DoCheck,
    OnChanges,
    AfterContentInit,
    AfterContentChecked,
    AfterViewInit,
    AfterViewChecked,
}

pub const LIFECYCLE_HOOKS: [LifecycleHook; 8] = [
    LifecycleHook::OnInit,
    LifecycleHook::OnDestroy,
    LifecycleHook::DoCheck,
    LifecycleHook::OnChanges,
    LifecycleHook::AfterContentInit,
    LifecycleHook::AfterContentChecked,
    LifecycleHook::AfterViewInit,
    LifecycleHook::AfterViewChecked,
];

/// Handle for a program symbol (class or function). Cheap to clone;
/// equality and hashing are reference identity, never name comparison, so
/// two distinct symbols with the same display name stay distinct.
#[derive(Clone)]
pub struct TypeRef(Rc<TypeDef>);

struct TypeDef {
    name: String,
}

impl TypeRef {
    pub fn new(name: impl Into<String>) -> TypeRef {
        TypeRef(Rc::new(TypeDef { name: name.into() }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.0.name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// A reference to a symbol that is not defined yet at annotation time.
/// The thunk is evaluated whenever the reference is resolved.
#[derive(Clone)]
pub struct ForwardRef(Rc<dyn Fn() -> TypeRef>);

impl ForwardRef {
    pub fn new(thunk: impl Fn() -> TypeRef + 'static) -> ForwardRef {
        ForwardRef(Rc::new(thunk))
    }

    pub fn resolve(&self) -> TypeRef {
        (self.0)()
    }
}

impl fmt::Debug for ForwardRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ForwardRef(..)")
    }
}

/// A type position in an annotation: either a direct symbol handle or a
/// forward reference to one.
#[derive(Clone, Debug)]
pub enum TypeExpr {
    Type(TypeRef),
    Forward(ForwardRef),
}

impl TypeExpr {
    pub fn resolve(&self) -> TypeRef {
        resolve_forward_ref(self)
    }
}

impl From<TypeRef> for TypeExpr {
    fn from(type_ref: TypeRef) -> TypeExpr {
        TypeExpr::Type(type_ref)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resolve().name())
    }
}

pub fn resolve_forward_ref(expr: &TypeExpr) -> TypeRef {
    match expr {
        TypeExpr::Type(type_ref) => type_ref.clone(),
        TypeExpr::Forward(forward) => forward.resolve(),
    }
}

/// A raw injection token as written in an annotation.
#[derive(Clone, Debug)]
pub enum RawToken {
    Value(String),
    Type(TypeExpr),
    /// Reserved collector pseudo-token. Providers for it feed the
    /// entry-components sink and never appear in normalized provider
    /// output; `token_for` yields no compile token for it.
    AnalyzeForEntryComponents,
}

impl fmt::Display for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawToken::Value(value) => f.write_str(value),
            RawToken::Type(type_expr) => write!(f, "{}", type_expr),
            RawToken::AnalyzeForEntryComponents => f.write_str("AnalyzeForEntryComponents"),
        }
    }
}

/// One entry of a composite constructor-parameter descriptor.
#[derive(Clone, Debug)]
pub enum ParamEntry {
    Host,
    Self_,
    SkipSelf,
    Optional,
    /// Injects the value of the named attribute; forces a string token.
    Attribute(String),
    /// Explicit token override.
    Inject(RawToken),
    /// A plain type-like value; the first one encountered becomes the
    /// token unless a qualifier already set one.
    Token(RawToken),
}

/// A raw constructor-parameter descriptor: either a bare token or a list
/// of qualifier markers and token candidates.
#[derive(Clone, Debug)]
pub enum RawParam {
    Token(RawToken),
    Annotated(Vec<ParamEntry>),
}

/// Value tree for provider `useValue` declarations. Types may be embedded
/// at any depth; everything else is carried opaquely.
#[derive(Clone, Debug)]
pub enum RawValue {
    Type(TypeExpr),
    Array(Vec<RawValue>),
    Map(IndexMap<String, RawValue>),
    Json(serde_json::Value),
}

/// A provider literal, the `{provide, ...}` shorthand already lifted into
/// record shape by the annotation reader.
#[derive(Clone, Debug)]
pub struct ProviderLiteral {
    pub provide: RawToken,
    pub use_class: Option<TypeExpr>,
    pub use_value: Option<RawValue>,
    pub use_factory: Option<TypeExpr>,
    pub use_existing: Option<RawToken>,
    /// Explicit dependency list for class/factory providers; reflected
    /// parameters are used when absent.
    pub deps: Option<Vec<RawParam>>,
    pub multi: bool,
}

impl ProviderLiteral {
    pub fn new(provide: RawToken) -> ProviderLiteral {
        ProviderLiteral {
            provide,
            use_class: None,
            use_value: None,
            use_factory: None,
            use_existing: None,
            deps: None,
            multi: false,
        }
    }
}

/// One entry of a raw provider list.
#[derive(Clone, Debug)]
pub enum RawProvider {
    /// Type shorthand: the type provides itself.
    Type(TypeExpr),
    Literal(ProviderLiteral),
    /// Nested provider list; flattened recursively, order preserved.
    List(Vec<RawProvider>),
    /// Anything that is not a provider; fails normalization.
    Opaque(serde_json::Value),
}

impl fmt::Display for RawProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawProvider::Type(type_expr) => write!(f, "{}", type_expr),
            RawProvider::Literal(literal) => write!(f, "{{provide: {}}}", literal.provide),
            RawProvider::List(_) => f.write_str("[...]"),
            RawProvider::Opaque(value) => f.write_str(&stringify_json(value)),
        }
    }
}

/// An import carrying extra providers to merge into the importing module.
#[derive(Clone, Debug)]
pub struct ModuleWithProviders {
    pub ng_module: TypeExpr,
    pub providers: Vec<RawProvider>,
}

/// One entry of an annotation list (declarations, imports, exports, entry
/// components, bootstrap). Lists nest arbitrarily; the module-with-providers
/// wrapper is only meaningful inside `imports`.
#[derive(Clone, Debug)]
pub enum ModuleEntry {
    Type(TypeExpr),
    WithProviders(ModuleWithProviders),
    List(Vec<ModuleEntry>),
    Opaque(serde_json::Value),
}

impl fmt::Display for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleEntry::Type(type_expr) => write!(f, "{}", type_expr),
            ModuleEntry::WithProviders(with_providers) => {
                write!(f, "{{ngModule: {}}}", with_providers.ng_module)
            }
            ModuleEntry::List(_) => f.write_str("[...]"),
            ModuleEntry::Opaque(value) => f.write_str(&stringify_json(value)),
        }
    }
}

/// Selector of a content/view query.
#[derive(Clone, Debug)]
pub enum QuerySelector {
    /// Comma-separated template variable names.
    VarBindings(String),
    Token(RawToken),
}

#[derive(Clone, Debug)]
pub struct RawQuery {
    pub selector: QuerySelector,
    pub descendants: bool,
    pub first: bool,
    pub read: Option<RawToken>,
    pub is_view_query: bool,
}

// Animation annotation vocabulary. Closed variants; the resolver converts
// these structurally into their compile-side counterparts.

#[derive(Clone, Debug, PartialEq)]
pub enum AnimationStyleEntry {
    Name(String),
    Map(IndexMap<String, serde_json::Value>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationStyleMetadata {
    pub offset: Option<f64>,
    pub styles: Vec<AnimationStyleEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationKeyframesSequenceMetadata {
    pub steps: Vec<AnimationStyleMetadata>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnimationTimings {
    Millis(f64),
    Expr(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnimateStyles {
    Style(AnimationStyleMetadata),
    Keyframes(AnimationKeyframesSequenceMetadata),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationAnimateMetadata {
    pub timings: AnimationTimings,
    pub styles: Option<AnimateStyles>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationSequenceMetadata {
    pub steps: Vec<AnimationMetadata>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationGroupMetadata {
    pub steps: Vec<AnimationMetadata>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnimationMetadata {
    Style(AnimationStyleMetadata),
    Animate(AnimationAnimateMetadata),
    Sequence(AnimationSequenceMetadata),
    Group(AnimationGroupMetadata),
    Keyframes(AnimationKeyframesSequenceMetadata),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationStateDeclarationMetadata {
    pub state_name_expr: String,
    pub styles: AnimationStyleMetadata,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationStateTransitionMetadata {
    pub state_change_expr: String,
    pub steps: AnimationMetadata,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnimationStateMetadata {
    Declaration(AnimationStateDeclarationMetadata),
    Transition(AnimationStateTransitionMetadata),
}

/// A named animation trigger and its state/transition definitions.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationEntryMetadata {
    pub name: String,
    pub definitions: Vec<AnimationStateMetadata>,
}

/// Component-only annotation fields.
#[derive(Clone, Debug, Default)]
pub struct ComponentAnnotation {
    pub change_detection: Option<ChangeDetectionStrategy>,
    pub view_providers: Vec<RawProvider>,
    pub entry_components: Vec<ModuleEntry>,
    pub template: Option<String>,
    pub template_url: Option<String>,
    pub styles: Vec<String>,
    pub style_urls: Vec<String>,
    pub animations: Vec<AnimationEntryMetadata>,
    pub interpolation: Option<(String, String)>,
    pub encapsulation: Option<ViewEncapsulation>,
}

/// Raw directive annotation. `component` is `Some` for components; this is
/// the single discriminant between the two kinds.
#[derive(Clone, Debug, Default)]
pub struct DirectiveAnnotation {
    pub selector: Option<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub host: IndexMap<String, String>,
    pub providers: Vec<RawProvider>,
    pub queries: IndexMap<String, RawQuery>,
    pub export_as: Option<String>,
    pub component: Option<ComponentAnnotation>,
}

#[derive(Clone, Debug)]
pub struct PipeAnnotation {
    pub name: String,
    pub pure: bool,
}

#[derive(Clone, Debug, Default)]
pub struct NgModuleAnnotation {
    pub providers: Vec<RawProvider>,
    pub declarations: Vec<ModuleEntry>,
    pub imports: Vec<ModuleEntry>,
    pub exports: Vec<ModuleEntry>,
    pub entry_components: Vec<ModuleEntry>,
    pub bootstrap: Vec<ModuleEntry>,
    pub schemas: Vec<SchemaMetadata>,
    pub id: Option<String>,
}
