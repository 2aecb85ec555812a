//! Compile Metadata
//!
//! The resolved, immutable record vocabulary produced by the metadata
//! resolver, together with the summary projections shared across module
//! boundaries. Summaries carry only what transitive resolution needs, so
//! resolving a module never re-derives a loaded template.

use crate::core::{
    AnimateStyles, AnimationEntryMetadata, AnimationKeyframesSequenceMetadata, AnimationMetadata,
    AnimationStateMetadata, AnimationStyleEntry, AnimationStyleMetadata, AnimationTimings,
    ChangeDetectionStrategy, LifecycleHook, RawToken, SchemaMetadata, TypeExpr, TypeRef,
    ViewEncapsulation,
};
use crate::util::split_at_colon;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

static HOST_REG_EXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(?:\[([^\]]+)\])|(?:\(([^)]+)\)))$").unwrap());

/// Reference to a declared type. Used as cache and map key; equality is
/// reference identity of the underlying symbol.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompileIdentifierMetadata {
    pub reference: TypeRef,
}

impl CompileIdentifierMetadata {
    pub fn new(reference: TypeRef) -> CompileIdentifierMetadata {
        CompileIdentifierMetadata { reference }
    }

    pub fn name(&self) -> &str {
        self.reference.name()
    }
}

impl fmt::Display for CompileIdentifierMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reference.name())
    }
}

/// Resolve a type expression into a canonical identifier.
pub fn identifier_for(type_expr: &TypeExpr) -> CompileIdentifierMetadata {
    CompileIdentifierMetadata::new(type_expr.resolve())
}

/// A dependency-injection token: a plain string value or an identifier.
/// Two tokens are equal iff same string value or same identifier reference.
#[derive(Clone, Debug, PartialEq)]
pub enum CompileTokenMetadata {
    Value(String),
    Identifier(CompileIdentifierMetadata),
}

impl CompileTokenMetadata {
    pub fn reference(&self) -> Option<&TypeRef> {
        match self {
            CompileTokenMetadata::Value(_) => None,
            CompileTokenMetadata::Identifier(identifier) => Some(&identifier.reference),
        }
    }
}

impl fmt::Display for CompileTokenMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileTokenMetadata::Value(value) => f.write_str(value),
            CompileTokenMetadata::Identifier(identifier) => f.write_str(identifier.name()),
        }
    }
}

/// Normalize a raw token. Returns `None` only for the reserved
/// entry-components collector, which never produces a compile token.
pub fn token_for(token: &RawToken) -> Option<CompileTokenMetadata> {
    match token {
        RawToken::Value(value) => Some(CompileTokenMetadata::Value(value.clone())),
        RawToken::Type(type_expr) => Some(CompileTokenMetadata::Identifier(identifier_for(
            type_expr,
        ))),
        RawToken::AnalyzeForEntryComponents => None,
    }
}

/// One resolved constructor/factory parameter.
/// `is_attribute` implies the token is a plain string (the attribute name).
#[derive(Clone, Debug, PartialEq)]
pub struct CompileDiDependencyMetadata {
    pub is_attribute: bool,
    pub is_host: bool,
    pub is_self: bool,
    pub is_skip_self: bool,
    pub is_optional: bool,
    pub token: CompileTokenMetadata,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileTypeMetadata {
    pub reference: TypeRef,
    /// Import origin in static-analysis environments.
    pub module_url: Option<String>,
    pub di_deps: Vec<CompileDiDependencyMetadata>,
    pub lifecycle_hooks: Vec<LifecycleHook>,
}

impl CompileTypeMetadata {
    pub fn identifier(&self) -> CompileIdentifierMetadata {
        CompileIdentifierMetadata::new(self.reference.clone())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileFactoryMetadata {
    pub reference: TypeRef,
    pub module_url: Option<String>,
    pub di_deps: Vec<CompileDiDependencyMetadata>,
}

/// Structural compile value produced from a provider `useValue` tree.
/// Embedded types become identifiers; everything else passes through
/// opaquely.
#[derive(Clone, Debug, PartialEq)]
pub enum CompileValue {
    Identifier(CompileIdentifierMetadata),
    Array(Vec<CompileValue>),
    Map(IndexMap<String, CompileValue>),
    Json(serde_json::Value),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileProviderMetadata {
    pub token: CompileTokenMetadata,
    pub use_class: Option<CompileTypeMetadata>,
    pub use_value: Option<CompileValue>,
    pub use_factory: Option<CompileFactoryMetadata>,
    pub use_existing: Option<CompileTokenMetadata>,
    pub deps: Option<Vec<CompileDiDependencyMetadata>>,
    pub multi: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileQueryMetadata {
    pub selectors: Vec<CompileTokenMetadata>,
    pub descendants: bool,
    pub first: bool,
    pub property_name: String,
    pub read: Option<CompileTokenMetadata>,
}

// Compile-side animation metadata, mirroring the annotation vocabulary
// after forward references inside it have been resolved away.

#[derive(Clone, Debug, PartialEq)]
pub struct CompileAnimationStyleMetadata {
    pub offset: Option<f64>,
    pub styles: Vec<AnimationStyleEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileAnimationKeyframesSequenceMetadata {
    pub steps: Vec<CompileAnimationStyleMetadata>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CompileAnimateStyles {
    Style(CompileAnimationStyleMetadata),
    Keyframes(CompileAnimationKeyframesSequenceMetadata),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileAnimationAnimateMetadata {
    pub timings: AnimationTimings,
    pub styles: Option<CompileAnimateStyles>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileAnimationSequenceMetadata {
    pub steps: Vec<CompileAnimationMetadata>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileAnimationGroupMetadata {
    pub steps: Vec<CompileAnimationMetadata>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CompileAnimationMetadata {
    Style(CompileAnimationStyleMetadata),
    Animate(CompileAnimationAnimateMetadata),
    Sequence(CompileAnimationSequenceMetadata),
    Group(CompileAnimationGroupMetadata),
    Keyframes(CompileAnimationKeyframesSequenceMetadata),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileAnimationStateDeclarationMetadata {
    pub state_name_expr: String,
    pub styles: CompileAnimationStyleMetadata,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileAnimationStateTransitionMetadata {
    pub state_change_expr: String,
    pub steps: CompileAnimationMetadata,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CompileAnimationStateMetadata {
    Declaration(CompileAnimationStateDeclarationMetadata),
    Transition(CompileAnimationStateTransitionMetadata),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileAnimationEntryMetadata {
    pub name: String,
    pub definitions: Vec<CompileAnimationStateMetadata>,
}

impl From<&AnimationStyleMetadata> for CompileAnimationStyleMetadata {
    fn from(style: &AnimationStyleMetadata) -> Self {
        CompileAnimationStyleMetadata {
            offset: style.offset,
            styles: style.styles.clone(),
        }
    }
}

impl From<&AnimationKeyframesSequenceMetadata> for CompileAnimationKeyframesSequenceMetadata {
    fn from(keyframes: &AnimationKeyframesSequenceMetadata) -> Self {
        CompileAnimationKeyframesSequenceMetadata {
            steps: keyframes.steps.iter().map(Into::into).collect(),
        }
    }
}

impl From<&AnimationMetadata> for CompileAnimationMetadata {
    fn from(metadata: &AnimationMetadata) -> Self {
        match metadata {
            AnimationMetadata::Style(style) => CompileAnimationMetadata::Style(style.into()),
            AnimationMetadata::Animate(animate) => {
                CompileAnimationMetadata::Animate(CompileAnimationAnimateMetadata {
                    timings: animate.timings.clone(),
                    styles: animate.styles.as_ref().map(|styles| match styles {
                        AnimateStyles::Style(style) => CompileAnimateStyles::Style(style.into()),
                        AnimateStyles::Keyframes(keyframes) => {
                            CompileAnimateStyles::Keyframes(keyframes.into())
                        }
                    }),
                })
            }
            AnimationMetadata::Sequence(sequence) => {
                CompileAnimationMetadata::Sequence(CompileAnimationSequenceMetadata {
                    steps: sequence.steps.iter().map(Into::into).collect(),
                })
            }
            AnimationMetadata::Group(group) => {
                CompileAnimationMetadata::Group(CompileAnimationGroupMetadata {
                    steps: group.steps.iter().map(Into::into).collect(),
                })
            }
            AnimationMetadata::Keyframes(keyframes) => {
                CompileAnimationMetadata::Keyframes(keyframes.into())
            }
        }
    }
}

impl From<&AnimationStateMetadata> for CompileAnimationStateMetadata {
    fn from(state: &AnimationStateMetadata) -> Self {
        match state {
            AnimationStateMetadata::Declaration(declaration) => {
                CompileAnimationStateMetadata::Declaration(
                    CompileAnimationStateDeclarationMetadata {
                        state_name_expr: declaration.state_name_expr.clone(),
                        styles: (&declaration.styles).into(),
                    },
                )
            }
            AnimationStateMetadata::Transition(transition) => {
                CompileAnimationStateMetadata::Transition(
                    CompileAnimationStateTransitionMetadata {
                        state_change_expr: transition.state_change_expr.clone(),
                        steps: (&transition.steps).into(),
                    },
                )
            }
        }
    }
}

impl From<&AnimationEntryMetadata> for CompileAnimationEntryMetadata {
    fn from(entry: &AnimationEntryMetadata) -> Self {
        CompileAnimationEntryMetadata {
            name: entry.name.clone(),
            definitions: entry.definitions.iter().map(Into::into).collect(),
        }
    }
}

/// Normalized template of a component. Produced in pre-normalized form by
/// the resolver, completed by the external template normalizer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompileTemplateMetadata {
    pub encapsulation: Option<ViewEncapsulation>,
    pub template: Option<String>,
    pub template_url: Option<String>,
    pub styles: Vec<String>,
    pub style_urls: Vec<String>,
    pub animations: Vec<CompileAnimationEntryMetadata>,
    pub ng_content_selectors: Vec<String>,
    pub interpolation: Option<(String, String)>,
}

/// Host bindings of a directive, classified by key shape.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostBindings {
    pub listeners: IndexMap<String, String>,
    pub properties: IndexMap<String, String>,
    pub attributes: IndexMap<String, String>,
}

/// Classify a raw host map: `[prop]` keys are property bindings, `(event)`
/// keys are listeners, anything else is a static attribute.
pub fn parse_host_bindings(host: &IndexMap<String, String>) -> HostBindings {
    let mut bindings = HostBindings::default();
    for (key, value) in host {
        match HOST_REG_EXP.captures(key) {
            None => {
                bindings.attributes.insert(key.clone(), value.clone());
            }
            Some(captures) => {
                if let Some(property) = captures.get(1) {
                    bindings
                        .properties
                        .insert(property.as_str().to_string(), value.clone());
                } else if let Some(event) = captures.get(2) {
                    bindings
                        .listeners
                        .insert(event.as_str().to_string(), value.clone());
                }
            }
        }
    }
    bindings
}

/// Expand `"dirProp: bindingProp"` binding configs into a map, defaulting
/// the binding name to the property name when no colon is present.
pub fn parse_property_bindings(configs: &[String]) -> IndexMap<String, String> {
    let mut bindings = IndexMap::new();
    for config in configs {
        let (dir_prop, binding_prop) = split_at_colon(config, (config, config));
        bindings.insert(dir_prop, binding_prop);
    }
    bindings
}

#[derive(Clone, Debug)]
pub struct CompileDirectiveMetadata {
    pub type_: CompileTypeMetadata,
    pub is_component: bool,
    pub selector: Option<String>,
    pub export_as: Option<String>,
    pub change_detection: Option<ChangeDetectionStrategy>,
    pub inputs: IndexMap<String, String>,
    pub outputs: IndexMap<String, String>,
    pub host_listeners: IndexMap<String, String>,
    pub host_properties: IndexMap<String, String>,
    pub host_attributes: IndexMap<String, String>,
    pub providers: Vec<CompileProviderMetadata>,
    pub view_providers: Vec<CompileProviderMetadata>,
    pub queries: Vec<CompileQueryMetadata>,
    pub view_queries: Vec<CompileQueryMetadata>,
    pub entry_components: Vec<CompileIdentifierMetadata>,
    pub template: Option<CompileTemplateMetadata>,
}

impl CompileDirectiveMetadata {
    pub fn to_summary(&self) -> CompileDirectiveSummary {
        CompileDirectiveSummary {
            type_: self.type_.identifier(),
            is_component: self.is_component,
            selector: self.selector.clone(),
            export_as: self.export_as.clone(),
            change_detection: self.change_detection,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            host_listeners: self.host_listeners.clone(),
            host_properties: self.host_properties.clone(),
            host_attributes: self.host_attributes.clone(),
        }
    }
}

/// What other modules need of a directive transitively; template and
/// provider detail are deliberately stripped.
#[derive(Clone, Debug, PartialEq)]
pub struct CompileDirectiveSummary {
    pub type_: CompileIdentifierMetadata,
    pub is_component: bool,
    pub selector: Option<String>,
    pub export_as: Option<String>,
    pub change_detection: Option<ChangeDetectionStrategy>,
    pub inputs: IndexMap<String, String>,
    pub outputs: IndexMap<String, String>,
    pub host_listeners: IndexMap<String, String>,
    pub host_properties: IndexMap<String, String>,
    pub host_attributes: IndexMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompilePipeMetadata {
    pub type_: CompileTypeMetadata,
    pub name: String,
    pub pure: bool,
}

impl CompilePipeMetadata {
    pub fn to_summary(&self) -> CompilePipeSummary {
        CompilePipeSummary {
            type_: self.type_.identifier(),
            name: self.name.clone(),
            pure: self.pure,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompilePipeSummary {
    pub type_: CompileIdentifierMetadata,
    pub name: String,
    pub pure: bool,
}

/// Deferred template-load request for one declared directive. Loaders are
/// plain records; the load driver supplies the resolution mode when it
/// drives them, so a forced-synchronous failure can be retried
/// asynchronously against the cached module.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectiveLoader {
    pub directive: TypeRef,
}

/// Injector-relevant projection of a module: what provider/entry-component
/// merging needs, in both import and export directions.
#[derive(Clone, Debug, PartialEq)]
pub struct CompileNgModuleInjectorSummary {
    pub type_: CompileIdentifierMetadata,
    pub entry_components: Vec<CompileIdentifierMetadata>,
    pub providers: Vec<CompileProviderMetadata>,
    pub imported_modules: Vec<Rc<CompileNgModuleInjectorSummary>>,
    pub exported_modules: Vec<Rc<CompileNgModuleInjectorSummary>>,
}

/// Directive-relevant projection of a module: what an import transitively
/// re-exports into the importer's compilation scope.
#[derive(Clone, Debug, PartialEq)]
pub struct CompileNgModuleDirectiveSummary {
    pub type_: CompileIdentifierMetadata,
    pub exported_directives: Vec<CompileIdentifierMetadata>,
    pub exported_pipes: Vec<CompileIdentifierMetadata>,
    pub exported_modules: Vec<Rc<CompileNgModuleDirectiveSummary>>,
    pub directive_loaders: Vec<DirectiveLoader>,
}

/// Combined module summary handed out by the resolver; both halves are
/// shared, immutable projections.
#[derive(Clone, Debug, PartialEq)]
pub struct CompileNgModuleSummary {
    pub injector: Rc<CompileNgModuleInjectorSummary>,
    pub directives: Rc<CompileNgModuleDirectiveSummary>,
}

impl CompileNgModuleSummary {
    pub fn type_(&self) -> &CompileIdentifierMetadata {
        &self.injector.type_
    }
}

/// The closure of everything a module reaches: dependency-ordered module
/// list, merged providers and entry components, the directives/pipes
/// visible to the module's own declarations, and the deferred directive
/// loaders. Frozen once the owning module is cached.
#[derive(Clone, Debug)]
pub struct TransitiveCompileNgModuleMetadata {
    pub modules: Vec<Rc<CompileNgModuleInjectorSummary>>,
    pub providers: Vec<CompileProviderMetadata>,
    pub entry_components: Vec<CompileIdentifierMetadata>,
    pub directives: Vec<CompileIdentifierMetadata>,
    pub pipes: Vec<CompileIdentifierMetadata>,
    pub directive_loaders: Vec<DirectiveLoader>,
}

/// Push-only builder for [`TransitiveCompileNgModuleMetadata`]. Lives only
/// for the duration of one module resolution and is consumed by `finish`;
/// the mutable aggregate is never shared outside that call.
pub struct TransitiveMetadataBuilder {
    modules: Vec<Rc<CompileNgModuleInjectorSummary>>,
    providers: Vec<CompileProviderMetadata>,
    entry_components: Vec<CompileIdentifierMetadata>,
    directives: Vec<CompileIdentifierMetadata>,
    pipes: Vec<CompileIdentifierMetadata>,
    directive_loaders: Vec<DirectiveLoader>,
    directives_set: HashSet<TypeRef>,
    pipes_set: HashSet<TypeRef>,
}

impl TransitiveMetadataBuilder {
    pub fn new(
        modules: Vec<Rc<CompileNgModuleInjectorSummary>>,
        providers: Vec<CompileProviderMetadata>,
        entry_components: Vec<CompileIdentifierMetadata>,
        directives: Vec<CompileIdentifierMetadata>,
        pipes: Vec<CompileIdentifierMetadata>,
        directive_loaders: Vec<DirectiveLoader>,
    ) -> TransitiveMetadataBuilder {
        let directives_set = directives
            .iter()
            .map(|directive| directive.reference.clone())
            .collect();
        let pipes_set = pipes.iter().map(|pipe| pipe.reference.clone()).collect();
        TransitiveMetadataBuilder {
            modules,
            providers,
            entry_components,
            directives,
            pipes,
            directive_loaders,
            directives_set,
            pipes_set,
        }
    }

    pub fn contains_directive(&self, type_ref: &TypeRef) -> bool {
        self.directives_set.contains(type_ref)
    }

    pub fn contains_pipe(&self, type_ref: &TypeRef) -> bool {
        self.pipes_set.contains(type_ref)
    }

    pub fn add_directive(&mut self, directive: CompileIdentifierMetadata) {
        self.directives_set.insert(directive.reference.clone());
        self.directives.push(directive);
    }

    pub fn add_pipe(&mut self, pipe: CompileIdentifierMetadata) {
        self.pipes_set.insert(pipe.reference.clone());
        self.pipes.push(pipe);
    }

    pub fn add_directive_loader(&mut self, loader: DirectiveLoader) {
        self.directive_loaders.push(loader);
    }

    pub fn extend_providers(
        &mut self,
        providers: impl IntoIterator<Item = CompileProviderMetadata>,
    ) {
        self.providers.extend(providers);
    }

    pub fn extend_entry_components(
        &mut self,
        entry_components: impl IntoIterator<Item = CompileIdentifierMetadata>,
    ) {
        self.entry_components.extend(entry_components);
    }

    pub fn add_module(&mut self, module: Rc<CompileNgModuleInjectorSummary>) {
        self.modules.push(module);
    }

    pub fn finish(self) -> TransitiveCompileNgModuleMetadata {
        TransitiveCompileNgModuleMetadata {
            modules: self.modules,
            providers: self.providers,
            entry_components: self.entry_components,
            directives: self.directives,
            pipes: self.pipes,
            directive_loaders: self.directive_loaders,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompileNgModuleMetadata {
    pub type_: CompileTypeMetadata,
    /// The module's own providers, module-with-providers extras included,
    /// in merge order (after everything transitive).
    pub providers: Vec<CompileProviderMetadata>,
    pub entry_components: Vec<CompileIdentifierMetadata>,
    pub bootstrap_components: Vec<CompileIdentifierMetadata>,
    pub schemas: Vec<SchemaMetadata>,
    pub declared_directives: Vec<CompileIdentifierMetadata>,
    pub exported_directives: Vec<CompileIdentifierMetadata>,
    pub declared_pipes: Vec<CompileIdentifierMetadata>,
    pub exported_pipes: Vec<CompileIdentifierMetadata>,
    pub imported_modules: Vec<CompileNgModuleSummary>,
    pub exported_modules: Vec<CompileNgModuleSummary>,
    pub transitive_module: TransitiveCompileNgModuleMetadata,
    pub id: Option<String>,
    /// Shared projections; the injector half is the same record that was
    /// appended to the module's own transitive module list.
    pub summary: CompileNgModuleSummary,
}

impl CompileNgModuleMetadata {
    pub fn to_summary(&self) -> CompileNgModuleSummary {
        self.summary.clone()
    }
}
