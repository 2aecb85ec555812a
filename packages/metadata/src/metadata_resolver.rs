//! Metadata Resolver
//!
//! The root of the crate: resolves raw annotations into cached compile
//! metadata records and builds per-module transitive summaries. All caches
//! are owned instance state; nothing is cached until a resolution succeeds
//! completely, so a failed resolution can be retried after fixing input.

use crate::annotation_reader::AnnotationReader;
use crate::compile_metadata::{
    identifier_for, token_for, CompileDiDependencyMetadata, CompileDirectiveMetadata,
    CompileDirectiveSummary, CompileFactoryMetadata, CompileIdentifierMetadata,
    CompileNgModuleDirectiveSummary, CompileNgModuleInjectorSummary, CompileNgModuleMetadata,
    CompileNgModuleSummary, CompilePipeMetadata, CompilePipeSummary, CompileProviderMetadata,
    CompileQueryMetadata, CompileTemplateMetadata, CompileTokenMetadata, CompileTypeMetadata,
    CompileValue, DirectiveLoader, TransitiveMetadataBuilder, parse_host_bindings,
    parse_property_bindings,
};
use crate::core::{
    ModuleEntry, ModuleWithProviders, ParamEntry, ProviderLiteral, QuerySelector, RawParam,
    RawProvider, RawQuery, RawValue, SchemaMetadata, TypeRef, LIFECYCLE_HOOKS,
};
use crate::directive_normalizer::{PrenormalizedTemplateMetadata, TemplateNormalizer};
use crate::error::{MetadataError, Result};
use crate::reflection::{LifecycleReflector, ReflectorReader};
use crate::schema_registry::ElementSchemaRegistry;
use crate::util::{stringify_json, Deferred, SyncAsync};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A directive whose template needs a deferred load before its metadata can
/// be finalized. Handed back by the resolver on the asynchronous path and
/// completed via [`CompileMetadataResolver::complete_directive_load`].
#[derive(Debug)]
pub struct PendingDirectiveLoad {
    directive: TypeRef,
    partial: CompileDirectiveMetadata,
    template: Deferred<CompileTemplateMetadata>,
}

impl PendingDirectiveLoad {
    pub fn directive(&self) -> &TypeRef {
        &self.directive
    }
}

/// Result of driving a module's directive loaders: the resolved module plus
/// whatever template loads are still outstanding.
#[derive(Debug)]
pub struct LoadedNgModule {
    pub ng_module: Rc<CompileNgModuleMetadata>,
    pub pending: Vec<PendingDirectiveLoad>,
}

impl LoadedNgModule {
    pub fn is_fully_loaded(&self) -> bool {
        self.pending.is_empty()
    }
}

pub struct CompileMetadataResolver {
    annotation_reader: Rc<dyn AnnotationReader>,
    reflector: Rc<dyn ReflectorReader>,
    normalizer: Rc<dyn TemplateNormalizer>,
    schema_registry: Rc<dyn ElementSchemaRegistry>,
    lifecycle_reflector: Rc<dyn LifecycleReflector>,
    directive_cache: HashMap<TypeRef, Rc<CompileDirectiveMetadata>>,
    directive_summary_cache: HashMap<TypeRef, Rc<CompileDirectiveSummary>>,
    pipe_cache: HashMap<TypeRef, Rc<CompilePipeMetadata>>,
    pipe_summary_cache: HashMap<TypeRef, Rc<CompilePipeSummary>>,
    ng_module_cache: HashMap<TypeRef, Rc<CompileNgModuleMetadata>>,
    ng_module_of_types: HashMap<TypeRef, TypeRef>,
}

impl CompileMetadataResolver {
    pub fn new(
        annotation_reader: Rc<dyn AnnotationReader>,
        reflector: Rc<dyn ReflectorReader>,
        normalizer: Rc<dyn TemplateNormalizer>,
        schema_registry: Rc<dyn ElementSchemaRegistry>,
        lifecycle_reflector: Rc<dyn LifecycleReflector>,
    ) -> CompileMetadataResolver {
        CompileMetadataResolver {
            annotation_reader,
            reflector,
            normalizer,
            schema_registry,
            lifecycle_reflector,
            directive_cache: HashMap::new(),
            directive_summary_cache: HashMap::new(),
            pipe_cache: HashMap::new(),
            pipe_summary_cache: HashMap::new(),
            ng_module_cache: HashMap::new(),
            ng_module_of_types: HashMap::new(),
        }
    }

    /// Drop the cache entries of one type. Module summaries embed directive
    /// data transitively and cannot be patched selectively, so the whole
    /// module cache goes with it.
    pub fn clear_cache_for(&mut self, type_ref: &TypeRef) {
        self.directive_cache.remove(type_ref);
        self.directive_summary_cache.remove(type_ref);
        self.pipe_cache.remove(type_ref);
        self.pipe_summary_cache.remove(type_ref);
        self.ng_module_of_types.remove(type_ref);
        self.ng_module_cache.clear();
    }

    pub fn clear_cache(&mut self) {
        self.directive_cache.clear();
        self.directive_summary_cache.clear();
        self.pipe_cache.clear();
        self.pipe_summary_cache.clear();
        self.ng_module_cache.clear();
        self.ng_module_of_types.clear();
    }

    // ----- directives -----

    /// Build and cache the metadata of one directive. Returns `Ok(None)`
    /// when the directive is already cached or could be finalized
    /// immediately; returns the pending load when its template needs a
    /// deferred fetch and `is_sync` permits one.
    pub fn load_directive_metadata(
        &mut self,
        directive_type: &TypeRef,
        is_sync: bool,
    ) -> Result<Option<PendingDirectiveLoad>> {
        if self.directive_cache.contains_key(directive_type) {
            return Ok(None);
        }
        let annotation = self
            .annotation_reader
            .resolve_directive(directive_type)
            .ok_or_else(|| MetadataError::MissingAnnotation {
                kind: "Directive",
                symbol: directive_type.to_string(),
            })?;

        let mut entry_components: Vec<CompileIdentifierMetadata> = Vec::new();
        let mut view_providers: Vec<CompileProviderMetadata> = Vec::new();
        let mut change_detection = None;
        let mut prenormalized: Option<PrenormalizedTemplateMetadata> = None;

        if let Some(component) = &annotation.component {
            change_detection = component.change_detection;
            if !component.view_providers.is_empty() {
                view_providers = self.get_providers_metadata(
                    &component.view_providers,
                    &mut entry_components,
                    &format!("viewProviders for \"{}\"", directive_type),
                )?;
            }
            if !component.entry_components.is_empty() {
                let mut explicit = self.identifiers_from_list(
                    &component.entry_components,
                    "entryComponents",
                    directive_type,
                )?;
                explicit.append(&mut entry_components);
                entry_components = explicit;
            }
            prenormalized = Some(PrenormalizedTemplateMetadata {
                component_type: directive_type.clone(),
                module_url: self.reflector.import_uri(directive_type),
                encapsulation: component.encapsulation,
                template: component.template.clone(),
                template_url: component.template_url.clone(),
                styles: component.styles.clone(),
                style_urls: component.style_urls.clone(),
                animations: component.animations.iter().map(Into::into).collect(),
                interpolation: component.interpolation.clone(),
            });
        }

        let selector = match (&annotation.component, &annotation.selector) {
            (_, Some(selector)) if !selector.is_empty() => selector.clone(),
            (Some(_), _) => self.schema_registry.get_default_component_element_name(),
            (None, _) => {
                return Err(MetadataError::MissingSelector {
                    directive: directive_type.to_string(),
                })
            }
        };

        let providers = if annotation.providers.is_empty() {
            Vec::new()
        } else {
            self.get_providers_metadata(
                &annotation.providers,
                &mut entry_components,
                &format!("providers for \"{}\"", directive_type),
            )?
        };

        let queries = self.get_queries_metadata(&annotation.queries, false)?;
        let view_queries = self.get_queries_metadata(&annotation.queries, true)?;
        let host_bindings = parse_host_bindings(&annotation.host);

        let partial = CompileDirectiveMetadata {
            type_: self.get_type_metadata(directive_type, None)?,
            is_component: annotation.component.is_some(),
            selector: Some(selector),
            export_as: annotation.export_as.clone(),
            change_detection,
            inputs: parse_property_bindings(&annotation.inputs),
            outputs: parse_property_bindings(&annotation.outputs),
            host_listeners: host_bindings.listeners,
            host_properties: host_bindings.properties,
            host_attributes: host_bindings.attributes,
            providers,
            view_providers,
            queries,
            view_queries,
            entry_components,
            template: None,
        };

        match prenormalized {
            None => {
                self.cache_directive(directive_type.clone(), partial);
                Ok(None)
            }
            Some(template) => match self.normalizer.normalize_template(template)? {
                SyncAsync::Sync(template_metadata) => {
                    let mut metadata = partial;
                    metadata.template = Some(template_metadata);
                    self.cache_directive(directive_type.clone(), metadata);
                    Ok(None)
                }
                SyncAsync::Async(deferred) => {
                    if is_sync {
                        return Err(MetadataError::ComponentStillLoading {
                            component: directive_type.to_string(),
                        });
                    }
                    Ok(Some(PendingDirectiveLoad {
                        directive: directive_type.clone(),
                        partial,
                        template: deferred,
                    }))
                }
            },
        }
    }

    /// Finalize a deferred directive load: run the template thunk and cache
    /// the completed metadata.
    pub fn complete_directive_load(
        &mut self,
        pending: PendingDirectiveLoad,
    ) -> Result<Rc<CompileDirectiveMetadata>> {
        if let Some(existing) = self.directive_cache.get(&pending.directive) {
            return Ok(Rc::clone(existing));
        }
        let template = pending.template.resolve()?;
        let mut metadata = pending.partial;
        metadata.template = Some(template);
        Ok(self.cache_directive(pending.directive, metadata))
    }

    fn cache_directive(
        &mut self,
        directive_type: TypeRef,
        metadata: CompileDirectiveMetadata,
    ) -> Rc<CompileDirectiveMetadata> {
        let metadata = Rc::new(metadata);
        self.directive_summary_cache
            .insert(directive_type.clone(), Rc::new(metadata.to_summary()));
        self.directive_cache
            .insert(directive_type, Rc::clone(&metadata));
        metadata
    }

    pub fn get_directive_metadata(
        &self,
        directive_type: &TypeRef,
    ) -> Result<Rc<CompileDirectiveMetadata>> {
        self.directive_cache
            .get(directive_type)
            .cloned()
            .ok_or_else(|| MetadataError::IllegalState {
                message: format!(
                    "get_directive_metadata can only be called after load_ng_module_metadata \
                     for a module that declares it. Directive {}.",
                    directive_type
                ),
            })
    }

    pub fn get_directive_summary(
        &self,
        directive_type: &TypeRef,
    ) -> Result<Rc<CompileDirectiveSummary>> {
        self.directive_summary_cache
            .get(directive_type)
            .cloned()
            .ok_or_else(|| MetadataError::IllegalState {
                message: format!(
                    "get_directive_summary can only be called after load_ng_module_metadata \
                     for a module that declares it. Directive {}.",
                    directive_type
                ),
            })
    }

    // ----- pipes -----

    fn load_pipe_metadata(&mut self, pipe_type: &TypeRef) -> Result<Rc<CompilePipeMetadata>> {
        let annotation = self
            .annotation_reader
            .resolve_pipe(pipe_type)
            .ok_or_else(|| MetadataError::MissingAnnotation {
                kind: "Pipe",
                symbol: pipe_type.to_string(),
            })?;
        let metadata = Rc::new(CompilePipeMetadata {
            type_: self.get_type_metadata(pipe_type, None)?,
            name: annotation.name,
            pure: annotation.pure,
        });
        self.pipe_summary_cache
            .insert(pipe_type.clone(), Rc::new(metadata.to_summary()));
        self.pipe_cache
            .insert(pipe_type.clone(), Rc::clone(&metadata));
        Ok(metadata)
    }

    pub fn get_or_load_pipe_metadata(
        &mut self,
        pipe_type: &TypeRef,
    ) -> Result<Rc<CompilePipeMetadata>> {
        match self.pipe_cache.get(pipe_type) {
            Some(cached) => Ok(Rc::clone(cached)),
            None => self.load_pipe_metadata(pipe_type),
        }
    }

    pub fn get_pipe_metadata(&self, pipe_type: &TypeRef) -> Result<Rc<CompilePipeMetadata>> {
        self.pipe_cache
            .get(pipe_type)
            .cloned()
            .ok_or_else(|| MetadataError::IllegalState {
                message: format!(
                    "get_pipe_metadata can only be called after load_ng_module_metadata \
                     for a module that declares it. Pipe {}.",
                    pipe_type
                ),
            })
    }

    pub fn get_pipe_summary(&self, pipe_type: &TypeRef) -> Result<Rc<CompilePipeSummary>> {
        self.pipe_summary_cache
            .get(pipe_type)
            .cloned()
            .ok_or_else(|| MetadataError::IllegalState {
                message: format!(
                    "get_pipe_summary can only be called after load_ng_module_metadata \
                     for a module that declares it. Pipe {}.",
                    pipe_type
                ),
            })
    }

    // ----- modules -----

    pub fn get_ng_module_summary(
        &mut self,
        module_type: &TypeRef,
    ) -> Result<Option<CompileNgModuleSummary>> {
        Ok(self
            .get_ng_module_metadata(module_type, false)?
            .map(|metadata| metadata.to_summary()))
    }

    /// Resolve a module and everything it reaches. `throw_if_not_found`
    /// turns a missing module annotation into `Ok(None)` instead of an
    /// error, supporting optional module probing.
    pub fn get_ng_module_metadata(
        &mut self,
        module_type: &TypeRef,
        throw_if_not_found: bool,
    ) -> Result<Option<Rc<CompileNgModuleMetadata>>> {
        if let Some(cached) = self.ng_module_cache.get(module_type) {
            return Ok(Some(Rc::clone(cached)));
        }
        let annotation = match self.annotation_reader.resolve_module(module_type) {
            Some(annotation) => annotation,
            None => {
                if throw_if_not_found {
                    return Err(MetadataError::MissingAnnotation {
                        kind: "NgModule",
                        symbol: module_type.to_string(),
                    });
                }
                return Ok(None);
            }
        };

        let mut providers: Vec<CompileProviderMetadata> = Vec::new();
        let mut entry_components: Vec<CompileIdentifierMetadata> = Vec::new();
        let mut imported_modules: Vec<CompileNgModuleSummary> = Vec::new();
        let mut exported_modules: Vec<CompileNgModuleSummary> = Vec::new();
        let mut exported_non_module_identifiers: Vec<CompileIdentifierMetadata> = Vec::new();

        // Imports strictly first: they may carry extra providers, and the
        // transitive sets below depend on their summaries.
        for imported in flatten_entries(&annotation.imports, true) {
            match imported {
                FlatModuleEntry::Type(imported_type) => {
                    self.import_module_summary(&imported_type, module_type, &mut imported_modules)?;
                }
                FlatModuleEntry::WithProviders(with_providers) => {
                    let imported_type = with_providers.ng_module.resolve();
                    if !with_providers.providers.is_empty() {
                        let context = format!("provider for the NgModule '{}'", imported_type);
                        providers.extend(self.get_providers_metadata(
                            &with_providers.providers,
                            &mut entry_components,
                            &context,
                        )?);
                    }
                    self.import_module_summary(&imported_type, module_type, &mut imported_modules)?;
                }
                FlatModuleEntry::Opaque(value) => {
                    return Err(MetadataError::InvalidImport {
                        kind: opaque_descriptor(&value),
                        value: stringify_json(&value),
                        module: module_type.to_string(),
                    });
                }
            }
        }

        // Exports: module exports re-export their whole surface, all other
        // identifiers are classified once the transitive sets exist.
        for exported in flatten_entries(&annotation.exports, true) {
            match exported {
                FlatModuleEntry::Type(exported_type) => {
                    match self.get_ng_module_summary(&exported_type)? {
                        Some(summary) => exported_modules.push(summary),
                        None => exported_non_module_identifiers
                            .push(CompileIdentifierMetadata::new(exported_type)),
                    }
                }
                FlatModuleEntry::WithProviders(with_providers) => {
                    return Err(MetadataError::InvalidExport {
                        value: with_providers.ng_module.to_string(),
                        module: module_type.to_string(),
                    });
                }
                FlatModuleEntry::Opaque(value) => {
                    return Err(MetadataError::InvalidExport {
                        value: stringify_json(&value),
                        module: module_type.to_string(),
                    });
                }
            }
        }

        let mut transitive = self.get_transitive_metadata(&imported_modules, &exported_modules);

        let mut declared_directives: Vec<CompileIdentifierMetadata> = Vec::new();
        let mut declared_pipes: Vec<CompileIdentifierMetadata> = Vec::new();
        for declared in flatten_entries(&annotation.declarations, true) {
            let declared_type = match declared {
                FlatModuleEntry::Type(declared_type) => declared_type,
                FlatModuleEntry::WithProviders(with_providers) => {
                    return Err(MetadataError::InvalidDeclaration {
                        kind: "value",
                        value: with_providers.ng_module.to_string(),
                        module: module_type.to_string(),
                    });
                }
                FlatModuleEntry::Opaque(value) => {
                    return Err(MetadataError::InvalidDeclaration {
                        kind: opaque_descriptor(&value),
                        value: stringify_json(&value),
                        module: module_type.to_string(),
                    });
                }
            };
            let identifier = CompileIdentifierMetadata::new(declared_type.clone());
            if self.annotation_reader.is_directive(&declared_type) {
                transitive.add_directive(identifier.clone());
                declared_directives.push(identifier);
                self.add_type_to_module(&declared_type, module_type)?;
                // Declarations are fast; template loading is not. The
                // loader is driven later by load_ng_module_metadata.
                transitive.add_directive_loader(DirectiveLoader {
                    directive: declared_type,
                });
            } else if self.annotation_reader.is_pipe(&declared_type) {
                transitive.add_pipe(identifier.clone());
                declared_pipes.push(identifier);
                self.add_type_to_module(&declared_type, module_type)?;
                self.load_pipe_metadata(&declared_type)?;
            } else {
                return Err(MetadataError::InvalidDeclaration {
                    kind: self.type_descriptor(&declared_type),
                    value: declared_type.to_string(),
                    module: module_type.to_string(),
                });
            }
        }

        // Non-module exports must be declared locally or visible through an
        // import by now.
        let mut exported_directives: Vec<CompileIdentifierMetadata> = Vec::new();
        let mut exported_pipes: Vec<CompileIdentifierMetadata> = Vec::new();
        for exported_id in exported_non_module_identifiers {
            if transitive.contains_directive(&exported_id.reference) {
                exported_directives.push(exported_id);
            } else if transitive.contains_pipe(&exported_id.reference) {
                exported_pipes.push(exported_id);
            } else {
                return Err(MetadataError::UndeclaredExport {
                    kind: self.type_descriptor(&exported_id.reference),
                    value: exported_id.to_string(),
                    module: module_type.to_string(),
                });
            }
        }

        // The module's own providers go last so they overwrite anything the
        // transitive closure pulled in.
        if !annotation.providers.is_empty() {
            let context = format!("provider for the NgModule '{}'", module_type);
            providers.extend(self.get_providers_metadata(
                &annotation.providers,
                &mut entry_components,
                &context,
            )?);
        }
        if !annotation.entry_components.is_empty() {
            entry_components.extend(self.identifiers_from_list(
                &annotation.entry_components,
                "entryComponents",
                module_type,
            )?);
        }
        let mut bootstrap_components: Vec<CompileIdentifierMetadata> = Vec::new();
        if !annotation.bootstrap.is_empty() {
            bootstrap_components = self.identifiers_from_list(
                &annotation.bootstrap,
                "bootstrap",
                module_type,
            )?;
        }
        // A bootstrapped component is implicitly an entry component.
        entry_components.extend(bootstrap_components.iter().cloned());

        let mut schemas: Vec<SchemaMetadata> = Vec::new();
        let mut seen_schemas: HashSet<String> = HashSet::new();
        for schema in &annotation.schemas {
            if seen_schemas.insert(schema.name.clone()) {
                schemas.push(schema.clone());
            }
        }

        transitive.extend_providers(providers.iter().cloned());
        transitive.extend_entry_components(entry_components.iter().cloned());

        let type_metadata = self.get_type_metadata(module_type, None)?;
        let injector_summary = Rc::new(CompileNgModuleInjectorSummary {
            type_: type_metadata.identifier(),
            entry_components: entry_components.clone(),
            providers: providers.clone(),
            imported_modules: imported_modules
                .iter()
                .map(|summary| Rc::clone(&summary.injector))
                .collect(),
            exported_modules: exported_modules
                .iter()
                .map(|summary| Rc::clone(&summary.injector))
                .collect(),
        });
        // Consumers resolving against this module's summary must see it in
        // its own closure.
        transitive.add_module(Rc::clone(&injector_summary));
        let transitive_module = transitive.finish();

        let directive_summary = Rc::new(CompileNgModuleDirectiveSummary {
            type_: type_metadata.identifier(),
            exported_directives: exported_directives.clone(),
            exported_pipes: exported_pipes.clone(),
            exported_modules: exported_modules
                .iter()
                .map(|summary| Rc::clone(&summary.directives))
                .collect(),
            directive_loaders: transitive_module.directive_loaders.clone(),
        });

        let metadata = Rc::new(CompileNgModuleMetadata {
            type_: type_metadata,
            providers,
            entry_components,
            bootstrap_components,
            schemas,
            declared_directives,
            exported_directives,
            declared_pipes,
            exported_pipes,
            imported_modules,
            exported_modules,
            transitive_module,
            id: annotation.id.clone(),
            summary: CompileNgModuleSummary {
                injector: injector_summary,
                directives: directive_summary,
            },
        });
        self.ng_module_cache
            .insert(module_type.clone(), Rc::clone(&metadata));
        Ok(Some(metadata))
    }

    /// Resolve a module and drive all of its directive loaders. Callers
    /// needing full readiness (including deferred template loads) must use
    /// this entry point rather than the bare resolver.
    pub fn load_ng_module_metadata(
        &mut self,
        module_type: &TypeRef,
        is_sync: bool,
        throw_if_not_found: bool,
    ) -> Result<Option<LoadedNgModule>> {
        let ng_module = match self.get_ng_module_metadata(module_type, throw_if_not_found)? {
            Some(ng_module) => ng_module,
            None => return Ok(None),
        };
        let loaders = ng_module.transitive_module.directive_loaders.clone();
        let mut pending = Vec::new();
        for loader in loaders {
            if let Some(load) = self.load_directive_metadata(&loader.directive, is_sync)? {
                pending.push(load);
            }
        }
        Ok(Some(LoadedNgModule { ng_module, pending }))
    }

    /// Complete every outstanding load, in order.
    pub fn complete_pending_loads(&mut self, pending: Vec<PendingDirectiveLoad>) -> Result<()> {
        for load in pending {
            self.complete_directive_load(load)?;
        }
        Ok(())
    }

    fn import_module_summary(
        &mut self,
        imported_type: &TypeRef,
        module_type: &TypeRef,
        imported_modules: &mut Vec<CompileNgModuleSummary>,
    ) -> Result<()> {
        match self.get_ng_module_summary(imported_type)? {
            Some(summary) => {
                imported_modules.push(summary);
                Ok(())
            }
            None => Err(MetadataError::InvalidImport {
                kind: self.type_descriptor(imported_type),
                value: imported_type.to_string(),
                module: module_type.to_string(),
            }),
        }
    }

    /// Two independent post-order closures: providers/entry components flow
    /// through imports and exports both, while the directives/pipes visible
    /// to this module come only from what its imports transitively export.
    fn get_transitive_metadata(
        &self,
        imported_modules: &[CompileNgModuleSummary],
        exported_modules: &[CompileNgModuleSummary],
    ) -> TransitiveMetadataBuilder {
        let injector_roots: Vec<Rc<CompileNgModuleInjectorSummary>> = imported_modules
            .iter()
            .chain(exported_modules)
            .map(|summary| Rc::clone(&summary.injector))
            .collect();
        let mut modules = Vec::new();
        let mut visited = HashSet::new();
        collect_transitive_imported_modules(&injector_roots, &mut modules, &mut visited);
        let providers = modules
            .iter()
            .flat_map(|module| module.providers.iter().cloned())
            .collect();
        let entry_components = modules
            .iter()
            .flat_map(|module| module.entry_components.iter().cloned())
            .collect();

        let directive_roots: Vec<Rc<CompileNgModuleDirectiveSummary>> = imported_modules
            .iter()
            .map(|summary| Rc::clone(&summary.directives))
            .collect();
        let mut exporting_modules = Vec::new();
        let mut visited_exports = HashSet::new();
        collect_transitive_exported_modules(
            &directive_roots,
            &mut exporting_modules,
            &mut visited_exports,
        );
        let directives = exporting_modules
            .iter()
            .flat_map(|module| module.exported_directives.iter().cloned())
            .collect();
        let pipes = exporting_modules
            .iter()
            .flat_map(|module| module.exported_pipes.iter().cloned())
            .collect();
        let directive_loaders = exporting_modules
            .iter()
            .flat_map(|module| module.directive_loaders.iter().cloned())
            .collect();

        TransitiveMetadataBuilder::new(
            modules,
            providers,
            entry_components,
            directives,
            pipes,
            directive_loaders,
        )
    }

    /// A directive or pipe may be declared by exactly one module, ever.
    fn add_type_to_module(&mut self, type_ref: &TypeRef, module_type: &TypeRef) -> Result<()> {
        match self.ng_module_of_types.get(type_ref) {
            Some(owner) if owner != module_type => Err(MetadataError::DirectiveInTwoModules {
                type_name: type_ref.to_string(),
                module1: owner.to_string(),
                module2: module_type.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.ng_module_of_types
                    .insert(type_ref.clone(), module_type.clone());
                Ok(())
            }
        }
    }

    // ----- providers -----

    /// Flatten, forward-ref-resolve and normalize a raw provider list.
    /// Providers for the reserved collector token contribute registered
    /// directives to `target_entry_components` instead of the output.
    fn get_providers_metadata(
        &self,
        providers: &[RawProvider],
        target_entry_components: &mut Vec<CompileIdentifierMetadata>,
        debug_info: &str,
    ) -> Result<Vec<CompileProviderMetadata>> {
        let mut compile_providers = Vec::new();
        for (provider_idx, provider) in providers.iter().enumerate() {
            match provider {
                RawProvider::List(nested) => {
                    compile_providers.extend(self.get_providers_metadata(
                        nested,
                        target_entry_components,
                        debug_info,
                    )?);
                }
                RawProvider::Literal(literal) => match token_for(&literal.provide) {
                    None => target_entry_components
                        .extend(self.get_entry_components_from_provider(literal)?),
                    Some(token) => {
                        compile_providers.push(self.get_provider_metadata(token, literal)?)
                    }
                },
                RawProvider::Type(type_expr) => {
                    let type_metadata = self.get_type_metadata(&type_expr.resolve(), None)?;
                    compile_providers.push(CompileProviderMetadata {
                        token: CompileTokenMetadata::Identifier(type_metadata.identifier()),
                        deps: Some(type_metadata.di_deps.clone()),
                        use_class: Some(type_metadata),
                        use_value: None,
                        use_factory: None,
                        use_existing: None,
                        multi: false,
                    });
                }
                RawProvider::Opaque(_) => {
                    return Err(invalid_provider_error(providers, provider_idx, debug_info));
                }
            }
        }
        Ok(compile_providers)
    }

    fn get_provider_metadata(
        &self,
        token: CompileTokenMetadata,
        literal: &ProviderLiteral,
    ) -> Result<CompileProviderMetadata> {
        let mut compile_deps = None;
        let mut use_class = None;
        let mut use_factory = None;
        if let Some(class_expr) = &literal.use_class {
            let type_metadata =
                self.get_type_metadata(&class_expr.resolve(), literal.deps.as_deref())?;
            compile_deps = Some(type_metadata.di_deps.clone());
            use_class = Some(type_metadata);
        } else if let Some(factory_expr) = &literal.use_factory {
            let factory_metadata =
                self.get_factory_metadata(&factory_expr.resolve(), literal.deps.as_deref())?;
            compile_deps = Some(factory_metadata.di_deps.clone());
            use_factory = Some(factory_metadata);
        }
        Ok(CompileProviderMetadata {
            token,
            use_class,
            use_value: literal
                .use_value
                .as_ref()
                .map(|value| convert_to_compile_value(value, &mut Vec::new())),
            use_factory,
            use_existing: literal
                .use_existing
                .as_ref()
                .and_then(token_for),
            deps: compile_deps,
            multi: literal.multi,
        })
    }

    /// The reserved collector accepts only a multi useValue provider; its
    /// value is deep-scanned for registered directives.
    fn get_entry_components_from_provider(
        &self,
        literal: &ProviderLiteral,
    ) -> Result<Vec<CompileIdentifierMetadata>> {
        if literal.use_class.is_some()
            || literal.use_factory.is_some()
            || literal.use_existing.is_some()
        {
            return Err(MetadataError::EntryComponentsOnlyUseValue);
        }
        if !literal.multi {
            return Err(MetadataError::EntryComponentsOnlyMulti);
        }
        let mut collected = Vec::new();
        if let Some(value) = &literal.use_value {
            convert_to_compile_value(value, &mut collected);
        }
        Ok(collected
            .into_iter()
            .filter(|identifier| self.annotation_reader.is_directive(&identifier.reference))
            .collect())
    }

    // ----- dependencies -----

    /// One DI dependency per constructor parameter. Unresolvable tokens are
    /// accumulated so the diagnostic can enumerate every parameter, with
    /// `?` placeholders for the unresolved ones.
    fn get_dependencies_metadata(
        &self,
        symbol: &TypeRef,
        dependencies: Option<&[RawParam]>,
    ) -> Result<Vec<CompileDiDependencyMetadata>> {
        let reflected;
        let params: &[RawParam] = match dependencies {
            Some(explicit) => explicit,
            None => {
                reflected = self.reflector.parameters(symbol).unwrap_or_default();
                &reflected
            }
        };
        let mut has_unknown_deps = false;
        let mut dependencies_metadata: Vec<Option<CompileDiDependencyMetadata>> = Vec::new();
        for param in params {
            let mut is_attribute = false;
            let mut is_host = false;
            let mut is_self = false;
            let mut is_skip_self = false;
            let mut is_optional = false;
            let mut token: Option<CompileTokenMetadata> = None;
            match param {
                RawParam::Token(raw_token) => token = token_for(raw_token),
                RawParam::Annotated(entries) => {
                    for entry in entries {
                        match entry {
                            ParamEntry::Host => is_host = true,
                            ParamEntry::Self_ => is_self = true,
                            ParamEntry::SkipSelf => is_skip_self = true,
                            ParamEntry::Optional => is_optional = true,
                            ParamEntry::Attribute(attribute_name) => {
                                is_attribute = true;
                                token =
                                    Some(CompileTokenMetadata::Value(attribute_name.clone()));
                            }
                            ParamEntry::Inject(raw_token) => token = token_for(raw_token),
                            ParamEntry::Token(raw_token) => {
                                if token.is_none() {
                                    token = token_for(raw_token);
                                }
                            }
                        }
                    }
                }
            }
            match token {
                None => {
                    has_unknown_deps = true;
                    dependencies_metadata.push(None);
                }
                Some(token) => dependencies_metadata.push(Some(CompileDiDependencyMetadata {
                    is_attribute,
                    is_host,
                    is_self,
                    is_skip_self,
                    is_optional,
                    token,
                })),
            }
        }
        if has_unknown_deps {
            let deps = dependencies_metadata
                .iter()
                .map(|dep| match dep {
                    Some(dep) => dep.token.to_string(),
                    None => "?".to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            return Err(MetadataError::UnresolvedDependency {
                symbol: symbol.to_string(),
                deps,
            });
        }
        Ok(dependencies_metadata.into_iter().flatten().collect())
    }

    fn get_type_metadata(
        &self,
        type_ref: &TypeRef,
        dependencies: Option<&[RawParam]>,
    ) -> Result<CompileTypeMetadata> {
        Ok(CompileTypeMetadata {
            reference: type_ref.clone(),
            module_url: self.reflector.import_uri(type_ref),
            di_deps: self.get_dependencies_metadata(type_ref, dependencies)?,
            lifecycle_hooks: LIFECYCLE_HOOKS
                .iter()
                .copied()
                .filter(|hook| {
                    self.lifecycle_reflector
                        .has_lifecycle_hook(*hook, type_ref)
                })
                .collect(),
        })
    }

    fn get_factory_metadata(
        &self,
        factory: &TypeRef,
        dependencies: Option<&[RawParam]>,
    ) -> Result<CompileFactoryMetadata> {
        Ok(CompileFactoryMetadata {
            reference: factory.clone(),
            module_url: self.reflector.import_uri(factory),
            di_deps: self.get_dependencies_metadata(factory, dependencies)?,
        })
    }

    // ----- queries -----

    fn get_queries_metadata(
        &self,
        queries: &indexmap::IndexMap<String, RawQuery>,
        is_view_query: bool,
    ) -> Result<Vec<CompileQueryMetadata>> {
        let mut compile_queries = Vec::new();
        for (property_name, query) in queries {
            if query.is_view_query == is_view_query {
                compile_queries.push(self.query_metadata(query, property_name)?);
            }
        }
        Ok(compile_queries)
    }

    fn query_metadata(&self, query: &RawQuery, property_name: &str) -> Result<CompileQueryMetadata> {
        let selectors = match &query.selector {
            QuerySelector::VarBindings(bindings) => bindings
                .split(',')
                .map(|binding| CompileTokenMetadata::Value(binding.trim().to_string()))
                .collect(),
            QuerySelector::Token(raw_token) => match token_for(raw_token) {
                Some(token) => vec![token],
                None => {
                    return Err(MetadataError::IllegalState {
                        message: format!(
                            "unexpected token in the query for '{}'",
                            property_name
                        ),
                    })
                }
            },
        };
        Ok(CompileQueryMetadata {
            selectors,
            descendants: query.descendants,
            first: query.first,
            property_name: property_name.to_string(),
            read: query.read.as_ref().and_then(token_for),
        })
    }

    // ----- misc -----

    fn identifiers_from_list(
        &self,
        entries: &[ModuleEntry],
        property: &'static str,
        owner: &TypeRef,
    ) -> Result<Vec<CompileIdentifierMetadata>> {
        let mut identifiers = Vec::new();
        for entry in flatten_entries(entries, false) {
            match entry {
                FlatModuleEntry::Type(type_ref) => {
                    identifiers.push(CompileIdentifierMetadata::new(type_ref));
                }
                FlatModuleEntry::WithProviders(with_providers) => {
                    return Err(MetadataError::InvalidPropertyEntry {
                        property,
                        value: with_providers.ng_module.to_string(),
                        owner: owner.to_string(),
                    });
                }
                FlatModuleEntry::Opaque(value) => {
                    return Err(MetadataError::InvalidPropertyEntry {
                        property,
                        value: stringify_json(&value),
                        owner: owner.to_string(),
                    });
                }
            }
        }
        Ok(identifiers)
    }

    fn type_descriptor(&self, type_ref: &TypeRef) -> &'static str {
        if self.annotation_reader.is_directive(type_ref) {
            "directive"
        } else if self.annotation_reader.is_pipe(type_ref) {
            "pipe"
        } else if self.annotation_reader.is_module(type_ref) {
            "module"
        } else {
            "value"
        }
    }
}

/// Flattened form of one annotation list entry.
enum FlatModuleEntry {
    Type(TypeRef),
    WithProviders(ModuleWithProviders),
    Opaque(serde_json::Value),
}

/// Flatten nested lists, resolving forward references. With `dedupe`, type
/// entries are deduplicated by reference identity (import/export semantics);
/// wrappers and opaque values always pass through.
fn flatten_entries(entries: &[ModuleEntry], dedupe: bool) -> Vec<FlatModuleEntry> {
    fn walk(
        entries: &[ModuleEntry],
        out: &mut Vec<FlatModuleEntry>,
        seen: &mut HashSet<TypeRef>,
        dedupe: bool,
    ) {
        for entry in entries {
            match entry {
                ModuleEntry::List(nested) => walk(nested, out, seen, dedupe),
                ModuleEntry::Type(type_expr) => {
                    let type_ref = type_expr.resolve();
                    if !dedupe || seen.insert(type_ref.clone()) {
                        out.push(FlatModuleEntry::Type(type_ref));
                    }
                }
                ModuleEntry::WithProviders(with_providers) => {
                    out.push(FlatModuleEntry::WithProviders(with_providers.clone()));
                }
                ModuleEntry::Opaque(value) => {
                    out.push(FlatModuleEntry::Opaque(value.clone()));
                }
            }
        }
    }
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    walk(entries, &mut out, &mut seen, dedupe);
    out
}

/// Post-order walk over imports and exports both: providers and entry
/// components flow in either direction. Children are appended before their
/// importer so a module's own records land after everything it pulls in —
/// later merges overwrite earlier ones deterministically.
fn collect_transitive_imported_modules(
    modules: &[Rc<CompileNgModuleInjectorSummary>],
    target: &mut Vec<Rc<CompileNgModuleInjectorSummary>>,
    visited: &mut HashSet<TypeRef>,
) {
    for module in modules {
        if visited.insert(module.type_.reference.clone()) {
            let nested: Vec<Rc<CompileNgModuleInjectorSummary>> = module
                .imported_modules
                .iter()
                .chain(&module.exported_modules)
                .cloned()
                .collect();
            collect_transitive_imported_modules(&nested, target, visited);
            target.push(Rc::clone(module));
        }
    }
}

/// Post-order walk along export chains only: what an import transitively
/// re-exports into the importer's scope.
fn collect_transitive_exported_modules(
    modules: &[Rc<CompileNgModuleDirectiveSummary>],
    target: &mut Vec<Rc<CompileNgModuleDirectiveSummary>>,
    visited: &mut HashSet<TypeRef>,
) {
    for module in modules {
        if visited.insert(module.type_.reference.clone()) {
            collect_transitive_exported_modules(&module.exported_modules, target, visited);
            target.push(Rc::clone(module));
        }
    }
}

/// Walk a raw value tree, converting embedded types to identifiers (also
/// recording them in `target_identifiers`) and passing everything else
/// through opaquely.
fn convert_to_compile_value(
    value: &RawValue,
    target_identifiers: &mut Vec<CompileIdentifierMetadata>,
) -> CompileValue {
    match value {
        RawValue::Type(type_expr) => {
            let identifier = identifier_for(type_expr);
            target_identifiers.push(identifier.clone());
            CompileValue::Identifier(identifier)
        }
        RawValue::Array(items) => CompileValue::Array(
            items
                .iter()
                .map(|item| convert_to_compile_value(item, target_identifiers))
                .collect(),
        ),
        RawValue::Map(map) => CompileValue::Map(
            map.iter()
                .map(|(key, item)| {
                    (key.clone(), convert_to_compile_value(item, target_identifiers))
                })
                .collect(),
        ),
        RawValue::Json(json) => CompileValue::Json(json.clone()),
    }
}

fn invalid_provider_error(
    providers: &[RawProvider],
    provider_idx: usize,
    debug_info: &str,
) -> MetadataError {
    let mut parts = Vec::new();
    for (seen_idx, seen_provider) in providers.iter().enumerate() {
        if seen_idx < provider_idx {
            parts.push(seen_provider.to_string());
        } else if seen_idx == provider_idx {
            parts.push(format!("?{}?", seen_provider));
        } else if seen_idx == provider_idx + 1 {
            parts.push("...".to_string());
        }
    }
    MetadataError::InvalidProvider {
        context: debug_info.to_string(),
        providers: parts.join(", "),
    }
}

fn opaque_descriptor(value: &serde_json::Value) -> &'static str {
    if value.get("provide").is_some() {
        "provider"
    } else {
        "value"
    }
}
