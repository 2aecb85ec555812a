//! Mock Collaborators
//!
//! Programmable in-memory implementations of the resolver's seams, used by
//! the test suites and by embedders that wire the resolver without a real
//! frontend. Registration happens through `&self` so instances can be
//! shared with the resolver via `Rc`.

use crate::annotation_reader::AnnotationReader;
use crate::compile_metadata::CompileTemplateMetadata;
use crate::core::{
    DirectiveAnnotation, LifecycleHook, NgModuleAnnotation, PipeAnnotation, RawParam, TypeRef,
};
use crate::directive_normalizer::{PrenormalizedTemplateMetadata, TemplateNormalizer};
use crate::error::{MetadataError, Result};
use crate::reflection::{LifecycleReflector, ReflectorReader};
use crate::schema_registry::ElementSchemaRegistry;
use crate::util::{Deferred, SyncAsync};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Default)]
pub struct MockAnnotationReader {
    directives: RefCell<HashMap<TypeRef, DirectiveAnnotation>>,
    pipes: RefCell<HashMap<TypeRef, PipeAnnotation>>,
    modules: RefCell<HashMap<TypeRef, NgModuleAnnotation>>,
    directive_resolutions: Cell<usize>,
    pipe_resolutions: Cell<usize>,
    module_resolutions: Cell<usize>,
}

impl MockAnnotationReader {
    pub fn new() -> MockAnnotationReader {
        MockAnnotationReader::default()
    }

    pub fn register_directive(&self, type_ref: TypeRef, annotation: DirectiveAnnotation) {
        self.directives.borrow_mut().insert(type_ref, annotation);
    }

    pub fn register_pipe(&self, type_ref: TypeRef, annotation: PipeAnnotation) {
        self.pipes.borrow_mut().insert(type_ref, annotation);
    }

    pub fn register_module(&self, type_ref: TypeRef, annotation: NgModuleAnnotation) {
        self.modules.borrow_mut().insert(type_ref, annotation);
    }

    /// How often a directive annotation was resolved (cache-hit checks).
    pub fn directive_resolutions(&self) -> usize {
        self.directive_resolutions.get()
    }

    pub fn pipe_resolutions(&self) -> usize {
        self.pipe_resolutions.get()
    }

    pub fn module_resolutions(&self) -> usize {
        self.module_resolutions.get()
    }
}

impl AnnotationReader for MockAnnotationReader {
    fn resolve_directive(&self, type_ref: &TypeRef) -> Option<DirectiveAnnotation> {
        self.directive_resolutions
            .set(self.directive_resolutions.get() + 1);
        self.directives.borrow().get(type_ref).cloned()
    }

    fn resolve_pipe(&self, type_ref: &TypeRef) -> Option<PipeAnnotation> {
        self.pipe_resolutions.set(self.pipe_resolutions.get() + 1);
        self.pipes.borrow().get(type_ref).cloned()
    }

    fn resolve_module(&self, type_ref: &TypeRef) -> Option<NgModuleAnnotation> {
        self.module_resolutions
            .set(self.module_resolutions.get() + 1);
        self.modules.borrow().get(type_ref).cloned()
    }

    fn is_directive(&self, type_ref: &TypeRef) -> bool {
        self.directives.borrow().contains_key(type_ref)
    }

    fn is_pipe(&self, type_ref: &TypeRef) -> bool {
        self.pipes.borrow().contains_key(type_ref)
    }

    fn is_module(&self, type_ref: &TypeRef) -> bool {
        self.modules.borrow().contains_key(type_ref)
    }
}

#[derive(Default)]
pub struct MockReflector {
    parameters: RefCell<HashMap<TypeRef, Vec<RawParam>>>,
    import_uris: RefCell<HashMap<TypeRef, String>>,
}

impl MockReflector {
    pub fn new() -> MockReflector {
        MockReflector::default()
    }

    pub fn register_parameters(&self, type_ref: TypeRef, params: Vec<RawParam>) {
        self.parameters.borrow_mut().insert(type_ref, params);
    }

    pub fn register_import_uri(&self, type_ref: TypeRef, uri: impl Into<String>) {
        self.import_uris.borrow_mut().insert(type_ref, uri.into());
    }
}

impl ReflectorReader for MockReflector {
    fn parameters(&self, symbol: &TypeRef) -> Option<Vec<RawParam>> {
        self.parameters.borrow().get(symbol).cloned()
    }

    fn import_uri(&self, symbol: &TypeRef) -> Option<String> {
        self.import_uris.borrow().get(symbol).cloned()
    }
}

/// Normalizer that resolves inline templates synchronously and simulates a
/// network fetch for `template_url` templates: the fetch is handed back as
/// a deferred thunk reading from the registered resource table.
#[derive(Default)]
pub struct MockTemplateNormalizer {
    resources: RefCell<HashMap<String, String>>,
    normalizations: Cell<usize>,
}

impl MockTemplateNormalizer {
    pub fn new() -> MockTemplateNormalizer {
        MockTemplateNormalizer::default()
    }

    pub fn register_resource(&self, url: impl Into<String>, content: impl Into<String>) {
        self.resources.borrow_mut().insert(url.into(), content.into());
    }

    pub fn normalizations(&self) -> usize {
        self.normalizations.get()
    }
}

impl TemplateNormalizer for MockTemplateNormalizer {
    fn normalize_template(
        &self,
        template: PrenormalizedTemplateMetadata,
    ) -> Result<SyncAsync<CompileTemplateMetadata>> {
        self.normalizations.set(self.normalizations.get() + 1);
        let normalized = CompileTemplateMetadata {
            encapsulation: template.encapsulation,
            template: template.template.clone(),
            template_url: template.template_url.clone(),
            styles: template.styles.clone(),
            style_urls: template.style_urls.clone(),
            animations: template.animations.clone(),
            ng_content_selectors: Vec::new(),
            interpolation: template.interpolation.clone(),
        };
        match (&template.template, &template.template_url) {
            (Some(_), _) => Ok(SyncAsync::Sync(normalized)),
            (None, Some(url)) => {
                let fetched = self.resources.borrow().get(url).cloned();
                let url = url.clone();
                Ok(SyncAsync::Async(Deferred::new(move || match fetched {
                    Some(content) => {
                        let mut completed = normalized;
                        completed.template = Some(content);
                        Ok(completed)
                    }
                    None => Err(MetadataError::IllegalState {
                        message: format!("no resource registered for url '{}'", url),
                    }),
                })))
            }
            (None, None) => Err(MetadataError::IllegalState {
                message: format!(
                    "component '{}' has neither template nor templateUrl",
                    template.component_type
                ),
            }),
        }
    }
}

pub struct MockSchemaRegistry {
    pub default_component_element_name: String,
}

impl Default for MockSchemaRegistry {
    fn default() -> MockSchemaRegistry {
        MockSchemaRegistry {
            default_component_element_name: "ng-component".to_string(),
        }
    }
}

impl MockSchemaRegistry {
    pub fn new() -> MockSchemaRegistry {
        MockSchemaRegistry::default()
    }
}

impl ElementSchemaRegistry for MockSchemaRegistry {
    fn get_default_component_element_name(&self) -> String {
        self.default_component_element_name.clone()
    }
}

#[derive(Default)]
pub struct MockLifecycleReflector {
    hooks: RefCell<HashMap<TypeRef, Vec<LifecycleHook>>>,
}

impl MockLifecycleReflector {
    pub fn new() -> MockLifecycleReflector {
        MockLifecycleReflector::default()
    }

    pub fn add_hook(&self, type_ref: TypeRef, hook: LifecycleHook) {
        self.hooks.borrow_mut().entry(type_ref).or_default().push(hook);
    }
}

impl LifecycleReflector for MockLifecycleReflector {
    fn has_lifecycle_hook(&self, hook: LifecycleHook, type_ref: &TypeRef) -> bool {
        self.hooks
            .borrow()
            .get(type_ref)
            .map_or(false, |hooks| hooks.contains(&hook))
    }
}
