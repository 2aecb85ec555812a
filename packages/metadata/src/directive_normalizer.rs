//! Template Normalizer
//!
//! Seam to the external collaborator that resolves template/style sources.
//! Fetching may complete immediately or hand back a deferred completion;
//! the resolver never blocks on it.

use crate::compile_metadata::{CompileAnimationEntryMetadata, CompileTemplateMetadata};
use crate::core::{TypeRef, ViewEncapsulation};
use crate::error::Result;
use crate::util::SyncAsync;

/// Template descriptor of a component before normalization.
#[derive(Clone, Debug)]
pub struct PrenormalizedTemplateMetadata {
    pub component_type: TypeRef,
    pub module_url: Option<String>,
    pub encapsulation: Option<ViewEncapsulation>,
    pub template: Option<String>,
    pub template_url: Option<String>,
    pub styles: Vec<String>,
    pub style_urls: Vec<String>,
    pub animations: Vec<CompileAnimationEntryMetadata>,
    pub interpolation: Option<(String, String)>,
}

pub trait TemplateNormalizer {
    fn normalize_template(
        &self,
        template: PrenormalizedTemplateMetadata,
    ) -> Result<SyncAsync<CompileTemplateMetadata>>;
}
