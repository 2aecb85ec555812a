//! Metadata Resolver Tests

use angular_metadata::compile_metadata::{CompileTokenMetadata, CompileValue};
use angular_metadata::core::{
    ComponentAnnotation, DirectiveAnnotation, LifecycleHook, ModuleEntry, ModuleWithProviders,
    NgModuleAnnotation, ParamEntry, PipeAnnotation, ProviderLiteral, QuerySelector, RawParam,
    RawProvider, RawQuery, RawToken, RawValue, TypeExpr, TypeRef,
};
use angular_metadata::testing::{
    MockAnnotationReader, MockLifecycleReflector, MockReflector, MockSchemaRegistry,
    MockTemplateNormalizer,
};
use angular_metadata::{CompileMetadataResolver, MetadataError};
use indexmap::IndexMap;
use serde_json::json;
use std::rc::Rc;

struct TestBed {
    resolver: CompileMetadataResolver,
    reader: Rc<MockAnnotationReader>,
    reflector: Rc<MockReflector>,
    normalizer: Rc<MockTemplateNormalizer>,
    lifecycle: Rc<MockLifecycleReflector>,
}

fn test_bed() -> TestBed {
    let reader = Rc::new(MockAnnotationReader::new());
    let reflector = Rc::new(MockReflector::new());
    let normalizer = Rc::new(MockTemplateNormalizer::new());
    let lifecycle = Rc::new(MockLifecycleReflector::new());
    let resolver = CompileMetadataResolver::new(
        reader.clone(),
        reflector.clone(),
        normalizer.clone(),
        Rc::new(MockSchemaRegistry::new()),
        lifecycle.clone(),
    );
    TestBed {
        resolver,
        reader,
        reflector,
        normalizer,
        lifecycle,
    }
}

fn entry(type_ref: &TypeRef) -> ModuleEntry {
    ModuleEntry::Type(TypeExpr::Type(type_ref.clone()))
}

fn directive_annotation(selector: &str) -> DirectiveAnnotation {
    DirectiveAnnotation {
        selector: Some(selector.to_string()),
        ..Default::default()
    }
}

fn component_annotation(selector: Option<&str>, template: Option<&str>) -> DirectiveAnnotation {
    DirectiveAnnotation {
        selector: selector.map(|s| s.to_string()),
        component: Some(ComponentAnnotation {
            template: template.map(|t| t.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn url_component_annotation(selector: &str, template_url: &str) -> DirectiveAnnotation {
    DirectiveAnnotation {
        selector: Some(selector.to_string()),
        component: Some(ComponentAnnotation {
            template_url: Some(template_url.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn value_provider(token: &str, value: serde_json::Value) -> RawProvider {
    RawProvider::Literal(ProviderLiteral {
        use_value: Some(RawValue::Json(value)),
        ..ProviderLiteral::new(RawToken::Value(token.to_string()))
    })
}

fn use_values_for_token<'a>(
    providers: impl IntoIterator<Item = &'a angular_metadata::compile_metadata::CompileProviderMetadata>,
    token: &str,
) -> Vec<CompileValue> {
    providers
        .into_iter()
        .filter(|provider| provider.token == CompileTokenMetadata::Value(token.to_string()))
        .filter_map(|provider| provider.use_value.clone())
        .collect()
}

// caching

#[test]
fn should_return_the_cached_module_on_repeated_resolution() {
    let mut bed = test_bed();
    let dir = TypeRef::new("SomeDirective");
    let module = TypeRef::new("SomeModule");
    bed.reader
        .register_directive(dir.clone(), directive_annotation("[some]"));
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            ..Default::default()
        },
    );

    let first = bed
        .resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap()
        .unwrap();
    assert!(first.is_fully_loaded());
    let second = bed
        .resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap()
        .unwrap();
    assert!(Rc::ptr_eq(&first.ng_module, &second.ng_module));
    assert_eq!(bed.reader.module_resolutions(), 1);
    assert_eq!(bed.reader.directive_resolutions(), 1);
}

#[test]
fn should_cache_directive_metadata_and_summaries_by_declaring_type() {
    let mut bed = test_bed();
    let dir = TypeRef::new("SomeDirective");
    let module = TypeRef::new("SomeModule");
    bed.reader
        .register_directive(dir.clone(), directive_annotation("[some]"));
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            ..Default::default()
        },
    );

    bed.resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap();
    let metadata_1 = bed.resolver.get_directive_metadata(&dir).unwrap();
    let metadata_2 = bed.resolver.get_directive_metadata(&dir).unwrap();
    assert!(Rc::ptr_eq(&metadata_1, &metadata_2));
    let summary = bed.resolver.get_directive_summary(&dir).unwrap();
    assert_eq!(summary.selector.as_deref(), Some("[some]"));
    assert!(!summary.is_component);
}

#[test]
fn should_fail_when_querying_a_directive_before_its_module_was_loaded() {
    let bed = test_bed();
    let dir = TypeRef::new("SomeDirective");
    let error = bed.resolver.get_directive_metadata(&dir).unwrap_err();
    assert!(matches!(error, MetadataError::IllegalState { .. }));
    assert!(error.to_string().contains("load_ng_module_metadata"));
}

#[test]
fn should_probe_absent_modules_without_failing() {
    let mut bed = test_bed();
    let not_a_module = TypeRef::new("NotAModule");
    assert!(bed
        .resolver
        .get_ng_module_metadata(&not_a_module, false)
        .unwrap()
        .is_none());
    let error = bed
        .resolver
        .get_ng_module_metadata(&not_a_module, true)
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "No NgModule annotation found on NotAModule!"
    );
}

#[test]
fn should_not_cache_a_module_whose_resolution_failed() {
    let mut bed = test_bed();
    let module = TypeRef::new("BrokenModule");
    let unknown = TypeRef::new("Unknown");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&unknown)],
            ..Default::default()
        },
    );
    assert!(bed.resolver.get_ng_module_metadata(&module, true).is_err());

    // fixing the input and retrying must succeed
    bed.reader
        .register_module(module.clone(), NgModuleAnnotation::default());
    assert!(bed
        .resolver
        .get_ng_module_metadata(&module, true)
        .unwrap()
        .is_some());
}

// provider merging

#[test]
fn should_order_providers_so_the_importing_module_wins() {
    let mut bed = test_bed();
    let module_a = TypeRef::new("ModuleA");
    let module_b = TypeRef::new("ModuleB");
    let module_c = TypeRef::new("ModuleC");
    bed.reader.register_module(
        module_c.clone(),
        NgModuleAnnotation {
            providers: vec![value_provider("config", json!(1))],
            ..Default::default()
        },
    );
    bed.reader.register_module(
        module_b.clone(),
        NgModuleAnnotation {
            imports: vec![entry(&module_c)],
            providers: vec![value_provider("config", json!(2))],
            ..Default::default()
        },
    );
    bed.reader.register_module(
        module_a.clone(),
        NgModuleAnnotation {
            imports: vec![entry(&module_b)],
            providers: vec![value_provider("config", json!(3))],
            ..Default::default()
        },
    );

    let metadata = bed
        .resolver
        .get_ng_module_metadata(&module_a, true)
        .unwrap()
        .unwrap();
    let values = use_values_for_token(&metadata.transitive_module.providers, "config");
    assert_eq!(
        values,
        vec![
            CompileValue::Json(json!(1)),
            CompileValue::Json(json!(2)),
            CompileValue::Json(json!(3)),
        ]
    );
}

#[test]
fn should_merge_providers_from_module_with_providers_wrappers() {
    let mut bed = test_bed();
    let module_base = TypeRef::new("BaseModule");
    let module_app = TypeRef::new("AppModule");
    bed.reader
        .register_module(module_base.clone(), NgModuleAnnotation::default());
    bed.reader.register_module(
        module_app.clone(),
        NgModuleAnnotation {
            imports: vec![ModuleEntry::WithProviders(ModuleWithProviders {
                ng_module: TypeExpr::Type(module_base.clone()),
                providers: vec![value_provider("extra", json!(7))],
            })],
            ..Default::default()
        },
    );

    let metadata = bed
        .resolver
        .get_ng_module_metadata(&module_app, true)
        .unwrap()
        .unwrap();
    let values = use_values_for_token(&metadata.providers, "extra");
    assert_eq!(values, vec![CompileValue::Json(json!(7))]);
    let transitive = use_values_for_token(&metadata.transitive_module.providers, "extra");
    assert_eq!(transitive.len(), 1);
}

#[test]
fn should_dedupe_duplicated_imports() {
    let mut bed = test_bed();
    let module_base = TypeRef::new("BaseModule");
    let module_app = TypeRef::new("AppModule");
    bed.reader.register_module(
        module_base.clone(),
        NgModuleAnnotation {
            providers: vec![value_provider("base", json!(true))],
            ..Default::default()
        },
    );
    bed.reader.register_module(
        module_app.clone(),
        NgModuleAnnotation {
            imports: vec![
                entry(&module_base),
                ModuleEntry::List(vec![entry(&module_base)]),
            ],
            ..Default::default()
        },
    );

    let metadata = bed
        .resolver
        .get_ng_module_metadata(&module_app, true)
        .unwrap()
        .unwrap();
    let values = use_values_for_token(&metadata.transitive_module.providers, "base");
    assert_eq!(values.len(), 1);
}

#[test]
fn should_fail_with_invalid_provider_bracketing_the_offending_entry() {
    let mut bed = test_bed();
    let module = TypeRef::new("MyModule");
    let service = TypeRef::new("MyService");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            providers: vec![
                RawProvider::Type(TypeExpr::Type(service)),
                RawProvider::Opaque(json!("blah")),
                RawProvider::Type(TypeExpr::Type(TypeRef::new("Other"))),
            ],
            ..Default::default()
        },
    );

    let error = bed.resolver.get_ng_module_metadata(&module, true).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Invalid provider for the NgModule 'MyModule' - only instances of Provider and Type \
         are allowed, got: [MyService, ?blah?, ...]"
    );
}

// declarations

#[test]
fn should_fail_when_a_type_is_declared_by_two_modules() {
    let mut bed = test_bed();
    let dir = TypeRef::new("SharedDirective");
    let module_1 = TypeRef::new("Module1");
    let module_2 = TypeRef::new("Module2");
    bed.reader
        .register_directive(dir.clone(), directive_annotation("[shared]"));
    bed.reader.register_module(
        module_1.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            ..Default::default()
        },
    );
    bed.reader.register_module(
        module_2.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            ..Default::default()
        },
    );

    bed.resolver
        .get_ng_module_metadata(&module_1, true)
        .unwrap();
    let error = bed
        .resolver
        .get_ng_module_metadata(&module_2, true)
        .unwrap_err();
    match error {
        MetadataError::DirectiveInTwoModules {
            type_name,
            module1,
            module2,
        } => {
            assert_eq!(type_name, "SharedDirective");
            assert_eq!(module1, "Module1");
            assert_eq!(module2, "Module2");
        }
        other => panic!("expected DirectiveInTwoModules, got {:?}", other),
    }
}

#[test]
fn should_fail_with_invalid_declaration_for_unannotated_types() {
    let mut bed = test_bed();
    let module = TypeRef::new("MyModule");
    let plain = TypeRef::new("PlainClass");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&plain)],
            ..Default::default()
        },
    );

    let error = bed.resolver.get_ng_module_metadata(&module, true).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Unexpected value 'PlainClass' declared by the module 'MyModule'"
    );
}

#[test]
fn should_fail_with_invalid_import_naming_the_kind() {
    let mut bed = test_bed();
    let module = TypeRef::new("MyModule");
    let dir = TypeRef::new("SomeDirective");
    bed.reader
        .register_directive(dir.clone(), directive_annotation("[some]"));
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            imports: vec![entry(&dir)],
            ..Default::default()
        },
    );

    let error = bed.resolver.get_ng_module_metadata(&module, true).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Unexpected directive 'SomeDirective' imported by the module 'MyModule'"
    );
}

// exports

#[test]
fn should_fail_when_exporting_a_type_that_is_neither_declared_nor_imported() {
    let mut bed = test_bed();
    let module = TypeRef::new("MyModule");
    let dir = TypeRef::new("SomeDirective");
    bed.reader
        .register_directive(dir.clone(), directive_annotation("[some]"));
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            exports: vec![entry(&dir)],
            ..Default::default()
        },
    );

    let error = bed.resolver.get_ng_module_metadata(&module, true).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Can't export directive SomeDirective from MyModule as it was neither declared nor imported!"
    );
}

#[test]
fn should_classify_exports_that_are_imported_from_another_module() {
    let mut bed = test_bed();
    let dir = TypeRef::new("SharedDirective");
    let module_lib = TypeRef::new("LibModule");
    let module_app = TypeRef::new("AppModule");
    bed.reader
        .register_directive(dir.clone(), directive_annotation("[shared]"));
    bed.reader.register_module(
        module_lib.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            exports: vec![entry(&dir)],
            ..Default::default()
        },
    );
    bed.reader.register_module(
        module_app.clone(),
        NgModuleAnnotation {
            imports: vec![entry(&module_lib)],
            exports: vec![entry(&dir)],
            ..Default::default()
        },
    );

    let metadata = bed
        .resolver
        .get_ng_module_metadata(&module_app, true)
        .unwrap()
        .unwrap();
    assert_eq!(metadata.exported_directives.len(), 1);
    assert_eq!(metadata.exported_directives[0].reference, dir);
    assert!(metadata.declared_directives.is_empty());
}

#[test]
fn should_reexport_the_full_surface_of_an_exported_module() {
    let mut bed = test_bed();
    let dir = TypeRef::new("SharedDirective");
    let module_lib = TypeRef::new("LibModule");
    let module_re = TypeRef::new("ReexportModule");
    let module_app = TypeRef::new("AppModule");
    bed.reader
        .register_directive(dir.clone(), directive_annotation("[shared]"));
    bed.reader.register_module(
        module_lib.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            exports: vec![entry(&dir)],
            ..Default::default()
        },
    );
    bed.reader.register_module(
        module_re.clone(),
        NgModuleAnnotation {
            exports: vec![entry(&module_lib)],
            ..Default::default()
        },
    );
    bed.reader.register_module(
        module_app.clone(),
        NgModuleAnnotation {
            imports: vec![entry(&module_re)],
            ..Default::default()
        },
    );

    let metadata = bed
        .resolver
        .load_ng_module_metadata(&module_app, true, true)
        .unwrap()
        .unwrap();
    let directives = &metadata.ng_module.transitive_module.directives;
    assert!(directives.iter().any(|id| id.reference == dir));
    // driving the loaders made the re-exported directive's metadata available
    assert!(bed.resolver.get_directive_metadata(&dir).is_ok());
}

#[test]
fn should_fail_with_invalid_export_for_opaque_values() {
    let mut bed = test_bed();
    let module = TypeRef::new("MyModule");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            exports: vec![ModuleEntry::Opaque(json!("someString"))],
            ..Default::default()
        },
    );

    let error = bed.resolver.get_ng_module_metadata(&module, true).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Unexpected value 'someString' exported by the module 'MyModule'"
    );
}

// dependency extraction

#[test]
fn should_resolve_dependency_qualifiers() {
    let mut bed = test_bed();
    let dir = TypeRef::new("MyDir");
    let dep = TypeRef::new("SomeDep");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(dir.clone(), directive_annotation("[my]"));
    bed.reflector.register_parameters(
        dir.clone(),
        vec![
            RawParam::Annotated(vec![
                ParamEntry::Optional,
                ParamEntry::Token(RawToken::Type(TypeExpr::Type(dep.clone()))),
            ]),
            RawParam::Annotated(vec![
                ParamEntry::Host,
                ParamEntry::SkipSelf,
                ParamEntry::Self_,
                ParamEntry::Inject(RawToken::Value("config".to_string())),
            ]),
            RawParam::Annotated(vec![ParamEntry::Attribute("role".to_string())]),
        ],
    );
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            ..Default::default()
        },
    );

    bed.resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap();
    let metadata = bed.resolver.get_directive_metadata(&dir).unwrap();
    let deps = &metadata.type_.di_deps;
    assert_eq!(deps.len(), 3);

    assert!(deps[0].is_optional);
    assert_eq!(deps[0].token.reference(), Some(&dep));

    assert!(deps[1].is_host);
    assert!(deps[1].is_skip_self);
    assert!(deps[1].is_self);
    assert_eq!(
        deps[1].token,
        CompileTokenMetadata::Value("config".to_string())
    );

    assert!(deps[2].is_attribute);
    assert_eq!(
        deps[2].token,
        CompileTokenMetadata::Value("role".to_string())
    );
}

#[test]
fn should_enumerate_unresolved_dependencies_with_placeholders() {
    let mut bed = test_bed();
    let dir = TypeRef::new("MyDir");
    let dep = TypeRef::new("SomeDep");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(dir.clone(), directive_annotation("[my]"));
    bed.reflector.register_parameters(
        dir.clone(),
        vec![
            RawParam::Annotated(vec![ParamEntry::Optional]),
            RawParam::Token(RawToken::Type(TypeExpr::Type(dep))),
        ],
    );
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            ..Default::default()
        },
    );

    let error = bed
        .resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Can't resolve all parameters for MyDir: (?, SomeDep)."
    );
}

// entry components

#[test]
fn should_collect_entry_components_from_the_reserved_provider_token() {
    let mut bed = test_bed();
    let comp_a = TypeRef::new("ComponentA");
    let comp_b = TypeRef::new("ComponentB");
    let plain = TypeRef::new("NotADirective");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(comp_a.clone(), component_annotation(Some("comp-a"), Some("<a>")));
    bed.reader
        .register_directive(comp_b.clone(), component_annotation(Some("comp-b"), Some("<b>")));
    let mut nested = IndexMap::new();
    nested.insert(
        "nested".to_string(),
        RawValue::Type(TypeExpr::Type(comp_b.clone())),
    );
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            providers: vec![RawProvider::Literal(ProviderLiteral {
                use_value: Some(RawValue::Array(vec![
                    RawValue::Type(TypeExpr::Type(comp_a.clone())),
                    RawValue::Map(nested),
                    RawValue::Type(TypeExpr::Type(plain.clone())),
                ])),
                multi: true,
                ..ProviderLiteral::new(RawToken::AnalyzeForEntryComponents)
            })],
            ..Default::default()
        },
    );

    let metadata = bed
        .resolver
        .get_ng_module_metadata(&module, true)
        .unwrap()
        .unwrap();
    let entry_refs: Vec<&TypeRef> = metadata
        .entry_components
        .iter()
        .map(|id| &id.reference)
        .collect();
    assert!(entry_refs.contains(&&comp_a));
    assert!(entry_refs.contains(&&comp_b));
    assert!(!entry_refs.contains(&&plain));
    // the collector provider itself contributes nothing to the output list
    assert!(metadata.providers.is_empty());
}

#[test]
fn should_reject_collector_providers_that_are_not_multi() {
    let mut bed = test_bed();
    let module = TypeRef::new("MyModule");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            providers: vec![RawProvider::Literal(ProviderLiteral {
                use_value: Some(RawValue::Json(json!([]))),
                multi: false,
                ..ProviderLiteral::new(RawToken::AnalyzeForEntryComponents)
            })],
            ..Default::default()
        },
    );

    let error = bed.resolver.get_ng_module_metadata(&module, true).unwrap_err();
    assert_eq!(error, MetadataError::EntryComponentsOnlyMulti);
}

#[test]
fn should_reject_collector_providers_that_are_not_use_value() {
    let mut bed = test_bed();
    let module = TypeRef::new("MyModule");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            providers: vec![RawProvider::Literal(ProviderLiteral {
                use_class: Some(TypeExpr::Type(TypeRef::new("SomeClass"))),
                multi: true,
                ..ProviderLiteral::new(RawToken::AnalyzeForEntryComponents)
            })],
            ..Default::default()
        },
    );

    let error = bed.resolver.get_ng_module_metadata(&module, true).unwrap_err();
    assert_eq!(error, MetadataError::EntryComponentsOnlyUseValue);
}

#[test]
fn should_fold_bootstrap_components_into_entry_components() {
    let mut bed = test_bed();
    let comp = TypeRef::new("RootComponent");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(comp.clone(), component_annotation(Some("root"), Some("<x>")));
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&comp)],
            bootstrap: vec![entry(&comp)],
            ..Default::default()
        },
    );

    let metadata = bed
        .resolver
        .get_ng_module_metadata(&module, true)
        .unwrap()
        .unwrap();
    assert_eq!(metadata.bootstrap_components.len(), 1);
    assert!(metadata
        .entry_components
        .iter()
        .any(|id| id.reference == comp));
}

#[test]
fn should_fail_for_non_type_bootstrap_entries() {
    let mut bed = test_bed();
    let module = TypeRef::new("MyModule");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            bootstrap: vec![ModuleEntry::Opaque(json!(42))],
            ..Default::default()
        },
    );

    let error = bed.resolver.get_ng_module_metadata(&module, true).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Unexpected value '42' used in the bootstrap property of 'MyModule'"
    );
}

// components and templates

#[test]
fn should_default_the_selector_for_components() {
    let mut bed = test_bed();
    let comp = TypeRef::new("MyComp");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(comp.clone(), component_annotation(None, Some("<div></div>")));
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&comp)],
            ..Default::default()
        },
    );

    bed.resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap();
    let metadata = bed.resolver.get_directive_metadata(&comp).unwrap();
    assert_eq!(metadata.selector.as_deref(), Some("ng-component"));
}

#[test]
fn should_fail_for_directives_without_a_selector() {
    let mut bed = test_bed();
    let dir = TypeRef::new("MyDir");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(dir.clone(), DirectiveAnnotation::default());
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            ..Default::default()
        },
    );

    let error = bed
        .resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Directive MyDir has no selector, please add it!"
    );
}

#[test]
fn should_fail_synchronous_resolution_while_a_template_is_loading() {
    let mut bed = test_bed();
    let comp = TypeRef::new("AsyncComp");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(comp.clone(), url_component_annotation("async-comp", "/tpl.html"));
    bed.normalizer.register_resource("/tpl.html", "<div>fetched</div>");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&comp)],
            ..Default::default()
        },
    );

    let error = bed
        .resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Can't compile synchronously as AsyncComp is still being loaded!"
    );
}

#[test]
fn should_resolve_deferred_templates_asynchronously() {
    let mut bed = test_bed();
    let comp = TypeRef::new("AsyncComp");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(comp.clone(), url_component_annotation("async-comp", "/tpl.html"));
    bed.normalizer.register_resource("/tpl.html", "<div>fetched</div>");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&comp)],
            ..Default::default()
        },
    );

    // a failed synchronous attempt must not poison the asynchronous retry
    assert!(bed
        .resolver
        .load_ng_module_metadata(&module, true, true)
        .is_err());

    let load = bed
        .resolver
        .load_ng_module_metadata(&module, false, true)
        .unwrap()
        .unwrap();
    assert_eq!(load.pending.len(), 1);
    assert!(bed.resolver.get_directive_metadata(&comp).is_err());

    bed.resolver.complete_pending_loads(load.pending).unwrap();
    let metadata = bed.resolver.get_directive_metadata(&comp).unwrap();
    assert_eq!(
        metadata.template.as_ref().unwrap().template.as_deref(),
        Some("<div>fetched</div>")
    );

    let reload = bed
        .resolver
        .load_ng_module_metadata(&module, false, true)
        .unwrap()
        .unwrap();
    assert!(reload.is_fully_loaded());
}

#[test]
fn should_make_async_results_indistinguishable_from_sync_ones() {
    let mut bed = test_bed();
    let sync_comp = TypeRef::new("SyncComp");
    let async_comp = TypeRef::new("AsyncComp");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(sync_comp.clone(), component_annotation(Some("sync-comp"), Some("<div>x</div>")));
    bed.reader
        .register_directive(async_comp.clone(), url_component_annotation("async-comp", "/x.html"));
    bed.normalizer.register_resource("/x.html", "<div>x</div>");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&sync_comp), entry(&async_comp)],
            ..Default::default()
        },
    );

    let load = bed
        .resolver
        .load_ng_module_metadata(&module, false, true)
        .unwrap()
        .unwrap();
    bed.resolver.complete_pending_loads(load.pending).unwrap();

    let sync_metadata = bed.resolver.get_directive_metadata(&sync_comp).unwrap();
    let async_metadata = bed.resolver.get_directive_metadata(&async_comp).unwrap();
    assert!(sync_metadata.is_component && async_metadata.is_component);
    assert_eq!(
        sync_metadata.template.as_ref().unwrap().template,
        async_metadata.template.as_ref().unwrap().template
    );
}

// pipes

#[test]
fn should_resolve_pipes_eagerly_and_expose_summaries() {
    let mut bed = test_bed();
    let pipe = TypeRef::new("DatePipe");
    let module = TypeRef::new("MyModule");
    bed.reader.register_pipe(
        pipe.clone(),
        PipeAnnotation {
            name: "date".to_string(),
            pure: true,
        },
    );
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&pipe)],
            ..Default::default()
        },
    );

    // pipes need no template loading, so bare module resolution suffices
    bed.resolver
        .get_ng_module_metadata(&module, true)
        .unwrap();
    let metadata = bed.resolver.get_pipe_metadata(&pipe).unwrap();
    assert_eq!(metadata.name, "date");
    assert!(metadata.pure);
    let summary = bed.resolver.get_pipe_summary(&pipe).unwrap();
    assert_eq!(summary.name, "date");
}

#[test]
fn should_fail_loading_a_pipe_without_annotation() {
    let mut bed = test_bed();
    let not_a_pipe = TypeRef::new("NotAPipe");
    let error = bed
        .resolver
        .get_or_load_pipe_metadata(&not_a_pipe)
        .unwrap_err();
    assert_eq!(error.to_string(), "No Pipe annotation found on NotAPipe!");
}

// queries, host bindings, lifecycle hooks

#[test]
fn should_split_content_and_view_queries() {
    let mut bed = test_bed();
    let dir = TypeRef::new("MyComp");
    let child = TypeRef::new("ChildDirective");
    let module = TypeRef::new("MyModule");
    let mut annotation = component_annotation(Some("my-comp"), Some("<div></div>"));
    annotation.queries.insert(
        "contentChildren".to_string(),
        RawQuery {
            selector: QuerySelector::VarBindings("a, b".to_string()),
            descendants: true,
            first: false,
            read: None,
            is_view_query: false,
        },
    );
    annotation.queries.insert(
        "viewChild".to_string(),
        RawQuery {
            selector: QuerySelector::Token(RawToken::Type(TypeExpr::Type(child.clone()))),
            descendants: false,
            first: true,
            read: None,
            is_view_query: true,
        },
    );
    bed.reader.register_directive(dir.clone(), annotation);
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            ..Default::default()
        },
    );

    bed.resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap();
    let metadata = bed.resolver.get_directive_metadata(&dir).unwrap();
    assert_eq!(metadata.queries.len(), 1);
    assert_eq!(metadata.queries[0].property_name, "contentChildren");
    assert_eq!(
        metadata.queries[0].selectors,
        vec![
            CompileTokenMetadata::Value("a".to_string()),
            CompileTokenMetadata::Value("b".to_string()),
        ]
    );
    assert_eq!(metadata.view_queries.len(), 1);
    assert!(metadata.view_queries[0].first);
    assert_eq!(metadata.view_queries[0].selectors[0].reference(), Some(&child));
}

#[test]
fn should_parse_inputs_outputs_and_host_bindings() {
    let mut bed = test_bed();
    let dir = TypeRef::new("MyDir");
    let module = TypeRef::new("MyModule");
    let mut annotation = directive_annotation("[my]");
    annotation.inputs = vec!["value: bound".to_string(), "plain".to_string()];
    annotation.outputs = vec!["changed".to_string()];
    annotation
        .host
        .insert("[title]".to_string(), "title".to_string());
    annotation
        .host
        .insert("(click)".to_string(), "onClick()".to_string());
    annotation
        .host
        .insert("role".to_string(), "button".to_string());
    bed.reader.register_directive(dir.clone(), annotation);
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            ..Default::default()
        },
    );

    bed.resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap();
    let metadata = bed.resolver.get_directive_metadata(&dir).unwrap();
    assert_eq!(metadata.inputs.get("value"), Some(&"bound".to_string()));
    assert_eq!(metadata.inputs.get("plain"), Some(&"plain".to_string()));
    assert_eq!(metadata.outputs.get("changed"), Some(&"changed".to_string()));
    assert_eq!(
        metadata.host_properties.get("title"),
        Some(&"title".to_string())
    );
    assert_eq!(
        metadata.host_listeners.get("click"),
        Some(&"onClick()".to_string())
    );
    assert_eq!(
        metadata.host_attributes.get("role"),
        Some(&"button".to_string())
    );
}

#[test]
fn should_detect_lifecycle_hooks() {
    let mut bed = test_bed();
    let dir = TypeRef::new("MyDir");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(dir.clone(), directive_annotation("[my]"));
    bed.lifecycle.add_hook(dir.clone(), LifecycleHook::OnInit);
    bed.lifecycle.add_hook(dir.clone(), LifecycleHook::OnDestroy);
    bed.reflector.register_import_uri(dir.clone(), "/app/my_dir");
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir)],
            ..Default::default()
        },
    );

    bed.resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap();
    let metadata = bed.resolver.get_directive_metadata(&dir).unwrap();
    assert_eq!(
        metadata.type_.lifecycle_hooks,
        vec![LifecycleHook::OnInit, LifecycleHook::OnDestroy]
    );
    assert_eq!(metadata.type_.module_url.as_deref(), Some("/app/my_dir"));
}

// cache invalidation

#[test]
fn should_clear_the_whole_module_cache_when_invalidating_a_directive() {
    let mut bed = test_bed();
    let dir_1 = TypeRef::new("Directive1");
    let dir_2 = TypeRef::new("Directive2");
    let module_1 = TypeRef::new("Module1");
    let module_2 = TypeRef::new("Module2");
    bed.reader
        .register_directive(dir_1.clone(), directive_annotation("[one]"));
    bed.reader
        .register_directive(dir_2.clone(), directive_annotation("[two]"));
    bed.reader.register_module(
        module_1.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir_1)],
            ..Default::default()
        },
    );
    bed.reader.register_module(
        module_2.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&dir_2)],
            ..Default::default()
        },
    );

    bed.resolver
        .load_ng_module_metadata(&module_1, true, true)
        .unwrap();
    bed.resolver
        .load_ng_module_metadata(&module_2, true, true)
        .unwrap();
    assert_eq!(bed.reader.module_resolutions(), 2);

    bed.resolver.clear_cache_for(&dir_1);

    // the invalidated directive is gone, unrelated directives survive
    assert!(bed.resolver.get_directive_metadata(&dir_1).is_err());
    assert!(bed.resolver.get_directive_metadata(&dir_2).is_ok());

    // even the unrelated module must be re-resolved
    bed.resolver
        .get_ng_module_metadata(&module_2, true)
        .unwrap();
    assert_eq!(bed.reader.module_resolutions(), 3);
}

#[test]
fn should_not_reinvoke_the_normalizer_for_cached_components() {
    let mut bed = test_bed();
    let comp = TypeRef::new("MyComp");
    let module = TypeRef::new("MyModule");
    bed.reader
        .register_directive(comp.clone(), component_annotation(Some("my-comp"), Some("<div></div>")));
    bed.reader.register_module(
        module.clone(),
        NgModuleAnnotation {
            declarations: vec![entry(&comp)],
            ..Default::default()
        },
    );

    bed.resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap();
    bed.resolver
        .load_ng_module_metadata(&module, true, true)
        .unwrap();
    assert_eq!(bed.normalizer.normalizations(), 1);
}
