//! TypeScript compiler options and the built-in presets

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Merge;

/// Compiler options as they appear under `compilerOptions` in a tsconfig.json
///
/// Recognized keys are typed; anything else is carried through untouched in
/// `extra` so newer compiler flags keep working.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_js: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_synthetic_default_imports: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_unreachable_code: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_unused_labels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emit_decorator_metadata: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_module_interop: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_decorators: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_consistent_casing_in_file_names: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_helpers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_source_map: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lib: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_emit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_emit_helpers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_emit_on_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_fallthrough_cases_in_switch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_implicit_any: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_implicit_returns: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_implicit_this: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_unused_locals: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_unused_parameters: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_const_enums: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_comments: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_lib_check: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_null_checks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_roots: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,

    /// Unrecognized keys, serialized after the typed ones in key order
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CompilerOptions {
    /// Serialize to a JSON object
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Object(Default::default()))
    }

    /// Whether `.d.ts` files will be emitted
    pub fn emits_declarations(&self) -> bool {
        self.declaration.unwrap_or(false)
    }
}

impl Merge for CompilerOptions {
    fn merge(&self, over: &Self) -> Self {
        macro_rules! pick {
            ($($field:ident),* $(,)?) => {
                Self {
                    $($field: over.$field.clone().or_else(|| self.$field.clone()),)*
                    extra: {
                        let mut extra = self.extra.clone();
                        for (key, value) in &over.extra {
                            if !value.is_null() {
                                extra.insert(key.clone(), value.clone());
                            }
                        }
                        extra
                    },
                }
            };
        }

        pick!(
            allow_js,
            allow_synthetic_default_imports,
            allow_unreachable_code,
            allow_unused_labels,
            always_strict,
            base_url,
            declaration,
            emit_decorator_metadata,
            es_module_interop,
            experimental_decorators,
            force_consistent_casing_in_file_names,
            import_helpers,
            inline_source_map,
            jsx,
            lib,
            module,
            module_resolution,
            new_line,
            no_emit,
            no_emit_helpers,
            no_emit_on_error,
            no_fallthrough_cases_in_switch,
            no_implicit_any,
            no_implicit_returns,
            no_implicit_this,
            no_unused_locals,
            no_unused_parameters,
            out_dir,
            paths,
            preserve_const_enums,
            pretty,
            remove_comments,
            root_dir,
            skip_lib_check,
            source_map,
            strict,
            strict_null_checks,
            target,
            type_roots,
            types,
        )
    }
}

/// Project-wide defaults every other preset starts from
pub static DEFAULT_PROJECT: LazyLock<CompilerOptions> = LazyLock::new(|| CompilerOptions {
    allow_js: Some(true),
    allow_synthetic_default_imports: Some(true),
    allow_unreachable_code: Some(false),
    allow_unused_labels: Some(false),
    always_strict: Some(true),
    declaration: Some(false),
    emit_decorator_metadata: Some(true),
    experimental_decorators: Some(true),
    force_consistent_casing_in_file_names: Some(true),
    import_helpers: Some(false),
    lib: Some(vec!["es2017".to_string(), "esnext.asynciterable".to_string()]),
    module: Some("es2015".to_string()),
    module_resolution: Some("node".to_string()),
    new_line: Some("lf".to_string()),
    no_emit: Some(false),
    no_emit_helpers: Some(false),
    no_emit_on_error: Some(true),
    no_fallthrough_cases_in_switch: Some(true),
    no_implicit_any: Some(true),
    no_implicit_returns: Some(true),
    no_implicit_this: Some(true),
    no_unused_locals: Some(true),
    no_unused_parameters: Some(false),
    preserve_const_enums: Some(false),
    pretty: Some(true),
    remove_comments: Some(false),
    skip_lib_check: Some(true),
    source_map: Some(false),
    strict: Some(true),
    strict_null_checks: Some(true),
    target: Some("es2017".to_string()),
    ..Default::default()
});

/// Options for distributed builds
pub static PROD: LazyLock<CompilerOptions> = LazyLock::new(|| {
    DEFAULT_PROJECT.merge(&CompilerOptions {
        allow_js: Some(false),
        declaration: Some(true),
        module: Some("commonjs".to_string()),
        skip_lib_check: Some(false),
        ..Default::default()
    })
});

/// Options for development builds
pub static DEV: LazyLock<CompilerOptions> = LazyLock::new(|| {
    PROD.merge(&CompilerOptions {
        no_unused_locals: Some(false),
        preserve_const_enums: Some(true),
        source_map: Some(true),
        ..Default::default()
    })
});
