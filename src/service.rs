//! Transform façade: resolves a mapping config, captures a snapshot of the
//! functions and dictionaries it references and runs the evaluator.

use crate::error::{MapError, MapResult};
use crate::mapping::{resolve_mapping_tree_with, MappingNode};
use crate::registry::{DictionaryStore, FunctionRegistry};
use crate::transform_execution::{
    evaluate, CancellationToken, EvaluationOptions, ExecutionConfig, FailurePolicy,
    MissingFieldPolicy, TransformError, TransformSnapshot,
};
use crate::version_store::{ConfigScope, ConfigType, MappingConfig, VersionStore};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;

/// Per-call overrides. Unset policies fall back to the engine defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOptions {
    #[serde(default)]
    pub pretty_print: bool,
    #[serde(default)]
    pub policy: Option<FailurePolicy>,
    #[serde(default)]
    pub missing_field: Option<MissingFieldPolicy>,
    #[serde(skip)]
    pub cancellation: Option<CancellationToken>,
}

impl TransformOptions {
    pub fn pretty() -> Self {
        Self {
            pretty_print: true,
            ..Self::default()
        }
    }

    pub fn lenient() -> Self {
        Self {
            policy: Some(FailurePolicy::Lenient),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutcome {
    pub output: JsonValue,
    /// `output` serialized, pretty or compact
    pub rendered: String,
    /// Failures localized under the lenient policy
    pub errors: Vec<TransformError>,
}

pub struct TransformService {
    functions: Arc<FunctionRegistry>,
    dictionaries: Arc<DictionaryStore>,
    configs: Arc<VersionStore>,
    execution: ExecutionConfig,
}

impl TransformService {
    pub fn new(
        functions: Arc<FunctionRegistry>,
        dictionaries: Arc<DictionaryStore>,
        configs: Arc<VersionStore>,
        execution: ExecutionConfig,
    ) -> Self {
        Self {
            functions,
            dictionaries,
            configs,
            execution,
        }
    }

    /// Resolves a submitted mapping document; legacy dictionary ids are
    /// looked up in the dictionary store.
    pub fn resolve_tree(&self, raw: &JsonValue) -> MapResult<MappingNode> {
        resolve_mapping_tree_with(raw, self.dictionaries.as_ref())
    }

    /// Checks that every code `tree` references may be used by a newly saved
    /// config: functions must be system functions or enabled custom ones,
    /// dictionaries must exist.
    pub fn validate_references(&self, tree: &MappingNode) -> MapResult<()> {
        for code in tree.referenced_functions() {
            if !self.functions.is_usable(&code)? {
                return Err(MapError::Validation(format!(
                    "Function '{}' does not exist or is disabled",
                    code
                )));
            }
        }
        for code in tree.referenced_dictionaries() {
            if self.dictionaries.find_by_code(&code)?.is_none() {
                return Err(MapError::Validation(format!("Dictionary '{}' does not exist", code)));
            }
        }
        Ok(())
    }

    /// Captures everything one evaluation of `root` reads.
    pub fn snapshot(&self, root: Arc<MappingNode>) -> MapResult<TransformSnapshot> {
        let function_codes = root.referenced_functions();
        let dictionary_codes = root.referenced_dictionaries();
        let functions = self.functions.snapshot(
            function_codes.iter().map(String::as_str),
            self.execution.strict_disabled_references,
        )?;
        let dictionaries = self
            .dictionaries
            .snapshot(dictionary_codes.iter().map(String::as_str))?;
        Ok(TransformSnapshot {
            root,
            functions,
            dictionaries,
        })
    }

    fn evaluation_options(&self, options: &TransformOptions) -> EvaluationOptions {
        let defaults = self.execution.default_options();
        EvaluationOptions {
            policy: options.policy.unwrap_or(defaults.policy),
            missing_field: options.missing_field.unwrap_or(defaults.missing_field),
            cancellation: options.cancellation.clone(),
        }
    }

    /// Runs an already assembled snapshot.
    pub fn run(
        &self,
        snapshot: &TransformSnapshot,
        source: &JsonValue,
        options: &TransformOptions,
    ) -> MapResult<TransformOutcome> {
        let source = parse_source(source)?;
        let evaluation_options = self.evaluation_options(options);
        let started = Instant::now();

        let evaluation = evaluate(
            &snapshot.root,
            &source,
            &snapshot.functions,
            &snapshot.dictionaries,
            &evaluation_options,
        )?;
        debug!(
            "Evaluated mapping tree in {:?} ({} localized errors)",
            started.elapsed(),
            evaluation.errors.len()
        );

        let rendered = if options.pretty_print {
            serde_json::to_string_pretty(&evaluation.output)?
        } else {
            serde_json::to_string(&evaluation.output)?
        };
        Ok(TransformOutcome {
            output: evaluation.output,
            rendered,
            errors: evaluation.errors,
        })
    }

    /// Evaluates an ad-hoc tree that was never saved.
    pub fn transform_inline(
        &self,
        tree: MappingNode,
        source: &JsonValue,
        options: &TransformOptions,
    ) -> MapResult<TransformOutcome> {
        let snapshot = self.snapshot(Arc::new(tree))?;
        self.run(&snapshot, source, options)
    }

    fn transform_config(
        &self,
        config: MappingConfig,
        source: &JsonValue,
        options: &TransformOptions,
    ) -> MapResult<TransformOutcome> {
        if !config.enabled {
            return Err(MapError::Validation(format!(
                "Mapping config '{}' v{} is disabled",
                config.name, config.version
            )));
        }
        info!(
            "Transforming with '{}' v{} ({} {})",
            config.name,
            config.version,
            config.scope(),
            config.config_type
        );
        let snapshot = self.snapshot(Arc::new(config.mapping_tree))?;
        self.run(&snapshot, source, options)
    }

    pub fn transform_by_config(
        &self,
        config_id: &str,
        source: &JsonValue,
        options: &TransformOptions,
    ) -> MapResult<TransformOutcome> {
        let config = self.configs.get(config_id)?;
        self.transform_config(config, source, options)
    }

    /// Uses the current version unless `version` is given.
    pub fn transform_by_scope(
        &self,
        scope: &ConfigScope,
        config_type: ConfigType,
        version: Option<u32>,
        source: &JsonValue,
        options: &TransformOptions,
    ) -> MapResult<TransformOutcome> {
        let config = match version {
            Some(version) => self.configs.get_by_version(scope, config_type, version)?,
            None => self.configs.get_current(scope, config_type)?,
        };
        self.transform_config(config, source, options)
    }

    pub fn transform_by_name(
        &self,
        name: &str,
        source: &JsonValue,
        options: &TransformOptions,
    ) -> MapResult<TransformOutcome> {
        let config = self.configs.find_current_by_name(name)?;
        self.transform_config(config, source, options)
    }
}

/// Source data may arrive as a JSON document encoded in a string.
pub fn parse_source(source: &JsonValue) -> MapResult<JsonValue> {
    match source {
        JsonValue::String(text) if looks_like_document(text) => serde_json::from_str(text)
            .map_err(|e| MapError::Validation(format!("sourceData is not valid JSON: {}", e))),
        other => Ok(other.clone()),
    }
}

fn looks_like_document(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}
