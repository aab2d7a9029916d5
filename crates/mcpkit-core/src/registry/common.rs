//! Shared machinery used by the prompt/tool/resource registries
//! (`spec.md` §4.5).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::context::{ExecutionInfo, RequestContext};
use crate::error::CoreError;

/// Outcome of validating a prompt/tool argument map against a
/// [`Validator`] (`spec.md` §9's `ValidationResult{ok, errors?}`).
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Whether validation passed.
    pub ok: bool,
    /// Human-readable failure messages, empty when `ok`.
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// A passing result with no errors.
    pub fn success() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    /// A failing result carrying a single error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            errors: vec![message.into()],
        }
    }

    /// Turn a failing result into the `CoreError` the registry raises.
    pub fn into_result(self) -> Result<(), CoreError> {
        if self.ok {
            Ok(())
        } else {
            Err(CoreError::InvalidParams(self.errors.join("; ")))
        }
    }
}

/// Pluggable validation strategy for a prompt or tool's arguments.
///
/// Concrete schema libraries (e.g. `jsonschema`) become adapters
/// implementing this trait, per `spec.md` §9's "schema-based
/// validation" redesign note.
pub trait Validator: Send + Sync {
    /// Validate `args` and report the outcome.
    fn validate(&self, args: &Value) -> ValidationResult;
}

/// A single declared parameter in a [`DeclarativeValidator`]'s field list.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// The argument/parameter name.
    pub name: String,
    /// Whether this parameter must be present.
    pub required: bool,
    /// Allowed enum values, if this parameter is enum-constrained.
    pub enum_values: Option<Vec<Value>>,
}

impl ParamSpec {
    /// A required parameter with no enum constraint.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            enum_values: None,
        }
    }

    /// An optional parameter with no enum constraint.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            enum_values: None,
        }
    }

    /// Constrain this parameter to one of `values`.
    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Enforces required-key presence and per-field enum constraints over
/// a flat argument/parameter list, the fallback validator described in
/// `spec.md` §4.5 step 2 when no `inputSchema`/custom `validate` is
/// supplied.
#[derive(Debug, Clone, Default)]
pub struct DeclarativeValidator {
    /// The declared parameter shapes.
    pub params: Vec<ParamSpec>,
    /// Whether this is validating tool `arguments` or prompt `parameters`
    /// (only affects the wording of the missing-key error message).
    pub kind: ParamKind,
}

/// Which error wording a [`DeclarativeValidator`] should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamKind {
    /// Tool call arguments: `"Missing required argument 'K'"`.
    #[default]
    Argument,
    /// Prompt parameters: `"Missing required parameter 'K'"`.
    Parameter,
}

impl Validator for DeclarativeValidator {
    fn validate(&self, args: &Value) -> ValidationResult {
        let empty = Map::new();
        let map = args.as_object().unwrap_or(&empty);
        let noun = match self.kind {
            ParamKind::Argument => "argument",
            ParamKind::Parameter => "parameter",
        };

        let mut errors = Vec::new();
        for param in &self.params {
            match map.get(&param.name) {
                None if param.required => {
                    errors.push(format!(
                        "Missing required {noun} '{}'",
                        param.name
                    ));
                }
                Some(value) => {
                    if let Some(allowed) = &param.enum_values {
                        if !allowed.contains(value) {
                            errors.push(format!(
                                "Invalid value for {noun} '{}'",
                                param.name
                            ));
                        }
                    }
                }
                None => {}
            }
        }

        if errors.is_empty() {
            ValidationResult::success()
        } else {
            ValidationResult {
                ok: false,
                errors,
            }
        }
    }
}

/// Lifecycle hooks a registered prompt/tool definition may attach.
/// Called in-line by the registry, never via reflection
/// (`spec.md` §9's "hook functions" redesign note).
#[derive(Clone, Default)]
pub struct Hooks {
    /// Run immediately before the handler, given the validated arguments.
    pub before_execution: Option<BeforeHook>,
    /// Run immediately after a successful handler invocation.
    pub after_execution: Option<AfterHook>,
    /// Run when the handler (or a before/lookup step) raised an error.
    /// Errors raised here do not replace the original error (`spec.md` §7).
    pub on_error: Option<OnErrorHook>,
}

/// `(args, ctx) -> ()`, run before the handler executes.
pub type BeforeHook = std::sync::Arc<
    dyn for<'a> Fn(&'a Value, &'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync,
>;
/// `(result, ctx) -> ()`, run after the handler succeeds.
pub type AfterHook = std::sync::Arc<
    dyn for<'a> Fn(&'a Value, &'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync,
>;
/// `(error, ctx) -> ()`, run when the handler or a prior step fails.
pub type OnErrorHook = std::sync::Arc<
    dyn for<'a> Fn(&'a CoreError, &'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync,
>;

/// Generates `{kind}-{name}-{epochMs}-{rand}` execution ids
/// (`spec.md` §4.5 step 4).
pub fn new_execution_id(kind: &str, name: &str) -> String {
    let epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let rand: u32 = fastrand::u32(..);
    format!("{kind}-{name}-{epoch_ms}-{rand:08x}")
}

/// Build the [`ExecutionInfo`] stamped onto a [`RequestContext`] before
/// a handler runs.
pub fn new_execution_info(kind: &str, name: &str) -> ExecutionInfo {
    ExecutionInfo {
        execution_id: new_execution_id(kind, name),
        start_time: SystemTime::now(),
        timeout: None,
        metadata: Map::new(),
    }
}

/// Read-only snapshot of a registry's success/failure counters.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RegistryMetrics {
    /// Number of dispatches that completed without error.
    pub successes: u64,
    /// Number of dispatches that raised an error.
    pub failures: u64,
}

/// Atomic success/failure counters backing [`RegistryMetrics`].
#[derive(Debug, Default)]
pub struct Counters {
    successes: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    /// Record a successful dispatch.
    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed dispatch.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the current counts.
    pub fn snapshot(&self) -> RegistryMetrics {
        RegistryMetrics {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn execution_id_always_begins_with_kind_and_name(
            kind in "[a-z]{1,8}",
            name in "[a-z][a-z0-9_]{0,16}",
        ) {
            let id = new_execution_id(&kind, &name);
            prop_assert!(id.starts_with(&format!("{kind}-{name}-")));
        }

        #[test]
        fn counters_snapshot_totals_match_recorded_calls(
            successes in 0usize..200,
            failures in 0usize..200,
        ) {
            let counters = Counters::default();
            for _ in 0..successes {
                counters.record_success();
            }
            for _ in 0..failures {
                counters.record_failure();
            }
            let snapshot = counters.snapshot();
            prop_assert_eq!(snapshot.successes as usize, successes);
            prop_assert_eq!(snapshot.failures as usize, failures);
        }
    }
}
