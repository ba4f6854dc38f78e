//! The schema engine: `$ref` resolution, the `schemaSum` wire token,
//! validator compilation, and default-value synthesis.
//!
//! Built on `jsonschema` (the standard compiled-validator crate) and
//! `blake3` for content digesting, used here as a fast, stable version
//! token.

mod default;
mod digest;
mod resolve;

use replicant_base::{kind_err, Error, ErrorKind, Result};
use serde_json::Value;
use std::path::Path;

pub use digest::{canonicalize, schema_sum};
pub use default::synthesize_default;

/// A fully-resolved schema: no external `$ref`s remain, a digest has been
/// computed, a validator has been compiled, and a default value has been
/// synthesized for replicants that declare no `defaultValue` of their own.
///
/// `jsonschema::JSONSchema::compile` borrows the `Value` it compiles
/// against, so the resolved document is leaked to `'static` once at
/// construction time and the validator borrows that leaked reference —
/// replicants hold their `Schema` for the life of the process, so this
/// is a one-time cost per distinct schema, not a per-validation leak.
pub struct Schema {
    resolved: &'static Value,
    sum: String,
    default_value: Value,
    validator: jsonschema::JSONSchema<'static>,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("sum", &self.sum)
            .field("resolved", &self.resolved)
            .finish()
    }
}

impl Schema {
    /// Loads, resolves, and compiles a schema rooted at a filesystem path.
    /// Failure here is never fatal to replicant creation: load failures
    /// are reported but not fatal — callers catch `SchemaLoadFailed` and
    /// fall back to an unvalidated replicant; see `replicant-server`.
    pub fn load(path: impl AsRef<Path>) -> Result<Schema> {
        let resolved = resolve::resolve_schema_file(path.as_ref())?;
        Schema::from_resolved(resolved)
    }

    /// Builds a `Schema` from an already-resolved (no external `$ref`s left)
    /// schema document. Exposed for tests and for in-memory schemas that
    /// never touched a filesystem.
    pub fn from_resolved(resolved: Value) -> Result<Schema> {
        let sum = digest::schema_sum(&resolved);
        let default_value = default::synthesize_default(&resolved);
        let resolved: &'static Value = Box::leak(Box::new(resolved));
        let validator = jsonschema::JSONSchema::compile(resolved)
            .map_err(|e| kind_err(ErrorKind::SchemaLoadFailed, e.to_string()))?;
        Ok(Schema { resolved, sum, default_value, validator })
    }

    pub fn resolved(&self) -> &Value {
        self.resolved
    }

    /// The hex digest that travels on the wire as `schemaSum` — the only
    /// token used on the wire to compare schema versions.
    pub fn sum(&self) -> &str {
        &self.sum
    }

    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// Validates `value` against the compiled schema. `Err` carries
    /// `ErrorKind::ValueInvalid` with every validation error message
    /// joined: a value assigned to a replicant must validate against the
    /// schema before the assignment takes effect.
    pub fn validate(&self, value: &Value) -> Result<()> {
        self.validator.validate(value).map_err(|errors| {
            let detail: Vec<String> = errors.map(|e| e.to_string()).collect();
            kind_err(ErrorKind::ValueInvalid, detail.join("; "))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_matching_value() {
        let schema = Schema::from_resolved(json!({"type": "number"})).unwrap();
        assert!(schema.validate(&json!(1)).is_ok());
    }

    #[test]
    fn rejects_non_matching_value() {
        let schema = Schema::from_resolved(json!({"type": "number"})).unwrap();
        let err = schema.validate(&json!("hello")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueInvalid);
    }

    #[test]
    fn default_value_is_synthesized_when_absent() {
        let schema = Schema::from_resolved(json!({
            "type": "object",
            "required": ["x"],
            "properties": {"x": {"type": "number"}},
        }))
        .unwrap();
        assert_eq!(schema.default_value(), &json!({"x": 0}));
    }

    #[test]
    fn load_from_disk_resolves_and_compiles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("root.json"),
            json!({"type": "object", "properties": {"n": {"type": "number"}}}).to_string(),
        )
        .unwrap();
        let schema = Schema::load(dir.path().join("root.json")).unwrap();
        assert!(schema.validate(&json!({"n": 1})).is_ok());
        assert!(schema.validate(&json!({"n": "x"})).is_err());
    }

    #[test]
    fn load_failure_is_schema_load_failed() {
        let err = Schema::load("/does/not/exist.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaLoadFailed);
    }
}
