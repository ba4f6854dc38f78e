//! Shared fixtures for the rest of the workspace's tests: schema files
//! written to a scratch directory, a structural deep-equality assertion,
//! and builders for common end-to-end mutation scenarios.

use replicant_value::{Operation, OpKind, Path};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Asserts two JSON values are structurally equal, printing both sides on
/// failure (serde_json's own `PartialEq` already does the comparison; this
/// exists so call sites read like an intention rather than a raw `assert_eq!`).
#[macro_export]
macro_rules! deep_eq {
    ($left:expr, $right:expr) => {
        match (&$left, &$right) {
            (left, right) => assert!(
                left == right,
                "values are not deep-equal:\n  left:  {}\n  right: {}",
                serde_json::to_string_pretty(left).unwrap(),
                serde_json::to_string_pretty(right).unwrap(),
            ),
        }
    };
}

/// A scratch directory holding one or more schema files, kept alive for the
/// lifetime of a test via its `TempDir` handle.
pub struct SchemaFixture {
    dir: tempfile::TempDir,
}

impl SchemaFixture {
    /// Writes `files` (relative filename → schema JSON) into a fresh
    /// directory and returns a fixture whose `path_to(name)` resolves them.
    pub fn new(files: &[(&str, Value)]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, schema) in files {
            std::fs::write(dir.path().join(name), schema.to_string()).expect("write schema fixture");
        }
        SchemaFixture { dir }
    }

    pub fn path_to(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// The score-panel schema used across the nested-add / coalescence / array
/// scenarios: an object with a required numeric `score` and an optional
/// array of player names.
pub fn score_panel_schema() -> Value {
    json!({
        "type": "object",
        "required": ["score"],
        "properties": {
            "score": {"type": "number"},
            "players": {"type": "array", "items": {"type": "string"}},
        },
    })
}

/// A schema deliberately incompatible with [`score_panel_schema`] (`score`
/// must be a string instead of a number), for the schema-rejection and
/// schema-upgrade scenarios.
pub fn incompatible_score_panel_schema() -> Value {
    json!({
        "type": "object",
        "required": ["score"],
        "properties": {
            "score": {"type": "string"},
        },
    })
}

/// Builds the `add` operation the nested-add scenario proposes: adding key
/// `c` under `/a` with value `2`.
pub fn nested_add_operation() -> Operation {
    Operation::new(Path::root().child("a"), OpKind::Add { prop: "c".into(), new_value: json!(2) })
}

/// Builds the three-element `splice` operation the array-mutation scenario
/// proposes against `/players`.
pub fn array_splice_operation() -> Operation {
    Operation::new(
        Path::root().child("players"),
        OpKind::ArraySplice { start: 1, delete_count: 1, items: vec![json!("sub")] },
    )
}
