//! `ServerReplicant`: the per-(namespace,name) state holder — value,
//! revision, schema, validator, operation queue, throttled-save flag.

use replicant_base::Result;
use replicant_observe::MutationSink;
use replicant_schema::Schema;
use replicant_value::{apply, Operation, Path};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a subscriber learns about one flush: a local
/// `change(newValue, oldValue, operations)` event, delivered synchronously
/// within the flush via a typed message bus rather than inheritance.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub new_value: Value,
    pub old_value: Value,
    pub operations: Vec<Operation>,
    pub revision: u64,
}

/// The `{ operations, revision }` a caller needs to broadcast after a
/// successful flush.
#[derive(Clone, Debug)]
pub struct FlushOutcome {
    pub operations: Vec<Operation>,
    pub revision: u64,
}

/// `{ value, revision, schema, schemaSum }` — the declaration-reply shape
/// produced by `snapshot()`.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub value: Value,
    pub revision: u64,
    pub schema: Option<Value>,
    pub schema_sum: Option<String>,
}

pub struct ServerReplicant {
    name: String,
    namespace: String,
    sink: MutationSink,
    revision: u64,
    schema: Option<Arc<Schema>>,
    persistent: bool,
    persistence_interval: Duration,
    last_save: Option<Instant>,
    pending_save: bool,
    on_change: Vec<Box<dyn FnMut(&ChangeEvent)>>,
}

impl ServerReplicant {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        initial_value: Value,
        schema: Option<Arc<Schema>>,
        persistent: bool,
        persistence_interval: Duration,
    ) -> Self {
        let name = name.into();
        let namespace = namespace.into();
        tracing::info!(target: "replicant", %name, %namespace, "replicant declared");
        ServerReplicant {
            name,
            namespace,
            sink: MutationSink::new(initial_value),
            revision: 0,
            schema,
            persistent,
            persistence_interval,
            last_save: None,
            pending_save: false,
            on_change: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn value(&self) -> &Value {
        self.sink.value()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    pub fn schema_value(&self) -> Option<&Value> {
        self.schema.as_ref().map(|s| s.resolved())
    }

    pub fn schema_sum(&self) -> Option<&str> {
        self.schema.as_ref().map(|s| s.sum())
    }

    pub fn persistent(&self) -> bool {
        self.persistent
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            value: self.value().clone(),
            revision: self.revision,
            schema: self.schema_value().cloned(),
            schema_sum: self.schema_sum().map(String::from),
        }
    }

    /// `assign(value)`: validates against the schema (if any) *before* any
    /// state changes (the validation-precedence invariant — P2), then
    /// installs it as a single `overwrite` batch. Returns `None` if the new
    /// value is structurally equal to the current one (no-op, no flush).
    pub fn assign(&mut self, value: Value) -> Result<Option<FlushOutcome>> {
        if let Some(schema) = &self.schema {
            schema.validate(&value)?;
        }
        self.mutate(|sink| sink.overwrite(&Path::root(), value))
    }

    /// Runs one batch of local mutations through the sink and flushes
    /// exactly once if anything was actually queued — an explicit
    /// substitute for an implicit end-of-tick flush, with a Rust closure
    /// scope standing in for "one task".
    pub fn mutate<F>(&mut self, f: F) -> Result<Option<FlushOutcome>>
    where
        F: FnOnce(&mut MutationSink) -> Result<()>,
    {
        let old_value = self.value().clone();
        f(&mut self.sink)?;
        if self.sink.queue_is_empty() {
            return Ok(None);
        }
        let ops = self.sink.take_queue();
        Ok(Some(self.finish_flush(old_value, ops)))
    }

    /// Applies a proposed remote operation batch atomically: built against a
    /// scratch copy first so that an `unknown-operation` error, or a
    /// resulting value that fails schema validation (validation precedes any
    /// mutation taking effect), aborts the whole batch without partial
    /// application, leaving state untouched.
    pub fn apply_accepted_proposal(&mut self, operations: Vec<Operation>) -> Result<FlushOutcome> {
        let mut scratch = self.value().clone();
        for op in &operations {
            apply(&mut scratch, op)?;
        }
        if let Some(schema) = &self.schema {
            schema.validate(&scratch)?;
        }
        let old_value = self.value().clone();
        self.sink.replace_value_suspended(scratch);
        Ok(self.finish_flush(old_value, operations))
    }

    fn finish_flush(&mut self, old_value: Value, operations: Vec<Operation>) -> FlushOutcome {
        self.revision += 1;
        let event = ChangeEvent {
            new_value: self.value().clone(),
            old_value,
            operations: operations.clone(),
            revision: self.revision,
        };
        tracing::info!(
            target: "replicant",
            name = %self.name,
            namespace = %self.namespace,
            revision = self.revision,
            op_count = event.operations.len(),
            "replicant flush"
        );
        for cb in &mut self.on_change {
            cb(&event);
        }
        self.pending_save = true;
        FlushOutcome { operations, revision: self.revision }
    }

    /// Registers a change handler. A handler added after the replicant
    /// already holds a value fires once immediately with the current value
    /// before being wired up for future flushes.
    pub fn on_change(&mut self, mut cb: Box<dyn FnMut(&ChangeEvent)>) {
        let immediate = ChangeEvent {
            new_value: self.value().clone(),
            old_value: self.value().clone(),
            operations: Vec::new(),
            revision: self.revision,
        };
        cb(&immediate);
        self.on_change.push(cb);
    }

    /// Throttle check for `requestSave`: collapses repeated save requests
    /// within `persistenceInterval` into one write.
    pub fn is_save_due(&self, now: Instant) -> bool {
        self.pending_save
            && self.last_save.map(|t| now.duration_since(t) >= self.persistence_interval).unwrap_or(true)
    }

    pub fn mark_saved(&mut self, now: Instant) {
        self.pending_save = false;
        self.last_save = Some(now);
    }

    pub fn pending_save(&self) -> bool {
        self.pending_save
    }
}
