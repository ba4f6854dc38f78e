//! The mutation-observation layer.
//!
//! A transparent property-interception proxy isn't idiomatic Rust: instead
//! of assignment syntax being intercepted, callers mutate through an
//! explicit API — [`MutationSink::set`], `delete`, `overwrite`, and the
//! array mutators — each of which both performs the mutation and records
//! the [`Operation`] that describes it. The wire format produced is
//! identical either way.
//!
//! Because a plain `serde_json::Value` carries no object identity the way a
//! JS object reference does, two edge cases ("assigning the same reference
//! is a no-op" / "assigning a structurally-equal-but-different reference
//! emits an overwrite") collapse into one rule here: **structural equality
//! at the mutated path is a no-op**, full stop.

use replicant_base::Result;
use replicant_value::{apply, navigate, OpKind, Operation, Path};
use serde_json::Value;

/// Wraps a value tree, recording every mutation performed through it as an
/// [`Operation`] — unless recording is suspended (see [`MutationSink::suspend`]).
#[derive(Debug)]
pub struct MutationSink {
    value: Value,
    queue: Vec<Operation>,
    suspend_depth: u32,
}

/// An RAII nesting guard for proxy suspension: enabling and disabling must
/// be strictly nested and must never span a suspension point. Applying an
/// inbound remote operation, or installing a wholesale
/// authoritative replacement after a schema/revision mismatch, holds one of
/// these for the duration so that re-applying the change doesn't re-emit it
/// as a fresh local operation.
pub struct SuspendGuard<'s> {
    sink: &'s mut MutationSink,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.sink.suspend_depth -= 1;
    }
}

impl MutationSink {
    pub fn new(value: Value) -> Self {
        MutationSink { value, queue: Vec::new(), suspend_depth: 0 }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn is_suspended(&self) -> bool {
        self.suspend_depth > 0
    }

    pub fn queue(&self) -> &[Operation] {
        &self.queue
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drains and returns the pending operation queue (end-of-tick flush).
    pub fn take_queue(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.queue)
    }

    pub fn suspend(&mut self) -> SuspendGuard<'_> {
        self.suspend_depth += 1;
        SuspendGuard { sink: self }
    }

    /// Replaces the whole tree while suspended, recording nothing. Used to
    /// install an authoritative snapshot after a revision/schema mismatch
    /// reconciliation.
    pub fn replace_value_suspended(&mut self, new_value: Value) {
        let _guard = self.suspend();
        self.value = new_value;
    }

    /// Applies an already-formed remote operation while suspended, without
    /// touching the queue. Used for inbound `replicant:operations` batches.
    pub fn apply_remote(&mut self, op: &Operation) -> Result<()> {
        let _guard = self.suspend();
        apply(&mut self.value, op)
    }

    fn record(&mut self, op: Operation) {
        if !self.is_suspended() {
            self.queue.push(op);
        }
    }

    /// Replace the entire sub-value at `path` (`overwrite`).
    pub fn overwrite(&mut self, path: &Path, new_value: Value) -> Result<()> {
        if navigate(&self.value, path) == Some(&new_value) {
            return Ok(());
        }
        let op = Operation::new(path.clone(), OpKind::Overwrite { new_value: new_value.clone() });
        apply(&mut self.value, &op)?;
        self.record(op);
        Ok(())
    }

    /// Sets `prop` on the container at `path`, classifying `add` vs.
    /// `update` by whether the key previously existed.
    pub fn set(&mut self, path: &Path, prop: &str, new_value: Value) -> Result<()> {
        let container = navigate(&self.value, path);
        let existing = container.and_then(|c| c.get(prop));
        if existing == Some(&new_value) {
            return Ok(());
        }
        let kind = if existing.is_some() {
            OpKind::Update { prop: prop.to_string(), new_value: new_value.clone() }
        } else {
            OpKind::Add { prop: prop.to_string(), new_value: new_value.clone() }
        };
        let op = Operation::new(path.clone(), kind);
        apply(&mut self.value, &op)?;
        self.record(op);
        Ok(())
    }

    /// Removes `prop` from the container at `path` (`delete`). A no-op (no
    /// operation recorded) if the key is already absent.
    pub fn delete(&mut self, path: &Path, prop: &str) -> Result<()> {
        let container = navigate(&self.value, path);
        if container.and_then(|c| c.get(prop)).is_none() {
            return Ok(());
        }
        let op = Operation::new(path.clone(), OpKind::Delete { prop: prop.to_string() });
        apply(&mut self.value, &op)?;
        self.record(op);
        Ok(())
    }

    fn array_op(&mut self, path: &Path, kind: OpKind) -> Result<()> {
        let op = Operation::new(path.clone(), kind);
        apply(&mut self.value, &op)?;
        self.record(op);
        Ok(())
    }

    pub fn splice(&mut self, path: &Path, start: i64, delete_count: i64, items: Vec<Value>) -> Result<()> {
        self.array_op(path, OpKind::ArraySplice { start, delete_count, items })
    }

    pub fn push(&mut self, path: &Path, items: Vec<Value>) -> Result<()> {
        self.array_op(path, OpKind::ArrayPush { items })
    }

    pub fn pop(&mut self, path: &Path) -> Result<()> {
        self.array_op(path, OpKind::ArrayPop)
    }

    pub fn shift(&mut self, path: &Path) -> Result<()> {
        self.array_op(path, OpKind::ArrayShift)
    }

    pub fn unshift(&mut self, path: &Path, items: Vec<Value>) -> Result<()> {
        self.array_op(path, OpKind::ArrayUnshift { items })
    }

    pub fn reverse(&mut self, path: &Path) -> Result<()> {
        self.array_op(path, OpKind::ArrayReverse)
    }

    pub fn sort(&mut self, path: &Path) -> Result<()> {
        self.array_op(path, OpKind::ArraySort)
    }

    pub fn copy_within(&mut self, path: &Path, target: i64, start: i64, end: Option<i64>) -> Result<()> {
        self.array_op(path, OpKind::ArrayCopyWithin { target, start, end })
    }

    pub fn fill(&mut self, path: &Path, value: Value, start: Option<i64>, end: Option<i64>) -> Result<()> {
        self.array_op(path, OpKind::ArrayFill { value, start, end })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_set_emits_nothing() {
        let mut sink = MutationSink::new(json!({"a": 1}));
        sink.set(&Path::root(), "a", json!(1)).unwrap();
        assert!(sink.queue_is_empty());
    }

    #[test]
    fn new_key_is_classified_as_add() {
        let mut sink = MutationSink::new(json!({"a": {"b": 1}}));
        sink.set(&Path::root().child("a"), "c", json!(2)).unwrap();
        assert_eq!(sink.value(), &json!({"a": {"b": 1, "c": 2}}));
        assert_eq!(sink.queue().len(), 1);
        assert_eq!(sink.queue()[0].method(), "add");
    }

    #[test]
    fn existing_key_is_classified_as_update() {
        let mut sink = MutationSink::new(json!({"a": 1}));
        sink.set(&Path::root(), "a", json!(2)).unwrap();
        assert_eq!(sink.queue()[0].method(), "update");
    }

    #[test]
    fn delete_missing_key_is_a_no_op() {
        let mut sink = MutationSink::new(json!({"a": 1}));
        sink.delete(&Path::root(), "missing").unwrap();
        assert!(sink.queue_is_empty());
    }

    #[test]
    fn coalesces_multiple_mutations_into_one_queue() {
        let mut sink = MutationSink::new(json!({}));
        sink.set(&Path::root(), "a", json!(1)).unwrap();
        sink.set(&Path::root(), "b", json!(2)).unwrap();
        sink.delete(&Path::root(), "a").unwrap();
        sink.set(&Path::root(), "c", json!(3)).unwrap();
        assert_eq!(sink.value(), &json!({"b": 2, "c": 3}));
        let ops = sink.take_queue();
        assert_eq!(ops.len(), 4);
        assert!(sink.queue_is_empty());
    }

    #[test]
    fn suspended_mutations_are_not_recorded() {
        let mut sink = MutationSink::new(json!({"a": 1}));
        {
            let _guard = sink.suspend();
            assert!(sink.is_suspended());
        }
        assert!(!sink.is_suspended());

        let op = Operation::new(Path::root(), OpKind::Update { prop: "a".into(), new_value: json!(2) });
        sink.apply_remote(&op).unwrap();
        assert_eq!(sink.value(), &json!({"a": 2}));
        assert!(sink.queue_is_empty());
    }

    #[test]
    fn suspension_nests_strictly() {
        let mut sink = MutationSink::new(json!(null));
        let outer = sink.suspend();
        assert!(outer.sink.is_suspended());
        drop(outer);
        assert!(!sink.is_suspended());
    }

    #[test]
    fn array_splice_records_operation() {
        let mut sink = MutationSink::new(json!([10, 20, 30]));
        sink.splice(&Path::root(), 1, 1, vec![json!(40), json!(50)]).unwrap();
        assert_eq!(sink.value(), &json!([10, 40, 50, 30]));
        assert_eq!(sink.queue()[0].method(), "array:splice");
    }

    #[test]
    fn overwrite_of_structurally_equal_value_is_a_no_op() {
        let mut sink = MutationSink::new(json!({"a": {"b": 1}}));
        sink.overwrite(&Path::root().child("a"), json!({"b": 1})).unwrap();
        assert!(sink.queue_is_empty());
    }
}
