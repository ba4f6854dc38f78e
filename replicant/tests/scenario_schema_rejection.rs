//! Assigning a value that fails schema validation
//! is a user-visible `value-invalid` error, both for a local `assign()` and
//! for a remotely proposed batch — in both cases state is left untouched
//! and nothing is broadcast.

use replicant::{ErrorKind, LoopbackTransport, Operation, OpKind, Path, PeerId, ReplicantOpts, Transport};
use replicant_schema::Schema;
use replicant_server::{DeclareOptions, Replicator, ServerReplicant};
use replicant_store::MemoryStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn local_assignment_of_a_schema_invalid_value_is_rejected_and_state_is_untouched() {
    let schema = Schema::from_resolved(json!({"type": "number"})).unwrap();
    let mut replicant = ServerReplicant::new("r", "x", json!(1), Some(Arc::new(schema)), true, Duration::from_millis(50));

    let before = replicant.value().clone();
    let err = replicant.assign(json!("hello")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValueInvalid);
    assert_eq!(replicant.value(), &before);
    assert_eq!(replicant.revision(), 0);
}

#[test]
fn remotely_proposed_batch_that_fails_schema_validation_is_rejected_without_broadcast() {
    let schema_dir = tempfile::tempdir().unwrap();
    let schema = json!({"type": "object", "required": ["score"], "properties": {"score": {"type": "number"}}});
    std::fs::write(schema_dir.path().join("s.json"), schema.to_string()).unwrap();

    let mut replicator = Replicator::with_store_factory(Default::default(), |_ns| Ok(MemoryStore::new()));
    replicator
        .declare(
            "x",
            "r",
            DeclareOptions {
                default_value: Some(json!({"score": 1})),
                persistent: true,
                schema_path: Some(schema_dir.path().join("s.json")),
                ..Default::default()
            },
        )
        .unwrap();

    let schema_sum = replicator.get("x", "r").unwrap().schema_sum().map(String::from);
    let mut transport = LoopbackTransport::new();
    transport.join_room(PeerId(2), "replicant:x");

    let req = replicant::ProposeOperationsRequest {
        name: "r".into(),
        namespace: "x".into(),
        operations: vec![Operation::new(Path::root(), OpKind::Update { prop: "score".into(), new_value: json!("not a number") })],
        opts: ReplicantOpts::default(),
        revision: 0,
        schema_sum,
    };
    let reply = replicator.propose_operations(PeerId(1), &req, &mut transport).unwrap();

    assert_eq!(reply.reject_reason.as_deref(), Some("value-invalid"));
    assert_eq!(replicator.read("x", "r").unwrap(), json!({"score": 1}));
    assert_eq!(replicator.get("x", "r").unwrap().revision(), 0);
    assert!(transport.poll(PeerId(2)).is_empty());
}
