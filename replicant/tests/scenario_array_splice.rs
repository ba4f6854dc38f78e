//! `splice(1, 1, ...)` against a root-level array
//! produces a single `array:splice` operation and the expected result.

mod common;

use common::{test_replicator, wire_up, SERVER};
use replicant::{ClientReplicant, DeclareOptions, LoopbackTransport, OpKind, PeerId, Path, ReplicantOpts, Transport, WireMessage};
use replicant_schema::Schema;
use replicant_testing::{array_splice_operation, deep_eq, score_panel_schema};
use serde_json::json;

#[test]
fn splicing_the_root_array_replaces_the_middle_element() {
    let replicator = test_replicator();
    replicator
        .borrow_mut()
        .declare("x", "r", DeclareOptions { default_value: Some(json!([10, 20, 30])), persistent: true, ..Default::default() })
        .unwrap();
    let mut transport = LoopbackTransport::new();
    wire_up(replicator.clone(), &mut transport);

    let mut client = ClientReplicant::new("r", "x", PeerId(1), json!(null));
    client.declare(&mut transport, SERVER, ReplicantOpts::default()).unwrap();
    let mut observer = ClientReplicant::new("r", "x", PeerId(2), json!(null));
    observer.declare(&mut transport, SERVER, ReplicantOpts::default()).unwrap();

    client
        .mutate(&mut transport, |sink| sink.splice(&Path::root(), 1, 1, vec![json!(40), json!(50)]))
        .unwrap();

    assert_eq!(client.value(), &json!([10, 40, 50, 30]));
    assert_eq!(client.revision(), 1);
    assert_eq!(replicator.borrow().read("x", "r").unwrap(), json!([10, 40, 50, 30]));

    let inbox = transport.poll(PeerId(2));
    assert_eq!(inbox.len(), 1);
    match &inbox[0] {
        WireMessage::Operations(batch) => {
            assert_eq!(batch.revision, 1);
            assert_eq!(batch.operations.len(), 1);
            assert_eq!(batch.operations[0].path, Path::root());
            match &batch.operations[0].kind {
                OpKind::ArraySplice { start, delete_count, items } => {
                    assert_eq!(*start, 1);
                    assert_eq!(*delete_count, 1);
                    assert_eq!(items, &vec![json!(40), json!(50)]);
                }
                other => panic!("unexpected kind {other:?}"),
            }
        }
        other => panic!("unexpected message {other:?}"),
    }

    for msg in inbox {
        if let WireMessage::Operations(batch) = msg {
            observer.on_operations_broadcast(&mut transport, batch).unwrap();
        }
    }
    assert_eq!(observer.value(), &json!([10, 40, 50, 30]));
}

/// Same mutation, but against a schema-validated replicant, reusing the
/// shared score-panel fixture and splice-operation builder rather than
/// constructing the schema and operation by hand.
#[test]
fn splicing_a_schema_validated_players_array_substitutes_one_player() {
    let schema = Schema::from_resolved(score_panel_schema()).unwrap();
    let mut replicant = replicant_server::ServerReplicant::new(
        "r",
        "x",
        json!({"score": 0, "players": ["alice", "bob", "carol"]}),
        Some(std::sync::Arc::new(schema)),
        true,
        std::time::Duration::from_millis(50),
    );

    let op = array_splice_operation();
    let outcome = replicant
        .mutate(|sink| {
            let OpKind::ArraySplice { start, delete_count, items } = &op.kind else {
                unreachable!("array_splice_operation always builds an ArraySplice");
            };
            sink.splice(&op.path, *start, *delete_count, items.clone())
        })
        .unwrap()
        .unwrap();

    assert_eq!(outcome.operations, vec![op]);
    deep_eq!(replicant.value(), &json!({"score": 0, "players": ["alice", "sub", "carol"]}));
}
