//! Demo binary: wires one `Replicator` and two `ClientReplicant`s together
//! over a `LoopbackTransport` and drives them through a declare/mutate/
//! reconcile/shutdown sequence, tracing every step. Graphics and dashboard
//! rendering are out of scope; this is a terminal illustration only.

use replicant::{ClientReplicant, DeclareOptions, LoopbackTransport, PeerId, ReplicantOpts, Replicator, WireMessage};
use replicant_store::MemoryStore;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

const SERVER: PeerId = PeerId(0);
const ALICE: PeerId = PeerId(1);
const BOB: PeerId = PeerId(2);

fn main() {
    replicant_admin::init_tracing();

    let replicator = Rc::new(RefCell::new(Replicator::with_store_factory(
        replicant_admin::RuntimeConfig::default(),
        |_namespace| Ok(MemoryStore::new()),
    )));
    let mut transport = LoopbackTransport::new();

    // `LoopbackTransport::request` detaches a peer's handler from its map
    // before invoking it, so this closure is free to call back into the
    // same `transport` it was handed (joining rooms, broadcasting) without
    // deadlocking or double-borrowing.
    let handler_replicator = replicator.clone();
    transport.register_handler(
        SERVER,
        Box::new(move |from, msg, transport| handler_replicator.borrow_mut().handle_message(from, msg, transport)),
    );

    replicator
        .borrow_mut()
        .declare(
            "dashboard",
            "scoreboard",
            DeclareOptions { default_value: Some(json!({"score": 0, "players": ["alice"]})), persistent: true, ..Default::default() },
        )
        .expect("server-side declare");

    let mut alice = ClientReplicant::new("scoreboard", "dashboard", ALICE, json!(null));
    alice.declare(&mut transport, SERVER, ReplicantOpts::default()).expect("alice declare");
    tracing::info!(value = %alice.value(), "alice declared");

    let mut bob = ClientReplicant::new("scoreboard", "dashboard", BOB, json!(null));
    bob.declare(&mut transport, SERVER, ReplicantOpts::default()).expect("bob declare");
    tracing::info!(value = %bob.value(), "bob declared");

    alice
        .mutate(&mut transport, |sink| {
            sink.set(&replicant::Path::root(), "score", json!(1))?;
            sink.push(&replicant::Path::root().child("players"), vec![json!("bob")])
        })
        .expect("alice mutate");
    tracing::info!(revision = alice.revision(), value = %alice.value(), "alice flushed");

    for msg in transport.poll(BOB) {
        if let WireMessage::Operations(batch) = msg {
            bob.on_operations_broadcast(&mut transport, batch).expect("bob reconcile");
        }
    }
    tracing::info!(revision = bob.revision(), value = %bob.value(), "bob reconciled");

    replicator.borrow_mut().save_all_replicants();
    tracing::info!("shutdown snapshot written");
}
