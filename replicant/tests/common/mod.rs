//! Shared wiring for the end-to-end scenario tests: a `Replicator` backed by
//! an in-memory store, registered as the server-side handler of a
//! `LoopbackTransport` that clients can `declare`/`mutate` against.

use replicant::{LoopbackTransport, PeerId, Replicator, Transport};
use replicant_store::MemoryStore;
use std::cell::RefCell;
use std::rc::Rc;

pub const SERVER: PeerId = PeerId(0);

pub fn test_replicator() -> Rc<RefCell<Replicator<MemoryStore>>> {
    Rc::new(RefCell::new(Replicator::with_store_factory(Default::default(), |_ns| Ok(MemoryStore::new()))))
}

/// Registers the server's handler on the same transport instance clients
/// call `request` against. `LoopbackTransport::request` detaches a peer's
/// handler from its map before invoking it, so this closure is free to call
/// back into the `transport` argument it's handed (joining rooms,
/// broadcasting) without double-borrowing.
pub fn wire_up(replicator: Rc<RefCell<Replicator<MemoryStore>>>, transport: &mut LoopbackTransport) {
    transport.register_handler(
        SERVER,
        Box::new(move |from, msg, transport| replicator.borrow_mut().handle_message(from, msg, transport)),
    );
}
