//! The `Transport` binding: full-duplex message framing, named rooms for
//! multicast, and RPC-with-acknowledgement semantics.
//!
//! Built around explicit `VecDeque`-based incoming/outgoing queues and
//! request/response pairing by sequence number, generalized from strict
//! point-to-point delivery to peer *and* room multicast
//! (`replicant:${namespace}` rooms — "room discipline").

use crate::wire::WireMessage;
use replicant_base::Result;
use serde::{Deserialize, Serialize};

/// Identifies one endpoint of the transport — a server process or a
/// connected client socket.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u64);

/// A peer's RPC handler: given the sender and the request, answers it,
/// with access back to the transport for room/broadcast bookkeeping.
pub type Handler = Box<dyn FnMut(PeerId, WireMessage, &mut dyn Transport) -> WireMessage>;

/// A transport meeting these requirements supports the protocol; the
/// reference target is a Socket.IO-shaped wire.
pub trait Transport {
    /// Registers the handler a peer uses to answer RPC requests addressed to
    /// it (the server side of `declare`/`proposeOperations`/`read`). The
    /// handler receives the transport itself so a server-side handler can
    /// join rooms or broadcast as part of answering the request — the
    /// implementation is responsible for making that reentrant (see
    /// `LoopbackTransport::request`).
    fn register_handler(&mut self, peer: PeerId, handler: Handler);

    /// Joins `peer` to `room` (idempotent). When a client declares a
    /// replicant, the Replicator joins the socket to room
    /// `replicant:${namespace}`.
    fn join_room(&mut self, peer: PeerId, room: &str);

    /// Removes `peer` from every room it was in (socket disconnect).
    fn leave_all_rooms(&mut self, peer: PeerId);

    /// Sends an RPC request to `to` and blocks for its reply. A
    /// single-threaded cooperative model means this never actually blocks
    /// a real event loop — the reference transport invokes the peer's
    /// registered handler synchronously before returning.
    fn request(&mut self, from: PeerId, to: PeerId, msg: WireMessage) -> Result<WireMessage>;

    /// One-way room multicast — the `replicant:operations` broadcast
    /// (at most one broadcast per task per replicant). `exclude`, when
    /// set, is the originating socket (never echoed back to its own
    /// sender).
    fn broadcast_room(&mut self, room: &str, exclude: Option<PeerId>, msg: WireMessage);

    /// Drains messages broadcast to `peer` since its last poll — inbound
    /// `replicant:operations` batches the client reconciles against.
    fn poll(&mut self, peer: PeerId) -> Vec<WireMessage>;
}
