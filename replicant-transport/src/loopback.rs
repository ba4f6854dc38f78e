//! `LoopbackTransport`: a synchronous, single-process reference
//! implementation of [`Transport`], built around an `IOQueues`-style
//! `VecDeque` design (see `transport.rs` module doc).
//!
//! There is no real network in this implementation, so "sending bytes" is
//! just pushing an already-decoded [`WireMessage`] onto a peer's inbox; a
//! `request` is resolved immediately by invoking the target peer's
//! registered handler in place, matching a cooperative single-task model
//! (no preemption mid-task, so a synchronous function call is a faithful
//! model of "send, then await the ack").

use crate::transport::{Handler, PeerId, Transport};
use crate::wire::WireMessage;
use replicant_base::{err, Result};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Default)]
pub struct LoopbackTransport {
    rooms: HashMap<String, HashSet<PeerId>>,
    inboxes: HashMap<PeerId, VecDeque<WireMessage>>,
    handlers: HashMap<PeerId, Handler>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for LoopbackTransport {
    fn register_handler(&mut self, peer: PeerId, handler: Handler) {
        self.handlers.insert(peer, handler);
    }

    fn join_room(&mut self, peer: PeerId, room: &str) {
        self.rooms.entry(room.to_string()).or_default().insert(peer);
    }

    fn leave_all_rooms(&mut self, peer: PeerId) {
        for members in self.rooms.values_mut() {
            members.remove(&peer);
        }
    }

    /// Temporarily removes `to`'s handler before invoking it so the handler
    /// is free to call back into `self` (join a room, broadcast) without
    /// re-borrowing a handler the map still thinks is in use — the
    /// reentrancy this crate's synchronous RPC model requires.
    fn request(&mut self, from: PeerId, to: PeerId, msg: WireMessage) -> Result<WireMessage> {
        let mut handler = self.handlers.remove(&to).ok_or_else(|| err("no handler registered for peer"))?;
        let reply = handler(from, msg, self);
        self.handlers.insert(to, handler);
        Ok(reply)
    }

    fn broadcast_room(&mut self, room: &str, exclude: Option<PeerId>, msg: WireMessage) {
        let Some(members) = self.rooms.get(room) else { return };
        for &peer in members {
            if Some(peer) == exclude {
                continue;
            }
            self.inboxes.entry(peer).or_default().push_back(msg.clone());
        }
    }

    fn poll(&mut self, peer: PeerId) -> Vec<WireMessage> {
        self.inboxes.get_mut(&peer).map(|q| q.drain(..).collect()).unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::{DeclareReply, DeclareRequest, ReplicantOpts};

    #[test]
    fn request_invokes_target_handler_synchronously() {
        let mut t = LoopbackTransport::new();
        let server = PeerId(0);
        let client = PeerId(1);
        t.register_handler(
            server,
            Box::new(|_from, _msg, _transport| {
                WireMessage::DeclareReply(DeclareReply {
                    value: serde_json::json!(1),
                    revision: 0,
                    schema: None,
                    schema_sum: None,
                    reject_reason: None,
                })
            }),
        );
        let reply = t
            .request(
                client,
                server,
                WireMessage::Declare(DeclareRequest {
                    name: "r".into(),
                    namespace: "x".into(),
                    opts: ReplicantOpts::default(),
                }),
            )
            .unwrap();
        match reply {
            WireMessage::DeclareReply(r) => assert_eq!(r.value, serde_json::json!(1)),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn broadcast_excludes_sender_and_reaches_room_members() {
        let mut t = LoopbackTransport::new();
        let a = PeerId(1);
        let b = PeerId(2);
        let c = PeerId(3);
        t.join_room(a, "replicant:x");
        t.join_room(b, "replicant:x");
        // c never joins; should never receive anything.
        let msg = WireMessage::Operations(crate::wire::OperationsBroadcast {
            name: "r".into(),
            namespace: "x".into(),
            revision: 1,
            operations: vec![],
        });
        t.broadcast_room("replicant:x", Some(a), msg.clone());
        assert_eq!(t.poll(a), Vec::new());
        assert_eq!(t.poll(b), vec![msg]);
        assert_eq!(t.poll(c), Vec::new());
    }

    #[test]
    fn handler_can_join_room_and_broadcast_reentrantly() {
        let mut t = LoopbackTransport::new();
        let server = PeerId(0);
        let client = PeerId(1);
        t.register_handler(
            server,
            Box::new(|from, _msg, transport| {
                transport.join_room(from, "replicant:x");
                transport.broadcast_room(
                    "replicant:x",
                    None,
                    WireMessage::Operations(crate::wire::OperationsBroadcast {
                        name: "r".into(),
                        namespace: "x".into(),
                        revision: 1,
                        operations: vec![],
                    }),
                );
                WireMessage::ReadReply(serde_json::json!(null))
            }),
        );
        t.request(client, server, WireMessage::Read(crate::wire::ReadRequest { name: "r".into(), namespace: "x".into() })).unwrap();
        assert_eq!(t.poll(client).len(), 1);
    }

    #[test]
    fn leaving_room_stops_future_broadcasts() {
        let mut t = LoopbackTransport::new();
        let a = PeerId(1);
        t.join_room(a, "replicant:x");
        t.leave_all_rooms(a);
        let msg = WireMessage::Operations(crate::wire::OperationsBroadcast {
            name: "r".into(),
            namespace: "x".into(),
            revision: 1,
            operations: vec![],
        });
        t.broadcast_room("replicant:x", None, msg);
        assert!(t.poll(a).is_empty());
    }
}
