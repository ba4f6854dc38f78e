//! The client-side mirror state machine: `undeclared → declared`,
//! optimistic local apply, and revision/schema-mismatch reconciliation.

use replicant_base::{kind_err, Error, ErrorKind, Result};
use replicant_observe::MutationSink;
use replicant_transport::{
    DeclareRequest, OperationsBroadcast, PeerId, ReadRequest, ReplicantOpts,
    ProposeOperationsRequest, Transport, WireMessage,
};
use replicant_value::{apply, Operation};
use serde_json::Value;

/// What a local subscriber learns about one applied change — local mutation,
/// inbound broadcast, or reconciliation. A typed-callback substitute for
/// an event emitter.
#[derive(Clone, Debug)]
pub struct ClientChangeEvent {
    pub new_value: Value,
    pub old_value: Value,
    pub operations: Vec<Operation>,
    pub revision: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClientState {
    Undeclared,
    Declared,
}

/// The client-side mirror of one `(namespace, name)` replicant.
pub struct ClientReplicant {
    name: String,
    namespace: String,
    peer: PeerId,
    server: PeerId,
    sink: MutationSink,
    revision: u64,
    schema: Option<Value>,
    schema_sum: Option<String>,
    state: ClientState,
    on_change: Vec<Box<dyn FnMut(&ClientChangeEvent)>>,
}

impl ClientReplicant {
    /// Creates an undeclared replicant holding `default_value` as its
    /// provisional value: while undeclared, user reads see this
    /// provisional default.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, peer: PeerId, default_value: Value) -> Self {
        ClientReplicant {
            name: name.into(),
            namespace: namespace.into(),
            peer,
            server: peer,
            sink: MutationSink::new(default_value),
            revision: 0,
            schema: None,
            schema_sum: None,
            state: ClientState::Undeclared,
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

    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    pub fn is_declared(&self) -> bool {
        self.state == ClientState::Declared
    }

    /// Registers a change handler. Fires immediately with the current
    /// value, then on every subsequent applied change.
    pub fn on_change(&mut self, mut cb: Box<dyn FnMut(&ClientChangeEvent)>) {
        let immediate = ClientChangeEvent {
            new_value: self.value().clone(),
            old_value: self.value().clone(),
            operations: Vec::new(),
            revision: self.revision,
        };
        cb(&immediate);
        self.on_change.push(cb);
    }

    fn fire_change(&mut self, old_value: Value, operations: Vec<Operation>) {
        let event = ClientChangeEvent { new_value: self.value().clone(), old_value, operations, revision: self.revision };
        tracing::info!(
            target: "replicant",
            name = %self.name,
            namespace = %self.namespace,
            revision = self.revision,
            "client replicant change"
        );
        for cb in &mut self.on_change {
            cb(&event);
        }
    }

    /// Sends the `replicant:declare` handshake. On success, installs the
    /// authoritative value/schema, transitions to `declared`, then replays
    /// any operations buffered while undeclared as a fresh proposal built
    /// against the authoritative base.
    pub fn declare(&mut self, transport: &mut dyn Transport, server: PeerId, opts: ReplicantOpts) -> Result<()> {
        self.server = server;
        let request = WireMessage::Declare(DeclareRequest { name: self.name.clone(), namespace: self.namespace.clone(), opts });
        let reply = match transport.request(self.peer, server, request)? {
            WireMessage::DeclareReply(r) => r,
            other => return Err(unexpected_reply(&other)),
        };
        if let Some(reason) = reply.reject_reason {
            return Err(kind_err(ErrorKind::Other, format!("declare rejected: {reason}")));
        }

        let buffered = self.sink.take_queue();
        let old_value = self.value().clone();
        self.sink.replace_value_suspended(reply.value);
        self.revision = reply.revision;
        self.schema = reply.schema;
        self.schema_sum = reply.schema_sum;
        self.state = ClientState::Declared;
        self.fire_change(old_value, Vec::new());

        if !buffered.is_empty() {
            let old_value = self.value().clone();
            for op in &buffered {
                apply(self.sink.value_mut(), op)?;
            }
            self.send_proposal(transport, old_value, buffered)?;
        }
        Ok(())
    }

    /// Runs one local batch of mutations and, if declared, proposes it to
    /// the server immediately — an explicit substitute for an implicit
    /// end-of-tick flush, with a closure scope modeling one task. While
    /// undeclared, mutations stay queued on the sink and are replayed by
    /// [`ClientReplicant::declare`].
    pub fn mutate<F>(&mut self, transport: &mut dyn Transport, f: F) -> Result<()>
    where
        F: FnOnce(&mut MutationSink) -> Result<()>,
    {
        let old_value = self.value().clone();
        f(&mut self.sink)?;
        if !self.is_declared() || self.sink.queue_is_empty() {
            return Ok(());
        }
        let ops = self.sink.take_queue();
        self.send_proposal(transport, old_value, ops)
    }

    fn send_proposal(&mut self, transport: &mut dyn Transport, old_value: Value, operations: Vec<Operation>) -> Result<()> {
        let request = WireMessage::ProposeOperations(ProposeOperationsRequest {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            operations: operations.clone(),
            opts: ReplicantOpts::default(),
            revision: self.revision,
            schema_sum: self.schema_sum.clone(),
        });
        let reply = match transport.request(self.peer, self.server, request)? {
            WireMessage::ProposeOperationsReply(r) => r,
            other => return Err(unexpected_reply(&other)),
        };

        if reply.is_rejected() {
            // Suspend, install the authoritative snapshot, discard the
            // in-flight operations, emit change; same for schema-mismatch,
            // plus the new schema. The rejected snapshot replaces whatever
            // the optimistic local mutation produced, so `old_value` here
            // is the pre-mutation value passed in by the caller, not a
            // fresh snapshot of (already-mutated) current state.
            self.sink.replace_value_suspended(reply.value);
            self.revision = reply.revision;
            if let Some(schema) = reply.schema {
                self.schema = Some(schema);
            }
            if let Some(sum) = reply.schema_sum {
                self.schema_sum = Some(sum);
            }
            self.fire_change(old_value, Vec::new());
        } else {
            self.revision = reply.revision;
            self.fire_change(old_value, operations);
        }
        Ok(())
    }

    /// Handles an inbound `replicant:operations` broadcast. Ignores
    /// batches for a different `(namespace, name)`; applies a
    /// directly-next batch and bumps the revision; triggers a full
    /// `replicant:read` reconcile on a gap; discards a stale (≤ current)
    /// batch.
    pub fn on_operations_broadcast(&mut self, transport: &mut dyn Transport, broadcast: OperationsBroadcast) -> Result<()> {
        if broadcast.namespace != self.namespace || broadcast.name != self.name {
            return Ok(());
        }
        if broadcast.revision == self.revision + 1 {
            let old_value = self.value().clone();
            for op in &broadcast.operations {
                self.sink.apply_remote(op)?;
            }
            self.revision = broadcast.revision;
            self.fire_change(old_value, broadcast.operations);
        } else if broadcast.revision > self.revision + 1 {
            self.reconcile(transport, broadcast.revision)?;
        }
        Ok(())
    }

    /// Full reconcile after detecting a revision gap: `replicant:read`
    /// returns only the current value, not a revision, so the triggering
    /// broadcast's own revision is taken as authoritative — sound under a
    /// single-threaded cooperative model, since no further write can
    /// interleave between that broadcast and this read.
    fn reconcile(&mut self, transport: &mut dyn Transport, authoritative_revision: u64) -> Result<()> {
        let request = WireMessage::Read(ReadRequest { name: self.name.clone(), namespace: self.namespace.clone() });
        let value = match transport.request(self.peer, self.server, request)? {
            WireMessage::ReadReply(v) => v,
            other => return Err(unexpected_reply(&other)),
        };
        let old_value = self.value().clone();
        self.sink.replace_value_suspended(value);
        self.revision = authoritative_revision;
        self.fire_change(old_value, Vec::new());
        Ok(())
    }
}

fn unexpected_reply(msg: &WireMessage) -> Error {
    kind_err(ErrorKind::Other, format!("unexpected reply event: {}", msg.event_name()))
}
