//! `Replicator`: the process-wide registry and broadcast hub — owns
//! declared replicants, a persistence store per namespace, and dispatches
//! the three `replicant:*` client RPCs over a [`Transport`].
//!
//! This is an explicit, constructible struct rather than a process-wide
//! singleton — the embedder owns one instance and passes it (or an
//! `Rc`/`Arc` around it) to whatever needs it.

use crate::replicant::{Snapshot, ServerReplicant};
use replicant_admin::RuntimeConfig;
use replicant_base::{kind_err, ErrorKind, Result};
use replicant_schema::Schema;
use replicant_store::{PersistenceStore, RedbStore};
use replicant_transport::{
    DeclareReply, OperationsBroadcast, PeerId, ProposeOperationsReply, ProposeOperationsRequest,
    ReplicantOpts, Transport, WireMessage,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Server-local declaration options. Unlike the wire `opts`, `schema_path`
/// here is honored — it is how a bundle's own server-side code establishes
/// a replicant's schema; the wire protocol always passes `schema_path:
/// None`, since the server ignores `schemaPath` across the wire.
#[derive(Clone, Debug, Default)]
pub struct DeclareOptions {
    pub default_value: Option<Value>,
    pub persistent: bool,
    pub persistence_interval: Option<Duration>,
    pub schema_path: Option<std::path::PathBuf>,
}

impl DeclareOptions {
    pub fn from_wire(opts: &ReplicantOpts) -> Self {
        DeclareOptions {
            default_value: opts.default_value.clone(),
            persistent: opts.persistent.unwrap_or(true),
            persistence_interval: opts.persistence_interval_ms.map(Duration::from_millis),
            schema_path: None,
        }
    }
}

pub enum DeclareOutcome {
    Declared(Snapshot),
    Rejected { reject_reason: String },
}

pub struct Replicator<S: PersistenceStore = RedbStore> {
    config: RuntimeConfig,
    declared: HashMap<String, HashMap<String, ServerReplicant>>,
    stores: HashMap<String, S>,
    open_store: Box<dyn Fn(&str) -> Result<S>>,
}

impl Replicator<RedbStore> {
    /// The production constructor: one `redb` file per namespace, rooted at
    /// `config.persistence_root`.
    pub fn new(config: RuntimeConfig) -> Self {
        let root = config.persistence_root.clone();
        Replicator::with_store_factory(config, move |ns| RedbStore::open(&root, ns))
    }
}

impl<S: PersistenceStore> Replicator<S> {
    pub fn with_store_factory(config: RuntimeConfig, factory: impl Fn(&str) -> Result<S> + 'static) -> Self {
        Replicator {
            config,
            declared: HashMap::new(),
            stores: HashMap::new(),
            open_store: Box::new(factory),
        }
    }

    fn store_for_namespace(&mut self, namespace: &str) -> Result<&S> {
        if !self.stores.contains_key(namespace) {
            let store = (self.open_store)(namespace)?;
            self.stores.insert(namespace.to_string(), store);
        }
        Ok(self.stores.get(namespace).expect("just inserted"))
    }

    fn room_for(namespace: &str) -> String {
        format!("replicant:{namespace}")
    }

    /// `declare`. Idempotent (P5): re-declaring an already-known
    /// `(namespace, name)` returns the existing handle's snapshot unchanged,
    /// ignoring the new call's options entirely.
    pub fn declare(&mut self, namespace: &str, name: &str, opts: DeclareOptions) -> Result<DeclareOutcome> {
        if let Some(existing) = self.declared.get(namespace).and_then(|m| m.get(name)) {
            return Ok(DeclareOutcome::Declared(existing.snapshot()));
        }

        let schema = match &opts.schema_path {
            Some(path) => match Schema::load(path) {
                Ok(schema) => Some(Arc::new(schema)),
                Err(e) => {
                    tracing::warn!(target: "replicant", %namespace, %name, error = %e, "schema load failed; replicant runs unvalidated");
                    None
                }
            },
            None => None,
        };

        let persistent = opts.persistent;
        let persisted = if persistent {
            self.store_for_namespace(namespace)?.get_item(&format!("{name}.rep"))?
        } else {
            None
        };

        let initial_value = match compute_initial_value(&schema, persisted, &opts.default_value) {
            Ok(v) => v,
            Err(reject_reason) => return Ok(DeclareOutcome::Rejected { reject_reason }),
        };

        let interval = opts.persistence_interval.unwrap_or(self.config.default_persistence_interval);
        let replicant = ServerReplicant::new(name, namespace, initial_value, schema, persistent, interval);
        let snapshot = replicant.snapshot();
        self.declared.entry(namespace.to_string()).or_default().insert(name.to_string(), replicant);
        Ok(DeclareOutcome::Declared(snapshot))
    }

    pub fn read(&self, namespace: &str, name: &str) -> Option<Value> {
        self.declared.get(namespace)?.get(name).map(|r| r.value().clone())
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&ServerReplicant> {
        self.declared.get(namespace)?.get(name)
    }

    pub fn get_mut(&mut self, namespace: &str, name: &str) -> Option<&mut ServerReplicant> {
        self.declared.get_mut(namespace)?.get_mut(name)
    }

    /// `proposeOperations`. Schema/revision mismatches are routine
    /// reconciliation signals, not errors — they are returned as a
    /// rejected reply, and the state is never touched (P8).
    pub fn propose_operations(
        &mut self,
        from: PeerId,
        req: &ProposeOperationsRequest,
        transport: &mut dyn Transport,
    ) -> Result<ProposeOperationsReply> {
        let namespace = req.namespace.clone();
        let name = req.name.clone();

        let Some(replicant) = self.declared.get(&namespace).and_then(|m| m.get(&name)) else {
            return Err(kind_err(ErrorKind::NotDeclared, format!("{namespace}/{name} not declared")));
        };

        if req.schema_sum.as_deref() != replicant.schema_sum() {
            return Ok(ProposeOperationsReply {
                value: replicant.value().clone(),
                revision: replicant.revision(),
                schema: replicant.schema_value().cloned(),
                schema_sum: replicant.schema_sum().map(String::from),
                reject_reason: Some("schema-mismatch".to_string()),
            });
        }
        if req.revision != replicant.revision() {
            return Ok(ProposeOperationsReply {
                value: replicant.value().clone(),
                revision: replicant.revision(),
                schema: None,
                schema_sum: None,
                reject_reason: Some("revision-mismatch".to_string()),
            });
        }

        let replicant = self.declared.get_mut(&namespace).and_then(|m| m.get_mut(&name)).expect("checked above");
        let outcome = match replicant.apply_accepted_proposal(req.operations.clone()) {
            Ok(outcome) => outcome,
            Err(e) if e.kind() == ErrorKind::ValueInvalid => {
                return Ok(ProposeOperationsReply {
                    value: replicant.value().clone(),
                    revision: replicant.revision(),
                    schema: None,
                    schema_sum: None,
                    reject_reason: Some("value-invalid".to_string()),
                });
            }
            Err(e) => return Err(e),
        };
        let schema_sum = replicant.schema_sum().map(String::from);
        let value = replicant.value().clone();

        transport.broadcast_room(
            &Self::room_for(&namespace),
            Some(from),
            WireMessage::Operations(OperationsBroadcast {
                name: name.clone(),
                namespace: namespace.clone(),
                revision: outcome.revision,
                operations: outcome.operations.clone(),
            }),
        );
        self.persist_if_due(&namespace, &name);

        Ok(ProposeOperationsReply {
            value,
            revision: outcome.revision,
            schema: None,
            schema_sum,
            reject_reason: None,
        })
    }

    /// Dispatches one inbound `WireMessage` RPC and returns its reply — the
    /// function a [`Transport`]'s registered server-side handler calls.
    pub fn handle_message(&mut self, from: PeerId, msg: WireMessage, transport: &mut dyn Transport) -> WireMessage {
        match msg {
            WireMessage::Declare(req) => {
                let opts = DeclareOptions::from_wire(&req.opts);
                match self.declare(&req.namespace, &req.name, opts) {
                    Ok(DeclareOutcome::Declared(snap)) => {
                        transport.join_room(from, &Self::room_for(&req.namespace));
                        WireMessage::DeclareReply(DeclareReply {
                            value: snap.value,
                            revision: snap.revision,
                            schema: snap.schema,
                            schema_sum: snap.schema_sum,
                            reject_reason: None,
                        })
                    }
                    Ok(DeclareOutcome::Rejected { reject_reason }) => WireMessage::DeclareReply(DeclareReply {
                        value: Value::Null,
                        revision: 0,
                        schema: None,
                        schema_sum: None,
                        reject_reason: Some(reject_reason),
                    }),
                    Err(e) => WireMessage::DeclareReply(DeclareReply {
                        value: Value::Null,
                        revision: 0,
                        schema: None,
                        schema_sum: None,
                        reject_reason: Some(e.to_string()),
                    }),
                }
            }
            WireMessage::ProposeOperations(req) => match self.propose_operations(from, &req, transport) {
                Ok(reply) => WireMessage::ProposeOperationsReply(reply),
                Err(e) if e.kind() == ErrorKind::NotDeclared => {
                    // On the server this is a protocol error; the offending
                    // socket is disconnected.
                    tracing::error!(target: "replicant", peer = ?from, "not-declared proposeOperations; disconnecting socket");
                    transport.leave_all_rooms(from);
                    WireMessage::ProposeOperationsReply(ProposeOperationsReply {
                        value: Value::Null,
                        revision: 0,
                        schema: None,
                        schema_sum: None,
                        reject_reason: Some("not-declared".to_string()),
                    })
                }
                Err(e) => WireMessage::ProposeOperationsReply(ProposeOperationsReply {
                    value: Value::Null,
                    revision: 0,
                    schema: None,
                    schema_sum: None,
                    reject_reason: Some(e.to_string()),
                }),
            },
            WireMessage::Read(req) => {
                let value = self.read(&req.namespace, &req.name).unwrap_or(Value::Null);
                WireMessage::ReadReply(value)
            }
            other => {
                tracing::error!(target: "replicant", event = other.event_name(), "unexpected message at server");
                WireMessage::ReadReply(Value::Null)
            }
        }
    }

    fn persist_if_due(&mut self, namespace: &str, name: &str) {
        self.persist(namespace, name, false);
    }

    fn persist(&mut self, namespace: &str, name: &str, force: bool) {
        let now = Instant::now();
        let Some(payload) = self.declared.get(namespace).and_then(|m| m.get(name)).and_then(|r| {
            if !r.persistent() || !(force || r.is_save_due(now)) {
                None
            } else if r.value().is_null() {
                Some(String::new())
            } else {
                Some(serde_json::to_string(r.value()).unwrap_or_default())
            }
        }) else {
            return;
        };

        let store = match self.store_for_namespace(namespace) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(target: "replicant", %namespace, %name, error = %e, "could not open persistence store");
                return;
            }
        };
        match store.set_item(&format!("{name}.rep"), &payload) {
            Ok(()) => {
                tracing::info!(target: "replicant", %namespace, %name, "persisted replicant");
                if let Some(r) = self.declared.get_mut(namespace).and_then(|m| m.get_mut(name)) {
                    r.mark_saved(now);
                }
            }
            Err(e) => {
                // Non-quota persistence failures are logged and abandoned
                // for this tick rather than retried.
                tracing::warn!(target: "replicant", %namespace, %name, error = %e, "persistence failed, abandoning for this tick");
            }
        }
    }

    /// Shutdown hook: an immediate, forced write for every declared
    /// persistent replicant, bypassing the throttle.
    pub fn save_all_replicants(&mut self) {
        let targets: Vec<(String, String)> = self
            .declared
            .iter()
            .flat_map(|(ns, m)| m.keys().map(move |n| (ns.clone(), n.clone())))
            .collect();
        for (namespace, name) in targets {
            self.persist(&namespace, &name, true);
        }
    }
}

/// Initial-value resolution on first declaration: prefer a persisted
/// value that still validates; otherwise fall back to the explicit
/// `defaultValue` (validated, rejecting declaration if it fails) or
/// schema-synthesized defaults. In the schema-upgrade case, the revision
/// restarts at 0 with the defaults, not the stale persisted value.
fn compute_initial_value(
    schema: &Option<Arc<Schema>>,
    persisted: Option<String>,
    default_value: &Option<Value>,
) -> std::result::Result<Value, String> {
    if let Some(raw) = persisted.filter(|s| !s.is_empty()) {
        if let Ok(v) = serde_json::from_str::<Value>(&raw) {
            match schema {
                Some(schema) if schema.validate(&v).is_err() => {
                    tracing::info!(target: "replicant", "persisted value failed schema validation; replacing with schema defaults");
                }
                _ => return Ok(v),
            }
        }
    }

    if let Some(dv) = default_value {
        if let Some(schema) = schema {
            if let Err(e) = schema.validate(dv) {
                return Err(e.to_string());
            }
        }
        return Ok(dv.clone());
    }

    if let Some(schema) = schema {
        return Ok(schema.default_value().clone());
    }

    Ok(Value::Null)
}
