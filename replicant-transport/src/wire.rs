//! The `replicant:*` wire protocol.
//!
//! Envelopes travel msgpack-framed (`rmp`/`rmp-serde`), matching a
//! Socket.IO-shaped wire — Socket.IO's own binary protocol is msgpack. The
//! *persisted* value tree, by contrast, is plain JSON, so
//! `replicant-store`/`replicant-schema` use `serde_json` independently of
//! this choice.

use replicant_value::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `opts` accompanying a `declare` or `proposeOperations` call.
/// The server ignores `schemaPath` across the wire — schemas are server-owned.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ReplicantOpts {
    #[serde(rename = "defaultValue", default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
    #[serde(rename = "persistenceInterval", default, skip_serializing_if = "Option::is_none")]
    pub persistence_interval_ms: Option<u64>,
    #[serde(rename = "schemaPath", default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeclareRequest {
    pub name: String,
    pub namespace: String,
    pub opts: ReplicantOpts,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeclareReply {
    pub value: Value,
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(rename = "schemaSum", default, skip_serializing_if = "Option::is_none")]
    pub schema_sum: Option<String>,
    #[serde(rename = "rejectReason", default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProposeOperationsRequest {
    pub name: String,
    pub namespace: String,
    pub operations: Vec<Operation>,
    pub opts: ReplicantOpts,
    pub revision: u64,
    #[serde(rename = "schemaSum", default, skip_serializing_if = "Option::is_none")]
    pub schema_sum: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProposeOperationsReply {
    pub value: Value,
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(rename = "schemaSum", default, skip_serializing_if = "Option::is_none")]
    pub schema_sum: Option<String>,
    #[serde(rename = "rejectReason", default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

impl ProposeOperationsReply {
    pub fn is_rejected(&self) -> bool {
        self.reject_reason.is_some()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadRequest {
    pub name: String,
    pub namespace: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OperationsBroadcast {
    pub name: String,
    pub namespace: String,
    pub revision: u64,
    pub operations: Vec<Operation>,
}

/// The full set of messages exchanged over the wire: three client RPCs and
/// one server-to-room broadcast.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload")]
pub enum WireMessage {
    #[serde(rename = "replicant:declare")]
    Declare(DeclareRequest),
    #[serde(rename = "replicant:declare#reply")]
    DeclareReply(DeclareReply),
    #[serde(rename = "replicant:proposeOperations")]
    ProposeOperations(ProposeOperationsRequest),
    #[serde(rename = "replicant:proposeOperations#reply")]
    ProposeOperationsReply(ProposeOperationsReply),
    #[serde(rename = "replicant:read")]
    Read(ReadRequest),
    #[serde(rename = "replicant:read#reply")]
    ReadReply(Value),
    #[serde(rename = "replicant:operations")]
    Operations(OperationsBroadcast),
}

impl WireMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            WireMessage::Declare(_) => "replicant:declare",
            WireMessage::DeclareReply(_) => "replicant:declare#reply",
            WireMessage::ProposeOperations(_) => "replicant:proposeOperations",
            WireMessage::ProposeOperationsReply(_) => "replicant:proposeOperations#reply",
            WireMessage::Read(_) => "replicant:read",
            WireMessage::ReadReply(_) => "replicant:read#reply",
            WireMessage::Operations(_) => "replicant:operations",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use replicant_value::Path;
    use serde_json::json;

    #[test]
    fn msgpack_round_trips_declare_request() {
        let msg = WireMessage::Declare(DeclareRequest {
            name: "r".into(),
            namespace: "x".into(),
            opts: ReplicantOpts { default_value: Some(json!({"a": 1})), ..Default::default() },
        });
        let bytes = rmp_serde::to_vec(&msg).unwrap();
        let back: WireMessage = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn operations_broadcast_round_trips_with_operation_payload() {
        use replicant_value::OpKind;
        let msg = WireMessage::Operations(OperationsBroadcast {
            name: "r".into(),
            namespace: "x".into(),
            revision: 1,
            operations: vec![Operation::new(
                Path::root().child("a"),
                OpKind::Add { prop: "c".into(), new_value: json!(2) },
            )],
        });
        let bytes = rmp_serde::to_vec(&msg).unwrap();
        let back: WireMessage = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, msg);
    }
}
