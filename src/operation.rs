//! Operation kinds and the operation records exchanged between the handler,
//! the unpublished operation store and the batch writer.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::docutil::NAMESPACE_DELIMITER;

/// Document operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Create,
    Update,
    Recover,
    Deactivate,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Type::Create => "create",
            Type::Update => "update",
            Type::Recover => "recover",
            Type::Deactivate => "deactivate",
        };
        f.write_str(s)
    }
}

/// Named opaque value carried through submission untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: Value,
}

/// A parsed document operation prior to anchoring.
///
/// Immutable once decorated; the decorator may only set `anchor_origin`.
#[derive(Debug, Clone)]
pub struct Operation {
    pub r#type: Type,
    /// Identifier suffix derived from the request. For a create operation it
    /// is computed from the suffix data; for all others it is supplied in the
    /// request.
    pub unique_suffix: String,
    pub namespace: String,
    /// Original request payload, preserved verbatim for downstream replay.
    pub operation_request: Vec<u8>,
    /// Opaque provenance metadata threaded through update and deactivate.
    pub anchor_origin: Option<Value>,
    /// Opaque named values, passed through to the batch writer.
    pub properties: Vec<Property>,
}

impl Operation {
    /// Namespace-qualified operation id.
    pub fn id(&self) -> String {
        format!(
            "{}{}{}",
            self.namespace, NAMESPACE_DELIMITER, self.unique_suffix
        )
    }
}

/// The record staged in the unpublished operation store for an operation that
/// has passed parsing, validation and decoration but is not yet anchored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchoredOperation {
    pub r#type: Type,
    pub unique_suffix: String,
    pub operation_request: Vec<u8>,
    /// Wall clock at submission, seconds.
    pub transaction_time: u64,
    /// Genesis time of the protocol version used to parse the request.
    pub protocol_version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_origin: Option<Value>,
}

/// Minimum operation info handed to the batch writer.
#[derive(Debug, Clone)]
pub struct QueuedOperation {
    pub r#type: Type,
    pub namespace: String,
    pub unique_suffix: String,
    pub operation_request: Vec<u8>,
    pub anchor_origin: Option<Value>,
    pub properties: Vec<Property>,
}
