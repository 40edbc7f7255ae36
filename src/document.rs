//! Schema-opaque document and the externally shaped resolution result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::operation::AnchoredOperation;

/// `id` property of a document.
pub const KEY_ID: &str = "id";
/// `publicKeys` property of a document.
pub const KEY_PUBLIC_KEYS: &str = "publicKeys";
/// `services` property of a document.
pub const KEY_SERVICES: &str = "services";

/// A document: a JSON object whose schema is owned by the protocol version.
///
/// The core never interprets document contents beyond the few well-known
/// properties exposed here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from JSON bytes. The payload must be a JSON object.
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn id(&self) -> Option<&str> {
        self.get_string_value(KEY_ID)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_string_value(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn public_keys(&self) -> Option<&Vec<Value>> {
        self.0.get(KEY_PUBLIC_KEYS).and_then(Value::as_array)
    }

    pub fn services(&self) -> Option<&Vec<Value>> {
        self.0.get(KEY_SERVICES).and_then(Value::as_array)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolution result returned to the caller: the externally transformed
/// document plus protocol-defined metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub did_document: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document_metadata: Option<DocumentMetadata>,
}

/// Document metadata of a resolution result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equivalent_id: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,
    pub method: MethodMetadata,
}

/// Method-specific portion of the document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMetadata {
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_commitment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_commitment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_origin: Option<Value>,
}

/// Opaque resolution option forwarded to the operation processor.
#[derive(Debug, Clone)]
pub enum ResolutionOption {
    /// Resolve the document as of a specific version id.
    VersionId(String),
    /// Resolve the document as of a specific version time.
    VersionTime(String),
    /// Additional (not yet stored) operations for the processor to consider.
    AdditionalOperations(Vec<AnchoredOperation>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_accessors() {
        let doc = Document::from_bytes(
            json!({
                "id": "did:example:123",
                "publicKeys": [{"id": "key1"}],
                "services": []
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap();

        assert_eq!(doc.id(), Some("did:example:123"));
        assert_eq!(doc.public_keys().unwrap().len(), 1);
        assert!(doc.services().unwrap().is_empty());
        assert!(doc.get_string_value("missing").is_none());
    }

    #[test]
    fn test_document_must_be_object() {
        assert!(Document::from_bytes(b"[1,2,3]").is_err());
        assert!(Document::from_bytes(b"not json").is_err());
    }

    #[test]
    fn test_resolution_result_serialization() {
        let mut doc = Document::new();
        doc.set(KEY_ID, json!("did:example:abc"));

        let result = ResolutionResult {
            context: None,
            did_document: doc,
            did_document_metadata: Some(DocumentMetadata {
                canonical_id: Some("did:example:abc".to_string()),
                equivalent_id: None,
                deactivated: None,
                method: MethodMetadata {
                    published: true,
                    ..Default::default()
                },
            }),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["didDocument"]["id"], "did:example:abc");
        assert_eq!(value["didDocumentMetadata"]["canonicalId"], "did:example:abc");
        assert_eq!(value["didDocumentMetadata"]["method"]["published"], true);
        assert!(value.get("@context").is_none());
    }
}
