//! Document composition for protocol version 1.0: patch application.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::document::{Document, KEY_PUBLIC_KEYS, KEY_SERVICES};
use crate::protocol::DocumentComposer;

use super::model::DidStatePatch;

/// Document composer for protocol version 1.0.
pub struct Composer;

impl DocumentComposer for Composer {
    fn apply_patches(&self, doc: &Document, patches: &[Value]) -> Result<Document> {
        let mut doc = doc.clone();

        for patch in patches {
            let patch: DidStatePatch =
                serde_json::from_value(patch.clone()).context("parse document state patch")?;

            doc = apply_patch(doc, &patch)?;
        }

        Ok(doc)
    }
}

fn apply_patch(doc: Document, patch: &DidStatePatch) -> Result<Document> {
    match patch {
        DidStatePatch::Replace { document } => {
            let mut new_doc = Document::new();

            if let Some(public_keys) = &document.public_keys {
                new_doc.set(
                    KEY_PUBLIC_KEYS,
                    serde_json::to_value(public_keys).context("serialize public keys")?,
                );
            }

            if let Some(services) = &document.services {
                new_doc.set(
                    KEY_SERVICES,
                    serde_json::to_value(services).context("serialize services")?,
                );
            }

            Ok(new_doc)
        }
        DidStatePatch::AddPublicKeys { public_keys } => {
            let entries = public_keys
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()
                .context("serialize public keys")?;

            add_entries(doc, KEY_PUBLIC_KEYS, entries)
        }
        DidStatePatch::RemovePublicKeys { ids } => remove_entries(doc, KEY_PUBLIC_KEYS, ids),
        DidStatePatch::AddServices { services } => {
            let entries = services
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()
                .context("serialize services")?;

            add_entries(doc, KEY_SERVICES, entries)
        }
        DidStatePatch::RemoveServices { ids } => remove_entries(doc, KEY_SERVICES, ids),
        DidStatePatch::IetfJsonPatch { patches } => {
            let mut value = doc.to_value();
            json_patch::patch(&mut value, patches).context("apply ietf-json-patch")?;

            serde_json::from_value(value).context("document after ietf-json-patch")
        }
    }
}

/// Add entries to the named collection, overwriting entries with the same id.
fn add_entries(mut doc: Document, key: &str, new_entries: Vec<Value>) -> Result<Document> {
    let mut entries = doc
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for new_entry in new_entries {
        entries.retain(|e| e.get("id") != new_entry.get("id"));
        entries.push(new_entry);
    }

    doc.set(key, Value::Array(entries));

    Ok(doc)
}

fn remove_entries(mut doc: Document, key: &str, ids: &[String]) -> Result<Document> {
    let mut entries = doc
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    entries.retain(|e| {
        e.get("id")
            .and_then(Value::as_str)
            .map(|id| !ids.iter().any(|removed| removed == id))
            .unwrap_or(true)
    });

    doc.set(key, Value::Array(entries));

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compose(doc: Document, patches: Vec<Value>) -> Document {
        Composer.apply_patches(&doc, &patches).unwrap()
    }

    fn key_entry(id: &str) -> Value {
        json!({
            "id": id,
            "type": "JsonWebSignature2020",
            "publicKeyJwk": {"kty": "EC", "crv": "P-256", "x": "x", "y": "y"},
            "purposes": ["authentication"]
        })
    }

    #[test]
    fn test_replace_resets_document() {
        let doc = compose(
            Document::new(),
            vec![json!({
                "action": "replace",
                "document": {
                    "publicKeys": [key_entry("key1")],
                    "services": [{"id": "svc1", "type": "t", "serviceEndpoint": "http://x"}]
                }
            })],
        );

        assert_eq!(doc.public_keys().unwrap().len(), 1);
        assert_eq!(doc.services().unwrap().len(), 1);

        let doc = compose(
            doc,
            vec![json!({"action": "replace", "document": {"publicKeys": [key_entry("key2")]}})],
        );

        assert_eq!(doc.public_keys().unwrap().len(), 1);
        assert_eq!(doc.public_keys().unwrap()[0]["id"], "key2");
        assert!(doc.services().is_none());
    }

    #[test]
    fn test_add_public_keys_upserts_by_id() {
        let doc = compose(
            Document::new(),
            vec![
                json!({"action": "add-public-keys", "publicKeys": [key_entry("key1")]}),
                json!({"action": "add-public-keys", "publicKeys": [key_entry("key1"), key_entry("key2")]}),
            ],
        );

        assert_eq!(doc.public_keys().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_public_keys() {
        let doc = compose(
            Document::new(),
            vec![
                json!({"action": "add-public-keys", "publicKeys": [key_entry("key1"), key_entry("key2")]}),
                json!({"action": "remove-public-keys", "ids": ["key1"]}),
            ],
        );

        let keys = doc.public_keys().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0]["id"], "key2");
    }

    #[test]
    fn test_add_and_remove_services() {
        let doc = compose(
            Document::new(),
            vec![
                json!({"action": "add-services", "services": [
                    {"id": "svc1", "type": "t", "serviceEndpoint": "http://one"},
                    {"id": "svc2", "type": "t", "serviceEndpoint": {"uri": "http://two"}}
                ]}),
                json!({"action": "remove-services", "ids": ["svc2"]}),
            ],
        );

        let services = doc.services().unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0]["id"], "svc1");
    }

    #[test]
    fn test_ietf_json_patch() {
        let mut doc = Document::new();
        doc.set("name", json!("old"));

        let doc = compose(
            doc,
            vec![json!({
                "action": "ietf-json-patch",
                "patches": [{"op": "replace", "path": "/name", "value": "value"}]
            })],
        );

        assert_eq!(doc.get_string_value("name"), Some("value"));
    }

    #[test]
    fn test_unknown_action_fails() {
        let result = Composer.apply_patches(
            &Document::new(),
            &[json!({"action": "transmute", "document": {}})],
        );

        assert!(result.is_err());
    }
}
