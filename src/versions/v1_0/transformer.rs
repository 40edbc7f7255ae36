//! Document transformation for protocol version 1.0: shaping the internal
//! resolution model into the externally returned resolution result.

use anyhow::Result;
use serde_json::Value;

use crate::document::{DocumentMetadata, MethodMetadata, ResolutionResult, KEY_ID};
use crate::docutil::NAMESPACE_DELIMITER;
use crate::protocol::{DocumentTransformer, ResolutionModel, TransformationInfo};

/// Document transformer for protocol version 1.0.
pub struct Transformer;

impl DocumentTransformer for Transformer {
    fn transform(
        &self,
        rm: &ResolutionModel,
        info: &TransformationInfo,
    ) -> Result<ResolutionResult> {
        match info {
            TransformationInfo::Published {
                namespace,
                did,
                suffix,
            } => {
                let mut doc = rm.doc.clone();
                doc.set(KEY_ID, Value::String(did.clone()));

                let canonical_id = format!("{namespace}{NAMESPACE_DELIMITER}{suffix}");
                let equivalent_id = if *did != canonical_id {
                    Some(vec![canonical_id.clone()])
                } else {
                    None
                };

                Ok(ResolutionResult {
                    context: None,
                    did_document: doc,
                    did_document_metadata: Some(DocumentMetadata {
                        canonical_id: Some(canonical_id),
                        equivalent_id,
                        deactivated: rm.deactivated.then_some(true),
                        method: MethodMetadata {
                            published: true,
                            recovery_commitment: rm.recovery_commitment.clone(),
                            update_commitment: rm.update_commitment.clone(),
                            anchor_origin: rm.anchor_origin.clone(),
                        },
                    }),
                })
            }
            TransformationInfo::Unpublished {
                namespace,
                domain,
                label,
                suffix,
                create_request_jcs,
            } => {
                let did = if label.is_empty() {
                    format!("{namespace}{NAMESPACE_DELIMITER}{suffix}")
                } else {
                    format!("{namespace}{NAMESPACE_DELIMITER}{label}{NAMESPACE_DELIMITER}{suffix}")
                };

                let mut doc = rm.doc.clone();
                doc.set(KEY_ID, Value::String(did.clone()));

                let mut equivalent_ids = Vec::new();
                if !create_request_jcs.is_empty() {
                    equivalent_ids.push(format!("{did}{NAMESPACE_DELIMITER}{create_request_jcs}"));
                }
                if !domain.is_empty() {
                    equivalent_ids.push(format!(
                        "{namespace}{NAMESPACE_DELIMITER}{domain}{NAMESPACE_DELIMITER}{suffix}"
                    ));
                }

                Ok(ResolutionResult {
                    context: None,
                    did_document: doc,
                    did_document_metadata: Some(DocumentMetadata {
                        canonical_id: None,
                        equivalent_id: (!equivalent_ids.is_empty()).then_some(equivalent_ids),
                        deactivated: None,
                        method: MethodMetadata {
                            published: false,
                            recovery_commitment: rm.recovery_commitment.clone(),
                            update_commitment: rm.update_commitment.clone(),
                            anchor_origin: rm.anchor_origin.clone(),
                        },
                    }),
                })
            }
        }
    }
}
