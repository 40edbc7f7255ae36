//! Identifier and create-result utilities shared by the document handler.

use anyhow::{ensure, Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::document::Document;
use crate::hashing;
use crate::operation::{Operation, Type};
use crate::protocol::{ResolutionModel, TransformationInfo, Version};

/// Namespace delimiter within identifiers.
pub const NAMESPACE_DELIMITER: char = ':';

/// Suffix data property carrying the recovery commitment.
const KEY_RECOVERY_COMMITMENT: &str = "recoveryCommitment";

/// Calculate a namespace-qualified id from suffix data.
pub fn calculate_id<T: Serialize + ?Sized>(
    namespace: &str,
    suffix_data: &T,
    code: u64,
) -> Result<String> {
    let unique_suffix = hashing::calculate_model_multihash(suffix_data, code)?;
    Ok(format!("{namespace}{NAMESPACE_DELIMITER}{unique_suffix}"))
}

/// Compute the interim resolution model for a create operation that has not
/// been anchored: the create delta's patches applied to an empty document.
pub fn get_create_result(op: &Operation, pv: &dyn Version) -> Result<ResolutionModel> {
    ensure!(
        op.r#type == Type::Create,
        "operation type [{}] not supported for create result",
        op.r#type
    );

    let create = pv
        .operation_parser()
        .parse_create_request(&op.operation_request)
        .context("parse create request")?;

    let doc = pv
        .document_composer()
        .apply_patches(&Document::new(), &create.delta.patches)
        .context("apply create patches")?;

    let recovery_commitment = create
        .suffix_data
        .get(KEY_RECOVERY_COMMITMENT)
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ResolutionModel {
        doc,
        recovery_commitment,
        update_commitment: Some(create.delta.update_commitment),
        deactivated: false,
        anchor_origin: op.anchor_origin.clone(),
        published_operations: vec![],
        unpublished_operations: vec![],
    })
}

/// Transformation info for a document with no published operations.
pub fn transformation_info_for_unpublished(
    namespace: &str,
    domain: &str,
    label: &str,
    suffix: &str,
    create_request_jcs: &str,
) -> TransformationInfo {
    TransformationInfo::Unpublished {
        namespace: namespace.to_string(),
        domain: domain.to_string(),
        label: label.to_string(),
        suffix: suffix.to_string(),
        create_request_jcs: create_request_jcs.to_string(),
    }
}

/// Transformation info for a document with anchored history.
pub fn transformation_info_for_published(
    namespace: &str,
    did: &str,
    suffix: &str,
) -> TransformationInfo {
    TransformationInfo::Published {
        namespace: namespace.to_string(),
        did: did.to_string(),
        suffix: suffix.to_string(),
    }
}
