//! Document operation processing and document resolution.
//!
//! During operation processing the handler uses the selected protocol
//! version's validator to validate the operation, cross-checks it against the
//! current resolution state, stages it in the unpublished operation store and
//! calls the batch writer to add it to the batch.
//!
//! Document resolution is based on an identifier or on its encoded original
//! create request (long form). If an identifier cannot be resolved and
//! initial state was supplied, the supplied state is subject to the same
//! validation as an original document in a create operation and is used
//! directly to generate the resolved document.

mod decorator;
mod store;

pub use decorator::{DefaultOperationDecorator, OperationDecorator};
pub use store::{
    MemoryUnpublishedOperationStore, NoopUnpublishedOperationStore, UnpublishedOperationStore,
};

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail};
use tracing::{debug, error, warn};

use crate::canonicalizer;
use crate::document::{ResolutionOption, ResolutionResult};
use crate::docutil::{self, NAMESPACE_DELIMITER};
use crate::error::{Error, ResolveError};
use crate::metrics::MetricsProvider;
use crate::operation::{AnchoredOperation, Operation, QueuedOperation, Type};
use crate::protocol::{self, ResolutionModel, Version};

/// Resolves a unique suffix to its current internal state by replaying its
/// operations.
pub trait OperationProcessor: Send + Sync {
    fn resolve(
        &self,
        unique_suffix: &str,
        opts: &[ResolutionOption],
    ) -> Result<ResolutionModel, ResolveError>;
}

/// Sink into which validated operations are enqueued for anchoring. The
/// writer owns batching policy; repeated adds for one suffix are legal.
pub trait BatchWriter: Send + Sync {
    fn add(&self, op: QueuedOperation, protocol_genesis_time: u64) -> anyhow::Result<()>;
}

/// Document handler: accepts document operations and resolves identifiers.
///
/// The handler holds no mutable state after construction and is safe for
/// concurrent invocation; all mutable state lives behind the processor, the
/// unpublished operation store and the batch writer.
pub struct DocumentHandler {
    protocol: Arc<dyn protocol::Client>,
    processor: Arc<dyn OperationProcessor>,
    decorator: Arc<dyn OperationDecorator>,
    writer: Arc<dyn BatchWriter>,
    namespace: String,
    aliases: Vec<String>,
    domain: String,
    label: String,

    unpublished_operation_store: Arc<dyn UnpublishedOperationStore>,
    unpublished_operation_types: Vec<Type>,

    metrics: Arc<dyn MetricsProvider>,
}

impl DocumentHandler {
    /// Create a document handler for the given namespace (required,
    /// non-empty). The default decorator checks operations against the
    /// processor's resolution state; the default unpublished operation store
    /// is a no-op.
    pub fn new(
        namespace: impl Into<String>,
        aliases: Vec<String>,
        protocol: Arc<dyn protocol::Client>,
        writer: Arc<dyn BatchWriter>,
        processor: Arc<dyn OperationProcessor>,
        metrics: Arc<dyn MetricsProvider>,
    ) -> Self {
        let decorator = Arc::new(DefaultOperationDecorator::new(processor.clone()));

        Self {
            protocol,
            processor,
            decorator,
            writer,
            namespace: namespace.into(),
            aliases,
            domain: String::new(),
            label: String::new(),
            unpublished_operation_store: Arc::new(NoopUnpublishedOperationStore),
            unpublished_operation_types: Vec::new(),
            metrics,
        }
    }

    /// Set the optional domain hint for unpublished/interim documents.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the optional label for unpublished/interim documents.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Stage operations of the listed types into the given unpublished
    /// operation store. Types outside the list are never staged.
    pub fn with_unpublished_operation_store(
        mut self,
        store: Arc<dyn UnpublishedOperationStore>,
        operation_types: Vec<Type>,
    ) -> Self {
        self.unpublished_operation_store = store;
        self.unpublished_operation_types = operation_types;
        self
    }

    /// Replace the operation decorator (additional business validation and
    /// pre-processing).
    pub fn with_operation_decorator(mut self, decorator: Arc<dyn OperationDecorator>) -> Self {
        self.decorator = decorator;
        self
    }

    /// Namespace of the document handler.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Validate an operation and add it to the batch.
    ///
    /// For a create operation the interim document is returned; for all other
    /// operation types acceptance is the only signal.
    pub fn process_operation(
        &self,
        operation_request: &[u8],
        protocol_version: u64,
    ) -> Result<Option<ResolutionResult>, Error> {
        let start_time = Instant::now();
        let result = self.do_process_operation(operation_request, protocol_version);
        self.metrics.process_operation(start_time.elapsed());

        result
    }

    fn do_process_operation(
        &self,
        operation_request: &[u8],
        protocol_version: u64,
    ) -> Result<Option<ResolutionResult>, Error> {
        let get_protocol_version_time = Instant::now();
        let pv = self.protocol.get(protocol_version)?;
        self.metrics
            .get_protocol_version_time(get_protocol_version_time.elapsed());

        let parse_operation_start_time = Instant::now();
        let op = pv
            .operation_parser()
            .parse(&self.namespace, operation_request)
            .map_err(Error::bad_request)?;
        self.metrics
            .parse_operation_time(parse_operation_start_time.elapsed());

        let validate_operation_start_time = Instant::now();
        self.validate_operation(&op, pv.as_ref())
            .map_err(Error::bad_request)?;
        self.metrics
            .validate_operation_time(validate_operation_start_time.elapsed());

        let decorate_operation_start_time = Instant::now();
        let op = self
            .decorator
            .decorate(op)
            .map_err(|e| Error::BadRequest(e.to_string()))?;
        self.metrics
            .decorate_operation_time(decorate_operation_start_time.elapsed());

        let unpublished_op = self.get_unpublished_operation(&op, pv.as_ref());

        let add_unpublished_operation_start_time = Instant::now();
        self.add_operation_to_unpublished_store(unpublished_op.as_ref())
            .map_err(|e| Error::UnpublishedStore {
                suffix: op.unique_suffix.clone(),
                source: e,
            })?;
        self.metrics
            .add_unpublished_operation_time(add_unpublished_operation_start_time.elapsed());

        let add_to_batch_start_time = Instant::now();
        if let Err(e) = self.add_to_batch(&op, pv.protocol().genesis_time) {
            error!(error = %e, "Failed to add operation to batch");

            self.delete_operation_from_unpublished_store(unpublished_op.as_ref());

            return Err(Error::Dependency(e));
        }
        self.metrics
            .add_operation_to_batch_time(add_to_batch_start_time.elapsed());

        debug!(id = %op.id(), "Operation added to the batch");

        // create operation will also return the interim document
        if op.r#type == Type::Create {
            return self.get_create_response(&op, pv.as_ref()).map(Some);
        }

        Ok(None)
    }

    fn get_unpublished_operation(
        &self,
        op: &Operation,
        pv: &dyn Version,
    ) -> Option<AnchoredOperation> {
        if !self.unpublished_operation_types.contains(&op.r#type) {
            return None;
        }

        Some(AnchoredOperation {
            r#type: op.r#type,
            unique_suffix: op.unique_suffix.clone(),
            operation_request: op.operation_request.clone(),
            transaction_time: unix_time_seconds(),
            protocol_version: pv.protocol().genesis_time,
            anchor_origin: op.anchor_origin.clone(),
        })
    }

    fn add_operation_to_unpublished_store(
        &self,
        unpublished_op: Option<&AnchoredOperation>,
    ) -> anyhow::Result<()> {
        match unpublished_op {
            None => Ok(()),
            Some(op) => self.unpublished_operation_store.put(op),
        }
    }

    fn delete_operation_from_unpublished_store(
        &self,
        unpublished_op: Option<&AnchoredOperation>,
    ) {
        let Some(op) = unpublished_op else {
            return;
        };

        if let Err(e) = self.unpublished_operation_store.delete(op) {
            warn!(error = %e, suffix = %op.unique_suffix, "Failed to delete operation from unpublished store");
        }
    }

    fn get_create_response(
        &self,
        op: &Operation,
        pv: &dyn Version,
    ) -> Result<ResolutionResult, Error> {
        let start_time = Instant::now();
        let result = self.create_response(op, pv);
        self.metrics
            .get_create_operation_result_time(start_time.elapsed());

        result
    }

    fn create_response(&self, op: &Operation, pv: &dyn Version) -> Result<ResolutionResult, Error> {
        let rm = docutil::get_create_result(op, pv)?;

        let ti = docutil::transformation_info_for_unpublished(
            &self.namespace,
            &self.domain,
            &self.label,
            &op.unique_suffix,
            "",
        );

        pv.document_transformer()
            .transform(&rm, &ti)
            .map_err(Error::Dependency)
    }

    fn validate_operation(&self, op: &Operation, pv: &dyn Version) -> anyhow::Result<()> {
        if op.r#type == Type::Create {
            return self.validate_create_document(op, pv);
        }

        pv.document_validator().is_valid_payload(&op.operation_request)
    }

    fn validate_create_document(&self, op: &Operation, pv: &dyn Version) -> anyhow::Result<()> {
        let rm = docutil::get_create_result(op, pv)?;
        let doc_bytes = canonicalizer::marshal_canonical(&rm.doc)?;

        pv.document_validator().is_valid_original_document(&doc_bytes)
    }

    /// Fetch the latest document for an identifier.
    ///
    /// Standard resolution is performed if the identifier is found to be
    /// registered on the anchoring system. If the document cannot be found
    /// and the identifier carries initial state (long form), the embedded
    /// suffix data and delta are used to generate and return the resolved
    /// document; in that case the supplied state is subject to the same
    /// validation as an original document in a create operation.
    pub fn resolve_document(
        &self,
        short_or_long_form_did: &str,
        opts: &[ResolutionOption],
    ) -> Result<ResolutionResult, Error> {
        let ns = self
            .get_namespace(short_or_long_form_did)
            .map_err(Error::bad_request)?;

        let pv = self.protocol.current()?;

        // extract did and optional initial document value
        let (short_form_did, create_request) = pv
            .operation_parser()
            .parse_did(&ns, short_or_long_form_did)
            .map_err(Error::bad_request)?;

        let unique_portion = get_suffix(&ns, &short_form_did).map_err(Error::bad_request)?;

        let result =
            self.resolve_request_with_id(&ns, &short_form_did, &unique_portion, pv.as_ref(), opts);

        match result {
            // if the document was not found on the anchoring system and
            // initial state has been provided, resolve using the initial state
            Err(Error::Resolution(e)) if e.is_not_found() => {
                if let Some(initial_state) = create_request {
                    return self.resolve_request_with_initial_state(
                        &unique_portion,
                        short_or_long_form_did,
                        &initial_state,
                        pv.as_ref(),
                    );
                }

                Err(Error::Resolution(e))
            }
            other => other,
        }
    }

    fn get_namespace(&self, short_or_long_form_did: &str) -> anyhow::Result<String> {
        // check aliases first (if configured)
        for ns in &self.aliases {
            if short_or_long_form_did.starts_with(&format!("{ns}{NAMESPACE_DELIMITER}")) {
                return Ok(ns.clone());
            }
        }

        if short_or_long_form_did
            .starts_with(&format!("{}{}", self.namespace, NAMESPACE_DELIMITER))
        {
            return Ok(self.namespace.clone());
        }

        bail!(
            "did must start with configured namespace[{}] or aliases{:?}",
            self.namespace,
            self.aliases
        )
    }

    fn resolve_request_with_id(
        &self,
        namespace: &str,
        short_form_did: &str,
        unique_portion: &str,
        pv: &dyn Version,
        opts: &[ResolutionOption],
    ) -> Result<ResolutionResult, Error> {
        let internal_result = self.processor.resolve(unique_portion, opts).map_err(|e| {
            debug!(suffix = %unique_portion, error = %e, "Failed to resolve unique portion");

            Error::Resolution(e)
        })?;

        let ti = if internal_result.published_operations.is_empty() {
            let hint = get_hint(short_form_did, namespace, unique_portion)?;

            docutil::transformation_info_for_unpublished(
                &self.namespace,
                &self.domain,
                &hint,
                unique_portion,
                "",
            )
        } else {
            docutil::transformation_info_for_published(
                &self.namespace,
                short_form_did,
                unique_portion,
            )
        };

        pv.document_transformer()
            .transform(&internal_result, &ti)
            .map_err(Error::Dependency)
    }

    fn resolve_request_with_initial_state(
        &self,
        unique_suffix: &str,
        long_form_did: &str,
        initial_bytes: &[u8],
        pv: &dyn Version,
    ) -> Result<ResolutionResult, Error> {
        let op = pv
            .operation_parser()
            .parse(&self.namespace, initial_bytes)
            .map_err(Error::bad_request)?;

        if unique_suffix != op.unique_suffix {
            return Err(Error::BadRequest(
                "provided did doesn't match did created from initial state".to_string(),
            ));
        }

        let rm = docutil::get_create_result(&op, pv)?;

        let doc_bytes = canonicalizer::marshal_canonical(&rm.doc).map_err(Error::Dependency)?;

        pv.document_validator()
            .is_valid_original_document(&doc_bytes)
            .map_err(|e| Error::BadRequest(format!("validate initial document: {e}")))?;

        let create_request_jcs = long_form_did
            .rsplit(NAMESPACE_DELIMITER)
            .next()
            .unwrap_or_default();

        let ti = docutil::transformation_info_for_unpublished(
            &self.namespace,
            &self.domain,
            &self.label,
            unique_suffix,
            create_request_jcs,
        );

        pv.document_transformer().transform(&rm, &ti).map_err(|e| {
            Error::Dependency(anyhow!(
                "failed to transform create with initial state to external document: {e}"
            ))
        })
    }

    // helper for adding operations to the batch
    fn add_to_batch(&self, op: &Operation, version_time: u64) -> anyhow::Result<()> {
        self.writer.add(
            QueuedOperation {
                r#type: op.r#type,
                namespace: self.namespace.clone(),
                unique_suffix: op.unique_suffix.clone(),
                operation_request: op.operation_request.clone(),
                anchor_origin: op.anchor_origin.clone(),
                properties: op.properties.clone(),
            },
            version_time,
        )
    }
}

/// Extract the hint segment sitting between the namespace and the suffix of
/// an identifier. Returns an empty string when the identifier carries no
/// hint.
pub fn get_hint(id: &str, namespace: &str, suffix: &str) -> anyhow::Result<String> {
    let pos_suffix = id
        .rfind(suffix)
        .ok_or_else(|| anyhow!("invalid ID [{id}]"))?;

    if pos_suffix == 0 || namespace.len() + 1 > pos_suffix - 1 {
        return Ok(String::new());
    }

    id.get(namespace.len() + 1..pos_suffix - 1)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("invalid ID [{id}]"))
}

/// Fetch the unique portion of an identifier: the substring after the last
/// namespace delimiter.
fn get_suffix(namespace: &str, id_or_document: &str) -> anyhow::Result<String> {
    let ns = format!("{namespace}{NAMESPACE_DELIMITER}");
    if !id_or_document.contains(&ns) {
        bail!("did must start with configured namespace");
    }

    let last_delimiter = id_or_document
        .rfind(NAMESPACE_DELIMITER)
        .ok_or_else(|| anyhow!("did must start with configured namespace"))?;

    let adjusted_pos = last_delimiter + 1;
    if adjusted_pos >= id_or_document.len() {
        bail!("did suffix is empty");
    }

    Ok(id_or_document[adjusted_pos..].to_string())
}

fn unix_time_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_suffix() {
        assert_eq!(
            get_suffix("did:example", "did:example:abc123").unwrap(),
            "abc123"
        );
        assert_eq!(
            get_suffix("did:example", "did:example:hint1:abc123").unwrap(),
            "abc123"
        );
    }

    #[test]
    fn test_get_suffix_empty() {
        let err = get_suffix("did:example", "did:example:").unwrap_err();
        assert!(err.to_string().contains("did suffix is empty"));
    }

    #[test]
    fn test_get_suffix_wrong_namespace() {
        let err = get_suffix("did:example", "did:other:abc").unwrap_err();
        assert!(err
            .to_string()
            .contains("did must start with configured namespace"));
    }

    #[test]
    fn test_get_hint_without_hint() {
        assert_eq!(
            get_hint("did:example:abc", "did:example", "abc").unwrap(),
            ""
        );
    }

    #[test]
    fn test_get_hint_with_hint() {
        assert_eq!(
            get_hint("did:example:myhint:abc", "did:example", "abc").unwrap(),
            "myhint"
        );
        assert_eq!(
            get_hint("did:example:a:b:abc", "did:example", "abc").unwrap(),
            "a:b"
        );
    }

    #[test]
    fn test_get_hint_invalid_id() {
        let err = get_hint("did:example:abc", "did:example", "xyz").unwrap_err();
        assert!(err.to_string().contains("invalid ID"));
    }

    #[test]
    fn test_get_hint_roundtrip() {
        // ns + ":" + hint + ":" + suffix must invert for any hint without a
        // delimiter, and ns + ":" + suffix must yield the empty hint
        let ns = "did:example";
        let suffix = "EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg";
        for hint in ["h", "interim", "uAAA"] {
            let id = format!("{ns}:{hint}:{suffix}");
            assert_eq!(get_hint(&id, ns, suffix).unwrap(), hint);
        }
        let id = format!("{ns}:{suffix}");
        assert_eq!(get_hint(&id, ns, suffix).unwrap(), "");
    }
}
