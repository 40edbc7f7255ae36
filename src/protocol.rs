//! Protocol version contracts: version parameters, the pure functions bundled
//! with each version, and the client that maps transaction time to a version.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::document::{Document, ResolutionResult};
use crate::operation::{AnchoredOperation, Operation};

/// Protocol parameters for one version, identified by its genesis time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    /// Logical anchoring time at which this version takes effect.
    pub genesis_time: u64,
    /// Supported multihash algorithm codes (e.g. 18 for SHA2-256).
    pub multihash_algorithms: Vec<u64>,
    /// Maximum operation request size in bytes.
    pub max_operation_size: usize,
    /// Maximum canonicalized delta size in bytes.
    pub max_delta_size: usize,
    /// Maximum length of an encoded operation hash.
    pub max_operation_hash_length: usize,
}

impl Protocol {
    /// Primary multihash algorithm code of this version.
    pub fn multihash_code(&self) -> u64 {
        self.multihash_algorithms
            .first()
            .copied()
            .unwrap_or(crate::hashing::SHA2_256_CODE)
    }
}

/// Version-independent top level of a create request: suffix data plus delta.
#[derive(Debug, Clone)]
pub struct CreateRequestModel {
    pub suffix_data: Value,
    pub delta: DeltaModel,
}

/// Version-independent delta: patches plus the next update commitment.
#[derive(Debug, Clone)]
pub struct DeltaModel {
    pub patches: Vec<Value>,
    pub update_commitment: String,
}

/// Internal snapshot produced by replaying operations for a unique suffix.
#[derive(Debug, Clone, Default)]
pub struct ResolutionModel {
    pub doc: Document,
    pub recovery_commitment: Option<String>,
    pub update_commitment: Option<String>,
    pub deactivated: bool,
    pub anchor_origin: Option<Value>,
    pub published_operations: Vec<AnchoredOperation>,
    pub unpublished_operations: Vec<AnchoredOperation>,
}

/// Metadata bundle handed to the version's document transformer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformationInfo {
    /// The document has no published operations (interim or long-form state).
    Unpublished {
        namespace: String,
        domain: String,
        /// Configured label, or the hint extracted from the resolved id.
        label: String,
        suffix: String,
        /// Encoded create request of a long-form identifier, or empty.
        create_request_jcs: String,
    },
    /// The document has anchored history.
    Published {
        namespace: String,
        did: String,
        suffix: String,
    },
}

/// Decodes operation requests and identifier strings for one protocol
/// version. Parsing is CPU-bound and performs no I/O.
pub trait OperationParser: Send + Sync {
    /// Parse and structurally validate an operation request.
    fn parse(&self, namespace: &str, request: &[u8]) -> Result<Operation>;

    /// Split a short- or long-form identifier into its short form and
    /// optional initial-state bytes (a canonicalized create request).
    fn parse_did(
        &self,
        namespace: &str,
        short_or_long_form_did: &str,
    ) -> Result<(String, Option<Vec<u8>>)>;

    /// Extract the version-independent top level of a create request.
    fn parse_create_request(&self, request: &[u8]) -> Result<CreateRequestModel>;
}

/// Validates documents and operation payloads for one protocol version.
pub trait DocumentValidator: Send + Sync {
    /// Validate a document submitted as part of a create operation or as
    /// long-form initial state.
    fn is_valid_original_document(&self, document: &[u8]) -> Result<()>;

    /// Validate the payload of an update, recover or deactivate request.
    fn is_valid_payload(&self, payload: &[u8]) -> Result<()>;
}

/// Applies version-defined patches to a document.
pub trait DocumentComposer: Send + Sync {
    fn apply_patches(&self, doc: &Document, patches: &[Value]) -> Result<Document>;
}

/// Shapes an internal resolution model into the external resolution result.
pub trait DocumentTransformer: Send + Sync {
    fn transform(
        &self,
        rm: &ResolutionModel,
        info: &TransformationInfo,
    ) -> Result<ResolutionResult>;
}

/// A protocol version: parameters plus the pure functions versioned with it.
pub trait Version: Send + Sync {
    fn protocol(&self) -> &Protocol;
    fn operation_parser(&self) -> &dyn OperationParser;
    fn document_validator(&self) -> &dyn DocumentValidator;
    fn document_composer(&self) -> &dyn DocumentComposer;
    fn document_transformer(&self) -> &dyn DocumentTransformer;
}

/// Access to protocol versions.
pub trait Client: Send + Sync {
    /// Latest version of the protocol.
    fn current(&self) -> Result<Arc<dyn Version>>;

    /// The version in effect at the given transaction time.
    fn get(&self, transaction_time: u64) -> Result<Arc<dyn Version>>;
}

/// Protocol client over a fixed set of versions ordered by genesis time.
pub struct VersionRegistry {
    versions: Vec<Arc<dyn Version>>,
}

impl VersionRegistry {
    pub fn new(mut versions: Vec<Arc<dyn Version>>) -> Self {
        versions.sort_by_key(|v| v.protocol().genesis_time);
        Self { versions }
    }
}

impl Client for VersionRegistry {
    fn current(&self) -> Result<Arc<dyn Version>> {
        self.versions
            .last()
            .cloned()
            .ok_or_else(|| anyhow!("no protocol versions configured"))
    }

    fn get(&self, transaction_time: u64) -> Result<Arc<dyn Version>> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.protocol().genesis_time <= transaction_time)
            .cloned()
            .ok_or_else(|| {
                anyhow!("protocol parameters are not defined for anchoring time: {transaction_time}")
            })
    }
}
