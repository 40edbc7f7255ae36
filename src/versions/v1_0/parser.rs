//! Operation and identifier parsing for protocol version 1.0.

use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::canonicalizer;
use crate::docutil::NAMESPACE_DELIMITER;
use crate::hashing;
use crate::operation::{Operation, Type};
use crate::protocol::{CreateRequestModel, DeltaModel, OperationParser, Protocol};

use super::model::{CreateRequest, InitialState, RecoverClaims, Request};

const KEY_SUFFIX_DATA: &str = "suffixData";
const KEY_DELTA: &str = "delta";

/// Operation parser for protocol version 1.0.
pub struct Parser {
    protocol: Protocol,
}

impl Parser {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }

    fn parse_request(&self, request: &[u8]) -> Result<Request> {
        ensure!(
            request.len() <= self.protocol.max_operation_size,
            "operation size[{}] exceeds maximum operation size[{}]",
            request.len(),
            self.protocol.max_operation_size
        );

        serde_json::from_slice(request).context("parse operation request")
    }

    /// Decode a candidate long-form segment. Returns the canonicalized create
    /// request when the segment carries initial state, `None` when it is a
    /// plain suffix or hint segment.
    fn parse_initial_state(&self, segment: &str) -> Result<Option<Vec<u8>>> {
        let Ok(bytes) = base64::decode_config(segment, base64::URL_SAFE_NO_PAD) else {
            return Ok(None);
        };

        let Ok(value) = serde_json::from_slice::<Value>(&bytes) else {
            return Ok(None);
        };

        if value.get(KEY_SUFFIX_DATA).is_none() || value.get(KEY_DELTA).is_none() {
            return Ok(None);
        }

        let initial: InitialState =
            serde_json::from_value(value).context("parse long form initial state")?;

        let request = Request::Create(CreateRequest {
            suffix_data: initial.suffix_data,
            delta: initial.delta,
        });

        canonicalizer::marshal_canonical(&request).map(Some)
    }
}

impl OperationParser for Parser {
    fn parse(&self, namespace: &str, request: &[u8]) -> Result<Operation> {
        let parsed = self.parse_request(request)?;
        let code = self.protocol.multihash_code();

        let (r#type, unique_suffix, anchor_origin) = match &parsed {
            Request::Create(create) => {
                let unique_suffix =
                    hashing::calculate_model_multihash(&create.suffix_data, code)
                        .context("calculate unique suffix")?;

                (Type::Create, unique_suffix, create.suffix_data.anchor_origin.clone())
            }
            Request::Update(update) => {
                ensure!(!update.did_suffix.is_empty(), "missing did suffix");

                (Type::Update, update.did_suffix.clone(), None)
            }
            Request::Recover(recover) => {
                ensure!(!recover.did_suffix.is_empty(), "missing did suffix");

                // a recover operation carries its own anchor origin in its
                // signed data; the signature is checked during validation
                let claims: RecoverClaims = decode_jws_claims(&recover.signed_data)
                    .context("decode recover signed data")?;

                (Type::Recover, recover.did_suffix.clone(), claims.anchor_origin)
            }
            Request::Deactivate(deactivate) => {
                ensure!(!deactivate.did_suffix.is_empty(), "missing did suffix");

                (Type::Deactivate, deactivate.did_suffix.clone(), None)
            }
        };

        Ok(Operation {
            r#type,
            unique_suffix,
            namespace: namespace.to_string(),
            operation_request: request.to_vec(),
            anchor_origin,
            properties: Vec::new(),
        })
    }

    fn parse_did(
        &self,
        namespace: &str,
        short_or_long_form_did: &str,
    ) -> Result<(String, Option<Vec<u8>>)> {
        let prefix = format!("{namespace}{NAMESPACE_DELIMITER}");
        let without_namespace = short_or_long_form_did
            .strip_prefix(&prefix)
            .ok_or_else(|| anyhow!("did must start with configured namespace[{namespace}]"))?;

        if let Some(pos) = without_namespace.rfind(NAMESPACE_DELIMITER) {
            let last_segment = &without_namespace[pos + 1..];

            if let Some(create_request) = self.parse_initial_state(last_segment)? {
                let short_form_did = match short_or_long_form_did.rfind(NAMESPACE_DELIMITER) {
                    Some(idx) => &short_or_long_form_did[..idx],
                    None => short_or_long_form_did,
                };

                return Ok((short_form_did.to_string(), Some(create_request)));
            }
        }

        Ok((short_or_long_form_did.to_string(), None))
    }

    fn parse_create_request(&self, request: &[u8]) -> Result<CreateRequestModel> {
        let parsed = self.parse_request(request)?;

        let Request::Create(create) = parsed else {
            bail!("operation request is not a create operation");
        };

        let patches = create
            .delta
            .patches
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .context("serialize delta patches")?;

        Ok(CreateRequestModel {
            suffix_data: serde_json::to_value(&create.suffix_data)
                .context("serialize suffix data")?,
            delta: DeltaModel {
                patches,
                update_commitment: create.delta.update_commitment,
            },
        })
    }
}

/// Decode the claims of a compact JWS without verifying its signature.
fn decode_jws_claims<Claims: DeserializeOwned>(jws: &str) -> Result<Claims> {
    let (_header, payload, _signature) =
        ssi_jws::split_jws(jws).map_err(|e| anyhow!("split JWS: {e}"))?;

    let payload = base64::decode_config(payload, base64::URL_SAFE_NO_PAD)
        .context("decode JWS payload")?;

    serde_json::from_slice(&payload).context("deserialize JWS payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::v1_0::test_protocol;
    use serde_json::json;

    fn parser() -> Parser {
        Parser::new(test_protocol(0))
    }

    fn create_request_value() -> Value {
        json!({
            "type": "create",
            "suffixData": {
                "deltaHash": "EiCfDWRnYlcD9EGA3d_5Z1AHu-iYqMbJ9nfiqdz5S8VDbg",
                "recoveryCommitment": "EiBfOZdMtU6OBw8Pk879QtZ-2J-9FbbjSZyoaA_bqD4zhA"
            },
            "delta": {
                "updateCommitment": "EiDKIkwqO69IPG3pOlHkdb86nYt0aNxSHZu2r-bhEznjdA",
                "patches": []
            }
        })
    }

    #[test]
    fn test_parse_create_computes_suffix() {
        let request = serde_json::to_vec(&create_request_value()).unwrap();
        let op = parser().parse("did:example", &request).unwrap();

        assert_eq!(op.r#type, Type::Create);
        assert_eq!(op.namespace, "did:example");
        assert_eq!(op.operation_request, request);

        let expected = hashing::calculate_model_multihash(
            &create_request_value()["suffixData"],
            hashing::SHA2_256_CODE,
        )
        .unwrap();
        assert_eq!(op.unique_suffix, expected);
    }

    #[test]
    fn test_parse_update() {
        let request = serde_json::to_vec(&json!({
            "type": "update",
            "didSuffix": "EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg",
            "revealValue": "EiBkRSeixqX-PhOij6PIpuGfPld5Nif5MxcrgtGCw-t6LA",
            "delta": {"patches": [], "updateCommitment": "EiDOrcmPtfMHuwIWN6YoihdeIPxOKDHy3D6sdMXu_7CN0w"},
            "signedData": "e30.e30.e30"
        }))
        .unwrap();

        let op = parser().parse("did:example", &request).unwrap();
        assert_eq!(op.r#type, Type::Update);
        assert_eq!(
            op.unique_suffix,
            "EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg"
        );
        assert!(op.anchor_origin.is_none());
    }

    #[test]
    fn test_parse_missing_did_suffix() {
        let request = serde_json::to_vec(&json!({
            "type": "update",
            "didSuffix": "",
            "revealValue": "reveal",
            "delta": {"patches": [], "updateCommitment": "abc"},
            "signedData": "e30.e30.e30"
        }))
        .unwrap();

        let err = parser().parse("did:example", &request).unwrap_err();
        assert!(err.to_string().contains("missing did suffix"));
    }

    #[test]
    fn test_parse_unsupported_type() {
        let request = serde_json::to_vec(&json!({"type": "added", "didSuffix": "abc"})).unwrap();
        assert!(parser().parse("did:example", &request).is_err());
    }

    #[test]
    fn test_parse_oversize_request() {
        let protocol = test_protocol(0);
        let oversize = vec![b'x'; protocol.max_operation_size + 1];

        let err = parser().parse("did:example", &oversize).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum operation size"));
    }

    #[test]
    fn test_parse_recover_takes_origin_from_signed_data() {
        let claims = json!({
            "recoveryCommitment": "EiBfOZdMtU6OBw8Pk879QtZ-2J-9FbbjSZyoaA_bqD4zhA",
            "recoveryKey": {"kty": "EC", "crv": "P-256", "x": "x", "y": "y"},
            "deltaHash": "EiCfDWRnYlcD9EGA3d_5Z1AHu-iYqMbJ9nfiqdz5S8VDbg",
            "anchorOrigin": "https://anchor.origin"
        });
        let payload = base64::encode_config(
            serde_json::to_vec(&claims).unwrap(),
            base64::URL_SAFE_NO_PAD,
        );
        let signed_data = format!("e30.{payload}.e30");

        let request = serde_json::to_vec(&json!({
            "type": "recover",
            "didSuffix": "EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg",
            "revealValue": "EiAJ-97Is59is6FKAProwDo870nmwCeP8n5nRRFwPpUZVQ",
            "delta": {"patches": [], "updateCommitment": "EiD6_csybTfxELBoMgkE9O2BTCmhScG_RW_qaZQkIkJ_aQ"},
            "signedData": signed_data
        }))
        .unwrap();

        let op = parser().parse("did:example", &request).unwrap();
        assert_eq!(op.r#type, Type::Recover);
        assert_eq!(op.anchor_origin, Some(json!("https://anchor.origin")));
    }

    #[test]
    fn test_parse_did_short_form() {
        let (did, initial) = parser()
            .parse_did("did:example", "did:example:EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg")
            .unwrap();

        assert_eq!(did, "did:example:EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg");
        assert!(initial.is_none());
    }

    #[test]
    fn test_parse_did_with_hint() {
        let (did, initial) = parser()
            .parse_did("did:example", "did:example:interim:suffix123")
            .unwrap();

        assert_eq!(did, "did:example:interim:suffix123");
        assert!(initial.is_none());
    }

    #[test]
    fn test_parse_did_long_form() {
        let initial_state = json!({
            "suffixData": create_request_value()["suffixData"],
            "delta": create_request_value()["delta"]
        });
        let segment = base64::encode_config(
            canonicalizer::marshal_canonical(&initial_state).unwrap(),
            base64::URL_SAFE_NO_PAD,
        );
        let suffix = hashing::calculate_model_multihash(
            &create_request_value()["suffixData"],
            hashing::SHA2_256_CODE,
        )
        .unwrap();
        let long_form = format!("did:example:{suffix}:{segment}");

        let (did, initial) = parser().parse_did("did:example", &long_form).unwrap();

        assert_eq!(did, format!("did:example:{suffix}"));
        let initial = initial.unwrap();

        // initial state bytes are the canonicalized create request
        let op = parser().parse("did:example", &initial).unwrap();
        assert_eq!(op.r#type, Type::Create);
        assert_eq!(op.unique_suffix, suffix);
    }

    #[test]
    fn test_parse_did_wrong_namespace() {
        assert!(parser().parse_did("did:example", "did:other:suffix").is_err());
    }

    #[test]
    fn test_parse_create_request_model() {
        let request = serde_json::to_vec(&create_request_value()).unwrap();
        let model = parser().parse_create_request(&request).unwrap();

        assert_eq!(
            model.delta.update_commitment,
            "EiDKIkwqO69IPG3pOlHkdb86nYt0aNxSHZu2r-bhEznjdA"
        );
        assert!(model.delta.patches.is_empty());
        assert_eq!(
            model.suffix_data["recoveryCommitment"],
            "EiBfOZdMtU6OBw8Pk879QtZ-2J-9FbbjSZyoaA_bqD4zhA"
        );
    }

    #[test]
    fn test_parse_create_request_rejects_other_types() {
        let request = serde_json::to_vec(&json!({
            "type": "deactivate",
            "didSuffix": "abc",
            "revealValue": "def",
            "signedData": "e30.e30.e30"
        }))
        .unwrap();

        assert!(parser().parse_create_request(&request).is_err());
    }
}
