//! Wire model for protocol version 1.0 operation requests.
//!
//! ### References
//! - <https://identity.foundation/sidetree/spec/v1.0.0/#did-operations>
//! - <https://identity.foundation/sidetree/api/#sidetree-operations>

use json_patch::Patch;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use ssi_jwk::{Base64urlUInt, JWK};
use ssi_jws::Header;
use thiserror::Error as ThisError;

/// Document operation request.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum Request {
    Create(CreateRequest),
    Update(UpdateRequest),
    Recover(RecoverRequest),
    Deactivate(DeactivateRequest),
}

/// [Create Operation Suffix Data Object][data]
///
/// [data]: https://identity.foundation/sidetree/spec/v1.0.0/#create-suffix-data-object
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SuffixData {
    /// Implementation-defined type property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// Hash of the canonicalized create operation delta object.
    pub delta_hash: String,

    /// [Recovery commitment](https://identity.foundation/sidetree/spec/v1.0.0/#recovery-commitment)
    pub recovery_commitment: String,

    /// Implementation-defined identifier of the anchoring origin for the
    /// document. Opaque to this layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_origin: Option<Value>,
}

/// Create/Update/Recover Delta Object
///
/// ### References
/// - [Sidetree §11.1 Create - Create Operation Delta Object][codo]
/// - [Sidetree §11.2 Update - Update Operation Delta Object][uodo]
/// - [Sidetree §11.3 Recover - Recover Operation Delta Object][rodo]
///
/// [codo]: https://identity.foundation/sidetree/spec/v1.0.0/#create-delta-object
/// [uodo]: https://identity.foundation/sidetree/spec/v1.0.0/#update-delta-object
/// [rodo]: https://identity.foundation/sidetree/spec/v1.0.0/#recover-delta-object
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    /// Document state patches to apply.
    pub patches: Vec<DidStatePatch>,

    /// Update commitment generated as part of a create or update operation.
    pub update_commitment: String,
}

/// Create operation request.
///
/// ### References
/// - [Sidetree §11.1 Create](https://identity.foundation/sidetree/spec/v1.0.0/#create)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct CreateRequest {
    pub suffix_data: SuffixData,
    pub delta: Delta,
}

/// Update operation request.
///
/// ### References
/// - [Sidetree §11.2 Update](https://identity.foundation/sidetree/spec/v1.0.0/#update)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct UpdateRequest {
    pub did_suffix: String,
    /// Reveal value for the previous update commitment.
    pub reveal_value: String,
    pub delta: Delta,
    /// Compact JWS (RFC 7515) of [UpdateClaims]
    pub signed_data: String,
}

/// Recover operation request.
///
/// ### References
/// - [Sidetree §11.3 Recover](https://identity.foundation/sidetree/spec/v1.0.0/#recover)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct RecoverRequest {
    pub did_suffix: String,
    /// Reveal value for the previous recovery commitment.
    pub reveal_value: String,
    pub delta: Delta,
    /// Compact JWS (RFC 7515) of [RecoverClaims]
    pub signed_data: String,
}

/// Deactivate operation request.
///
/// ### References
/// - [Sidetree §11.4 Deactivate](https://identity.foundation/sidetree/spec/v1.0.0/#deactivate)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct DeactivateRequest {
    pub did_suffix: String,
    /// Reveal value for the previous recovery commitment.
    pub reveal_value: String,
    /// Compact JWS (RFC 7515) of [DeactivateClaims]
    pub signed_data: String,
}

/// Payload object for the JWS in an [UpdateRequest].
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClaims {
    /// Key matching the previous update commitment.
    pub update_key: PublicKeyJwk,

    /// Hash of the canonicalized update operation delta object.
    pub delta_hash: String,
}

/// Payload object for the JWS in a [RecoverRequest].
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RecoverClaims {
    /// Commitment for the next recovery operation.
    pub recovery_commitment: String,

    /// Key matching the previous recovery commitment.
    pub recovery_key: PublicKeyJwk,

    /// Hash of the canonicalized recover operation delta object.
    pub delta_hash: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_origin: Option<Value>,
}

/// Payload object for the JWS in a [DeactivateRequest].
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct DeactivateClaims {
    pub did_suffix: String,
    /// Key matching the previous recovery commitment.
    pub recovery_key: PublicKeyJwk,
}

/// Initial state of a long-form identifier: the create request without its
/// `type` tag, as encoded into the identifier's final segment.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    pub suffix_data: SuffixData,
    pub delta: Delta,
}

/// [DID State Patch][dsp] using a [standard patch action][spa].
///
/// [dsp]: https://identity.foundation/sidetree/spec/v1.0.0/#did-state-patches
/// [spa]: https://identity.foundation/sidetree/spec/v1.0.0/#standard-patch-actions
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "action")]
#[serde(rename_all = "kebab-case")]
pub enum DidStatePatch {
    /// [`add-public-keys`][apk] patch action
    ///
    /// [apk]: https://identity.foundation/sidetree/spec/v1.0.0/#add-public-keys
    AddPublicKeys {
        /// Keys to add or overwrite
        #[serde(rename = "publicKeys")]
        public_keys: Vec<PublicKeyEntry>,
    },

    /// [`remove-public-keys`][rpk] patch action
    ///
    /// [rpk]: https://identity.foundation/sidetree/spec/v1.0.0/#remove-public-keys
    RemovePublicKeys {
        /// Ids of keys to remove
        ids: Vec<String>,
    },

    /// [`add-services`][as] patch action
    ///
    /// [as]: https://identity.foundation/sidetree/spec/v1.0.0/#add-services
    AddServices {
        /// Service entries to add
        services: Vec<ServiceEndpointEntry>,
    },

    /// [`remove-services`][rs] patch action
    ///
    /// [rs]: https://identity.foundation/sidetree/spec/v1.0.0/#remove-services
    RemoveServices {
        /// Ids of service endpoints to remove
        ids: Vec<String>,
    },

    /// [`replace`][r] patch action
    ///
    /// [r]: https://identity.foundation/sidetree/spec/v1.0.0/#replace
    Replace {
        /// Reset document state
        document: DocumentState,
    },

    /// [`ietf-json-patch`][ijp] patch action
    ///
    /// [ijp]: https://identity.foundation/sidetree/spec/v1.0.0/#ietf-json-patch
    IetfJsonPatch {
        /// JSON patches according to [RFC 6902](https://datatracker.ietf.org/doc/html/rfc6902).
        patches: Patch,
    },
}

/// Document state used by the [`replace`](DidStatePatch::Replace) patch.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_keys: Option<Vec<PublicKeyEntry>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<ServiceEndpointEntry>>,
}

/// Public key data of a [PublicKeyEntry], as JWK or Multibase.
///
/// Per [Sidetree §12.1.1 `add-public-keys`: Step 4][apk].
///
/// [apk]: https://identity.foundation/sidetree/spec/v1.0.0/#add-public-keys
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub enum PublicKey {
    /// [`publicKeyJwk`](https://www.w3.org/TR/did-core/#dfn-publickeyjwk) as defined in DID Core.
    PublicKeyJwk(PublicKeyJwk),

    /// [`publicKeyMultibase`](https://www.w3.org/TR/did-core/#dfn-publickeymultibase) as defined in DID Core.
    PublicKeyMultibase(String),
}

/// Verification relationship of a public key entry.
///
/// Defined in [DID Core](https://www.w3.org/TR/did-core/#verification-relationships).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Purpose {
    Authentication,
    AssertionMethod,
    KeyAgreement,
    CapabilityInvocation,
    CapabilityDelegation,
}

/// Public key entry used by the [`add-public-keys`](DidStatePatch::AddPublicKeys)
/// and [`replace`](DidStatePatch::Replace) patch actions.
///
/// Specified in [Sidetree §12.1.1 `add-public-keys`][apk].
///
/// [apk]: https://identity.foundation/sidetree/spec/v1.0.0/#add-public-keys
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyEntry {
    /// `id` property
    ///
    /// Maximum length: 50 in base64url
    pub id: String,

    /// Verification method type
    pub r#type: String,

    /// Verification method controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    /// `publicKeyJwk` or `publicKeyMultibase` property
    #[serde(flatten)]
    pub public_key: PublicKey,

    /// Verification relationships
    pub purposes: Vec<Purpose>,
}

/// Service endpoint entry used by the [`add-services`](DidStatePatch::AddServices)
/// and [`replace`](DidStatePatch::Replace) patch actions.
///
/// Specified in [Sidetree §12.1.3 `add-services`][as].
///
/// [as]: https://identity.foundation/sidetree/spec/v1.0.0/#add-services
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpointEntry {
    /// `id` property
    ///
    /// Maximum length: 50 in base64url
    pub id: String,

    /// Service type
    ///
    /// Maximum length: 30 in base64url
    pub r#type: String,

    /// Service endpoint URL or object
    pub service_endpoint: Value,
}

/// Public key JWK (JSON Web Key).
///
/// Wraps a JWK while allowing a `nonce` property ([§6.2.2 JWK Nonce][jwkn])
/// and disallowing private key properties on construction from a [JWK].
///
/// [jwkn]: https://identity.foundation/sidetree/spec/#jwk-nonce
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyJwk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Base64urlUInt>,
    #[serde(flatten)]
    jwk: Value,
}

impl PublicKeyJwk {
    /// True when the JWK carries private key parameters.
    pub fn contains_private_key_parameters(&self) -> bool {
        self.jwk.get("d").is_some()
    }
}

/// Error resulting from [converting JWK to PublicKeyJwk][PublicKeyJwk::try_from].
#[derive(ThisError, Debug)]
pub enum PublicKeyJwkFromJwkError {
    /// Unable to convert JWK to [Value]
    #[error("Unable to convert JWK to Value")]
    ToValue(#[from] serde_json::Error),
    /// Public key JWK must not contain private key parameters (e.g. "d")
    #[error("Public key JWK must not contain private key parameters")]
    PrivateKeyParameters,
}

/// Error resulting from attempting to convert [PublicKeyJwk] to JWK.
#[derive(ThisError, Debug)]
pub enum JwkFromPublicKeyJwkError {
    /// Unable to convert [Value] to JWK
    #[error("Unable to convert Value to JWK")]
    FromValue(#[from] serde_json::Error),
}

impl TryFrom<JWK> for PublicKeyJwk {
    type Error = PublicKeyJwkFromJwkError;

    fn try_from(jwk: JWK) -> Result<Self, Self::Error> {
        let jwk_value = serde_json::to_value(jwk).map_err(PublicKeyJwkFromJwkError::ToValue)?;
        if jwk_value.get("d").is_some() {
            return Err(PublicKeyJwkFromJwkError::PrivateKeyParameters);
        };
        Ok(Self {
            jwk: jwk_value,
            nonce: None,
        })
    }
}

/// Convert [PublicKeyJwk] to [JWK].
///
/// Note: `nonce` property is dropped.
impl TryFrom<PublicKeyJwk> for JWK {
    type Error = JwkFromPublicKeyJwkError;

    fn try_from(pkjwk: PublicKeyJwk) -> Result<Self, Self::Error> {
        let jwk = serde_json::from_value(pkjwk.jwk).map_err(JwkFromPublicKeyJwkError::FromValue)?;
        Ok(jwk)
    }
}

/// An error resulting from [jws_decode_verify_inner].
#[derive(ThisError, Debug)]
pub enum JwsDecodeVerifyError {
    /// Unable to split JWS
    #[error("Unable to split JWS")]
    SplitJws(#[source] ssi_jws::Error),
    /// Unable to decode JWS parts
    #[error("Unable to decode JWS parts")]
    DecodeJwsParts(#[source] ssi_jws::Error),
    /// Deserialize JWS payload
    #[error("Deserialize JWS payload")]
    DeserializeJwsPayload(#[source] serde_json::Error),
    /// Unable to convert PublicKeyJwk to JWK
    #[error("Unable to convert PublicKeyJwk to JWK")]
    JwkFromPublicKeyJwk(#[source] JwkFromPublicKeyJwkError),
    /// Unable to verify JWS
    #[error("Unable to verify JWS")]
    VerifyJws(#[source] ssi_jws::Error),
}

/// Decode and verify a compact JWS whose verification key lives inside its
/// own payload.
///
/// The deserialized claims object is passed to the provided `get_key`
/// function; the public key it returns is then used to verify the signature.
/// The verified header and claims are returned on success.
pub fn jws_decode_verify_inner<Claims: DeserializeOwned>(
    jws: &str,
    get_key: impl FnOnce(&Claims) -> &PublicKeyJwk,
) -> Result<(Header, Claims), JwsDecodeVerifyError> {
    use ssi_jws::{decode_jws_parts, split_jws, verify_bytes, DecodedJWS};

    let (header_b64, payload_enc, signature_b64) =
        split_jws(jws).map_err(JwsDecodeVerifyError::SplitJws)?;
    let DecodedJWS {
        header,
        signing_input,
        payload,
        signature,
    } = decode_jws_parts(header_b64, payload_enc.as_bytes(), signature_b64)
        .map_err(JwsDecodeVerifyError::DecodeJwsParts)?;
    let claims: Claims = serde_json::from_slice(&payload)
        .map_err(JwsDecodeVerifyError::DeserializeJwsPayload)?;
    let pk = get_key(&claims);
    let pk = JWK::try_from(pk.clone()).map_err(JwsDecodeVerifyError::JwkFromPublicKeyJwk)?;
    verify_bytes(header.algorithm, &signing_input, &pk, &signature)
        .map_err(JwsDecodeVerifyError::VerifyJws)?;
    Ok((header, claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_tag_dispatch() {
        let request: Request = serde_json::from_value(json!({
            "type": "deactivate",
            "didSuffix": "EiDyOQbbZAa3aiRzeCkV7LOx3SERjjH93EXoIM3UoN4oWg",
            "revealValue": "EiB-dib5oumdaDGH47TB17Qg1nHza036bTIGibQOKFUY2A",
            "signedData": "e30.e30.e30"
        }))
        .unwrap();

        assert!(matches!(request, Request::Deactivate(_)));
    }

    #[test]
    fn test_unsupported_request_type() {
        let result = serde_json::from_value::<Request>(json!({
            "type": "revoke",
            "didSuffix": "abc"
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_request_field_rejected() {
        let result = serde_json::from_value::<Request>(json!({
            "type": "deactivate",
            "didSuffix": "abc",
            "revealValue": "def",
            "signedData": "e30.e30.e30",
            "extra": true
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_patch_action_tags() {
        let patch: DidStatePatch = serde_json::from_value(json!({
            "action": "remove-public-keys",
            "ids": ["key1"]
        }))
        .unwrap();

        assert!(matches!(patch, DidStatePatch::RemovePublicKeys { .. }));

        let patch: DidStatePatch = serde_json::from_value(json!({
            "action": "ietf-json-patch",
            "patches": [{"op": "replace", "path": "/name", "value": "value"}]
        }))
        .unwrap();

        assert!(matches!(patch, DidStatePatch::IetfJsonPatch { .. }));
    }

    #[test]
    fn test_public_key_jwk_rejects_private_key() {
        let jwk = JWK::generate_p256().unwrap();
        assert!(matches!(
            PublicKeyJwk::try_from(jwk.clone()),
            Err(PublicKeyJwkFromJwkError::PrivateKeyParameters)
        ));
        assert!(PublicKeyJwk::try_from(jwk.to_public()).is_ok());
    }

    #[test]
    fn test_public_key_jwk_detects_private_parameters() {
        let pk: PublicKeyJwk = serde_json::from_value(json!({
            "kty": "EC", "crv": "P-256", "x": "x", "y": "y", "d": "secret"
        }))
        .unwrap();

        assert!(pk.contains_private_key_parameters());
    }
}
