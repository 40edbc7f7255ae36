//! Construction of protocol version 1.0 operation requests.
//!
//! These helpers build the request payloads submitted to a document handler,
//! generating commitments and reveal values from caller-supplied keys and
//! signing with the protocol signature algorithm.

use anyhow::{anyhow, ensure, Context, Result};
use serde_json::Value;
use ssi_jwk::JWK;

use crate::canonicalizer;
use crate::docutil::NAMESPACE_DELIMITER;
use crate::hashing;

use super::model::{
    CreateRequest, DeactivateClaims, DeactivateRequest, Delta, DidStatePatch, InitialState,
    PublicKeyJwk, RecoverClaims, RecoverRequest, Request, SuffixData, UpdateClaims, UpdateRequest,
};
use super::SIGNATURE_ALGORITHM;

/// Construct a create request from existing update and recovery public keys.
///
/// The key payloads must differ; the public key commitment scheme requires
/// not reusing key payloads across commitment invocations.
pub fn create_request(
    update_pk: &PublicKeyJwk,
    recovery_pk: &PublicKeyJwk,
    patches: Vec<DidStatePatch>,
    multihash_code: u64,
) -> Result<Vec<u8>> {
    ensure!(
        update_pk != recovery_pk,
        "update and recovery public key JWK payload must be different"
    );

    let update_commitment =
        hashing::commitment(update_pk, multihash_code).context("generate update commitment")?;

    let delta = Delta {
        patches,
        update_commitment,
    };
    let delta_hash = hashing::calculate_model_multihash(&delta, multihash_code)
        .context("hash create operation delta object")?;

    let recovery_commitment = hashing::commitment(recovery_pk, multihash_code)
        .context("generate recovery commitment")?;

    let request = Request::Create(CreateRequest {
        suffix_data: SuffixData {
            r#type: None,
            delta_hash,
            recovery_commitment,
            anchor_origin: None,
        },
        delta,
    });

    canonicalizer::marshal_canonical(&request)
}

/// Construct an update request.
///
/// The caller supplies the current update keypair and the public key of a
/// freshly generated next update keypair.
pub fn update_request(
    did_suffix: &str,
    update_key: &JWK,
    new_update_pk: &PublicKeyJwk,
    patches: Vec<DidStatePatch>,
    multihash_code: u64,
) -> Result<Vec<u8>> {
    let update_pk = PublicKeyJwk::try_from(update_key.to_public())
        .map_err(|e| anyhow!("convert update key: {e}"))?;
    ensure!(
        new_update_pk != &update_pk,
        "new update public key must be different"
    );

    let reveal_value = hashing::get_reveal_value(&update_pk, multihash_code)
        .context("compute update reveal value")?;

    let update_commitment = hashing::commitment(new_update_pk, multihash_code)
        .context("generate new update commitment")?;

    let delta = Delta {
        patches,
        update_commitment,
    };
    let delta_hash = hashing::calculate_model_multihash(&delta, multihash_code)
        .context("hash update operation delta object")?;

    let claims = UpdateClaims {
        update_key: update_pk,
        delta_hash,
    };
    let signed_data = ssi_jwt::encode_sign(SIGNATURE_ALGORITHM, &claims, update_key)
        .context("sign update operation")?;

    let request = Request::Update(UpdateRequest {
        did_suffix: did_suffix.to_string(),
        reveal_value,
        delta,
        signed_data,
    });

    canonicalizer::marshal_canonical(&request)
}

/// Construct a recover request.
///
/// The caller supplies the current recovery keypair and the public keys of
/// freshly generated next update and recovery keypairs. The optional anchor
/// origin is carried in the signed data.
pub fn recover_request(
    did_suffix: &str,
    recovery_key: &JWK,
    new_update_pk: &PublicKeyJwk,
    new_recovery_pk: &PublicKeyJwk,
    patches: Vec<DidStatePatch>,
    anchor_origin: Option<Value>,
    multihash_code: u64,
) -> Result<Vec<u8>> {
    let recovery_pk = PublicKeyJwk::try_from(recovery_key.to_public())
        .map_err(|e| anyhow!("convert recovery key: {e}"))?;
    ensure!(
        new_recovery_pk != &recovery_pk,
        "new recovery public key must be different"
    );

    let reveal_value = hashing::get_reveal_value(&recovery_pk, multihash_code)
        .context("compute recover reveal value")?;

    let update_commitment = hashing::commitment(new_update_pk, multihash_code)
        .context("generate new update commitment")?;
    let recovery_commitment = hashing::commitment(new_recovery_pk, multihash_code)
        .context("generate new recovery commitment")?;

    let delta = Delta {
        patches,
        update_commitment,
    };
    let delta_hash = hashing::calculate_model_multihash(&delta, multihash_code)
        .context("hash recover operation delta object")?;

    let claims = RecoverClaims {
        recovery_commitment,
        recovery_key: recovery_pk,
        delta_hash,
        anchor_origin,
    };
    let signed_data = ssi_jwt::encode_sign(SIGNATURE_ALGORITHM, &claims, recovery_key)
        .context("sign recover operation")?;

    let request = Request::Recover(RecoverRequest {
        did_suffix: did_suffix.to_string(),
        reveal_value,
        delta,
        signed_data,
    });

    canonicalizer::marshal_canonical(&request)
}

/// Construct a deactivate request.
pub fn deactivate_request(
    did_suffix: &str,
    recovery_key: &JWK,
    multihash_code: u64,
) -> Result<Vec<u8>> {
    let recovery_pk = PublicKeyJwk::try_from(recovery_key.to_public())
        .map_err(|e| anyhow!("convert recovery key: {e}"))?;

    let reveal_value = hashing::get_reveal_value(&recovery_pk, multihash_code)
        .context("compute deactivate reveal value")?;

    let claims = DeactivateClaims {
        did_suffix: did_suffix.to_string(),
        recovery_key: recovery_pk,
    };
    let signed_data = ssi_jwt::encode_sign(SIGNATURE_ALGORITHM, &claims, recovery_key)
        .context("sign deactivate operation")?;

    let request = Request::Deactivate(DeactivateRequest {
        did_suffix: did_suffix.to_string(),
        reveal_value,
        signed_data,
    });

    canonicalizer::marshal_canonical(&request)
}

/// Compose a long-form identifier from a create request: the short form
/// followed by the base64url-encoded canonicalized initial state.
pub fn long_form_did(
    namespace: &str,
    create_request: &[u8],
    multihash_code: u64,
) -> Result<String> {
    let request: Request =
        serde_json::from_slice(create_request).context("parse create request")?;

    let Request::Create(create) = request else {
        return Err(anyhow!("operation request is not a create operation"));
    };

    let unique_suffix = hashing::calculate_model_multihash(&create.suffix_data, multihash_code)
        .context("calculate unique suffix")?;

    let initial_state = InitialState {
        suffix_data: create.suffix_data,
        delta: create.delta,
    };
    let encoded = hashing::encode(&canonicalizer::marshal_canonical(&initial_state)?);

    Ok(format!(
        "{namespace}{NAMESPACE_DELIMITER}{unique_suffix}{NAMESPACE_DELIMITER}{encoded}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::SHA2_256_CODE;
    use crate::operation::Type;
    use crate::protocol::OperationParser;
    use crate::versions::v1_0::{parser::Parser, test_protocol};

    fn public(jwk: &JWK) -> PublicKeyJwk {
        PublicKeyJwk::try_from(jwk.to_public()).unwrap()
    }

    #[test]
    fn test_create_request_requires_distinct_keys() {
        let key = JWK::generate_p256().unwrap();
        let err =
            create_request(&public(&key), &public(&key), vec![], SHA2_256_CODE).unwrap_err();
        assert!(err.to_string().contains("must be different"));
    }

    #[test]
    fn test_create_request_parses_back() {
        let update = JWK::generate_p256().unwrap();
        let recovery = JWK::generate_p256().unwrap();

        let request =
            create_request(&public(&update), &public(&recovery), vec![], SHA2_256_CODE).unwrap();

        let parser = Parser::new(test_protocol(0));
        let op = parser.parse("did:example", &request).unwrap();
        assert_eq!(op.r#type, Type::Create);
        assert!(!op.unique_suffix.is_empty());
    }

    #[test]
    fn test_update_request_requires_new_key() {
        let update = JWK::generate_p256().unwrap();
        let err =
            update_request("suffix", &update, &public(&update), vec![], SHA2_256_CODE).unwrap_err();
        assert!(err.to_string().contains("must be different"));
    }

    #[test]
    fn test_long_form_did_round_trip() {
        let update = JWK::generate_p256().unwrap();
        let recovery = JWK::generate_p256().unwrap();

        let request =
            create_request(&public(&update), &public(&recovery), vec![], SHA2_256_CODE).unwrap();
        let long_form = long_form_did("did:example", &request, SHA2_256_CODE).unwrap();

        let parser = Parser::new(test_protocol(0));
        let (short_form, initial) = parser.parse_did("did:example", &long_form).unwrap();

        assert!(long_form.starts_with(&short_form));
        let op = parser.parse("did:example", &initial.unwrap()).unwrap();
        assert_eq!(format!("did:example:{}", op.unique_suffix), short_form);
    }
}
