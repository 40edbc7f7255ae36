//! Document and operation payload validation for protocol version 1.0.

use std::collections::HashSet;

use anyhow::{anyhow, bail, ensure, Context, Result};
use serde_json::Value;

use crate::canonicalizer;
use crate::document::Document;
use crate::hashing;
use crate::protocol::{DocumentValidator, Protocol};

use super::model::{
    jws_decode_verify_inner, DeactivateClaims, Delta, PublicKey, PublicKeyEntry, PublicKeyJwk,
    RecoverClaims, Request, ServiceEndpointEntry, UpdateClaims,
};
use super::SIGNATURE_ALGORITHM;

const MAX_ID_LENGTH: usize = 50;
const MAX_SERVICE_TYPE_LENGTH: usize = 30;

/// Document validator for protocol version 1.0.
pub struct Validator {
    protocol: Protocol,
}

impl Validator {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }

    fn validate_delta(&self, delta: &Delta) -> Result<()> {
        let size = canonicalizer::marshal_canonical(delta)?.len();
        ensure!(
            size <= self.protocol.max_delta_size,
            "delta size[{size}] exceeds maximum delta size[{}]",
            self.protocol.max_delta_size
        );

        self.validate_operation_hash(&delta.update_commitment)
            .context("update commitment")?;

        Ok(())
    }

    /// Check that an encoded value is a supported multihash within the
    /// protocol's hash length limit.
    fn validate_operation_hash(&self, encoded: &str) -> Result<()> {
        ensure!(
            encoded.len() <= self.protocol.max_operation_hash_length,
            "operation hash length[{}] exceeds maximum hash length[{}]",
            encoded.len(),
            self.protocol.max_operation_hash_length
        );

        hashing::validate_multihash(encoded, self.protocol.multihash_code())
    }

    /// Check that the reveal value is a valid multihash matching the hash of
    /// the revealed signing key.
    fn verify_reveal_value(&self, key: &PublicKeyJwk, reveal_value: &str) -> Result<()> {
        self.validate_operation_hash(reveal_value)
            .context("reveal value")?;

        let computed = hashing::get_reveal_value(key, self.protocol.multihash_code())?;
        ensure!(
            computed == reveal_value,
            "reveal value must match the hash of the signing key; computed: {computed}, found: {reveal_value}"
        );

        Ok(())
    }
}

impl DocumentValidator for Validator {
    fn is_valid_original_document(&self, document: &[u8]) -> Result<()> {
        let doc = Document::from_bytes(document).context("parse original document")?;

        ensure!(doc.id().is_none(), "document must not have the id property");

        if let Some(public_keys) = doc.public_keys() {
            validate_public_keys(public_keys)?;
        }

        if let Some(services) = doc.services() {
            validate_services(services)?;
        }

        Ok(())
    }

    fn is_valid_payload(&self, payload: &[u8]) -> Result<()> {
        let request: Request =
            serde_json::from_slice(payload).context("parse operation payload")?;

        let code = self.protocol.multihash_code();

        match request {
            Request::Create(_) => {
                bail!("payload validation is not supported for create operations")
            }
            Request::Update(update) => {
                ensure!(!update.did_suffix.is_empty(), "missing did suffix");
                self.validate_delta(&update.delta)?;

                let (header, claims) =
                    jws_decode_verify_inner(&update.signed_data, |c: &UpdateClaims| {
                        &c.update_key
                    })
                    .map_err(|e| anyhow!("verify signed update data: {e}"))?;
                ensure!(
                    header.algorithm == SIGNATURE_ALGORITHM,
                    "update operation must use the protocol signature algorithm"
                );

                self.verify_reveal_value(&claims.update_key, &update.reveal_value)?;
                verify_delta_hash(&update.delta, &claims.delta_hash, code)?;

                Ok(())
            }
            Request::Recover(recover) => {
                ensure!(!recover.did_suffix.is_empty(), "missing did suffix");
                self.validate_delta(&recover.delta)?;

                let (header, claims) =
                    jws_decode_verify_inner(&recover.signed_data, |c: &RecoverClaims| {
                        &c.recovery_key
                    })
                    .map_err(|e| anyhow!("verify signed recover data: {e}"))?;
                ensure!(
                    header.algorithm == SIGNATURE_ALGORITHM,
                    "recover operation must use the protocol signature algorithm"
                );

                self.validate_operation_hash(&claims.recovery_commitment)
                    .context("recovery commitment")?;
                self.verify_reveal_value(&claims.recovery_key, &recover.reveal_value)?;
                verify_delta_hash(&recover.delta, &claims.delta_hash, code)?;

                Ok(())
            }
            Request::Deactivate(deactivate) => {
                ensure!(!deactivate.did_suffix.is_empty(), "missing did suffix");

                let (header, claims) =
                    jws_decode_verify_inner(&deactivate.signed_data, |c: &DeactivateClaims| {
                        &c.recovery_key
                    })
                    .map_err(|e| anyhow!("verify signed deactivate data: {e}"))?;
                ensure!(
                    header.algorithm == SIGNATURE_ALGORITHM,
                    "deactivate operation must use the protocol signature algorithm"
                );

                ensure!(
                    claims.did_suffix == deactivate.did_suffix,
                    "signed did suffix mismatch for deactivate"
                );
                self.verify_reveal_value(&claims.recovery_key, &deactivate.reveal_value)?;

                Ok(())
            }
        }
    }
}

fn verify_delta_hash(delta: &Delta, delta_hash: &str, code: u64) -> Result<()> {
    let computed = hashing::calculate_model_multihash(delta, code)?;
    ensure!(computed == delta_hash, "delta hash mismatch");

    Ok(())
}

fn validate_public_keys(public_keys: &[Value]) -> Result<()> {
    let mut ids = HashSet::new();

    for entry in public_keys {
        let entry: PublicKeyEntry =
            serde_json::from_value(entry.clone()).context("parse public key entry")?;

        ensure!(!entry.id.is_empty(), "public key id is missing");
        ensure!(
            b64len(&entry.id) <= MAX_ID_LENGTH,
            "public key id must contain no more than {MAX_ID_LENGTH} base64url-encoded characters"
        );
        ensure!(!entry.r#type.is_empty(), "public key type is missing");
        ensure!(
            ids.insert(entry.id.clone()),
            "duplicate public key id: {}",
            entry.id
        );

        if let PublicKey::PublicKeyJwk(jwk) = &entry.public_key {
            ensure!(
                !jwk.contains_private_key_parameters(),
                "public key JWK must not contain private key parameters"
            );
        }
    }

    Ok(())
}

fn validate_services(services: &[Value]) -> Result<()> {
    let mut ids = HashSet::new();

    for entry in services {
        let entry: ServiceEndpointEntry =
            serde_json::from_value(entry.clone()).context("parse service entry")?;

        ensure!(!entry.id.is_empty(), "service id is missing");
        ensure!(
            b64len(&entry.id) <= MAX_ID_LENGTH,
            "service id must contain no more than {MAX_ID_LENGTH} base64url-encoded characters"
        );
        ensure!(!entry.r#type.is_empty(), "service type is missing");
        ensure!(
            b64len(&entry.r#type) <= MAX_SERVICE_TYPE_LENGTH,
            "service type must contain no more than {MAX_SERVICE_TYPE_LENGTH} base64url-encoded characters"
        );
        ensure!(!entry.service_endpoint.is_null(), "service endpoint is missing");
        ensure!(
            ids.insert(entry.id.clone()),
            "duplicate service id: {}",
            entry.id
        );
    }

    Ok(())
}

fn b64len(s: &str) -> usize {
    base64::encode_config(s, base64::URL_SAFE_NO_PAD).len()
}
