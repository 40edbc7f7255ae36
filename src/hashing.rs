//! Multihash-based hashing process.
//!
//! The hashing algorithm is identified by its multihash code and carried in
//! the protocol version; version 1.0 uses SHA2-256 (code 18).

use anyhow::{bail, ensure, Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonicalizer;

/// Multihash code for SHA2-256.
pub const SHA2_256_CODE: u64 = 18;

const MULTIHASH_SHA2_256_PREFIX: &[u8] = &[0x12];
const MULTIHASH_SHA2_256_SIZE: &[u8] = &[0x20];

/// Hash data and prepend the multihash prefix for the given algorithm code.
pub fn hash_protocol(data: &[u8], code: u64) -> Result<Vec<u8>> {
    let (prefix, hash) = hash_protocol_algorithm(data, code)?;
    Ok([prefix, hash].concat())
}

/// Hash data with the given algorithm code, without the multihash prefix.
pub fn hash_algorithm(data: &[u8], code: u64) -> Result<Vec<u8>> {
    let (_prefix, hash) = hash_protocol_algorithm(data, code)?;
    Ok(hash)
}

fn hash_protocol_algorithm(data: &[u8], code: u64) -> Result<(Vec<u8>, Vec<u8>)> {
    match code {
        SHA2_256_CODE => {
            let mut hasher = Sha256::new();
            hasher.update(data);
            Ok((
                [MULTIHASH_SHA2_256_PREFIX, MULTIHASH_SHA2_256_SIZE].concat(),
                hasher.finalize().to_vec(),
            ))
        }
        other => bail!("algorithm not supported, unable to compute hash: multihash code[{other}]"),
    }
}

/// Base64url encoding used for all encoded hashes.
pub fn encode(data: &[u8]) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

/// Multihash of data, base64url-encoded.
pub fn hash_and_encode(data: &[u8], code: u64) -> Result<String> {
    Ok(encode(&hash_protocol(data, code)?))
}

/// Multihash of the canonicalized model, base64url-encoded.
///
/// This is the unique-suffix computation: the suffix of a create operation is
/// `calculate_model_multihash(suffix_data, code)`.
pub fn calculate_model_multihash<T: Serialize + ?Sized>(model: &T, code: u64) -> Result<String> {
    let canonical = canonicalizer::marshal_canonical(model).context("canonicalize model")?;
    hash_and_encode(&canonical, code)
}

/// Public key commitment scheme: multihash of the hash of the canonicalized
/// public key.
pub fn commitment<T: Serialize + ?Sized>(key: &T, code: u64) -> Result<String> {
    let canonical = canonicalizer::marshal_canonical(key).context("canonicalize public key")?;
    let reveal = hash_algorithm(&canonical, code)?;
    hash_and_encode(&reveal, code)
}

/// Reveal value: multihash of the canonicalized public key, base64url-encoded.
pub fn get_reveal_value<T: Serialize + ?Sized>(key: &T, code: u64) -> Result<String> {
    let canonical = canonicalizer::marshal_canonical(key).context("canonicalize public key")?;
    hash_and_encode(&canonical, code)
}

/// Check that an encoded value is a parseable multihash for the given code.
pub fn validate_multihash(encoded: &str, code: u64) -> Result<()> {
    ensure!(
        code == SHA2_256_CODE,
        "algorithm not supported, unable to validate hash: multihash code[{code}]"
    );
    let bytes = base64::decode_config(encoded, base64::URL_SAFE_NO_PAD)
        .context("decode base64url multihash")?;
    ensure!(
        bytes.len() == 34,
        "unexpected multihash length: {}",
        bytes.len()
    );
    ensure!(
        bytes[0..1] == *MULTIHASH_SHA2_256_PREFIX && bytes[1..2] == *MULTIHASH_SHA2_256_SIZE,
        "expected SHA2-256 multihash prefix"
    );
    Ok(())
}
