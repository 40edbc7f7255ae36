//! JSON Canonicalization Scheme (JCS, RFC 8785) helpers.
//!
//! Documents and operation models are canonicalized before hashing and before
//! original-document validation.

use anyhow::{Context, Result};
use serde::Serialize;

/// Canonicalize a value per JCS.
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_jcs::to_string(value).context("unable to execute JSON canonicalization scheme (JCS)")
}

/// Canonicalize a value per JCS, returning bytes.
pub fn marshal_canonical<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(canonicalize(value)?.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize_orders_keys() {
        let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
        assert_eq!(canonicalize(&value).unwrap(), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn test_canonicalize_is_deterministic() {
        let one = json!({"x": [1, 2, 3], "y": "z"});
        let two = json!({"y": "z", "x": [1, 2, 3]});
        assert_eq!(
            marshal_canonical(&one).unwrap(),
            marshal_canonical(&two).unwrap()
        );
    }
}
