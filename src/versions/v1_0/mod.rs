//! Protocol version 1.0.
//!
//! Bundles the version parameters with the parser, validator, composer and
//! transformer implementations that are compatible with them.

pub mod client;
pub mod composer;
pub mod model;
pub mod parser;
pub mod transformer;
pub mod validator;

use ssi_jwk::Algorithm;

use crate::hashing;
use crate::protocol::{
    DocumentComposer, DocumentTransformer, DocumentValidator, OperationParser, Protocol, Version,
};

/// JWS algorithm for version 1.0 signed operation data.
pub const SIGNATURE_ALGORITHM: Algorithm = Algorithm::ES256;

const MAX_OPERATION_SIZE: usize = 2500;
const MAX_DELTA_SIZE: usize = 1700;
const MAX_OPERATION_HASH_LENGTH: usize = 100;

/// Protocol version 1.0 effective at a given genesis time.
pub struct VersionV1 {
    protocol: Protocol,
    parser: parser::Parser,
    validator: validator::Validator,
    composer: composer::Composer,
    transformer: transformer::Transformer,
}

impl VersionV1 {
    pub fn new(genesis_time: u64) -> Self {
        let protocol = protocol_parameters(genesis_time);

        Self {
            parser: parser::Parser::new(protocol.clone()),
            validator: validator::Validator::new(protocol.clone()),
            composer: composer::Composer,
            transformer: transformer::Transformer,
            protocol,
        }
    }
}

impl Version for VersionV1 {
    fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    fn operation_parser(&self) -> &dyn OperationParser {
        &self.parser
    }

    fn document_validator(&self) -> &dyn DocumentValidator {
        &self.validator
    }

    fn document_composer(&self) -> &dyn DocumentComposer {
        &self.composer
    }

    fn document_transformer(&self) -> &dyn DocumentTransformer {
        &self.transformer
    }
}

fn protocol_parameters(genesis_time: u64) -> Protocol {
    Protocol {
        genesis_time,
        multihash_algorithms: vec![hashing::SHA2_256_CODE],
        max_operation_size: MAX_OPERATION_SIZE,
        max_delta_size: MAX_DELTA_SIZE,
        max_operation_hash_length: MAX_OPERATION_HASH_LENGTH,
    }
}

#[cfg(test)]
pub(crate) fn test_protocol(genesis_time: u64) -> Protocol {
    protocol_parameters(genesis_time)
}
