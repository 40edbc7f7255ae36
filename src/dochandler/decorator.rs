//! Operation decoration: state-dependent preconditions and anchor-origin
//! propagation.

use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::operation::{Operation, Type};

use super::OperationProcessor;

/// Validates and pre-processes an operation against the current resolution
/// state. A decorator may only set `anchor_origin` on the returned operation.
pub trait OperationDecorator: Send + Sync {
    fn decorate(&self, op: Operation) -> Result<Operation, Error>;
}

/// Default decorator: prior-state lookup, deactivation guard and anchor-origin
/// propagation. Create operations pass through unchanged.
pub struct DefaultOperationDecorator {
    processor: Arc<dyn OperationProcessor>,
}

impl DefaultOperationDecorator {
    pub fn new(processor: Arc<dyn OperationProcessor>) -> Self {
        Self { processor }
    }
}

impl OperationDecorator for DefaultOperationDecorator {
    fn decorate(&self, mut op: Operation) -> Result<Operation, Error> {
        if op.r#type != Type::Create {
            let internal_result =
                self.processor.resolve(&op.unique_suffix, &[]).map_err(|e| {
                    debug!(suffix = %op.unique_suffix, operation_type = %op.r#type, error = %e,
                        "Failed to resolve suffix for operation");

                    Error::Resolution(e)
                })?;

            if internal_result.deactivated {
                return Err(Error::Deactivated);
            }

            // recover carries its own anchor origin in its signed data
            if op.r#type == Type::Update || op.r#type == Type::Deactivate {
                op.anchor_origin = internal_result.anchor_origin;
            }
        }

        Ok(op)
    }
}
