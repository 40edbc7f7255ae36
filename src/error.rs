//! Error types for the document-operation core.

use thiserror::Error as ThisError;

/// An error returned by an operation processor's resolve.
#[derive(ThisError, Debug)]
pub enum ResolveError {
    /// No anchored or unpublished state exists for the suffix.
    #[error("document not found")]
    NotFound,
    /// Any other processor failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResolveError {
    /// True when the error denotes an unresolvable suffix.
    ///
    /// Matches the typed [`ResolveError::NotFound`] variant and falls back to
    /// the `"not found"` message substring for processors that wrap their
    /// absence signal in an opaque error.
    pub fn is_not_found(&self) -> bool {
        match self {
            ResolveError::NotFound => true,
            ResolveError::Other(e) => e.to_string().contains("not found"),
        }
    }
}

/// An error from document operation processing or resolution.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Caller-attributable failure: parse, validation or identifier errors.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The latest resolved state of the document is deactivated.
    #[error("document has been deactivated, no further operations are allowed")]
    Deactivated,
    /// The operation processor could not resolve the suffix.
    #[error(transparent)]
    Resolution(#[from] ResolveError),
    /// The unpublished operation store rejected a stage request.
    #[error("failed to add operation for suffix[{suffix}] to unpublished operation store: {source}")]
    UnpublishedStore {
        suffix: String,
        #[source]
        source: anyhow::Error,
    },
    /// A collaborator (protocol client, batch writer, transformer) failed.
    #[error(transparent)]
    Dependency(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn bad_request(err: impl std::fmt::Display) -> Self {
        Error::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_bad_request_prefix() {
        let err = Error::BadRequest("missing did suffix".to_string());
        assert_eq!(err.to_string(), "bad request: missing did suffix");
    }

    #[test]
    fn test_resolve_error_not_found() {
        assert!(ResolveError::NotFound.is_not_found());
        assert!(ResolveError::Other(anyhow!("uniqueSuffix not found in the store")).is_not_found());
        assert!(!ResolveError::Other(anyhow!("connection refused")).is_not_found());
    }

    #[test]
    fn test_resolution_error_is_transparent() {
        let err = Error::Resolution(ResolveError::Other(anyhow!("store unavailable")));
        assert_eq!(err.to_string(), "store unavailable");
    }

    #[test]
    fn test_deactivated_message() {
        assert!(Error::Deactivated.to_string().contains("has been deactivated"));
    }
}
