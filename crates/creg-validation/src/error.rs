use thiserror::Error;

/// Failure of an external dependency consulted by a check.
///
/// Never surfaced to the submitter: the engine logs it and treats the check
/// as having produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected collaborator response: {0}")]
    BadResponse(String),
}
