use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("unknown stimulus '{0}'")]
    UnknownStimulus(String),
    #[error("evolution table has no node '{0}'")]
    UnknownNode(String),
    #[error("evolution node '{from}' lists missing candidate '{to}'")]
    DanglingCandidate { from: String, to: String },
    #[error("evolution node keyed '{key}' declares id '{id}'")]
    MismatchedId { key: String, id: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
