use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum CheckpointErrKind {
    #[error("io failure: {0}")]
    IoFailed(String),
    #[error("checkpoint corrupt: {0}")]
    Corrupt(String),
    #[error("encode failure: {0}")]
    EncodeFailed(String),
}

#[derive(Clone, Debug, Error)]
#[error(transparent)]
pub struct CheckpointError(pub CheckpointErrKind);

impl CheckpointError {
    pub fn new(kind: CheckpointErrKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &CheckpointErrKind {
        &self.0
    }
}

impl From<CheckpointErrKind> for CheckpointError {
    fn from(kind: CheckpointErrKind) -> Self {
        CheckpointError(kind)
    }
}
