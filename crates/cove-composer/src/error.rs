use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload target expired")]
    TargetExpired,

    #[error("upload failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("backend rejected the message: {0}")]
    Rejected(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("attachment upload failed: {0}")]
    Upload(#[from] UploadError),
}
