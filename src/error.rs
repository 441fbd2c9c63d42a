use thiserror::Error;

/// Stage-level errors. Each pipeline stage fails fast with its own variant
/// so the exit message identifies where the run aborted.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential acquisition or refresh failed.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Local read or remote write failed while mirroring the tree.
    #[error("upload error: {0}")]
    Upload(String),

    /// Bad CLI input, rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// The permission grant was rejected.
    #[error("share error: {0}")]
    Share(String),

    /// Download-direction failure (gdshare-pull).
    #[error("sync error: {0}")]
    Sync(String),

    /// Scheduler installation failed (gdshare-cron).
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

pub type Result<T> = std::result::Result<T, Error>;
