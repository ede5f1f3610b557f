use thiserror::Error;

/// Failures on the wire and config paths. Gameplay rejections (firing too
/// soon, reloading a full magazine) are never errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("snapshot must be {expected} bytes, got {actual}")]
    SnapshotLength { expected: usize, actual: usize },

    #[error("unknown weapon state tag {0}")]
    UnknownState(u8),

    #[error("negative {field} in snapshot: {value}")]
    NegativeCount { field: &'static str, value: i32 },

    #[error("{field} {value} does not fit the int32 wire field")]
    CountOverflow { field: &'static str, value: u32 },

    #[error("frame codec error: {0}")]
    Frame(#[from] bincode::Error),

    #[error("weapon {id} rejected: {reason}")]
    InvalidWeapon { id: u32, reason: &'static str },

    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
