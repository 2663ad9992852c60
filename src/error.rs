use std::path::PathBuf;

use thiserror::Error;

/// Expected, user-facing outcomes of an attendance operation that leave the record untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceError {
    #[error("already clocked in")]
    AlreadyWorking,

    #[error("not clocked in")]
    NotWorking,

    #[error("no work logged yet")]
    NoRecords,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to read store {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write store {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Attendance(#[from] AttendanceError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
