//! Custom error types for the I/O module.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("File size of {found} bytes exceeds the maximum allowed size of {limit} bytes.")]
    FileTooLarge { limit: u64, found: u64 },

    #[error("Offset {offset:#x} is beyond the end of the source ({len} bytes).")]
    OutOfBounds { offset: u64, len: u64 },

    #[error("Read of {needed} bytes at {offset:#x} would pass the end of the source ({available} available).")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("An underlying I/O error occurred.")]
    StdIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IoError>;
