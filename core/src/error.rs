use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootFsError {
    #[error("Drive parameters unavailable for drive {0:#04x}")]
    DriveParameters(u8),

    #[error("Read of LBA {lba} failed after {attempts} attempts")]
    ReadFailed { lba: u32, attempts: u32 },

    #[error("Buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid boot sector: {0}")]
    InvalidBootSector(String),

    #[error("Not enough memory to read FAT: required {required}, only have {available}")]
    NotEnoughMemory { required: usize, available: usize },

    #[error("Out of file handles")]
    OutOfHandles,

    #[error("Invalid directory entry: {0}")]
    InvalidDirectoryEntry(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Short read: got {read} of {expected} bytes")]
    ShortRead { read: u64, expected: u64 },

    #[error("Invalid or closed file handle")]
    InvalidHandle,
}

impl BootFsError {
    /// True for outcomes a caller can expect during normal lookups.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BootFsError::NotFound(_) | BootFsError::NotADirectory(_))
    }
}
