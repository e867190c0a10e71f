use thiserror::Error;

#[derive(Debug, Error)]
pub enum UsnError {
    #[error("Access denied: Administrator privileges required. Please run the application as Administrator to access the USN journal.")]
    PermissionError,

    #[error("Invalid mount point: {0}")]
    InvalidMountPointError(String),

    #[error("Failed to open {path}: Win32 error {code}")]
    HandleError { path: String, code: u32 },

    #[error("{operation} failed: Win32 error {code}")]
    DeviceControlError { operation: &'static str, code: u32 },

    #[error("Malformed USN record: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("USN journal {expected:#x} is no longer active (current journal: {actual:?})")]
    StaleJournalId { expected: u64, actual: Option<u64> },

    #[cfg(windows)]
    #[error("Windows error: {0}")]
    WinApiError(#[from] windows::core::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Other error: {0}")]
    OtherError(String),
}

impl UsnError {
    /// The Win32 error code carried by this error, if any.
    pub fn code(&self) -> Option<u32> {
        match self {
            UsnError::HandleError { code, .. } | UsnError::DeviceControlError { code, .. } => {
                Some(*code)
            }
            #[cfg(windows)]
            UsnError::WinApiError(err) => Some(crate::volume::win32_code(err)),
            UsnError::IoError(err) => err.raw_os_error().map(|code| code as u32),
            _ => None,
        }
    }
}

/// Failures while walking a buffer of USN records.
///
/// Any of these ends the current iteration; record boundaries cannot be
/// recovered once a length field is untrustworthy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("need {needed} bytes at offset {offset}, buffer holds {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("record at offset {offset} has zero length")]
    ZeroLength { offset: usize },

    #[error("record at offset {offset} declares length {length}, smaller than its header")]
    RecordTooShort { offset: usize, length: usize },

    #[error("file name at offset {offset} (+{name_offset}, {name_length} bytes) lies outside the record")]
    NameOutOfBounds {
        offset: usize,
        name_offset: usize,
        name_length: usize,
    },

    #[error("unsupported USN record version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("file name at offset {offset} is not valid UTF-16")]
    InvalidFileName { offset: usize },

    #[error("timestamp {0} is outside the representable range")]
    InvalidTimestamp(i64),
}
