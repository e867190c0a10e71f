//! # usn-change-journal
//!
//! A Rust library for reading the NTFS USN change journal as a stream of typed change records,
//! and for managing the journal itself (query, create, delete).
//!
//! ## Features
//! - Read journal records as a lazy, resumable Rust iterator
//! - Create, query and delete a volume's change journal
//! - Look up the current USN record of a single file
//! - Bounds-checked decoding of `USN_RECORD_V2` buffers, usable without Windows
//!
//! ## Example: Read the USN Journal
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> Result<(), usn_change_journal::UsnError> {
//! use usn_change_journal::{ChangeJournal, ReadOptions};
//!
//! let journal = ChangeJournal::open(r"\\.\C:")?;
//! let mut reader = journal.read(ReadOptions::default())?;
//! for result in reader.by_ref().take(10) {
//!     let record = result?;
//!     println!("{} {} {}", record.usn, record.reason_to_string(), record.file_name);
//! }
//! // Resume later from where this reader stopped.
//! let resume_at = reader.next_usn();
//! # let _ = resume_at;
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
//!
//! ## Platform
//! - Windows NTFS/ReFS volumes for the live journal
//! - Requires administrator privileges to access the USN journal
//! - Record decoding and the reader state machine work against any
//!   [`DeviceIoControl`] implementation
//!
//! ## License
//! MIT License.

pub mod errors;
pub mod file_info;
pub mod ioctl;
pub mod journal;
pub mod reason;
pub mod record;
mod time;
pub mod worker;

#[cfg(windows)]
mod privilege;
#[cfg(windows)]
pub mod volume;

// Re-export commonly used types
pub use errors::{DecodeError, UsnError};
pub use file_info::read_file_usn;
#[cfg(windows)]
pub use file_info::file_info;
pub use ioctl::{DeviceIoControl, JournalDescriptor};
pub use journal::{ChangeJournal, JournalReader, ReadOptions};
pub use record::{ChangeRecord, decode_record};

/// A convenient type alias for Results with UsnError.
pub type UsnResult<T> = std::result::Result<T, UsnError>;


pub type Usn = i64;

pub const DEFAULT_BUFFER_SIZE: usize = 20 * 1024; // 20KB

pub const DEFAULT_JOURNAL_MAX_SIZE: u64 = 32 * 1024 * 1024; // 32MB
pub const DEFAULT_JOURNAL_ALLOCATION_DELTA: u64 = 8 * 1024 * 1024; // 8MB
pub const USN_REASON_MASK_ALL: u32 = 0xFFFFFFFF;
