//! Decoding of `USN_RECORD_V2` entries out of a raw byte buffer.
//!
//! https://learn.microsoft.com/en-us/windows/win32/api/winioctl/ns-winioctl-usn_record_v2

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Local};
use log::warn;

use crate::{Usn, errors::DecodeError, reason, time};

/// Size of the fixed part of a `USN_RECORD_V2`, up to but excluding `FileName`.
pub const RECORD_V2_HEADER_SIZE: usize = 60;

/// `sizeof(USN_RECORD_V2)` as the platform declares it (`FileName[1]` plus alignment).
pub(crate) const RECORD_V2_STRUCT_SIZE: usize = 64;

const FILE_ATTRIBUTE_HIDDEN: u32 = 0x0000_0002;
const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x0000_0010;

mod offsets {
    pub const RECORD_LENGTH: usize = 0;
    pub const MAJOR_VERSION: usize = 4;
    pub const MINOR_VERSION: usize = 6;
    pub const FILE_REFERENCE_NUMBER: usize = 8;
    pub const PARENT_FILE_REFERENCE_NUMBER: usize = 16;
    pub const USN: usize = 24;
    pub const TIMESTAMP: usize = 32;
    pub const REASON: usize = 40;
    pub const SOURCE_INFO: usize = 44;
    pub const SECURITY_ID: usize = 48;
    pub const FILE_ATTRIBUTES: usize = 52;
    pub const FILE_NAME_LENGTH: usize = 56;
    pub const FILE_NAME_OFFSET: usize = 58;
}

/// One decoded change journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub record_length: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub file_reference_number: u64,
    pub parent_file_reference_number: u64,
    pub usn: Usn,
    pub timestamp: DateTime<Local>,
    pub reason: u32,
    pub source_info: u32,
    pub security_id: u32,
    pub file_attributes: u32,
    pub file_name: String,
}

impl ChangeRecord {
    /// Returns true if this entry represents a directory.
    pub fn is_dir(&self) -> bool {
        self.file_attributes & FILE_ATTRIBUTE_DIRECTORY != 0
    }

    /// Returns true if this entry represents a hidden file or directory.
    pub fn is_hidden(&self) -> bool {
        self.file_attributes & FILE_ATTRIBUTE_HIDDEN != 0
    }

    /// Returns true if any of the bits in `mask` are set in this record's reason.
    pub fn has_reason(&self, mask: u32) -> bool {
        self.reason & mask != 0
    }

    pub fn reason_to_string(&self) -> String {
        reason::reason_to_string(self.reason)
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "usn={} time={} fid={:#x} parent_fid={:#x} reason={} name={}",
            self.usn,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.file_reference_number,
            self.parent_file_reference_number,
            self.reason_to_string(),
            self.file_name
        )
    }
}

/// Returns `len` bytes of `buffer` starting at `at`, or a `Truncated` error.
fn field(buffer: &[u8], at: usize, len: usize) -> Result<&[u8], DecodeError> {
    at.checked_add(len)
        .and_then(|end| buffer.get(at..end))
        .ok_or(DecodeError::Truncated {
            offset: at,
            needed: len,
            available: buffer.len(),
        })
}

fn read_u16(buffer: &[u8], at: usize) -> Result<u16, DecodeError> {
    field(buffer, at, 2).map(LittleEndian::read_u16)
}

fn read_u32(buffer: &[u8], at: usize) -> Result<u32, DecodeError> {
    field(buffer, at, 4).map(LittleEndian::read_u32)
}

fn read_u64(buffer: &[u8], at: usize) -> Result<u64, DecodeError> {
    field(buffer, at, 8).map(LittleEndian::read_u64)
}

fn read_i64(buffer: &[u8], at: usize) -> Result<i64, DecodeError> {
    field(buffer, at, 8).map(LittleEndian::read_i64)
}

/// Decodes the record starting at `offset` and returns it together with the
/// offset of the record that follows it.
///
/// `offset` must point at a record header; nothing here scans for one. Every
/// byte read, including the file name, must lie inside both `buffer` and the
/// record's declared length.
pub fn decode_record(buffer: &[u8], offset: usize) -> Result<(ChangeRecord, usize), DecodeError> {
    let record_length = read_u32(buffer, offset + offsets::RECORD_LENGTH)?;
    if record_length == 0 {
        return Err(DecodeError::ZeroLength { offset });
    }
    let length = record_length as usize;
    if length < RECORD_V2_HEADER_SIZE {
        return Err(DecodeError::RecordTooShort { offset, length });
    }
    // The whole record has to be inside the buffer before any field is trusted.
    let record = field(buffer, offset, length)?;

    let major_version = read_u16(record, offsets::MAJOR_VERSION)?;
    let minor_version = read_u16(record, offsets::MINOR_VERSION)?;
    if major_version != 2 {
        return Err(DecodeError::UnsupportedVersion {
            major: major_version,
            minor: minor_version,
        });
    }

    let name_length = read_u16(record, offsets::FILE_NAME_LENGTH)? as usize;
    let name_offset = read_u16(record, offsets::FILE_NAME_OFFSET)? as usize;
    // https://learn.microsoft.com/en-us/windows/win32/api/winioctl/ns-winioctl-usn_record_v2
    // Do not count on a trailing '\0'; use FileNameLength and FileNameOffset as given.
    let name_bytes = record
        .get(name_offset..name_offset + name_length)
        .ok_or(DecodeError::NameOutOfBounds {
            offset,
            name_offset,
            name_length,
        })?;
    let units: Vec<u16> = name_bytes
        .chunks_exact(2)
        .map(LittleEndian::read_u16)
        .collect();
    let file_name = String::from_utf16(&units).map_err(|_| DecodeError::InvalidFileName {
        offset: offset + name_offset,
    })?;

    let ticks = read_i64(record, offsets::TIMESTAMP)?;
    let timestamp = time::filetime_to_datetime(ticks)
        .ok_or(DecodeError::InvalidTimestamp(ticks))?
        .with_timezone(&Local);

    let entry = ChangeRecord {
        record_length,
        major_version,
        minor_version,
        file_reference_number: read_u64(record, offsets::FILE_REFERENCE_NUMBER)?,
        parent_file_reference_number: read_u64(record, offsets::PARENT_FILE_REFERENCE_NUMBER)?,
        usn: read_i64(record, offsets::USN)?,
        timestamp,
        reason: read_u32(record, offsets::REASON)?,
        source_info: read_u32(record, offsets::SOURCE_INFO)?,
        security_id: read_u32(record, offsets::SECURITY_ID)?,
        file_attributes: read_u32(record, offsets::FILE_ATTRIBUTES)?,
        file_name,
    };

    Ok((entry, offset + length))
}

/// Like [`decode_record`], logging the failure before handing it back.
pub(crate) fn decode_record_logged(
    buffer: &[u8],
    offset: usize,
) -> Result<(ChangeRecord, usize), DecodeError> {
    decode_record(buffer, offset).inspect_err(|err| {
        warn!("Error decoding USN record at offset {}: {}", offset, err);
    })
}
