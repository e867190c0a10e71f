//! Control codes and byte-exact request/response structures for the change
//! journal FSCTLs, plus the [`DeviceIoControl`] seam they are sent through.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::{Usn, UsnResult, errors::DecodeError};

pub const FSCTL_READ_USN_JOURNAL: u32 = 0x0009_00BB;
pub const FSCTL_CREATE_USN_JOURNAL: u32 = 0x0009_00E7;
pub const FSCTL_READ_FILE_USN_DATA: u32 = 0x0009_00EB;
pub const FSCTL_QUERY_USN_JOURNAL: u32 = 0x0009_00F4;
pub const FSCTL_DELETE_USN_JOURNAL: u32 = 0x0009_00F8;

pub const USN_DELETE_FLAG_DELETE: u32 = 0x0000_0001;
pub const USN_DELETE_FLAG_NOTIFY: u32 = 0x0000_0002;

pub const ERROR_ACCESS_DENIED: u32 = 5;
pub const ERROR_JOURNAL_DELETE_IN_PROGRESS: u32 = 1178;
pub const ERROR_JOURNAL_NOT_ACTIVE: u32 = 1179;
pub const ERROR_JOURNAL_ENTRY_DELETED: u32 = 1181;

/// Issues one device control request against an open handle.
///
/// `output` is filled by the device; the return value is the number of bytes
/// it wrote. Failures carry the platform error code in
/// [`UsnError::DeviceControlError`](crate::UsnError::DeviceControlError).
/// Implementations may block, e.g. a journal read with `bytes_to_wait_for`
/// set waits for new records.
pub trait DeviceIoControl {
    fn device_io_control(&self, control_code: u32, input: &[u8], output: &mut [u8])
    -> UsnResult<usize>;
}

impl<T: DeviceIoControl + ?Sized> DeviceIoControl for &T {
    fn device_io_control(
        &self,
        control_code: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> UsnResult<usize> {
        (**self).device_io_control(control_code, input, output)
    }
}

/// Human-readable name of a control code, used in error messages.
pub(crate) fn operation_name(control_code: u32) -> &'static str {
    match control_code {
        FSCTL_READ_USN_JOURNAL => "FSCTL_READ_USN_JOURNAL",
        FSCTL_CREATE_USN_JOURNAL => "FSCTL_CREATE_USN_JOURNAL",
        FSCTL_READ_FILE_USN_DATA => "FSCTL_READ_FILE_USN_DATA",
        FSCTL_QUERY_USN_JOURNAL => "FSCTL_QUERY_USN_JOURNAL",
        FSCTL_DELETE_USN_JOURNAL => "FSCTL_DELETE_USN_JOURNAL",
        _ => "DeviceIoControl",
    }
}

/// `READ_USN_JOURNAL_DATA_V0`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadJournalRequest {
    pub start_usn: Usn,
    pub reason_mask: u32,
    pub return_only_on_close: bool,
    pub timeout: u64,
    pub bytes_to_wait_for: u64,
    pub journal_id: u64,
}

impl ReadJournalRequest {
    pub const SIZE: usize = 40;

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        // Writes into a Vec cannot fail.
        let _ = bytes.write_i64::<LittleEndian>(self.start_usn);
        let _ = bytes.write_u32::<LittleEndian>(self.reason_mask);
        let _ = bytes.write_u32::<LittleEndian>(self.return_only_on_close as u32);
        let _ = bytes.write_u64::<LittleEndian>(self.timeout);
        let _ = bytes.write_u64::<LittleEndian>(self.bytes_to_wait_for);
        let _ = bytes.write_u64::<LittleEndian>(self.journal_id);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes = exact(bytes, Self::SIZE)?;
        Ok(ReadJournalRequest {
            start_usn: LittleEndian::read_i64(&bytes[0..8]),
            reason_mask: LittleEndian::read_u32(&bytes[8..12]),
            return_only_on_close: LittleEndian::read_u32(&bytes[12..16]) != 0,
            timeout: LittleEndian::read_u64(&bytes[16..24]),
            bytes_to_wait_for: LittleEndian::read_u64(&bytes[24..32]),
            journal_id: LittleEndian::read_u64(&bytes[32..40]),
        })
    }
}

/// `CREATE_USN_JOURNAL_DATA`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateJournalRequest {
    pub maximum_size: u64,
    pub allocation_delta: u64,
}

impl CreateJournalRequest {
    pub const SIZE: usize = 16;

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        let _ = bytes.write_u64::<LittleEndian>(self.maximum_size);
        let _ = bytes.write_u64::<LittleEndian>(self.allocation_delta);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes = exact(bytes, Self::SIZE)?;
        Ok(CreateJournalRequest {
            maximum_size: LittleEndian::read_u64(&bytes[0..8]),
            allocation_delta: LittleEndian::read_u64(&bytes[8..16]),
        })
    }
}

/// `DELETE_USN_JOURNAL_DATA`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteJournalRequest {
    pub journal_id: u64,
    pub delete_flags: u32,
}

impl DeleteJournalRequest {
    /// Includes the 4 bytes of tail padding the C struct carries.
    pub const SIZE: usize = 16;

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        let _ = bytes.write_u64::<LittleEndian>(self.journal_id);
        let _ = bytes.write_u32::<LittleEndian>(self.delete_flags);
        let _ = bytes.write_u32::<LittleEndian>(0);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes = exact(bytes, Self::SIZE)?;
        Ok(DeleteJournalRequest {
            journal_id: LittleEndian::read_u64(&bytes[0..8]),
            delete_flags: LittleEndian::read_u32(&bytes[8..12]),
        })
    }
}

/// Snapshot of a volume's journal, as returned by `FSCTL_QUERY_USN_JOURNAL`
/// (`USN_JOURNAL_DATA_V0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JournalDescriptor {
    /// Changes whenever the journal is deleted and recreated.
    pub journal_id: u64,
    pub first_usn: Usn,
    pub next_usn: Usn,
    pub lowest_valid_usn: Usn,
    pub max_usn: Usn,
    pub maximum_size: u64,
    pub allocation_delta: u64,
}

impl JournalDescriptor {
    pub const SIZE: usize = 56;

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes = bytes.get(..Self::SIZE).ok_or(DecodeError::Truncated {
            offset: 0,
            needed: Self::SIZE,
            available: bytes.len(),
        })?;
        Ok(JournalDescriptor {
            journal_id: LittleEndian::read_u64(&bytes[0..8]),
            first_usn: LittleEndian::read_i64(&bytes[8..16]),
            next_usn: LittleEndian::read_i64(&bytes[16..24]),
            lowest_valid_usn: LittleEndian::read_i64(&bytes[24..32]),
            max_usn: LittleEndian::read_i64(&bytes[32..40]),
            maximum_size: LittleEndian::read_u64(&bytes[40..48]),
            allocation_delta: LittleEndian::read_u64(&bytes[48..56]),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        let _ = bytes.write_u64::<LittleEndian>(self.journal_id);
        let _ = bytes.write_i64::<LittleEndian>(self.first_usn);
        let _ = bytes.write_i64::<LittleEndian>(self.next_usn);
        let _ = bytes.write_i64::<LittleEndian>(self.lowest_valid_usn);
        let _ = bytes.write_i64::<LittleEndian>(self.max_usn);
        let _ = bytes.write_u64::<LittleEndian>(self.maximum_size);
        let _ = bytes.write_u64::<LittleEndian>(self.allocation_delta);
        bytes
    }
}

fn exact(bytes: &[u8], size: usize) -> Result<&[u8], DecodeError> {
    if bytes.len() != size {
        return Err(DecodeError::Truncated {
            offset: 0,
            needed: size,
            available: bytes.len(),
        });
    }
    Ok(bytes)
}
