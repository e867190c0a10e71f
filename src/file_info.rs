//! Per-file USN lookup via `FSCTL_READ_FILE_USN_DATA`.

use log::debug;

use crate::{
    UsnResult,
    ioctl::{self, DeviceIoControl},
    record::{self, ChangeRecord, RECORD_V2_STRUCT_SIZE},
};

const MAX_PATH: usize = 260;

/// Room for the fixed record plus a `MAX_PATH`-character UTF-16 name.
pub(crate) const FILE_USN_BUFFER_SIZE: usize = RECORD_V2_STRUCT_SIZE + MAX_PATH * 2;

/// Read the current USN record of the file behind `device`.
pub fn read_file_usn<D: DeviceIoControl + ?Sized>(device: &D) -> UsnResult<ChangeRecord> {
    let mut buffer = vec![0u8; FILE_USN_BUFFER_SIZE];
    let bytes_read = device.device_io_control(ioctl::FSCTL_READ_FILE_USN_DATA, &[], &mut buffer)?;
    let (entry, _) = record::decode_record_logged(&buffer[..bytes_read.min(buffer.len())], 0)?;
    debug!("File USN record: usn={}, name={}", entry.usn, entry.file_name);
    Ok(entry)
}

/// Look up the current USN record of the file or directory at `path`.
///
/// The file is opened read-only (sharing read and write) for the duration of
/// the call and closed again on every path out of it.
#[cfg(windows)]
pub fn file_info(path: impl AsRef<std::path::Path>) -> UsnResult<ChangeRecord> {
    let file = crate::volume::FileHandle::open(path.as_ref())?;
    read_file_usn(&file)
}
