//! Volume and file handle management for NTFS/ReFS

use crate::{
    UsnResult,
    errors::UsnError,
    ioctl::{self, DeviceIoControl},
    journal::ChangeJournal,
    privilege,
};
use log::{debug, warn};
use std::{ffi::c_void, path::Path};
use windows::{
    Win32::{
        Foundation::{CloseHandle, HANDLE},
        Storage::FileSystem::{
            CreateFileW, FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAGS_AND_ATTRIBUTES, FILE_GENERIC_READ,
            FILE_SHARE_READ, FILE_SHARE_WRITE, GetVolumeNameForVolumeMountPointW, OPEN_EXISTING,
        },
        System::IO::DeviceIoControl as Win32DeviceIoControl,
    },
    core::HSTRING,
};

/// Recover the Win32 error code from an HRESULT built by `HRESULT_FROM_WIN32`.
pub(crate) fn win32_code(err: &windows::core::Error) -> u32 {
    let hresult = err.code().0 as u32;
    if hresult & 0xFFFF_0000 == 0x8007_0000 {
        hresult & 0xFFFF
    } else {
        hresult
    }
}

/// Open `path` with `CreateFileW` for reading, sharing read and write access.
fn open_handle(path: &str, flags: FILE_FLAGS_AND_ATTRIBUTES) -> UsnResult<HANDLE> {
    match unsafe {
        CreateFileW(
            &HSTRING::from(path),
            FILE_GENERIC_READ.0,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            None,
            OPEN_EXISTING,
            flags,
            None,
        )
    } {
        Ok(handle) => Ok(handle),
        Err(err) => {
            let code = win32_code(&err);
            warn!("CreateFileW failed, path={}, error={:?}", path, err);
            if code == ioctl::ERROR_ACCESS_DENIED {
                return Err(UsnError::PermissionError);
            }
            Err(UsnError::HandleError {
                path: path.to_string(),
                code,
            })
        }
    }
}

fn io_control(
    handle: HANDLE,
    control_code: u32,
    input: &[u8],
    output: &mut [u8],
) -> UsnResult<usize> {
    let mut bytes_returned = 0u32;
    let input_ptr = (!input.is_empty()).then(|| input.as_ptr() as *const c_void);
    let output_ptr = (!output.is_empty()).then(|| output.as_mut_ptr() as *mut c_void);

    // The calling thread blocks here for blocking journal reads; nothing else
    // in this crate holds a lock across the call.
    if let Err(err) = unsafe {
        Win32DeviceIoControl(
            handle,
            control_code,
            input_ptr,
            input.len() as u32,
            output_ptr,
            output.len() as u32,
            Some(&mut bytes_returned),
            None,
        )
    } {
        return Err(UsnError::DeviceControlError {
            operation: ioctl::operation_name(control_code),
            code: win32_code(&err),
        });
    }

    Ok(bytes_returned as usize)
}

fn close(handle: HANDLE, what: &str) {
    if let Err(err) = unsafe { CloseHandle(handle) } {
        warn!("CloseHandle failed for {}: {:?}", what, err);
    } else {
        debug!("Closed handle for {}", what);
    }
}

#[derive(Debug)]
/// An open NTFS/ReFS volume handle. The handle is closed on drop.
pub struct Volume {
    handle: HANDLE,
    pub device_path: String,
    pub drive_letter: Option<char>,
    pub mount_point: Option<String>,
}

impl Volume {
    /// Opens a volume from a device path such as `\\.\C:`.
    pub fn open(device_path: &str) -> Result<Self, UsnError> {
        if !privilege::is_elevated()? {
            return Err(UsnError::PermissionError);
        }
        let handle = open_handle(device_path, FILE_FLAGS_AND_ATTRIBUTES::default())?;
        Ok(Volume {
            handle,
            device_path: device_path.to_string(),
            drive_letter: None,
            mount_point: None,
        })
    }

    /// Creates a new `Volume` instance with the given drive letter.
    pub fn from_drive_letter(drive_letter: char) -> Result<Self, UsnError> {
        // https://learn.microsoft.com/en-us/windows/win32/fileio/obtaining-a-volume-handle-for-change-journal-operations
        // To obtain a handle to a volume for use with update sequence number (USN) change journal operations,
        // call the CreateFile function with the lpFileName parameter set to a string of the following form: \\.\X:
        let mut volume = Volume::open(&format!(r"\\.\{}:", drive_letter))?;
        volume.drive_letter = Some(drive_letter);
        Ok(volume)
    }

    /// Creates a new `Volume` instance with the given mount point.
    pub fn from_mount_point(mount_point: &Path) -> Result<Self, UsnError> {
        // GetVolumeNameForVolumeMountPointW requires trailing backslash
        let mount_path = format!("{}\\", mount_point.to_string_lossy());

        let mut volume_name = [0u16; 64]; // Enough space for volume GUID path
        if let Err(err) = unsafe {
            GetVolumeNameForVolumeMountPointW(&HSTRING::from(&mount_path), &mut volume_name)
        } {
            warn!(
                "GetVolumeNameForVolumeMountPointW failed, mount_point={}, error={:?}",
                mount_path, err
            );
            return Err(UsnError::InvalidMountPointError(mount_path));
        }

        let end = volume_name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(volume_name.len());
        let volume_guid = String::from_utf16_lossy(&volume_name[..end]);
        debug!("Volume GUID: {}", volume_guid);

        // IMPORTANT: Remove the trailing backslash for CreateFileW
        let mut volume = Volume::open(volume_guid.trim_end_matches('\\'))?;
        volume.mount_point = Some(mount_point.to_string_lossy().to_string());
        Ok(volume)
    }
}

impl DeviceIoControl for Volume {
    fn device_io_control(
        &self,
        control_code: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> UsnResult<usize> {
        io_control(self.handle, control_code, input, output)
    }
}

impl Drop for Volume {
    fn drop(&mut self) {
        close(self.handle, &self.device_path);
    }
}

/// A read-only handle to one file or directory, closed on drop.
#[derive(Debug)]
pub struct FileHandle {
    handle: HANDLE,
    path: String,
}

impl FileHandle {
    pub fn open(path: &Path) -> Result<Self, UsnError> {
        let path = path.to_string_lossy().to_string();
        // Directories can only be opened with backup semantics.
        let handle = open_handle(&path, FILE_FLAG_BACKUP_SEMANTICS)?;
        Ok(FileHandle { handle, path })
    }
}

impl DeviceIoControl for FileHandle {
    fn device_io_control(
        &self,
        control_code: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> UsnResult<usize> {
        io_control(self.handle, control_code, input, output)
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        close(self.handle, &self.path);
    }
}

impl ChangeJournal<Volume> {
    /// Open the change journal of the volume at `device_path`, e.g. `\\.\C:`.
    pub fn open(device_path: &str) -> UsnResult<Self> {
        let volume = Volume::open(device_path)?;
        Ok(ChangeJournal::new(volume, device_path))
    }

    pub fn from_drive_letter(drive_letter: char) -> UsnResult<Self> {
        let volume = Volume::from_drive_letter(drive_letter)?;
        let name = volume.device_path.clone();
        Ok(ChangeJournal::new(volume, name))
    }

    pub fn from_mount_point(mount_point: &Path) -> UsnResult<Self> {
        let volume = Volume::from_mount_point(mount_point)?;
        let name = mount_point.to_string_lossy().to_string();
        Ok(ChangeJournal::new(volume, name))
    }
}
