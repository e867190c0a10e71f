use std::mem::size_of;

use windows::Win32::{
    Foundation::HANDLE,
    Security::{GetTokenInformation, TOKEN_ELEVATION, TOKEN_QUERY, TokenElevation},
    System::Threading::{GetCurrentProcess, OpenProcessToken},
};

/// Whether the current process token is elevated.
///
/// Every change journal FSCTL on a volume handle requires administrator rights.
pub(crate) fn is_elevated() -> windows::core::Result<bool> {
    let mut token = HANDLE::default();
    unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token)? };

    let mut elevation = TOKEN_ELEVATION::default();
    let mut returned_length = 0;
    let result = unsafe {
        GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            size_of::<TOKEN_ELEVATION>() as u32,
            &mut returned_length,
        )
    };
    let _ = unsafe { windows::Win32::Foundation::CloseHandle(token) };
    result?;

    Ok(elevation.TokenIsElevated != 0)
}
