//! Change-reason and source-info bit values carried by USN records.
//!
//! A record's `reason` is a set: several of these bits are routinely set at
//! once (e.g. `DATA_EXTEND | CLOSE`).

pub const DATA_OVERWRITE: u32 = 0x0000_0001;
pub const DATA_EXTEND: u32 = 0x0000_0002;
pub const DATA_TRUNCATION: u32 = 0x0000_0004;
pub const NAMED_DATA_OVERWRITE: u32 = 0x0000_0010;
pub const NAMED_DATA_EXTEND: u32 = 0x0000_0020;
pub const NAMED_DATA_TRUNCATION: u32 = 0x0000_0040;
pub const FILE_CREATE: u32 = 0x0000_0100;
pub const FILE_DELETE: u32 = 0x0000_0200;
pub const EA_CHANGE: u32 = 0x0000_0400;
pub const SECURITY_CHANGE: u32 = 0x0000_0800;
pub const RENAME_OLD_NAME: u32 = 0x0000_1000;
pub const RENAME_NEW_NAME: u32 = 0x0000_2000;
pub const INDEXABLE_CHANGE: u32 = 0x0000_4000;
pub const BASIC_INFO_CHANGE: u32 = 0x0000_8000;
pub const HARD_LINK_CHANGE: u32 = 0x0001_0000;
pub const COMPRESSION_CHANGE: u32 = 0x0002_0000;
pub const ENCRYPTION_CHANGE: u32 = 0x0004_0000;
pub const OBJECT_ID_CHANGE: u32 = 0x0008_0000;
pub const REPARSE_POINT_CHANGE: u32 = 0x0010_0000;
pub const STREAM_CHANGE: u32 = 0x0020_0000;
pub const TRANSACTED_CHANGE: u32 = 0x0040_0000;
pub const INTEGRITY_CHANGE: u32 = 0x0080_0000;
pub const DESIRED_STORAGE_CLASS_CHANGE: u32 = 0x0100_0000;
pub const CLOSE: u32 = 0x8000_0000;

pub const SOURCE_DATA_MANAGEMENT: u32 = 0x0000_0001;
pub const SOURCE_AUXILIARY_DATA: u32 = 0x0000_0002;
pub const SOURCE_REPLICATION_MANAGEMENT: u32 = 0x0000_0004;
pub const SOURCE_CLIENT_REPLICATION_MANAGEMENT: u32 = 0x0000_0008;

const REASON_NAMES: [(u32, &str); 24] = [
    (DATA_OVERWRITE, "DATA_OVERWRITE"),
    (DATA_EXTEND, "DATA_EXTEND"),
    (DATA_TRUNCATION, "DATA_TRUNCATION"),
    (NAMED_DATA_OVERWRITE, "NAMED_DATA_OVERWRITE"),
    (NAMED_DATA_EXTEND, "NAMED_DATA_EXTEND"),
    (NAMED_DATA_TRUNCATION, "NAMED_DATA_TRUNCATION"),
    (FILE_CREATE, "FILE_CREATE"),
    (FILE_DELETE, "FILE_DELETE"),
    (EA_CHANGE, "EA_CHANGE"),
    (SECURITY_CHANGE, "SECURITY_CHANGE"),
    (RENAME_OLD_NAME, "RENAME_OLD_NAME"),
    (RENAME_NEW_NAME, "RENAME_NEW_NAME"),
    (INDEXABLE_CHANGE, "INDEXABLE_CHANGE"),
    (BASIC_INFO_CHANGE, "BASIC_INFO_CHANGE"),
    (HARD_LINK_CHANGE, "HARD_LINK_CHANGE"),
    (COMPRESSION_CHANGE, "COMPRESSION_CHANGE"),
    (ENCRYPTION_CHANGE, "ENCRYPTION_CHANGE"),
    (OBJECT_ID_CHANGE, "OBJECT_ID_CHANGE"),
    (REPARSE_POINT_CHANGE, "REPARSE_POINT_CHANGE"),
    (STREAM_CHANGE, "STREAM_CHANGE"),
    (TRANSACTED_CHANGE, "TRANSACTED_CHANGE"),
    (INTEGRITY_CHANGE, "INTEGRITY_CHANGE"),
    (DESIRED_STORAGE_CLASS_CHANGE, "DESIRED_STORAGE_CLASS_CHANGE"),
    (CLOSE, "CLOSE"),
];

/// Names of the reason bits set in `reason`, in ascending bit order.
pub fn reason_names(reason: u32) -> Vec<&'static str> {
    REASON_NAMES
        .iter()
        .filter(|(bit, _)| reason & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// Converts a USN reason bitfield to a human-readable string.
pub fn reason_to_string(reason: u32) -> String {
    let reasons = reason_names(reason);
    if reasons.is_empty() {
        return "UNKNOWN".to_string();
    }
    reasons.join(" | ")
}
