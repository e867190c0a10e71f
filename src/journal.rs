//! Provides access to the Windows NTFS/ReFS USN change journal.
//!
//! This module enables querying, creating, deleting, and reading the USN change journal
//! of one volume. Reads are exposed as a lazy, resumable iterator of [`ChangeRecord`]s.
//!

use crate::errors::{DecodeError, UsnError};
use crate::ioctl::{
    self, CreateJournalRequest, DeleteJournalRequest, DeviceIoControl, JournalDescriptor,
    ReadJournalRequest,
};
use crate::record::{self, ChangeRecord, RECORD_V2_HEADER_SIZE};
use crate::{
    DEFAULT_BUFFER_SIZE, DEFAULT_JOURNAL_ALLOCATION_DELTA, DEFAULT_JOURNAL_MAX_SIZE,
    USN_REASON_MASK_ALL, Usn, UsnResult,
};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use std::mem::size_of;

#[derive(Debug, Clone)]
/// Options for reading the USN journal.
///
/// The defaults read every record from USN 0 without blocking.
pub struct ReadOptions {
    pub start_usn: Usn,
    pub reason_mask: u32,
    pub return_only_on_close: bool,
    /// Timeout in seconds for a blocking read; only meaningful with `bytes_to_wait_for`.
    pub timeout: u64,
    /// When nonzero, each read waits until this many bytes of new records exist.
    pub bytes_to_wait_for: u64,
    pub buffer_size: usize,
    /// Journal id a resumed reader expects to find; a mismatch is reported as
    /// [`UsnError::StaleJournalId`].
    pub expected_journal_id: Option<u64>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            start_usn: 0,
            reason_mask: USN_REASON_MASK_ALL,
            return_only_on_close: false,
            timeout: 0,
            bytes_to_wait_for: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            expected_journal_id: None,
        }
    }
}

impl ReadOptions {
    pub fn start_usn(mut self, start_usn: Usn) -> Self {
        self.start_usn = start_usn;
        self
    }

    pub fn reason_mask(mut self, reason_mask: u32) -> Self {
        self.reason_mask = reason_mask;
        self
    }

    pub fn return_only_on_close(mut self, only_on_close: bool) -> Self {
        self.return_only_on_close = only_on_close;
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bytes_to_wait_for(mut self, bytes: u64) -> Self {
        self.bytes_to_wait_for = bytes;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn expected_journal_id(mut self, journal_id: u64) -> Self {
        self.expected_journal_id = Some(journal_id);
        self
    }
}

/// The change journal of one volume.
///
/// Owns the device it talks to; on Windows that is a [`Volume`](crate::volume::Volume),
/// whose handle is closed when the journal is dropped.
#[derive(Debug)]
pub struct ChangeJournal<D> {
    device: D,
    volume_name: String,
}

impl<D: DeviceIoControl> ChangeJournal<D> {
    /// Wraps an already opened device.
    pub fn new(device: D, volume_name: impl Into<String>) -> Self {
        ChangeJournal {
            device,
            volume_name: volume_name.into(),
        }
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Query the current journal's id and USN range.
    pub fn query(&self) -> UsnResult<JournalDescriptor> {
        query(&self.device)
    }

    /// Query the journal, creating it first if the volume has none active.
    pub fn query_or_create(
        &self,
        max_size: u64,
        allocation_delta: u64,
    ) -> UsnResult<JournalDescriptor> {
        match query(&self.device) {
            Err(err) if err.code() == Some(ioctl::ERROR_JOURNAL_NOT_ACTIVE) => {
                debug!("No active USN journal on {}, creating one", self.volume_name);
                create(&self.device, max_size, allocation_delta)?;
                query(&self.device)
            }
            result => result,
        }
    }

    /// Create the journal, or update the sizes of an existing one.
    pub fn create(&self, max_size: u64, allocation_delta: u64) -> UsnResult<()> {
        create(&self.device, max_size, allocation_delta)
    }

    /// Create the journal with the crate's default sizes.
    pub fn create_default(&self) -> UsnResult<()> {
        self.create(DEFAULT_JOURNAL_MAX_SIZE, DEFAULT_JOURNAL_ALLOCATION_DELTA)
    }

    /// Delete whichever journal instance is current at the time of the call.
    pub fn delete(&self, delete_now: bool, notify: bool) -> UsnResult<()> {
        delete(&self.device, delete_now, notify)
    }

    /// `delete(true, false)`
    pub fn delete_default(&self) -> UsnResult<()> {
        self.delete(true, false)
    }

    /// Read the journal with the given options.
    pub fn read(&self, options: ReadOptions) -> UsnResult<JournalReader<&D>> {
        JournalReader::new(&self.device, options)
    }

    /// Read every record from USN 0 without blocking.
    pub fn iter(&self) -> UsnResult<JournalReader<&D>> {
        self.read(ReadOptions::default())
    }

    /// Hand the device over to a reader that owns it.
    pub fn into_reader(self, options: ReadOptions) -> UsnResult<JournalReader<D>> {
        JournalReader::new(self.device, options)
    }
}

/// Query the USN journal state for a volume.
pub fn query<D: DeviceIoControl + ?Sized>(device: &D) -> UsnResult<JournalDescriptor> {
    let mut output = [0u8; JournalDescriptor::SIZE];

    // https://learn.microsoft.com/en-us/windows/win32/fileio/using-the-change-journal-identifier
    // To obtain the identifier of the current change journal on a specified volume,
    // use the FSCTL_QUERY_USN_JOURNAL control code.
    let bytes_read = device
        .device_io_control(ioctl::FSCTL_QUERY_USN_JOURNAL, &[], &mut output)
        .inspect_err(|err| warn!("Error querying USN journal: {}", err))?;

    let journal_data = JournalDescriptor::decode(&output[..bytes_read.min(output.len())])?;
    debug!("USN journal data: {:#?}", journal_data);
    Ok(journal_data)
}

/// Create or update the USN journal on a volume.
///
/// Sizes are passed through unchanged; the file system decides what it
/// accepts (e.g. zero selects its own defaults).
pub fn create<D: DeviceIoControl + ?Sized>(
    device: &D,
    max_size: u64,
    allocation_delta: u64,
) -> UsnResult<()> {
    let request = CreateJournalRequest {
        maximum_size: max_size,
        allocation_delta,
    };

    // https://learn.microsoft.com/en-us/windows/win32/api/winioctl/ni-winioctl-fsctl_create_usn_journal
    // Creates a change journal stream on a target volume, or modifies an existing one.
    device
        .device_io_control(ioctl::FSCTL_CREATE_USN_JOURNAL, &request.encode(), &mut [])
        .inspect_err(|err| warn!("Error creating USN journal: {}", err))?;

    debug!(
        "Created USN journal, max_size={}, allocation_delta={}",
        max_size, allocation_delta
    );

    Ok(())
}

/// Delete the current USN journal from a volume.
///
/// The journal id is queried first so the request targets one specific
/// journal instance; a failing query fails the delete.
pub fn delete<D: DeviceIoControl + ?Sized>(
    device: &D,
    delete_now: bool,
    notify: bool,
) -> UsnResult<()> {
    let journal_data = query(device)?;

    let mut delete_flags = 0;
    if delete_now {
        delete_flags |= ioctl::USN_DELETE_FLAG_DELETE;
    }
    if notify {
        delete_flags |= ioctl::USN_DELETE_FLAG_NOTIFY;
    }
    let request = DeleteJournalRequest {
        journal_id: journal_data.journal_id,
        delete_flags,
    };

    device
        .device_io_control(ioctl::FSCTL_DELETE_USN_JOURNAL, &request.encode(), &mut [])
        .inspect_err(|err| warn!("Error deleting USN journal: {}", err))?;

    debug!(
        "Deleted USN journal {:#x}, flags={:#x}",
        journal_data.journal_id, delete_flags
    );

    Ok(())
}

/// Where a [`JournalReader`] is in its refill/decode cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// The next record needs a fresh read from the device.
    AwaitingRefill,
    /// `buffer[offset..offset + remaining]` holds undecoded records.
    Buffered { offset: usize, remaining: usize },
    /// The journal had nothing at or beyond `start_usn`.
    Exhausted,
    /// A read or decode failed; the cursor must not be reused.
    Failed,
}

/// Lazily reads change records from one journal instance.
///
/// Each refill issues one bounded `FSCTL_READ_USN_JOURNAL` and resumes from the
/// USN the previous response reported, so records come out in ascending USN
/// order across refills. The reader ends (returns `None`) once the journal has
/// nothing further at the current USN; it does not pick up later writes. To
/// continue, build a new reader starting at [`next_usn`](Self::next_usn).
///
/// Errors end the iteration: the failing item is `Some(Err(_))`, and every
/// call after it returns `None`.
#[derive(Debug)]
pub struct JournalReader<D> {
    device: D,
    request: ReadJournalRequest,
    buffer: Vec<u8>,
    state: ReaderState,
}

impl<D: DeviceIoControl> JournalReader<D> {
    /// Resolve the current journal id and prepare a reader starting at
    /// `options.start_usn`.
    pub fn new(device: D, options: ReadOptions) -> UsnResult<Self> {
        let journal_data = query(&device)?;

        if let Some(expected) = options.expected_journal_id {
            if expected != journal_data.journal_id {
                warn!(
                    "USN journal id changed from {:#x} to {:#x}",
                    expected, journal_data.journal_id
                );
                return Err(UsnError::StaleJournalId {
                    expected,
                    actual: Some(journal_data.journal_id),
                });
            }
        }

        let buffer_size = options.buffer_size.max(size_of::<Usn>() + RECORD_V2_HEADER_SIZE);

        Ok(JournalReader {
            device,
            request: ReadJournalRequest {
                start_usn: options.start_usn,
                reason_mask: options.reason_mask,
                return_only_on_close: options.return_only_on_close,
                timeout: options.timeout,
                bytes_to_wait_for: options.bytes_to_wait_for,
                journal_id: journal_data.journal_id,
            },
            buffer: vec![0u8; buffer_size],
            state: ReaderState::AwaitingRefill,
        })
    }

    /// Id of the journal instance this reader is bound to.
    pub fn journal_id(&self) -> u64 {
        self.request.journal_id
    }

    /// The USN the next refill will start from.
    ///
    /// Once the reader is exhausted this is where a new reader should resume.
    pub fn next_usn(&self) -> Usn {
        self.request.start_usn
    }

    /// True once the journal reported nothing beyond [`next_usn`](Self::next_usn).
    pub fn is_exhausted(&self) -> bool {
        self.state == ReaderState::Exhausted
    }

    /// Issue one bounded read and move to the state its response implies.
    fn refill(&mut self) -> UsnResult<()> {
        let bytes_read = match self.device.device_io_control(
            ioctl::FSCTL_READ_USN_JOURNAL,
            &self.request.encode(),
            &mut self.buffer,
        ) {
            Ok(bytes_read) => bytes_read.min(self.buffer.len()),
            Err(err) => {
                warn!("Error reading USN data: {}", err);
                return Err(self.check_journal_identity().err().unwrap_or(err));
            }
        };

        // https://learn.microsoft.com/en-us/windows/win32/fileio/walking-a-buffer-of-change-journal-records
        // The USN returned as the first item in the output buffer is the USN of the next record number to be retrieved.
        // Use this value to continue reading records from the end boundary forward.
        let usn_size = size_of::<Usn>();
        let next_usn = self
            .buffer
            .get(..usn_size)
            .filter(|_| bytes_read >= usn_size)
            .map(LittleEndian::read_i64)
            .ok_or(DecodeError::Truncated {
                offset: 0,
                needed: usn_size,
                available: bytes_read,
            })?;

        if next_usn == self.request.start_usn {
            debug!("USN journal caught up at usn={}", next_usn);
            self.state = ReaderState::Exhausted;
            return Ok(());
        }

        debug!(
            "Read {} bytes of USN records, usn {} -> {}",
            bytes_read - usn_size,
            self.request.start_usn,
            next_usn
        );
        self.request.start_usn = next_usn;
        self.state = ReaderState::Buffered {
            offset: usn_size,
            remaining: bytes_read - usn_size,
        };
        Ok(())
    }

    /// After a failed read, tell a deleted or recreated journal apart from other failures.
    fn check_journal_identity(&self) -> UsnResult<()> {
        let expected = self.request.journal_id;
        match query(&self.device) {
            Ok(journal_data) if journal_data.journal_id == expected => Ok(()),
            Ok(journal_data) => Err(UsnError::StaleJournalId {
                expected,
                actual: Some(journal_data.journal_id),
            }),
            Err(err)
                if matches!(
                    err.code(),
                    Some(ioctl::ERROR_JOURNAL_NOT_ACTIVE | ioctl::ERROR_JOURNAL_DELETE_IN_PROGRESS)
                ) =>
            {
                Err(UsnError::StaleJournalId {
                    expected,
                    actual: None,
                })
            }
            // The read error is more useful than a second, unrelated failure.
            Err(_) => Ok(()),
        }
    }

    /// Decode the record at `offset` and advance past it.
    fn decode_next(&mut self, offset: usize, remaining: usize) -> UsnResult<ChangeRecord> {
        let end = offset + remaining;
        let (entry, next_offset) = record::decode_record_logged(&self.buffer[..end], offset)?;

        let remaining = end - next_offset;
        // The platform never splits a record across responses; anything too
        // short to be a header is padding.
        self.state = if remaining < RECORD_V2_HEADER_SIZE {
            ReaderState::AwaitingRefill
        } else {
            ReaderState::Buffered {
                offset: next_offset,
                remaining,
            }
        };

        Ok(entry)
    }

    fn find_next_entry(&mut self) -> UsnResult<Option<ChangeRecord>> {
        loop {
            let state = self.state;
            match state {
                ReaderState::Exhausted | ReaderState::Failed => return Ok(None),
                ReaderState::Buffered { offset, remaining } if remaining > 0 => {
                    return self.decode_next(offset, remaining).map(Some);
                }
                // A response can advance the USN without carrying records,
                // e.g. when the reason mask filtered all of them.
                ReaderState::Buffered { .. } | ReaderState::AwaitingRefill => self.refill()?,
            }
        }
    }
}

impl<D: DeviceIoControl> Iterator for JournalReader<D> {
    type Item = UsnResult<ChangeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.find_next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(err) => {
                self.state = ReaderState::Failed;
                Some(Err(err))
            }
        }
    }
}

impl<D: DeviceIoControl> std::iter::FusedIterator for JournalReader<D> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reason;
    use crate::tests::{FakeDevice, RecordBuilder, read_response};

    const JOURNAL_ID: u64 = 0x01DA_0000_0000_0042;

    fn descriptor(journal_id: u64, next_usn: Usn) -> JournalDescriptor {
        JournalDescriptor {
            journal_id,
            first_usn: 0,
            next_usn,
            lowest_valid_usn: 0,
            max_usn: i64::MAX,
            maximum_size: DEFAULT_JOURNAL_MAX_SIZE,
            allocation_delta: DEFAULT_JOURNAL_ALLOCATION_DELTA,
        }
    }

    fn records(usns: &[Usn]) -> Vec<Vec<u8>> {
        usns.iter()
            .map(|usn| RecordBuilder::new(*usn, &format!("file-{usn}.txt")).encode())
            .collect()
    }

    #[test]
    fn reads_all_records_then_ends() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 400));
        device.push_read(read_response(400, &records(&[0, 96, 200, 304])));
        device.push_read(read_response(400, &[]));

        let journal = ChangeJournal::new(device, r"\\.\X:");
        let mut reader = journal.iter().unwrap();
        assert_eq!(reader.journal_id(), JOURNAL_ID);

        let usns: Vec<Usn> = reader.by_ref().map(|r| r.unwrap().usn).collect();
        assert_eq!(usns, vec![0, 96, 200, 304]);
        assert!(reader.is_exhausted());
        assert_eq!(reader.next_usn(), 400);
        assert!(reader.next().is_none());

        let requests = journal.device().read_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].start_usn, 0);
        assert_eq!(requests[0].journal_id, JOURNAL_ID);
        assert_eq!(requests[0].reason_mask, USN_REASON_MASK_ALL);
        assert!(!requests[0].return_only_on_close);
        assert_eq!(requests[0].bytes_to_wait_for, 0);
        assert_eq!(requests[1].start_usn, 400);
    }

    #[test]
    fn unchanged_next_usn_ends_without_records() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 0));
        // Even if the buffer happened to carry bytes, an unchanged USN means nothing new.
        device.push_read(read_response(0, &records(&[0])));

        let mut reader = JournalReader::new(&device, ReadOptions::default()).unwrap();
        assert!(reader.next().is_none());
        assert!(reader.is_exhausted());
        assert_eq!(device.read_requests().len(), 1);
    }

    #[test]
    fn buffer_is_consumed_exactly() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 1000));
        let batch = records(&[100, 200, 300]);
        device.push_read(read_response(1000, &batch));
        device.push_read(read_response(1000, &[]));

        let mut reader = JournalReader::new(&device, ReadOptions::default().start_usn(100)).unwrap();
        let mut consumed = 0;
        for _ in 0..3 {
            let entry = reader.next().unwrap().unwrap();
            consumed += entry.record_length as usize;
        }
        assert_eq!(consumed, batch.iter().map(Vec::len).sum::<usize>());
        assert_eq!(reader.state, ReaderState::AwaitingRefill);
        assert!(reader.next().is_none());
    }

    #[test]
    fn refills_resume_from_reported_usn() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 900));
        device.push_read(read_response(300, &records(&[100, 200])));
        device.push_read(read_response(600, &records(&[300, 400, 500])));
        device.push_read(read_response(600, &[]));

        let reader = JournalReader::new(&device, ReadOptions::default().start_usn(100)).unwrap();
        let usns: Vec<Usn> = reader.map(|r| r.unwrap().usn).collect();
        assert_eq!(usns, vec![100, 200, 300, 400, 500]);
        assert!(usns.windows(2).all(|w| w[0] < w[1]));

        let starts: Vec<Usn> = device.read_requests().iter().map(|r| r.start_usn).collect();
        assert_eq!(starts, vec![100, 300, 600]);
    }

    #[test]
    fn resumed_reader_neither_repeats_nor_skips() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 600));
        device.push_read(read_response(300, &records(&[100, 200])));
        device.push_read(read_response(300, &[]));

        let mut first = JournalReader::new(&device, ReadOptions::default().start_usn(100)).unwrap();
        let seen: Vec<Usn> = first.by_ref().map(|r| r.unwrap().usn).collect();
        let resume_at = first.next_usn();
        assert_eq!(resume_at, 300);

        // New records were journaled after the first reader caught up.
        device.push_read(read_response(600, &records(&[300, 400, 500])));
        device.push_read(read_response(600, &[]));
        let second = JournalReader::new(
            &device,
            ReadOptions::default()
                .start_usn(resume_at)
                .expected_journal_id(first.journal_id()),
        )
        .unwrap();
        let more: Vec<Usn> = second.map(|r| r.unwrap().usn).collect();

        assert_eq!(seen, vec![100, 200]);
        assert_eq!(more, vec![300, 400, 500]);
    }

    #[test]
    fn empty_response_with_progress_refills_again() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 800));
        // Everything in [0, 500) was filtered out by the reason mask.
        device.push_read(read_response(500, &[]));
        device.push_read(read_response(800, &records(&[700])));
        device.push_read(read_response(800, &[]));

        let options = ReadOptions::default().reason_mask(reason::FILE_DELETE);
        let reader = JournalReader::new(&device, options).unwrap();
        let usns: Vec<Usn> = reader.map(|r| r.unwrap().usn).collect();
        assert_eq!(usns, vec![700]);

        let requests = device.read_requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.reason_mask == reason::FILE_DELETE));
    }

    #[test]
    fn options_reach_the_device() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 4096));
        device.push_read(read_response(4096, &[]));

        let options = ReadOptions::default()
            .start_usn(4096)
            .reason_mask(reason::CLOSE)
            .return_only_on_close(true)
            .timeout(10)
            .bytes_to_wait_for(1);
        let mut reader = JournalReader::new(&device, options).unwrap();
        assert!(reader.next().is_none());

        let request = device.read_requests()[0];
        assert_eq!(
            request,
            ReadJournalRequest {
                start_usn: 4096,
                reason_mask: reason::CLOSE,
                return_only_on_close: true,
                timeout: 10,
                bytes_to_wait_for: 1,
                journal_id: JOURNAL_ID,
            }
        );
    }

    #[test]
    fn trailing_padding_is_ignored() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 200));
        let mut response = read_response(200, &records(&[100]));
        response.extend_from_slice(&[0u8; 8]);
        device.push_read(response);
        device.push_read(read_response(200, &[]));

        let reader = JournalReader::new(&device, ReadOptions::default().start_usn(100)).unwrap();
        let usns: Vec<Usn> = reader.map(|r| r.unwrap().usn).collect();
        assert_eq!(usns, vec![100]);
    }

    #[test]
    fn decode_error_ends_iteration() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 300));
        let mut batch = records(&[100, 200]);
        // Corrupt the second record's length.
        batch[1][0..4].copy_from_slice(&0u32.to_le_bytes());
        device.push_read(read_response(300, &batch));

        let mut reader = JournalReader::new(&device, ReadOptions::default()).unwrap();
        assert_eq!(reader.next().unwrap().unwrap().usn, 100);
        match reader.next() {
            Some(Err(UsnError::DecodeError(DecodeError::ZeroLength { .. }))) => {}
            other => panic!("expected a decode error, got {other:?}"),
        }
        assert!(reader.next().is_none());
        assert_eq!(device.read_requests().len(), 1);
    }

    #[test]
    fn short_response_is_a_decode_error() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 0));
        device.push_read(vec![1, 2, 3]);

        let mut reader = JournalReader::new(&device, ReadOptions::default()).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(UsnError::DecodeError(DecodeError::Truncated { .. })))
        ));
    }

    #[test]
    fn read_failure_is_surfaced() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 0));
        device.push_read_error(ioctl::ERROR_JOURNAL_ENTRY_DELETED);

        let mut reader = JournalReader::new(&device, ReadOptions::default()).unwrap();
        match reader.next() {
            Some(Err(err)) => assert_eq!(err.code(), Some(ioctl::ERROR_JOURNAL_ENTRY_DELETED)),
            other => panic!("expected a device error, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn recreated_journal_is_reported_as_stale() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 0));
        let mut reader = JournalReader::new(&device, ReadOptions::default()).unwrap();

        // The journal is deleted and recreated under a new id before the first read.
        device.set_descriptor(Some(descriptor(JOURNAL_ID + 1, 0)));
        device.push_read_error(ioctl::ERROR_JOURNAL_ENTRY_DELETED);

        match reader.next() {
            Some(Err(UsnError::StaleJournalId { expected, actual })) => {
                assert_eq!(expected, JOURNAL_ID);
                assert_eq!(actual, Some(JOURNAL_ID + 1));
            }
            other => panic!("expected a stale journal id, got {other:?}"),
        }
    }

    #[test]
    fn deleted_journal_is_reported_as_stale() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 0));
        let mut reader = JournalReader::new(&device, ReadOptions::default()).unwrap();

        device.set_descriptor(None);
        device.push_read_error(ioctl::ERROR_JOURNAL_DELETE_IN_PROGRESS);

        assert!(matches!(
            reader.next(),
            Some(Err(UsnError::StaleJournalId { actual: None, .. }))
        ));
    }

    #[test]
    fn expected_journal_id_mismatch_fails_construction() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 0));
        let result =
            JournalReader::new(&device, ReadOptions::default().expected_journal_id(JOURNAL_ID - 1));
        assert!(matches!(
            result,
            Err(UsnError::StaleJournalId {
                expected,
                actual: Some(JOURNAL_ID)
            }) if expected == JOURNAL_ID - 1
        ));
        assert!(device.read_requests().is_empty());
    }

    #[test]
    fn reader_construction_fails_without_journal() {
        let device = FakeDevice::without_journal();
        let err = JournalReader::new(&device, ReadOptions::default()).unwrap_err();
        assert_eq!(err.code(), Some(ioctl::ERROR_JOURNAL_NOT_ACTIVE));
    }

    #[test]
    fn query_decodes_descriptor() {
        let expected = descriptor(JOURNAL_ID, 12345);
        let journal = ChangeJournal::new(FakeDevice::new(expected), "X:");
        assert_eq!(journal.query().unwrap(), expected);
        assert_eq!(journal.volume_name(), "X:");
    }

    #[test]
    fn create_sends_sizes() {
        let journal = ChangeJournal::new(FakeDevice::without_journal(), "X:");
        journal.create(1 << 20, 1 << 16).unwrap();
        journal.create_default().unwrap();

        assert_eq!(
            journal.device().create_requests(),
            vec![
                CreateJournalRequest {
                    maximum_size: 1 << 20,
                    allocation_delta: 1 << 16,
                },
                CreateJournalRequest {
                    maximum_size: DEFAULT_JOURNAL_MAX_SIZE,
                    allocation_delta: DEFAULT_JOURNAL_ALLOCATION_DELTA,
                },
            ]
        );
    }

    #[test]
    fn query_or_create_creates_missing_journal() {
        let journal = ChangeJournal::new(FakeDevice::without_journal(), "X:");
        let journal_data = journal
            .query_or_create(DEFAULT_JOURNAL_MAX_SIZE, DEFAULT_JOURNAL_ALLOCATION_DELTA)
            .unwrap();
        assert_eq!(journal_data.maximum_size, DEFAULT_JOURNAL_MAX_SIZE);
        assert_eq!(journal.device().create_requests().len(), 1);
    }

    #[test]
    fn delete_targets_current_journal_id() {
        let journal = ChangeJournal::new(FakeDevice::new(descriptor(JOURNAL_ID, 0)), "X:");
        journal.delete_default().unwrap();
        journal.delete(false, true).unwrap_err();

        let deletes = journal.device().delete_requests();
        assert_eq!(
            deletes[0],
            DeleteJournalRequest {
                journal_id: JOURNAL_ID,
                delete_flags: ioctl::USN_DELETE_FLAG_DELETE,
            }
        );
        // The first delete removed the journal, so the second one's query failed.
        assert_eq!(deletes.len(), 1);
    }

    #[test]
    fn delete_flags_follow_arguments() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 0));
        device.keep_journal_on_delete();
        delete(&device, true, true).unwrap();
        delete(&device, false, true).unwrap();
        delete(&device, false, false).unwrap();

        let flags: Vec<u32> = device.delete_requests().iter().map(|r| r.delete_flags).collect();
        assert_eq!(
            flags,
            vec![
                ioctl::USN_DELETE_FLAG_DELETE | ioctl::USN_DELETE_FLAG_NOTIFY,
                ioctl::USN_DELETE_FLAG_NOTIFY,
                0,
            ]
        );
    }

    #[test]
    fn delete_without_journal_fails() {
        let journal = ChangeJournal::new(FakeDevice::without_journal(), "X:");
        let err = journal.delete_default().unwrap_err();
        assert!(matches!(
            err,
            UsnError::DeviceControlError {
                operation: "FSCTL_QUERY_USN_JOURNAL",
                code: ioctl::ERROR_JOURNAL_NOT_ACTIVE
            }
        ));
        assert!(journal.device().delete_requests().is_empty());
    }

    #[test]
    fn owned_reader_from_journal() {
        let device = FakeDevice::new(descriptor(JOURNAL_ID, 100));
        device.push_read(read_response(100, &records(&[0])));
        device.push_read(read_response(100, &[]));

        let reader = ChangeJournal::new(device, "X:")
            .into_reader(ReadOptions::default())
            .unwrap();
        assert_eq!(reader.count(), 1);
    }
}
