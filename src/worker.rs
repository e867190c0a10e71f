//! Running a journal reader on its own thread.
//!
//! A read with `bytes_to_wait_for` set blocks inside the device call until new
//! records arrive. Callers that cannot afford to block run the reader here and
//! consume records from the channel instead.

use std::sync::mpsc::{Receiver, channel};
use std::thread::{self, JoinHandle};

use log::debug;

use crate::{UsnResult, ioctl::DeviceIoControl, journal::JournalReader, record::ChangeRecord};

/// Spawn a thread that builds a reader with `open` and forwards every item it
/// yields over a channel.
///
/// The device is opened on the worker thread, so it does not need to be
/// `Send`. The worker stops after the reader ends or fails, or once the
/// receiver is dropped and the in-flight read returns. A failure in `open`
/// arrives as the only item on the channel.
pub fn spawn_reader<D, F>(open: F) -> (JoinHandle<()>, Receiver<UsnResult<ChangeRecord>>)
where
    D: DeviceIoControl,
    F: FnOnce() -> UsnResult<JournalReader<D>> + Send + 'static,
{
    let (tx, rx) = channel::<UsnResult<ChangeRecord>>();
    let handle = thread::spawn(move || {
        let reader = match open() {
            Ok(reader) => reader,
            Err(err) => {
                let _ = tx.send(Err(err));
                return;
            }
        };

        for item in reader {
            if tx.send(item).is_err() {
                debug!("Journal record receiver dropped, stopping reader");
                return;
            }
        }
    });

    (handle, rx)
}
