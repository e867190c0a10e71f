#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use usn_change_journal::{ChangeJournal, ReadOptions, reason, worker};

    let drive_letter = 'C';

    let (handle, records) = worker::spawn_reader(move || {
        let journal = ChangeJournal::from_drive_letter(drive_letter)?;
        let next_usn = journal.query()?.next_usn;
        let options = ReadOptions::default()
            .start_usn(next_usn)
            .reason_mask(reason::CLOSE | reason::FILE_DELETE | reason::RENAME_NEW_NAME)
            .return_only_on_close(true)
            .bytes_to_wait_for(1);
        journal.into_reader(options)
    });

    for entry in records {
        println!("{}", entry?);
    }

    handle
        .join()
        .map_err(|_| anyhow::anyhow!("journal reader thread panicked"))?;
    Ok(())
}

#[cfg(not(windows))]
fn main() {
    eprintln!("The USN change journal is only available on Windows.");
}
