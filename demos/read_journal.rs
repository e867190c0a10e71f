#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use usn_change_journal::ChangeJournal;

    let journal = ChangeJournal::open(r"\\.\C:")?;

    for entry in journal.iter()? {
        let entry = entry?;
        println!(
            "usn={:?}, file_id={:#x}, name={:?}",
            entry.usn, entry.file_reference_number, entry.file_name
        );
    }

    Ok(())
}

#[cfg(not(windows))]
fn main() {
    eprintln!("The USN change journal is only available on Windows.");
}
