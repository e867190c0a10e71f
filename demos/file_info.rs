#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: file_info <path>"))?;

    let entry = usn_change_journal::file_info(&path)?;
    println!("{}", entry);
    println!("attributes={:#x}, is_dir={}", entry.file_attributes, entry.is_dir());

    Ok(())
}

#[cfg(not(windows))]
fn main() {
    eprintln!("The USN change journal is only available on Windows.");
}
