//! Atomic file writes for workbook snapshots and exported documents.
//!
//! Content goes to a temp file in the destination directory, is flushed and synced, then
//! renamed into place, so readers never observe a half-written workbook or PDF.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` returns `Some("")` for bare relative names like `out.pdf`.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Write `dest` atomically, creating missing parent directories.
///
/// If `write_fn` fails the destination is left untouched and the temp file is removed.
pub fn atomic_write<E>(
    dest: &Path,
    write_fn: impl FnOnce(&mut BufWriter<&mut File>) -> Result<(), E>,
) -> Result<(), E>
where
    E: From<io::Error>,
{
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write_fn(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|err| E::from(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HostError;

    #[test]
    fn failed_writer_leaves_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("book.json");
        fs::write(&dest, b"old").unwrap();

        let result = atomic_write(&dest, |_w| -> Result<(), HostError> {
            Err(HostError::Pdf("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a").join("b").join("out.pdf");
        atomic_write(&dest, |w| w.write_all(b"%PDF")).unwrap();
        assert_eq!(fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
        assert_eq!(fs::read(&dest).unwrap(), b"%PDF");
    }
}
