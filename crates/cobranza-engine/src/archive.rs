use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use cobranza_host::atomic_write;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::assemble::GeneratedDocument;
use crate::Result;

/// Archive name offered for a source workbook: `PDFS_<stem>.zip`.
pub fn archive_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("export");
    format!("PDFS_{stem}.zip")
}

/// Write every document into a deflate zip at `dest`, one entry per file name.
///
/// A file name seen twice is stored once.
pub fn package_zip(documents: &[GeneratedDocument], dest: &Path) -> Result<PathBuf> {
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    let mut names = HashSet::new();

    atomic_write(dest, |w| -> Result<()> {
        let mut writer = ZipWriter::new(w);
        for doc in documents {
            let Some(name) = doc.path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !names.insert(name.to_string()) {
                log::debug!("[zip] duplicate entry {name}; keeping the first");
                continue;
            }
            let mut file = BufReader::new(File::open(&doc.path)?);
            writer.start_file(name, options)?;
            io::copy(&mut file, &mut writer)?;
        }
        writer.finish()?;
        Ok(())
    })?;

    log::info!("[zip] packaged {} documents into {}", names.len(), dest.display());
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::DocumentId;
    use crate::Error;
    use std::fs;
    use std::io::Read;

    #[test]
    fn packages_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("COBRANZA_SUR.pdf");
        fs::write(&a, b"%PDF-a").unwrap();
        let doc = |path: &Path| GeneratedDocument {
            id: DocumentId::FullSheet("SUR".to_string()),
            path: path.to_path_buf(),
            name: "SUR".to_string(),
            sequence: None,
        };

        let dest = dir.path().join(archive_name(Path::new("/data/ruta 15-03-24.xls")));
        package_zip(&[doc(&a), doc(&a)], &dest).unwrap();
        assert!(dest.ends_with("PDFS_ruta 15-03-24.zip"));

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let mut body = String::new();
        archive.by_name("COBRANZA_SUR.pdf").unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "%PDF-a");
    }

    #[test]
    fn missing_document_leaves_no_partial_archive() {
        let dir = tempfile::tempdir().unwrap();
        let doc = GeneratedDocument {
            id: DocumentId::Consolidated,
            path: dir.path().join("missing.pdf"),
            name: "CONSOLIDADO".to_string(),
            sequence: None,
        };
        let dest = dir.path().join("zips").join("PDFS_ruta.zip");

        let err = package_zip(&[doc], &dest).unwrap_err();
        assert!(matches!(err, Error::Io(_)), "{err}");
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(dest.parent().unwrap()).unwrap().count(), 0);
    }
}
