use std::fs;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::error::DatasetError;

fn open_archive(zip_path: &Path) -> Result<ZipArchive<fs::File>, DatasetError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        DatasetError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    ZipArchive::new(file)
        .map_err(|err| DatasetError::ArchiveIntegrity(format!("{}: {err}", zip_path.display())))
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), DatasetError> {
    let mut archive = open_archive(zip_path)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| DatasetError::ArchiveIntegrity(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(DatasetError::ArchiveIntegrity(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path).map_err(DatasetError::fs)?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(DatasetError::fs)?;
        }
        let mut outfile = fs::File::create(&entry_path).map_err(DatasetError::fs)?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| DatasetError::ArchiveIntegrity(err.to_string()))?;
    }
    Ok(())
}

/// Reads the central directory and every member's checksum without writing
/// anything to disk.
pub fn validate_zip(zip_path: &Path) -> Result<(), DatasetError> {
    let mut archive = open_archive(zip_path)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| DatasetError::ArchiveIntegrity(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| DatasetError::ArchiveIntegrity(format!("{name}: {err}")))?;
    }
    Ok(())
}
