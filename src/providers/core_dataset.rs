use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use serde::Serialize;
use tracing::info;

use crate::error::DatasetError;
use crate::fetch::ObjectStore;
use crate::fs_util::extract_zip;
use crate::store::Store;

/// Files published under the dataset's own prefix, relative to the dataset root.
pub const CORE_FILES: [&str; 4] = [
    "annotation/anno_amodal.zip",
    "annotation/anno_visible.zip",
    "annotation/splits.json",
    "raw_data/videos.zip",
];

const EXTRACT_PREFIX: &str = ".personpath-extract";

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoreReport {
    pub fetched: Vec<String>,
    pub present: Vec<String>,
    /// Archives unpacked during this run.
    pub extracted: Vec<String>,
}

/// Copies any missing core file and unpacks each archive next to itself.
/// An archive counts as unpacked only once its marker file exists, so an
/// interrupted extraction is redone on the next run.
pub fn sync_core_dataset(
    store: &Store,
    objects: &dyn ObjectStore,
    prefix: &str,
) -> Result<CoreReport, DatasetError> {
    let mut report = CoreReport::default();
    for subpath in CORE_FILES {
        let path = store.dataset_root().join(subpath);
        if path.as_std_path().exists() {
            report.present.push(subpath.to_string());
        } else {
            let uri = format!("{}/{subpath}", prefix.trim_end_matches('/'));
            objects.copy_unsigned(&uri, path.as_std_path())?;
            report.fetched.push(subpath.to_string());
        }

        if path.extension() == Some("zip") && !extraction_marker(&path)?.exists() {
            info!(%path, "extracting");
            extract_beside(&path)?;
            report.extracted.push(subpath.to_string());
        }
    }
    Ok(report)
}

fn extraction_marker(archive: &Utf8Path) -> Result<PathBuf, DatasetError> {
    let (parent, name) = archive
        .parent()
        .zip(archive.file_name())
        .ok_or_else(|| DatasetError::Filesystem(format!("no parent for {archive}")))?;
    Ok(parent.as_std_path().join(format!(".{name}.extracted")))
}

/// Unpacks into a scratch directory next to the archive and moves each
/// top-level member into place once the whole archive has been written.
fn extract_beside(archive: &Utf8Path) -> Result<(), DatasetError> {
    let parent = archive
        .parent()
        .ok_or_else(|| DatasetError::Filesystem(format!("no parent for {archive}")))?
        .as_std_path();
    let scratch = tempfile::Builder::new()
        .prefix(EXTRACT_PREFIX)
        .tempdir_in(parent)
        .map_err(DatasetError::fs)?;
    extract_zip(archive.as_std_path(), scratch.path())?;

    for entry in fs::read_dir(scratch.path()).map_err(DatasetError::fs)? {
        let entry = entry.map_err(DatasetError::fs)?;
        install_member(&entry.path(), &parent.join(entry.file_name()))?;
    }
    fs::write(extraction_marker(archive)?, b"").map_err(DatasetError::fs)?;
    Ok(())
}

fn install_member(from: &Path, to: &Path) -> Result<(), DatasetError> {
    // A directory left by an earlier interrupted run cannot be renamed over.
    if to.is_dir() {
        fs::remove_dir_all(to).map_err(DatasetError::fs)?;
    }
    fs::rename(from, to).map_err(|err| {
        DatasetError::Filesystem(format!(
            "install {} -> {}: {err}",
            from.display(),
            to.display()
        ))
    })
}
