use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::atomic::copy_atomically;
use crate::domain::{Source, Uid};
use crate::error::DatasetError;
use crate::media::MediaTool;

/// On-disk layout of the dataset.
///
/// ```text
/// <root>/annotation/...          core annotations
/// <root>/raw_data/uid_vid_*.mp4  canonical collection
/// <root>/raw_data/<source>/      per-source staging cache
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    dataset_root: Utf8PathBuf,
    videos_root: Utf8PathBuf,
}

impl Store {
    pub fn new(dataset_root: Utf8PathBuf) -> Self {
        let videos_root = dataset_root.join("raw_data");
        Self {
            dataset_root,
            videos_root,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let root = Utf8PathBuf::from_path_buf(path.to_path_buf())
            .map_err(|_| DatasetError::Filesystem("non-utf8 dataset root".to_string()))?;
        Ok(Self::new(root))
    }

    pub fn dataset_root(&self) -> &Utf8Path {
        &self.dataset_root
    }

    pub fn videos_root(&self) -> &Utf8Path {
        &self.videos_root
    }

    pub fn canonical_path(&self, uid: Uid) -> Utf8PathBuf {
        self.videos_root.join(uid.file_name())
    }

    pub fn staging_dir(&self, source: Source) -> Utf8PathBuf {
        self.videos_root.join(source.staging_name())
    }

    pub fn ensure_staging_dir(&self, source: Source) -> Result<Utf8PathBuf, DatasetError> {
        let dir = self.staging_dir(source);
        fs::create_dir_all(dir.as_std_path()).map_err(DatasetError::fs)?;
        Ok(dir)
    }

    /// A canonical file counts as present only if it probes.
    pub fn is_installed(&self, media: &dyn MediaTool, uid: Uid) -> bool {
        let path = self.canonical_path(uid);
        if !path.as_std_path().exists() {
            return false;
        }
        match media.probe_fps(path.as_std_path()) {
            Ok(_) => true,
            Err(err) => {
                debug!(%uid, error = %err, "canonical file does not probe");
                false
            }
        }
    }

    /// Copies a staged file into the collection once it probes.
    pub fn install(
        &self,
        media: &dyn MediaTool,
        staged: &Path,
        uid: Uid,
    ) -> Result<Utf8PathBuf, DatasetError> {
        media.probe_fps(staged)?;
        let target = self.canonical_path(uid);
        copy_atomically(staged, target.as_std_path())?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = Store::new(Utf8PathBuf::from("/data/personpath22"));
        assert_eq!(
            store.canonical_path(Uid::new(7)),
            Utf8PathBuf::from("/data/personpath22/raw_data/uid_vid_00007.mp4")
        );
        assert!(store.staging_dir(Source::Meva).ends_with("raw_data/meva"));
        assert!(store.staging_dir(Source::Pathtrack).ends_with("raw_data/pathtrack"));
    }
}
