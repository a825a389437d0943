use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use regex::Regex;
use tracing::{info, warn};

use crate::config::{Endpoints, SequenceRequest};
use crate::domain::{Source, Uid};
use crate::error::DatasetError;
use crate::fetch::Downloader;
use crate::fs_util::{extract_zip, validate_zip};
use crate::media::MediaTool;
use crate::providers::Acquirer;
use crate::store::Store;

const ARCHIVE_NAME: &str = "pathtrack.zip";
const RELEASE_DIR: &str = "pathtrack_release";
/// Searched in order.
const SPLITS: [&str; 2] = ["train", "test"];
const FRAMES_DIR: &str = "img1";
const FRAME_EXT: &str = "jpg";
const INFO_FILE: &str = "info.xml";

/// Research archive shipped as one large zip of image sequences. The archive
/// is fetched and extracted once; each sequence is assembled from its frames.
pub struct PathtrackAcquirer<'a> {
    store: &'a Store,
    media: &'a dyn MediaTool,
    http: &'a dyn Downloader,
    requests: &'a [SequenceRequest],
    endpoints: &'a Endpoints,
}

impl<'a> PathtrackAcquirer<'a> {
    pub fn new(
        store: &'a Store,
        media: &'a dyn MediaTool,
        http: &'a dyn Downloader,
        requests: &'a [SequenceRequest],
        endpoints: &'a Endpoints,
    ) -> Self {
        Self {
            store,
            media,
            http,
            requests,
            endpoints,
        }
    }

    fn release_dir(&self) -> Utf8PathBuf {
        self.store.staging_dir(Source::Pathtrack).join(RELEASE_DIR)
    }

    /// Makes sure the extracted release exists, downloading the archive only
    /// if it is missing or fails the integrity test.
    fn ensure_release(&self) -> Result<(), DatasetError> {
        let staging = self.store.ensure_staging_dir(Source::Pathtrack)?;
        let release = self.release_dir();
        if release.as_std_path().exists() {
            return Ok(());
        }

        let archive = staging.join(ARCHIVE_NAME);
        let reusable = archive.as_std_path().exists()
            && match validate_zip(archive.as_std_path()) {
                Ok(()) => true,
                Err(err) => {
                    warn!(%archive, error = %err, "cached archive is damaged, downloading again");
                    false
                }
            };

        if !reusable {
            info!(%archive, "downloading research archive (over 30GB, this can take hours)");
            self.http
                .download(&self.endpoints.pathtrack_archive, archive.as_std_path())?;
            validate_zip(archive.as_std_path()).map_err(|err| {
                DatasetError::ArchiveIntegrity(format!(
                    "freshly downloaded {archive} is damaged: {err}"
                ))
            })?;
        }

        info!(%archive, "extracting");
        let scratch = tempfile::Builder::new()
            .prefix(".personpath-extract")
            .tempdir_in(staging.as_std_path())
            .map_err(DatasetError::fs)?;
        extract_zip(archive.as_std_path(), scratch.path())?;
        let extracted = scratch.path().join(RELEASE_DIR);
        if !extracted.is_dir() {
            return Err(DatasetError::ArchiveIntegrity(format!(
                "{archive} has no {RELEASE_DIR} folder"
            )));
        }
        fs::rename(&extracted, release.as_std_path()).map_err(DatasetError::fs)?;
        Ok(())
    }
}

impl Acquirer for PathtrackAcquirer<'_> {
    fn source(&self) -> Source {
        Source::Pathtrack
    }

    fn entries(&self) -> Vec<(String, Uid)> {
        self.requests
            .iter()
            .map(|req| (req.sequence.clone(), req.uid))
            .collect()
    }

    fn prepare(&self) -> Result<(), DatasetError> {
        self.ensure_release()
    }

    fn acquire(&self, source_id: &str, uid: Uid) -> Result<(), DatasetError> {
        let sequence_dir = locate_sequence(self.release_dir().as_std_path(), source_id)?;
        let video = sequence_dir.join(format!("{source_id}.mp4"));

        if !video.exists() {
            let fps = read_sequence_fps(&sequence_dir.join(INFO_FILE))?;
            let frames = list_frames(&sequence_dir.join(FRAMES_DIR))?;
            info!(sequence = source_id, frames = frames.len(), fps, "assembling video");
            self.media.assemble_images(&frames, fps, &video)?;
        }

        self.store.install(self.media, &video, uid)?;
        Ok(())
    }
}

pub fn locate_sequence(release: &Path, sequence: &str) -> Result<PathBuf, DatasetError> {
    SPLITS
        .iter()
        .map(|split| release.join(split).join(sequence))
        .find(|dir| dir.is_dir())
        .ok_or_else(|| {
            DatasetError::MissingAsset(format!(
                "sequence {sequence} in neither split of {}",
                release.display()
            ))
        })
}

/// Reads `<doc><fps>` from a sequence's info file.
pub fn read_sequence_fps(info_path: &Path) -> Result<f64, DatasetError> {
    let content = fs::read_to_string(info_path)
        .map_err(|err| DatasetError::Metadata(format!("{}: {err}", info_path.display())))?;
    let re = Regex::new(r"(?s)<doc\b[^>]*>.*?<fps>\s*([^<]*?)\s*</fps>")
        .map_err(|err| DatasetError::Metadata(err.to_string()))?;
    let raw = re
        .captures(&content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            DatasetError::Metadata(format!("{}: no <doc><fps> element", info_path.display()))
        })?;
    raw.parse::<f64>()
        .ok()
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .ok_or_else(|| {
            DatasetError::Metadata(format!("{}: bad fps `{raw}`", info_path.display()))
        })
}

/// Frame files sorted by name; the numbering is the playback order.
pub fn list_frames(frames_dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let entries = fs::read_dir(frames_dir).map_err(|err| {
        DatasetError::MissingAsset(format!("{}: {err}", frames_dir.display()))
    })?;
    let mut frames = Vec::new();
    for entry in entries {
        let path = entry.map_err(DatasetError::fs)?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == FRAME_EXT);
        if is_frame && path.is_file() {
            frames.push(path);
        }
    }
    frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(frames)
}
