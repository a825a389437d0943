use std::fs;
use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use personpath_fetch::atomic::{copy_atomically, produce_atomically};
use personpath_fetch::domain::{Source, Uid};
use personpath_fetch::error::DatasetError;
use personpath_fetch::media::{ConvertOptions, CropWindow, MediaTool};
use personpath_fetch::store::Store;

/// Probes succeed only for files starting with `video`.
struct PrefixProbe;

impl MediaTool for PrefixProbe {
    fn probe_fps(&self, path: &Path) -> Result<f64, DatasetError> {
        match fs::read(path) {
            Ok(bytes) if bytes.starts_with(b"video") => Ok(25.0),
            _ => Err(DatasetError::Probe {
                path: path.to_path_buf(),
                message: "invalid data found when processing input".to_string(),
            }),
        }
    }

    fn convert(&self, _: &Path, _: &Path, _: &ConvertOptions) -> Result<(), DatasetError> {
        unimplemented!()
    }

    fn crop(&self, _: &Path, _: &Path, _: &CropWindow) -> Result<(), DatasetError> {
        unimplemented!()
    }

    fn assemble_images(&self, _: &[PathBuf], _: f64, _: &Path) -> Result<(), DatasetError> {
        unimplemented!()
    }
}

fn temp_store() -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("personpath22")).unwrap();
    (temp, Store::new(root))
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn install_refuses_unprobeable_staged_file() {
    let (_temp, store) = temp_store();
    let staging = store.ensure_staging_dir(Source::Virat).unwrap();
    let staged = staging.join("VIRAT_S_000001.mp4");
    fs::write(staged.as_std_path(), b"<html>").unwrap();

    assert_matches!(
        store.install(&PrefixProbe, staged.as_std_path(), Uid::new(3)),
        Err(DatasetError::Probe { .. })
    );
    assert!(!store.canonical_path(Uid::new(3)).exists());
    assert!(!store.is_installed(&PrefixProbe, Uid::new(3)));
}

#[test]
fn install_copies_and_keeps_staged_file() {
    let (_temp, store) = temp_store();
    let staging = store.ensure_staging_dir(Source::Virat).unwrap();
    let staged = staging.join("VIRAT_S_000001.mp4");
    fs::write(staged.as_std_path(), b"video-bytes").unwrap();

    let target = store
        .install(&PrefixProbe, staged.as_std_path(), Uid::new(3))
        .unwrap();
    assert_eq!(target, store.canonical_path(Uid::new(3)));
    assert_eq!(fs::read(target.as_std_path()).unwrap(), b"video-bytes");
    assert!(staged.exists());
    assert!(store.is_installed(&PrefixProbe, Uid::new(3)));
    assert_eq!(
        dir_entries(store.videos_root().as_std_path()),
        vec!["uid_vid_00003.mp4".to_string(), "virat".to_string()]
    );
}

#[test]
fn garbage_canonical_file_is_not_installed() {
    let (_temp, store) = temp_store();
    fs::create_dir_all(store.videos_root().as_std_path()).unwrap();
    fs::write(store.canonical_path(Uid::new(8)).as_std_path(), b"").unwrap();
    assert!(!store.is_installed(&PrefixProbe, Uid::new(8)));
}

#[test]
fn interrupted_producer_leaves_no_partial_output() {
    let temp = tempfile::tempdir().unwrap();
    let target = temp.path().join("nested").join("clip.mp4");

    let result: Result<(), DatasetError> = produce_atomically(&target, |scratch| {
        fs::write(scratch, b"half a video").unwrap();
        Err(DatasetError::Transform {
            tool: "ffmpeg".to_string(),
            message: "killed".to_string(),
        })
    });

    assert_matches!(result, Err(DatasetError::Transform { .. }));
    assert!(!target.exists());
    assert!(dir_entries(&temp.path().join("nested")).is_empty());
}

#[test]
fn copy_replaces_existing_target() {
    let temp = tempfile::tempdir().unwrap();
    let source = temp.path().join("source.mp4");
    let target = temp.path().join("target.mp4");
    fs::write(&source, b"new").unwrap();
    fs::write(&target, b"old").unwrap();

    assert_eq!(copy_atomically(&source, &target).unwrap(), 3);
    assert_eq!(fs::read(&target).unwrap(), b"new");
    assert_eq!(
        dir_entries(temp.path()),
        vec!["source.mp4".to_string(), "target.mp4".to_string()]
    );
}
