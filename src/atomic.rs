use std::fs;
use std::path::Path;

use tempfile::Builder;

use crate::error::DatasetError;

const SCRATCH_PREFIX: &str = ".personpath-scratch";

/// Runs `produce` against a scratch path carrying the target's file name and
/// moves the result to `target` if, and only if, `produce` succeeds.
///
/// The scratch directory is created in the target's parent so the final move
/// is a same-filesystem rename. The scratch directory is removed when its
/// guard drops, on every exit path.
pub fn produce_atomically<T, F>(target: &Path, produce: F) -> Result<T, DatasetError>
where
    F: FnOnce(&Path) -> Result<T, DatasetError>,
{
    let parent = target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = target.file_name().ok_or_else(|| {
        DatasetError::Filesystem(format!("invalid output path: {}", target.display()))
    })?;
    fs::create_dir_all(parent).map_err(DatasetError::fs)?;

    let scratch = Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(parent)
        .map_err(DatasetError::fs)?;
    let scratch_path = scratch.path().join(file_name);

    let value = produce(&scratch_path)?;

    fs::rename(&scratch_path, target).map_err(|err| {
        DatasetError::Filesystem(format!(
            "install {} -> {}: {err}",
            scratch_path.display(),
            target.display()
        ))
    })?;
    Ok(value)
}

/// Copies `source` to `target` through a scratch file.
pub fn copy_atomically(source: &Path, target: &Path) -> Result<u64, DatasetError> {
    produce_atomically(target, |scratch| {
        fs::copy(source, scratch).map_err(|err| {
            DatasetError::Filesystem(format!("copy {}: {err}", source.display()))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_producer_leaves_target_absent() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("out.mp4");

        let result: Result<(), _> = produce_atomically(&target, |scratch| {
            fs::write(scratch, b"half").unwrap();
            Err(DatasetError::Transform {
                tool: "ffmpeg".to_string(),
                message: "boom".to_string(),
            })
        });

        assert!(result.is_err());
        assert!(!target.exists());
        let leftovers = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn failing_producer_keeps_previous_target() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("out.mp4");
        fs::write(&target, b"previous").unwrap();

        let _ = produce_atomically(&target, |scratch| {
            fs::write(scratch, b"new but broken").unwrap();
            Err::<(), _>(DatasetError::Fetch("reset".to_string()))
        });

        assert_eq!(fs::read(&target).unwrap(), b"previous");
    }

    #[test]
    fn successful_producer_installs_target() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("nested").join("out.mp4");

        let len = produce_atomically(&target, |scratch| {
            assert_eq!(scratch.file_name(), target.file_name());
            assert_ne!(scratch.parent(), target.parent());
            fs::write(scratch, b"complete").map_err(DatasetError::fs)?;
            Ok(8)
        })
        .unwrap();

        assert_eq!(len, 8);
        assert_eq!(fs::read(&target).unwrap(), b"complete");
        let entries = fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn producer_without_output_fails_install() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("out.mp4");

        let result = produce_atomically(&target, |_| Ok(()));

        assert!(matches!(result, Err(DatasetError::Filesystem(_))));
        assert!(!target.exists());
    }
}
