use tracing::info;

use crate::config::{CloudRequest, Endpoints};
use crate::domain::{CloudClipId, Source, Uid};
use crate::error::DatasetError;
use crate::fetch::ObjectStore;
use crate::media::{ConvertOptions, CropWindow, MediaTool};
use crate::providers::Acquirer;
use crate::store::Store;

/// Frame rate the published clips were cut at.
pub const CLIP_FPS: f64 = 15.0;

/// Clip boundaries are already end-inclusive.
pub fn clip_window(clip: &CloudClipId) -> CropWindow {
    CropWindow::new(clip.start_ms(), clip.end_ms())
        .with_end_pad(0)
        .with_fps(CLIP_FPS)
}

/// Surveillance clips cut from longer recordings in a public object store.
/// A recording is fetched and remuxed once, then cropped per clip.
pub struct MevaAcquirer<'a> {
    store: &'a Store,
    media: &'a dyn MediaTool,
    objects: &'a dyn ObjectStore,
    requests: &'a [CloudRequest],
    endpoints: &'a Endpoints,
}

impl<'a> MevaAcquirer<'a> {
    pub fn new(
        store: &'a Store,
        media: &'a dyn MediaTool,
        objects: &'a dyn ObjectStore,
        requests: &'a [CloudRequest],
        endpoints: &'a Endpoints,
    ) -> Self {
        Self {
            store,
            media,
            objects,
            requests,
            endpoints,
        }
    }
}

impl Acquirer for MevaAcquirer<'_> {
    fn source(&self) -> Source {
        Source::Meva
    }

    fn entries(&self) -> Vec<(String, Uid)> {
        self.requests
            .iter()
            .map(|req| (req.clip.as_str().to_string(), req.uid))
            .collect()
    }

    fn prepare(&self) -> Result<(), DatasetError> {
        self.store.ensure_staging_dir(Source::Meva).map(|_| ())
    }

    fn acquire(&self, source_id: &str, uid: Uid) -> Result<(), DatasetError> {
        let clip: CloudClipId = source_id.parse()?;
        let staging = self.store.staging_dir(Source::Meva);

        let raw = staging.join(clip.remote_file_name());
        if !raw.as_std_path().exists() {
            let uri = clip.object_uri(&self.endpoints.meva_prefix);
            self.objects.copy_unsigned(&uri, raw.as_std_path())?;
        }

        // Cropping the raw container directly loses time at the clip edges.
        let remuxed = raw.with_extension("mp4");
        if !remuxed.as_std_path().exists() {
            info!(%raw, "remuxing to mp4");
            self.media.convert(
                raw.as_std_path(),
                remuxed.as_std_path(),
                &ConvertOptions::stream_copy(),
            )?;
        }

        let cropped = staging.join(clip.as_str());
        if !cropped.as_std_path().exists() {
            info!(%remuxed, %cropped, "cropping");
            self.media.crop(
                remuxed.as_std_path(),
                cropped.as_std_path(),
                &clip_window(&clip),
            )?;
        }

        self.store.install(self.media, cropped.as_std_path(), uid)?;
        Ok(())
    }
}
