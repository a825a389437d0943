use tracing::info;

use crate::config::{Endpoints, ScrapedRequest, fill_template};
use crate::domain::{ScrapedSlug, Source, Uid};
use crate::error::DatasetError;
use crate::fetch::Downloader;
use crate::media::{ConvertOptions, MediaTool};
use crate::providers::Acquirer;
use crate::store::Store;

/// Downloads probed above this rate are halved.
pub const FPS_HALVING_THRESHOLD: f64 = 31.0;

pub fn resample_target(fps: f64) -> Option<f64> {
    (fps > FPS_HALVING_THRESHOLD).then_some(fps / 2.0)
}

/// Scraped video-sharing site. Downloads need the session cookies picked up
/// from the home page.
pub struct PixabayAcquirer<'a> {
    store: &'a Store,
    media: &'a dyn MediaTool,
    http: &'a dyn Downloader,
    requests: &'a [ScrapedRequest],
    endpoints: &'a Endpoints,
}

impl<'a> PixabayAcquirer<'a> {
    pub fn new(
        store: &'a Store,
        media: &'a dyn MediaTool,
        http: &'a dyn Downloader,
        requests: &'a [ScrapedRequest],
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
}

impl Acquirer for PixabayAcquirer<'_> {
    fn source(&self) -> Source {
        Source::Pixabay
    }

    fn entries(&self) -> Vec<(String, Uid)> {
        self.requests
            .iter()
            .map(|req| (req.slug.as_str().to_string(), req.uid))
            .collect()
    }

    fn prepare(&self) -> Result<(), DatasetError> {
        self.store.ensure_staging_dir(Source::Pixabay)?;
        self.http.open_session(&self.endpoints.pixabay_home)
    }

    fn acquire(&self, source_id: &str, uid: Uid) -> Result<(), DatasetError> {
        let slug: ScrapedSlug = source_id.parse()?;
        let staging = self.store.staging_dir(Source::Pixabay);

        let download = staging.join(format!("{}.mp4", slug.as_str()));
        if !download.as_std_path().exists() {
            let url = fill_template(&self.endpoints.pixabay_download, slug.video_number());
            self.http.download(&url, download.as_std_path())?;
        }

        let fps = self.media.probe_fps(download.as_std_path())?;
        let ready = match resample_target(fps) {
            Some(target_fps) => {
                let resampled = staging.join(format!("{}_newfps.mp4", slug.as_str()));
                if !resampled.as_std_path().exists() {
                    info!(%download, fps, target_fps, "downsampling frame rate");
                    // The fps filter lines up with the source; -r drifts slightly.
                    self.media.convert(
                        download.as_std_path(),
                        resampled.as_std_path(),
                        &ConvertOptions::resample_with_filter(target_fps),
                    )?;
                }
                resampled
            }
            None => download,
        };

        self.store.install(self.media, ready.as_std_path(), uid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_only_above_threshold() {
        assert_eq!(resample_target(60.0), Some(30.0));
        assert_eq!(resample_target(50.0), Some(25.0));
        assert_eq!(resample_target(30.0), None);
        assert_eq!(resample_target(31.0), None);
        assert_eq!(resample_target(29.97), None);
    }
}
