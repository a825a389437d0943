use crate::config::{Endpoints, RepositoryRequest, fill_template};
use crate::domain::{Source, Uid};
use crate::error::DatasetError;
use crate::fetch::Downloader;
use crate::media::MediaTool;
use crate::providers::Acquirer;
use crate::store::Store;

/// Research data repository. Raw videos are used as-is, either staged by an
/// upstream sync or fetched by the entry's item code.
pub struct ViratAcquirer<'a> {
    store: &'a Store,
    media: &'a dyn MediaTool,
    http: &'a dyn Downloader,
    requests: &'a [RepositoryRequest],
    endpoints: &'a Endpoints,
}

impl<'a> ViratAcquirer<'a> {
    pub fn new(
        store: &'a Store,
        media: &'a dyn MediaTool,
        http: &'a dyn Downloader,
        requests: &'a [RepositoryRequest],
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

impl Acquirer for ViratAcquirer<'_> {
    fn source(&self) -> Source {
        Source::Virat
    }

    fn entries(&self) -> Vec<(String, Uid)> {
        self.requests
            .iter()
            .map(|req| (req.file_name.clone(), req.uid))
            .collect()
    }

    fn prepare(&self) -> Result<(), DatasetError> {
        self.store.ensure_staging_dir(Source::Virat).map(|_| ())
    }

    fn acquire(&self, source_id: &str, uid: Uid) -> Result<(), DatasetError> {
        let request = self
            .requests
            .iter()
            .find(|req| req.file_name == source_id)
            .ok_or_else(|| DatasetError::MappingParse(format!("unknown entry {source_id}")))?;

        let staged = self.store.staging_dir(Source::Virat).join(&request.file_name);
        if !staged.as_std_path().exists() {
            match &request.item {
                Some(item) => {
                    let url = fill_template(&self.endpoints.virat_item, item);
                    self.http.download(&url, staged.as_std_path())?;
                }
                None => return Err(DatasetError::MissingAsset(staged.to_string())),
            }
        }

        self.store.install(self.media, staged.as_std_path(), uid)?;
        Ok(())
    }
}
