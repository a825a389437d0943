use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{
    ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_LENGTH, HeaderMap, HeaderValue, USER_AGENT,
};
use tracing::{debug, info};

use crate::atomic::produce_atomically;
use crate::error::DatasetError;
use crate::media::find_in_path;

/// Plain HTTP(S) GET into a local file.
pub trait Downloader: Send + Sync {
    /// Streams `url` into `destination`, which is only created on success.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, DatasetError>;

    /// Visits `url` so the session picks up the cookies later downloads need.
    fn open_session(&self, url: &str) -> Result<(), DatasetError>;
}

/// Unsigned copy out of a public object store.
pub trait ObjectStore: Send + Sync {
    fn copy_unsigned(&self, uri: &str, destination: &Path) -> Result<(), DatasetError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for Box<T> {
    fn copy_unsigned(&self, uri: &str, destination: &Path) -> Result<(), DatasetError> {
        (**self).copy_unsigned(uri, destination)
    }
}

// Some hosts refuse non-browser clients.
const BROWSER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/105.0.0.0 Safari/537.36";

#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self, DatasetError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        // No overall timeout: research archives run to tens of gigabytes.
        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| DatasetError::Fetch(err.to_string()))?;

        Ok(Self { client })
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<u64, DatasetError> {
        let response_status = response.status();
        if !response_status.is_success() {
            let status = response_status.as_u16();
            let message = response
                .text()
                .map(|body| body.chars().take(200).collect())
                .unwrap_or_else(|_| "request failed".to_string());
            return Err(DatasetError::FetchStatus { status, message });
        }
        let expected = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|len| *len > 0);

        produce_atomically(destination, |scratch| {
            let mut file = File::create(scratch).map_err(DatasetError::fs)?;
            let written = std::io::copy(&mut response, &mut file)
                .map_err(|err| DatasetError::Fetch(err.to_string()))?;
            if let Some(expected) = expected {
                if written != expected {
                    return Err(DatasetError::Fetch(format!(
                        "truncated body: got {written} of {expected} bytes"
                    )));
                }
            }
            Ok(written)
        })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, DatasetError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, attempt, "retrying request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(error = %err, attempt, "retrying request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(DatasetError::Fetch(err.to_string()));
                }
            }
        }
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, destination: &Path) -> Result<u64, DatasetError> {
        info!(url, destination = %destination.display(), "downloading");
        let response = self.send_with_retries(|| self.client.get(url))?;
        self.write_response_to_file(response, destination)
    }

    fn open_session(&self, url: &str) -> Result<(), DatasetError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        if !response.status().is_success() {
            return Err(DatasetError::FetchStatus {
                status: response.status().as_u16(),
                message: format!("session bootstrap against {url}"),
            });
        }
        Ok(())
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// [`ObjectStore`] that shells out to `aws s3 cp --no-sign-request`.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: PathBuf,
}

impl AwsCli {
    pub fn new() -> Result<Self, DatasetError> {
        let program =
            find_in_path("aws").ok_or_else(|| DatasetError::MissingTool("aws".to_string()))?;
        Ok(Self { program })
    }
}

impl ObjectStore for AwsCli {
    fn copy_unsigned(&self, uri: &str, destination: &Path) -> Result<(), DatasetError> {
        info!(uri, destination = %destination.display(), "copying object");
        produce_atomically(destination, |scratch| {
            let output = Command::new(&self.program)
                .args(["s3", "cp", "--no-sign-request", "--only-show-errors", uri])
                .arg(scratch)
                .output()
                .map_err(|err| DatasetError::Fetch(err.to_string()))?;
            if output.status.success() {
                return Ok(());
            }
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(DatasetError::Fetch(if stderr.is_empty() {
                format!("aws s3 cp {uri} exited with {}", output.status)
            } else {
                stderr
            }))
        })
    }
}
