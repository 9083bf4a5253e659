use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::StatusCode;
use url::Url;

use crate::drive::{
    content_disposition_filename, parse_interstitial, with_confirm_token, DownloadRequest,
    Interstitial, ResourceIdentifier, WARNING_COOKIE_PREFIX,
};
use crate::error::{FetchError, FetchResult};
use crate::progress::{NoopProgress, ProgressReporter};
use crate::utils::{persist, resolve_destination, staging_file};

/// Confirmation pages followed before giving up on an identifier.
const MAX_INTERSTITIAL_HOPS: usize = 3;

const CHUNK_SIZE: usize = 64 * 1024;

/// Downloads one file per call. Holds no state between calls.
pub struct Fetcher {
    client: Client,
    service_base: Url,
    progress: Box<dyn ProgressReporter>,
}

impl Fetcher {
    pub fn new(client: Client, service_base: Url) -> Self {
        Fetcher {
            client,
            service_base,
            progress: Box::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Transfers the file named by `identifier` to `destination`, replacing any
    /// existing file only once the whole body has arrived. Returns the path
    /// written, which differs from `destination` when that names a directory.
    pub fn fetch(
        &self,
        identifier: &ResourceIdentifier,
        destination: &Path,
    ) -> FetchResult<PathBuf> {
        let request = DownloadRequest::new(&self.service_base, identifier);
        log::info!("Downloading {identifier} from {}", request.url());

        let response = self.open(identifier, request.url())?;
        let advertised = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(content_disposition_filename);
        let destination = resolve_destination(destination, advertised.as_deref(), identifier);

        let written = self.transfer(response, identifier, &destination)?;
        log::info!("Saved {written} bytes of {identifier} to {}", destination.display());
        Ok(destination)
    }

    /// Sends the request and walks past confirmation pages until the host
    /// answers with file content.
    fn open(&self, identifier: &ResourceIdentifier, url: &Url) -> FetchResult<Response> {
        let mut url = url.clone();
        for hop in 0..=MAX_INTERSTITIAL_HOPS {
            let response = self
                .client
                .get(url.clone())
                .send()
                .map_err(|e| FetchError::network(format!("GET {url} failed"), e))?;
            check_status(identifier, &response)?;
            if !is_interstitial(&response) {
                return Ok(response);
            }
            if hop == MAX_INTERSTITIAL_HOPS {
                break;
            }

            let warning_token = response
                .cookies()
                .find(|c| c.name().starts_with(WARNING_COOKIE_PREFIX))
                .map(|c| c.value().to_string());
            if let Some(token) = warning_token {
                log::debug!("Confirming download of {identifier} with warning cookie");
                url = with_confirm_token(&url, &token);
                continue;
            }

            let page_url = response.url().clone();
            let page = response
                .text()
                .map_err(|e| FetchError::network(format!("reading {page_url} failed"), e))?;
            match parse_interstitial(&page, &page_url) {
                Interstitial::Follow(next) => {
                    log::info!("Following confirmation page for {identifier} to {next}");
                    url = next;
                }
                Interstitial::Rejected(reason) => {
                    log::warn!("Host rejected {identifier}: {reason}");
                    return Err(FetchError::invalid(identifier.as_str(), reason));
                }
            }
        }
        Err(FetchError::invalid(
            identifier.as_str(),
            format!("still on a confirmation page after {MAX_INTERSTITIAL_HOPS} hops"),
        ))
    }

    fn transfer(
        &self,
        mut response: Response,
        identifier: &ResourceIdentifier,
        destination: &Path,
    ) -> FetchResult<u64> {
        let mut staged = staging_file(destination)?;
        self.progress
            .start(identifier.as_str(), response.content_length());

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;
        let copied = loop {
            let n = match response.read(&mut buf) {
                Ok(0) => break Ok(written),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    break Err(FetchError::network(
                        format!("connection lost after {written} bytes"),
                        e,
                    ))
                }
            };
            if let Err(e) = staged.write_all(&buf[..n]) {
                break Err(FetchError::io(staged.path(), e));
            }
            written += n as u64;
            self.progress.update(written);
        };

        let result = copied
            .and_then(|n| {
                staged
                    .as_file()
                    .sync_all()
                    .map_err(|e| FetchError::io(staged.path(), e))?;
                Ok(n)
            })
            .and_then(|n| persist(staged, destination).map(|_| n));
        match &result {
            Ok(_) => self.progress.finish("done"),
            Err(e) => self.progress.finish_with_error(&e.to_string()),
        }
        result
    }
}

fn check_status(identifier: &ResourceIdentifier, response: &Response) -> FetchResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE => Err(
            FetchError::invalid(identifier.as_str(), format!("host answered {status}")),
        ),
        _ => Err(FetchError::status(response.url().as_str(), status)),
    }
}

/// An HTML page without an attachment header is the host talking, not the file.
fn is_interstitial(response: &Response) -> bool {
    let headers = response.headers();
    !headers.contains_key(CONTENT_DISPOSITION)
        && headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false)
}
