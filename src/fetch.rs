use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{blocking::Client, StatusCode};
use thiserror::Error;

/// How a single download attempt can go wrong.
///
/// The distinction matters for the unlisted-firmware fallback: a bad HTTP
/// status on one mirror means "try the next source", while a transport
/// failure aborts the whole operation.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("server answered with HTTP status {0}")]
    Status(StatusCode),

    #[error("network request failed")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status(_))
    }
}

/// Seam between the installer/planner and the network, so tests can feed
/// canned payloads instead of reaching out to real mirrors.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("neopo/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build the HTTP client")?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut resp = self.client.get(url).send()?;

        let status = resp.status();

        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        // Bundles are at most tens of megabytes, so the whole payload is
        // buffered in memory before extraction.
        let pb = match resp.content_length() {
            Some(len) => ProgressBar::new(len).with_style(
                ProgressStyle::with_template(
                    "{bytes:>11} / {total_bytes:<11} [{wide_bar}] {eta}",
                )
                .unwrap()
                .progress_chars("##-"),
            ),
            None => ProgressBar::new_spinner(),
        };

        let mut payload = Vec::new();

        resp.copy_to(&mut pb.wrap_write(&mut payload))?;

        pb.finish_and_clear();

        Ok(payload)
    }
}
