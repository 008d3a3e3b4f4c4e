use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use tokio::time::Instant;
use url::Url;

/// Default crawl-delay, taken from the site's robots.txt.
pub const DEFAULT_DELAY_MS: u64 = 9_000;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET {url}")]
    Transport {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("GET {url}: unexpected status {status}")]
    Status { url: Url, status: u16 },
}

/// Source of page HTML for the crawl. Implementations own request pacing.
#[async_trait]
pub trait PageFetcher {
    async fn fetch(&mut self, url: &Url) -> Result<String, FetchError>;
}

/// Sequential HTTP fetcher that waits a fixed interval after each response
/// before issuing the next request.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    delay: Duration,
    last_response: Option<Instant>,
}

impl HttpFetcher {
    pub fn new(delay: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            delay,
            last_response: None,
        })
    }

    async fn wait_for_turn(&self) {
        if let Some(last) = self.last_response {
            tokio::time::sleep_until(last + self.delay).await;
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&mut self, url: &Url) -> Result<String, FetchError> {
        self.wait_for_turn().await;
        tracing::debug!(url = %url, "fetch");

        let result = self
            .client
            .get(url.clone())
            .header(USER_AGENT, concat!("guidechat/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await;
        let outcome = match result {
            Ok(response) if !response.status().is_success() => Err(FetchError::Status {
                url: url.clone(),
                status: response.status().as_u16(),
            }),
            Ok(response) => response.text().await.map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            }),
            Err(source) => Err(FetchError::Transport {
                url: url.clone(),
                source,
            }),
        };

        self.last_response = Some(Instant::now());
        outcome
    }
}
