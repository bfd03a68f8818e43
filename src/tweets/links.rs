//! Link preview fetching.
//!
//! When enabled, the first link of a new tweet is fetched and its title,
//! description and cover image are stored with the tweet.

use log::{debug, info, warn};
use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::parsing::parse_link_preview;
use crate::models::LinkPreview;

/// Only this many leading bytes of a page are downloaded and inspected.
pub const DEFAULT_MAX_PREVIEW_BYTES: usize = 512 * 1024;

#[derive(Debug, Clone)]
pub struct LinkPreviewClient {
    client: Client,
    max_bytes: usize,
}

impl LinkPreviewClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tweet-service/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            max_bytes: DEFAULT_MAX_PREVIEW_BYTES,
        })
    }

    /// Caps the number of bytes read from a page.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Fetches a preview for `url`.
    ///
    /// Never fails: any network or HTTP error is logged and the preview falls
    /// back to the bare URL.
    pub async fn fetch(&self, url: &Url) -> LinkPreview {
        match self.fetch_html(url).await {
            Ok(html) => {
                let preview = parse_link_preview(url, &html);
                info!(
                    "Fetched link preview for {} (title: {:?})",
                    url, preview.title
                );
                preview
            }
            Err(e) => {
                warn!("Failed to fetch link preview for {}: {}", url, e);
                LinkPreview {
                    url: url.to_string(),
                    ..Default::default()
                }
            }
        }
    }

    async fn fetch_html(
        &self,
        url: &Url,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        debug!("Requesting {}", url);
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("text/html"))
            .unwrap_or(true);
        if !is_html {
            return Err(format!("{} is not an HTML page", url).into());
        }

        // Stream the body and stop at the cap; the rest is never downloaded.
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let remaining = self.max_bytes - body.len();
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                debug!("Stopped reading {} after {} bytes", url, self.max_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
