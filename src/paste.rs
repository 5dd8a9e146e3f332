//! Uploads source code to itty.sh, so finalized submissions can link back
//! to the code that earned their verdict without storing it in the crate's
//! own document store.

use serde::Deserialize;

use crate::error::UploadError;

const DEFAULT_TTL: &str = "30years";
const DEFAULT_KEY_LENGTH: u32 = 8;

#[derive(Deserialize)]
struct IttyResponse {
    url: String,
}

/// A client for itty.sh's paste service.
pub struct PasteUploader {
    client: reqwest::Client,
    base_url: String,
    ttl: String,
    key_length: u32,
}

impl PasteUploader {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: "https://ity.sh/".to_string(),
            ttl: DEFAULT_TTL.to_string(),
            key_length: DEFAULT_KEY_LENGTH,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.ttl = ttl.into();
        self
    }

    #[must_use]
    pub fn with_key_length(mut self, key_length: u32) -> Self {
        self.key_length = key_length;
        self
    }

    /// Upload `text`, returning the URL the paste is reachable at.
    ///
    /// The core treats any failure here as recoverable: callers record the
    /// submission without `raw_code_url` rather than propagating the error.
    pub async fn upload(&self, text: &str) -> Result<String, UploadError> {
        let response = self
            .client
            .post(&self.base_url)
            .query(&[
                ("ttl", self.ttl.as_str()),
                ("length", &self.key_length.to_string()),
            ])
            .json(text)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UploadError::NonSuccess {
                status: response.status(),
            });
        }

        let parsed: IttyResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))?;
        Ok(parsed.url)
    }
}
