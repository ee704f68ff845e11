//! Client for a remote `/api/classify` endpoint.
//!
//! This is what a thin client uses when the model credentials live on the
//! server: the image and prompt fragment go to the endpoint, which answers
//! with the same `{match, offline, reason}` body the server produces.

use std::time::Duration;

use tracing::{debug, warn};

use super::{Classification, Classifier, ClassifyRequest};
use crate::capture::EncodedImage;
use crate::config::Config;
use crate::error::{Error, Result};

/// Classifier that forwards to a classification endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct EndpointClassifier {
    client: reqwest::Client,
    url: String,
}

impl EndpointClassifier {
    /// Create a classifier for the endpoint at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Create a classifier from application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.classifier.endpoint_url.clone(),
            config.classifier_timeout(),
        )
    }

    /// The endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Classifier for EndpointClassifier {
    fn name(&self) -> &'static str {
        "endpoint"
    }

    async fn classify(
        &self,
        image: &EncodedImage,
        prompt_fragment: &str,
    ) -> Result<Classification> {
        let body = ClassifyRequest {
            image: image.to_base64(),
            item_name: prompt_fragment.to_string(),
        };
        debug!("Posting {} byte image to {}", image.len(), self.url);

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Classification endpoint returned {}", status);
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        response
            .json::<Classification>()
            .await
            .map_err(|e| Error::malformed(e.to_string()))
    }
}
