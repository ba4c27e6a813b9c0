//! Provider clients for external identification services
//!
//! Two capabilities sit behind traits so the orchestrator can be driven by
//! test doubles:
//! - [`VisualIdentifier`]: image → top-scored species candidate
//! - [`BotanicalContentGenerator`]: name validation, profile enhancement and
//!   (optionally) image identification from a generative model
//!
//! Every failure is mapped to a [`ProviderError`]; callers never see
//! transport or parse errors directly.

pub mod gemini;
pub mod plantnet;
pub mod response;

pub use gemini::GeminiClient;
pub use plantnet::PlantNetClient;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use psm_common::config::{get_user_agent, ProviderSettings};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::ProviderCredentials;
use crate::models::{PlantProfileDraft, ProfilePatch};

/// Uniform provider outcome errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// No credential configured for this provider
    #[error("provider not configured")]
    NotConfigured,

    /// Provider asked us to back off (HTTP 429)
    #[error("provider rate limit exceeded")]
    RateLimited,

    /// Provider answered but found nothing usable
    #[error("no match found")]
    NoMatch,

    /// Transport failure or unexpected status
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Response did not have the expected shape
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// Request exceeded its time budget
    #[error("provider request timed out")]
    Timeout,
}

impl ProviderError {
    /// Map a reqwest transport error
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Unavailable(format!("transport error: {}", err))
        }
    }

    /// Short tag for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured => "not_configured",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::NoMatch => "no_match",
            ProviderError::Unavailable(_) => "unavailable",
            ProviderError::MalformedResponse(_) => "malformed_response",
            ProviderError::Timeout => "timeout",
        }
    }
}

/// Image bytes handed to a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// File name to present in multipart uploads
    pub fn file_name(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "plant.png",
            "image/webp" => "plant.webp",
            "image/heic" | "image/heif" => "plant.heic",
            _ => "plant.jpg",
        }
    }
}

/// A species resolved from an image
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifiedPlant {
    pub draft: PlantProfileDraft,
    /// Provider score in [0, 1]
    pub confidence: f64,
}

/// Result of validating a user-typed name
#[derive(Debug, Clone, PartialEq)]
pub enum NameValidation {
    /// Recognized plant with full profile content
    Valid(PlantProfileDraft),
    /// Misspelled or ambiguous; suggestions may be empty
    NeedsClarification { suggestions: Vec<String> },
}

/// Image → species candidate
#[async_trait]
pub trait VisualIdentifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn identify(&self, image: &ImagePayload) -> Result<IdentifiedPlant, ProviderError>;
}

/// Generative botanical content
#[async_trait]
pub trait BotanicalContentGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validate a typed name and describe the plant
    async fn validate_and_describe(&self, typed_name: &str) -> Result<NameValidation, ProviderError>;

    /// Descriptive fields for an existing species (never identity fields)
    async fn enhance(
        &self,
        scientific_name: &str,
        common_names: &[String],
    ) -> Result<ProfilePatch, ProviderError>;

    fn supports_image_identification(&self) -> bool {
        false
    }

    async fn identify_image(&self, _image: &ImagePayload) -> Result<IdentifiedPlant, ProviderError> {
        Err(ProviderError::Unavailable(format!(
            "{} does not identify images",
            self.name()
        )))
    }
}

/// Configured providers; `None` means not configured
#[derive(Clone, Default)]
pub struct ProviderSet {
    pub visual: Option<Arc<dyn VisualIdentifier>>,
    pub generative: Option<Arc<dyn BotanicalContentGenerator>>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("visual", &self.visual.as_ref().map(|p| p.name()))
            .field("generative", &self.generative.as_ref().map(|p| p.name()))
            .finish()
    }
}

impl ProviderSet {
    /// Build HTTP-backed providers for every credential present
    pub fn from_credentials(
        credentials: &ProviderCredentials,
        settings: &ProviderSettings,
    ) -> Result<Self, ProviderError> {
        let visual = match &credentials.plantnet_api_key {
            Some(key) => Some(Arc::new(PlantNetClient::new(key.clone(), settings)?) as Arc<dyn VisualIdentifier>),
            None => None,
        };
        let generative = match &credentials.gemini_api_key {
            Some(key) => Some(
                Arc::new(GeminiClient::new(key.clone(), settings)?) as Arc<dyn BotanicalContentGenerator>
            ),
            None => None,
        };

        tracing::info!(
            visual = visual.is_some(),
            generative = generative.is_some(),
            "Provider set built"
        );
        Ok(Self { visual, generative })
    }
}

pub(crate) type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket allowing `requests_per_second` calls (minimum 1)
pub(crate) fn build_limiter(requests_per_second: u32) -> DirectLimiter {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rate))
}

/// HTTP client with bounded connect and total timeouts
pub(crate) fn build_http_client(settings: &ProviderSettings) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(get_user_agent())
        .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs.max(1)))
        .build()
        .map_err(|e| ProviderError::Unavailable(format!("HTTP client setup failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_set_follows_credentials() {
        let settings = ProviderSettings::default();

        let none = ProviderSet::from_credentials(&ProviderCredentials::default(), &settings).unwrap();
        assert!(none.visual.is_none());
        assert!(none.generative.is_none());

        let creds = ProviderCredentials {
            plantnet_api_key: None,
            gemini_api_key: Some("g".to_string()),
        };
        let only_generative = ProviderSet::from_credentials(&creds, &settings).unwrap();
        assert!(only_generative.visual.is_none());
        assert_eq!(only_generative.generative.as_ref().map(|g| g.name()), Some("gemini"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ProviderError::RateLimited.kind(), "rate_limited");
        assert_eq!(ProviderError::MalformedResponse("x".into()).kind(), "malformed_response");
    }

    #[test]
    fn test_image_file_name() {
        assert_eq!(ImagePayload::new(vec![], "image/png").file_name(), "plant.png");
        assert_eq!(ImagePayload::new(vec![], "application/octet-stream").file_name(), "plant.jpg");
    }

    #[tokio::test]
    async fn test_limiter_zero_rate_falls_back_to_one() {
        let limiter = build_limiter(0);
        limiter.until_ready().await;
        assert!(limiter.check().is_err());
    }
}
