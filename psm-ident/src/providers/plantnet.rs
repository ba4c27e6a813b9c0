//! PlantNet-compatible visual identification client
//!
//! `POST {base}/identify/{project}?api-key=…` with a multipart body holding
//! the image plus fixed `modifiers` and `plant-details` fields. The response
//! lists species candidates ranked by score.

use async_trait::async_trait;
use psm_common::config::ProviderSettings;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{
    build_http_client, build_limiter, DirectLimiter, IdentifiedPlant, ImagePayload, ProviderError,
    VisualIdentifier,
};
use crate::models::plant_profile::clean_names;
use crate::models::PlantProfileDraft;

const MODIFIERS: &str = r#"["crops", "auto"]"#;
const PLANT_DETAILS: &str = r#"["common_names", "url"]"#;

#[derive(Debug, Deserialize)]
struct IdentifyResponse {
    #[serde(default)]
    results: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    score: f64,
    species: Species,
    #[serde(default)]
    images: Vec<CandidateImage>,
}

#[derive(Debug, Deserialize)]
struct Species {
    #[serde(rename = "scientificNameWithoutAuthor")]
    scientific_name: String,
    #[serde(rename = "commonNames", default)]
    common_names: Vec<CommonName>,
    #[serde(default)]
    family: Option<Taxon>,
}

/// Common names arrive either as plain strings or as `{ "name": ... }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommonName {
    Plain(String),
    Named { name: String },
}

impl CommonName {
    fn into_string(self) -> String {
        match self {
            CommonName::Plain(name) | CommonName::Named { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Taxon {
    #[serde(rename = "scientificNameWithoutAuthor", default)]
    scientific_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateImage {
    #[serde(default)]
    url: Option<ImageUrls>,
}

#[derive(Debug, Deserialize)]
struct ImageUrls {
    #[serde(default)]
    m: Option<String>,
    #[serde(default)]
    o: Option<String>,
}

/// PlantNet API client
pub struct PlantNetClient {
    http_client: reqwest::Client,
    rate_limiter: DirectLimiter,
    api_key: String,
    base_url: String,
    project: String,
}

impl PlantNetClient {
    pub fn new(api_key: String, settings: &ProviderSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: build_http_client(settings)?,
            rate_limiter: build_limiter(settings.requests_per_second),
            api_key,
            base_url: settings.plantnet_base_url.trim_end_matches('/').to_string(),
            project: settings.plantnet_project.clone(),
        })
    }

    /// Endpoint without the credential query parameter
    fn identify_url(&self) -> String {
        format!("{}/identify/{}", self.base_url, self.project)
    }

    fn map_status(status: StatusCode) -> ProviderError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
            StatusCode::NOT_FOUND => ProviderError::NoMatch,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::Unavailable(format!("credential rejected ({})", status.as_u16()))
            }
            other => ProviderError::Unavailable(format!("PlantNet API error: {}", other.as_u16())),
        }
    }
}

#[async_trait]
impl VisualIdentifier for PlantNetClient {
    fn name(&self) -> &'static str {
        "plantnet"
    }

    async fn identify(&self, image: &ImagePayload) -> Result<IdentifiedPlant, ProviderError> {
        if image.bytes.is_empty() {
            return Err(ProviderError::Unavailable("empty image payload".to_string()));
        }

        self.rate_limiter.until_ready().await;

        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name())
            .mime_str(&image.mime_type)
            .map_err(|e| ProviderError::Unavailable(format!("invalid image type: {}", e)))?;
        let form = Form::new()
            .part("images", part)
            .text("modifiers", MODIFIERS)
            .text("plant-details", PLANT_DETAILS);

        tracing::debug!(project = %self.project, bytes = image.bytes.len(), "Querying PlantNet");

        let response = self
            .http_client
            .post(self.identify_url())
            .query(&[("api-key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;
        let parsed: IdentifyResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(
                provider = "plantnet",
                error = %e,
                excerpt = %super::response::excerpt(&body),
                "Provider returned malformed content"
            );
            ProviderError::MalformedResponse(e.to_string())
        })?;

        best_candidate(parsed)
    }
}

/// Map the top-scored candidate to a draft
fn best_candidate(response: IdentifyResponse) -> Result<IdentifiedPlant, ProviderError> {
    let best = response
        .results
        .into_iter()
        .filter(|c| !c.species.scientific_name.trim().is_empty())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or(ProviderError::NoMatch)?;

    let confidence = best.score.clamp(0.0, 1.0);
    let scientific_name = best.species.scientific_name.trim().to_string();

    let mut draft = PlantProfileDraft::new(scientific_name.clone());
    draft.common_names = clean_names(
        best.species
            .common_names
            .into_iter()
            .map(CommonName::into_string)
            .collect(),
    );
    draft.family = best
        .species
        .family
        .and_then(|f| f.scientific_name)
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());
    draft.details.image_url = best
        .images
        .into_iter()
        .filter_map(|img| img.url)
        .find_map(|urls| urls.m.or(urls.o));
    draft.description = Some(format!(
        "{} identified with {}% confidence using PlantNet.",
        scientific_name,
        (confidence * 100.0).round() as u32
    ));

    tracing::info!(
        scientific_name = %scientific_name,
        confidence,
        "PlantNet identification successful"
    );

    Ok(IdentifiedPlant { draft, confidence })
}
