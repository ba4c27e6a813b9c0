//! Gemini-compatible generative content client
//!
//! `POST {base}/models/{model}:generateContent?key=…`. The model is prompted
//! to answer with one JSON object; the reply text is fenced-stripped and
//! deserialized into a typed payload before anything else sees it.
//!
//! Retries: 5xx and connection errors are retried up to `max_attempts`
//! total attempts. 429 and other 4xx responses are returned immediately.

use async_trait::async_trait;
use base64::Engine;
use psm_common::config::ProviderSettings;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::response::parse_json_object;
use super::{
    build_http_client, build_limiter, BotanicalContentGenerator, DirectLimiter, IdentifiedPlant,
    ImagePayload, NameValidation, ProviderError,
};
use crate::models::plant_profile::clean_names;
use crate::models::{PlantProfileDraft, ProfileDetails, ProfilePatch};

/// Sampling parameters per call type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationProfile {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Name validation: conservative sampling
pub const VALIDATION: GenerationProfile = GenerationProfile {
    temperature: 0.2,
    max_output_tokens: 1500,
};

/// Enhancement: larger token budget for descriptive text
pub const ENHANCEMENT: GenerationProfile = GenerationProfile {
    temperature: 0.5,
    max_output_tokens: 2048,
};

/// Image identification
pub const IMAGE_IDENTIFICATION: GenerationProfile = GenerationProfile {
    temperature: 0.2,
    max_output_tokens: 1500,
};

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Descriptive fields shared by every prompt's JSON shape
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptiveFields {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    habitat: Option<String>,
    #[serde(default)]
    detailed_description: Option<String>,
    #[serde(default)]
    care_instructions: Option<String>,
    #[serde(default)]
    ecological_role: Option<String>,
    #[serde(default)]
    cultural_significance: Option<String>,
    #[serde(default)]
    growth_habits: Option<String>,
    #[serde(default)]
    seasonal_changes: Option<String>,
    #[serde(default)]
    blooming_season: Option<String>,
    #[serde(default)]
    light_requirements: Option<String>,
    #[serde(default)]
    water_needs: Option<String>,
    #[serde(default)]
    soil_preferences: Option<String>,
    #[serde(default)]
    native_regions: Option<Vec<String>>,
    #[serde(default)]
    conservation_status: Option<String>,
}

impl DescriptiveFields {
    fn into_details(self) -> (Option<String>, Option<String>, ProfileDetails) {
        let details = ProfileDetails {
            habitat: self.habitat,
            detailed_description: self.detailed_description,
            care_instructions: self.care_instructions,
            ecological_role: self.ecological_role,
            cultural_significance: self.cultural_significance,
            growth_habits: self.growth_habits,
            seasonal_changes: self.seasonal_changes,
            blooming_season: self.blooming_season,
            light_requirements: self.light_requirements,
            water_needs: self.water_needs,
            soil_preferences: self.soil_preferences,
            native_regions: self.native_regions,
            conservation_status: self.conservation_status,
            image_url: None,
        }
        .normalized();
        (non_blank(self.description), non_blank(self.family), details)
    }
}

/// Reply shape for name validation and image identification
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentificationPayload {
    is_valid_plant: bool,
    #[serde(default)]
    corrected_name: Option<String>,
    #[serde(default)]
    suggestions: Option<Vec<Option<String>>>,
    #[serde(default)]
    scientific_name: Option<String>,
    #[serde(default)]
    common_names: Option<Vec<Option<String>>>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(flatten)]
    fields: DescriptiveFields,
}

impl IdentificationPayload {
    fn suggestions(&self) -> Vec<String> {
        let listed = clean_names(
            self.suggestions
                .iter()
                .flatten()
                .flatten()
                .cloned()
                .collect(),
        );
        if !listed.is_empty() {
            return listed;
        }
        clean_names(self.corrected_name.iter().cloned().collect())
    }

    fn has_listed_suggestions(&self) -> bool {
        self.suggestions
            .iter()
            .flatten()
            .flatten()
            .any(|s| !s.trim().is_empty())
    }

    /// Build a full draft, using `fallback_name` when the model omitted names
    fn into_draft(self, fallback_name: &str) -> PlantProfileDraft {
        let corrected = non_blank(self.corrected_name);
        let scientific_name = non_blank(self.scientific_name)
            .or_else(|| corrected.clone())
            .unwrap_or_else(|| fallback_name.trim().to_string());

        let mut common_names = clean_names(self.common_names.into_iter().flatten().flatten().collect());
        if common_names.is_empty() {
            common_names = vec![corrected.unwrap_or_else(|| fallback_name.trim().to_string())];
        }

        let (description, family, details) = self.fields.into_details();
        let mut draft = PlantProfileDraft::new(scientific_name);
        draft.common_names = common_names;
        draft.description = description;
        draft.family = family;
        draft.details = details;
        draft
    }
}

/// Gemini API client
pub struct GeminiClient {
    http_client: reqwest::Client,
    rate_limiter: DirectLimiter,
    api_key: String,
    base_url: String,
    model: String,
    max_attempts: u32,
    retry_backoff: Duration,
}

/// One failed attempt and whether another is worthwhile
struct AttemptFailure {
    error: ProviderError,
    retryable: bool,
}

impl GeminiClient {
    pub fn new(api_key: String, settings: &ProviderSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: build_http_client(settings)?,
            rate_limiter: build_limiter(settings.requests_per_second),
            api_key,
            base_url: settings.gemini_base_url.trim_end_matches('/').to_string(),
            model: settings.gemini_model.clone(),
            max_attempts: settings.gemini_max_attempts.max(1),
            retry_backoff: Duration::from_millis(250),
        })
    }

    /// Override the pause between retries
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Endpoint without the credential query parameter
    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(parts: Vec<Value>, profile: GenerationProfile) -> Value {
        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": profile.temperature,
                "topK": 1,
                "topP": 1,
                "maxOutputTokens": profile.max_output_tokens,
            }
        })
    }

    /// Send a prompt and return the model's reply text
    async fn generate(&self, parts: Vec<Value>, profile: GenerationProfile) -> Result<String, ProviderError> {
        let body = Self::request_body(parts, profile);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.rate_limiter.until_ready().await;

            match self.attempt(&body).await {
                Ok(text) => return Ok(text),
                Err(failure) if failure.retryable && attempt < self.max_attempts => {
                    tracing::warn!(
                        provider = "gemini",
                        attempt,
                        error = %failure.error,
                        "Generative request failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(failure) => {
                    tracing::warn!(
                        provider = "gemini",
                        attempt,
                        kind = failure.error.kind(),
                        "Generative request failed"
                    );
                    return Err(failure.error);
                }
            }
        }
    }

    async fn attempt(&self, body: &Value) -> Result<String, AttemptFailure> {
        let response = self
            .http_client
            .post(self.generate_url())
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptFailure {
                retryable: e.is_connect(),
                error: ProviderError::from_transport(&e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure {
                retryable: status.is_server_error(),
                error: Self::map_status(status),
            });
        }

        let raw = response.text().await.map_err(|e| AttemptFailure {
            retryable: false,
            error: ProviderError::from_transport(&e),
        })?;

        extract_text(&raw).map_err(|error| AttemptFailure {
            retryable: false,
            error,
        })
    }

    fn map_status(status: StatusCode) -> ProviderError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::Unavailable(format!("credential rejected ({})", status.as_u16()))
            }
            other => ProviderError::Unavailable(format!("Gemini API error: {}", other.as_u16())),
        }
    }
}

/// First text part of the first candidate
fn extract_text(raw: &str) -> Result<String, ProviderError> {
    let parsed: GenerateContentResponse = parse_json_object("gemini", raw)?;
    parsed
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .find(|t| !t.trim().is_empty())
        .ok_or_else(|| ProviderError::MalformedResponse("no text in model reply".to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validation_prompt(typed_name: &str) -> String {
    format!(
        r#"You are a botanical expert. A user entered the plant name: "{name}"

Analyze this plant name and respond with a JSON object containing:
1. "isValidPlant": boolean - is this a real plant name?
2. "correctedName": string - the correct scientific or common name if there are typos
3. "suggestions": array of strings - alternative names if the input is unclear or misspelled (empty array if the name is clear)
4. "scientificName": string - the scientific name
5. "commonNames": array of strings - common names
6. "family": string - plant family
7. "description": string - description in 2-3 sentences
8. "careInstructions": string - specific care instructions
9. "ecologicalRole": string - ecological role and benefits
10. "habitat": string - natural habitat
11. "lightRequirements", "waterNeeds", "soilPreferences": strings
12. "nativeRegions": array of strings

Respond ONLY with valid JSON."#,
        name = typed_name
    )
}

fn enhancement_prompt(scientific_name: &str, common_names: &[String]) -> String {
    let common = if common_names.is_empty() {
        "unknown".to_string()
    } else {
        common_names.join(", ")
    };
    format!(
        r#"You are a botanical expert. Provide comprehensive information about the plant "{name}" (common names: {common}).

Respond with a JSON object using these keys:
- "description": description in 2-3 sentences
- "detailedDescription": a longer description of appearance and identification
- "careInstructions": specific care instructions for gardeners
- "ecologicalRole": ecological role and environmental benefits
- "habitat": natural habitat and growing conditions
- "growthHabits", "seasonalChanges", "bloomingSeason", "culturalSignificance": strings
- "lightRequirements", "waterNeeds", "soilPreferences", "conservationStatus": strings
- "nativeRegions": array of strings

Keep each section informative but concise. Respond ONLY with valid JSON."#,
        name = scientific_name,
        common = common
    )
}

const IMAGE_PROMPT: &str = r#"You are a botanical expert. Identify the plant in this photo.

Respond with a JSON object containing:
- "isValidPlant": boolean - false if no plant can be identified
- "scientificName": string
- "commonNames": array of strings
- "family": string
- "confidence": number between 0 and 1
- "description": description in 2-3 sentences
- "careInstructions", "ecologicalRole", "habitat": strings

Respond ONLY with valid JSON."#;

#[async_trait]
impl BotanicalContentGenerator for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn validate_and_describe(&self, typed_name: &str) -> Result<NameValidation, ProviderError> {
        let typed_name = typed_name.trim();
        if typed_name.is_empty() {
            return Err(ProviderError::Unavailable("empty subject name".to_string()));
        }

        let text = self
            .generate(vec![json!({ "text": validation_prompt(typed_name) })], VALIDATION)
            .await?;
        let payload: IdentificationPayload = parse_json_object("gemini", &text)?;

        if !payload.is_valid_plant || payload.has_listed_suggestions() {
            let suggestions = payload.suggestions();
            tracing::info!(
                typed_name,
                suggestions = suggestions.len(),
                "Generative provider requested clarification"
            );
            return Ok(NameValidation::NeedsClarification { suggestions });
        }

        Ok(NameValidation::Valid(payload.into_draft(typed_name)))
    }

    async fn enhance(
        &self,
        scientific_name: &str,
        common_names: &[String],
    ) -> Result<ProfilePatch, ProviderError> {
        if scientific_name.trim().is_empty() {
            return Err(ProviderError::Unavailable("empty subject name".to_string()));
        }

        let text = self
            .generate(
                vec![json!({ "text": enhancement_prompt(scientific_name.trim(), common_names) })],
                ENHANCEMENT,
            )
            .await?;
        let fields: DescriptiveFields = parse_json_object("gemini", &text)?;
        let (description, family, details) = fields.into_details();

        let patch = ProfilePatch {
            description,
            family,
            details,
            ai_enhanced: None,
        };
        if patch.is_empty() {
            tracing::warn!(provider = "gemini", scientific_name, "Enhancement reply had no descriptive fields");
            return Err(ProviderError::MalformedResponse(
                "enhancement reply had no descriptive fields".to_string(),
            ));
        }
        Ok(patch)
    }

    fn supports_image_identification(&self) -> bool {
        true
    }

    async fn identify_image(&self, image: &ImagePayload) -> Result<IdentifiedPlant, ProviderError> {
        if image.bytes.is_empty() {
            return Err(ProviderError::Unavailable("empty image payload".to_string()));
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        let parts = vec![
            json!({ "text": IMAGE_PROMPT }),
            json!({ "inline_data": { "mime_type": image.mime_type, "data": encoded } }),
        ];

        let text = self.generate(parts, IMAGE_IDENTIFICATION).await?;
        let payload: IdentificationPayload = parse_json_object("gemini", &text)?;

        if !payload.is_valid_plant {
            return Err(ProviderError::NoMatch);
        }
        let has_name = payload
            .scientific_name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        if !has_name {
            return Err(ProviderError::MalformedResponse(
                "image identification without scientificName".to_string(),
            ));
        }

        let confidence = payload.confidence.unwrap_or(0.5).clamp(0.0, 1.0);
        let draft = payload.into_draft("");
        tracing::info!(
            scientific_name = %draft.scientific_name,
            confidence,
            "Gemini image identification successful"
        );
        Ok(IdentifiedPlant { draft, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url_excludes_key() {
        let client = GeminiClient::new("secret".to_string(), &ProviderSettings::default()).unwrap();
        assert_eq!(
            client.generate_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
    }

    #[test]
    fn test_call_profiles_differ() {
        assert!(VALIDATION.temperature < ENHANCEMENT.temperature);
        assert!(ENHANCEMENT.max_output_tokens > VALIDATION.max_output_tokens);

        let body = GeminiClient::request_body(vec![json!({"text": "hi"})], VALIDATION);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1500);
    }

    #[test]
    fn test_extract_text() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":1}"}]}}]}"#;
        assert_eq!(extract_text(raw).unwrap(), "{\"a\":1}");

        let empty = r#"{"candidates":[]}"#;
        assert!(matches!(extract_text(empty), Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_suggestions_filter_blanks_and_fall_back_to_correction() {
        let payload: IdentificationPayload = serde_json::from_value(json!({
            "isValidPlant": false,
            "suggestions": ["", null, "Rosa canina"]
        }))
        .unwrap();
        assert_eq!(payload.suggestions(), vec!["Rosa canina".to_string()]);

        let payload: IdentificationPayload = serde_json::from_value(json!({
            "isValidPlant": false,
            "correctedName": "Rosa rubiginosa"
        }))
        .unwrap();
        assert!(!payload.has_listed_suggestions());
        assert_eq!(payload.suggestions(), vec!["Rosa rubiginosa".to_string()]);

        let payload: IdentificationPayload = serde_json::from_value(json!({
            "isValidPlant": false,
            "suggestions": []
        }))
        .unwrap();
        assert!(payload.suggestions().is_empty());
    }

    #[test]
    fn test_missing_validity_flag_is_rejected() {
        let result: Result<IdentificationPayload, _> =
            parse_json_object("gemini", r#"{"scientificName": "Rosa"}"#);
        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_draft_falls_back_to_typed_name() {
        let payload: IdentificationPayload = serde_json::from_value(json!({
            "isValidPlant": true,
            "description": "  A fig.  ",
            "careInstructions": "Bright light"
        }))
        .unwrap();
        let draft = payload.into_draft("Ficus lyrata");
        assert_eq!(draft.scientific_name, "Ficus lyrata");
        assert_eq!(draft.common_names, vec!["Ficus lyrata".to_string()]);
        assert_eq!(draft.description.as_deref(), Some("A fig."));
        assert_eq!(draft.details.care_instructions.as_deref(), Some("Bright light"));
    }
}
