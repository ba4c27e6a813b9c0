//! Plant profile: canonical botanical record keyed by scientific name
//!
//! Profiles are created once per species and afterwards only patched.
//! [`ProfilePatch`] has no identity fields at all, so a patch can never clear
//! or rename `scientific_name` / `common_names`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored plant profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantProfile {
    pub id: Uuid,
    pub scientific_name: String,
    /// Ordered, non-empty once known
    pub common_names: Vec<String>,
    pub family: Option<String>,
    pub description: String,
    #[serde(flatten)]
    pub details: ProfileDetails,
    pub ai_enhanced: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional descriptive fields shared by drafts, patches and stored profiles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habitat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub care_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecological_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_significance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_habits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasonal_changes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blooming_season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_needs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_preferences: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_regions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conservation_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ProfileDetails {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        *self == ProfileDetails::default()
    }

    /// Overlay `other` onto `self`: fields present in `other` win, absent ones are kept
    pub fn merge_from(&mut self, other: ProfileDetails) {
        fn take<T>(slot: &mut Option<T>, incoming: Option<T>) {
            if incoming.is_some() {
                *slot = incoming;
            }
        }

        take(&mut self.habitat, other.habitat);
        take(&mut self.detailed_description, other.detailed_description);
        take(&mut self.care_instructions, other.care_instructions);
        take(&mut self.ecological_role, other.ecological_role);
        take(&mut self.cultural_significance, other.cultural_significance);
        take(&mut self.growth_habits, other.growth_habits);
        take(&mut self.seasonal_changes, other.seasonal_changes);
        take(&mut self.blooming_season, other.blooming_season);
        take(&mut self.light_requirements, other.light_requirements);
        take(&mut self.water_needs, other.water_needs);
        take(&mut self.soil_preferences, other.soil_preferences);
        take(&mut self.native_regions, other.native_regions);
        take(&mut self.conservation_status, other.conservation_status);
        take(&mut self.image_url, other.image_url);
    }

    /// Drop blank strings and empty lists so they count as absent
    pub fn normalized(mut self) -> Self {
        fn clean(slot: &mut Option<String>) {
            if let Some(value) = slot.take() {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    *slot = Some(trimmed.to_string());
                }
            }
        }

        clean(&mut self.habitat);
        clean(&mut self.detailed_description);
        clean(&mut self.care_instructions);
        clean(&mut self.ecological_role);
        clean(&mut self.cultural_significance);
        clean(&mut self.growth_habits);
        clean(&mut self.seasonal_changes);
        clean(&mut self.blooming_season);
        clean(&mut self.light_requirements);
        clean(&mut self.water_needs);
        clean(&mut self.soil_preferences);
        clean(&mut self.conservation_status);
        clean(&mut self.image_url);
        self.native_regions = self.native_regions.map(clean_names).filter(|r| !r.is_empty());
        self
    }
}

/// Profile content proposed by a provider or the user, not yet stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantProfileDraft {
    pub scientific_name: String,
    pub common_names: Vec<String>,
    pub family: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub details: ProfileDetails,
}

impl PlantProfileDraft {
    pub fn new(scientific_name: impl Into<String>) -> Self {
        Self {
            scientific_name: scientific_name.into().trim().to_string(),
            common_names: Vec::new(),
            family: None,
            description: None,
            details: ProfileDetails::default(),
        }
    }

    /// Profile made from a user-typed name verbatim (no provider involved)
    pub fn from_typed_name(name: &str) -> Self {
        let name = name.trim();
        let mut draft = Self::new(name);
        draft.common_names = vec![name.to_string()];
        draft.description = Some(format!("User-provided identification for \"{}\".", name));
        draft
    }

    /// Common names cleaned and never empty (falls back to the scientific name)
    pub fn effective_common_names(&self) -> Vec<String> {
        let names = clean_names(self.common_names.clone());
        if names.is_empty() {
            vec![self.scientific_name.clone()]
        } else {
            names
        }
    }

    /// Description, synthesized when the source gave none
    pub fn effective_description(&self) -> String {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (no description available yet).", self.scientific_name))
    }

    /// Best-effort enhancement overlay; identity fields are untouched
    pub fn enhanced_with(mut self, patch: ProfilePatch) -> Self {
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if self.family.is_none() {
            self.family = patch.family;
        }
        self.details.merge_from(patch.details);
        self
    }
}

/// Partial update for an existing profile (merge semantics)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(flatten)]
    pub details: ProfileDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_enhanced: Option<bool>,
}

impl ProfilePatch {
    /// True when applying the patch would change nothing
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.family.is_none()
            && self.ai_enhanced.is_none()
            && self.details.is_empty()
    }
}

/// Trim, drop blanks and case-insensitive duplicates, keep order
pub fn clean_names(names: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut cleaned = Vec::new();
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        cleaned.push(trimmed.to_string());
    }
    cleaned
}
