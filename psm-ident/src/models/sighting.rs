//! Sighting: one user observation and its identification state
//!
//! State machine:
//! ```text
//!   create ──► PENDING ──► IDENTIFIED   (plant_id set)
//!                 │  ▲
//!                 ▼  │ reopen (retry / re-identify)
//!               FAILED
//! ```
//! `plant_id` is present if and only if the status is `Identified`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identification state of a sighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentificationStatus {
    /// Awaiting an identification result
    Pending,
    /// Bound to a plant profile
    Identified,
    /// Last attempt did not produce an identification
    Failed,
}

impl IdentificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentificationStatus::Pending => "pending",
            IdentificationStatus::Identified => "identified",
            IdentificationStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(IdentificationStatus::Pending),
            "identified" => Some(IdentificationStatus::Identified),
            "failed" => Some(IdentificationStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, IdentificationStatus::Pending)
    }
}

/// How a sighting was identified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentificationMethod {
    /// Visual-recognition provider
    #[serde(rename = "plantnet")]
    VisualProvider,
    /// Generative provider (image fallback)
    #[serde(rename = "gemini")]
    GenerativeProvider,
    /// User-typed name (local match, provider-validated, or verbatim)
    #[serde(rename = "manual")]
    Manual,
}

impl IdentificationMethod {
    /// Stored and wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentificationMethod::VisualProvider => "plantnet",
            IdentificationMethod::GenerativeProvider => "gemini",
            IdentificationMethod::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plantnet" => Some(IdentificationMethod::VisualProvider),
            "gemini" => Some(IdentificationMethod::GenerativeProvider),
            "manual" => Some(IdentificationMethod::Manual),
            _ => None,
        }
    }
}

/// Where the plant was seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    /// Reject coordinates outside the WGS84 range
    pub fn validate(&self) -> Result<(), String> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("Latitude out of range: {}", self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!("Longitude out of range: {}", self.longitude));
        }
        Ok(())
    }
}

/// Stored sighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plant_id: Option<Uuid>,
    pub user_provided_name: Option<String>,
    pub private_notes: Option<String>,
    pub photo_id: String,
    pub location: Location,
    pub identification_status: IdentificationStatus,
    pub identification_method: Option<IdentificationMethod>,
    pub confidence_score: Option<f64>,
    /// Suggestions from the last clarification request
    pub alternative_names: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a sighting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSighting {
    pub user_id: Uuid,
    pub photo_id: String,
    pub location: Location,
    #[serde(default)]
    pub user_provided_name: Option<String>,
    #[serde(default)]
    pub private_notes: Option<String>,
}

/// User-editable fields
///
/// `None` leaves a field untouched; an empty string clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SightingEdit {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SightingEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.notes.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_and_terminality() {
        for status in [
            IdentificationStatus::Pending,
            IdentificationStatus::Identified,
            IdentificationStatus::Failed,
        ] {
            assert_eq!(IdentificationStatus::parse(status.as_str()), Some(status));
        }
        assert!(!IdentificationStatus::Pending.is_terminal());
        assert!(IdentificationStatus::Failed.is_terminal());
        assert_eq!(IdentificationStatus::parse("unknown"), None);
    }

    #[test]
    fn test_method_wire_tags() {
        assert_eq!(
            serde_json::to_value(IdentificationMethod::VisualProvider).unwrap(),
            serde_json::json!("plantnet")
        );
        assert_eq!(IdentificationMethod::parse("gemini"), Some(IdentificationMethod::GenerativeProvider));
        assert_eq!(IdentificationMethod::Manual.as_str(), "manual");
    }

    #[test]
    fn test_location_validation() {
        let ok = Location { latitude: 51.5, longitude: -0.12, address: None };
        assert!(ok.validate().is_ok());

        let bad_lat = Location { latitude: 91.0, longitude: 0.0, address: None };
        assert!(bad_lat.validate().is_err());

        let nan = Location { latitude: f64::NAN, longitude: 0.0, address: None };
        assert!(nan.validate().is_err());
    }
}
