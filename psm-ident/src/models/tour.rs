//! Tours: ordered, user-curated sequences of sightings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PlantProfile, Sighting};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTour {
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourStop {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub sighting_id: Uuid,
    /// Zero-based position within the tour
    pub order: i64,
    pub custom_notes: Option<String>,
}

/// Stop joined with its sighting and, if identified, the plant profile
#[derive(Debug, Clone, Serialize)]
pub struct TourStopDetail {
    #[serde(flatten)]
    pub stop: TourStop,
    pub sighting: Sighting,
    pub plant_profile: Option<PlantProfile>,
    /// Resolved photo URL, absent when the photo store cannot resolve it
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TourWithStops {
    #[serde(flatten)]
    pub tour: Tour,
    pub stops: Vec<TourStopDetail>,
}
