//! Domain models for plant identification

pub mod plant_profile;
pub mod sighting;
pub mod tour;
pub mod user;

pub use plant_profile::{PlantProfile, PlantProfileDraft, ProfileDetails, ProfilePatch};
pub use sighting::{
    IdentificationMethod, IdentificationStatus, Location, NewSighting, Sighting, SightingEdit,
};
pub use tour::{NewTour, Tour, TourStop, TourStopDetail, TourWithStops};
pub use user::{NewUser, PlanTier, SubscriptionStatus, User};
