//! Identification services
//!
//! - [`sighting_lifecycle`]: the only writer of sighting identification state
//! - [`orchestrator`]: by-name, by-photo and enhancement flows
//! - [`entitlement`]: plan tier limits
//! - [`photo_store`]: stored photo upload, lookup and URL resolution

pub mod entitlement;
pub mod orchestrator;
pub mod photo_store;
pub mod sighting_lifecycle;

pub use entitlement::{entitlement_for_user, evaluate, Entitlement, Limit, TierLimits, UsageSnapshot};
pub use orchestrator::{
    EnhancementOutcome, FailureKind, IdentificationOrchestrator, IdentificationOutcome, PhotoStrategy,
};
pub use photo_store::{LocalPhotoStore, PhotoStore, StoredPhoto, MAX_PHOTO_BYTES};
pub use sighting_lifecycle::SightingLifecycle;
