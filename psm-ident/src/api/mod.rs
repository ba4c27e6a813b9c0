//! HTTP API handlers for psm-ident

pub mod health;
pub mod identification;
pub mod photos;
pub mod profiles;
pub mod settings;
pub mod sightings;
pub mod tours;
pub mod users;

pub use health::health_routes;
pub use identification::identification_routes;
pub use photos::photo_routes;
pub use profiles::profile_routes;
pub use settings::settings_routes;
pub use sightings::sighting_routes;
pub use tours::tour_routes;
pub use users::user_routes;
