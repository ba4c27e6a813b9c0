//! Database access for psm-ident
//!
//! Free functions over the shared `SqlitePool`, one module per table group.
//! Schema creation lives in `psm_common::db`.

pub mod profiles;
pub mod settings;
pub mod sightings;
pub mod tours;
pub mod usage;
pub mod users;

pub use psm_common::db::{init_database, init_memory_database};
