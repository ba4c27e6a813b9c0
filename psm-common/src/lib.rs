//! # PSM Common Library
//!
//! Shared code for the plant sightings services:
//! - Error and result types
//! - Bootstrap configuration loading and root folder resolution
//! - Database initialization (schema, pragmas)
//! - Time helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
