//! Shared test fixtures
//!
//! Fake providers with call counters, an in-memory photo store and database
//! setup helpers. Not every test binary uses every helper.

#![allow(dead_code)]

use async_trait::async_trait;
use psm_ident::models::{
    Location, NewSighting, NewUser, PlantProfileDraft, ProfilePatch, Sighting, User,
};
use psm_ident::providers::{
    BotanicalContentGenerator, IdentifiedPlant, ImagePayload, NameValidation, ProviderError,
    ProviderSet, VisualIdentifier,
};
use psm_ident::services::{PhotoStore, StoredPhoto};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

/// 1x1 transparent PNG
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

// ============================================================================
// Database
// ============================================================================

pub async fn memory_db() -> SqlitePool {
    psm_ident::db::init_memory_database().await.unwrap()
}

/// File-backed database for tests that need several connections
///
/// Keep the TempDir alive for the duration of the test.
pub async fn temp_file_db() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = psm_ident::db::init_database(&dir.path().join("psm-test.db"))
        .await
        .unwrap();
    (dir, pool)
}

pub async fn seed_user(pool: &SqlitePool) -> User {
    let email = format!("{}@example.org", Uuid::new_v4());
    let (user, _) = psm_ident::db::users::create_user(pool, &NewUser::free(email, "Test Gardener"))
        .await
        .unwrap();
    user
}

pub async fn seed_sighting(pool: &SqlitePool, user_id: Uuid, photo_id: &str) -> Sighting {
    psm_ident::db::sightings::insert_sighting(
        pool,
        &NewSighting {
            user_id,
            photo_id: photo_id.to_string(),
            location: Location {
                latitude: 48.8566,
                longitude: 2.3522,
                address: None,
            },
            user_provided_name: None,
            private_notes: None,
        },
    )
    .await
    .unwrap()
}

pub fn draft(scientific_name: &str, common_names: &[&str]) -> PlantProfileDraft {
    let mut draft = PlantProfileDraft::new(scientific_name);
    draft.common_names = common_names.iter().map(|s| s.to_string()).collect();
    draft.description = Some(format!("{} test description.", scientific_name));
    draft
}

pub fn identified(scientific_name: &str, confidence: f64) -> IdentifiedPlant {
    IdentifiedPlant {
        draft: draft(scientific_name, &[]),
        confidence,
    }
}

// ============================================================================
// Fake providers
// ============================================================================

/// Visual provider returning a scripted result
pub struct FakeVisual {
    result: Result<IdentifiedPlant, ProviderError>,
    panic_on_identify: bool,
    pub calls: AtomicUsize,
}

impl FakeVisual {
    pub fn returning(result: Result<IdentifiedPlant, ProviderError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            panic_on_identify: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn panicking() -> Arc<Self> {
        Arc::new(Self {
            result: Err(ProviderError::Unavailable("not scripted".to_string())),
            panic_on_identify: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisualIdentifier for FakeVisual {
    fn name(&self) -> &'static str {
        "fake-visual"
    }

    async fn identify(&self, _image: &ImagePayload) -> Result<IdentifiedPlant, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_identify {
            panic!("scripted visual provider panic");
        }
        self.result.clone()
    }
}

/// Generative provider with a scripted result per capability
pub struct FakeGenerative {
    pub validation: Result<NameValidation, ProviderError>,
    pub enhancement: Result<ProfilePatch, ProviderError>,
    /// `None` means image identification is not supported
    pub image: Option<Result<IdentifiedPlant, ProviderError>>,
    pub panic_on_validate: bool,
    pub panic_on_image: bool,
    pub validate_calls: AtomicUsize,
    pub enhance_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
}

impl Default for FakeGenerative {
    fn default() -> Self {
        Self {
            validation: Err(ProviderError::Unavailable("not scripted".to_string())),
            enhancement: Err(ProviderError::Unavailable("not scripted".to_string())),
            image: None,
            panic_on_validate: false,
            panic_on_image: false,
            validate_calls: AtomicUsize::new(0),
            enhance_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeGenerative {
    pub fn validate_count(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn enhance_count(&self) -> usize {
        self.enhance_calls.load(Ordering::SeqCst)
    }

    pub fn image_count(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.validate_count() + self.enhance_count() + self.image_count()
    }
}

#[async_trait]
impl BotanicalContentGenerator for FakeGenerative {
    fn name(&self) -> &'static str {
        "fake-generative"
    }

    async fn validate_and_describe(&self, _typed_name: &str) -> Result<NameValidation, ProviderError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_validate {
            panic!("scripted provider panic");
        }
        self.validation.clone()
    }

    async fn enhance(
        &self,
        _scientific_name: &str,
        _common_names: &[String],
    ) -> Result<ProfilePatch, ProviderError> {
        self.enhance_calls.fetch_add(1, Ordering::SeqCst);
        self.enhancement.clone()
    }

    fn supports_image_identification(&self) -> bool {
        self.image.is_some()
    }

    async fn identify_image(&self, _image: &ImagePayload) -> Result<IdentifiedPlant, ProviderError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_image {
            panic!("scripted image identification panic");
        }
        match &self.image {
            Some(result) => result.clone(),
            None => Err(ProviderError::Unavailable("not supported".to_string())),
        }
    }
}

pub fn providers(
    visual: Option<Arc<FakeVisual>>,
    generative: Option<Arc<FakeGenerative>>,
) -> ProviderSet {
    ProviderSet {
        visual: visual.map(|v| v as Arc<dyn VisualIdentifier>),
        generative: generative.map(|g| g as Arc<dyn BotanicalContentGenerator>),
    }
}

// ============================================================================
// Photo store
// ============================================================================

/// Photo store keeping images in memory
#[derive(Default)]
pub struct MemoryPhotoStore {
    photos: Mutex<HashMap<String, ImagePayload>>,
}

impl MemoryPhotoStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a PNG under a fixed id
    pub fn with_photo(self: Arc<Self>, photo_id: &str) -> Arc<Self> {
        self.photos
            .lock()
            .unwrap()
            .insert(photo_id.to_string(), ImagePayload::new(PNG_BYTES.to_vec(), "image/png"));
        self
    }
}

#[async_trait]
impl PhotoStore for MemoryPhotoStore {
    async fn upload(&self, bytes: Vec<u8>) -> psm_common::Result<StoredPhoto> {
        let kind = psm_ident::services::photo_store::detect_image(&bytes)?;
        let photo_id = format!("{}.{}", Uuid::new_v4(), kind.extension());
        self.photos
            .lock()
            .unwrap()
            .insert(photo_id.clone(), ImagePayload::new(bytes, kind.mime_type()));
        Ok(StoredPhoto {
            url: format!("memory://photos/{}", photo_id),
            mime_type: kind.mime_type().to_string(),
            photo_id,
        })
    }

    async fn resolve_url(&self, photo_id: &str) -> Option<String> {
        self.photos
            .lock()
            .unwrap()
            .contains_key(photo_id)
            .then(|| format!("memory://photos/{}", photo_id))
    }

    async fn fetch(&self, photo_id: &str) -> psm_common::Result<ImagePayload> {
        self.photos
            .lock()
            .unwrap()
            .get(photo_id)
            .cloned()
            .ok_or_else(|| psm_common::Error::NotFound(format!("Photo {}", photo_id)))
    }
}
