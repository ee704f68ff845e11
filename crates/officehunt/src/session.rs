//! A player's hunt.
//!
//! [`HuntSession`] drives the capture → classify → persist loop: it owns the
//! hunt state machine, the catalog, and the stores, and writes the game
//! record back after every change.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capture::EncodedImage;
use crate::classify::{classify_fail_open, Classification, Classifier};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::game::{Hunt, Progress, Resolution, Summary};
use crate::items::{Catalog, TargetItem};
use crate::photos::PhotoStore;
use crate::storage::{Attempt, Storage};

/// Result of one capture attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptOutcome {
    /// The item that was hunted.
    pub item: TargetItem,
    /// What the classifier decided (after fail-open).
    pub classification: Classification,
    /// How the hunt moved.
    pub resolution: Resolution,
    /// Progress after the attempt.
    pub progress: Progress,
}

/// A hunt bound to its storage and classifier.
#[derive(Debug)]
pub struct HuntSession {
    storage: Storage,
    photos: PhotoStore,
    catalog: Catalog,
    classifier: Arc<dyn Classifier>,
    state_key: String,
    hunt: Hunt,
}

impl HuntSession {
    /// Open the session described by `config`, resuming any saved hunt.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or does not cover
    /// the target count, or if the database cannot be opened.
    pub fn open(config: &Config, classifier: Arc<dyn Classifier>) -> Result<Self> {
        let catalog = Catalog::load_or_builtin(config.game.items_path.as_deref())?;
        let storage = Storage::open(config.database_path())?;
        let photos = PhotoStore::new(config.photos_dir());
        Self::new(
            storage,
            photos,
            catalog,
            classifier,
            config.game.target_count,
            config.game.state_key.clone(),
        )
    }

    /// Build a session from its parts, resuming the record under `state_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog does not cover `target_count` or the
    /// record cannot be read.
    pub fn new(
        storage: Storage,
        photos: PhotoStore,
        catalog: Catalog,
        classifier: Arc<dyn Classifier>,
        target_count: usize,
        state_key: impl Into<String>,
    ) -> Result<Self> {
        catalog.ensure_covers(target_count)?;
        let state_key = state_key.into();

        let record = storage.load_record(&state_key)?;
        let hunt = Hunt::resume(record, target_count);
        if let Some(index) = hunt.current_index() {
            if index >= catalog.len() {
                return Err(Error::catalog(format!(
                    "saved hunt is at item {index} but the catalog has {} items",
                    catalog.len()
                )));
            }
        }
        debug!("Resumed hunt in phase {}", hunt.phase());

        Ok(Self {
            storage,
            photos,
            catalog,
            classifier,
            state_key,
            hunt,
        })
    }

    /// The hunt state.
    #[must_use]
    pub fn hunt(&self) -> &Hunt {
        &self.hunt
    }

    /// The item catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The backing storage.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The classifier in use.
    #[must_use]
    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// The item currently being hunted.
    #[must_use]
    pub fn current_item(&self) -> Option<&TargetItem> {
        self.hunt.current_item(&self.catalog)
    }

    /// Completion progress.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.hunt.progress()
    }

    /// The summary screen.
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary::build(&self.hunt, &self.catalog)
    }

    /// Start the hunt if it has not started, saving the fresh record.
    ///
    /// # Errors
    ///
    /// Returns an error if the hunt is complete or the record cannot be saved.
    pub fn start(&mut self) -> Result<()> {
        if self.hunt.current_index().is_some() {
            return Ok(());
        }
        self.hunt.start()?;
        self.storage.save_record(&self.state_key, self.hunt.record())?;
        info!("Hunt started with {} items", self.hunt.target_count());
        Ok(())
    }

    /// Validate a captured photo against the current item.
    ///
    /// Starts the hunt if needed. Classifier failures never fail the
    /// attempt; they resolve as an offline match.
    ///
    /// # Errors
    ///
    /// Returns an error if the hunt is complete, a validation is already
    /// running, or the game record cannot be saved. A failed save leaves the
    /// hunt on the same item. Failing to log the attempt is only a warning.
    pub async fn attempt(&mut self, image: &EncodedImage) -> Result<AttemptOutcome> {
        self.start()?;

        let index = self.hunt.begin_validation()?;
        let Some(item) = self.catalog.get(index).cloned() else {
            self.hunt.cancel_validation();
            return Err(Error::internal(format!("no catalog item at index {index}")));
        };

        info!("Validating capture for {}", item.name);
        let classification =
            classify_fail_open(self.classifier.as_ref(), image, &item.prompt_fragment).await;

        let new_photo = classification.matched && !self.photos.contains(image);
        let photo = if classification.matched {
            match self.photos.save(image) {
                Ok(reference) => Some(reference),
                Err(e) => {
                    self.hunt.cancel_validation();
                    return Err(e);
                }
            }
        } else {
            None
        };

        // The in-memory hunt only moves once the new record is on disk.
        let before = self.hunt.clone();
        let resolution = self.hunt.resolve(&self.catalog, &classification, photo)?;
        if let Err(e) = self.storage.save_record(&self.state_key, self.hunt.record()) {
            self.hunt = before;
            self.hunt.cancel_validation();
            if new_photo {
                if let Err(remove_err) = self.photos.remove(image) {
                    warn!("Failed to remove unsaved photo: {}", remove_err);
                }
            }
            return Err(e);
        }

        if let Err(e) = self
            .storage
            .record_attempt(&Attempt::new(item.id.clone(), &classification))
        {
            warn!("Failed to log attempt for {}: {}", item.id, e);
        }

        match &resolution {
            Resolution::Found {
                completed_hunt: true,
                ..
            } => info!("Hunt complete"),
            Resolution::Found { item, offline, .. } => {
                info!("Found {} (offline: {})", item, offline);
            }
            Resolution::NotFound { item } => info!("{} not found, try again", item),
        }

        Ok(AttemptOutcome {
            item,
            classification,
            resolution,
            progress: self.hunt.progress(),
        })
    }

    /// Throw away all progress, the attempt log, and stored photos.
    ///
    /// # Errors
    ///
    /// Returns an error if the stores cannot be cleared.
    pub fn restart(&mut self) -> Result<()> {
        self.hunt.restart();
        self.storage.clear_record(&self.state_key)?;
        self.storage.clear_attempts()?;
        self.photos.clear()?;
        info!("Hunt restarted");
        Ok(())
    }
}
