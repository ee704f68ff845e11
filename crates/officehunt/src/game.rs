//! The hunt state machine.
//!
//! A hunt walks the catalog strictly in order. Each item is presented,
//! validated against the classifier, and either marked found (advancing to
//! the next item) or retried. The persisted [`GameRecord`] holds the durable
//! part of that state; [`Phase`] is the tagged in-memory state built on top
//! of it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::Classification;
use crate::error::{Error, Result};
use crate::items::{Catalog, TargetItem};

/// A captured photo for a found item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRef {
    /// Where the photo is stored.
    pub reference: String,
    /// Whether the item was accepted because the classifier was unreachable.
    #[serde(default)]
    pub offline: bool,
    /// When the photo was captured. Records written without it load with
    /// the Unix epoch.
    #[serde(default)]
    pub captured_at: DateTime<Utc>,
}

/// The persisted game record.
///
/// Created at game start and rewritten after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameRecord {
    /// Names of found items, in the order they were found.
    pub completed_items: Vec<String>,
    /// Index of the item currently being hunted.
    pub current_item_index: usize,
    /// Photo captured for each found item, keyed by item name.
    pub captured_photos: BTreeMap<String, PhotoRef>,
    /// Whether every target has been found.
    pub is_complete: bool,
}

impl GameRecord {
    /// Number of items found so far.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed_items.len()
    }

    /// Check whether an item has been found.
    #[must_use]
    pub fn is_found(&self, name: &str) -> bool {
        self.completed_items.iter().any(|n| n == name)
    }
}

/// Where the hunt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// No hunt is in progress.
    NotStarted,
    /// The item at `index` is shown and the player may capture.
    Presenting {
        /// Index of the presented item.
        index: usize,
    },
    /// A capture of the item at `index` is being classified.
    Validating {
        /// Index of the item being validated.
        index: usize,
    },
    /// Every target has been found.
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Presenting { index } => write!(f, "presenting item {}", index + 1),
            Self::Validating { index } => write!(f, "validating item {}", index + 1),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// The outcome of resolving a validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Resolution {
    /// The item was found; the hunt moved on.
    Found {
        /// Name of the found item.
        item: String,
        /// Whether it was accepted in offline mode.
        offline: bool,
        /// Whether this find completed the hunt.
        completed_hunt: bool,
    },
    /// The photo did not match; the same item is presented again.
    NotFound {
        /// Name of the item still being hunted.
        item: String,
    },
}

/// Completion progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Items found.
    pub completed: usize,
    /// Items required.
    pub total: usize,
    /// Rounded percentage found.
    pub percentage: u8,
}

impl Progress {
    /// Compute progress for `completed` out of `total`.
    #[must_use]
    pub fn new(completed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            // Rounded half-up integer division.
            u8::try_from((completed.min(total) * 200 + total) / (total * 2)).unwrap_or(100)
        };
        Self {
            completed,
            total,
            percentage,
        }
    }
}

/// A hunt: the persisted record plus its current phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunt {
    record: GameRecord,
    phase: Phase,
    target_count: usize,
}

impl Hunt {
    /// Create a hunt that has not started yet.
    #[must_use]
    pub fn new(target_count: usize) -> Self {
        Self {
            record: GameRecord::default(),
            phase: Phase::NotStarted,
            target_count,
        }
    }

    /// Rebuild a hunt from a persisted record.
    ///
    /// A missing record gives a hunt that has not started.
    #[must_use]
    pub fn resume(record: Option<GameRecord>, target_count: usize) -> Self {
        let Some(mut record) = record else {
            return Self::new(target_count);
        };

        // Completion is decided by the completed list alone.
        record.is_complete = record.completed_count() >= target_count;
        let phase = if record.is_complete {
            Phase::Complete
        } else {
            Phase::Presenting {
                index: record.current_item_index,
            }
        };

        Self {
            record,
            phase,
            target_count,
        }
    }

    /// The persisted part of the hunt.
    #[must_use]
    pub fn record(&self) -> &GameRecord {
        &self.record
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of items required to finish.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Check whether the hunt is complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Index of the item being hunted, if any.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        match self.phase {
            Phase::Presenting { index } | Phase::Validating { index } => Some(index),
            Phase::NotStarted | Phase::Complete => None,
        }
    }

    /// Item being hunted, if any.
    #[must_use]
    pub fn current_item<'a>(&self, catalog: &'a Catalog) -> Option<&'a TargetItem> {
        self.current_index().and_then(|index| catalog.get(index))
    }

    /// Completion progress.
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::new(self.record.completed_count(), self.target_count)
    }

    /// Start the hunt, presenting the first item.
    ///
    /// Starting a hunt that is already running is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the hunt is complete; restart it first.
    pub fn start(&mut self) -> Result<()> {
        match self.phase {
            Phase::NotStarted => {
                self.record = GameRecord::default();
                self.phase = Phase::Presenting { index: 0 };
                Ok(())
            }
            Phase::Presenting { .. } | Phase::Validating { .. } => Ok(()),
            Phase::Complete => Err(Error::invalid_transition("start", self.phase)),
        }
    }

    /// Move the presented item into validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationInFlight`] if a validation is already
    /// running, or an invalid transition error if no item is presented.
    pub fn begin_validation(&mut self) -> Result<usize> {
        match self.phase {
            Phase::Presenting { index } => {
                self.phase = Phase::Validating { index };
                Ok(index)
            }
            Phase::Validating { .. } => Err(Error::ValidationInFlight),
            Phase::NotStarted | Phase::Complete => {
                Err(Error::invalid_transition("capture", self.phase))
            }
        }
    }

    /// Resolve the running validation with a classification.
    ///
    /// A match marks the item found, storing `photo` as its reference. A
    /// mismatch returns the hunt to presenting the same item.
    ///
    /// # Errors
    ///
    /// Returns an error if no validation is running or the item is missing
    /// from the catalog.
    pub fn resolve(
        &mut self,
        catalog: &Catalog,
        classification: &Classification,
        photo: Option<String>,
    ) -> Result<Resolution> {
        let Phase::Validating { index } = self.phase else {
            return Err(Error::invalid_transition("resolve a capture", self.phase));
        };
        let item = catalog
            .get(index)
            .ok_or_else(|| Error::internal(format!("no catalog item at index {index}")))?;

        if !classification.matched {
            self.phase = Phase::Presenting { index };
            return Ok(Resolution::NotFound {
                item: item.name.clone(),
            });
        }

        self.complete_item(item, classification.offline, photo);
        Ok(Resolution::Found {
            item: item.name.clone(),
            offline: classification.offline,
            completed_hunt: self.is_complete(),
        })
    }

    /// Abandon a running validation without changing progress.
    pub fn cancel_validation(&mut self) {
        if let Phase::Validating { index } = self.phase {
            self.phase = Phase::Presenting { index };
        }
    }

    /// Clear all progress.
    pub fn restart(&mut self) {
        self.record = GameRecord::default();
        self.phase = Phase::NotStarted;
    }

    fn complete_item(&mut self, item: &TargetItem, offline: bool, photo: Option<String>) {
        let record = &mut self.record;
        if !record.is_found(&item.name) {
            record.completed_items.push(item.name.clone());
        }
        if let Some(reference) = photo {
            record.captured_photos.insert(
                item.name.clone(),
                PhotoRef {
                    reference,
                    offline,
                    captured_at: Utc::now(),
                },
            );
        }
        record.current_item_index += 1;
        record.is_complete = record.completed_count() >= self.target_count;

        self.phase = if record.is_complete {
            Phase::Complete
        } else {
            Phase::Presenting {
                index: record.current_item_index,
            }
        };
    }
}

/// One row of the summary screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    /// Item id.
    pub id: String,
    /// Item name.
    pub name: String,
    /// Whether the item was found.
    pub found: bool,
    /// Whether it was accepted in offline mode.
    pub offline: bool,
    /// Reference to the captured photo.
    pub photo: Option<String>,
}

/// The end-of-hunt summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// One row per hunted item.
    pub rows: Vec<SummaryRow>,
    /// Items found.
    pub found: usize,
    /// Items required.
    pub total: usize,
    /// Whether the hunt is complete.
    pub is_complete: bool,
}

impl Summary {
    /// Build the summary for a hunt.
    #[must_use]
    pub fn build(hunt: &Hunt, catalog: &Catalog) -> Self {
        let record = hunt.record();
        let rows: Vec<SummaryRow> = catalog
            .items()
            .iter()
            .take(hunt.target_count())
            .map(|item| {
                let photo = record.captured_photos.get(&item.name);
                SummaryRow {
                    id: item.id.clone(),
                    name: item.name.clone(),
                    found: record.is_found(&item.name),
                    offline: photo.is_some_and(|p| p.offline),
                    photo: photo.map(|p| p.reference.clone()),
                }
            })
            .collect();

        Self {
            found: rows.iter().filter(|row| row.found).count(),
            total: hunt.target_count(),
            is_complete: hunt.is_complete(),
            rows,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_complete {
            writeln!(f, "Hunt Complete!")?;
        } else {
            writeln!(f, "Progress Summary")?;
        }
        writeln!(f, "You found {} out of {} items!", self.found, self.total)?;
        writeln!(f)?;
        for row in &self.rows {
            let mark = if row.found { "x" } else { " " };
            write!(f, "  [{mark}] {}", row.name)?;
            if row.offline {
                write!(f, " (offline)")?;
            }
            if let Some(photo) = &row.photo {
                write!(f, "  {photo}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found() -> Classification {
        Classification::matched()
    }

    fn not_found() -> Classification {
        Classification::rejected()
    }

    fn capture(hunt: &mut Hunt, catalog: &Catalog, result: &Classification) -> Resolution {
        hunt.begin_validation().unwrap();
        hunt.resolve(catalog, result, Some("photo.jpg".to_string()))
            .unwrap()
    }

    #[test]
    fn test_new_hunt_not_started() {
        let hunt = Hunt::new(5);
        assert_eq!(hunt.phase(), Phase::NotStarted);
        assert_eq!(hunt.current_index(), None);
        assert_eq!(hunt.progress(), Progress::new(0, 5));
    }

    #[test]
    fn test_start_presents_first_item() {
        let catalog = Catalog::builtin();
        let mut hunt = Hunt::new(5);
        hunt.start().unwrap();

        assert_eq!(hunt.phase(), Phase::Presenting { index: 0 });
        assert_eq!(hunt.current_item(&catalog).unwrap().id, "bottle");
    }

    #[test]
    fn test_completed_count_tracks_successes() {
        let catalog = Catalog::builtin();
        for n in 0..=5 {
            let mut hunt = Hunt::new(5);
            hunt.start().unwrap();
            for _ in 0..n {
                capture(&mut hunt, &catalog, &found());
            }
            assert_eq!(hunt.record().completed_count(), n);
            assert_eq!(hunt.is_complete(), n == 5);
            assert_eq!(hunt.record().is_complete, n == 5);
        }
    }

    #[test]
    fn test_full_hunt_reaches_complete() {
        let catalog = Catalog::builtin();
        let mut hunt = Hunt::new(5);
        hunt.start().unwrap();

        let mut last = None;
        for _ in 0..5 {
            last = Some(capture(&mut hunt, &catalog, &found()));
        }

        assert_eq!(hunt.phase(), Phase::Complete);
        assert_eq!(
            last,
            Some(Resolution::Found {
                item: "Stapler".to_string(),
                offline: false,
                completed_hunt: true,
            })
        );

        let summary = Summary::build(&hunt, &catalog);
        assert_eq!((summary.found, summary.total), (5, 5));
        assert!(summary.is_complete);
        assert!(summary.to_string().contains("You found 5 out of 5 items!"));
    }

    #[test]
    fn test_not_found_retries_same_item() {
        let catalog = Catalog::builtin();
        let mut hunt = Hunt::new(5);
        hunt.start().unwrap();

        let resolution = capture(&mut hunt, &catalog, &not_found());
        assert_eq!(
            resolution,
            Resolution::NotFound {
                item: "Water Bottle".to_string()
            }
        );
        assert_eq!(hunt.phase(), Phase::Presenting { index: 0 });
        assert_eq!(hunt.record().completed_count(), 0);
    }

    #[test]
    fn test_offline_match_is_recorded() {
        let catalog = Catalog::builtin();
        let mut hunt = Hunt::new(5);
        hunt.start().unwrap();
        capture(&mut hunt, &catalog, &found());

        let resolution = capture(&mut hunt, &catalog, &Classification::offline("timeout"));
        assert_eq!(
            resolution,
            Resolution::Found {
                item: "Chair".to_string(),
                offline: true,
                completed_hunt: false,
            }
        );
        assert!(hunt.record().captured_photos["Chair"].offline);

        let summary = Summary::build(&hunt, &catalog);
        assert!(summary.rows[1].offline);
        assert!(summary.to_string().contains("Chair (offline)"));
    }

    #[test]
    fn test_second_validation_is_rejected() {
        let mut hunt = Hunt::new(5);
        hunt.start().unwrap();
        hunt.begin_validation().unwrap();

        assert!(matches!(
            hunt.begin_validation(),
            Err(Error::ValidationInFlight)
        ));
    }

    #[test]
    fn test_capture_before_start_is_rejected() {
        let mut hunt = Hunt::new(5);
        assert!(matches!(
            hunt.begin_validation(),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_resolve_without_validation_is_rejected() {
        let catalog = Catalog::builtin();
        let mut hunt = Hunt::new(5);
        hunt.start().unwrap();
        assert!(hunt.resolve(&catalog, &found(), None).is_err());
    }

    #[test]
    fn test_complete_is_terminal() {
        let catalog = Catalog::builtin();
        let mut hunt = Hunt::new(1);
        hunt.start().unwrap();
        capture(&mut hunt, &catalog, &found());

        assert!(hunt.is_complete());
        assert!(hunt.begin_validation().is_err());
        assert!(hunt.start().is_err());
    }

    #[test]
    fn test_cancel_validation_keeps_progress() {
        let mut hunt = Hunt::new(5);
        hunt.start().unwrap();
        hunt.begin_validation().unwrap();
        hunt.cancel_validation();
        assert_eq!(hunt.phase(), Phase::Presenting { index: 0 });
    }

    #[test]
    fn test_index_never_decreases() {
        let catalog = Catalog::builtin();
        let mut hunt = Hunt::new(5);
        hunt.start().unwrap();

        let mut last = 0;
        for result in [found(), not_found(), found(), not_found(), found()] {
            capture(&mut hunt, &catalog, &result);
            let index = hunt.record().current_item_index;
            assert!(index >= last);
            last = index;
        }
        assert_eq!(last, 3);
    }

    #[test]
    fn test_restart_resets_everything() {
        let catalog = Catalog::builtin();
        let mut hunt = Hunt::new(5);
        hunt.start().unwrap();
        capture(&mut hunt, &catalog, &found());

        hunt.restart();
        assert_eq!(hunt.phase(), Phase::NotStarted);
        assert_eq!(hunt.record(), &GameRecord::default());
        assert_eq!(hunt.record().current_item_index, 0);
    }

    #[test]
    fn test_resume_from_record() {
        let record = GameRecord {
            completed_items: vec!["Water Bottle".to_string(), "Chair".to_string()],
            current_item_index: 2,
            ..GameRecord::default()
        };
        let hunt = Hunt::resume(Some(record), 5);
        assert_eq!(hunt.phase(), Phase::Presenting { index: 2 });
        assert_eq!(hunt.progress().percentage, 40);
    }

    #[test]
    fn test_resume_complete_record() {
        let record = GameRecord {
            completed_items: (0..5).map(|i| format!("item {i}")).collect(),
            current_item_index: 5,
            is_complete: false,
            ..GameRecord::default()
        };
        let hunt = Hunt::resume(Some(record), 5);
        assert!(hunt.is_complete());
        assert!(hunt.record().is_complete);
    }

    #[test]
    fn test_resume_without_record() {
        assert_eq!(Hunt::resume(None, 5), Hunt::new(5));
    }

    #[test]
    fn test_progress_rounding() {
        assert_eq!(Progress::new(1, 3).percentage, 33);
        assert_eq!(Progress::new(2, 3).percentage, 67);
        assert_eq!(Progress::new(5, 5).percentage, 100);
        assert_eq!(Progress::new(0, 0).percentage, 0);
    }

    #[test]
    fn test_record_json_shape() {
        let record = GameRecord {
            completed_items: vec!["Chair".to_string()],
            current_item_index: 1,
            ..GameRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["completedItems"][0], "Chair");
        assert_eq!(json["currentItemIndex"], 1);
        assert_eq!(json["isComplete"], false);
    }

    #[test]
    fn test_photo_without_timestamp_loads() {
        let photo: PhotoRef =
            serde_json::from_value(serde_json::json!({"reference": "photos/a.jpg"})).unwrap();
        assert_eq!(photo.reference, "photos/a.jpg");
        assert_eq!(photo.captured_at, DateTime::<Utc>::default());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Presenting { index: 0 }.to_string(), "presenting item 1");
        assert_eq!(Phase::Complete.to_string(), "complete");
    }
}
