//! Target items the player has to find.
//!
//! The catalog is static configuration: either the built-in office set or a
//! JSON list in the same shape as the web client's `items.json`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// An object the player must photograph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetItem {
    /// Stable identifier (lowercase, `[a-z0-9_-]`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Reference to the overlay image that helps frame the object.
    #[serde(alias = "overlayUrl")]
    pub overlay_path: String,
    /// Noun phrase spliced into the yes/no question, e.g. "a chair".
    pub prompt_fragment: String,
}

impl TargetItem {
    /// Create a new target item.
    #[must_use]
    pub fn new(id: &str, name: &str, prompt_fragment: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            overlay_path: format!("/targets/{id}.svg"),
            prompt_fragment: prompt_fragment.to_string(),
        }
    }

    /// Check whether `key` names this item by id or display name.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        self.id.eq_ignore_ascii_case(key) || self.name.eq_ignore_ascii_case(key)
    }
}

/// The ordered list of items for a hunt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    items: Vec<TargetItem>,
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("static pattern is valid"))
}

impl Catalog {
    /// Build a catalog from items, validating them.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, an id is malformed or repeated,
    /// or a name or prompt fragment is blank.
    pub fn new(items: Vec<TargetItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::catalog("the catalog has no items"));
        }

        let mut seen = HashSet::new();
        for item in &items {
            if !id_pattern().is_match(&item.id) {
                return Err(Error::catalog(format!("malformed item id '{}'", item.id)));
            }
            if !seen.insert(item.id.as_str()) {
                return Err(Error::catalog(format!("duplicate item id '{}'", item.id)));
            }
            if item.name.trim().is_empty() {
                return Err(Error::catalog(format!("item '{}' has no name", item.id)));
            }
            if item.prompt_fragment.trim().is_empty() {
                return Err(Error::catalog(format!(
                    "item '{}' has no prompt fragment",
                    item.id
                )));
            }
        }

        Ok(Self { items })
    }

    /// The built-in office catalog.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            items: vec![
                TargetItem::new("bottle", "Water Bottle", "a water bottle"),
                TargetItem::new("chair", "Chair", "a chair"),
                TargetItem::new("keyboard", "Keyboard", "a keyboard"),
                TargetItem::new("mug", "Coffee Mug", "a coffee mug"),
                TargetItem::new("stapler", "Stapler", "a stapler"),
            ],
        }
    }

    /// Load a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let items: Vec<TargetItem> = serde_json::from_str(&raw)?;
        debug!("Loaded {} items from {}", items.len(), path.display());
        Self::new(items)
    }

    /// Load from `path` when given, otherwise return the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if a given file cannot be loaded.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::builtin()), Self::load)
    }

    /// Check that the catalog holds enough items for a hunt.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer items than `target_count`.
    pub fn ensure_covers(&self, target_count: usize) -> Result<()> {
        if self.items.len() < target_count {
            return Err(Error::catalog(format!(
                "target count is {target_count} but the catalog only has {} items",
                self.items.len()
            )));
        }
        Ok(())
    }

    /// Get the item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TargetItem> {
        self.items.get(index)
    }

    /// Find an item by id or display name.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&TargetItem> {
        self.items.iter().find(|item| item.matches(key))
    }

    /// All items in hunt order.
    #[must_use]
    pub fn items(&self) -> &[TargetItem] {
        &self.items
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the catalog is empty (never true for a validated catalog).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
