//! Lightbox configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults
//! match the markup written by [`render`](crate::render), so a page rendered
//! by this crate needs no config file at all. A `config.toml` next to the
//! page (or in `--config-dir`) overrides only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [markup]
//! gallery_class = "thumbnails"     # Gallery container marker
//! gallery_id_attr = "data-gallery" # Stable gallery identifier
//! thumbnail_class = "thumb"        # Thumbnail marker inside a gallery
//! full_source_attr = "data-full"   # Full-resolution source on a thumbnail
//! deferred_source_attr = "data-src"
//! lazy_class = "lazy"              # Deferred-load image marker
//! loaded_class = "loaded"          # Added once a lazy image has loaded
//! scrollable_class = "scrollable"  # Added to galleries above static_max
//! static_max = 2                   # Largest gallery laid out statically
//!
//! [modal]
//! container_id = "image-modal"
//! image_id = "modal-image"
//! close_id = "modal-close"
//! next_id = "modal-next"
//! prev_id = "modal-prev"
//! open_class = "open"
//!
//! [touch]
//! swipe_threshold = 40.0           # Horizontal px a swipe must exceed
//!
//! [lazy]
//! root_margin = "200px 0px"        # Viewport expansion, CSS margin syntax
//! threshold = 0.01                 # Visible fraction that triggers loading
//!
//! [viewport]
//! height = 900.0                   # Simulated viewport height for replay
//! row_height = 320.0               # Estimated height of one gallery row
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::lazy::{ProximityOptions, RootMargin};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Lightbox configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Class and attribute names the registry and loader read from markup.
    pub markup: MarkupConfig,
    /// Element ids of the modal chrome.
    pub modal: ModalConfig,
    /// Touch gesture settings.
    pub touch: TouchConfig,
    /// Proximity watcher settings.
    pub lazy: LazyConfig,
    /// Simulated viewport used when replaying scripts.
    pub viewport: ViewportConfig,
}

impl ViewerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("markup.gallery_class", &self.markup.gallery_class),
            ("markup.gallery_id_attr", &self.markup.gallery_id_attr),
            ("markup.thumbnail_class", &self.markup.thumbnail_class),
            ("markup.full_source_attr", &self.markup.full_source_attr),
            ("markup.deferred_source_attr", &self.markup.deferred_source_attr),
            ("markup.lazy_class", &self.markup.lazy_class),
            ("markup.loaded_class", &self.markup.loaded_class),
            ("markup.scrollable_class", &self.markup.scrollable_class),
            ("modal.open_class", &self.modal.open_class),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        let threshold = self.touch.swipe_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Validation(
                "touch.swipe_threshold must be a non-negative number".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.lazy.threshold) {
            return Err(ConfigError::Validation(
                "lazy.threshold must be between 0 and 1".into(),
            ));
        }
        self.lazy.root_margin()?;
        for key in self.markup.renamed_data_attributes() {
            warn!(
                key,
                "renamed data attribute: pages from `gal-lightbox render` still use the stock name"
            );
        }
        if self.viewport.height <= 0.0 || self.viewport.row_height <= 0.0 {
            return Err(ConfigError::Validation(
                "viewport.height and viewport.row_height must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Markup conventions shared by the registry and the lazy loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkupConfig {
    pub gallery_class: String,
    pub gallery_id_attr: String,
    pub thumbnail_class: String,
    pub full_source_attr: String,
    pub deferred_source_attr: String,
    pub lazy_class: String,
    pub loaded_class: String,
    pub scrollable_class: String,
    /// Galleries with at most this many items are laid out statically.
    pub static_max: usize,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            gallery_class: "thumbnails".to_string(),
            gallery_id_attr: "data-gallery".to_string(),
            thumbnail_class: "thumb".to_string(),
            full_source_attr: "data-full".to_string(),
            deferred_source_attr: "data-src".to_string(),
            lazy_class: "lazy".to_string(),
            loaded_class: "loaded".to_string(),
            scrollable_class: "scrollable".to_string(),
            static_max: 2,
        }
    }
}

impl MarkupConfig {
    /// Config keys of data attributes renamed away from the stock names.
    ///
    /// The renderer always writes `data-gallery`, `data-full` and `data-src`,
    /// so a page it produces is only read back in full by a config that keeps
    /// those names.
    pub fn renamed_data_attributes(&self) -> Vec<&'static str> {
        let stock = Self::default();
        [
            ("markup.gallery_id_attr", &self.gallery_id_attr, &stock.gallery_id_attr),
            ("markup.full_source_attr", &self.full_source_attr, &stock.full_source_attr),
            (
                "markup.deferred_source_attr",
                &self.deferred_source_attr,
                &stock.deferred_source_attr,
            ),
        ]
        .into_iter()
        .filter(|(_, value, stock)| value != stock)
        .map(|(key, _, _)| key)
        .collect()
    }
}

/// Element ids of the overlay and its controls.
///
/// Any control may be missing from a page; its input adapter is then simply
/// not wired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModalConfig {
    pub container_id: String,
    pub image_id: String,
    pub close_id: String,
    pub next_id: String,
    pub prev_id: String,
    /// Class toggled on the container while the modal is open.
    pub open_class: String,
}

impl Default for ModalConfig {
    fn default() -> Self {
        Self {
            container_id: "image-modal".to_string(),
            image_id: "modal-image".to_string(),
            close_id: "modal-close".to_string(),
            next_id: "modal-next".to_string(),
            prev_id: "modal-prev".to_string(),
            open_class: "open".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TouchConfig {
    /// Horizontal displacement a swipe must exceed to navigate.
    pub swipe_threshold: f64,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            swipe_threshold: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LazyConfig {
    /// CSS margin shorthand (`"200px 0px"`) expanding the viewport.
    pub root_margin: String,
    /// Fraction of an element that must be inside the expanded viewport.
    pub threshold: f64,
}

impl LazyConfig {
    pub fn root_margin(&self) -> Result<RootMargin, ConfigError> {
        self.root_margin
            .parse()
            .map_err(|e| ConfigError::Validation(format!("lazy.root_margin: {e}")))
    }

    pub fn proximity_options(&self) -> Result<ProximityOptions, ConfigError> {
        Ok(ProximityOptions {
            root_margin: self.root_margin()?,
            threshold: self.threshold,
        })
    }
}

impl Default for LazyConfig {
    fn default() -> Self {
        Self {
            root_margin: "200px 0px".to_string(),
            threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewportConfig {
    pub height: f64,
    pub row_height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            height: 900.0,
            row_height: 320.0,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ViewerConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `config.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ViewerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ViewerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<ViewerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# gal-lightbox Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults, which match the markup produced by
# `gal-lightbox render`. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Page markup conventions
# ---------------------------------------------------------------------------
[markup]
# Class marking a gallery container.
gallery_class = "thumbnails"

# The three data attributes below are read from any page, but
# `gal-lightbox render` always writes the stock names. Renaming one means
# rendered pages lose that feature (ids get synthesized, sources fall back,
# or nothing loads lazily) when read back with this config.

# Attribute holding a gallery's stable id. Galleries without one get a
# random id for the session.
gallery_id_attr = "data-gallery"

# Class marking a thumbnail inside a gallery. When a gallery has none, every
# image inside it is treated as a thumbnail.
thumbnail_class = "thumb"

# Attribute on a thumbnail naming the full-resolution image to show.
full_source_attr = "data-full"

# Attribute holding a deferred image source until it is promoted to src.
deferred_source_attr = "data-src"

# Class marking images that load lazily, and the class added once loaded.
lazy_class = "lazy"
loaded_class = "loaded"

# Galleries with more than `static_max` items get `scrollable_class` and
# become keyboard-focusable.
scrollable_class = "scrollable"
static_max = 2

# ---------------------------------------------------------------------------
# Modal overlay
# ---------------------------------------------------------------------------
[modal]
container_id = "image-modal"
image_id = "modal-image"
close_id = "modal-close"
next_id = "modal-next"
prev_id = "modal-prev"

# Class toggled on the container while the overlay is open.
open_class = "open"

# ---------------------------------------------------------------------------
# Touch
# ---------------------------------------------------------------------------
[touch]
# Horizontal distance a swipe must exceed to navigate. Shorter movements
# count as taps.
swipe_threshold = 40.0

# ---------------------------------------------------------------------------
# Lazy loading
# ---------------------------------------------------------------------------
[lazy]
# How far beyond the viewport images start loading (CSS margin syntax,
# px values only).
root_margin = "200px 0px"

# Fraction of an image that must be inside the expanded viewport.
threshold = 0.01

# ---------------------------------------------------------------------------
# Replay viewport
# ---------------------------------------------------------------------------
[viewport]
# Simulated viewport height used by `gal-lightbox replay`.
height = 900.0

# Estimated height of one gallery row when laying out a page for replay.
row_height = 320.0
"##
}
