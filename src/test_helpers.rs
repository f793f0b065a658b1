//! Shared test utilities for the gal-lightbox test suite.
//!
//! Provides the portfolio fixture, lookup helpers that panic with a listing
//! of what *was* available, and a recording [`Overlay`] for asserting modal
//! side effects in order.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let doc = fixture_document();
//! let registry = Registry::build(&doc, &MarkupConfig::default());
//!
//! let gallery = find_gallery(&registry, "landscapes");
//! assert_eq!(item_sources(gallery)[1], "full/landscapes/02-ridge.jpg");
//! let thumb = thumbnail_node(&doc, "landscapes", 1);
//! ```

use std::path::Path;

use crate::config::MarkupConfig;
use crate::dom::{Document, NodeId};
use crate::modal::Overlay;
use crate::registry::{Gallery, Registry};

// =========================================================================
// Fixture setup
// =========================================================================

/// Parse `fixtures/portfolio.html`.
///
/// Four galleries in document order: `landscapes` (3 items), `portraits`
/// (2 items), one without an id (1 item) and an empty `drafts`.
pub fn fixture_document() -> Document {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/portfolio.html");
    Document::read(&path).unwrap()
}

// =========================================================================
// Document and registry lookups: panic with a clear message on miss
// =========================================================================

/// Find an element by its `id` attribute. Panics if not found.
pub fn node_by_id(doc: &Document, id: &str) -> NodeId {
    doc.element_by_id(id).unwrap_or_else(|| {
        let ids: Vec<&str> = doc
            .descendants(doc.root())
            .into_iter()
            .filter_map(|n| doc.attr(n, "id"))
            .collect();
        panic!("element '#{id}' not found. Available: {ids:?}")
    })
}

/// Find a gallery by id. Panics if not found.
pub fn find_gallery<'a>(registry: &'a Registry, id: &str) -> &'a Gallery {
    registry.get(id).unwrap_or_else(|| {
        let ids: Vec<&str> = registry.iter().map(|g| g.id.as_str()).collect();
        panic!("gallery '{id}' not found. Available: {ids:?}")
    })
}

/// Find the container element declaring `data-gallery="{id}"`. Panics if not found.
pub fn gallery_container(doc: &Document, id: &str) -> NodeId {
    doc.elements_with_class(doc.root(), "thumbnails")
        .into_iter()
        .find(|n| doc.attr(*n, "data-gallery") == Some(id))
        .unwrap_or_else(|| panic!("no gallery container with data-gallery '{id}'"))
}

/// The thumbnail element for item `index` of gallery `gallery`, using the
/// stock markup names. Panics if the gallery or index doesn't exist.
pub fn thumbnail_node(doc: &Document, gallery: &str, index: usize) -> NodeId {
    let registry = Registry::build(doc, &MarkupConfig::default());
    let found = find_gallery(&registry, gallery);
    found
        .items
        .get(index)
        .map(|item| item.thumbnail)
        .unwrap_or_else(|| {
            panic!(
                "gallery '{gallery}' has {} items, no index {index}",
                found.len()
            )
        })
}

// =========================================================================
// Bulk extractors
// =========================================================================

pub fn item_sources(gallery: &Gallery) -> Vec<&str> {
    gallery
        .items
        .iter()
        .map(|i| i.image_source.as_str())
        .collect()
}

// =========================================================================
// Recording overlay
// =========================================================================

/// One side effect requested of an [`Overlay`].
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Show(String, String),
    Clear,
    Visible(bool),
    ScrollLocked(bool),
    FocusClose,
}

/// Overlay that records every effect instead of touching a document.
#[derive(Debug, Default)]
pub struct RecordingOverlay {
    pub effects: Vec<Effect>,
}

impl Overlay for RecordingOverlay {
    fn show_image(&mut self, source: &str, alt: &str) {
        self.effects
            .push(Effect::Show(source.to_string(), alt.to_string()));
    }

    fn clear_image(&mut self) {
        self.effects.push(Effect::Clear);
    }

    fn set_visible(&mut self, visible: bool) {
        self.effects.push(Effect::Visible(visible));
    }

    fn set_scroll_locked(&mut self, locked: bool) {
        self.effects.push(Effect::ScrollLocked(locked));
    }

    fn focus_close_control(&mut self) {
        self.effects.push(Effect::FocusClose);
    }
}
