//! Gallery page rendering.
//!
//! Turns a JSON page manifest into a complete HTML page: one thumbnail grid
//! per gallery plus the modal chrome, written in exactly the shape that
//! [`Registry::build`](crate::registry::Registry::build) and the lazy loader
//! read back. Thumbnails start deferred (`data-src` + `lazy` class), the modal
//! starts hidden.
//!
//! ## Manifest
//!
//! ```json
//! {
//!   "title": "Portfolio",
//!   "galleries": [
//!     {
//!       "id": "landscapes",
//!       "title": "Landscapes",
//!       "images": [
//!         { "thumbnail": "thumbs/01.jpg", "full": "full/01.jpg", "alt": "Valley" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Class names and chrome ids come from [`ViewerConfig`]. Data attribute
//! names are always the stock ones (`data-gallery`, `data-full`, `data-src`):
//! maud attribute names are fixed at compile time. Config validation warns
//! about any renamed one (see
//! [`MarkupConfig::renamed_data_attributes`](crate::config::MarkupConfig::renamed_data_attributes)).

use crate::config::ViewerConfig;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
pub struct PageManifest {
    pub title: String,
    #[serde(default)]
    pub galleries: Vec<GalleryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct GalleryEntry {
    /// Omitted ids get generated when the page is loaded.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ImageEntry {
    pub thumbnail: String,
    /// Full-resolution source for the modal; the thumbnail is used if absent.
    #[serde(default)]
    pub full: Option<String>,
    #[serde(default)]
    pub alt: String,
}

const CSS: &str = include_str!("../static/lightbox.css");

pub fn load_manifest(path: &Path) -> Result<PageManifest, RenderError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Read the manifest at `manifest_path` and render its page.
pub fn render(manifest_path: &Path, config: &ViewerConfig) -> Result<String, RenderError> {
    let manifest = load_manifest(manifest_path)?;
    Ok(render_page(&manifest, config).into_string())
}

pub fn render_page(manifest: &PageManifest, config: &ViewerConfig) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (manifest.title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                main {
                    h1 { (manifest.title) }
                    @for gallery in &manifest.galleries {
                        (render_gallery(gallery, config))
                    }
                }
                (render_modal(config))
            }
        }
    }
}

// ============================================================================
// HTML Components
// ============================================================================

fn render_gallery(gallery: &GalleryEntry, config: &ViewerConfig) -> Markup {
    let markup = &config.markup;
    html! {
        section {
            @if let Some(title) = &gallery.title {
                h2 { (title) }
            }
            div class=(markup.gallery_class) data-gallery=[gallery.id.as_deref()] {
                @for image in &gallery.images {
                    figure class=(markup.thumbnail_class) tabindex="0" data-full=[image.full.as_deref()] {
                        img class=(markup.lazy_class) data-src=(image.thumbnail) alt=(image.alt);
                    }
                }
            }
        }
    }
}

/// The overlay container, hidden until a thumbnail opens it.
fn render_modal(config: &ViewerConfig) -> Markup {
    let modal = &config.modal;
    html! {
        div id=(modal.container_id) class="modal" role="dialog" aria-modal="true" aria-hidden="true" {
            button id=(modal.close_id) class="modal-close" aria-label="Close" { "×" }
            button id=(modal.prev_id) class="modal-nav modal-prev" aria-label="Previous" {
                span aria-hidden="true" { "‹" }
            }
            img id=(modal.image_id) alt="";
            button id=(modal.next_id) class="modal-nav modal-next" aria-label="Next" {
                span aria-hidden="true" { "›" }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::modal::ModalChrome;
    use crate::registry::Registry;
    use crate::test_helpers::*;

    fn manifest() -> PageManifest {
        serde_json::from_str(
            r#"{
                "title": "Portfolio & Notes",
                "galleries": [
                    {
                        "id": "landscapes",
                        "title": "Landscapes",
                        "images": [
                            { "thumbnail": "t/1.jpg", "full": "f/1.jpg", "alt": "One" },
                            { "thumbnail": "t/2.jpg", "alt": "Two \"quoted\"" }
                        ]
                    },
                    { "images": [ { "thumbnail": "t/3.jpg" } ] },
                    { "id": "empty" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn rendered_page_reads_back_as_galleries() {
        let config = ViewerConfig::default();
        let html = render_page(&manifest(), &config).into_string();
        let doc = Document::parse(&html).unwrap();
        let registry = Registry::build(&doc, &config.markup);

        assert_eq!(registry.len(), 3);
        let landscapes = find_gallery(&registry, "landscapes");
        // No full source falls back to the deferred thumbnail
        assert_eq!(item_sources(landscapes), vec!["f/1.jpg", "t/2.jpg"]);
        assert_eq!(landscapes.items[1].alt_text, "Two \"quoted\"");
        assert!(find_gallery(&registry, "empty").is_empty());
    }

    #[test]
    fn rendered_chrome_is_complete_and_hidden() {
        let config = ViewerConfig::default();
        let html = render_page(&manifest(), &config).into_string();
        let doc = Document::parse(&html).unwrap();
        let chrome = ModalChrome::locate(&doc, &config.modal);

        let container = chrome.container.unwrap();
        assert!(chrome.image.is_some());
        assert!(chrome.close.is_some());
        assert!(chrome.next.is_some());
        assert!(chrome.prev.is_some());
        assert_eq!(doc.attr(container, "aria-hidden"), Some("true"));
        assert!(!doc.has_class(container, "open"));
    }

    #[test]
    fn thumbnails_start_deferred() {
        let config = ViewerConfig::default();
        let html = render_page(&manifest(), &config).into_string();
        let doc = Document::parse(&html).unwrap();
        let lazy = doc.elements_with_class(doc.root(), "lazy");
        assert_eq!(lazy.len(), 3);
        for img in lazy {
            assert!(doc.attr(img, "src").is_none());
            assert!(doc.attr(img, "data-src").is_some());
        }
    }

    #[test]
    fn title_is_escaped() {
        let html = render_page(&manifest(), &ViewerConfig::default()).into_string();
        assert!(html.contains("<title>Portfolio &amp; Notes</title>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn configured_names_are_used() {
        let mut config = ViewerConfig::default();
        config.markup.gallery_class = "grid".into();
        config.modal.container_id = "viewer".into();
        let html = render_page(&manifest(), &config).into_string();
        let doc = Document::parse(&html).unwrap();
        assert!(doc.element_by_id("viewer").is_some());
        assert_eq!(doc.elements_with_class(doc.root(), "grid").len(), 3);
    }

    #[test]
    fn render_reads_manifest_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("page.json");
        fs::write(&path, r#"{"title": "Solo"}"#).unwrap();
        let html = render(&path, &ViewerConfig::default()).unwrap();
        assert!(html.contains("<h1>Solo</h1>"));

        fs::write(&path, "{").unwrap();
        assert!(matches!(
            render(&path, &ViewerConfig::default()),
            Err(RenderError::Json(_))
        ));
    }
}
