//! Gallery registry: a one-time snapshot of the galleries on a page.
//!
//! The registry is built once, at session start, by scanning the document for
//! gallery containers. Nothing reads the live document for gallery data after
//! that; the modal viewer and the input router work purely from this
//! snapshot.
//!
//! ## Markup
//!
//! ```html
//! <div class="thumbnails" data-gallery="travel">
//!   <figure class="thumb" data-full="full/tokyo.jpg" tabindex="0">
//!     <img class="lazy" data-src="thumbs/tokyo.jpg" alt="Tokyo at dusk">
//!   </figure>
//!   ...
//! </div>
//! ```
//!
//! A container's id comes from its `data-gallery` attribute; without one (or
//! when it repeats an earlier gallery's id) a random `gallery-xxxxxxxx` id is
//! made up for the session. Thumbnails are the `.thumb` elements inside the
//! container. A container with no `.thumb` elements treats each of its images
//! as a thumbnail.
//!
//! ## Source Resolution
//!
//! First non-empty value wins:
//!
//! 1. `data-full` on the thumbnail
//! 2. `data-src` on the thumbnail's image
//! 3. `src` on the thumbnail's image
//! 4. `""`
//!
//! Items with an empty source are kept so indices match what the visitor sees.

use crate::config::MarkupConfig;
use crate::dom::{Document, NodeId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};
use uuid::Uuid;

/// One image in a gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryItem {
    pub image_source: String,
    pub alt_text: String,
    /// The thumbnail element this item was read from.
    pub thumbnail: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gallery {
    pub id: String,
    /// Document order; defines navigation order.
    pub items: Vec<GalleryItem>,
}

impl Gallery {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Immutable index of a page's galleries, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    galleries: BTreeMap<String, Gallery>,
    /// Gallery ids in document order.
    order: Vec<String>,
    /// Thumbnail element → (gallery id, index).
    thumbnails: HashMap<NodeId, (String, usize)>,
}

impl Registry {
    /// Scan `doc` for galleries, making up ids where the markup has none.
    pub fn build(doc: &Document, markup: &MarkupConfig) -> Registry {
        Self::build_with_ids(doc, markup, random_gallery_id)
    }

    /// Like [`build`](Self::build) with a caller-supplied id generator.
    pub fn build_with_ids(
        doc: &Document,
        markup: &MarkupConfig,
        mut make_id: impl FnMut() -> String,
    ) -> Registry {
        let mut registry = Registry::default();

        for container in doc.elements_with_class(doc.root(), &markup.gallery_class) {
            let declared = doc
                .attr(container, &markup.gallery_id_attr)
                .map(str::trim)
                .filter(|id| !id.is_empty());
            let id = match declared {
                Some(id) if !registry.galleries.contains_key(id) => id.to_string(),
                other => {
                    if let Some(dup) = other {
                        warn!(id = dup, "duplicate gallery id, assigning a generated one");
                    }
                    registry.unused_id(&mut make_id)
                }
            };

            let items: Vec<GalleryItem> = thumbnails_of(doc, container, markup)
                .into_iter()
                .map(|thumb| read_item(doc, thumb, markup))
                .collect();

            debug!(gallery = %id, items = items.len(), "registered gallery");
            for (index, item) in items.iter().enumerate() {
                registry
                    .thumbnails
                    .insert(item.thumbnail, (id.clone(), index));
            }
            registry.order.push(id.clone());
            registry.galleries.insert(id.clone(), Gallery { id, items });
        }

        registry
    }

    fn unused_id(&self, make_id: &mut impl FnMut() -> String) -> String {
        loop {
            let id = make_id();
            if !self.galleries.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Gallery> {
        self.galleries.get(id)
    }

    /// Galleries in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Gallery> {
        self.order.iter().filter_map(|id| self.galleries.get(id))
    }

    pub fn len(&self) -> usize {
        self.galleries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.galleries.is_empty()
    }

    /// Which gallery and position a thumbnail element belongs to.
    pub fn locate(&self, thumbnail: NodeId) -> Option<(&str, usize)> {
        self.thumbnails
            .get(&thumbnail)
            .map(|(id, index)| (id.as_str(), *index))
    }
}

/// `gallery-` followed by 8 hex characters of a v4 UUID.
pub fn random_gallery_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("gallery-{}", &uuid[..8])
}

fn thumbnails_of(doc: &Document, container: NodeId, markup: &MarkupConfig) -> Vec<NodeId> {
    let marked = doc.elements_with_class(container, &markup.thumbnail_class);
    if marked.is_empty() {
        doc.elements_with_tag(container, "img")
    } else {
        marked
    }
}

/// The image a thumbnail displays: itself if it is an `<img>`, otherwise its
/// first descendant image.
fn inner_image(doc: &Document, thumbnail: NodeId) -> Option<NodeId> {
    if doc.tag(thumbnail) == "img" {
        return Some(thumbnail);
    }
    doc.elements_with_tag(thumbnail, "img").into_iter().next()
}

fn read_item(doc: &Document, thumbnail: NodeId, markup: &MarkupConfig) -> GalleryItem {
    let image = inner_image(doc, thumbnail);
    let non_empty = |node: Option<NodeId>, attr: &str| {
        node.and_then(|n| doc.attr(n, attr))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let image_source = non_empty(Some(thumbnail), &markup.full_source_attr)
        .or_else(|| non_empty(image, &markup.deferred_source_attr))
        .or_else(|| non_empty(image, "src"))
        .unwrap_or_default();
    let alt_text = image
        .and_then(|img| doc.attr(img, "alt"))
        .unwrap_or_default()
        .to_string();

    GalleryItem {
        image_source,
        alt_text,
        thumbnail,
    }
}

/// Gap between thumbnails of a statically laid out gallery.
const STATIC_GAP: &str = "16px";

/// Apply gallery layout markers.
///
/// Galleries with at most `static_max` items lose the scrollable class and
/// get inline `overflow-x: visible` with a fixed `gap`; larger ones gain the
/// class, inline `overflow-x: auto` and become keyboard-focusable so they
/// can be scrolled with arrow keys. Thumbnail images are made non-draggable.
pub fn decorate(doc: &mut Document, registry: &Registry, markup: &MarkupConfig) {
    for container in doc.elements_with_class(doc.root(), &markup.gallery_class) {
        let images = doc.elements_with_tag(container, "img");
        if images.len() <= markup.static_max {
            doc.remove_class(container, &markup.scrollable_class);
            doc.set_style_property(container, "overflow-x", Some("visible"));
            doc.set_style_property(container, "gap", Some(STATIC_GAP));
        } else {
            doc.add_class(container, &markup.scrollable_class);
            doc.set_style_property(container, "overflow-x", Some("auto"));
            doc.set_attr(container, "tabindex", "0");
        }
    }
    for gallery in registry.iter() {
        for item in &gallery.items {
            if let Some(img) = inner_image(doc, item.thumbnail) {
                doc.set_attr(img, "draggable", "false");
            }
        }
    }
}
