//! Modal viewer: the lightbox state machine.
//!
//! ```text
//!            open(g, i)                 next / prev
//!   ┌────────┐ ────────▶ ┌──────┐ ◀──────────────┐
//!   │ Closed │           │ Open │ ───────────────┘
//!   └────────┘ ◀──────── └──────┘
//!     ▲    │     close     │  ▲
//!     └────┘               └──┘
//!  next/prev/close       open(g, i)
//!   (ignored)
//! ```
//!
//! The viewer is the only thing that mutates [`ModalState`]. Input adapters
//! hand it [`Intent`]s; it checks them against the registry, updates the
//! state, and performs the matching effects through an [`Overlay`]. Requests
//! that make no sense in the current state (an unknown gallery, navigation
//! while closed) are dropped without touching anything.
//!
//! Every render re-assigns the overlay image's source, so whatever arrives
//! late from an earlier navigation is never what's on screen.

use crate::config::ModalConfig;
use crate::dom::{Document, NodeId};
use crate::input::Intent;
use crate::registry::{GalleryItem, Registry};
use serde::Serialize;
use tracing::{debug, trace};

/// Which gallery item the overlay shows, if any.
///
/// Only [`ModalViewer`] builds open states, so an open state always refers to
/// an existing, non-empty gallery and an in-range index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModalState {
    is_open: bool,
    active_gallery: Option<String>,
    active_index: usize,
}

impl ModalState {
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn active_gallery(&self) -> Option<&str> {
        self.active_gallery.as_deref()
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }
}

/// Side effects of modal transitions.
pub trait Overlay {
    /// Display `source` with `alt` as the overlay image.
    fn show_image(&mut self, source: &str, alt: &str);
    /// Drop the overlay image's source and alt text.
    fn clear_image(&mut self);
    fn set_visible(&mut self, visible: bool);
    fn set_scroll_locked(&mut self, locked: bool);
    fn focus_close_control(&mut self);
}

/// Overlay elements found on a page. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModalChrome {
    pub container: Option<NodeId>,
    pub image: Option<NodeId>,
    pub close: Option<NodeId>,
    pub next: Option<NodeId>,
    pub prev: Option<NodeId>,
}

impl ModalChrome {
    pub fn locate(doc: &Document, config: &ModalConfig) -> Self {
        Self {
            container: doc.element_by_id(&config.container_id),
            image: doc.element_by_id(&config.image_id),
            close: doc.element_by_id(&config.close_id),
            next: doc.element_by_id(&config.next_id),
            prev: doc.element_by_id(&config.prev_id),
        }
    }
}

/// [`Overlay`] that applies effects to the page document.
pub struct DomOverlay<'a> {
    doc: &'a mut Document,
    chrome: &'a ModalChrome,
    open_class: &'a str,
}

impl<'a> DomOverlay<'a> {
    pub fn new(doc: &'a mut Document, chrome: &'a ModalChrome, open_class: &'a str) -> Self {
        Self {
            doc,
            chrome,
            open_class,
        }
    }
}

impl Overlay for DomOverlay<'_> {
    fn show_image(&mut self, source: &str, alt: &str) {
        if let Some(image) = self.chrome.image {
            self.doc.set_image_source(image, source);
            self.doc.set_attr(image, "alt", alt);
        }
    }

    fn clear_image(&mut self) {
        if let Some(image) = self.chrome.image {
            self.doc.clear_image_source(image);
            self.doc.set_attr(image, "alt", "");
        }
    }

    fn set_visible(&mut self, visible: bool) {
        let Some(container) = self.chrome.container else {
            return;
        };
        if visible {
            self.doc.add_class(container, self.open_class);
        } else {
            self.doc.remove_class(container, self.open_class);
        }
        self.doc
            .set_attr(container, "aria-hidden", if visible { "false" } else { "true" });
    }

    fn set_scroll_locked(&mut self, locked: bool) {
        if let Some(body) = self.doc.body() {
            self.doc
                .set_style_property(body, "overflow", locked.then_some("hidden"));
        }
    }

    fn focus_close_control(&mut self) {
        if let Some(close) = self.chrome.close {
            self.doc.focus(close);
        }
    }
}

/// Owner of the modal state and the gallery snapshot it navigates.
#[derive(Debug, Clone)]
pub struct ModalViewer {
    registry: Registry,
    state: ModalState,
}

impl ModalViewer {
    /// A closed viewer over `registry`.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            state: ModalState::default(),
        }
    }

    pub fn state(&self) -> &ModalState {
        &self.state
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The item currently displayed, if open.
    pub fn current_item(&self) -> Option<&GalleryItem> {
        let gallery = self.registry.get(self.state.active_gallery()?)?;
        gallery.items.get(self.state.active_index)
    }

    /// Dispatch an intent. Returns whether it took effect.
    pub fn apply<O: Overlay + ?Sized>(&mut self, overlay: &mut O, intent: &Intent) -> bool {
        match intent {
            Intent::Open { gallery, index } => self.open(overlay, gallery, *index),
            Intent::Next => self.next(overlay),
            Intent::Prev => self.prev(overlay),
            Intent::Close => self.close(overlay),
        }
    }

    /// Show item `index` of `gallery_id`.
    ///
    /// Allowed from either state. Unknown or empty galleries and
    /// out-of-range indices leave the state as it was.
    pub fn open<O: Overlay + ?Sized>(
        &mut self,
        overlay: &mut O,
        gallery_id: &str,
        index: usize,
    ) -> bool {
        let Some(gallery) = self.registry.get(gallery_id) else {
            trace!(gallery = gallery_id, "open ignored: unknown gallery");
            return false;
        };
        if index >= gallery.len() {
            trace!(
                gallery = gallery_id,
                index,
                len = gallery.len(),
                "open ignored: index out of range"
            );
            return false;
        }

        self.state = ModalState {
            is_open: true,
            active_gallery: Some(gallery_id.to_string()),
            active_index: index,
        };
        debug!(gallery = gallery_id, index, "modal opened");

        self.update_modal_image(overlay);
        overlay.set_visible(true);
        overlay.set_scroll_locked(true);
        overlay.focus_close_control();
        true
    }

    pub fn next<O: Overlay + ?Sized>(&mut self, overlay: &mut O) -> bool {
        self.step(overlay, 1)
    }

    pub fn prev<O: Overlay + ?Sized>(&mut self, overlay: &mut O) -> bool {
        self.step(overlay, -1)
    }

    fn step<O: Overlay + ?Sized>(&mut self, overlay: &mut O, delta: isize) -> bool {
        if !self.state.is_open {
            trace!(delta, "navigation ignored: modal closed");
            return false;
        }
        let Some(len) = self
            .state
            .active_gallery()
            .and_then(|id| self.registry.get(id))
            .map(|g| g.len())
            .filter(|len| *len > 0)
        else {
            return false;
        };

        let index = (self.state.active_index as isize + delta).rem_euclid(len as isize);
        self.state.active_index = index as usize;
        debug!(index = self.state.active_index, "modal navigated");
        self.update_modal_image(overlay);
        true
    }

    /// Close the overlay. A no-op when already closed.
    pub fn close<O: Overlay + ?Sized>(&mut self, overlay: &mut O) -> bool {
        if !self.state.is_open {
            return false;
        }
        self.state = ModalState::default();
        debug!("modal closed");

        overlay.set_visible(false);
        overlay.set_scroll_locked(false);
        overlay.clear_image();
        true
    }

    fn update_modal_image<O: Overlay + ?Sized>(&self, overlay: &mut O) {
        if let Some(item) = self.current_item() {
            overlay.show_image(&item.image_source, &item.alt_text);
        }
    }
}
