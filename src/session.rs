//! One page's lightbox session: a single owner and a single event queue.
//!
//! A [`Session`] is built once per page from its parsed document. Building
//! it runs the one-time startup work in order:
//!
//! 1. snapshot the galleries ([`Registry::build`]) and decorate their layout
//! 2. locate the modal chrome and wire the input router to it
//! 3. register deferred images with the proximity watcher, or promote them
//!    all at once when there is no watcher
//!
//! After that, everything the host reports goes through
//! [`Session::dispatch`], one event at a time, in delivery order. Each event
//! runs to completion before the next, so no locks are needed: the viewer is
//! the only writer of modal state and the session hands it the document only
//! for the duration of one transition.

use crate::config::ViewerConfig;
use crate::dom::{Document, NodeId};
use crate::input::{InputEvent, InputRouter, Intent};
use crate::lazy::{LazyImageLoader, ProximityWatcher};
use crate::modal::{DomOverlay, ModalChrome, ModalState, ModalViewer};
use crate::registry::{self, Registry};
use serde::Serialize;
use tracing::debug;

/// Something the host platform reports.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Input(InputEvent),
    /// The page scrolled; the watcher is asked which images are now near.
    Scroll { top: f64 },
    /// Proximity entries delivered directly by the host's watcher.
    Proximity(Vec<NodeId>),
    /// An image finished fetching its current source.
    ImageLoaded(NodeId),
}

/// What handling one event did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Outcome {
    /// Intent produced by an input event, if any.
    pub intent: Option<Intent>,
    /// Whether the intent changed modal state.
    pub applied: bool,
    /// Images promoted from deferred to real sources.
    pub promoted: Vec<NodeId>,
    /// Whether a tracked lazy image finished loading.
    pub loaded: bool,
}

pub struct Session {
    doc: Document,
    viewer: ModalViewer,
    router: InputRouter,
    chrome: ModalChrome,
    loader: LazyImageLoader,
    watcher: Option<Box<dyn ProximityWatcher>>,
    open_class: String,
}

impl Session {
    /// Run startup work for `doc`. Pass `None` for `watcher` when the runtime
    /// can't observe proximity; deferred images then load immediately.
    pub fn new(
        mut doc: Document,
        config: &ViewerConfig,
        mut watcher: Option<Box<dyn ProximityWatcher>>,
    ) -> Self {
        let registry = Registry::build(&doc, &config.markup);
        registry::decorate(&mut doc, &registry, &config.markup);

        let chrome = ModalChrome::locate(&doc, &config.modal);
        let router = InputRouter::new(&registry, chrome.clone(), config.touch.swipe_threshold);
        let loader = LazyImageLoader::init(&mut doc, &config.markup, borrow_watcher(&mut watcher));
        debug!(
            galleries = registry.len(),
            lazy_images = loader.records().count(),
            "session started"
        );

        Self {
            doc,
            viewer: ModalViewer::new(registry),
            router,
            chrome,
            loader,
            watcher,
            open_class: config.modal.open_class.clone(),
        }
    }

    /// Handle one host event to completion.
    pub fn dispatch(&mut self, event: Event) -> Outcome {
        let mut outcome = Outcome::default();
        match event {
            Event::Input(input) => {
                let modal_open = self.viewer.state().is_open();
                if let Some(intent) = self.router.translate(&self.doc, &input, modal_open) {
                    outcome.applied = self.apply(&intent);
                    outcome.intent = Some(intent);
                }
            }
            Event::Scroll { top } => {
                let entries = self
                    .watcher
                    .as_ref()
                    .map(|w| w.intersecting(top))
                    .unwrap_or_default();
                outcome.promoted = self.promote(&entries);
            }
            Event::Proximity(entries) => {
                outcome.promoted = self.promote(&entries);
            }
            Event::ImageLoaded(node) => {
                self.doc.mark_loaded(node);
                outcome.loaded = self.loader.on_image_loaded(&mut self.doc, node);
            }
        }
        outcome
    }

    /// Apply an intent directly, bypassing the input router.
    pub fn apply(&mut self, intent: &Intent) -> bool {
        let mut overlay = DomOverlay::new(&mut self.doc, &self.chrome, &self.open_class);
        self.viewer.apply(&mut overlay, intent)
    }

    fn promote(&mut self, entries: &[NodeId]) -> Vec<NodeId> {
        if entries.is_empty() {
            return Vec::new();
        }
        self.loader
            .on_proximity(&mut self.doc, entries, borrow_watcher(&mut self.watcher))
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn state(&self) -> &ModalState {
        self.viewer.state()
    }

    pub fn registry(&self) -> &Registry {
        self.viewer.registry()
    }

    pub fn chrome(&self) -> &ModalChrome {
        &self.chrome
    }

    pub fn loader(&self) -> &LazyImageLoader {
        &self.loader
    }
}

fn borrow_watcher(watcher: &mut Option<Box<dyn ProximityWatcher>>) -> Option<&mut dyn ProximityWatcher> {
    match watcher {
        Some(watcher) => Some(watcher.as_mut() as &mut dyn ProximityWatcher),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Key;
    use crate::lazy::{Bounds, ProximityOptions, ViewportWatcher};
    use crate::test_helpers::*;

    fn session() -> Session {
        Session::new(fixture_document(), &ViewerConfig::default(), None)
    }

    fn click(target: NodeId) -> Event {
        Event::Input(InputEvent::Click { target })
    }

    fn key(name: &str) -> Event {
        Event::Input(InputEvent::KeyDown {
            key: name.parse().unwrap(),
            target: None,
        })
    }

    #[test]
    fn thumbnail_click_opens_and_keys_navigate() {
        let mut session = session();
        let thumb = thumbnail_node(session.document(), "landscapes", 2);

        let outcome = session.dispatch(click(thumb));
        assert!(outcome.applied);
        assert_eq!(session.state().active_gallery(), Some("landscapes"));
        assert_eq!(session.state().active_index(), 2);

        session.dispatch(key("ArrowRight"));
        assert_eq!(session.state().active_index(), 0);
        session.dispatch(key("ArrowLeft"));
        assert_eq!(session.state().active_index(), 2);

        let image = session.chrome().image.unwrap();
        assert_eq!(
            session.document().attr(image, "src"),
            Some("full/landscapes/03-coast.jpg")
        );

        session.dispatch(key("Escape"));
        assert!(!session.state().is_open());
        assert_eq!(session.state().active_gallery(), None);
        assert_eq!(session.document().attr(image, "src"), None);
    }

    #[test]
    fn keys_while_closed_do_nothing() {
        let mut session = session();
        for name in ["ArrowRight", "ArrowLeft", "Escape"] {
            let outcome = session.dispatch(key(name));
            assert_eq!(outcome.intent, None);
        }
        assert!(!session.state().is_open());
    }

    #[test]
    fn chrome_buttons_and_scrim() {
        let mut session = session();
        let doc = session.document();
        let thumb = thumbnail_node(doc, "portraits", 0);
        let next = node_by_id(doc, "modal-next");
        let backdrop = node_by_id(doc, "image-modal");

        session.dispatch(click(thumb));
        session.dispatch(click(next));
        assert_eq!(session.state().active_index(), 1);
        session.dispatch(click(next));
        assert_eq!(session.state().active_index(), 0);

        let outcome = session.dispatch(Event::Input(InputEvent::PointerDown { target: backdrop }));
        assert_eq!(outcome.intent, Some(Intent::Close));
        assert!(!session.state().is_open());
    }

    #[test]
    fn swipe_navigates_open_modal() {
        let mut session = session();
        session.apply(&Intent::Open {
            gallery: "landscapes".into(),
            index: 0,
        });
        session.dispatch(Event::Input(InputEvent::TouchStart { screen_x: 300.0 }));
        let outcome = session.dispatch(Event::Input(InputEvent::TouchEnd { screen_x: 260.0 }));
        assert_eq!(outcome.intent, None);
        assert_eq!(session.state().active_index(), 0);

        session.dispatch(Event::Input(InputEvent::TouchStart { screen_x: 300.0 }));
        session.dispatch(Event::Input(InputEvent::TouchEnd { screen_x: 259.0 }));
        assert_eq!(session.state().active_index(), 1);
    }

    #[test]
    fn enter_on_focused_thumbnail_moves_focus_to_close() {
        let mut session = session();
        let thumb = thumbnail_node(session.document(), "portraits", 1);
        session.dispatch(Event::Input(InputEvent::KeyDown {
            key: Key::Enter,
            target: Some(thumb),
        }));
        assert!(session.state().is_open());
        assert_eq!(session.document().focused(), session.chrome().close);
    }

    #[test]
    fn empty_gallery_cannot_open() {
        let mut session = session();
        let applied = session.apply(&Intent::Open {
            gallery: "drafts".into(),
            index: 0,
        });
        assert!(!applied);
        assert!(!session.state().is_open());
    }

    #[test]
    fn startup_decorates_galleries() {
        let session = session();
        let doc = session.document();
        let landscapes = gallery_container(doc, "landscapes");
        let portraits = gallery_container(doc, "portraits");
        assert!(doc.has_class(landscapes, "scrollable"));
        assert!(!doc.has_class(portraits, "scrollable"));
    }

    #[test]
    fn eager_session_promotes_everything() {
        let session = session();
        assert_eq!(session.loader().pending_count(), 0);
        let doc = session.document();
        for img in doc.elements_with_class(doc.root(), "lazy") {
            assert!(doc.attr(img, "data-src").is_none());
        }
    }

    #[test]
    fn scroll_promotes_nearby_images_once() {
        let doc = fixture_document();
        let lazy = doc.elements_with_class(doc.root(), "lazy");
        let mut watcher = ViewportWatcher::new(ProximityOptions::default(), 800.0);
        // First image near the top, the rest far below
        for (i, node) in lazy.iter().enumerate() {
            let top = if i == 0 { 100.0 } else { 5000.0 };
            watcher.set_bounds(*node, Bounds { top, height: 200.0 });
        }
        let mut session = Session::new(doc, &ViewerConfig::default(), Some(Box::new(watcher)));
        assert_eq!(session.loader().pending_count(), lazy.len());

        let first = session.dispatch(Event::Scroll { top: 0.0 });
        assert_eq!(first.promoted, vec![lazy[0]]);
        let again = session.dispatch(Event::Scroll { top: 0.0 });
        assert!(again.promoted.is_empty());
        // Direct re-delivery is ignored too
        let direct = session.dispatch(Event::Proximity(vec![lazy[0]]));
        assert!(direct.promoted.is_empty());

        let loaded = session.dispatch(Event::ImageLoaded(lazy[0]));
        assert!(loaded.loaded);
        assert!(session.document().has_class(lazy[0], "loaded"));

        let far = session.dispatch(Event::Scroll { top: 4500.0 });
        assert_eq!(far.promoted.len(), lazy.len() - 1);
    }

    #[test]
    fn late_load_of_previous_overlay_source_does_not_change_display() {
        let mut session = session();
        session.apply(&Intent::Open {
            gallery: "landscapes".into(),
            index: 0,
        });
        session.apply(&Intent::Next);
        let image = session.chrome().image.unwrap();
        let shown = session.document().attr(image, "src").map(str::to_string);

        session.dispatch(Event::ImageLoaded(image));
        assert_eq!(session.document().attr(image, "src").map(str::to_string), shown);
        assert!(session.document().is_complete(image));
    }
}
