//! Input adapters: raw pointer, keyboard and touch events in, intents out.
//!
//! Every input source funnels into one of four [`Intent`]s. The router never
//! touches modal state itself; it only needs to know whether the modal is
//! open (keyboard navigation is ignored while closed) and which thumbnail or
//! control an event landed on.
//!
//! | Input | Intent |
//! |-------|--------|
//! | click, or Enter/Space, on a thumbnail | `Open { gallery, index }` |
//! | click on the close / next / prev control | `Close` / `Next` / `Prev` |
//! | pointer down on the modal backdrop itself | `Close` |
//! | Escape / ArrowRight / ArrowLeft while open | `Close` / `Next` / `Prev` |
//! | swipe left / right beyond the threshold | `Next` / `Prev` |

use crate::dom::{Document, NodeId};
use crate::modal::ModalChrome;
use crate::registry::Registry;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// A normalized navigation command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "kebab-case")]
pub enum Intent {
    Open { gallery: String, index: usize },
    Next,
    Prev,
    Close,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Open { gallery, index } => write!(f, "open({gallery}, {index})"),
            Intent::Next => f.write_str("next"),
            Intent::Prev => f.write_str("prev"),
            Intent::Close => f.write_str("close"),
        }
    }
}

/// Keys the lightbox reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    ArrowLeft,
    ArrowRight,
    Enter,
    Space,
    Other(String),
}

impl FromStr for Key {
    type Err = std::convert::Infallible;

    /// Parse a DOM `KeyboardEvent.key` value, including legacy names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Escape" | "Esc" => Key::Escape,
            "ArrowLeft" | "Left" => Key::ArrowLeft,
            "ArrowRight" | "Right" => Key::ArrowRight,
            "Enter" => Key::Enter,
            " " | "Spacebar" | "Space" => Key::Space,
            other => Key::Other(other.to_string()),
        })
    }
}

/// A raw input event as delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Click { target: NodeId },
    /// `target` is the focused element, if any.
    KeyDown { key: Key, target: Option<NodeId> },
    PointerDown { target: NodeId },
    TouchStart { screen_x: f64 },
    TouchEnd { screen_x: f64 },
}

/// Turns a horizontal touch gesture into next/prev.
#[derive(Debug, Clone, PartialEq)]
pub struct SwipeTracker {
    threshold: f64,
    start_x: Option<f64>,
}

impl SwipeTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            start_x: None,
        }
    }

    pub fn start(&mut self, screen_x: f64) {
        self.start_x = Some(screen_x);
    }

    /// Finish a gesture. Displacement must exceed the threshold: moving left
    /// means next, moving right means prev. Shorter movements are taps.
    pub fn end(&mut self, screen_x: f64) -> Option<Intent> {
        let start = self.start_x.take()?;
        let displacement = start - screen_x;
        if displacement.abs() <= self.threshold {
            return None;
        }
        Some(if displacement > 0.0 {
            Intent::Next
        } else {
            Intent::Prev
        })
    }
}

/// Maps raw events to intents for one page.
///
/// Thumbnails resolve through the page's [`Registry`] snapshot, so the router
/// and the viewer agree on every gallery position.
#[derive(Debug, Clone)]
pub struct InputRouter {
    registry: Registry,
    chrome: ModalChrome,
    swipe: SwipeTracker,
}

impl InputRouter {
    pub fn new(registry: &Registry, chrome: ModalChrome, swipe_threshold: f64) -> Self {
        Self {
            registry: registry.clone(),
            chrome,
            swipe: SwipeTracker::new(swipe_threshold),
        }
    }

    /// Translate one event. `modal_open` gates keyboard navigation.
    pub fn translate(
        &mut self,
        doc: &Document,
        event: &InputEvent,
        modal_open: bool,
    ) -> Option<Intent> {
        let intent = match event {
            InputEvent::Click { target } => self
                .thumbnail_intent(doc, *target)
                .or_else(|| self.control_intent(doc, *target)),
            InputEvent::KeyDown { key, target } => match key {
                Key::Escape if modal_open => Some(Intent::Close),
                Key::ArrowRight if modal_open => Some(Intent::Next),
                Key::ArrowLeft if modal_open => Some(Intent::Prev),
                Key::Enter | Key::Space => target.and_then(|t| self.thumbnail_intent(doc, t)),
                _ => None,
            },
            InputEvent::PointerDown { target } => {
                (self.chrome.container == Some(*target)).then_some(Intent::Close)
            }
            InputEvent::TouchStart { screen_x } => {
                self.swipe.start(*screen_x);
                None
            }
            InputEvent::TouchEnd { screen_x } => self.swipe.end(*screen_x),
        };
        if intent.is_none() {
            trace!(?event, modal_open, "input produced no intent");
        }
        intent
    }

    fn thumbnail_intent(&self, doc: &Document, target: NodeId) -> Option<Intent> {
        let thumb = doc.closest(target, |n| self.registry.locate(n).is_some())?;
        let (gallery, index) = self.registry.locate(thumb)?;
        Some(Intent::Open {
            gallery: gallery.to_string(),
            index,
        })
    }

    fn control_intent(&self, doc: &Document, target: NodeId) -> Option<Intent> {
        let hit = |control: Option<NodeId>| control.is_some_and(|c| doc.is_within(target, c));
        if hit(self.chrome.close) {
            Some(Intent::Close)
        } else if hit(self.chrome.next) {
            Some(Intent::Next)
        } else if hit(self.chrome.prev) {
            Some(Intent::Prev)
        } else {
            None
        }
    }
}
