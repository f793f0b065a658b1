//! # Gal Lightbox
//!
//! The client-side core of a photo portfolio page: a gallery registry, a modal
//! lightbox, input adapters and a lazy image loader, modelled over an owned
//! document tree so every behaviour runs (and is tested) without a browser.
//!
//! # Architecture: One Owner, One Queue
//!
//! A page is parsed once into a [`dom::Document`]. A [`session::Session`]
//! takes ownership of it and runs the startup work; after that the host feeds
//! it events one at a time:
//!
//! ```text
//!   page.html ──parse──▶ Document ──▶ Session::new
//!                                       ├─ Registry::build + decorate
//!                                       ├─ ModalChrome::locate → InputRouter
//!                                       └─ LazyImageLoader::init (+ watcher)
//!
//!   Event ──▶ Session::dispatch
//!              ├─ Input     → InputRouter → Intent → ModalViewer → Overlay
//!              ├─ Scroll    → ProximityWatcher → LazyImageLoader
//!              └─ Loaded    → Document fetch cache → LazyImageLoader
//! ```
//!
//! Every effect the core produces is a mutation of the document: classes,
//! attributes, inline style, focus.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`dom`] | Arena-backed HTML element tree: parse, query, mutate, serialize |
//! | [`registry`] | Immutable snapshot of galleries and their items, plus layout decoration |
//! | [`modal`] | Modal state machine and the [`modal::Overlay`] effect seam |
//! | [`input`] | Clicks, keys and swipes translated into [`input::Intent`]s |
//! | [`lazy`] | Proximity-driven promotion of deferred images |
//! | [`session`] | Single owner and event queue for one page |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`render`] | Gallery page rendering from a JSON manifest using Maud |
//! | [`replay`] | JSON input scripts replayed through a session |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Intents Over Listeners
//!
//! Input handling never touches modal state directly. Every gesture becomes
//! one of four intents (open, next, prev, close) and the viewer decides what
//! each means in the current state. Navigation while closed and opens of
//! unknown galleries are dropped in one place instead of being guarded in
//! every handler.
//!
//! ## Snapshot Registry
//!
//! Galleries are read from the page exactly once. Thumbnails added later are
//! not picked up; the registry can be shared freely because nothing mutates
//! it.
//!
//! ## Explicit Host Events
//!
//! Load completion and viewport geometry come from the host as events rather
//! than callbacks. A load that completes after the modal has moved on only
//! marks that URL fetched; the overlay always shows the current item.

pub mod config;
pub mod dom;
pub mod input;
pub mod lazy;
pub mod modal;
pub mod output;
pub mod registry;
pub mod render;
pub mod replay;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;
