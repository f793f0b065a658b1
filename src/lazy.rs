//! Proximity-driven lazy image loading.
//!
//! Deferred images carry their real URL in a data attribute (`data-src` by
//! default) and a marker class (`lazy`). The loader registers each one with a
//! [`ProximityWatcher`]; when the watcher reports the image inside its
//! margin-expanded viewport, the loader promotes the deferred URL to `src`,
//! drops the deferred attribute and stops watching that image. The image is
//! marked `loaded` right away if the platform already has that URL, otherwise
//! on the next load completion the host reports.
//!
//! ```text
//! deferred ──proximity──▶ promoted ──load event──▶ loaded
//!            (once)            └──already cached──▶ loaded
//! ```
//!
//! Without a watcher (the runtime cannot observe proximity), every deferred
//! image is promoted immediately.

use crate::config::MarkupConfig;
use crate::dom::{Document, NodeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

/// Viewport expansion in CSS margin shorthand order (px).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RootMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl FromStr for RootMargin {
    type Err = String;

    /// Parse `"200px"`, `"200px 0px"`, `"10px 0 20px"` or four values.
    /// Unitless numbers count as px; percentages are not supported.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_ascii_whitespace()
            .map(|part| {
                let number = part.strip_suffix("px").unwrap_or(part);
                number
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| format!("invalid margin value '{part}'"))
            })
            .collect::<Result<Vec<f64>, String>>()?;
        match values[..] {
            [all] => Ok(Self::uniform(all)),
            [vertical, horizontal] => Ok(Self {
                top: vertical,
                right: horizontal,
                bottom: vertical,
                left: horizontal,
            }),
            [top, horizontal, bottom] => Ok(Self {
                top,
                right: horizontal,
                bottom,
                left: horizontal,
            }),
            [top, right, bottom, left] => Ok(Self {
                top,
                right,
                bottom,
                left,
            }),
            _ => Err(format!("expected 1 to 4 values, got {}", values.len())),
        }
    }
}

impl RootMargin {
    pub fn uniform(px: f64) -> Self {
        Self {
            top: px,
            right: px,
            bottom: px,
            left: px,
        }
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}px {}px {}px {}px",
            self.top, self.right, self.bottom, self.left
        )
    }
}

/// Watcher trigger settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityOptions {
    pub root_margin: RootMargin,
    /// Fraction of the element that must be inside the expanded viewport.
    pub threshold: f64,
}

impl Default for ProximityOptions {
    fn default() -> Self {
        Self {
            root_margin: RootMargin {
                top: 200.0,
                right: 0.0,
                bottom: 200.0,
                left: 0.0,
            },
            threshold: 0.01,
        }
    }
}

/// Viewport-intersection trigger used to defer work until an element nears
/// visibility.
pub trait ProximityWatcher {
    fn observe(&mut self, node: NodeId);
    fn unobserve(&mut self, node: NodeId);
    fn is_observing(&self, node: NodeId) -> bool;
    /// Observed elements that meet the trigger at the given scroll offset.
    fn intersecting(&self, scroll_top: f64) -> Vec<NodeId>;
}

/// Vertical extent of an element in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub top: f64,
    pub height: f64,
}

/// [`ProximityWatcher`] over a vertically scrolling viewport.
///
/// Element geometry is supplied by the host through [`set_bounds`]; observed
/// elements without bounds never trigger.
///
/// [`set_bounds`]: ViewportWatcher::set_bounds
#[derive(Debug, Clone)]
pub struct ViewportWatcher {
    options: ProximityOptions,
    viewport_height: f64,
    bounds: HashMap<NodeId, Bounds>,
    observed: BTreeSet<NodeId>,
}

impl ViewportWatcher {
    pub fn new(options: ProximityOptions, viewport_height: f64) -> Self {
        Self {
            options,
            viewport_height,
            bounds: HashMap::new(),
            observed: BTreeSet::new(),
        }
    }

    pub fn set_bounds(&mut self, node: NodeId, bounds: Bounds) {
        self.bounds.insert(node, bounds);
    }

    fn triggers(&self, bounds: Bounds, scroll_top: f64) -> bool {
        let margin = self.options.root_margin;
        let root_start = scroll_top - margin.top;
        let root_end = scroll_top + self.viewport_height + margin.bottom;
        if bounds.height <= 0.0 {
            return bounds.top >= root_start && bounds.top <= root_end;
        }
        let overlap = (bounds.top + bounds.height).min(root_end) - bounds.top.max(root_start);
        overlap > 0.0 && overlap / bounds.height >= self.options.threshold
    }
}

impl ProximityWatcher for ViewportWatcher {
    fn observe(&mut self, node: NodeId) {
        self.observed.insert(node);
    }

    fn unobserve(&mut self, node: NodeId) {
        self.observed.remove(&node);
    }

    fn is_observing(&self, node: NodeId) -> bool {
        self.observed.contains(&node)
    }

    fn intersecting(&self, scroll_top: f64) -> Vec<NodeId> {
        self.observed
            .iter()
            .copied()
            .filter(|node| {
                self.bounds
                    .get(node)
                    .is_some_and(|b| self.triggers(*b, scroll_top))
            })
            .collect()
    }
}

/// Per-image lazy-load bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyImageRecord {
    pub element: NodeId,
    /// Deferred URL; `None` once promoted to `src`.
    pub pending_source: Option<String>,
    pub loaded: bool,
}

/// Promotes deferred images as they approach the viewport.
#[derive(Debug, Clone)]
pub struct LazyImageLoader {
    records: BTreeMap<NodeId, LazyImageRecord>,
    deferred_attr: String,
    loaded_class: String,
}

impl LazyImageLoader {
    /// Register every deferred image in the document.
    ///
    /// With no watcher available all of them are promoted on the spot.
    pub fn init(
        doc: &mut Document,
        markup: &MarkupConfig,
        watcher: Option<&mut dyn ProximityWatcher>,
    ) -> Self {
        let mut loader = Self {
            records: BTreeMap::new(),
            deferred_attr: markup.deferred_source_attr.clone(),
            loaded_class: markup.loaded_class.clone(),
        };

        for node in doc.elements_with_class(doc.root(), &markup.lazy_class) {
            let Some(source) = doc
                .attr(node, &markup.deferred_source_attr)
                .filter(|s| !s.is_empty())
            else {
                continue;
            };
            loader.records.insert(
                node,
                LazyImageRecord {
                    element: node,
                    pending_source: Some(source.to_string()),
                    loaded: false,
                },
            );
        }

        let nodes: Vec<NodeId> = loader.records.keys().copied().collect();
        match watcher {
            Some(watcher) => {
                for node in &nodes {
                    watcher.observe(*node);
                }
                debug!(images = nodes.len(), "observing deferred images");
            }
            None => {
                debug!(images = nodes.len(), "proximity unsupported, loading eagerly");
                for node in nodes {
                    loader.promote(doc, node);
                }
            }
        }

        loader
    }

    /// Handle proximity entries reported by the watcher.
    ///
    /// Returns the images promoted by this call. Entries for images already
    /// promoted, or not tracked at all, are ignored.
    pub fn on_proximity(
        &mut self,
        doc: &mut Document,
        entries: &[NodeId],
        mut watcher: Option<&mut dyn ProximityWatcher>,
    ) -> Vec<NodeId> {
        let mut promoted = Vec::new();
        for &node in entries {
            if !self.promote(doc, node) {
                continue;
            }
            if let Some(watcher) = watcher.as_mut() {
                watcher.unobserve(node);
            }
            promoted.push(node);
        }
        promoted
    }

    /// Handle a load completion for `node`. Returns true if this completed a
    /// tracked image.
    pub fn on_image_loaded(&mut self, doc: &mut Document, node: NodeId) -> bool {
        match self.records.get(&node) {
            Some(record) if record.pending_source.is_none() && !record.loaded => {
                self.finish(doc, node);
                true
            }
            _ => false,
        }
    }

    /// Move the deferred URL to `src`. False if `node` has nothing pending.
    fn promote(&mut self, doc: &mut Document, node: NodeId) -> bool {
        let Some(source) = self
            .records
            .get_mut(&node)
            .and_then(|record| record.pending_source.take())
        else {
            trace!(%node, "proximity entry ignored");
            return false;
        };

        doc.set_image_source(node, &source);
        doc.remove_attr(node, &self.deferred_attr);
        debug!(%node, %source, "promoted deferred image");

        if doc.is_complete(node) {
            self.finish(doc, node);
        }
        true
    }

    fn finish(&mut self, doc: &mut Document, node: NodeId) {
        doc.add_class(node, &self.loaded_class);
        if let Some(record) = self.records.get_mut(&node) {
            record.loaded = true;
            debug!(%node, "deferred image loaded");
        }
    }

    /// Every deferred image found at init, in document order.
    pub fn records(&self) -> impl Iterator<Item = &LazyImageRecord> {
        self.records.values()
    }

    pub fn record(&self, node: NodeId) -> Option<&LazyImageRecord> {
        self.records.get(&node)
    }

    /// Number of promoted images still waiting for their load event.
    pub fn awaiting_load_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.pending_source.is_none() && !r.loaded)
            .count()
    }

    /// Number of images still waiting for promotion.
    pub fn pending_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.pending_source.is_some())
            .count()
    }
}
