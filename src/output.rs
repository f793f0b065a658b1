//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Output is about the page's content, not its markup. Galleries and items
//! are listed by positional index and their semantic identity (gallery id,
//! alt text), with URLs shown as secondary context on indented `Source:`
//! lines.
//!
//! # Output Format
//!
//! ## Inspect
//!
//! ```text
//! Galleries
//! 001 landscapes (3 images)
//!     001 Valley at dawn
//!         Source: full/landscapes/01-valley.jpg
//!     002 (full/landscapes/02-ridge.jpg)
//! 002 drafts (empty)
//!
//! Lazy images
//!     6 deferred
//!
//! Modal
//!     container: #image-modal
//!     next: missing
//! ```
//!
//! ## Replay
//!
//! ```text
//! 001 click landscapes[2] → open(landscapes, 2)
//!     State: open landscapes[2]
//!     Showing: full/landscapes/03-coast.jpg
//! 002 click #modal-next → next
//!     State: open landscapes[0]
//! 003 scroll top=0
//!     Promoted: 4 images
//! ```
//!
//! ## Render
//!
//! ```text
//! 001 Landscapes (3 images)
//! 002 (untitled) (1 image)
//!
//! Rendered 2 galleries, 4 images → page.html
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::ViewerConfig;
use crate::dom::Document;
use crate::modal::{ModalChrome, ModalState};
use crate::registry::Registry;
use crate::render::PageManifest;
use crate::replay::StepReport;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

/// Gallery header: index + name, with item count or `(empty)`.
///
/// ```text
/// 001 landscapes (3 images)
/// 004 drafts (empty)
/// ```
fn entity_header(index: usize, name: &str, items: usize) -> String {
    if items == 0 {
        format!("{} {} (empty)", format_index(index), name)
    } else {
        format!("{} {} ({})", format_index(index), name, count(items, "image", "images"))
    }
}

/// Item line: alt text when present, otherwise the source in parens.
///
/// ```text
/// 001 Valley at dawn
/// 002 (full/landscapes/02-ridge.jpg)
/// ```
fn item_line(index: usize, alt: &str, source: &str) -> String {
    if alt.is_empty() {
        format!("{} ({})", format_index(index), source)
    } else {
        format!("{} {}", format_index(index), alt)
    }
}

fn state_line(state: &ModalState) -> String {
    match state.active_gallery() {
        Some(gallery) if state.is_open() => {
            format!("open {}[{}]", gallery, state.active_index())
        }
        _ => "closed".to_string(),
    }
}

// ============================================================================
// Inspect output
// ============================================================================

/// Format the galleries, deferred images and modal chrome found on a page.
pub fn format_inspect(doc: &Document, registry: &Registry, config: &ViewerConfig) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("Galleries".to_string());
    if registry.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (gi, gallery) in registry.iter().enumerate() {
        lines.push(entity_header(gi + 1, &gallery.id, gallery.len()));
        for (ii, item) in gallery.items.iter().enumerate() {
            lines.push(format!(
                "{}{}",
                indent(1),
                item_line(ii + 1, &item.alt_text, &item.image_source)
            ));
            if !item.alt_text.is_empty() {
                lines.push(format!("{}Source: {}", indent(2), item.image_source));
            }
        }
    }

    let markup = &config.markup;
    let lazy = doc.elements_with_class(doc.root(), &markup.lazy_class);
    let deferred = lazy
        .iter()
        .filter(|n| doc.attr(**n, &markup.deferred_source_attr).is_some())
        .count();
    lines.push(String::new());
    lines.push("Lazy images".to_string());
    lines.push(format!("{}{} deferred", indent(1), deferred));
    if lazy.len() > deferred {
        lines.push(format!("{}{} already promoted", indent(1), lazy.len() - deferred));
    }

    let modal = &config.modal;
    let chrome = ModalChrome::locate(doc, modal);
    let controls = [
        ("container", &modal.container_id, chrome.container),
        ("image", &modal.image_id, chrome.image),
        ("close", &modal.close_id, chrome.close),
        ("next", &modal.next_id, chrome.next),
        ("prev", &modal.prev_id, chrome.prev),
    ];
    lines.push(String::new());
    lines.push("Modal".to_string());
    for (role, id, node) in controls {
        match node {
            Some(_) => lines.push(format!("{}{}: #{}", indent(1), role, id)),
            None => lines.push(format!("{}{}: missing", indent(1), role)),
        }
    }

    lines
}

pub fn print_inspect(doc: &Document, registry: &Registry, config: &ViewerConfig) {
    for line in format_inspect(doc, registry, config) {
        println!("{}", line);
    }
}

// ============================================================================
// Replay output
// ============================================================================

/// Format one replayed step.
///
/// Intents that didn't change anything are marked `(ignored)`.
pub fn format_step(report: &StepReport) -> Vec<String> {
    let mut header = format!("{} {}", format_index(report.step), report.action);
    if let Some(intent) = &report.intent {
        header.push_str(&format!(" → {}", intent));
        if !report.applied {
            header.push_str(" (ignored)");
        }
    }

    let mut lines = vec![header];
    if report.intent.is_some() {
        lines.push(format!("{}State: {}", indent(1), state_line(&report.state)));
        if let Some(shown) = &report.shown {
            lines.push(format!("{}Showing: {}", indent(1), shown));
        }
    }
    if report.promoted > 0 {
        lines.push(format!(
            "{}Promoted: {}",
            indent(1),
            count(report.promoted, "image", "images")
        ));
    }
    lines
}

pub fn format_replay(reports: &[StepReport]) -> Vec<String> {
    let mut lines: Vec<String> = reports.iter().flat_map(format_step).collect();
    if let Some(last) = reports.last() {
        lines.push(String::new());
        lines.push(format!(
            "Replayed {}, modal {}",
            count(reports.len(), "step", "steps"),
            state_line(&last.state)
        ));
    }
    lines
}

pub fn print_replay(reports: &[StepReport]) {
    for line in format_replay(reports) {
        println!("{}", line);
    }
}

// ============================================================================
// Render output
// ============================================================================

pub fn format_render_summary(manifest: &PageManifest, out: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, gallery) in manifest.galleries.iter().enumerate() {
        let name = gallery
            .title
            .as_deref()
            .or(gallery.id.as_deref())
            .unwrap_or("(untitled)");
        lines.push(entity_header(i + 1, name, gallery.images.len()));
    }
    let images: usize = manifest.galleries.iter().map(|g| g.images.len()).sum();
    lines.push(String::new());
    lines.push(format!(
        "Rendered {}, {} → {}",
        count(manifest.galleries.len(), "gallery", "galleries"),
        count(images, "image", "images"),
        out.display()
    ));
    lines
}

pub fn print_render_summary(manifest: &PageManifest, out: &Path) {
    for line in format_render_summary(manifest, out) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkupConfig;
    use crate::input::Intent;
    use crate::test_helpers::*;

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn item_line_prefers_alt() {
        assert_eq!(item_line(1, "Ridge", "r.jpg"), "001 Ridge");
        assert_eq!(item_line(2, "", "r.jpg"), "002 (r.jpg)");
    }

    #[test]
    fn entity_header_counts() {
        assert_eq!(entity_header(1, "a", 1), "001 a (1 image)");
        assert_eq!(entity_header(2, "b", 3), "002 b (3 images)");
        assert_eq!(entity_header(3, "c", 0), "003 c (empty)");
    }

    // =========================================================================
    // Inspect
    // =========================================================================

    #[test]
    fn inspect_fixture() {
        let doc = fixture_document();
        let registry = Registry::build(&doc, &MarkupConfig::default());
        let lines = format_inspect(&doc, &registry, &ViewerConfig::default());

        assert_eq!(lines[0], "Galleries");
        assert_eq!(lines[1], "001 landscapes (3 images)");
        assert_eq!(lines[2], "    001 Valley at dawn");
        assert_eq!(lines[3], "        Source: full/landscapes/01-valley.jpg");
        assert!(lines.contains(&"004 drafts (empty)".to_string()));
        assert!(lines.contains(&"    6 deferred".to_string()));
        assert!(lines.contains(&"    container: #image-modal".to_string()));
        assert!(lines.contains(&"    prev: #modal-prev".to_string()));
    }

    #[test]
    fn inspect_reports_missing_chrome() {
        let doc = crate::dom::Document::parse(
            r#"<body><div class="thumbnails" data-gallery="g"><img src="a.jpg"></div></body>"#,
        )
        .unwrap();
        let registry = Registry::build(&doc, &MarkupConfig::default());
        let lines = format_inspect(&doc, &registry, &ViewerConfig::default());
        assert!(lines.contains(&"    001 (a.jpg)".to_string()));
        assert!(lines.contains(&"    container: missing".to_string()));
        assert!(lines.contains(&"    0 deferred".to_string()));
    }

    // =========================================================================
    // Replay
    // =========================================================================

    fn report(step: usize, action: &str, intent: Option<Intent>, applied: bool) -> StepReport {
        StepReport {
            step,
            action: action.to_string(),
            intent,
            applied,
            promoted: 0,
            state: ModalState::default(),
            shown: None,
        }
    }

    #[test]
    fn step_without_intent_is_one_line() {
        let lines = format_step(&report(3, "key \"q\"", None, false));
        assert_eq!(lines, vec!["003 key \"q\""]);
    }

    #[test]
    fn ignored_intent_is_marked() {
        let lines = format_step(&report(1, "key \"ArrowRight\"", Some(Intent::Next), false));
        assert_eq!(lines[0], "001 key \"ArrowRight\" → next (ignored)");
        assert_eq!(lines[1], "    State: closed");
    }

    #[test]
    fn promotions_are_listed() {
        let mut r = report(2, "scroll top=0", None, false);
        r.promoted = 1;
        assert_eq!(format_step(&r), vec!["002 scroll top=0", "    Promoted: 1 image"]);
    }

    #[test]
    fn replay_summary_line() {
        let lines = format_replay(&[report(1, "scrim", Some(Intent::Close), false)]);
        assert_eq!(lines.last().unwrap(), "Replayed 1 step, modal closed");
        assert!(format_replay(&[]).is_empty());
    }

    // =========================================================================
    // Render
    // =========================================================================

    #[test]
    fn render_summary() {
        let manifest: PageManifest = serde_json::from_str(
            r#"{"title": "P", "galleries": [
                {"title": "Landscapes", "images": [{"thumbnail": "a"}, {"thumbnail": "b"}]},
                {"id": "misc", "images": [{"thumbnail": "c"}]},
                {}
            ]}"#,
        )
        .unwrap();
        let lines = format_render_summary(&manifest, Path::new("out/page.html"));
        assert_eq!(lines[0], "001 Landscapes (2 images)");
        assert_eq!(lines[1], "002 misc (1 image)");
        assert_eq!(lines[2], "003 (untitled) (empty)");
        assert_eq!(lines[4], "Rendered 3 galleries, 3 images → out/page.html");
    }
}
