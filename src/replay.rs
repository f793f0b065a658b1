//! Scripted input replay.
//!
//! A replay script is a JSON array of steps, each tagged by `action`:
//!
//! ```json
//! [
//!   { "action": "scroll", "top": 0 },
//!   { "action": "click", "target": { "gallery": "landscapes", "index": 2 } },
//!   { "action": "key", "key": "ArrowRight" },
//!   { "action": "swipe", "from": 300, "to": 200 },
//!   { "action": "click", "target": "#modal-close" }
//! ]
//! ```
//!
//! Targets are either `"#element-id"` or a `{gallery, index}` thumbnail
//! address resolved through the session's registry.
//!
//! Pages replayed without `--eager` get a [`ViewportWatcher`] with an
//! estimated layout: deferred images stacked one row apart in document order.
//! Real geometry needs a layout engine; the estimate is enough to exercise
//! scroll-driven promotion.

use crate::config::ViewerConfig;
use crate::dom::{Document, MarkupError, NodeId};
use crate::input::{InputEvent, Intent, Key};
use crate::lazy::{Bounds, ProximityWatcher, ViewportWatcher};
use crate::modal::ModalState;
use crate::session::{Event, Outcome, Session};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid replay script: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error("step {step}: no element for target {target}")]
    UnknownTarget { step: usize, target: String },
}

/// Something a step points at.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Target {
    /// `"#element-id"`
    Element(String),
    Thumbnail { gallery: String, index: usize },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Element(selector) => write!(f, "{selector}"),
            Target::Thumbnail { gallery, index } => write!(f, "{gallery}[{index}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    Click {
        target: Target,
    },
    Key {
        key: String,
        #[serde(default)]
        target: Option<Target>,
    },
    /// Pointer down on the modal backdrop.
    Scrim,
    TouchStart {
        x: f64,
    },
    TouchEnd {
        x: f64,
    },
    /// Shorthand for `touch-start` then `touch-end`.
    Swipe {
        from: f64,
        to: f64,
    },
    Scroll {
        top: f64,
    },
    /// The target image finished fetching its current source.
    Loaded {
        target: Target,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Click { target } => write!(f, "click {target}"),
            Step::Key {
                key,
                target: Some(target),
            } => write!(f, "key {key:?} on {target}"),
            Step::Key { key, target: None } => write!(f, "key {key:?}"),
            Step::Scrim => write!(f, "scrim"),
            Step::TouchStart { x } => write!(f, "touch-start x={x}"),
            Step::TouchEnd { x } => write!(f, "touch-end x={x}"),
            Step::Swipe { from, to } => write!(f, "swipe {from} -> {to}"),
            Step::Scroll { top } => write!(f, "scroll top={top}"),
            Step::Loaded { target } => write!(f, "loaded {target}"),
        }
    }
}

/// Result of replaying one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    /// 1-based position in the script.
    pub step: usize,
    pub action: String,
    pub intent: Option<Intent>,
    pub applied: bool,
    pub promoted: usize,
    pub state: ModalState,
    /// Source currently on the overlay image.
    pub shown: Option<String>,
}

pub fn parse_script(json: &str) -> Result<Vec<Step>, ReplayError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_script(path: &Path) -> Result<Vec<Step>, ReplayError> {
    parse_script(&fs::read_to_string(path)?)
}

/// Watcher over `doc`'s deferred images laid out one row apart.
pub fn estimated_watcher(doc: &Document, config: &ViewerConfig) -> Result<ViewportWatcher, ReplayError> {
    let options = config.lazy.proximity_options()?;
    let mut watcher = ViewportWatcher::new(options, config.viewport.height);
    let row = config.viewport.row_height;
    for (i, node) in doc
        .elements_with_class(doc.root(), &config.markup.lazy_class)
        .into_iter()
        .enumerate()
    {
        watcher.set_bounds(
            node,
            Bounds {
                top: i as f64 * row,
                height: row,
            },
        );
    }
    Ok(watcher)
}

/// Start a session for replay. `eager` skips the watcher entirely, which
/// promotes every deferred image at startup.
pub fn start_session(doc: Document, config: &ViewerConfig, eager: bool) -> Result<Session, ReplayError> {
    let watcher: Option<Box<dyn ProximityWatcher>> = if eager {
        None
    } else {
        Some(Box::new(estimated_watcher(&doc, config)?))
    };
    Ok(Session::new(doc, config, watcher))
}

/// Replay `steps` in order, reporting the modal state after each one.
///
/// Stops at the first step whose target can't be resolved.
pub fn run_script(session: &mut Session, steps: &[Step]) -> Result<Vec<StepReport>, ReplayError> {
    let mut reports = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let number = i + 1;
        let outcome = to_events(session, step, number)?
            .into_iter()
            .map(|event| session.dispatch(event))
            .fold(Outcome::default(), merge);
        debug!(step = number, %step, applied = outcome.applied, "replayed");

        let shown = session
            .chrome()
            .image
            .and_then(|image| session.document().attr(image, "src"))
            .map(str::to_string);
        reports.push(StepReport {
            step: number,
            action: step.to_string(),
            intent: outcome.intent,
            applied: outcome.applied,
            promoted: outcome.promoted.len(),
            state: session.state().clone(),
            shown,
        });
    }
    Ok(reports)
}

fn merge(first: Outcome, second: Outcome) -> Outcome {
    let mut promoted = first.promoted;
    promoted.extend(second.promoted);
    Outcome {
        intent: second.intent.or(first.intent),
        applied: first.applied || second.applied,
        promoted,
        loaded: first.loaded || second.loaded,
    }
}

fn to_events(session: &Session, step: &Step, number: usize) -> Result<Vec<Event>, ReplayError> {
    let input = |event| vec![Event::Input(event)];
    let events = match step {
        Step::Click { target } => input(InputEvent::Click {
            target: resolve(session, target, number)?,
        }),
        Step::Key { key, target } => {
            let Ok(key) = key.parse::<Key>();
            input(InputEvent::KeyDown {
                key,
                target: target
                    .as_ref()
                    .map(|t| resolve(session, t, number))
                    .transpose()?,
            })
        }
        Step::Scrim => {
            let target = session
                .chrome()
                .container
                .ok_or_else(|| ReplayError::UnknownTarget {
                    step: number,
                    target: "modal container".to_string(),
                })?;
            input(InputEvent::PointerDown { target })
        }
        Step::TouchStart { x } => input(InputEvent::TouchStart { screen_x: *x }),
        Step::TouchEnd { x } => input(InputEvent::TouchEnd { screen_x: *x }),
        Step::Swipe { from, to } => vec![
            Event::Input(InputEvent::TouchStart { screen_x: *from }),
            Event::Input(InputEvent::TouchEnd { screen_x: *to }),
        ],
        Step::Scroll { top } => vec![Event::Scroll { top: *top }],
        Step::Loaded { target } => vec![Event::ImageLoaded(resolve(session, target, number)?)],
    };
    Ok(events)
}

fn resolve(session: &Session, target: &Target, number: usize) -> Result<NodeId, ReplayError> {
    let found = match target {
        Target::Element(selector) => selector
            .strip_prefix('#')
            .and_then(|id| session.document().element_by_id(id)),
        Target::Thumbnail { gallery, index } => session
            .registry()
            .get(gallery)
            .and_then(|g| g.items.get(*index))
            .map(|item| item.thumbnail),
    };
    found.ok_or_else(|| ReplayError::UnknownTarget {
        step: number,
        target: target.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    fn replay(json: &str, eager: bool) -> Vec<StepReport> {
        let mut session =
            start_session(fixture_document(), &ViewerConfig::default(), eager).unwrap();
        run_script(&mut session, &parse_script(json).unwrap()).unwrap()
    }

    #[test]
    fn parses_every_action() {
        let steps = parse_script(
            r##"[
                {"action": "click", "target": "#modal-next"},
                {"action": "click", "target": {"gallery": "portraits", "index": 1}},
                {"action": "key", "key": "Escape"},
                {"action": "key", "key": "Enter", "target": {"gallery": "a", "index": 0}},
                {"action": "scrim"},
                {"action": "touch-start", "x": 10},
                {"action": "touch-end", "x": 90.5},
                {"action": "swipe", "from": 300, "to": 100},
                {"action": "scroll", "top": 640},
                {"action": "loaded", "target": "#modal-image"}
            ]"##,
        )
        .unwrap();
        assert_eq!(steps.len(), 10);
        assert_eq!(
            steps[1],
            Step::Click {
                target: Target::Thumbnail {
                    gallery: "portraits".into(),
                    index: 1
                }
            }
        );
        assert_eq!(steps[2], Step::Key { key: "Escape".into(), target: None });
        assert_eq!(steps[7], Step::Swipe { from: 300.0, to: 100.0 });
    }

    #[test]
    fn rejects_unknown_action() {
        let err = parse_script(r#"[{"action": "hover"}]"#).unwrap_err();
        assert!(matches!(err, ReplayError::Json(_)));
    }

    #[test]
    fn scenario_open_wrap_and_close() {
        let reports = replay(
            r##"[
                {"action": "click", "target": {"gallery": "landscapes", "index": 2}},
                {"action": "key", "key": "ArrowRight"},
                {"action": "key", "key": "ArrowLeft"},
                {"action": "click", "target": "#modal-close"}
            ]"##,
            true,
        );
        let states: Vec<(bool, Option<&str>, usize)> = reports
            .iter()
            .map(|r| (r.state.is_open(), r.state.active_gallery(), r.state.active_index()))
            .collect();
        assert_eq!(
            states,
            vec![
                (true, Some("landscapes"), 2),
                (true, Some("landscapes"), 0),
                (true, Some("landscapes"), 2),
                (false, None, 0),
            ]
        );
        assert_eq!(reports[1].shown.as_deref(), Some("full/landscapes/01-valley.jpg"));
        assert_eq!(reports[3].shown, None);
    }

    #[test]
    fn swipe_step_navigates() {
        let reports = replay(
            r#"[
                {"action": "click", "target": {"gallery": "portraits", "index": 0}},
                {"action": "swipe", "from": 300, "to": 100},
                {"action": "swipe", "from": 100, "to": 140}
            ]"#,
            true,
        );
        assert_eq!(reports[1].intent, Some(Intent::Next));
        assert_eq!(reports[1].state.active_index(), 1);
        assert_eq!(reports[2].intent, None);
        assert_eq!(reports[2].state.active_index(), 1);
    }

    #[test]
    fn estimated_layout_promotes_on_scroll() {
        let config = ViewerConfig::default();
        let doc = fixture_document();
        let lazy_total = doc.elements_with_class(doc.root(), "lazy").len();
        let mut session = start_session(doc, &config, false).unwrap();
        let steps = parse_script(
            r#"[
                {"action": "scroll", "top": 0},
                {"action": "scroll", "top": 0},
                {"action": "scroll", "top": 400}
            ]"#,
        )
        .unwrap();
        let reports = run_script(&mut session, &steps).unwrap();

        // 900px viewport + 200px margin reaches rows starting at 0, 320, 640, 960
        assert_eq!(reports[0].promoted, 4);
        assert_eq!(reports[1].promoted, 0);
        // Scrolling 400px brings the row at 1280 into range, not the one at 1600
        assert_eq!(reports[2].promoted, 1);
        assert_eq!(session.loader().pending_count(), lazy_total - 5);
    }

    #[test]
    fn unknown_target_reports_step() {
        let mut session =
            start_session(fixture_document(), &ViewerConfig::default(), true).unwrap();
        let steps = parse_script(
            r##"[
                {"action": "scrim"},
                {"action": "click", "target": "#nope"}
            ]"##,
        )
        .unwrap();
        match run_script(&mut session, &steps) {
            Err(ReplayError::UnknownTarget { step, target }) => {
                assert_eq!(step, 2);
                assert_eq!(target, "#nope");
            }
            other => panic!("expected UnknownTarget, got {other:?}"),
        }
    }
}
