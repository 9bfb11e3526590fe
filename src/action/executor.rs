//! Action Executor
//!
//! Applies one validated action to the browser. Clicks are all-or-nothing; a
//! scroll the page refuses is logged and reported as [`ExecutedAction::ScrollRejected`]
//! so the session can move on.

use super::descriptor::{ActionDescriptor, ActionKind, ScrollDirection, ScrollDistance};
use super::resolver::ResolveError;
use crate::browser::{BrowserSession, Point, Viewport};
use crate::error::AgentError;
use serde::{Deserialize, Serialize};

/// What actually happened in the browser for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutedAction {
    Click {
        at: Point,
    },
    Scroll {
        origin: Option<Point>,
        dx: f64,
        dy: f64,
    },
    ScrollRejected {
        origin: Option<Point>,
        dx: f64,
        dy: f64,
        error: String,
    },
    /// The oracle declared the goal achieved; its action was not run
    Skipped,
}

/// Signed pixel delta for a scroll of `distance` towards `direction`
pub fn scroll_delta(direction: ScrollDirection, distance: ScrollDistance, viewport: Viewport) -> (f64, f64) {
    let fraction = distance.viewport_fraction();
    let horizontal = viewport.width as f64 * fraction;
    let vertical = viewport.height as f64 * fraction;

    match direction {
        ScrollDirection::Up => (0.0, -vertical),
        ScrollDirection::Down => (0.0, vertical),
        ScrollDirection::Left => (-horizontal, 0.0),
        ScrollDirection::Right => (horizontal, 0.0),
    }
}

pub struct ActionExecutor<'a> {
    browser: &'a dyn BrowserSession,
    viewport: Viewport,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(browser: &'a dyn BrowserSession, viewport: Viewport) -> Self {
        Self { browser, viewport }
    }

    /// Execute `action` at the resolver's verdict.
    ///
    /// An unresolved click fails with `UnresolvableTarget`, a driver failure
    /// during a click with `ExecutionError`. Scroll failures never error.
    pub async fn execute(
        &self,
        action: &ActionDescriptor,
        target: Result<Point, ResolveError>,
    ) -> Result<ExecutedAction, AgentError> {
        match action.kind {
            ActionKind::Click => {
                let at = self.viewport.clamp(target?);
                log::info!("Clicking at ({:.1}, {:.1})", at.x, at.y);

                self.browser
                    .pointer_click(at.x, at.y)
                    .await
                    .map_err(AgentError::ExecutionError)?;

                Ok(ExecutedAction::Click { at })
            }
            ActionKind::Scroll {
                direction,
                distance,
            } => {
                let origin = target.ok().map(|point| self.viewport.clamp(point));
                let (dx, dy) = scroll_delta(direction, distance, self.viewport);
                log::info!(
                    "Scrolling {} {} by ({}, {}) from {}",
                    direction.as_str(),
                    distance.as_str(),
                    dx,
                    dy,
                    origin
                        .map(|p| format!("({:.1}, {:.1})", p.x, p.y))
                        .unwrap_or_else(|| "page origin".to_string())
                );

                match self.browser.scroll_from_origin(origin, dx, dy).await {
                    Ok(()) => Ok(ExecutedAction::Scroll { origin, dx, dy }),
                    Err(e) => {
                        log::warn!("Scroll rejected by the page, continuing: {}", e);
                        Ok(ExecutedAction::ScrollRejected {
                            origin,
                            dx,
                            dy,
                            error: e.to_string(),
                        })
                    }
                }
            }
        }
    }
}
