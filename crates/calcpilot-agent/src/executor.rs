//! One token → one click.

use serde::Serialize;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backend::{DesktopBackend, Launcher};
use crate::config::{AppConfig, TimingConfig};
use crate::interface_map::{BBox, StateMap};
use crate::resolver::ElementResolver;
use crate::settle::bounded;
use crate::token::Token;
use crate::window::{WindowHandle, WindowTracker};
use crate::{Error, FailureKind, Result};

/// Absolute screen coordinates of a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClickPoint {
    pub x: i32,
    pub y: i32,
}

impl ClickPoint {
    /// Window origin plus the floored bbox midpoint.
    pub fn new(window: &WindowHandle, bbox: &BBox) -> Self {
        let (cx, cy) = bbox.center();
        Self {
            x: window.x + cx,
            y: window.y + cy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepError {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&Error> for StepError {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// What happened to one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub token: Token,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<ClickPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

impl Outcome {
    fn clicked(token: Token, element_id: &str, point: ClickPoint) -> Self {
        Self {
            token,
            success: true,
            element_id: Some(element_id.to_string()),
            point: Some(point),
            error: None,
        }
    }

    fn failed(token: Token, element_id: Option<&str>, err: &Error) -> Self {
        warn!("{} failed: {}", token, err);
        Self {
            token,
            success: false,
            element_id: element_id.map(String::from),
            point: None,
            error: Some(StepError::from(err)),
        }
    }

    pub fn kind(&self) -> Option<FailureKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// True when the rest of the instruction must not be attempted.
    pub fn is_fatal(&self) -> bool {
        self.kind().is_some_and(FailureKind::is_fatal)
    }
}

/// Resolves, targets and clicks tokens one at a time.
pub struct ActionExecutor {
    backend: Arc<dyn DesktopBackend>,
    launcher: Arc<dyn Launcher>,
    resolver: ElementResolver,
    app: AppConfig,
    timing: TimingConfig,
}

impl ActionExecutor {
    pub fn new(
        backend: Arc<dyn DesktopBackend>,
        launcher: Arc<dyn Launcher>,
        app: AppConfig,
        timing: TimingConfig,
    ) -> Self {
        Self {
            backend,
            launcher,
            resolver: ElementResolver::new(),
            app,
            timing,
        }
    }

    pub fn resolver(&self) -> &ElementResolver {
        &self.resolver
    }

    /// Make sure the tracker holds a window, launching the app if none exists.
    ///
    /// Returns the handle and whether a launch happened.
    pub async fn ensure_window(&self, tracker: &mut WindowTracker) -> Result<(WindowHandle, bool)> {
        if let Some(h) = tracker.handle() {
            return Ok((h.clone(), false));
        }
        if let Some(h) = tracker.locate().await? {
            return Ok((h, false));
        }

        info!("launching {}", self.app.launch);
        let id = bounded(
            "launch",
            self.timing.launch_timeout(),
            self.launcher.launch(&self.app.launch, self.app.display.as_deref()),
        )
        .await?;
        debug!("launcher reported window {}", id);
        sleep(self.timing.launch_settle()).await;

        match tracker.locate().await? {
            Some(h) => Ok((h, true)),
            None => Err(Error::WindowNotFound(format!(
                "launched {} but no \"{}\" window appeared",
                self.app.launch, self.app.name
            ))),
        }
    }

    /// Click the element for one token.
    pub async fn execute(&self, tracker: &mut WindowTracker, state: &StateMap, token: Token) -> Outcome {
        if let Err(e) = self.ensure_window(tracker).await {
            let e = match e {
                Error::WindowNotFound(_) => e,
                other => Error::WindowNotFound(other.to_string()),
            };
            return Outcome::failed(token, None, &e);
        }

        let (id, node) = match self.resolver.resolve(token, state) {
            Ok(found) => found,
            Err(e) => return Outcome::failed(token, None, &e),
        };
        let bbox = match node.bbox(id) {
            Ok(b) => b,
            Err(e) => return Outcome::failed(token, Some(id), &e),
        };

        let window = match self.target(tracker).await {
            Ok(w) => w,
            Err(e) => return Outcome::failed(token, Some(id), &e),
        };
        let point = ClickPoint::new(&window, &bbox);

        match bounded(
            "click",
            self.timing.call_timeout(),
            self.backend.click(point.x, point.y),
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                return Outcome::failed(token, Some(id), &Error::ClickFailed { x: point.x, y: point.y })
            }
            Err(e) => return Outcome::failed(token, Some(id), &e),
        }
        info!("clicked {} ({}) at ({}, {})", token, id, point.x, point.y);

        sleep(self.timing.click_settle()).await;
        Outcome::clicked(token, id, point)
    }

    /// Fresh position, focus, then an identity check. Coordinates come from
    /// the handle this returns and nothing older.
    async fn target(&self, tracker: &mut WindowTracker) -> Result<WindowHandle> {
        tracker.refresh_position().await?;
        tracker.ensure_focused().await?;
        tracker.revalidate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_point_is_origin_plus_floored_center() {
        let window = WindowHandle {
            id: "1".into(),
            title: "Calculator".into(),
            x: 100,
            y: 50,
        };
        let bbox = BBox {
            x1: 10,
            y1: 20,
            x2: 31,
            y2: 41,
        };
        assert_eq!(ClickPoint::new(&window, &bbox), ClickPoint { x: 120, y: 80 });
    }

    #[test]
    fn outcome_serializes_without_empty_fields() {
        let ok = Outcome::clicked(Token::Equals, "icon_3", ClickPoint { x: 1, y: 2 });
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["token"], "=");
        assert_eq!(json["element_id"], "icon_3");
        assert!(json.get("error").is_none());

        let bad = Outcome::failed(Token::Digit(4), None, &Error::ElementNotFound("4".into()));
        let json = serde_json::to_value(&bad).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "element_not_found");
        assert!(json.get("point").is_none());
        assert!(!bad.is_fatal());
    }

    #[test]
    fn window_loss_is_fatal() {
        let o = Outcome::failed(Token::Digit(1), None, &Error::WindowNotFound("gone".into()));
        assert!(o.is_fatal());
        assert_eq!(o.kind(), Some(FailureKind::WindowNotFound));
    }
}
