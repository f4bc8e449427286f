//! Tracking the one true target window among everything on screen.
//!
//! A [`WindowHandle`] goes stale the moment the window moves or closes, so
//! the tracker re-reads position and re-checks identity before every click.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{DesktopBackend, WindowInfo};
use crate::config::{AppConfig, TimingConfig};
use crate::settle::{bounded, until_stable};
use crate::{Error, Result};

/// A located window. Only trusted until the next refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowHandle {
    pub id: String,
    pub title: String,
    pub x: i32,
    pub y: i32,
}

impl From<WindowInfo> for WindowHandle {
    fn from(w: WindowInfo) -> Self {
        Self {
            id: w.id,
            title: w.title,
            x: w.x,
            y: w.y,
        }
    }
}

/// Identity test for the target window.
///
/// Titles containing an excluded fragment are rejected first, so an editor
/// with "calculator.rs" open is never mistaken for the app.
#[derive(Debug, Clone)]
pub struct TargetPredicate {
    name: String,
    excludes: Vec<String>,
}

impl TargetPredicate {
    pub fn new<S: AsRef<str>>(name: &str, excludes: &[S]) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            excludes: excludes
                .iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn from_config(app: &AppConfig) -> Self {
        Self::new(&app.name, &app.exclude_titles)
    }

    pub fn is_excluded(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.excludes.iter().any(|e| title.contains(e.as_str()))
    }

    pub fn matches(&self, title: &str) -> bool {
        if self.is_excluded(title) {
            return false;
        }
        let title = title.trim().to_lowercase();
        title.starts_with(&self.name)
    }
}

/// Where the tracker stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerState {
    Unresolved,
    Resolved(WindowHandle),
    /// Last position read failed; the handle must not be used for coordinates.
    Stale(WindowHandle),
    NotFound,
}

pub struct WindowTracker {
    backend: Arc<dyn DesktopBackend>,
    predicate: TargetPredicate,
    timing: TimingConfig,
    state: TrackerState,
}

impl WindowTracker {
    pub fn new(backend: Arc<dyn DesktopBackend>, predicate: TargetPredicate, timing: TimingConfig) -> Self {
        Self {
            backend,
            predicate,
            timing,
            state: TrackerState::Unresolved,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn predicate(&self) -> &TargetPredicate {
        &self.predicate
    }

    /// The current handle, if resolved and not stale.
    pub fn handle(&self) -> Option<&WindowHandle> {
        match &self.state {
            TrackerState::Resolved(h) => Some(h),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.handle().is_some()
    }

    /// Forget the current window, e.g. after the app was closed.
    pub fn invalidate(&mut self) {
        if let TrackerState::Resolved(h) = &self.state {
            self.state = TrackerState::Stale(h.clone());
        }
    }

    /// Enumerate windows and pick the first one passing the predicate.
    pub async fn locate(&mut self) -> Result<Option<WindowHandle>> {
        let windows = bounded(
            "list windows",
            self.timing.call_timeout(),
            self.backend.list_windows(),
        )
        .await?;

        let found = windows.into_iter().find(|w| {
            let ok = self.predicate.matches(&w.title);
            if !ok && self.predicate.is_excluded(&w.title) {
                debug!("skipping excluded window {} \"{}\"", w.id, w.title);
            }
            ok
        });

        match found {
            Some(w) => {
                let handle = WindowHandle::from(w);
                info!("target window {} \"{}\" at ({}, {})", handle.id, handle.title, handle.x, handle.y);
                self.state = TrackerState::Resolved(handle.clone());
                Ok(Some(handle))
            }
            None => {
                debug!("no window matches the target");
                self.state = TrackerState::NotFound;
                Ok(None)
            }
        }
    }

    /// Re-read the origin. On failure, one re-locate; after that the window is gone.
    pub async fn refresh_position(&mut self) -> Result<WindowHandle> {
        let current = match &self.state {
            TrackerState::Resolved(h) | TrackerState::Stale(h) => h.clone(),
            TrackerState::Unresolved | TrackerState::NotFound => return self.relocate().await,
        };

        let read = bounded(
            "window position",
            self.timing.call_timeout(),
            self.backend.window_position(&current.id),
        )
        .await;

        match read {
            Ok(Some((x, y))) => {
                let handle = WindowHandle { x, y, ..current };
                self.state = TrackerState::Resolved(handle.clone());
                Ok(handle)
            }
            Ok(None) => {
                warn!("window {} disappeared", current.id);
                self.state = TrackerState::Stale(current);
                self.relocate().await
            }
            Err(e) => {
                warn!("position read for {} failed: {}", current.id, e);
                self.state = TrackerState::Stale(current);
                self.relocate().await
            }
        }
    }

    /// Raise the window and wait until its position stops changing.
    pub async fn ensure_focused(&mut self) -> Result<WindowHandle> {
        let handle = match self.handle() {
            Some(h) => h.clone(),
            None => self.refresh_position().await?,
        };

        bounded(
            "focus window",
            self.timing.call_timeout(),
            self.backend.focus(&handle.id),
        )
        .await?;

        let backend = self.backend.clone();
        let call_timeout = self.timing.call_timeout();
        let id = handle.id.clone();
        let settled = until_stable(
            self.timing.focus_settle(),
            self.timing.poll_interval(),
            self.timing.focus_settle() + call_timeout,
            || bounded("window position", call_timeout, backend.window_position(&id)),
        )
        .await?;

        match settled {
            Some((x, y)) => {
                let handle = WindowHandle { x, y, ..handle };
                self.state = TrackerState::Resolved(handle.clone());
                Ok(handle)
            }
            None => {
                warn!("window {} vanished while focusing", handle.id);
                self.state = TrackerState::Stale(handle);
                self.relocate().await
            }
        }
    }

    /// Confirm the tracked window is still the target.
    ///
    /// If it is not, switch to the next matching window at most once. The
    /// replacement is focused and settled, then checked again, so the returned
    /// handle always belongs to a window that was focused as the target.
    pub async fn revalidate(&mut self) -> Result<WindowHandle> {
        if let Some(handle) = self.handle().cloned() {
            match self.target_title(&handle.id).await? {
                Some(title) => return Ok(WindowHandle { title, ..handle }),
                None => {
                    warn!("window {} is no longer the target", handle.id);
                    self.state = TrackerState::Stale(handle);
                }
            }
        }

        let switched = self.relocate().await?;
        info!("switching to window {} \"{}\"", switched.id, switched.title);
        let focused = self.ensure_focused().await?;
        match self.target_title(&focused.id).await? {
            Some(title) => Ok(WindowHandle { title, ..focused }),
            None => {
                self.state = TrackerState::NotFound;
                Err(Error::WindowNotFound(format!(
                    "window {} stopped matching \"{}\" after focus",
                    focused.id, self.predicate.name
                )))
            }
        }
    }

    /// Current title of `id` if it still passes the predicate.
    async fn target_title(&self, id: &str) -> Result<Option<String>> {
        let title = bounded(
            "window title",
            self.timing.call_timeout(),
            self.backend.window_title(id),
        )
        .await?;
        Ok(title.filter(|t| self.predicate.matches(t)))
    }

    async fn relocate(&mut self) -> Result<WindowHandle> {
        match self.locate().await {
            Ok(Some(h)) => Ok(h),
            Ok(None) => Err(Error::WindowNotFound(format!(
                "no window titled \"{}\"",
                self.predicate.name
            ))),
            Err(e) => {
                self.state = TrackerState::NotFound;
                Err(Error::WindowNotFound(format!("re-locate failed: {}", e)))
            }
        }
    }
}
