//! Boundary traits for the OS-level primitives.
//!
//! The core never talks to a windowing system directly. Everything it needs
//! is behind [`DesktopBackend`] and [`Launcher`], so the tracker and executor
//! can be driven by a scripted fake in tests.

use async_trait::async_trait;
use serde::Serialize;

use crate::Result;

/// A top-level window as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowInfo {
    pub id: String,
    pub title: String,
    pub x: i32,
    pub y: i32,
}

/// Window enumeration, focus, position and click primitives.
#[async_trait]
pub trait DesktopBackend: Send + Sync {
    /// All visible top-level windows.
    async fn list_windows(&self) -> Result<Vec<WindowInfo>>;

    /// Current title of a window, or `None` if it no longer exists.
    async fn window_title(&self, id: &str) -> Result<Option<String>>;

    /// Raise and focus a window.
    async fn focus(&self, id: &str) -> Result<()>;

    /// Window origin in screen pixels, or `None` if it no longer exists.
    async fn window_position(&self, id: &str) -> Result<Option<(i32, i32)>>;

    /// Left-click at absolute screen coordinates. `false` means the
    /// primitive ran but reported failure.
    async fn click(&self, x: i32, y: i32) -> Result<bool>;
}

/// Starts the target application.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launch `command`, optionally on a specific display, and return the new
    /// window's id once it has appeared.
    async fn launch(&self, command: &str, display: Option<&str>) -> Result<String>;
}
