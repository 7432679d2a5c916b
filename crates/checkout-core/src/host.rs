//! Host Environment
//!
//! Everything the controller needs from the embedding page: viewport state,
//! navigation, popup windows, element measuring, surfaces and a local
//! executor. The browser implementation lives in `checkout-web`; tests use
//! an in-memory fake.

use std::time::Duration;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::presenter::{PresenterKind, Surface};

/// Boxed task handed to [`Host::spawn_local`]
pub type LocalTask = LocalBoxFuture<'static, ()>;

/// Width × height in CSS pixels
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Exact match, as reported by layout
    #[allow(clippy::float_cmp)]
    pub fn matches(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// A browser window opened for an external page (e.g. bank authentication).
///
/// Only ever observed, never written to.
pub trait ExternalWindow {
    /// Whether the user has closed the window
    fn is_closed(&self) -> bool;
}

/// The page the checkout is embedded into
pub trait Host: 'static {
    /// Element handle used for render targets and content slots
    type Element: Clone + 'static;

    /// Handle to a window opened with [`Host::open_window`]
    type Window: ExternalWindow + 'static;

    /// Visual surface backing a presenter
    type Surface: Surface<Element = Self::Element> + 'static;

    /// Effective viewport width
    fn viewport_width(&self) -> f64;

    /// Full-page navigation
    fn navigate(&self, url: &str) -> Result<()>;

    /// Open `url` in a new window or tab. `None` when the browser refused.
    fn open_window(&self, url: &str) -> Option<Self::Window>;

    /// Current layout box of an element
    fn measure(&self, element: &Self::Element) -> Size;

    /// Build the surface for a presenter; `target` is the caller's element
    /// for the overlay variant.
    fn create_surface(
        &self,
        kind: PresenterKind,
        target: Option<&Self::Element>,
    ) -> Result<Self::Surface>;

    /// Run a task on the UI thread
    fn spawn_local(&self, task: LocalTask);

    /// Resolve after `duration`
    fn sleep(&self, duration: Duration) -> LocalTask;
}
