//! Browser Host
//!
//! `Host` backed by the global `window`.

use std::time::Duration;

use checkout_core::{CheckoutError, ExternalWindow, Host, LocalTask, PresenterKind, Result, Size};
use web_sys::{HtmlElement, Window};

use crate::js_message;
use crate::surface::DomSurface;

/// A popup opened for an external page
pub struct PopupWindow(Window);

impl ExternalWindow for PopupWindow {
    fn is_closed(&self) -> bool {
        // A window we can no longer inspect is treated as gone
        self.0.closed().unwrap_or(true)
    }
}

#[derive(Clone)]
pub struct BrowserHost {
    window: Window,
}

impl BrowserHost {
    pub fn new() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| CheckoutError::Surface("no global window".into()))?;
        Ok(Self { window })
    }
}

impl Host for BrowserHost {
    type Element = HtmlElement;
    type Window = PopupWindow;
    type Surface = DomSurface;

    fn viewport_width(&self) -> f64 {
        self.window
            .inner_width()
            .ok()
            .and_then(|width| width.as_f64())
            .unwrap_or_default()
    }

    fn navigate(&self, url: &str) -> Result<()> {
        self.window
            .location()
            .set_href(url)
            .map_err(|e| CheckoutError::Navigation(js_message(&e)))
    }

    fn open_window(&self, url: &str) -> Option<PopupWindow> {
        match self.window.open_with_url(url) {
            Ok(window) => window.map(PopupWindow),
            Err(e) => {
                tracing::warn!(url, error = %js_message(&e), "window.open threw");
                None
            }
        }
    }

    fn measure(&self, element: &HtmlElement) -> Size {
        let rect = element.get_bounding_client_rect();
        Size::new(rect.width(), rect.height())
    }

    fn create_surface(&self, kind: PresenterKind, target: Option<&HtmlElement>) -> Result<DomSurface> {
        tracing::debug!(?kind, in_place = target.is_some(), "Creating surface");
        DomSurface::new(self.window.clone(), target)
    }

    fn spawn_local(&self, task: LocalTask) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalTask {
        Box::pin(gloo_timers::future::sleep(duration))
    }
}
