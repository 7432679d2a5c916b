//! DOM Surface
//!
//! Backs both presenter variants. Without a target the surface is a fixed
//! full-viewport layer appended to `body`; with one, the caller's element is
//! styled in place and its original inline styles are put back on teardown.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use checkout_core::{CheckoutError, DismissTriggers, Result, Surface};
use js_sys::{Function, Promise};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AddEventListenerOptions, Document, HtmlElement, KeyboardEvent, MouseEvent, Window};

use crate::js_message;
use crate::templates::{
    create_div, BACKDROP_TINT, CONTENT_CSS, IN_PLACE_PROPERTIES, LAYER_CSS, SPINNER_CSS,
};

struct DismissListeners {
    keydown: Option<Closure<dyn FnMut(KeyboardEvent)>>,
    click: Option<Closure<dyn FnMut(MouseEvent)>>,
}

/// Attached `transitionend` callback; detached on drop
struct TransitionListener {
    root: HtmlElement,
    callback: Function,
}

impl Drop for TransitionListener {
    fn drop(&mut self) {
        let _ = self
            .root
            .remove_event_listener_with_callback("transitionend", &self.callback);
    }
}

enum Root {
    /// Layer created and owned by the surface
    Layer,
    /// Caller element; holds its `cssText` from before styling
    InPlace(String),
}

pub struct DomSurface {
    window: Window,
    document: Document,
    root: HtmlElement,
    root_kind: Root,
    spinner: HtmlElement,
    content: HtmlElement,
    listeners: RefCell<Option<DismissListeners>>,
}

fn surface_err(err: &JsValue) -> CheckoutError {
    CheckoutError::Surface(js_message(err))
}

impl DomSurface {
    pub fn new(window: Window, target: Option<&HtmlElement>) -> Result<Self> {
        let document = window
            .document()
            .ok_or_else(|| CheckoutError::Surface("window has no document".into()))?;

        let (root, root_kind) = match target {
            Some(element) => {
                let original = element.style().css_text();
                let position = window
                    .get_computed_style(element)
                    .ok()
                    .flatten()
                    .and_then(|style| style.get_property_value("position").ok());
                if position.as_deref() == Some("static") {
                    element
                        .style()
                        .set_property("position", "relative")
                        .map_err(|e| surface_err(&e))?;
                }
                for (name, value) in IN_PLACE_PROPERTIES {
                    element
                        .style()
                        .set_property(name, value)
                        .map_err(|e| surface_err(&e))?;
                }
                (element.clone(), Root::InPlace(original))
            }
            None => {
                let layer = create_div(&document, LAYER_CSS).map_err(|e| surface_err(&e))?;
                let body = document
                    .body()
                    .ok_or_else(|| CheckoutError::Surface("document has no body".into()))?;
                body.append_child(&layer).map_err(|e| surface_err(&e))?;
                (layer, Root::Layer)
            }
        };

        let spinner = create_div(&document, SPINNER_CSS).map_err(|e| surface_err(&e))?;
        let content = create_div(&document, CONTENT_CSS).map_err(|e| surface_err(&e))?;
        root.append_child(&spinner).map_err(|e| surface_err(&e))?;
        root.append_child(&content).map_err(|e| surface_err(&e))?;

        Ok(Self {
            window,
            document,
            root,
            root_kind,
            spinner,
            content,
            listeners: RefCell::new(None),
        })
    }

    fn set_style(element: &HtmlElement, name: &str, value: &str) {
        if let Err(e) = element.style().set_property(name, value) {
            tracing::warn!(property = name, error = %js_message(&e), "Failed to set style");
        }
    }
}

#[async_trait(?Send)]
impl Surface for DomSurface {
    type Element = HtmlElement;

    fn content_slot(&self) -> HtmlElement {
        self.content.clone()
    }

    fn has_style(&self, id: &str) -> bool {
        self.document.get_element_by_id(id).is_some()
    }

    fn insert_style(&self, id: &str, css: &str) {
        let inserted = (|| -> std::result::Result<(), JsValue> {
            let style = self.document.create_element("style")?;
            style.set_id(id);
            style.set_text_content(Some(css));
            if let Some(head) = self.document.head() {
                head.append_child(&style)?;
            }
            Ok(())
        })();

        if let Err(e) = inserted {
            tracing::warn!(id, error = %js_message(&e), "Failed to insert style");
        }
    }

    async fn next_frame(&self) {
        let window = self.window.clone();
        let promise = Promise::new(&mut |resolve, _reject| {
            if window.request_animation_frame(&resolve).is_err() {
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        let _ = JsFuture::from(promise).await;
    }

    async fn transition_end(&self) {
        let mut listener = None;
        let mut failed = None;
        let promise = Promise::new(&mut |resolve, _reject| {
            let options = AddEventListenerOptions::new();
            options.set_once(true);
            match self
                .root
                .add_event_listener_with_callback_and_add_event_listener_options(
                    "transitionend",
                    &resolve,
                    &options,
                ) {
                Ok(()) => {
                    listener = Some(TransitionListener {
                        root: self.root.clone(),
                        callback: resolve,
                    })
                }
                Err(e) => failed = Some(e),
            }
        });

        if let Some(e) = failed {
            tracing::warn!(error = %js_message(&e), "Failed to listen for transitionend");
            return;
        }

        // Dropping the guard detaches the callback when the fallback wins
        let _listener = listener;
        let _ = JsFuture::from(promise).await;
    }

    async fn delay(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }

    fn set_backdrop_visible(&self, visible: bool) {
        match self.root_kind {
            Root::Layer => {
                Self::set_style(&self.root, "opacity", if visible { "1" } else { "0" });
                Self::set_style(
                    &self.root,
                    "pointer-events",
                    if visible { "auto" } else { "none" },
                );
            }
            Root::InPlace(_) => {
                Self::set_style(
                    &self.root,
                    "background",
                    if visible { BACKDROP_TINT } else { "transparent" },
                );
            }
        }
    }

    fn set_spinner_visible(&self, visible: bool) {
        Self::set_style(&self.spinner, "opacity", if visible { "1" } else { "0" });
    }

    fn set_content_visible(&self, visible: bool) {
        Self::set_style(&self.content, "opacity", if visible { "1" } else { "0" });
    }

    fn set_scroll_locked(&self, locked: bool) {
        if let Some(body) = self.document.body() {
            Self::set_style(&body, "overflow", if locked { "hidden" } else { "" });
        }
    }

    fn listen_dismiss(&self, triggers: DismissTriggers, on_dismiss: Rc<dyn Fn()>) {
        self.unlisten_dismiss();

        let keydown = triggers.escape_key.then(|| {
            let on_dismiss = Rc::clone(&on_dismiss);
            let closure = Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
                if event.key() == "Escape" {
                    on_dismiss();
                }
            });
            if let Err(e) = self
                .document
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())
            {
                tracing::warn!(error = %js_message(&e), "Failed to listen for Escape");
            }
            closure
        });

        let click = triggers.backdrop_click.then(|| {
            let root = JsValue::from(self.root.clone());
            let closure = Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
                // Only clicks on the backdrop itself, not on the frame inside it
                if event.target().is_some_and(|target| JsValue::from(target) == root) {
                    on_dismiss();
                }
            });
            if let Err(e) = self
                .root
                .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())
            {
                tracing::warn!(error = %js_message(&e), "Failed to listen for backdrop clicks");
            }
            closure
        });

        *self.listeners.borrow_mut() = Some(DismissListeners { keydown, click });
    }

    fn unlisten_dismiss(&self) {
        let Some(listeners) = self.listeners.borrow_mut().take() else {
            return;
        };

        if let Some(keydown) = listeners.keydown {
            let _ = self
                .document
                .remove_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref());
        }
        if let Some(click) = listeners.click {
            let _ = self
                .root
                .remove_event_listener_with_callback("click", click.as_ref().unchecked_ref());
        }
    }

    fn teardown(&self) {
        self.unlisten_dismiss();

        self.spinner.remove();
        self.content.remove();

        match &self.root_kind {
            Root::Layer => self.root.remove(),
            Root::InPlace(original) => self.root.style().set_css_text(original),
        }
    }
}

impl Drop for DomSurface {
    fn drop(&mut self) {
        self.unlisten_dismiss();
    }
}
