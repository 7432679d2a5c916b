//! # checkout-web
//!
//! Browser bindings for the PayNow checkout widget. Exposes a `Checkout`
//! class to JavaScript that drives [`checkout_core::Checkout`] with a DOM
//! surface and the page's global `zoid`.
//!
//! ```js
//! import init, { Checkout } from "checkout-web";
//!
//! await init();
//!
//! const checkout = new Checkout();
//! checkout.on("completed", ({ orderId }) => console.log(orderId));
//! checkout.open({ token, renderTo: { element: document.getElementById("pay") } });
//! ```

mod host;
mod surface;
mod templates;
mod zoid;

pub use host::{BrowserHost, PopupWindow};
pub use surface::DomSurface;
pub use zoid::{ZoidFrame, ZoidLibrary};

use std::cell::RefCell;
use std::rc::Rc;

use checkout_core::{
    Checkout, CheckoutConfig, CheckoutEvent, EventKind, FrameAdapter, ListenerId, OpenOptions,
};
use js_sys::{Function, Reflect};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

thread_local! {
    /// One zoid registration per page, shared by every `Checkout`
    static ADAPTER: Rc<FrameAdapter<ZoidLibrary>> = Rc::new(FrameAdapter::new(ZoidLibrary::default()));
}

/// Best-effort text for a thrown JS value
pub(crate) fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|error| String::from(error.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

fn read(source: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(source, &JsValue::from_str(key))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

#[derive(Serialize)]
struct FailedPayload<'a> {
    reason: &'a str,
}

/// Argument passed to JS handlers
fn event_payload(event: &CheckoutEvent) -> Result<JsValue, serde_wasm_bindgen::Error> {
    match event {
        CheckoutEvent::Ready | CheckoutEvent::Closed => Ok(JsValue::UNDEFINED),
        CheckoutEvent::Completed(completion) => serde_wasm_bindgen::to_value(completion),
        CheckoutEvent::Failed { reason } => serde_wasm_bindgen::to_value(&FailedPayload { reason }),
    }
}

struct JsListener {
    kind: EventKind,
    handler: Function,
    id: ListenerId,
}

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
}

/// The checkout widget as seen from JavaScript
#[wasm_bindgen(js_name = Checkout)]
pub struct JsCheckout {
    inner: Checkout<BrowserHost, ZoidLibrary>,
    listeners: RefCell<Vec<JsListener>>,
}

#[wasm_bindgen(js_class = Checkout)]
impl JsCheckout {
    /// `new Checkout(config?)`; `config` is an object or its JSON text
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<JsCheckout, JsError> {
        let config = if config.is_undefined() || config.is_null() {
            CheckoutConfig::default()
        } else if let Some(json) = config.as_string() {
            CheckoutConfig::from_json(&json)?
        } else {
            serde_wasm_bindgen::from_value(config)?
        };

        let adapter = ADAPTER.with(Rc::clone);
        let inner = Checkout::new(BrowserHost::new()?, adapter, config)?;

        Ok(Self {
            inner,
            listeners: RefCell::new(Vec::new()),
        })
    }

    /// `open({ token, baseURL?, renderTo?: { element } })`
    ///
    /// Throws when a checkout is already open, the token is missing or the
    /// target element has the wrong size.
    pub fn open(&self, options: JsValue) -> Result<(), JsError> {
        let token = read(&options, "token")
            .and_then(|token| token.as_string())
            .unwrap_or_default();

        let mut open = OpenOptions::new(token);
        if let Some(base_url) = read(&options, "baseURL").and_then(|url| url.as_string()) {
            open = open.with_base_url(base_url);
        }
        if let Some(element) = read(&options, "renderTo")
            .and_then(|render_to| read(&render_to, "element"))
        {
            let element = element
                .dyn_into::<HtmlElement>()
                .map_err(|_| JsError::new("renderTo.element must be an HTMLElement"))?;
            open = open.with_render_to(element);
        }

        self.inner.open(open)?;
        Ok(())
    }

    /// Start a graceful close; `closed` fires once teardown finishes
    pub fn close(&self) {
        self.inner.request_close();
    }

    /// `on(event, handler)` for `ready`, `closed`, `completed` or `failed`
    pub fn on(&self, event: &str, handler: Function) -> Result<(), JsError> {
        let kind: EventKind = event.parse().map_err(|e: String| JsError::new(&e))?;

        let callback = handler.clone();
        let id = self.inner.on(kind, move |emitted| {
            let result = event_payload(emitted)
                .map_err(|e| JsValue::from_str(&e.to_string()))
                .and_then(|payload| callback.call1(&JsValue::NULL, &payload));
            if let Err(e) = result {
                tracing::error!(event = %emitted.kind(), error = %js_message(&e), "Event handler threw");
            }
        });

        self.listeners
            .borrow_mut()
            .push(JsListener { kind, handler, id });
        Ok(())
    }

    /// `off(event, handler)`; matches handlers by identity
    pub fn off(&self, event: &str, handler: &Function) -> Result<(), JsError> {
        let kind: EventKind = event.parse().map_err(|e: String| JsError::new(&e))?;
        let handler = JsValue::from(handler.clone());

        let removed: Vec<ListenerId> = {
            let mut listeners = self.listeners.borrow_mut();
            let (matching, kept): (Vec<_>, Vec<_>) = listeners.drain(..).partition(|listener| {
                listener.kind == kind && JsValue::from(listener.handler.clone()) == handler
            });
            *listeners = kept;
            matching.into_iter().map(|listener| listener.id).collect()
        };

        for id in removed {
            self.inner.off(kind, id);
        }
        Ok(())
    }

    #[wasm_bindgen(getter = isOpen)]
    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Session state name: `closed`, `opening`, `open` or `closing`
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.inner.state().as_str().to_string()
    }
}
