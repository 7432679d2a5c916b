//! zoid Bindings
//!
//! Raw bindings to the global `zoid` object plus the `ComponentLibrary`
//! built on top of them.
//!
//! ```js
//!   const Component = zoid.create({ tag, url, dimensions, props, ... });
//!   const instance = Component({ token, onCompleted, ... });
//!   await instance.renderTo(window, element, "iframe");
//!   instance.updateProps({ externalPageOpen: true });
//!   await instance.close();
//! ```

use std::cell::RefCell;

use async_trait::async_trait;
use checkout_core::{
    CheckoutError, Completion, ComponentDefinition, ComponentLibrary, FrameCallbacks,
    MountedFrame, PropBag, PropUpdate, Result,
};
use js_sys::{Function, Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, HtmlElement};

use crate::js_message;
use crate::templates::{container_template, prerender_template};

#[wasm_bindgen]
extern "C" {
    /// `zoid.create(options)` → component constructor
    #[wasm_bindgen(catch, js_namespace = zoid, js_name = create)]
    fn zoid_create(options: &Object) -> std::result::Result<Function, JsValue>;

    /// Live component instance
    #[wasm_bindgen(js_name = ZoidComponentInstance)]
    #[derive(Debug, Clone)]
    pub type ZoidInstance;

    /// `instance.renderTo(window, element, context)` → `Promise`
    #[wasm_bindgen(method, catch, js_name = renderTo)]
    fn render_to(
        this: &ZoidInstance,
        container: &JsValue,
        element: &HtmlElement,
        context: &str,
    ) -> std::result::Result<Promise, JsValue>;

    /// `instance.updateProps(props)` → `Promise`
    #[wasm_bindgen(method, catch, js_name = updateProps)]
    fn update_props(this: &ZoidInstance, props: &JsValue) -> std::result::Result<Promise, JsValue>;

    /// `instance.close()` → `Promise`
    #[wasm_bindgen(method, catch)]
    fn close(this: &ZoidInstance) -> std::result::Result<Promise, JsValue>;
}

type TemplateClosure = Closure<dyn Fn(JsValue) -> std::result::Result<JsValue, JsValue>>;

/// Callbacks zoid keeps calling into after `create`
struct DefinitionClosures {
    _url: Closure<dyn Fn(JsValue) -> String>,
    _prerender: TemplateClosure,
    _container: TemplateClosure,
}

struct Registration {
    component: Function,
    _closures: DefinitionClosures,
}

fn set(target: &Object, key: &str, value: &JsValue) -> std::result::Result<(), JsValue> {
    Reflect::set(target, &JsValue::from_str(key), value).map(|_| ())
}

fn get(source: &JsValue, key: &str) -> JsValue {
    Reflect::get(source, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

fn mount_err(err: &JsValue) -> CheckoutError {
    CheckoutError::Mount(js_message(err))
}

/// `ComponentLibrary` over the page's global `zoid`
#[derive(Default)]
pub struct ZoidLibrary {
    registration: RefCell<Option<Registration>>,
}

impl ZoidLibrary {
    fn options(
        definition: &ComponentDefinition,
    ) -> std::result::Result<(Object, DefinitionClosures), JsValue> {
        let options = Object::new();
        set(&options, "tag", &definition.tag.as_str().into())?;

        let fallback = definition.clone();
        let url = Closure::<dyn Fn(JsValue) -> String>::new(move |args: JsValue| {
            let props = get(&args, "props");
            let token = get(&props, "token").as_string().unwrap_or_default();
            let base_url = get(&props, "baseURL").as_string();
            fallback.url_for(&token, base_url.as_deref())
        });
        set(&options, "url", url.as_ref())?;

        let dimensions = Object::new();
        set(&dimensions, "width", &definition.dimensions.width.into())?;
        set(&dimensions, "height", &definition.dimensions.height.into())?;
        set(&options, "dimensions", &dimensions)?;

        let auto_resize = Object::new();
        set(&auto_resize, "width", &definition.auto_resize.into())?;
        set(&auto_resize, "height", &definition.auto_resize.into())?;
        set(&options, "autoResize", &auto_resize)?;

        let prerender: TemplateClosure = Closure::new(|args: JsValue| {
            let doc: Document = get(&args, "doc").dyn_into()?;
            prerender_template(&doc).map(JsValue::from)
        });
        set(&options, "prerenderTemplate", prerender.as_ref())?;

        let dimensions = definition.dimensions;
        let container: TemplateClosure = Closure::new(move |args: JsValue| {
            let doc: Document = get(&args, "doc").dyn_into()?;
            let frame: HtmlElement = get(&args, "frame").dyn_into()?;
            let prerender_frame: HtmlElement = get(&args, "prerenderFrame").dyn_into()?;
            container_template(&doc, dimensions, &frame, &prerender_frame).map(JsValue::from)
        });
        set(&options, "containerTemplate", container.as_ref())?;

        let iframe = Object::new();
        set(&iframe, "allow", &definition.iframe_allow.as_str().into())?;
        let attributes = Object::new();
        set(&attributes, "iframe", &iframe)?;
        set(&options, "attributes", &attributes)?;

        let props = Object::new();
        for schema in &definition.props {
            let prop = Object::new();
            set(&prop, "type", &schema.kind.as_str().into())?;
            set(&prop, "required", &schema.required.into())?;
            set(&props, &schema.name, &prop)?;
        }
        set(&options, "props", &props)?;

        Ok((
            options,
            DefinitionClosures {
                _url: url,
                _prerender: prerender,
                _container: container,
            },
        ))
    }
}

impl ComponentLibrary for ZoidLibrary {
    type Element = HtmlElement;
    type Frame = ZoidFrame;

    fn register(&self, definition: &ComponentDefinition) -> Result<()> {
        let (options, closures) = Self::options(definition).map_err(|e| mount_err(&e))?;
        let component = zoid_create(&options).map_err(|e| mount_err(&e))?;
        *self.registration.borrow_mut() = Some(Registration {
            component,
            _closures: closures,
        });
        Ok(())
    }

    fn instantiate(&self, props: PropBag) -> Result<ZoidFrame> {
        let component = self
            .registration
            .borrow()
            .as_ref()
            .map(|registration| registration.component.clone())
            .ok_or_else(|| CheckoutError::Mount("component is not registered".into()))?;

        let callbacks = FrameClosures::new(&props.callbacks);
        let js_props = callbacks.props(&props).map_err(|e| mount_err(&e))?;

        let instance = component
            .call1(&JsValue::NULL, &js_props)
            .map_err(|e| mount_err(&e))?
            .unchecked_into::<ZoidInstance>();

        Ok(ZoidFrame {
            instance,
            _callbacks: callbacks,
        })
    }
}

/// JS functions handed to the remote page as props
struct FrameClosures {
    close_gracefully: Closure<dyn Fn()>,
    open_external_page: Closure<dyn Fn(String)>,
    on_completed: Closure<dyn Fn(JsValue)>,
}

impl FrameClosures {
    fn new(callbacks: &FrameCallbacks) -> Self {
        let close = callbacks.clone();
        let open = callbacks.clone();
        let completed = callbacks.clone();

        Self {
            close_gracefully: Closure::new(move || close.close_gracefully()),
            open_external_page: Closure::new(move |url: String| open.open_external_page(url)),
            on_completed: Closure::new(move |payload: JsValue| {
                match serde_wasm_bindgen::from_value::<Completion>(payload) {
                    Ok(completion) => completed.on_completed(completion),
                    Err(e) => tracing::warn!(error = %e, "Ignoring malformed onCompleted payload"),
                }
            }),
        }
    }

    fn props(&self, bag: &PropBag) -> std::result::Result<Object, JsValue> {
        let props = Object::new();
        set(&props, "token", &bag.token.as_str().into())?;
        if let Some(base_url) = &bag.base_url {
            set(&props, "baseURL", &base_url.as_str().into())?;
        }
        set(&props, "externalPageOpen", &bag.external_page_open.into())?;
        set(&props, "closeGracefully", self.close_gracefully.as_ref())?;
        set(&props, "openExternalPage", self.open_external_page.as_ref())?;
        set(&props, "onCompleted", self.on_completed.as_ref())?;
        Ok(props)
    }
}

/// One zoid instance and the closures it holds
pub struct ZoidFrame {
    instance: ZoidInstance,
    _callbacks: FrameClosures,
}

#[async_trait(?Send)]
impl MountedFrame for ZoidFrame {
    type Element = HtmlElement;

    async fn render(&self, slot: &HtmlElement) -> Result<()> {
        let window = web_sys::window()
            .ok_or_else(|| CheckoutError::Render("no global window".into()))?;

        let promise = self
            .instance
            .render_to(&window.into(), slot, "iframe")
            .map_err(|e| CheckoutError::Render(js_message(&e)))?;

        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|e| CheckoutError::Render(js_message(&e)))
    }

    fn update_props(&self, update: PropUpdate) -> Result<()> {
        let props = serde_wasm_bindgen::to_value(&update)
            .map_err(|e| CheckoutError::Frame(e.to_string()))?;
        let promise = self
            .instance
            .update_props(&props)
            .map_err(|e| CheckoutError::Frame(js_message(&e)))?;

        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                tracing::warn!(error = %js_message(&e), "updateProps rejected");
            }
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let promise = self
            .instance
            .close()
            .map_err(|e| CheckoutError::Frame(js_message(&e)))?;

        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|e| CheckoutError::Frame(js_message(&e)))
    }
}
