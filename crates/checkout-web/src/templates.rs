//! DOM Templates
//!
//! Inline styles for the presenter layers and the two templates zoid asks
//! for while mounting: the prerender document shown inside the placeholder
//! iframe, and the container wrapping both iframes.

use checkout_core::Size;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, HtmlElement};

/// Backdrop tint shared by the modal layer and in-place overlays
pub const BACKDROP_TINT: &str = "rgba(0, 0, 0, 0.7)";

/// Full-viewport layer appended to `body`
pub const LAYER_CSS: &str = "
    position: fixed;
    inset: 0;
    display: flex;
    align-items: center;
    justify-content: center;
    z-index: 999999;
    background: rgba(0, 0, 0, 0.7);
    opacity: 0;
    transition: opacity 0.3s ease;
    pointer-events: none;
";

/// Properties applied to a caller element used as an overlay root
pub const IN_PLACE_PROPERTIES: [(&str, &str); 5] = [
    ("display", "flex"),
    ("align-items", "center"),
    ("justify-content", "center"),
    ("transition", "background 0.3s ease"),
    ("border-radius", "5px"),
];

pub const SPINNER_CSS: &str = "
    width: 32px;
    height: 32px;
    border: 4px solid rgba(255, 255, 255, 0.7);
    border-bottom-color: transparent;
    border-radius: 50%;
    position: absolute;
    animation: paynow-gg_spin 1s linear infinite;
    transition: opacity 0.3s ease;
";

pub const CONTENT_CSS: &str = "
    opacity: 0;
    transition: opacity 0.3s ease;
";

const PRERENDER_BODY_CSS: &str = "
    margin: 0;
    padding: 0;
    width: 100%;
    height: 100%;
    display: flex;
    align-items: center;
    justify-content: center;
    background: none !important;
";

const PRERENDER_FRAME_CSS: &str = "
    position: absolute;
    width: 100%;
    height: 100%;
    border: none;
";

const FRAME_CSS: &str = "
    position: absolute;
    width: 100%;
    height: 100%;
    border: none;
    border-radius: 5px !important;
";

pub fn create_div(document: &Document, css: &str) -> Result<HtmlElement, JsValue> {
    let element: HtmlElement = document.create_element("div")?.dyn_into()?;
    element.style().set_css_text(css);
    Ok(element)
}

/// Empty, transparent document for the placeholder iframe.
///
/// Built in the iframe's own document, which zoid passes as `doc`.
pub fn prerender_template(doc: &Document) -> Result<HtmlElement, JsValue> {
    let html: HtmlElement = doc.create_element("html")?.dyn_into()?;
    let body: HtmlElement = doc.create_element("body")?.dyn_into()?;
    body.style().set_css_text(PRERENDER_BODY_CSS);
    html.append_child(&body)?;
    Ok(html)
}

/// Fixed-size box stacking the prerender frame under the real one
pub fn container_template(
    doc: &Document,
    dimensions: Size,
    frame: &HtmlElement,
    prerender_frame: &HtmlElement,
) -> Result<HtmlElement, JsValue> {
    let container = create_div(
        doc,
        &format!(
            "position: relative; width: {}px; height: {}px;",
            dimensions.width, dimensions.height
        ),
    )?;

    prerender_frame.style().set_css_text(PRERENDER_FRAME_CSS);
    frame.style().set_css_text(FRAME_CSS);

    container.append_child(prerender_frame)?;
    container.append_child(frame)?;
    Ok(container)
}
