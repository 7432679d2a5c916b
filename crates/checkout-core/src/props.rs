//! Frame Props
//!
//! The data contract between the widget and the remote checkout page. The
//! remote page receives a token, an optional base URL, the external page flag
//! and three callbacks it may invoke at any time after mounting.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Payload of the `completed` event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub order_id: String,
}

impl Completion {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
        }
    }
}

/// Capabilities the remote page may call back into
#[derive(Clone)]
pub struct FrameCallbacks {
    close_gracefully: Rc<dyn Fn()>,
    open_external_page: Rc<dyn Fn(String)>,
    on_completed: Rc<dyn Fn(Completion)>,
}

impl FrameCallbacks {
    pub fn new(
        close_gracefully: impl Fn() + 'static,
        open_external_page: impl Fn(String) + 'static,
        on_completed: impl Fn(Completion) + 'static,
    ) -> Self {
        Self {
            close_gracefully: Rc::new(close_gracefully),
            open_external_page: Rc::new(open_external_page),
            on_completed: Rc::new(on_completed),
        }
    }

    /// Ask the widget to close itself
    pub fn close_gracefully(&self) {
        (self.close_gracefully)();
    }

    /// Open `url` in a new window and track it
    pub fn open_external_page(&self, url: impl Into<String>) {
        (self.open_external_page)(url.into());
    }

    /// Report a finished order
    pub fn on_completed(&self, completion: Completion) {
        (self.on_completed)(completion);
    }
}

impl fmt::Debug for FrameCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCallbacks").finish_non_exhaustive()
    }
}

/// Initial props for a frame instance
#[derive(Clone, Debug)]
pub struct PropBag {
    pub token: String,
    pub base_url: Option<String>,
    pub external_page_open: bool,
    pub callbacks: FrameCallbacks,
}

/// Partial props pushed to an already-mounted frame
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_page_open: Option<bool>,
}

impl PropUpdate {
    pub const fn external_page_open(open: bool) -> Self {
        Self {
            external_page_open: Some(open),
        }
    }
}

/// Prop value type, as understood by the mounting library
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    String,
    Boolean,
    Function,
}

impl PropKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Function => "function",
        }
    }
}

/// One entry of the prop schema
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropKind,
    pub required: bool,
}

impl PropSchema {
    fn new(name: &str, kind: PropKind, required: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            required,
        }
    }
}

/// Schema of the props the remote checkout page accepts
pub fn checkout_prop_schema() -> Vec<PropSchema> {
    vec![
        PropSchema::new("token", PropKind::String, true),
        PropSchema::new("baseURL", PropKind::String, false),
        PropSchema::new("closeGracefully", PropKind::Function, false),
        PropSchema::new("openExternalPage", PropKind::Function, false),
        PropSchema::new("externalPageOpen", PropKind::Boolean, true),
        PropSchema::new("onCompleted", PropKind::Function, true),
    ]
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn test_prop_update_json() {
        assert_eq!(
            serde_json::to_value(PropUpdate::external_page_open(true)).unwrap(),
            serde_json::json!({ "externalPageOpen": true })
        );
        assert_eq!(
            serde_json::to_value(PropUpdate::default()).unwrap(),
            serde_json::json!({})
        );
    }

    #[test]
    fn test_completion_uses_camel_case() {
        let completion: Completion = serde_json::from_str(r#"{"orderId":"ord_1"}"#).unwrap();
        assert_eq!(completion, Completion::new("ord_1"));
    }

    #[test]
    fn test_schema_required_props() {
        let schema = checkout_prop_schema();
        let required: Vec<_> = schema
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(required, ["token", "externalPageOpen", "onCompleted"]);
    }

    #[test]
    fn test_callbacks_forward() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (a, b, c) = (seen.clone(), seen.clone(), seen.clone());
        let callbacks = FrameCallbacks::new(
            move || a.borrow_mut().push("close".to_string()),
            move |url| b.borrow_mut().push(url),
            move |done: Completion| c.borrow_mut().push(done.order_id),
        );

        callbacks.open_external_page("https://bank.example/3ds");
        callbacks.on_completed(Completion::new("ord_9"));
        callbacks.close_gracefully();

        assert_eq!(
            *seen.borrow(),
            ["https://bank.example/3ds", "ord_9", "close"]
        );
    }
}
