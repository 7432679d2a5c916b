//! Embedded Component Adapter
//!
//! Contract with the cross-origin mounting library (zoid in the browser)
//! and the once-per-process registration guard around it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let adapter = Rc::new(FrameAdapter::new(ZoidLibrary::default()));
//! let definition = ComponentDefinition::from_config(&config);
//!
//! let frame = adapter.instantiate(&definition, props)?;
//! frame.render(&slot).await?;
//! frame.update_props(PropUpdate::external_page_open(true))?;
//! frame.close().await?;
//! ```

use async_trait::async_trait;
use once_cell::unsync::OnceCell;

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::host::Size;
use crate::props::{checkout_prop_schema, PropBag, PropSchema, PropUpdate};

/// Everything the mounting library needs to register the component type
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentDefinition {
    pub tag: String,
    /// Origin used when an instance has no `base_url` prop
    pub base_url: String,
    pub dimensions: Size,
    /// The frame always renders at `dimensions`
    pub auto_resize: bool,
    pub props: Vec<PropSchema>,
    /// iframe `allow` attribute
    pub iframe_allow: String,
}

impl ComponentDefinition {
    pub fn from_config(config: &CheckoutConfig) -> Self {
        Self {
            tag: config.tag.clone(),
            base_url: config.base_url.clone(),
            dimensions: config.dimensions(),
            auto_resize: false,
            props: checkout_prop_schema(),
            iframe_allow: config.iframe_allow(),
        }
    }

    /// Frame URL for an instance's props
    pub fn url_for(&self, token: &str, base_url: Option<&str>) -> String {
        crate::config::checkout_url(base_url.unwrap_or(&self.base_url), token)
    }
}

/// One mounted remote frame
#[async_trait(?Send)]
pub trait MountedFrame {
    type Element;

    /// Render as an iframe into `slot`; resolves once the remote page is interactive
    async fn render(&self, slot: &Self::Element) -> Result<()>;

    /// Push new prop values to the mounted page
    fn update_props(&self, update: PropUpdate) -> Result<()>;

    /// Tear the frame down
    async fn close(&self) -> Result<()>;
}

/// The external mounting library
pub trait ComponentLibrary: 'static {
    type Element;
    type Frame: MountedFrame<Element = Self::Element> + 'static;

    /// Register the component type
    fn register(&self, definition: &ComponentDefinition) -> Result<()>;

    /// Create a live instance of the registered component
    fn instantiate(&self, props: PropBag) -> Result<Self::Frame>;
}

/// Owns the library and registers the component type at most once
pub struct FrameAdapter<L: ComponentLibrary> {
    library: L,
    registered: OnceCell<ComponentDefinition>,
}

impl<L: ComponentLibrary> FrameAdapter<L> {
    pub fn new(library: L) -> Self {
        Self {
            library,
            registered: OnceCell::new(),
        }
    }

    pub const fn library(&self) -> &L {
        &self.library
    }

    /// The definition that won registration, if any
    pub fn registration(&self) -> Option<&ComponentDefinition> {
        self.registered.get()
    }

    /// Reject a definition that differs from the one already registered.
    ///
    /// The mounting library keeps one definition per page, so a second
    /// controller with another origin or size would otherwise render with
    /// the first one's settings.
    pub fn check_compatible(&self, definition: &ComponentDefinition) -> Result<()> {
        match self.registered.get() {
            Some(registered) if registered != definition => {
                tracing::error!(
                    tag = %definition.tag,
                    registered_base_url = %registered.base_url,
                    base_url = %definition.base_url,
                    "Conflicting checkout component definition"
                );
                Err(CheckoutError::Config(format!(
                    "component `{}` is already registered with a different configuration",
                    registered.tag
                )))
            }
            _ => Ok(()),
        }
    }

    /// Register on first call; later calls with the same definition are
    /// no-ops. A failed attempt is not remembered, so the next call retries.
    pub fn ensure_registered(&self, definition: &ComponentDefinition) -> Result<()> {
        self.registered.get_or_try_init(|| {
            self.library.register(definition)?;
            tracing::info!(tag = %definition.tag, "Registered checkout component");
            Ok::<_, CheckoutError>(definition.clone())
        })?;
        self.check_compatible(definition)
    }

    /// Register lazily, then instantiate
    pub fn instantiate(&self, definition: &ComponentDefinition, props: PropBag) -> Result<L::Frame> {
        self.ensure_registered(definition)?;
        self.library.instantiate(props)
    }
}
