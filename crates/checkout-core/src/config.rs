//! Checkout Configuration
//!
//! Every field has a production default, so an empty JSON object (or no
//! config at all) yields a working widget.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};
use crate::host::Size;

/// Production checkout origin
pub const BASE_URL: &str = "https://checkout.paynow.gg";

/// Fixed intrinsic frame width in CSS pixels
pub const DEFAULT_WIDTH: u32 = 900;

/// Fixed intrinsic frame height in CSS pixels
pub const DEFAULT_HEIGHT: u32 = 650;

/// Tag the component is registered under
pub const COMPONENT_TAG: &str = "paynow-gg-checkout";

/// Interval between external window checks
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Build the checkout page URL for a token
pub fn checkout_url(base_url: &str, token: &str) -> String {
    format!("{base_url}/?t={token}")
}

/// Widget configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutConfig {
    /// Checkout origin used when `open` gets no base URL
    pub base_url: String,

    /// Frame width; also the redirect threshold
    pub width: u32,

    /// Frame height
    pub height: u32,

    /// Component tag
    pub tag: String,

    /// External window poll interval
    pub poll_interval_ms: u64,

    /// Give up on a frame that has not rendered after this long
    pub render_timeout_ms: Option<u64>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            tag: COMPONENT_TAG.into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            render_timeout_ms: None,
        }
    }
}

impl CheckoutConfig {
    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CheckoutError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the widget cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(CheckoutError::Config("baseUrl must not be empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(CheckoutError::Config(format!(
                "frame size must be non-zero (got {}x{})",
                self.width, self.height
            )));
        }
        if self.tag.trim().is_empty() {
            return Err(CheckoutError::Config("tag must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(CheckoutError::Config("pollIntervalMs must be positive".into()));
        }
        if self.render_timeout_ms == Some(0) {
            return Err(CheckoutError::Config("renderTimeoutMs must be positive".into()));
        }
        Ok(())
    }

    /// Fixed frame size
    pub fn dimensions(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn render_timeout(&self) -> Option<Duration> {
        self.render_timeout_ms.map(Duration::from_millis)
    }

    /// `allow` attribute for the iframe; payment is granted to the default origin only
    pub fn iframe_allow(&self) -> String {
        format!("payment {}", self.base_url)
    }

    /// Resolve the checkout URL, falling back to the configured origin
    pub fn url_for(&self, token: &str, base_url: Option<&str>) -> String {
        checkout_url(base_url.unwrap_or(&self.base_url), token)
    }
}
