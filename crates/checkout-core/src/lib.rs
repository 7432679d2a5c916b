//! # checkout-core
//!
//! Session controller for the embeddable PayNow checkout.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Checkout                             │
//! │  ┌─────────────┐  ┌──────────────┐  ┌─────────────────────┐  │
//! │  │  Presenter  │  │ FrameAdapter │  │    EventEmitter     │  │
//! │  │ (Surface)   │──│ (zoid-like   │──│ ready / completed / │  │
//! │  │             │  │  library)    │  │ failed / closed     │  │
//! │  └─────────────┘  └──────────────┘  └─────────────────────┘  │
//! │                          Host                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Narrow viewports are redirected to the hosted checkout page. Wider ones
//! get the page in an iframe, inside a full-screen modal or an overlay on a
//! caller-supplied element. The `Host`, `Surface` and `ComponentLibrary`
//! traits keep the controller free of DOM types; `checkout-web` provides
//! the browser implementations.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_core::{Checkout, CheckoutConfig, EventKind, FrameAdapter, OpenOptions};
//!
//! let checkout = Checkout::new(host, Rc::new(FrameAdapter::new(library)), CheckoutConfig::default())?;
//!
//! checkout.on(EventKind::Completed, |event| tracing::info!(?event, "paid"));
//! checkout.open(OpenOptions::new(token))?;
//! ```

pub mod checkout;
pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod host;
pub mod presenter;
pub mod props;
pub mod session;

#[cfg(test)]
mod testing;

pub use checkout::{Checkout, OpenOptions, OpenOutcome};
pub use config::{checkout_url, CheckoutConfig};
pub use error::{CheckoutError, Result};
pub use event::{CheckoutEvent, EventEmitter, EventKind, ListenerId};
pub use frame::{ComponentDefinition, ComponentLibrary, FrameAdapter, MountedFrame};
pub use host::{ExternalWindow, Host, LocalTask, Size};
pub use presenter::{DismissTriggers, Presenter, PresenterKind, PresenterState, Surface};
pub use props::{Completion, FrameCallbacks, PropBag, PropKind, PropSchema, PropUpdate};
pub use session::{SessionId, SessionInfo, SessionState};
