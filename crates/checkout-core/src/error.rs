//! Error Types

use std::time::Duration;

use thiserror::Error;

use crate::host::Size;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckoutError {
    /// `open` called while a session is live
    #[error("A checkout is already open")]
    AlreadyOpen,

    /// Caller-supplied render target does not match the fixed frame size
    #[error("Element must be {}x{}px (got {}x{}px)", expected.width, expected.height, actual.width, actual.height)]
    InvalidTargetSize { expected: Size, actual: Size },

    /// Empty checkout token
    #[error("A checkout token is required")]
    MissingToken,

    /// Mounting library failed to register or instantiate the component
    #[error("Mount failed: {0}")]
    Mount(String),

    /// Remote frame failed to render
    #[error("Render failed: {0}")]
    Render(String),

    /// Remote frame did not render in time
    #[error("Render timed out after {0:?}")]
    RenderTimeout(Duration),

    /// Full-page redirect could not be started
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Presenter surface could not be built
    #[error("Surface error: {0}")]
    Surface(String),

    /// A mounted frame rejected a prop update or close
    #[error("Frame error: {0}")]
    Frame(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
