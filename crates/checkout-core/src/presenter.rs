//! Overlay/Modal Presenter
//!
//! The visual chrome around the frame: a backdrop, a spinner and a content
//! slot. The presenter owns the state machine and the transition ordering;
//! a [`Surface`] does the actual style work.
//!
//! ```text
//!   Hidden ──show_backdrop──▶ BackdropVisible ──show_content──▶ ContentVisible
//!     │                            │                                │
//!     └────────────hide_all────────┴────────────────────────────────┘
//!                                  ▼
//!                               Hiding ──destroy──▶ Destroyed
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future;

/// Id of the injected spinner keyframes style element
pub const SPIN_ANIMATION_STYLE_ID: &str = "paynow-gg-spin-animation";

/// Spinner keyframes, injected once per document
pub const SPIN_ANIMATION_CSS: &str = "@keyframes paynow-gg_spin { to { transform: rotate(360deg); } }";

/// Upper bound on waiting for the fade-out transition
pub const TRANSITION_FALLBACK: Duration = Duration::from_millis(400);

/// Which flavour of chrome to build
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenterKind {
    /// Fixed full-viewport layer appended to the document body
    Modal,
    /// Tint over a caller-supplied element
    Overlay,
}

impl PresenterKind {
    /// Animation frames to wait before the backdrop transition starts.
    /// The overlay needs an extra one for the restyled element to lay out.
    pub const fn settle_frames(self) -> usize {
        match self {
            Self::Modal => 1,
            Self::Overlay => 2,
        }
    }

    pub const fn locks_scroll(self) -> bool {
        matches!(self, Self::Modal)
    }

    /// Only the free-floating modal can be dismissed by the user
    pub const fn dismiss_triggers(self) -> DismissTriggers {
        match self {
            Self::Modal => DismissTriggers {
                escape_key: true,
                backdrop_click: true,
            },
            Self::Overlay => DismissTriggers {
                escape_key: false,
                backdrop_click: false,
            },
        }
    }
}

/// User interactions that count as close intent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DismissTriggers {
    pub escape_key: bool,
    pub backdrop_click: bool,
}

impl DismissTriggers {
    pub const fn any(self) -> bool {
        self.escape_key || self.backdrop_click
    }
}

/// Presenter lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenterState {
    Hidden,
    BackdropVisible,
    ContentVisible,
    Hiding,
    Destroyed,
}

impl PresenterState {
    const fn is_visible(self) -> bool {
        matches!(self, Self::BackdropVisible | Self::ContentVisible)
    }
}

/// Style-level primitives behind a presenter.
///
/// Implementations own their node tree. Every method must tolerate being
/// called after [`Surface::teardown`].
#[async_trait(?Send)]
pub trait Surface {
    /// Node the frame renders into
    type Element: Clone;

    fn content_slot(&self) -> Self::Element;

    /// Whether a global style with this id already exists in the document
    fn has_style(&self, id: &str) -> bool;

    fn insert_style(&self, id: &str, css: &str);

    /// Resolve on the next animation frame
    async fn next_frame(&self);

    /// Resolve once the root's fade transition has finished.
    ///
    /// May never resolve. The future is dropped when [`TRANSITION_FALLBACK`]
    /// elapses first, and dropping it must detach whatever it listens with.
    async fn transition_end(&self);

    async fn delay(&self, duration: Duration);

    fn set_backdrop_visible(&self, visible: bool);

    fn set_spinner_visible(&self, visible: bool);

    fn set_content_visible(&self, visible: bool);

    /// Suppress page scrolling
    fn set_scroll_locked(&self, locked: bool);

    /// Start listening for close intent
    fn listen_dismiss(&self, triggers: DismissTriggers, on_dismiss: Rc<dyn Fn()>);

    fn unlisten_dismiss(&self);

    /// Remove created nodes, or restore the borrowed element
    fn teardown(&self);
}

type CloseHandler = Rc<dyn Fn()>;

/// Drives one surface through its lifecycle
pub struct Presenter<S: Surface> {
    kind: PresenterKind,
    surface: S,
    state: Cell<PresenterState>,
    close_handler: Rc<RefCell<Option<CloseHandler>>>,
}

impl<S: Surface> Presenter<S> {
    pub fn new(kind: PresenterKind, surface: S) -> Self {
        if !surface.has_style(SPIN_ANIMATION_STYLE_ID) {
            surface.insert_style(SPIN_ANIMATION_STYLE_ID, SPIN_ANIMATION_CSS);
        }

        Self {
            kind,
            surface,
            state: Cell::new(PresenterState::Hidden),
            close_handler: Rc::new(RefCell::new(None)),
        }
    }

    pub const fn kind(&self) -> PresenterKind {
        self.kind
    }

    pub fn state(&self) -> PresenterState {
        self.state.get()
    }

    pub fn content_slot(&self) -> S::Element {
        self.surface.content_slot()
    }

    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Set the close-intent handler, replacing any previous one
    pub fn on_close(&self, handler: impl Fn() + 'static) {
        *self.close_handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Fade the backdrop in and start listening for close intent.
    ///
    /// Returns `false` when the presenter was hidden or destroyed while
    /// waiting for layout.
    pub async fn show_backdrop(&self) -> bool {
        for _ in 0..self.kind.settle_frames() {
            self.surface.next_frame().await;
        }

        if self.state.get() != PresenterState::Hidden {
            tracing::debug!(state = ?self.state.get(), "Backdrop reveal superseded");
            return false;
        }

        if self.kind.locks_scroll() {
            self.surface.set_scroll_locked(true);
        }
        self.surface.set_backdrop_visible(true);

        let triggers = self.kind.dismiss_triggers();
        if triggers.any() {
            let slot = Rc::clone(&self.close_handler);
            self.surface.listen_dismiss(
                triggers,
                Rc::new(move || {
                    let handler = slot.borrow().clone();
                    if let Some(handler) = handler {
                        handler();
                    }
                }),
            );
        }

        self.state.set(PresenterState::BackdropVisible);
        true
    }

    /// Swap the spinner for the frame. The fade itself is CSS-driven.
    pub fn show_content(&self) {
        if !self.state.get().is_visible() {
            return;
        }

        self.surface.set_spinner_visible(false);
        self.surface.set_content_visible(true);
        self.state.set(PresenterState::ContentVisible);
    }

    /// Fade everything out; resolves after the transition so the caller can
    /// destroy without cutting the animation short.
    pub async fn hide_all(&self) {
        let previous = self.state.get();
        if matches!(previous, PresenterState::Hiding | PresenterState::Destroyed) {
            return;
        }
        self.state.set(PresenterState::Hiding);

        self.surface.unlisten_dismiss();
        self.surface.set_content_visible(false);
        self.surface.set_spinner_visible(false);
        if self.kind.locks_scroll() {
            self.surface.set_scroll_locked(false);
        }
        self.surface.set_backdrop_visible(false);

        // No transition runs if the backdrop never appeared
        if previous.is_visible() {
            let ended = self.surface.transition_end();
            let fallback = self.surface.delay(TRANSITION_FALLBACK);
            if let future::Either::Right(_) = future::select(ended, fallback).await {
                tracing::debug!("Fade-out transition timed out");
            }
        }
    }

    /// Release everything the presenter touched. Safe to call more than once.
    pub fn destroy(&self) {
        if self.state.get() == PresenterState::Destroyed {
            return;
        }

        self.surface.unlisten_dismiss();
        if self.kind.locks_scroll() {
            self.surface.set_scroll_locked(false);
        }
        self.surface.teardown();
        self.close_handler.borrow_mut().take();
        self.state.set(PresenterState::Destroyed);
    }
}

impl<S: Surface> fmt::Debug for Presenter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Presenter")
            .field("kind", &self.kind)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}
