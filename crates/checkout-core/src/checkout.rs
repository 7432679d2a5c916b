//! Checkout Session Controller
//!
//! Single entry and exit point for the widget. Picks redirect vs. embedded,
//! owns the one live session, wires the presenter to the frame, bridges
//! external windows back into the frame props, and emits lifecycle events.
//!
//! ```text
//!  open ─▶ Opening ─(backdrop + render)─▶ Open ─┐
//!             │                                 │  close / Escape /
//!             └──────────────┬──────────────────┘  closeGracefully / render failure
//!                            ▼
//!                         Closing ─(hide, close frame, destroy)─▶ Closed ─▶ `closed`
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::{self, AbortHandle, Abortable, Either};
use futures::FutureExt;

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::event::{CheckoutEvent, EventEmitter, EventKind, ListenerId};
use crate::frame::{ComponentDefinition, ComponentLibrary, FrameAdapter, MountedFrame};
use crate::host::{ExternalWindow, Host, LocalTask};
use crate::presenter::{Presenter, PresenterKind};
use crate::props::{Completion, FrameCallbacks, PropBag, PropUpdate};
use crate::session::{Session, SessionId, SessionInfo, SessionState};

/// Arguments to [`Checkout::open`]
#[derive(Clone, Debug)]
pub struct OpenOptions<E> {
    /// Short-lived checkout token
    pub token: String,

    /// Checkout origin override
    pub base_url: Option<String>,

    /// Render in place into this element instead of a modal
    pub render_to: Option<E>,
}

impl<E> OpenOptions<E> {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: None,
            render_to: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_render_to(mut self, element: E) -> Self {
        self.render_to = Some(element);
        self
    }
}

/// What `open` did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Narrow viewport: the page is navigating to the hosted checkout
    Redirected { url: String },
    /// A session was started; `ready` follows once the frame renders
    Embedded { session_id: SessionId },
}

/// Handle to a checkout controller. Clones share the same session.
pub struct Checkout<H, L>
where
    H: Host,
    L: ComponentLibrary<Element = H::Element>,
{
    inner: Rc<Inner<H, L>>,
}

struct Inner<H, L>
where
    H: Host,
    L: ComponentLibrary<Element = H::Element>,
{
    host: H,
    adapter: Rc<FrameAdapter<L>>,
    definition: ComponentDefinition,
    config: CheckoutConfig,
    events: EventEmitter,
    state: Cell<SessionState>,
    session: RefCell<Option<Session<L::Frame, H::Surface>>>,
}

impl<H, L> Clone for Checkout<H, L>
where
    H: Host,
    L: ComponentLibrary<Element = H::Element>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H, L> Checkout<H, L>
where
    H: Host,
    L: ComponentLibrary<Element = H::Element>,
{
    /// Create a controller. The adapter may be shared between controllers so
    /// the component type is registered once per page; every controller on
    /// one adapter must then use the same frame origin, size and tag.
    pub fn new(host: H, adapter: Rc<FrameAdapter<L>>, config: CheckoutConfig) -> Result<Self> {
        config.validate()?;
        let definition = ComponentDefinition::from_config(&config);
        adapter.check_compatible(&definition)?;

        Ok(Self {
            inner: Rc::new(Inner {
                host,
                adapter,
                definition,
                config,
                events: EventEmitter::new(),
                state: Cell::new(SessionState::Closed),
                session: RefCell::new(None),
            }),
        })
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    /// Whether a session exists (including while it opens or closes)
    pub fn is_open(&self) -> bool {
        self.inner.state.get() != SessionState::Closed
    }

    /// Snapshot of the live session
    pub fn session(&self) -> Option<SessionInfo> {
        let state = self.inner.state.get();
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(|session| session.info(state))
    }

    /// Subscribe to a lifecycle event
    pub fn on(&self, kind: EventKind, handler: impl Fn(&CheckoutEvent) + 'static) -> ListenerId {
        self.inner.events.on(kind, handler)
    }

    /// Unsubscribe; returns whether the handler was registered
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.events.off(kind, id)
    }

    /// Open a checkout.
    ///
    /// Precondition failures are returned before anything is created.
    /// Rendering continues in the background; `ready` (or `failed`) reports
    /// the result.
    pub fn open(&self, options: OpenOptions<H::Element>) -> Result<OpenOutcome> {
        let inner = &self.inner;

        let state = inner.state.get();
        if state != SessionState::Closed {
            tracing::warn!(state = state.as_str(), "Rejected open while a checkout is active");
            return Err(CheckoutError::AlreadyOpen);
        }

        if options.token.is_empty() {
            return Err(CheckoutError::MissingToken);
        }

        let url = inner.config.url_for(&options.token, options.base_url.as_deref());

        let viewport = inner.host.viewport_width();
        if viewport <= f64::from(inner.config.width) {
            tracing::info!(url = %url, viewport, "Viewport too narrow, redirecting to hosted checkout");
            inner.host.navigate(&url)?;
            return Ok(OpenOutcome::Redirected { url });
        }

        if let Some(target) = &options.render_to {
            let expected = inner.config.dimensions();
            let actual = inner.host.measure(target);
            if !actual.matches(&expected) {
                return Err(CheckoutError::InvalidTargetSize { expected, actual });
            }
        }

        inner.state.set(SessionState::Opening);

        match Inner::start_session(inner, options) {
            Ok(session_id) => {
                tracing::info!(session_id = %session_id, url = %url, "Opening embedded checkout");
                Ok(OpenOutcome::Embedded { session_id })
            }
            Err(err) => {
                inner.state.set(SessionState::Closed);
                tracing::error!(error = %err, "Failed to start checkout session");
                Err(err)
            }
        }
    }

    /// Gracefully close the live session.
    ///
    /// Returns `false` if there was nothing to close or another close is
    /// already in progress.
    pub async fn close(&self) -> bool {
        self.inner.close_gracefully().await
    }

    /// Start a graceful close without waiting for it
    pub fn request_close(&self) {
        Inner::spawn_close(&self.inner, "host");
    }
}

impl<H, L> Inner<H, L>
where
    H: Host,
    L: ComponentLibrary<Element = H::Element>,
{
    fn start_session(this: &Rc<Self>, options: OpenOptions<H::Element>) -> Result<SessionId> {
        let kind = if options.render_to.is_some() {
            PresenterKind::Overlay
        } else {
            PresenterKind::Modal
        };

        let surface = this.host.create_surface(kind, options.render_to.as_ref())?;
        let presenter = Presenter::new(kind, surface);

        // Callbacks are bound before instantiation, so the remote page can
        // never observe a prop bag without them.
        let props = PropBag {
            token: options.token.clone(),
            base_url: options.base_url.clone(),
            external_page_open: false,
            callbacks: Self::frame_callbacks(this),
        };

        let frame = match this.adapter.instantiate(&this.definition, props) {
            Ok(frame) => frame,
            Err(err) => {
                presenter.destroy();
                return Err(err);
            }
        };

        let weak = Rc::downgrade(this);
        presenter.on_close(move || {
            if let Some(inner) = weak.upgrade() {
                Self::spawn_close(&inner, "presenter");
            }
        });

        let mut session = Session::new(options.token, options.base_url, frame, presenter);
        let session_id = session.id.clone();

        let (handle, registration) = AbortHandle::new_pair();
        session.opening = Some(handle);

        let task = Self::run_opening(
            Rc::downgrade(this),
            session_id.clone(),
            session.presenter.clone(),
            session.frame.clone(),
        );

        *this.session.borrow_mut() = Some(session);
        this.host
            .spawn_local(Abortable::new(task, registration).map(|_| ()).boxed_local());

        Ok(session_id)
    }

    fn frame_callbacks(this: &Rc<Self>) -> FrameCallbacks {
        let (close, external, completed) = (
            Rc::downgrade(this),
            Rc::downgrade(this),
            Rc::downgrade(this),
        );

        FrameCallbacks::new(
            move || {
                if let Some(inner) = close.upgrade() {
                    Self::spawn_close(&inner, "frame");
                }
            },
            move |url| {
                if let Some(inner) = external.upgrade() {
                    Self::open_external_page(&inner, url);
                }
            },
            move |completion: Completion| {
                if let Some(inner) = completed.upgrade() {
                    tracing::info!(order_id = %completion.order_id, "Checkout completed");
                    inner.events.emit(&CheckoutEvent::Completed(completion));
                }
            },
        )
    }

    /// Backdrop and render run concurrently; content is revealed and `ready`
    /// emitted only once both are done.
    async fn run_opening(
        this: Weak<Self>,
        session_id: SessionId,
        presenter: Option<Rc<Presenter<H::Surface>>>,
        frame: Option<Rc<L::Frame>>,
    ) {
        let (Some(presenter), Some(frame)) = (presenter, frame) else {
            return;
        };

        let timeout = match this.upgrade() {
            Some(inner) => inner
                .config
                .render_timeout()
                .map(|limit| (limit, inner.host.sleep(limit))),
            None => return,
        };

        let slot = presenter.content_slot();
        let render = async {
            match timeout {
                None => frame.render(&slot).await,
                Some((limit, sleep)) => match future::select(frame.render(&slot), sleep).await {
                    Either::Left((rendered, _)) => rendered,
                    Either::Right(((), _)) => Err(CheckoutError::RenderTimeout(limit)),
                },
            }
        };

        let (_, rendered) = future::join(presenter.show_backdrop(), render).await;

        let Some(inner) = this.upgrade() else {
            return;
        };
        if !inner.is_current(&session_id, SessionState::Opening) {
            tracing::debug!(session_id = %session_id, "Session changed while rendering");
            return;
        }

        match rendered {
            Ok(()) => {
                presenter.show_content();
                inner.state.set(SessionState::Open);
                if let Some(session) = inner.session.borrow_mut().as_mut() {
                    session.opening = None;
                }
                tracing::info!(session_id = %session_id, "Checkout ready");
                inner.events.emit(&CheckoutEvent::Ready);
            }
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "Checkout frame failed to render");
                inner.events.emit(&CheckoutEvent::Failed {
                    reason: err.to_string(),
                });
                // Closing from here would abort this very task mid-teardown
                Self::spawn_close(&inner, "render failure");
            }
        }
    }

    fn is_current(&self, session_id: &SessionId, state: SessionState) -> bool {
        self.state.get() == state
            && self
                .session
                .borrow()
                .as_ref()
                .is_some_and(|session| &session.id == session_id)
    }

    fn spawn_close(this: &Rc<Self>, trigger: &'static str) {
        if !this.state.get().is_live() {
            return;
        }

        tracing::debug!(trigger, "Close requested");
        let inner = Rc::clone(this);
        this.host.spawn_local(
            async move {
                inner.close_gracefully().await;
            }
            .boxed_local(),
        );
    }

    /// Hide, close the frame, destroy the presenter, reset, emit `closed`.
    async fn close_gracefully(&self) -> bool {
        let state = self.state.get();
        if !state.is_live() {
            return false;
        }
        self.state.set(SessionState::Closing);

        let (session_id, presenter, frame) = {
            let mut session = self.session.borrow_mut();
            match session.as_mut() {
                Some(session) => {
                    session.cancel_opening();
                    if session.cancel_poll() {
                        tracing::debug!(session_id = %session.id, "Cancelled external page poll");
                    }
                    (
                        Some(session.id.clone()),
                        session.presenter.clone(),
                        session.frame.clone(),
                    )
                }
                None => (None, None, None),
            }
        };

        if let Some(presenter) = &presenter {
            presenter.hide_all().await;
        }

        if let Some(frame) = &frame {
            if let Err(err) = frame.close().await {
                tracing::warn!(error = %err, "Checkout frame did not close cleanly");
            }
        }

        if let Some(presenter) = &presenter {
            presenter.destroy();
        }

        self.session.borrow_mut().take();
        self.state.set(SessionState::Closed);

        tracing::info!(session_id = ?session_id.as_ref().map(SessionId::as_str), "Checkout closed");
        self.events.emit(&CheckoutEvent::Closed);
        true
    }

    fn open_external_page(this: &Rc<Self>, url: String) {
        if !this.state.get().is_live() {
            tracing::warn!(url = %url, "Ignoring external page request without a live session");
            return;
        }

        let window = this.host.open_window(&url);
        if window.is_none() {
            tracing::warn!(url = %url, "Browser refused to open the external page");
        }

        let (handle, registration) = AbortHandle::new_pair();
        let (session_id, frame) = {
            let mut guard = this.session.borrow_mut();
            let Some(session) = guard.as_mut() else {
                return;
            };
            session.cancel_poll();
            session.external_page_open = true;
            session.poll = Some(handle);
            (session.id.clone(), session.frame.clone())
        };

        tracing::info!(session_id = %session_id, url = %url, "Opened external page");
        if let Some(frame) = frame {
            if let Err(err) = frame.update_props(PropUpdate::external_page_open(true)) {
                tracing::warn!(error = %err, "Failed to flag external page as open");
            }
        }

        let poll = Self::poll_external_window(Rc::downgrade(this), session_id, window);
        this.host
            .spawn_local(Abortable::new(poll, registration).map(|_| ()).boxed_local());
    }

    /// Runs until the window reports closed. Cancelled by teardown or by a
    /// newer external page.
    async fn poll_external_window(this: Weak<Self>, session_id: SessionId, window: Option<H::Window>) {
        loop {
            let tick: LocalTask = match this.upgrade() {
                Some(inner) => inner.host.sleep(inner.config.poll_interval()),
                None => return,
            };
            tick.await;

            if window.as_ref().is_some_and(|window| !window.is_closed()) {
                continue;
            }

            if let Some(inner) = this.upgrade() {
                inner.finish_external_page(&session_id);
            }
            return;
        }
    }

    fn finish_external_page(&self, session_id: &SessionId) {
        let frame = {
            let mut guard = self.session.borrow_mut();
            match guard.as_mut() {
                Some(session) if &session.id == session_id => {
                    session.poll = None;
                    session.external_page_open = false;
                    session.frame.clone()
                }
                _ => return,
            }
        };

        tracing::info!(session_id = %session_id, "External page closed");
        if let Some(frame) = frame {
            if let Err(err) = frame.update_props(PropUpdate::external_page_open(false)) {
                tracing::warn!(error = %err, "Failed to flag external page as closed");
            }
        }
    }
}

impl<H, L> Drop for Inner<H, L>
where
    H: Host,
    L: ComponentLibrary<Element = H::Element>,
{
    fn drop(&mut self) {
        let Some(mut session) = self.session.get_mut().take() else {
            return;
        };

        tracing::debug!(session_id = %session.id, "Controller dropped with a live session");
        session.cancel_opening();
        session.cancel_poll();
        if let Some(presenter) = session.presenter.take() {
            presenter.destroy();
        }
        if let Some(frame) = session.frame.take() {
            self.host.spawn_local(
                async move {
                    if let Err(err) = frame.close().await {
                        tracing::warn!(error = %err, "Checkout frame did not close cleanly on drop");
                    }
                }
                .boxed_local(),
            );
        }
    }
}

impl<H, L> fmt::Debug for Checkout<H, L>
where
    H: Host,
    L: ComponentLibrary<Element = H::Element>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkout")
            .field("state", &self.inner.state.get())
            .field("config", &self.inner.config)
            .field("events", &self.inner.events)
            .finish_non_exhaustive()
    }
}
