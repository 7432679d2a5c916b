//! In-memory host, surface and mounting library for tests.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CheckoutError, Result};
use crate::frame::{ComponentDefinition, ComponentLibrary, MountedFrame};
use crate::host::{ExternalWindow, Host, LocalTask, Size};
use crate::presenter::{DismissTriggers, PresenterKind, Surface};
use crate::props::{FrameCallbacks, PropBag, PropUpdate};

pub fn noop_callbacks() -> FrameCallbacks {
    FrameCallbacks::new(|| {}, |_| {}, |_| {})
}

type Listener = Rc<dyn Fn()>;

#[derive(Default)]
struct DocumentState {
    styles: HashSet<String>,
    style_inserts: usize,
    scroll_locked: bool,
    escape: Option<Listener>,
    backdrop_click: Option<Listener>,
    frames_waited: usize,
    layers: usize,
    surfaces_created: usize,
    stall_transitions: bool,
    transition_listeners: usize,
    log: Vec<String>,
}

/// Shared page state: global styles, body scroll, document listeners and an
/// ordered log of everything that happened.
#[derive(Clone, Default)]
pub struct FakeDocument(Rc<RefCell<DocumentState>>);

impl FakeDocument {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().log.push(entry.into());
    }

    pub fn log(&self) -> Vec<String> {
        self.0.borrow().log.clone()
    }

    pub fn has_style(&self, id: &str) -> bool {
        self.0.borrow().styles.contains(id)
    }

    pub fn style_inserts(&self) -> usize {
        self.0.borrow().style_inserts
    }

    pub fn scroll_locked(&self) -> bool {
        self.0.borrow().scroll_locked
    }

    pub fn escape_listening(&self) -> bool {
        self.0.borrow().escape.is_some()
    }

    pub fn frames_waited(&self) -> usize {
        self.0.borrow().frames_waited
    }

    /// Modal layers currently attached to the body
    pub fn mounted_layers(&self) -> usize {
        self.0.borrow().layers
    }

    pub fn surfaces_created(&self) -> usize {
        self.0.borrow().surfaces_created
    }

    /// Fade transitions started from now on never report completion
    pub fn stall_transitions(&self) {
        self.0.borrow_mut().stall_transitions = true;
    }

    /// `transitionend` listeners still attached
    pub fn transition_listeners(&self) -> usize {
        self.0.borrow().transition_listeners
    }

    pub fn press_escape(&self) {
        let listener = self.0.borrow().escape.clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    pub fn click_backdrop(&self) {
        let listener = self.0.borrow().backdrop_click.clone();
        if let Some(listener) = listener {
            listener();
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FakeElement {
    pub name: String,
    pub size: Size,
}

impl FakeElement {
    pub fn new(name: &str, size: Size) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Counts as an attached `transitionend` listener until dropped
struct TransitionListener {
    doc: FakeDocument,
}

impl TransitionListener {
    fn attach(doc: &FakeDocument) -> Self {
        doc.0.borrow_mut().transition_listeners += 1;
        Self { doc: doc.clone() }
    }
}

impl Drop for TransitionListener {
    fn drop(&mut self) {
        self.doc.0.borrow_mut().transition_listeners -= 1;
    }
}

/// Visual state of one surface
#[derive(Clone, Debug)]
pub struct SurfaceState {
    pub backdrop_visible: bool,
    pub spinner_visible: bool,
    pub content_visible: bool,
    pub transitions_awaited: usize,
    pub torn_down: bool,
    pub teardowns: usize,
}

pub struct FakeSurface {
    kind: PresenterKind,
    doc: FakeDocument,
    state: Rc<RefCell<SurfaceState>>,
    slot: FakeElement,
}

impl FakeSurface {
    pub fn new(kind: PresenterKind, doc: FakeDocument) -> Self {
        {
            let mut page = doc.0.borrow_mut();
            page.surfaces_created += 1;
            if kind == PresenterKind::Modal {
                page.layers += 1;
            }
        }

        Self {
            kind,
            doc,
            state: Rc::new(RefCell::new(SurfaceState {
                backdrop_visible: false,
                spinner_visible: true,
                content_visible: false,
                transitions_awaited: 0,
                torn_down: false,
                teardowns: 0,
            })),
            slot: FakeElement::new("content", Size::new(0.0, 0.0)),
        }
    }

    pub fn snapshot(&self) -> SurfaceState {
        self.state.borrow().clone()
    }

    fn toggle(&self, name: &str, visible: bool) {
        self.doc
            .record(format!("{name}:{}", if visible { "on" } else { "off" }));
    }
}

#[async_trait(?Send)]
impl Surface for FakeSurface {
    type Element = FakeElement;

    fn content_slot(&self) -> FakeElement {
        self.slot.clone()
    }

    fn has_style(&self, id: &str) -> bool {
        self.doc.has_style(id)
    }

    fn insert_style(&self, id: &str, _css: &str) {
        let mut page = self.doc.0.borrow_mut();
        page.styles.insert(id.to_string());
        page.style_inserts += 1;
    }

    async fn next_frame(&self) {
        self.doc.0.borrow_mut().frames_waited += 1;
        tokio::task::yield_now().await;
    }

    async fn transition_end(&self) {
        let _listener = TransitionListener::attach(&self.doc);
        let stalled = self.doc.0.borrow().stall_transitions;
        if stalled {
            futures::future::pending::<()>().await;
        }
        tokio::task::yield_now().await;
        self.state.borrow_mut().transitions_awaited += 1;
    }

    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn set_backdrop_visible(&self, visible: bool) {
        self.state.borrow_mut().backdrop_visible = visible;
        self.toggle("backdrop", visible);
    }

    fn set_spinner_visible(&self, visible: bool) {
        self.state.borrow_mut().spinner_visible = visible;
        self.toggle("spinner", visible);
    }

    fn set_content_visible(&self, visible: bool) {
        self.state.borrow_mut().content_visible = visible;
        self.toggle("content", visible);
    }

    fn set_scroll_locked(&self, locked: bool) {
        self.doc.0.borrow_mut().scroll_locked = locked;
    }

    fn listen_dismiss(&self, triggers: DismissTriggers, on_dismiss: Rc<dyn Fn()>) {
        let mut page = self.doc.0.borrow_mut();
        if triggers.escape_key {
            page.escape = Some(Rc::clone(&on_dismiss));
        }
        if triggers.backdrop_click {
            page.backdrop_click = Some(on_dismiss);
        }
    }

    fn unlisten_dismiss(&self) {
        let mut page = self.doc.0.borrow_mut();
        page.escape = None;
        page.backdrop_click = None;
    }

    fn teardown(&self) {
        let mut state = self.state.borrow_mut();
        state.teardowns += 1;
        if !state.torn_down && self.kind == PresenterKind::Modal {
            self.doc.0.borrow_mut().layers -= 1;
        }
        state.torn_down = true;
        drop(state);
        self.doc.record("surface:teardown");
    }
}

pub struct FakeWindow {
    closed: Rc<Cell<bool>>,
}

impl ExternalWindow for FakeWindow {
    fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

#[derive(Default)]
struct HostState {
    viewport_width: Cell<f64>,
    navigations: RefCell<Vec<String>>,
    windows: RefCell<Vec<(String, Rc<Cell<bool>>)>>,
    block_popups: Cell<bool>,
    surfaces: RefCell<Vec<(PresenterKind, Rc<RefCell<SurfaceState>>)>>,
}

#[derive(Clone)]
pub struct FakeHost {
    doc: FakeDocument,
    state: Rc<HostState>,
}

impl FakeHost {
    pub fn new(doc: FakeDocument) -> Self {
        Self {
            doc,
            state: Rc::default(),
        }
    }

    pub fn set_viewport_width(&self, width: f64) {
        self.state.viewport_width.set(width);
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.navigations.borrow().clone()
    }

    pub fn opened_windows(&self) -> Vec<String> {
        self.state
            .windows
            .borrow()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Simulate the user closing the `index`-th opened window
    pub fn close_window(&self, index: usize) {
        self.state.windows.borrow()[index].1.set(true);
    }

    pub fn block_popups(&self) {
        self.state.block_popups.set(true);
    }

    pub fn last_surface_kind(&self) -> Option<PresenterKind> {
        self.state.surfaces.borrow().last().map(|(kind, _)| *kind)
    }

    pub fn last_surface(&self) -> Option<SurfaceState> {
        self.state
            .surfaces
            .borrow()
            .last()
            .map(|(_, state)| state.borrow().clone())
    }
}

impl Host for FakeHost {
    type Element = FakeElement;
    type Window = FakeWindow;
    type Surface = FakeSurface;

    fn viewport_width(&self) -> f64 {
        self.state.viewport_width.get()
    }

    fn navigate(&self, url: &str) -> Result<()> {
        self.state.navigations.borrow_mut().push(url.to_string());
        Ok(())
    }

    fn open_window(&self, url: &str) -> Option<FakeWindow> {
        if self.state.block_popups.get() {
            return None;
        }

        let closed = Rc::new(Cell::new(false));
        self.state
            .windows
            .borrow_mut()
            .push((url.to_string(), Rc::clone(&closed)));
        Some(FakeWindow { closed })
    }

    fn measure(&self, element: &FakeElement) -> Size {
        element.size
    }

    fn create_surface(
        &self,
        kind: PresenterKind,
        _target: Option<&FakeElement>,
    ) -> Result<FakeSurface> {
        let surface = FakeSurface::new(kind, self.doc.clone());
        self.state
            .surfaces
            .borrow_mut()
            .push((kind, Rc::clone(&surface.state)));
        Ok(surface)
    }

    fn spawn_local(&self, task: LocalTask) {
        tokio::task::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalTask {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// How fake frames behave when rendered
#[derive(Clone, Copy, Debug, Default)]
pub enum RenderMode {
    #[default]
    Immediate,
    Fail(&'static str),
    Pending,
}

/// Everything a fake frame saw
pub struct FrameRecord {
    pub props: PropBag,
    updates: RefCell<Vec<PropUpdate>>,
    closes: Cell<usize>,
}

impl FrameRecord {
    pub fn updates(&self) -> Vec<PropUpdate> {
        self.updates.borrow().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.get()
    }
}

#[derive(Default)]
struct LibraryState {
    registrations: Cell<usize>,
    fail_register: RefCell<Option<String>>,
    fail_instantiate: RefCell<Option<String>>,
    fail_close: RefCell<Option<String>>,
    render_mode: Cell<RenderMode>,
    frames: RefCell<Vec<Rc<FrameRecord>>>,
}

#[derive(Clone, Default)]
pub struct FakeLibrary {
    doc: FakeDocument,
    state: Rc<LibraryState>,
}

impl FakeLibrary {
    pub fn new(doc: FakeDocument) -> Self {
        Self {
            doc,
            state: Rc::default(),
        }
    }

    pub fn registrations(&self) -> usize {
        self.state.registrations.get()
    }

    pub fn instances(&self) -> usize {
        self.state.frames.borrow().len()
    }

    pub fn last_frame(&self) -> Option<Rc<FrameRecord>> {
        self.state.frames.borrow().last().cloned()
    }

    pub fn set_render_mode(&self, mode: RenderMode) {
        self.state.render_mode.set(mode);
    }

    pub fn fail_next_register(&self, message: &str) {
        *self.state.fail_register.borrow_mut() = Some(message.into());
    }

    pub fn fail_next_instantiate(&self, message: &str) {
        *self.state.fail_instantiate.borrow_mut() = Some(message.into());
    }

    pub fn fail_close(&self, message: &str) {
        *self.state.fail_close.borrow_mut() = Some(message.into());
    }
}

impl ComponentLibrary for FakeLibrary {
    type Element = FakeElement;
    type Frame = FakeFrame;

    fn register(&self, _definition: &ComponentDefinition) -> Result<()> {
        if let Some(message) = self.state.fail_register.borrow_mut().take() {
            return Err(CheckoutError::Mount(message));
        }
        self.state.registrations.set(self.state.registrations.get() + 1);
        Ok(())
    }

    fn instantiate(&self, props: PropBag) -> Result<FakeFrame> {
        if let Some(message) = self.state.fail_instantiate.borrow_mut().take() {
            return Err(CheckoutError::Mount(message));
        }

        let record = Rc::new(FrameRecord {
            props,
            updates: RefCell::new(Vec::new()),
            closes: Cell::new(0),
        });
        self.state.frames.borrow_mut().push(Rc::clone(&record));

        Ok(FakeFrame {
            doc: self.doc.clone(),
            library: Rc::clone(&self.state),
            record,
        })
    }
}

pub struct FakeFrame {
    doc: FakeDocument,
    library: Rc<LibraryState>,
    record: Rc<FrameRecord>,
}

impl std::fmt::Debug for FakeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeFrame")
            .field("closes", &self.record.closes())
            .finish_non_exhaustive()
    }
}

#[async_trait(?Send)]
impl MountedFrame for FakeFrame {
    type Element = FakeElement;

    async fn render(&self, _slot: &FakeElement) -> Result<()> {
        match self.library.render_mode.get() {
            RenderMode::Immediate => {
                tokio::task::yield_now().await;
                self.doc.record("frame:rendered");
                Ok(())
            }
            RenderMode::Fail(message) => Err(CheckoutError::Render(message.into())),
            RenderMode::Pending => futures::future::pending().await,
        }
    }

    fn update_props(&self, update: PropUpdate) -> Result<()> {
        self.record.updates.borrow_mut().push(update);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record.closes.set(self.record.closes.get() + 1);
        self.doc.record("frame:closed");
        match self.library.fail_close.borrow().clone() {
            Some(message) => Err(CheckoutError::Frame(message)),
            None => Ok(()),
        }
    }
}
