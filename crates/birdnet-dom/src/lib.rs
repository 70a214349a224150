//! # BirdNET DOM
//!
//! The slice of a browser document the PWA page helpers touch: elements
//! looked up by id, their attributes, class lists, text and tooltip, plus
//! the document's fullscreen state.
//!
//! Documents are built by parsing a page's HTML with html5ever, or
//! assembled element by element. State changes that a browser reports
//! asynchronously (`fullscreenchange`) are queued and drained by the host.

pub mod element;

pub use element::Element;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur in DOM operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Not allowed: {0}")]
    NotAllowed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Events the document queues for the host to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    /// The document entered or left fullscreen.
    FullscreenChange,
}

/// A page document.
#[derive(Debug)]
pub struct Document {
    /// Elements indexed by id attribute.
    elements_by_id: HashMap<String, Rc<Element>>,
    /// Whether fullscreen may be requested (permissions policy).
    fullscreen_enabled: Cell<bool>,
    /// Whether the document element is currently fullscreen.
    fullscreen: Cell<bool>,
    /// Events not yet dispatched.
    pending_events: RefCell<VecDeque<DocumentEvent>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self {
            elements_by_id: HashMap::new(),
            fullscreen_enabled: Cell::new(true),
            fullscreen: Cell::new(false),
            pending_events: RefCell::new(VecDeque::new()),
        }
    }

    /// Parse HTML and index every element that carries an id.
    pub fn parse_html(html: &str) -> Result<Self, DomError> {
        debug!(len = html.len(), "Parsing HTML");

        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .map_err(|e| DomError::ParseError(e.to_string()))?;

        let mut doc = Document::new();
        doc.index_rcdom(&dom.document);

        debug!(element_count = doc.elements_by_id.len(), "HTML parsed");
        Ok(doc)
    }

    fn index_rcdom(&mut self, handle: &Handle) {
        for child in handle.children.borrow().iter() {
            if let NodeData::Element { name, attrs, .. } = &child.data {
                let attrs = attrs.borrow();
                let id = attrs
                    .iter()
                    .find(|a| &*a.name.local == "id")
                    .map(|a| a.value.to_string());

                if let Some(id) = id.filter(|id| !id.is_empty()) {
                    let element = Element::new(&name.local, &id);
                    for attr in attrs.iter() {
                        element.set_attribute(&attr.name.local, &attr.value);
                    }
                    element.set_text_content(collect_text(child).trim());
                    // First element wins, as with getElementById.
                    self.elements_by_id
                        .entry(id)
                        .or_insert_with(|| Rc::new(element));
                }
            }
            self.index_rcdom(child);
        }
    }

    /// Add an element, replacing any element with the same id.
    pub fn insert_element(&mut self, element: Element) -> Rc<Element> {
        let element = Rc::new(element);
        self.elements_by_id
            .insert(element.id().to_string(), element.clone());
        element
    }

    /// Builder form of [`Document::insert_element`].
    pub fn with_element(mut self, element: Element) -> Self {
        self.insert_element(element);
        self
    }

    /// Get element by ID.
    pub fn get_element_by_id(&self, id: &str) -> Option<Rc<Element>> {
        self.elements_by_id.get(id).cloned()
    }

    /// `document.fullscreenEnabled`.
    pub fn fullscreen_enabled(&self) -> bool {
        self.fullscreen_enabled.get()
    }

    /// Allow or forbid fullscreen requests.
    pub fn set_fullscreen_enabled(&self, enabled: bool) {
        self.fullscreen_enabled.set(enabled);
    }

    /// Whether `document.fullscreenElement` is set.
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.get()
    }

    /// `document.documentElement.requestFullscreen()`.
    pub fn request_fullscreen(&self) -> Result<(), DomError> {
        if !self.fullscreen_enabled.get() {
            return Err(DomError::NotAllowed(
                "fullscreen is disabled for this document".to_string(),
            ));
        }
        if !self.fullscreen.replace(true) {
            trace!("Entered fullscreen");
            self.queue_event(DocumentEvent::FullscreenChange);
        }
        Ok(())
    }

    /// `document.exitFullscreen()`; also how browser-native exits (Escape) land.
    pub fn exit_fullscreen(&self) -> Result<(), DomError> {
        if !self.fullscreen.replace(false) {
            return Err(DomError::InvalidState(
                "document is not fullscreen".to_string(),
            ));
        }
        trace!("Exited fullscreen");
        self.queue_event(DocumentEvent::FullscreenChange);
        Ok(())
    }

    fn queue_event(&self, event: DocumentEvent) {
        self.pending_events.borrow_mut().push_back(event);
    }

    /// Take all queued events in order.
    pub fn take_events(&self) -> Vec<DocumentEvent> {
        self.pending_events.borrow_mut().drain(..).collect()
    }
}

fn collect_text(handle: &Handle) -> String {
    let mut text = String::new();
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => text.push_str(&contents.borrow()),
            NodeData::Element { .. } => text.push_str(&collect_text(child)),
            _ => {}
        }
    }
    text
}
