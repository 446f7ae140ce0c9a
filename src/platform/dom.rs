//! In-memory page model
//!
//! The runtime does not drive a real browser. DOM-bound bricks operate on a
//! [`Document`]: a snapshot of the page's url/title/body text plus a table of
//! elements keyed by selector. Content-script capabilities (DOM access,
//! clipboard) are provided through a [`PageAdapter`].

use crate::error::BrickError;
use crate::execution::AbortSignal;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Scoping handle passed to root-aware bricks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementRef {
    /// The whole document
    Document,
    /// The `index`-th element matching `selector`
    Element { selector: String, index: usize },
}

impl ElementRef {
    pub fn element(selector: impl Into<String>) -> Self {
        ElementRef::Element {
            selector: selector.into(),
            index: 0,
        }
    }

    /// Selector scoped to this root
    fn scoped(&self, selector: &str) -> String {
        match self {
            ElementRef::Document => selector.to_string(),
            ElementRef::Element { selector: root, .. } => format!("{} {}", root, selector),
        }
    }
}

/// A single element of the page model
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementData {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ElementData {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: BTreeMap::new(),
        }
    }
}

/// Serialized page description, loaded by the CLI with `--page`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFixture {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub is_frame: bool,

    #[serde(default)]
    pub body_text: String,

    /// Selector → matching elements, in document order
    #[serde(default)]
    pub elements: BTreeMap<String, Vec<ElementData>>,
}

fn default_url() -> String {
    "about:blank".to_string()
}

impl PageFixture {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Mutable snapshot of a page
#[derive(Debug)]
pub struct Document {
    url: String,
    title: Mutex<String>,
    is_frame: bool,
    body_text: String,
    elements: DashMap<String, Vec<ElementData>>,
}

impl Document {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: Mutex::new(title.into()),
            is_frame: false,
            body_text: String::new(),
            elements: DashMap::new(),
        }
    }

    pub fn from_fixture(fixture: PageFixture) -> Self {
        let document = Self {
            url: fixture.url,
            title: Mutex::new(fixture.title),
            is_frame: fixture.is_frame,
            body_text: fixture.body_text,
            elements: DashMap::new(),
        };
        for (selector, elements) in fixture.elements {
            document.elements.insert(selector, elements);
        }
        document
    }

    pub fn with_frame(mut self, is_frame: bool) -> Self {
        self.is_frame = is_frame;
        self
    }

    pub fn with_body_text(mut self, text: impl Into<String>) -> Self {
        self.body_text = text.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_frame(&self) -> bool {
        self.is_frame
    }

    pub fn title(&self) -> String {
        self.title
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.lock().unwrap_or_else(PoisonError::into_inner) = title.into();
    }

    /// Add elements matching `selector`
    pub fn insert(&self, selector: impl Into<String>, element: ElementData) {
        self.elements.entry(selector.into()).or_default().push(element);
    }

    /// Elements matching `selector` below `root`
    pub fn query(&self, root: &ElementRef, selector: &str) -> Vec<ElementData> {
        self.elements
            .get(&root.scoped(selector))
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Resolve a selector to an element handle
    pub fn resolve(&self, root: &ElementRef, selector: &str) -> Option<ElementRef> {
        let scoped = root.scoped(selector);
        match self.elements.get(&scoped) {
            Some(entry) if !entry.is_empty() => Some(ElementRef::Element {
                selector: scoped,
                index: 0,
            }),
            _ => None,
        }
    }

    /// Element data for a handle; `None` when the element is gone
    pub fn element(&self, root: &ElementRef) -> Option<ElementData> {
        match root {
            ElementRef::Document => Some(ElementData::with_text(self.body_text.clone())),
            ElementRef::Element { selector, index } => self
                .elements
                .get(selector)
                .and_then(|entry| entry.value().get(*index).cloned()),
        }
    }

    /// Text content of a root
    pub fn text(&self, root: &ElementRef) -> Option<String> {
        self.element(root).map(|element| element.text)
    }

    /// Wait until `selector` matches below `root`
    ///
    /// Polls the page model; returns `Err(Aborted)` as soon as `abort` fires.
    pub async fn wait_for(
        &self,
        root: &ElementRef,
        selector: &str,
        abort: &AbortSignal,
    ) -> Result<ElementRef, BrickError> {
        loop {
            if let Some(element) = self.resolve(root, selector) {
                return Ok(element);
            }
            tokio::select! {
                _ = abort.aborted() => return Err(BrickError::Aborted),
                _ = tokio::time::sleep(Duration::from_millis(25)) => {}
            }
        }
    }
}

/// Content-script side of the platform: the page and its clipboard
#[async_trait]
pub trait PageAdapter: Send + Sync {
    fn document(&self) -> Arc<Document>;

    async fn write_clipboard(&self, text: &str) -> Result<(), BrickError>;

    /// Top-level frame, when this page is embedded and reachable
    fn top(&self) -> Option<Arc<dyn PageAdapter>> {
        None
    }

    /// Child frames reachable from this page
    fn frames(&self) -> Vec<Arc<dyn PageAdapter>> {
        Vec::new()
    }
}

/// [`PageAdapter`] over an in-memory document with a recording clipboard
pub struct StaticPage {
    document: Arc<Document>,
    clipboard: Mutex<Vec<String>>,
    top: Option<Arc<dyn PageAdapter>>,
    frames: Vec<Arc<dyn PageAdapter>>,
}

impl StaticPage {
    pub fn new(document: Document) -> Self {
        Self {
            document: Arc::new(document),
            clipboard: Mutex::new(Vec::new()),
            top: None,
            frames: Vec::new(),
        }
    }

    pub fn with_top(mut self, top: Arc<dyn PageAdapter>) -> Self {
        self.top = Some(top);
        self
    }

    pub fn with_frame(mut self, frame: Arc<dyn PageAdapter>) -> Self {
        self.frames.push(frame);
        self
    }

    /// Everything written to the clipboard, oldest first
    pub fn clipboard(&self) -> Vec<String> {
        self.clipboard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PageAdapter for StaticPage {
    fn document(&self) -> Arc<Document> {
        self.document.clone()
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), BrickError> {
        self.clipboard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }

    fn top(&self) -> Option<Arc<dyn PageAdapter>> {
        self.top.clone()
    }

    fn frames(&self) -> Vec<Arc<dyn PageAdapter>> {
        self.frames.clone()
    }
}
