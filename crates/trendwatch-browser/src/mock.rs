//! Mock browser for testing
//!
//! A scripted fake site: each URL maps to a static element tree, key presses on
//! a field can reveal elements or navigate, and restoring an accepted session
//! state unlocks routes marked as authenticated-only. Every call is recorded so
//! tests can assert on what the code under test did.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::{
    Browser, BrowserContext, BrowserError, BrowserResult, ElementRef, Key, Page,
    StorageState,
};

/// A node in the fake DOM. Selectors are matched by exact string equality.
#[derive(Debug, Clone)]
pub struct MockElement {
    pub selector: String,
    pub text: Option<String>,
    pub visible: bool,
    pub children: Vec<MockElement>,
}

impl MockElement {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: None,
            visible: true,
            children: Vec::new(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn child(mut self, child: MockElement) -> Self {
        self.children.push(child);
        self
    }
}

/// Content served for one URL
#[derive(Debug, Clone, Default)]
pub struct MockRoute {
    pub elements: Vec<MockElement>,

    /// Served blank unless the context is authenticated
    pub requires_auth: bool,
}

impl MockRoute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticated_only(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// What happens when a key is pressed in a given field
#[derive(Debug, Clone)]
pub enum MockEffect {
    /// Attach a new element to the current page
    Reveal(MockElement),

    /// Load another URL, optionally marking the context as logged in
    Navigate { url: String, authenticate: bool },
}

/// Recorded interaction
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    NewContext { restored: bool },
    Goto(String),
    Fill { selector: String, text: String },
    Press { selector: String, key: Key },
    Screenshot(PathBuf),
    StorageState,
    CloseContext,
}

#[derive(Debug, Default)]
struct MockWorld {
    routes: HashMap<String, MockRoute>,
    on_press: HashMap<String, Vec<MockEffect>>,
    on_visit: HashMap<String, Vec<MockEffect>>,
    accepted_state: Option<StorageState>,
    issued_state: StorageState,
    unreachable: HashSet<String>,
    calls: Vec<MockCall>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock browser for unit/integration testing
#[derive(Clone, Default)]
pub struct MockBrowser {
    world: Arc<Mutex<MockWorld>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `route` at `url`
    pub fn with_route(self, url: impl Into<String>, route: MockRoute) -> Self {
        lock(&self.world).routes.insert(url.into(), route);
        self
    }

    /// Run `effect` when a key is pressed in the field matching `selector`
    pub fn on_press(self, selector: impl Into<String>, effect: MockEffect) -> Self {
        lock(&self.world)
            .on_press
            .entry(selector.into())
            .or_default()
            .push(effect);
        self
    }

    /// Run `effect` right after `url` loads, e.g. a server-side redirect or an
    /// operator finishing a login by hand
    pub fn on_visit(self, url: impl Into<String>, effect: MockEffect) -> Self {
        lock(&self.world).on_visit.entry(url.into()).or_default().push(effect);
        self
    }

    /// Treat contexts restored from exactly this state as logged in
    pub fn accept_state(self, state: StorageState) -> Self {
        lock(&self.world).accepted_state = Some(state);
        self
    }

    /// State returned by `storage_state()` once a context is logged in
    pub fn issue_state(self, state: StorageState) -> Self {
        lock(&self.world).issued_state = state;
        self
    }

    /// Make navigation to `url` fail
    pub fn unreachable(self, url: impl Into<String>) -> Self {
        lock(&self.world).unreachable.insert(url.into());
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.world).calls.clone()
    }

    /// Selectors that received a `fill`, in order
    pub fn filled_selectors(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Fill { selector, .. } => Some(selector),
                _ => None,
            })
            .collect()
    }

    pub fn visited(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Goto(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Screenshot(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        lock(&self.world).calls.push(call);
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn new_context(&self, state: Option<&StorageState>) -> BrowserResult<Box<dyn BrowserContext>> {
        let authenticated = {
            let world = lock(&self.world);
            matches!((state, &world.accepted_state), (Some(s), Some(accepted)) if s == accepted)
        };
        self.record(MockCall::NewContext {
            restored: state.is_some(),
        });

        Ok(Box::new(MockContext {
            browser: self.clone(),
            authenticated: Arc::new(Mutex::new(authenticated)),
        }))
    }
}

struct MockContext {
    browser: MockBrowser,
    authenticated: Arc<Mutex<bool>>,
}

#[async_trait]
impl BrowserContext for MockContext {
    async fn new_page(&self) -> BrowserResult<Box<dyn Page>> {
        Ok(Box::new(MockPage {
            browser: self.browser.clone(),
            authenticated: self.authenticated.clone(),
            doc: Mutex::new(MockDocument::default()),
        }))
    }

    async fn storage_state(&self) -> BrowserResult<StorageState> {
        self.browser.record(MockCall::StorageState);
        if *lock(&self.authenticated) {
            Ok(lock(&self.browser.world).issued_state.clone())
        } else {
            Ok(StorageState::default())
        }
    }

    async fn close(&self) -> BrowserResult<()> {
        self.browser.record(MockCall::CloseContext);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockDocument {
    url: String,
    elements: Vec<MockElement>,
    /// Elements handed out as `ElementRef("m<index>")`
    registry: Vec<MockElement>,
}

impl MockDocument {
    fn register(&mut self, found: Vec<MockElement>) -> Vec<ElementRef> {
        found
            .into_iter()
            .map(|element| {
                self.registry.push(element);
                ElementRef::new(format!("m{}", self.registry.len() - 1))
            })
            .collect()
    }

    fn resolve(&self, element: &ElementRef) -> BrowserResult<&MockElement> {
        element
            .as_str()
            .strip_prefix('m')
            .and_then(|idx| idx.parse::<usize>().ok())
            .and_then(|idx| self.registry.get(idx))
            .ok_or_else(|| BrowserError::NoSuchElement(format!("stale element {element}")))
    }

    fn first_visible(&self, selector: &str) -> Option<MockElement> {
        let mut found = Vec::new();
        collect_matches(&self.elements, selector, &mut found);
        found.into_iter().find(|e| e.visible)
    }
}

fn collect_matches(elements: &[MockElement], selector: &str, out: &mut Vec<MockElement>) {
    for element in elements {
        if element.selector == selector {
            out.push(element.clone());
        }
        collect_matches(&element.children, selector, out);
    }
}

struct MockPage {
    browser: MockBrowser,
    authenticated: Arc<Mutex<bool>>,
    doc: Mutex<MockDocument>,
}

impl MockPage {
    fn load(&self, url: &str) -> BrowserResult<()> {
        let route = {
            let world = lock(&self.browser.world);
            if world.unreachable.contains(url) {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_CONNECTION_REFUSED".into(),
                });
            }
            world.routes.get(url).cloned().unwrap_or_default()
        };

        let visible = !route.requires_auth || *lock(&self.authenticated);
        let mut doc = lock(&self.doc);
        doc.url = url.to_string();
        doc.elements = if visible { route.elements } else { Vec::new() };
        doc.registry.clear();
        Ok(())
    }

    fn apply(&self, effects: Vec<MockEffect>) -> BrowserResult<()> {
        for effect in effects {
            match effect {
                MockEffect::Reveal(element) => lock(&self.doc).elements.push(element),
                MockEffect::Navigate { url, authenticate } => {
                    if authenticate {
                        *lock(&self.authenticated) = true;
                    }
                    self.load(&url)?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Page for MockPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        self.browser.record(MockCall::Goto(url.to_string()));
        self.load(url)?;
        let effects = lock(&self.browser.world)
            .on_visit
            .get(url)
            .cloned()
            .unwrap_or_default();
        self.apply(effects)
    }

    async fn current_url(&self) -> BrowserResult<String> {
        Ok(lock(&self.doc).url.clone())
    }

    async fn query_all(&self, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        let mut doc = lock(&self.doc);
        let mut found = Vec::new();
        collect_matches(&doc.elements, selector, &mut found);
        Ok(doc.register(found))
    }

    async fn query_within(&self, parent: &ElementRef, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        let mut doc = lock(&self.doc);
        let children = doc.resolve(parent)?.children.clone();
        let mut found = Vec::new();
        collect_matches(&children, selector, &mut found);
        Ok(doc.register(found))
    }

    async fn is_displayed(&self, element: &ElementRef) -> BrowserResult<bool> {
        Ok(lock(&self.doc).resolve(element)?.visible)
    }

    async fn text_content(&self, element: &ElementRef) -> BrowserResult<Option<String>> {
        Ok(lock(&self.doc).resolve(element)?.text.clone())
    }

    async fn fill(&self, selector: &str, text: &str) -> BrowserResult<()> {
        if lock(&self.doc).first_visible(selector).is_none() {
            return Err(BrowserError::NoSuchElement(selector.to_string()));
        }
        self.browser.record(MockCall::Fill {
            selector: selector.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn press(&self, selector: &str, key: Key) -> BrowserResult<()> {
        if lock(&self.doc).first_visible(selector).is_none() {
            return Err(BrowserError::NoSuchElement(selector.to_string()));
        }
        self.browser.record(MockCall::Press {
            selector: selector.to_string(),
            key,
        });

        let effects = lock(&self.browser.world)
            .on_press
            .get(selector)
            .cloned()
            .unwrap_or_default();
        self.apply(effects)
    }

    async fn screenshot(&self, path: &Path) -> BrowserResult<()> {
        self.browser.record(MockCall::Screenshot(path.to_path_buf()));
        Ok(())
    }
}
