//! Driver capability boundary.
//!
//! A [`Locatable`] is whatever can answer queries about a live (or recorded)
//! page: match counts, text, attributes, clicks, fills and visibility waits.
//! Queries are expressed as a [`LocatorPath`], a chain of CSS steps and
//! `nth` picks evaluated from the document root. Paths are lazy: nothing is
//! cached, every call re-evaluates against the current DOM.
//!
//! [`Locator`] is the handle callers work with. It pairs a path with the
//! driver it runs against, so a page root and a nested element scope are
//! the same type and extraction can recurse into either.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One step of a locator chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorStep {
    /// All descendants of the current match set matching a CSS selector,
    /// deduplicated and in document order.
    Css(String),
    /// The element at this zero-based index of the current match set.
    Nth(usize),
}

/// A chain of steps rooted at the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocatorPath {
    steps: Vec<LocatorStep>,
}

impl LocatorPath {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[LocatorStep] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn css(&self, selector: &str) -> Self {
        self.with(LocatorStep::Css(selector.to_string()))
    }

    pub fn nth(&self, index: usize) -> Self {
        self.with(LocatorStep::Nth(index))
    }

    fn with(&self, step: LocatorStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }
}

impl fmt::Display for LocatorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("page");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            match step {
                LocatorStep::Css(s) => write!(f, "css={s}")?,
                LocatorStep::Nth(n) => write!(f, "nth={n}")?,
            }
        }
        Ok(())
    }
}

/// Visibility transitions a caller can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    /// First match exists and is rendered.
    Visible,
    /// No match, or the first match is not rendered.
    Hidden,
    /// At least one match exists.
    Attached,
    /// No match exists.
    Detached,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        })
    }
}

/// Capability a browser driver (or a recorded page) provides to the core.
///
/// Reads and actions target the *first* element of the path's match set.
/// Reads on an empty match set return `Ok(None)`; actions on an empty match
/// set fail with `Error::ElementNotFound`.
#[async_trait]
pub trait Locatable: Send + Sync {
    async fn count(&self, path: &LocatorPath) -> Result<usize>;

    /// Raw `textContent` of the first match (untrimmed).
    async fn text_content(&self, path: &LocatorPath) -> Result<Option<String>>;

    async fn attribute(&self, path: &LocatorPath, name: &str) -> Result<Option<String>>;

    async fn click(&self, path: &LocatorPath) -> Result<()>;

    /// Replace the content of an input, textarea or contenteditable element.
    async fn fill(&self, path: &LocatorPath, text: &str) -> Result<()>;

    /// Suspend until `state` holds or `timeout` elapses (`Error::Timeout`).
    async fn wait_for(&self, path: &LocatorPath, state: WaitState, timeout: Duration)
        -> Result<()>;
}

/// A lazily evaluated scope: the page root or a chain of steps below it.
#[derive(Clone)]
pub struct Locator<'d> {
    driver: &'d dyn Locatable,
    path: LocatorPath,
}

impl<'d> Locator<'d> {
    /// Page-root scope.
    pub fn page(driver: &'d dyn Locatable) -> Self {
        Self {
            driver,
            path: LocatorPath::root(),
        }
    }

    pub fn from_path(driver: &'d dyn Locatable, path: LocatorPath) -> Self {
        Self { driver, path }
    }

    /// Scope a CSS selector below this one.
    pub fn locator(&self, selector: &str) -> Locator<'d> {
        Self {
            driver: self.driver,
            path: self.path.css(selector),
        }
    }

    pub fn nth(&self, index: usize) -> Locator<'d> {
        Self {
            driver: self.driver,
            path: self.path.nth(index),
        }
    }

    pub fn first(&self) -> Locator<'d> {
        self.nth(0)
    }

    pub fn path(&self) -> &LocatorPath {
        &self.path
    }

    pub fn driver(&self) -> &'d dyn Locatable {
        self.driver
    }

    pub async fn count(&self) -> Result<usize> {
        self.driver.count(&self.path).await
    }

    pub async fn text_content(&self) -> Result<Option<String>> {
        self.driver.text_content(&self.path).await
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.driver.attribute(&self.path, name).await
    }

    pub async fn click(&self) -> Result<()> {
        self.driver.click(&self.path).await
    }

    pub async fn fill(&self, text: &str) -> Result<()> {
        self.driver.fill(&self.path, text).await
    }

    pub async fn wait_for(&self, state: WaitState, timeout: Duration) -> Result<()> {
        self.driver.wait_for(&self.path, state, timeout).await
    }
}

impl fmt::Debug for Locator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Locator").field(&self.path.to_string()).finish()
    }
}

impl fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path, f)
    }
}
