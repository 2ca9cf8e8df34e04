//! Static HTML page driver.
//!
//! The document is re-parsed on every query so the page can be swapped with
//! [`HtmlPage::set_html`] while an automator holds it. Clicks and fills do
//! not run scripts; they land in an overlay keyed by element position that
//! later reads consult and tests can inspect.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chatscope_core::{Error, Locatable, LocatorPath, LocatorStep, Result, WaitState};
use parking_lot::RwLock;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A UI action applied to the page, in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Interaction {
    Click { target: String },
    Fill { target: String, text: String },
}

#[derive(Debug, Default)]
struct Overlay {
    /// Element ordinal (document order) → click count.
    clicks: HashMap<usize, usize>,
    fills: HashMap<usize, String>,
    journal: Vec<Interaction>,
}

#[derive(Debug)]
struct PageState {
    source: String,
    overlay: Overlay,
}

/// [`Locatable`] over an HTML string.
#[derive(Debug)]
pub struct HtmlPage {
    url: String,
    poll_interval: Duration,
    state: RwLock<PageState>,
}

impl HtmlPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            url: "about:blank".into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: RwLock::new(PageState {
                source: html.into(),
                overlay: Overlay::default(),
            }),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> String {
        self.state.read().source.clone()
    }

    /// Replace the document. Recorded clicks and fills are discarded.
    pub fn set_html(&self, html: impl Into<String>) {
        let mut state = self.state.write();
        state.source = html.into();
        state.overlay = Overlay::default();
        debug!("Replaced document of {}", self.url);
    }

    /// Times the first match of `selector` was clicked.
    pub fn click_count(&self, selector: &str) -> usize {
        let path = LocatorPath::root().css(selector);
        self.with_matches(&path, |matches, overlay| {
            Ok(matches
                .first()
                .and_then(|(ordinal, _)| overlay.clicks.get(ordinal).copied())
                .unwrap_or(0))
        })
        .unwrap_or(0)
    }

    /// Text most recently filled into the first match of `selector`.
    pub fn filled_value(&self, selector: &str) -> Option<String> {
        let path = LocatorPath::root().css(selector);
        self.with_matches(&path, |matches, overlay| {
            Ok(matches
                .first()
                .and_then(|(ordinal, _)| overlay.fills.get(ordinal).cloned()))
        })
        .ok()
        .flatten()
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.state.read().overlay.journal.clone()
    }

    fn with_matches<R>(
        &self,
        path: &LocatorPath,
        f: impl FnOnce(&[(usize, ElementRef<'_>)], &Overlay) -> Result<R>,
    ) -> Result<R> {
        let state = self.state.read();
        let document = Html::parse_document(&state.source);
        let matches = evaluate(&document, path)?;
        f(&matches, &state.overlay)
    }

    fn with_first_mut<R>(
        &self,
        path: &LocatorPath,
        f: impl FnOnce(usize, ElementRef<'_>, &mut Overlay) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.state.write();
        let PageState { source, overlay } = &mut *guard;
        let document = Html::parse_document(source);
        let matches = evaluate(&document, path)?;
        let (ordinal, element) = matches
            .first()
            .copied()
            .ok_or_else(|| Error::ElementNotFound(path.to_string()))?;
        f(ordinal, element, overlay)
    }

    fn state_holds(&self, path: &LocatorPath, state: WaitState) -> Result<bool> {
        self.with_matches(path, |matches, _| {
            let first_rendered = matches.first().map_or(false, |(_, e)| is_rendered(*e));
            Ok(match state {
                WaitState::Attached => !matches.is_empty(),
                WaitState::Detached => matches.is_empty(),
                WaitState::Visible => first_rendered,
                WaitState::Hidden => !first_rendered,
            })
        })
    }
}

#[async_trait]
impl Locatable for HtmlPage {
    async fn count(&self, path: &LocatorPath) -> Result<usize> {
        self.with_matches(path, |matches, _| Ok(matches.len()))
    }

    async fn text_content(&self, path: &LocatorPath) -> Result<Option<String>> {
        self.with_matches(path, |matches, overlay| {
            Ok(matches.first().map(|(ordinal, element)| {
                match overlay.fills.get(ordinal) {
                    Some(filled) if is_content_editable(*element) => filled.clone(),
                    _ => element.text().collect::<String>(),
                }
            }))
        })
    }

    async fn attribute(&self, path: &LocatorPath, name: &str) -> Result<Option<String>> {
        self.with_matches(path, |matches, overlay| {
            Ok(matches.first().and_then(|(ordinal, element)| {
                let filled = overlay.fills.get(ordinal);
                match filled {
                    Some(text) if name == "value" && is_form_field(*element) => Some(text.clone()),
                    _ => element.value().attr(name).map(str::to_string),
                }
            }))
        })
    }

    async fn click(&self, path: &LocatorPath) -> Result<()> {
        self.with_first_mut(path, |ordinal, element, overlay| {
            ensure_interactable(path, element)?;
            *overlay.clicks.entry(ordinal).or_insert(0) += 1;
            overlay.journal.push(Interaction::Click {
                target: path.to_string(),
            });
            Ok(())
        })?;
        debug!("Clicked {}", path);
        Ok(())
    }

    async fn fill(&self, path: &LocatorPath, text: &str) -> Result<()> {
        self.with_first_mut(path, |ordinal, element, overlay| {
            ensure_interactable(path, element)?;
            if !is_form_field(element) && !is_content_editable(element) {
                return Err(Error::NotInteractable(format!(
                    "{path} is <{}>, not an input, textarea or contenteditable element",
                    element.value().name()
                )));
            }
            overlay.fills.insert(ordinal, text.to_string());
            overlay.journal.push(Interaction::Fill {
                target: path.to_string(),
                text: text.to_string(),
            });
            Ok(())
        })?;
        debug!("Filled {} ({} chars)", path, text.chars().count());
        Ok(())
    }

    async fn wait_for(&self, path: &LocatorPath, state: WaitState, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state_holds(path, state)? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    target: path.to_string(),
                    state,
                    timeout,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Match set of `path`, paired with each element's document-order ordinal.
fn evaluate<'a>(document: &'a Html, path: &LocatorPath) -> Result<Vec<(usize, ElementRef<'a>)>> {
    let all: Vec<ElementRef<'a>> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect();

    // `None` is the document itself.
    let mut current: Option<Vec<(usize, ElementRef<'a>)>> = None;

    for step in path.steps() {
        let next = match step {
            LocatorStep::Css(css) => {
                let selector = parse_selector(css)?;
                let ids: HashSet<_> = match &current {
                    None => document.select(&selector).map(|e| e.id()).collect(),
                    Some(scopes) => scopes
                        .iter()
                        .flat_map(|(_, scope)| {
                            let scope_id = scope.id();
                            scope
                                .select(&selector)
                                .filter(move |e| e.id() != scope_id)
                                .map(|e| e.id())
                        })
                        .collect(),
                };
                all.iter()
                    .enumerate()
                    .filter(|(_, e)| ids.contains(&e.id()))
                    .map(|(i, e)| (i, *e))
                    .collect()
            }
            LocatorStep::Nth(n) => match current.take() {
                None if *n == 0 => continue,
                None => Vec::new(),
                Some(set) => set.into_iter().nth(*n).into_iter().collect(),
            },
        };
        current = Some(next);
    }

    Ok(current.unwrap_or_else(|| {
        all.first()
            .map(|root| vec![(0, *root)])
            .unwrap_or_default()
    }))
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn ensure_interactable(path: &LocatorPath, element: ElementRef<'_>) -> Result<()> {
    if element.value().attr("disabled").is_some() {
        return Err(Error::NotInteractable(format!("{path} is disabled")));
    }
    if !is_rendered(element) {
        return Err(Error::NotInteractable(format!("{path} is not visible")));
    }
    Ok(())
}

fn is_form_field(element: ElementRef<'_>) -> bool {
    matches!(element.value().name(), "input" | "textarea" | "select")
}

fn is_content_editable(element: ElementRef<'_>) -> bool {
    element
        .value()
        .attr("contenteditable")
        .map_or(false, |v| !v.eq_ignore_ascii_case("false"))
}

/// Rendered unless the element or an ancestor is hidden by markup.
fn is_rendered(element: ElementRef<'_>) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .all(|e| !hides(e))
}

fn hides(element: ElementRef<'_>) -> bool {
    let el = element.value();
    if matches!(el.name(), "head" | "script" | "style" | "template" | "noscript") {
        return true;
    }
    if el.attr("hidden").is_some() || el.attr("aria-hidden") == Some("true") {
        return true;
    }
    if el.name() == "input"
        && el
            .attr("type")
            .map_or(false, |t| t.eq_ignore_ascii_case("hidden"))
    {
        return true;
    }
    if el.classes().any(|c| c == "hidden") {
        return true;
    }
    el.attr("style").map_or(false, |style| {
        let style: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        style.contains("display:none") || style.contains("visibility:hidden")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatscope_core::Locator;

    const PAGE: &str = r#"
        <html><body>
          <ul id="chats">
            <li><a href="/c/1">First</a></li>
            <li><a href="/c/2">Second</a></li>
            <li class="hidden"><a href="/c/3">Third</a></li>
          </ul>
          <div class="msg"><p>one</p><div class="msg"><p>nested</p></div></div>
          <textarea id="box"></textarea>
          <div id="editor" contenteditable="true">old</div>
          <button id="send">Send</button>
          <button id="stop" disabled>Stop</button>
        </body></html>
    "#;

    #[tokio::test]
    async fn test_count_and_nth() {
        let page = HtmlPage::new(PAGE);
        let root = Locator::page(&page);

        let links = root.locator("#chats a");
        assert_eq!(links.count().await.unwrap(), 3);
        assert_eq!(
            links.nth(1).attribute("href").await.unwrap().as_deref(),
            Some("/c/2")
        );
        assert_eq!(links.nth(7).count().await.unwrap(), 0);
        assert_eq!(links.nth(7).text_content().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_nested_scope_excludes_self_and_dedups() {
        let page = HtmlPage::new(PAGE);
        let root = Locator::page(&page);

        let outer = root.locator("div.msg");
        assert_eq!(outer.count().await.unwrap(), 2);
        // Both .msg scopes reach the nested paragraph; it is counted once.
        assert_eq!(outer.locator("p").count().await.unwrap(), 2);
        assert_eq!(outer.first().locator("div.msg").count().await.unwrap(), 1);
        assert_eq!(outer.nth(1).locator("div.msg").count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_selector() {
        let page = HtmlPage::new(PAGE);
        let err = Locator::page(&page).locator("a[").count().await.unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }

    #[tokio::test]
    async fn test_click_and_fill_are_recorded() {
        let page = HtmlPage::new(PAGE);
        let root = Locator::page(&page);

        root.locator("#box").fill("hello").await.unwrap();
        root.locator("#send").click().await.unwrap();
        root.locator("#editor").fill("new").await.unwrap();

        assert_eq!(page.filled_value("#box").as_deref(), Some("hello"));
        assert_eq!(
            root.locator("#box").attribute("value").await.unwrap().as_deref(),
            Some("hello")
        );
        assert_eq!(
            root.locator("#editor").text_content().await.unwrap().as_deref(),
            Some("new")
        );
        assert_eq!(page.click_count("#send"), 1);
        assert_eq!(page.interactions().len(), 3);
    }

    #[tokio::test]
    async fn test_action_failures() {
        let page = HtmlPage::new(PAGE);
        let root = Locator::page(&page);

        let err = root.locator("#missing").click().await.unwrap_err();
        assert!(matches!(err, Error::ElementNotFound(_)));

        let err = root.locator("#stop").click().await.unwrap_err();
        assert!(matches!(err, Error::NotInteractable(_)));

        let err = root.locator("#send").fill("x").await.unwrap_err();
        assert!(matches!(err, Error::NotInteractable(_)));
        assert!(page.interactions().is_empty());
    }

    #[tokio::test]
    async fn test_visibility() {
        let page = HtmlPage::new(PAGE);
        let hidden_link = LocatorPath::root().css("#chats li.hidden a");
        assert!(page.state_holds(&hidden_link, WaitState::Attached).unwrap());
        assert!(page.state_holds(&hidden_link, WaitState::Hidden).unwrap());
        assert!(!page.state_holds(&hidden_link, WaitState::Visible).unwrap());

        let absent = LocatorPath::root().css(".spinner");
        assert!(page.state_holds(&absent, WaitState::Hidden).unwrap());
        assert!(page.state_holds(&absent, WaitState::Detached).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let page = HtmlPage::new(PAGE);
        let err = page
            .wait_for(
                &LocatorPath::root().css(".spinner"),
                WaitState::Visible,
                Duration::from_secs(2),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { state: WaitState::Visible, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sees_replaced_document() {
        let page = std::sync::Arc::new(HtmlPage::new("<div class='spinner'></div>"));
        let swapper = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            swapper.set_html("<p>done</p>");
        });

        page.wait_for(
            &LocatorPath::root().css(".spinner"),
            WaitState::Detached,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    }
}
