//! Selector specification types, matching the JSON spec format.
//!
//! Specs are read-only configuration: loaded once, validated, never mutated.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// JSON shape shared by "one string or a list of strings" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        }
    }

    fn from_vec(mut v: Vec<String>) -> Self {
        if v.len() == 1 {
            StringOrList::One(v.remove(0))
        } else {
            StringOrList::Many(v)
        }
    }
}

// ---------------------------------------------------------------
// CssSelector
// ---------------------------------------------------------------

/// One CSS selector or an ordered fallback list; earlier entries win.
///
/// Stored as `primary` + `fallbacks` so there is always a first candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StringOrList", into = "StringOrList")]
pub struct CssSelector {
    primary: String,
    fallbacks: Vec<String>,
}

impl CssSelector {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            fallbacks: Vec::new(),
        }
    }

    /// Build from an ordered candidate list. Fails on an empty list or a
    /// blank candidate.
    pub fn from_candidates<I, S>(candidates: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut iter = candidates.into_iter().map(Into::into);
        let primary = iter
            .next()
            .ok_or_else(|| Error::Spec("selector list is empty".into()))?;
        let fallbacks: Vec<String> = iter.collect();

        for candidate in std::iter::once(&primary).chain(&fallbacks) {
            if candidate.trim().is_empty() {
                return Err(Error::Spec("selector candidate is blank".into()));
            }
        }

        Ok(Self { primary, fallbacks })
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallbacks.push(fallback.into());
        self
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    /// Candidates in preference order.
    pub fn candidates(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        1 + self.fallbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl TryFrom<StringOrList> for CssSelector {
    type Error = Error;

    fn try_from(raw: StringOrList) -> Result<Self> {
        Self::from_candidates(raw.into_vec())
    }
}

impl From<CssSelector> for StringOrList {
    fn from(selector: CssSelector) -> Self {
        let mut all = vec![selector.primary];
        all.extend(selector.fallbacks);
        StringOrList::from_vec(all)
    }
}

impl From<&str> for CssSelector {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CssSelector {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all: Vec<&str> = self.candidates().collect();
        f.write_str(&all.join(" | "))
    }
}

// ---------------------------------------------------------------
// SelectorDef
// ---------------------------------------------------------------

/// Attribute name that means "read trimmed text content".
pub const TEXT_CONTENT_ATTR: &str = "textContent";

/// How to find elements and what to read from each one.
///
/// With `fields`, every match expands into a record built from the
/// sub-definitions. Without, a scalar is read per match: `attr`, or trimmed
/// text content when `attr` is absent or `"textContent"`. `hints` are notes
/// for spec authors and are never evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorDef {
    pub selector: CssSelector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, SelectorDef>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl SelectorDef {
    pub fn new(selector: impl Into<CssSelector>) -> Self {
        Self {
            selector: selector.into(),
            attr: None,
            fields: None,
            hints: Vec::new(),
        }
    }

    pub fn with_attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, def: SelectorDef) -> Self {
        self.fields
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), def);
        self
    }

    pub fn is_record(&self) -> bool {
        self.fields.is_some()
    }

    /// Attribute to read for scalar extraction; `None` means text content.
    pub fn scalar_attr(&self) -> Option<&str> {
        match self.attr.as_deref() {
            None | Some(TEXT_CONTENT_ATTR) => None,
            Some(other) => Some(other),
        }
    }

    /// Nesting depth of the field tree (a scalar definition is depth 1).
    pub fn depth(&self) -> usize {
        1 + self
            .fields
            .iter()
            .flat_map(|f| f.values())
            .map(SelectorDef::depth)
            .max()
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------
// AI assistant page / site specs
// ---------------------------------------------------------------

/// Core semantic roles an assistant page may define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageElement {
    LoginIndicator,
    NewChatButton,
    RecentChatLinks,
    MessageInputArea,
    MessageSubmitButton,
    MessageBlocks,
    AiGeneratingIndicator,
}

impl PageElement {
    pub fn all() -> &'static [PageElement] {
        &[
            Self::LoginIndicator,
            Self::NewChatButton,
            Self::RecentChatLinks,
            Self::MessageInputArea,
            Self::MessageSubmitButton,
            Self::MessageBlocks,
            Self::AiGeneratingIndicator,
        ]
    }

    /// JSON key of this role.
    pub fn key(&self) -> &'static str {
        match self {
            Self::LoginIndicator => "loginIndicator",
            Self::NewChatButton => "newChatButton",
            Self::RecentChatLinks => "recentChatLinks",
            Self::MessageInputArea => "messageInputArea",
            Self::MessageSubmitButton => "messageSubmitButton",
            Self::MessageBlocks => "messageBlocks",
            Self::AiGeneratingIndicator => "aiGeneratingIndicator",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|e| e.key() == key)
    }
}

impl fmt::Display for PageElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Named elements of one page: the core roles plus anything else a spec
/// author found useful. Extra elements are kept but the automator only
/// reads them on request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageElements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_indicator: Option<SelectorDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_chat_button: Option<SelectorDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_chat_links: Option<SelectorDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_input_area: Option<SelectorDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_submit_button: Option<SelectorDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_blocks: Option<SelectorDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_generating_indicator: Option<SelectorDef>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, SelectorDef>,
}

impl PageElements {
    /// Sort a flat name → definition map into core roles and extras.
    pub fn from_map(map: BTreeMap<String, SelectorDef>) -> Self {
        let mut elements = Self::default();
        for (key, def) in map {
            match PageElement::from_key(&key) {
                Some(role) => *elements.slot_mut(role) = Some(def),
                None => {
                    elements.extra.insert(key, def);
                }
            }
        }
        elements
    }

    pub fn role(&self, role: PageElement) -> Option<&SelectorDef> {
        match role {
            PageElement::LoginIndicator => self.login_indicator.as_ref(),
            PageElement::NewChatButton => self.new_chat_button.as_ref(),
            PageElement::RecentChatLinks => self.recent_chat_links.as_ref(),
            PageElement::MessageInputArea => self.message_input_area.as_ref(),
            PageElement::MessageSubmitButton => self.message_submit_button.as_ref(),
            PageElement::MessageBlocks => self.message_blocks.as_ref(),
            PageElement::AiGeneratingIndicator => self.ai_generating_indicator.as_ref(),
        }
    }

    fn slot_mut(&mut self, role: PageElement) -> &mut Option<SelectorDef> {
        match role {
            PageElement::LoginIndicator => &mut self.login_indicator,
            PageElement::NewChatButton => &mut self.new_chat_button,
            PageElement::RecentChatLinks => &mut self.recent_chat_links,
            PageElement::MessageInputArea => &mut self.message_input_area,
            PageElement::MessageSubmitButton => &mut self.message_submit_button,
            PageElement::MessageBlocks => &mut self.message_blocks,
            PageElement::AiGeneratingIndicator => &mut self.ai_generating_indicator,
        }
    }

    /// Look up any element, core or extra, by its JSON key.
    pub fn get(&self, key: &str) -> Option<&SelectorDef> {
        match PageElement::from_key(key) {
            Some(role) => self.role(role),
            None => self.extra.get(key),
        }
    }

    /// All defined elements: core roles first, then extras by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SelectorDef)> + '_ {
        PageElement::all()
            .iter()
            .filter_map(move |role| self.role(*role).map(|def| (role.key(), def)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Core roles this page leaves undefined.
    pub fn missing_roles(&self) -> Vec<PageElement> {
        PageElement::all()
            .iter()
            .copied()
            .filter(|role| self.role(*role).is_none())
            .collect()
    }
}

/// `*` stops at `/`; `**` crosses path segments.
const URL_GLOB_OPTIONS: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Glob-style URL patterns, e.g. `https://chatgpt.com/**`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StringOrList", into = "StringOrList")]
pub struct UrlPatterns(pub Vec<String>);

impl From<StringOrList> for UrlPatterns {
    fn from(raw: StringOrList) -> Self {
        UrlPatterns(raw.into_vec())
    }
}

impl From<UrlPatterns> for StringOrList {
    fn from(patterns: UrlPatterns) -> Self {
        StringOrList::from_vec(patterns.0)
    }
}

impl UrlPatterns {
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }

    /// Length of the longest glob matching `url`, used to rank pages.
    pub fn glob_match_len(&self, url: &str) -> Option<usize> {
        self.iter()
            .filter(|p| match glob::Pattern::new(p) {
                Ok(pattern) => pattern.matches_with(url, URL_GLOB_OPTIONS),
                Err(e) => {
                    warn!("Invalid urlGlob '{}': {}", p, e);
                    false
                }
            })
            .map(str::len)
            .max()
    }

    pub fn regex_matches(&self, url: &str) -> bool {
        self.iter().any(|p| match regex::Regex::new(p) {
            Ok(re) => re.is_match(url),
            Err(e) => {
                warn!("Invalid urlMatch '{}': {}", p, e);
                false
            }
        })
    }
}

/// Selector spec of one AI assistant page type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAssistantPageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_glob: Option<UrlPatterns>,
    #[serde(default)]
    pub elements: PageElements,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl AiAssistantPageSpec {
    pub fn element(&self, role: PageElement) -> Option<&SelectorDef> {
        self.elements.role(role)
    }

    pub fn matches_url(&self, url: &str) -> bool {
        self.url_glob
            .as_ref()
            .and_then(|g| g.glob_match_len(url))
            .is_some()
    }

    fn validate(&self, page: &str) -> Result<()> {
        if let Some(globs) = &self.url_glob {
            for p in globs.iter() {
                glob::Pattern::new(p).map_err(|e| {
                    Error::Spec(format!("page '{page}': invalid urlGlob '{p}': {e}"))
                })?;
            }
        }
        Ok(())
    }
}

/// Pages of a site: `landing` and `chat` are required, others optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SitePages {
    pub landing: AiAssistantPageSpec,
    pub chat: AiAssistantPageSpec,
    #[serde(flatten)]
    pub extra: BTreeMap<String, AiAssistantPageSpec>,
}

impl SitePages {
    pub fn get(&self, role: &str) -> Option<&AiAssistantPageSpec> {
        match role {
            "landing" => Some(&self.landing),
            "chat" => Some(&self.chat),
            other => self.extra.get(other),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AiAssistantPageSpec)> + '_ {
        [("landing", &self.landing), ("chat", &self.chat)]
            .into_iter()
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

/// Selector spec of a whole AI assistant site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAssistantSiteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub pages: SitePages,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl AiAssistantSiteSpec {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load and validate a site spec from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let spec = Self::from_json_str(&data)?;
        debug!(
            "Loaded site spec {} (version {})",
            path.display(),
            spec.version.as_deref().unwrap_or("unversioned")
        );
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, page) in self.pages.iter() {
            page.validate(name)?;
        }
        Ok(())
    }

    pub fn page(&self, role: &str) -> Option<&AiAssistantPageSpec> {
        self.pages.get(role)
    }

    /// Page whose `urlGlob` matches `url`. When several match, the page with
    /// the longest matching pattern wins (ties go to the earlier page).
    pub fn page_for_url(&self, url: &str) -> Option<(&str, &AiAssistantPageSpec)> {
        let mut best: Option<(usize, &str, &AiAssistantPageSpec)> = None;
        for (name, page) in self.pages.iter() {
            let Some(len) = page.url_glob.as_ref().and_then(|g| g.glob_match_len(url)) else {
                continue;
            };
            if best.map_or(true, |(best_len, _, _)| len > best_len) {
                best = Some((len, name, page));
            }
        }
        best.map(|(_, name, page)| (name, page))
    }
}

// ---------------------------------------------------------------
// Generic page specs
// ---------------------------------------------------------------

/// Generic (non-assistant) page spec: optional navigation URL, regex URL
/// matchers and a flat element map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_match: Option<UrlPatterns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub elements: BTreeMap<String, SelectorDef>,
}

impl PageSpec {
    pub fn matches_url(&self, url: &str) -> bool {
        self.url_match
            .as_ref()
            .map_or(false, |patterns| patterns.regex_matches(url))
    }
}

impl From<&PageSpec> for AiAssistantPageSpec {
    fn from(page: &PageSpec) -> Self {
        AiAssistantPageSpec {
            url_glob: None,
            elements: PageElements::from_map(page.elements.clone()),
            hints: Vec::new(),
        }
    }
}

/// Generic site spec keyed by page name.
pub type SiteSpec = BTreeMap<String, PageSpec>;

/// First page (by name) whose `urlMatch` matches `url`.
pub fn page_spec_for_url<'a>(site: &'a SiteSpec, url: &str) -> Option<(&'a str, &'a PageSpec)> {
    site.iter()
        .find(|(_, page)| page.matches_url(url))
        .map(|(name, page)| (name.as_str(), page))
}

/// Host portion of an `http(s)://` URL without userinfo or port; empty
/// when there is none.
pub fn url_host(url: &str) -> &str {
    let Some((_, rest)) = url.split_once("://") else {
        return "";
    };
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    if host.starts_with('[') {
        // IPv6 literal keeps its brackets.
        return host.find(']').map_or(host, |i| &host[..=i]);
    }
    host.split_once(':').map_or(host, |(h, _)| h)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROK_SPEC: &str = r##"{
        "version": "1104",
        "pages": {
            "landing": {
                "urlGlob": "https://grok.com/*",
                "elements": {
                    "loginIndicator": { "selector": "img[alt='pfp']" },
                    "newChatButton": { "selector": ["a[href='/']", "button[aria-label='New chat']"] }
                }
            },
            "chat": {
                "urlGlob": ["https://grok.com/c/*"],
                "elements": {
                    "messageBlocks": {
                        "selector": "div.message-row",
                        "fields": {
                            "userMessage": { "selector": ".user p" },
                            "aiMessage": { "selector": ".assistant p" }
                        }
                    },
                    "modelPicker": { "selector": "#model", "hints": ["Only on wide screens"] }
                },
                "hints": ["Sidebar collapses below 768px"]
            },
            "history": { "elements": {} }
        },
        "hints": ["Prefer aria labels"]
    }"##;

    #[test]
    fn test_parse_site_spec() {
        let spec = AiAssistantSiteSpec::from_json_str(GROK_SPEC).unwrap();
        assert_eq!(spec.version.as_deref(), Some("1104"));
        assert!(spec.page("history").is_some());
        assert!(spec.page("settings").is_none());

        let landing = spec.page("landing").unwrap();
        let new_chat = landing.element(PageElement::NewChatButton).unwrap();
        let candidates: Vec<&str> = new_chat.selector.candidates().collect();
        assert_eq!(candidates, vec!["a[href='/']", "button[aria-label='New chat']"]);

        let chat = spec.page("chat").unwrap();
        assert!(chat.elements.extra.contains_key("modelPicker"));
        assert_eq!(chat.elements.get("modelPicker").unwrap().hints.len(), 1);
        let blocks = chat.element(PageElement::MessageBlocks).unwrap();
        assert!(blocks.is_record());
        assert_eq!(blocks.depth(), 2);
    }

    #[test]
    fn test_empty_selector_list_rejected() {
        let err = serde_json::from_str::<SelectorDef>(r#"{ "selector": [] }"#).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_blank_candidate_rejected() {
        assert!(CssSelector::from_candidates(["a", "  "]).is_err());
    }

    #[test]
    fn test_single_selector_round_trips_as_string() {
        let def = SelectorDef::new("#send");
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json, serde_json::json!({ "selector": "#send" }));

        let def = SelectorDef::new(CssSelector::new("a.primary").with_fallback("a.fallback"));
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["selector"], serde_json::json!(["a.primary", "a.fallback"]));
    }

    #[test]
    fn test_scalar_attr() {
        assert_eq!(SelectorDef::new("a").scalar_attr(), None);
        assert_eq!(SelectorDef::new("a").with_attr("textContent").scalar_attr(), None);
        assert_eq!(SelectorDef::new("a").with_attr("href").scalar_attr(), Some("href"));
    }

    #[test]
    fn test_page_for_url_prefers_most_specific_glob() {
        let spec = AiAssistantSiteSpec::from_json_str(GROK_SPEC).unwrap();
        let (name, _) = spec.page_for_url("https://grok.com/c/abc-123").unwrap();
        assert_eq!(name, "chat");
        let (name, _) = spec.page_for_url("https://grok.com/").unwrap();
        assert_eq!(name, "landing");
        assert!(spec.page_for_url("https://chatgpt.com/").is_none());
    }

    #[test]
    fn test_invalid_glob_fails_validation() {
        let json = r#"{ "pages": { "landing": { "urlGlob": "https://x.com/a**" }, "chat": {} } }"#;
        let err = AiAssistantSiteSpec::from_json_str(json).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_roles() {
        let spec = AiAssistantSiteSpec::from_json_str(GROK_SPEC).unwrap();
        let missing = spec.page("landing").unwrap().elements.missing_roles();
        assert!(missing.contains(&PageElement::MessageBlocks));
        assert!(!missing.contains(&PageElement::LoginIndicator));
    }

    #[test]
    fn test_url_host() {
        assert_eq!(url_host("https://gemini.google.com/app/123"), "gemini.google.com");
        assert_eq!(url_host("https://grok.com?x=1"), "grok.com");
        assert_eq!(url_host("about:blank"), "");
        assert_eq!(url_host("https://grok.com:443/c/1"), "grok.com");
        assert_eq!(url_host("http://user:pw@localhost:9222/json"), "localhost");
        assert_eq!(url_host("http://[::1]:9222/json"), "[::1]");
    }

    #[test]
    fn test_generic_page_spec_regex_and_conversion() {
        let site: SiteSpec = serde_json::from_str(
            r##"{
                "inbox": {
                    "url": "https://mail.example.com/",
                    "urlMatch": ["^https://mail\\.example\\.com/inbox"],
                    "timeoutMs": 5000,
                    "elements": {
                        "loginIndicator": { "selector": "#avatar" },
                        "unreadCount": { "selector": ".badge" }
                    }
                }
            }"##,
        )
        .unwrap();

        let (name, page) = page_spec_for_url(&site, "https://mail.example.com/inbox/42").unwrap();
        assert_eq!(name, "inbox");
        assert!(page_spec_for_url(&site, "https://mail.example.com/sent").is_none());

        let assistant = AiAssistantPageSpec::from(page);
        assert!(assistant.element(PageElement::LoginIndicator).is_some());
        assert!(assistant.elements.extra.contains_key("unreadCount"));
    }
}
