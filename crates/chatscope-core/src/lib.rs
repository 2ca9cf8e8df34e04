//! chatscope core: selector specifications, the `Locatable` driver
//! capability, automator settings and the shared error type.

pub mod config;
pub mod error;
pub mod locator;
pub mod spec;

pub use config::AutomatorSettings;
pub use error::{Error, Result};
pub use locator::{Locatable, Locator, LocatorPath, LocatorStep, WaitState};
pub use spec::{
    AiAssistantPageSpec, AiAssistantSiteSpec, CssSelector, PageElement, PageElements, PageSpec,
    SelectorDef, SitePages, SiteSpec, StringOrList, UrlPatterns, page_spec_for_url,
    url_host, TEXT_CONTENT_ATTR,
};
