//! Selector coverage: how well a page spec binds against a page.

use chatscope_core::{AiAssistantPageSpec, Locatable, Locator, PageElement, Result};
use chatscope_extract::{resolve_detailed, Extracted, Extractor};
use serde::Serialize;
use tracing::debug;

const SAMPLE_LIMIT: usize = 3;

const LANDING_ROLES: &[PageElement] = &[
    PageElement::LoginIndicator,
    PageElement::NewChatButton,
    PageElement::RecentChatLinks,
    PageElement::MessageInputArea,
    PageElement::MessageSubmitButton,
];

const CHAT_ROLES: &[PageElement] = &[
    PageElement::LoginIndicator,
    PageElement::NewChatButton,
    PageElement::RecentChatLinks,
    PageElement::MessageInputArea,
    PageElement::MessageSubmitButton,
    PageElement::MessageBlocks,
];

/// Roles a page of this kind must bind. Unknown page kinds require nothing.
pub fn required_roles(page_role: &str) -> &'static [PageElement] {
    match page_role {
        "landing" => LANDING_ROLES,
        "chat" => CHAT_ROLES,
        _ => &[],
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementCoverage {
    pub name: String,
    /// Candidates in preference order.
    pub selector: Vec<String>,
    /// Index of the candidate that was bound.
    pub candidate: usize,
    pub count: usize,
    /// Trimmed text of the first few matches.
    pub samples: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Extracted>>,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub page: String,
    pub elements: Vec<ElementCoverage>,
    /// Required roles the page spec does not define at all.
    pub undefined: Vec<String>,
}

impl CoverageReport {
    /// Required elements that are undefined or matched nothing.
    pub fn failures(&self) -> Vec<&str> {
        self.undefined
            .iter()
            .map(String::as_str)
            .chain(
                self.elements
                    .iter()
                    .filter(|e| e.required && e.count == 0)
                    .map(|e| e.name.as_str()),
            )
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Resolve every element of `spec` against `page`, sampling text and
/// extracting record fields.
pub async fn inspect_page(
    page: &dyn Locatable,
    spec: &AiAssistantPageSpec,
    page_role: &str,
    extractor: &Extractor,
) -> Result<CoverageReport> {
    let root = Locator::page(page);
    let required = required_roles(page_role);
    let mut elements = Vec::new();

    for (name, def) in spec.elements.iter() {
        let resolution = resolve_detailed(&root, &def.selector).await?;

        let mut samples = Vec::new();
        for i in 0..resolution.count.min(SAMPLE_LIMIT) {
            let text = resolution.locator.nth(i).text_content().await?;
            samples.push(text.map(|t| t.trim().to_string()).unwrap_or_default());
        }

        let fields = if def.is_record() {
            Some(extractor.extract(&root, def).await?)
        } else {
            None
        };

        debug!("{}: '{}' matched {}", name, resolution.selector, resolution.count);
        elements.push(ElementCoverage {
            name: name.to_string(),
            selector: def.selector.candidates().map(str::to_string).collect(),
            candidate: resolution.candidate,
            count: resolution.count,
            samples,
            fields,
            required: PageElement::from_key(name).map_or(false, |role| required.contains(&role)),
        });
    }

    let undefined = required
        .iter()
        .filter(|role| spec.element(**role).is_none())
        .map(|role| role.key().to_string())
        .collect();

    Ok(CoverageReport {
        page: page_role.to_string(),
        elements,
        undefined,
    })
}
