//! Chat automator over one AI assistant page spec.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatscope_core::{
    AiAssistantPageSpec, AiAssistantSiteSpec, AutomatorSettings, Error, Locatable, Locator,
    PageElement, Result, SelectorDef, WaitState,
};
use chatscope_extract::{resolve, Extracted, Extractor};
use tracing::{debug, info, warn};

use crate::processor::MessagePostProcessor;
use crate::types::{AutomatorSnapshot, ChatRecord, ChatState, MessageList, Probe, SiteVariant};

/// Uniform chat operations, whatever the site.
///
/// Calls are issued one at a time by a single caller; concurrent calls on
/// the same page are unsupported.
#[async_trait]
pub trait AiChatAutomator: Send + Sync {
    /// Whether the login indicator currently matches. `false` when the page
    /// spec has none.
    async fn check_login_status(&self) -> Result<bool>;

    /// Wait until the login indicator is visible. `None` uses the
    /// configured login timeout.
    async fn wait_for_login(&self, timeout: Option<Duration>) -> Result<()>;

    async fn start_new_chat(&self) -> Result<()>;

    /// Activate the recent chat at `index`, or the first one.
    async fn open_chat(&self, index: Option<usize>) -> Result<()>;

    async fn send_message(&self, text: &str) -> Result<()>;

    /// Wait for the generating indicator to detach. Best effort: returns
    /// `Ok` on timeout and when no indicator is configured.
    async fn wait_for_response(&self, timeout: Option<Duration>) -> Result<()>;

    async fn get_messages(&self) -> Result<Vec<ChatRecord>>;

    async fn get_chat_state(&self) -> Result<ChatState>;
}

/// The shared automator. Holds no state besides configuration; every call
/// re-resolves selectors against the live page.
pub struct ChatAutomator {
    page: Arc<dyn Locatable>,
    spec: AiAssistantPageSpec,
    variant: SiteVariant,
    processor: Arc<dyn MessagePostProcessor>,
    settings: AutomatorSettings,
}

impl ChatAutomator {
    pub fn new(page: Arc<dyn Locatable>, spec: AiAssistantPageSpec) -> Self {
        let variant = SiteVariant::Generic;
        Self {
            page,
            spec,
            variant,
            processor: variant.processor(),
            settings: AutomatorSettings::default(),
        }
    }

    /// Automator for the page named `page_role` (`landing`, `chat`, ...).
    pub fn for_site(
        page: Arc<dyn Locatable>,
        site: &AiAssistantSiteSpec,
        page_role: &str,
    ) -> Result<Self> {
        let spec = site
            .page(page_role)
            .ok_or_else(|| Error::Spec(format!("site spec has no '{page_role}' page")))?;
        Ok(Self::new(page, spec.clone()))
    }

    /// Automator for the page whose `urlGlob` matches `url`, with the site
    /// variant detected from its host.
    pub fn for_url(page: Arc<dyn Locatable>, site: &AiAssistantSiteSpec, url: &str) -> Result<Self> {
        let (role, spec) = site
            .page_for_url(url)
            .ok_or_else(|| Error::Spec(format!("no page urlGlob matches {url}")))?;
        let variant = SiteVariant::from_url(url);
        info!("Using '{}' page spec for {} ({})", role, url, variant);
        Ok(Self::new(page, spec.clone()).with_variant(variant))
    }

    /// Switch variant; also installs the variant's post-processor.
    pub fn with_variant(mut self, variant: SiteVariant) -> Self {
        self.variant = variant;
        self.processor = variant.processor();
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn MessagePostProcessor>) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_settings(mut self, settings: AutomatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn spec(&self) -> &AiAssistantPageSpec {
        &self.spec
    }

    pub fn variant(&self) -> SiteVariant {
        self.variant
    }

    pub fn settings(&self) -> &AutomatorSettings {
        &self.settings
    }

    fn root(&self) -> Locator<'_> {
        Locator::page(self.page.as_ref())
    }

    fn extractor(&self) -> Extractor {
        Extractor::new(self.settings.max_extract_depth)
    }

    fn require(&self, role: PageElement) -> Result<&SelectorDef> {
        self.spec.element(role).ok_or_else(|| Error::missing(role.key()))
    }

    async fn locate(&self, def: &SelectorDef) -> Result<Locator<'_>> {
        let root = self.root();
        resolve(&root, &def.selector).await
    }

    /// Message records before site post-processing.
    pub async fn get_raw_messages(&self) -> Result<Vec<Extracted>> {
        let Some(def) = self.spec.element(PageElement::MessageBlocks) else {
            return Ok(Vec::new());
        };
        self.extractor().extract(&self.root(), def).await
    }

    /// Extract any named element, including extras outside the core roles.
    pub async fn extract_element(&self, name: &str) -> Result<Vec<Extracted>> {
        let def = self
            .spec
            .elements
            .get(name)
            .ok_or_else(|| Error::missing(name))?;
        self.extractor().extract(&self.root(), def).await
    }

    /// Run the read-only calls and record each outcome.
    pub async fn snapshot(&self) -> AutomatorSnapshot {
        let check_login_status = Probe::from_result(self.check_login_status().await);
        let get_chat_state = Probe::from_result(self.get_chat_state().await);
        let get_messages = Probe::from_result(self.get_messages().await.map(|messages| {
            MessageList {
                count: messages.len(),
                messages,
            }
        }));
        AutomatorSnapshot {
            site: self.variant,
            check_login_status,
            get_chat_state,
            get_messages,
        }
    }
}

#[async_trait]
impl AiChatAutomator for ChatAutomator {
    async fn check_login_status(&self) -> Result<bool> {
        let Some(def) = self.spec.element(PageElement::LoginIndicator) else {
            return Ok(false);
        };
        Ok(self.locate(def).await?.count().await? > 0)
    }

    async fn wait_for_login(&self, timeout: Option<Duration>) -> Result<()> {
        let def = self.require(PageElement::LoginIndicator)?;
        let timeout = timeout.unwrap_or_else(|| self.settings.login_timeout());
        info!("Waiting for user to log in (timeout: {:?})", timeout);
        self.locate(def)
            .await?
            .wait_for(WaitState::Visible, timeout)
            .await?;
        info!("Login detected");
        Ok(())
    }

    async fn start_new_chat(&self) -> Result<()> {
        let def = self.require(PageElement::NewChatButton)?;
        self.locate(def).await?.click().await?;
        debug!("Started new chat");
        Ok(())
    }

    async fn open_chat(&self, index: Option<usize>) -> Result<()> {
        let def = self.require(PageElement::RecentChatLinks)?;
        let index = index.unwrap_or(0);
        self.locate(def).await?.nth(index).click().await?;
        debug!("Opened recent chat #{}", index);
        Ok(())
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let input = self.require(PageElement::MessageInputArea)?;
        let submit = self.require(PageElement::MessageSubmitButton)?;

        self.locate(input).await?.fill(text).await?;
        self.locate(submit).await?.click().await?;
        debug!("Sent message ({} chars)", text.chars().count());
        Ok(())
    }

    async fn wait_for_response(&self, timeout: Option<Duration>) -> Result<()> {
        let Some(def) = self.spec.element(PageElement::AiGeneratingIndicator) else {
            return Ok(());
        };
        let timeout = timeout.unwrap_or_else(|| self.settings.response_timeout());
        let indicator = self.locate(def).await?;
        match indicator.wait_for(WaitState::Detached, timeout).await {
            Ok(()) => Ok(()),
            Err(e @ Error::Timeout { .. }) => {
                debug!("Generating indicator still present, continuing: {}", e);
                Ok(())
            }
            Err(e) => {
                warn!("Waiting for response failed, continuing: {}", e);
                Ok(())
            }
        }
    }

    async fn get_messages(&self) -> Result<Vec<ChatRecord>> {
        let records = self.get_raw_messages().await?;
        Ok(self.processor.process(records))
    }

    async fn get_chat_state(&self) -> Result<ChatState> {
        let Some(def) = self.spec.element(PageElement::AiGeneratingIndicator) else {
            return Ok(ChatState::Idle);
        };
        let count = self.locate(def).await?.count().await?;
        Ok(if count > 0 {
            ChatState::Generating
        } else {
            ChatState::Idle
        })
    }
}
