use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatscope_automator::{
    inspect_page, AutomatorSnapshot, ChatAutomator, CoverageReport, SiteVariant,
};
use chatscope_cdp::CdpPage;
use chatscope_core::{AiAssistantSiteSpec, AutomatorSettings};
use chatscope_extract::Extractor;
use chatscope_fixture::Fixture;
use serde::Serialize;
use tracing::{info, warn};

/// Snapshot of one fixture plus how it compares to the recorded extraction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOutput {
    pub fixture: String,
    pub url: String,
    pub page: String,
    pub snapshot: AutomatorSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches_expected: Option<bool>,
}

fn load_site(path: &Path) -> Result<AiAssistantSiteSpec> {
    AiAssistantSiteSpec::load(path).with_context(|| format!("loading {}", path.display()))
}

fn load_fixture(dir: &Path) -> Result<Fixture> {
    Fixture::load(dir).with_context(|| format!("loading fixture {}", dir.display()))
}

pub async fn extract(spec_path: &Path, fixture_dir: &Path, page: Option<&str>) -> Result<ExtractOutput> {
    let site = load_site(spec_path)?;
    let fixture = load_fixture(fixture_dir)?;
    let role = page.unwrap_or_else(|| fixture.page_role());
    let settings = AutomatorSettings::from_env();

    let html = fixture.page().with_poll_interval(settings.poll_interval());
    let automator = ChatAutomator::for_site(Arc::new(html), &site, role)?
        .with_variant(SiteVariant::from_url(&fixture.metadata.url))
        .with_settings(settings);
    info!(
        "Extracting {} as '{}' page ({})",
        fixture.name,
        role,
        automator.variant()
    );

    let snapshot = automator.snapshot().await;
    let matches_expected = match (&fixture.expected_messages, &snapshot.get_messages.result) {
        (Some(expected), Some(list)) => {
            let actual = serde_json::to_value(&list.messages)?;
            let same = &actual == expected;
            if !same {
                warn!("{}: messages differ from extraction.result.json", fixture.name);
            }
            Some(same)
        }
        (Some(_), None) => Some(false),
        (None, _) => None,
    };

    Ok(ExtractOutput {
        fixture: fixture.name.clone(),
        url: fixture.metadata.url.clone(),
        page: role.to_string(),
        snapshot,
        matches_expected,
    })
}

pub async fn inspect(spec_path: &Path, fixture_dir: &Path, page: Option<&str>) -> Result<CoverageReport> {
    let site = load_site(spec_path)?;
    let fixture = load_fixture(fixture_dir)?;
    let role = page.unwrap_or_else(|| fixture.page_role());
    let spec = site
        .page(role)
        .with_context(|| format!("site spec has no '{role}' page"))?;

    let settings = AutomatorSettings::from_env();
    let html = fixture.page();
    let report = inspect_page(
        &html,
        spec,
        role,
        &Extractor::new(settings.max_extract_depth),
    )
    .await?;
    Ok(report)
}

pub async fn live(spec_path: &Path, ws_url: &str, page: Option<&str>) -> Result<AutomatorSnapshot> {
    let site = load_site(spec_path)?;
    let settings = AutomatorSettings::from_env();
    let cdp = CdpPage::connect(ws_url)
        .await?
        .with_poll_interval(settings.poll_interval());
    let url = cdp.url().await?;
    info!("Attached to {}", url);

    let cdp = Arc::new(cdp);
    let automator = match page {
        Some(role) => ChatAutomator::for_site(cdp, &site, role)?
            .with_variant(SiteVariant::from_url(&url)),
        None => ChatAutomator::for_url(cdp, &site, &url)?,
    };
    Ok(automator.with_settings(settings).snapshot().await)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `true` unless the comparison ran and failed.
pub fn extraction_ok(output: &ExtractOutput) -> bool {
    output.matches_expected != Some(false)
}
