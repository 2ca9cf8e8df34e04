//! Recorded page fixtures.
//!
//! A fixture directory holds `metadata.json`, `source.html` and, once a run
//! has been accepted, `extraction.result.json` with the expected messages.

use std::path::{Path, PathBuf};

use chatscope_core::{url_host, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::page::HtmlPage;

pub const METADATA_FILE: &str = "metadata.json";
pub const SOURCE_FILE: &str = "source.html";
pub const EXTRACTION_FILE: &str = "extraction.result.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Page state captured alongside the HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureMetadata {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Fixture {
    pub name: String,
    pub dir: PathBuf,
    pub metadata: FixtureMetadata,
    pub source: String,
    /// `messages` of `extraction.result.json`, when present.
    pub expected_messages: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ExtractionResult {
    messages: serde_json::Value,
}

impl Fixture {
    pub fn load(dir: &Path) -> Result<Self> {
        let metadata: FixtureMetadata =
            serde_json::from_str(&std::fs::read_to_string(dir.join(METADATA_FILE))?)?;
        let source = std::fs::read_to_string(dir.join(SOURCE_FILE))?;

        let extraction_path = dir.join(EXTRACTION_FILE);
        let expected_messages = if extraction_path.exists() {
            let result: ExtractionResult =
                serde_json::from_str(&std::fs::read_to_string(&extraction_path)?)?;
            Some(result.messages)
        } else {
            None
        };

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!("Loaded fixture {} ({})", name, metadata.url);

        Ok(Self {
            name,
            dir: dir.to_path_buf(),
            metadata,
            source,
            expected_messages,
        })
    }

    /// Every fixture directly under `root`, sorted by name. Directories
    /// without `metadata.json` are skipped; unreadable fixtures are logged
    /// and skipped.
    pub fn discover(root: &Path) -> Result<Vec<Self>> {
        let mut fixtures = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let path = entry?.path();
            if !path.is_dir() || !path.join(METADATA_FILE).exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(fixture) => fixtures.push(fixture),
                Err(e) => warn!("Skipping fixture {}: {}", path.display(), e),
            }
        }
        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Host of the recorded URL without `www.`, e.g. `grok.com`.
    pub fn domain(&self) -> &str {
        let host = url_host(&self.metadata.url);
        host.strip_prefix("www.").unwrap_or(host)
    }

    /// `chat` for conversation URLs (`/c/...`), `landing` otherwise.
    pub fn page_role(&self) -> &'static str {
        if self.metadata.url.contains("/c/") {
            "chat"
        } else {
            "landing"
        }
    }

    /// A static page serving this fixture's HTML at its recorded URL.
    pub fn page(&self) -> HtmlPage {
        HtmlPage::new(self.source.clone()).with_url(self.metadata.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(root: &Path, name: &str, url: &str, with_result: bool) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(METADATA_FILE),
            serde_json::json!({
                "url": url,
                "title": "Grok",
                "timestamp": "2025-11-04T10:15:00.000Z",
                "viewport": { "width": 1280, "height": 720 },
                "userAgent": "Mozilla/5.0"
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(dir.join(SOURCE_FILE), "<html><body><p>hi</p></body></html>").unwrap();
        if with_result {
            std::fs::write(
                dir.join(EXTRACTION_FILE),
                r#"{"messages": [{"role": "user", "content": "hi", "timestamp": null}]}"#,
            )
            .unwrap();
        }
        dir
    }

    #[test]
    fn test_load_fixture() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_fixture(root.path(), "2025-11-04-grok.com", "https://grok.com/c/abc", true);

        let fixture = Fixture::load(&dir).unwrap();
        assert_eq!(fixture.name, "2025-11-04-grok.com");
        assert_eq!(fixture.domain(), "grok.com");
        assert_eq!(fixture.page_role(), "chat");
        assert_eq!(fixture.metadata.viewport, Some(Viewport { width: 1280, height: 720 }));
        assert!(fixture.metadata.timestamp.is_some());
        assert_eq!(fixture.expected_messages.as_ref().unwrap().as_array().unwrap().len(), 1);
        assert_eq!(fixture.page().url(), "https://grok.com/c/abc");
    }

    #[test]
    fn test_discover_skips_non_fixtures() {
        let root = tempfile::tempdir().unwrap();
        write_fixture(root.path(), "b-chatgpt", "https://chatgpt.com/", false);
        write_fixture(root.path(), "a-grok", "https://grok.com/", false);
        std::fs::create_dir_all(root.path().join("notes")).unwrap();
        std::fs::write(root.path().join("README.md"), "fixtures").unwrap();

        let fixtures = Fixture::discover(root.path()).unwrap();
        let names: Vec<&str> = fixtures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a-grok", "b-chatgpt"]);
        assert_eq!(fixtures[0].page_role(), "landing");
        assert!(fixtures[0].expected_messages.is_none());
    }

    #[test]
    fn test_domain_drops_www_and_port() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_fixture(root.path(), "www-chatgpt", "https://www.chatgpt.com:443/c/1", false);
        let fixture = Fixture::load(&dir).unwrap();
        assert_eq!(fixture.domain(), "chatgpt.com");
        assert_eq!(fixture.page_role(), "chat");
    }
}
