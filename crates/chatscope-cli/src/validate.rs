//! Site spec validation report.

use std::path::Path;

use chatscope_core::AiAssistantSiteSpec;
use tracing::error;

#[derive(Debug)]
pub struct PageSummary {
    pub name: String,
    pub url_globs: Vec<String>,
    pub elements: Vec<String>,
    pub missing_roles: Vec<String>,
}

#[derive(Debug)]
pub struct ValidationReport {
    pub version: Option<String>,
    pub pages: Vec<PageSummary>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Load a site spec and summarize what each page defines.
pub fn validate(path: &Path) -> ValidationReport {
    let mut report = ValidationReport {
        version: None,
        pages: Vec::new(),
        errors: Vec::new(),
    };

    let spec = match AiAssistantSiteSpec::load(path) {
        Ok(spec) => spec,
        Err(e) => {
            error!("Failed to load {}: {}", path.display(), e);
            report.errors.push(format!("{}: {}", path.display(), e));
            return report;
        }
    };

    report.version = spec.version.clone();
    for (name, page) in spec.pages.iter() {
        report.pages.push(PageSummary {
            name: name.to_string(),
            url_globs: page
                .url_glob
                .as_ref()
                .map(|g| g.iter().map(str::to_string).collect())
                .unwrap_or_default(),
            elements: page.elements.iter().map(|(k, _)| k.to_string()).collect(),
            missing_roles: page
                .elements
                .missing_roles()
                .iter()
                .map(|r| r.key().to_string())
                .collect(),
        });
    }
    report
}

pub fn print_report(report: &ValidationReport) {
    println!("=== chatscope spec validation ===");
    println!();
    println!(
        "Version:  {}",
        report.version.as_deref().unwrap_or("unversioned")
    );

    for page in &report.pages {
        println!();
        println!("Page '{}'", page.name);
        if !page.url_globs.is_empty() {
            println!("  urlGlob:  {}", page.url_globs.join(", "));
        }
        println!("  elements: {}", page.elements.join(", "));
        if !page.missing_roles.is_empty() {
            println!("  missing:  {}", page.missing_roles.join(", "));
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("Errors:");
        for e in &report.errors {
            println!("  - {}", e);
        }
    }

    println!();
    println!(
        "Status: {}",
        if report.is_valid() { "VALID" } else { "INVALID" }
    );
}
