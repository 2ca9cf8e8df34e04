//! Fallback selector resolution.
//!
//! Candidates are tried in order against the scope; the first with at least
//! one match is bound. When none match the first candidate is bound anyway,
//! so the failure surfaces at whatever the caller does next (a wait, a
//! click) with that selector in the message.

use chatscope_core::{CssSelector, Locator, Result};
use tracing::debug;

/// Outcome of resolving a [`CssSelector`] under a scope.
#[derive(Debug, Clone)]
pub struct Resolution<'d> {
    pub locator: Locator<'d>,
    /// Index of the bound candidate in preference order.
    pub candidate: usize,
    pub selector: String,
    /// Match count observed when the candidate was bound.
    pub count: usize,
}

impl Resolution<'_> {
    pub fn matched(&self) -> bool {
        self.count > 0
    }

    pub fn used_fallback(&self) -> bool {
        self.candidate > 0 && self.matched()
    }
}

/// Resolve `selector` under `root` and report which candidate was bound.
pub async fn resolve_detailed<'d>(
    root: &Locator<'d>,
    selector: &CssSelector,
) -> Result<Resolution<'d>> {
    for (i, candidate) in selector.candidates().enumerate() {
        let locator = root.locator(candidate);
        let count = locator.count().await?;
        if count > 0 {
            if i > 0 {
                debug!("Selector '{}' bound fallback #{} '{}'", selector.primary(), i, candidate);
            }
            return Ok(Resolution {
                locator,
                candidate: i,
                selector: candidate.to_string(),
                count,
            });
        }
    }

    debug!("No candidate of '{}' matched under {}", selector, root);
    Ok(Resolution {
        locator: root.locator(selector.primary()),
        candidate: 0,
        selector: selector.primary().to_string(),
        count: 0,
    })
}

/// Resolve `selector` under `root` to a scope. Never fails for lack of
/// matches; driver errors while counting propagate.
pub async fn resolve<'d>(root: &Locator<'d>, selector: &CssSelector) -> Result<Locator<'d>> {
    Ok(resolve_detailed(root, selector).await?.locator)
}
