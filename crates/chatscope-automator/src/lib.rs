//! Chat automator: login detection, message send, response wait and
//! message reads against one AI assistant page spec.
//!
//! Site differences live in [`MessagePostProcessor`] strategies chosen by
//! [`SiteVariant`]; the automation sequence itself is shared.

pub mod automator;
pub mod coverage;
pub mod processor;
pub mod types;

pub use automator::{AiChatAutomator, ChatAutomator};
pub use coverage::{inspect_page, CoverageReport, ElementCoverage};
pub use processor::{GrokMessages, MessagePostProcessor, PassThrough};
pub use types::*;
