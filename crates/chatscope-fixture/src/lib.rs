//! Offline page fixtures.
//!
//! [`HtmlPage`] implements [`chatscope_core::Locatable`] over a static HTML
//! document, with an overlay that records clicks and fills. [`Fixture`]
//! loads recorded pages (`metadata.json` + `source.html`) from disk.

pub mod fixture;
pub mod page;

pub use fixture::{Fixture, FixtureMetadata, Viewport};
pub use page::{HtmlPage, Interaction};
