//! Resolution of fallback selector lists and recursive field extraction
//! over any [`chatscope_core::Locatable`].

pub mod extractor;
pub mod resolver;
pub mod value;

pub use extractor::{extract, Extractor};
pub use resolver::{resolve, resolve_detailed, Resolution};
pub use value::{Extracted, Record};
