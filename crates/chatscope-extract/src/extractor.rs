//! Recursive field extraction.

use chatscope_core::{Error, Locator, Result, SelectorDef};
use futures::future::{BoxFuture, FutureExt};
use tracing::trace;

use crate::resolver::resolve;
use crate::value::{Extracted, Record};

/// Default bound on `SelectorDef` nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Walks a [`SelectorDef`] tree against a scope.
///
/// Every matched element yields one value: a record when the definition has
/// `fields`, a scalar otherwise. Elements are addressed by index and
/// re-queried on every read, so a page that mutates mid-extraction can shift
/// results. Extraction never touches the page.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    max_depth: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Extractor {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// One value per element matched by `def.selector` under `root`, in
    /// document order. No matches is an empty list.
    pub async fn extract(&self, root: &Locator<'_>, def: &SelectorDef) -> Result<Vec<Extracted>> {
        if def.depth() > self.max_depth {
            return Err(Error::DepthExceeded(self.max_depth));
        }
        extract_at(root, def).await
    }
}

/// [`Extractor::extract`] with the default depth limit.
pub async fn extract(root: &Locator<'_>, def: &SelectorDef) -> Result<Vec<Extracted>> {
    Extractor::default().extract(root, def).await
}

fn extract_at<'a, 'd: 'a>(
    root: &'a Locator<'d>,
    def: &'a SelectorDef,
) -> BoxFuture<'a, Result<Vec<Extracted>>> {
    async move {
        let scope = resolve(root, &def.selector).await?;
        let count = scope.count().await?;
        trace!("{} matched {} element(s)", scope, count);

        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            let element = scope.nth(i);
            let value = match &def.fields {
                Some(fields) => {
                    let mut record = Record::new();
                    for (name, sub) in fields {
                        let sub_values = extract_at(&element, sub).await?;
                        record.insert(name.clone(), sub_values);
                    }
                    Extracted::Record(record)
                }
                None => Extracted::Text(read_scalar(&element, def).await?),
            };
            values.push(value);
        }
        Ok(values)
    }
    .boxed()
}

async fn read_scalar(element: &Locator<'_>, def: &SelectorDef) -> Result<Option<String>> {
    match def.scalar_attr() {
        Some(attr) => element.attribute(attr).await,
        None => Ok(element
            .text_content()
            .await?
            .map(|text| text.trim().to_string())),
    }
}
