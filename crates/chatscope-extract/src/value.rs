//! Extraction output values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field name → one value per matched element.
pub type Record = BTreeMap<String, Vec<Extracted>>;

/// A value read from one matched element.
///
/// Serializes as JSON `null`, a string, or an object of arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Extracted {
    Text(Option<String>),
    Record(Record),
}

impl Extracted {
    pub fn text(s: impl Into<String>) -> Self {
        Extracted::Text(Some(s.into()))
    }

    pub fn null() -> Self {
        Extracted::Text(None)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Extracted::Text(t) => t.as_deref(),
            Extracted::Record(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Extracted::Record(r) => Some(r),
            Extracted::Text(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Extracted::Text(None))
    }
}

impl From<&str> for Extracted {
    fn from(s: &str) -> Self {
        Extracted::text(s)
    }
}

impl From<Option<String>> for Extracted {
    fn from(s: Option<String>) -> Self {
        Extracted::Text(s)
    }
}

/// The non-null strings of a value list, in order. Records contribute
/// nothing.
pub fn texts(values: &[Extracted]) -> impl Iterator<Item = &str> + '_ {
    values.iter().filter_map(Extracted::as_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let mut record = Record::new();
        record.insert("title".into(), vec![Extracted::text("Hi"), Extracted::null()]);
        let values = vec![Extracted::Record(record)];

        let json = serde_json::to_value(&values).unwrap();
        assert_eq!(json, serde_json::json!([{ "title": ["Hi", null] }]));

        let back: Vec<Extracted> = serde_json::from_value(json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_texts_skips_nulls_and_records() {
        let values = vec![
            Extracted::text("a"),
            Extracted::null(),
            Extracted::Record(Record::new()),
            Extracted::text("b"),
        ];
        assert_eq!(texts(&values).collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
