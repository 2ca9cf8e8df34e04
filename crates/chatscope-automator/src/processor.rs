//! Site-specific reshaping of extracted message records.

use chatscope_extract::value::texts;
use chatscope_extract::{Extracted, Record};

use crate::types::{ChatMessage, ChatRecord};

/// Turns generic extraction records into what `get_messages` returns.
///
/// Pure data transformation: implementations never touch the page.
pub trait MessagePostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, records: Vec<Extracted>) -> Vec<ChatRecord>;
}

/// Returns records as extracted.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl MessagePostProcessor for PassThrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn process(&self, records: Vec<Extracted>) -> Vec<ChatRecord> {
        records.into_iter().map(ChatRecord::Raw).collect()
    }
}

/// Grok renders a turn as one block holding the user's message plus any
/// follow-ups and the assistant reply split over several paragraphs.
///
/// Each user part becomes its own message; the assistant parts are joined
/// into one message separated by blank lines. Parts are trimmed and empty
/// ones dropped. Blocks that are not records are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrokMessages;

pub const USER_FIELD: &str = "userMessage";
pub const ASSISTANT_FIELD: &str = "aiMessage";
pub const ASSISTANT_FIELD_ALT: &str = "assistantMessage";

impl GrokMessages {
    fn reshape(record: &Record, out: &mut Vec<ChatRecord>) {
        for part in parts(record.get(USER_FIELD)) {
            out.push(ChatRecord::Message(ChatMessage::user(part)));
        }

        let assistant = record
            .get(ASSISTANT_FIELD)
            .or_else(|| record.get(ASSISTANT_FIELD_ALT));
        let reply = parts(assistant);
        if !reply.is_empty() {
            out.push(ChatRecord::Message(ChatMessage::assistant(reply.join("\n\n"))));
        }
    }
}

impl MessagePostProcessor for GrokMessages {
    fn name(&self) -> &'static str {
        "grok"
    }

    fn process(&self, records: Vec<Extracted>) -> Vec<ChatRecord> {
        let mut out = Vec::new();
        for record in records.iter().filter_map(Extracted::as_record) {
            Self::reshape(record, &mut out);
        }
        out
    }
}

fn parts(values: Option<&Vec<Extracted>>) -> Vec<&str> {
    values
        .map(|v| texts(v).map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}
