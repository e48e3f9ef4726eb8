//! Incremental structured-output extraction.
//!
//! The model emits one JSON object as a stream of UTF-8 fragments whose
//! boundaries carry no alignment guarantee. [`StreamExtractor`] accumulates
//! the fragments and surfaces each interesting top-level field the instant it
//! becomes syntactically complete, long before the full object is known.
//!
//! Matching is principled rather than pattern-based: string values are found
//! with a quote-aware scan that honors escapes, object/array values with a
//! balanced-delimiter scan that is itself string-aware, so nested braces and
//! embedded quotes cannot derail it. Extraction never fails — an unmatched or
//! unparseable field is simply not available yet and is retried on the next
//! feed.

use serde_json::Value;

/// The top-level fields the loop cares about, in extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Tool,
    TargetUser,
    Reply,
    Attachments,
    UnknownFact,
    Summary,
}

impl Field {
    const ALL: [Field; 6] = [
        Field::Tool,
        Field::TargetUser,
        Field::Reply,
        Field::Attachments,
        Field::UnknownFact,
        Field::Summary,
    ];

    /// The JSON key this field is extracted from.
    pub fn key(&self) -> &'static str {
        match self {
            Field::Tool => "tool",
            Field::TargetUser => "target_user",
            Field::Reply => "reply",
            Field::Attachments => "attachments",
            Field::UnknownFact => "unknown_fact",
            Field::Summary => "summary",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|f| f == self).expect("field is in ALL")
    }
}

/// Stateful extractor over an append-only token stream.
///
/// Each field is emitted **at most once per turn**: once surfaced, later
/// re-matches (including model-repeated keys) are suppressed, so downstream
/// handling stays idempotent even though the buffer keeps growing. The
/// leftmost occurrence of a key always wins.
#[derive(Debug, Default)]
pub struct StreamExtractor {
    buffer: String,
    emitted: [bool; 6],
}

impl StreamExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every field that just became complete, in
    /// extraction order. Never errors: malformed or incomplete JSON means
    /// "not yet available".
    pub fn feed(&mut self, chunk: &str) -> Vec<(Field, Value)> {
        self.buffer.push_str(chunk);

        let mut completed = Vec::new();
        for field in Field::ALL {
            if self.emitted[field.index()] {
                continue;
            }
            if let Some(value) = extract_field(&self.buffer, field.key()) {
                self.emitted[field.index()] = true;
                completed.push((field, value));
            }
        }
        completed
    }

    /// The raw text accumulated so far.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Clear the buffer and emitted markers for the next turn.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.emitted = [false; 6];
    }
}

/// Try to extract the value of `key` from the buffer. Returns `None` when the
/// key has not appeared, its value has not closed yet, or the closed span
/// does not parse as JSON.
fn extract_field(buffer: &str, key: &str) -> Option<Value> {
    let needle = format!("\"{key}\"");
    let key_at = buffer.find(&needle)?;
    let after_key = &buffer[key_at + needle.len()..];

    // Skip whitespace up to the colon.
    let mut rest = after_key.trim_start();
    rest = rest.strip_prefix(':')?;
    let rest = rest.trim_start();

    let first = rest.chars().next()?;
    let span_len = match first {
        '"' => scan_string(rest)?,
        '{' | '[' => scan_balanced(rest)?,
        'n' => {
            // Either a partial "null" (not yet available) or some other
            // token that will never parse; both wait.
            if !rest.starts_with("null") {
                return None;
            }
            4
        }
        _ => return None,
    };

    serde_json::from_str(&rest[..span_len]).ok()
}

/// Length in bytes of a complete JSON string literal at the start of `s`
/// (opening and closing quotes included), honoring `\"` and `\\` escapes.
fn scan_string(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// Length in bytes of a balanced object/array at the start of `s`. String
/// contents are skipped, so braces inside values do not count toward depth.
fn scan_balanced(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
