//! Record types for keyed text units

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Which payload a record's `field` holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadRole {
    /// Original-language text, read from the source file
    Original,
    /// Translated text, read from the target file
    Translation,
}

impl fmt::Display for PayloadRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadRole::Original => write!(f, "original"),
            PayloadRole::Translation => write!(f, "translation"),
        }
    }
}

impl std::str::FromStr for PayloadRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "original" | "source" => Ok(PayloadRole::Original),
            "translation" | "target" => Ok(PayloadRole::Translation),
            other => Err(format!("unknown payload role '{}'", other)),
        }
    }
}

/// One translatable unit extracted from a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique key within the corpus
    pub key: String,
    /// Exact text span the record was extracted from, separators excluded
    pub raw_text: String,
    /// Payload for `role`; empty when the payload region is absent
    pub field: String,
    /// Role the field was extracted for
    pub role: PayloadRole,
    /// Byte range of `field` inside `raw_text`, if the payload pattern matched
    pub field_span: Option<Range<usize>>,
    /// 1-based line of the record header in its file
    pub line: usize,
}

impl Record {
    /// Rebuild the raw text with `field` replaced by `value`.
    ///
    /// Everything outside the payload span (header, trailing layout) is kept
    /// byte for byte. A record without a span gets the value appended on its
    /// own line after the raw text.
    pub fn rebuild_with_field(&self, value: &str) -> String {
        match &self.field_span {
            Some(span) => {
                let mut out = String::with_capacity(self.raw_text.len() + value.len());
                out.push_str(&self.raw_text[..span.start]);
                out.push_str(value);
                out.push_str(&self.raw_text[span.end..]);
                out
            }
            None if value.is_empty() => self.raw_text.clone(),
            None => format!("{}\n{}", self.raw_text, value),
        }
    }
}
