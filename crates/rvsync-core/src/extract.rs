//! Record extractor for keyed, blank-line separated text files
//!
//! A file is a sequence of records. A record starts at a boundary marker that
//! sits at the start of the file or right after a blank line, and runs until
//! just before the next such marker. Trailing newlines between records are
//! separators and never belong to a record's raw text.

use crate::corpus::Corpus;
use crate::error::{Error, RecordError, Result};
use crate::record::{PayloadRole, Record};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Start of a `<<KEY>>` header line
pub const RVTEXT_BOUNDARY: &str = r"(?m)^<<";
/// Key between the header's `<<` and `>>`
pub const RVTEXT_KEY: &str = r"\A<<([^\n]*)>>";
/// Everything after the header line
pub const RVTEXT_BODY: &str = r"(?s)\A[^\n]*>>\r?\n(.*)\z";
/// Zero-width position right after the header's `>>`
pub const RVTEXT_ABSENT: &str = r"\A[^\n]*>>()";

const UTF8_BOM: &str = "\u{feff}";

/// Which file of a domain is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSide {
    /// Original-language file
    Source,
    /// Translated file
    Target,
}

impl FileSide {
    /// Role whose payload this side carries
    pub fn role(self) -> PayloadRole {
        match self {
            FileSide::Source => PayloadRole::Original,
            FileSide::Target => PayloadRole::Translation,
        }
    }
}

/// Compiled patterns driving the extraction of one file layout
#[derive(Debug, Clone)]
pub struct PatternSet {
    boundary: Regex,
    key: Regex,
    original: Regex,
    translation: Regex,
}

impl PatternSet {
    /// Compile a pattern set; each role is bound to its own payload pattern
    pub fn new(boundary: &str, key: &str, original: &str, translation: &str) -> Result<Self> {
        Ok(Self {
            boundary: Regex::new(boundary)?,
            key: Regex::new(key)?,
            original: Regex::new(original)?,
            translation: Regex::new(translation)?,
        })
    }

    /// Layout of an `.rvtext` file of the given side.
    ///
    /// A source file carries original content and no translation, a target
    /// file the other way round.
    pub fn rvtext(side: FileSide) -> Result<Self> {
        match side {
            FileSide::Source => Self::new(RVTEXT_BOUNDARY, RVTEXT_KEY, RVTEXT_BODY, RVTEXT_ABSENT),
            FileSide::Target => Self::new(RVTEXT_BOUNDARY, RVTEXT_KEY, RVTEXT_ABSENT, RVTEXT_BODY),
        }
    }

    /// Payload pattern bound to `role`
    pub fn payload(&self, role: PayloadRole) -> &Regex {
        match role {
            PayloadRole::Original => &self.original,
            PayloadRole::Translation => &self.translation,
        }
    }
}

/// A record span that failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanError {
    /// 1-based line where the span starts
    pub line: usize,
    /// What went wrong
    pub error: RecordError,
    /// Text of the span, separators excluded
    pub raw_text: String,
}

/// Outcome of extracting one span
pub type Extracted = std::result::Result<Record, SpanError>;

/// Raw file content with its byte-order mark split off
#[derive(Debug, Clone)]
pub struct TextFile {
    /// File path
    pub path: PathBuf,
    /// Content without BOM
    pub text: String,
    /// Whether the file started with a UTF-8 BOM
    pub bom: bool,
}

impl TextFile {
    /// Read a whole file, rejecting content that is not UTF-8
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let text = String::from_utf8(bytes).map_err(|e| Error::Encoding {
            path: path.to_path_buf(),
            offset: e.utf8_error().valid_up_to(),
        })?;
        Ok(Self::from_string(path, text))
    }

    /// Wrap in-memory content (useful for testing)
    pub fn from_string(path: impl Into<PathBuf>, text: String) -> Self {
        match text.strip_prefix(UTF8_BOM) {
            Some(rest) => Self {
                path: path.into(),
                text: rest.to_string(),
                bom: true,
            },
            None => Self {
                path: path.into(),
                text,
                bom: false,
            },
        }
    }
}

/// Extract every record span of `text`, in file order.
///
/// Each span yields either a record or the reason it could not be parsed;
/// callers decide whether a bad span is fatal.
pub fn extract(text: &str, patterns: &PatternSet, role: PayloadRole) -> Vec<Extracted> {
    let starts: Vec<usize> = patterns
        .boundary
        .find_iter(text)
        .map(|m| m.start())
        .filter(|&start| is_record_start(text, start))
        .collect();

    let mut out = Vec::with_capacity(starts.len() + 1);

    let preamble_end = starts.first().copied().unwrap_or(text.len());
    let preamble = &text[..preamble_end];
    if !preamble.trim().is_empty() {
        let leading = preamble.len() - preamble.trim_start_matches(['\n', '\r']).len();
        out.push(Err(SpanError {
            line: 1 + count_lines(&preamble[..leading]),
            error: RecordError::StrayText,
            raw_text: preamble.trim_matches(['\n', '\r']).to_string(),
        }));
    }

    let mut line = 1 + count_lines(&text[..preamble_end]);
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let chunk = &text[start..end];
        let span = chunk.trim_end_matches(['\n', '\r']);
        out.push(parse_span(span, line, patterns, role));
        line += count_lines(chunk);
    }

    out
}

/// Extract a file's records, failing on the first unparsable span
pub fn extract_strict(
    text: &str,
    patterns: &PatternSet,
    role: PayloadRole,
    path: &Path,
) -> Result<Vec<Record>> {
    extract(text, patterns, role)
        .into_iter()
        .map(|r| {
            r.map_err(|e| Error::Record {
                path: path.to_path_buf(),
                line: e.line,
                source: e.error,
            })
        })
        .collect()
}

/// Extract a file's records, logging and setting aside unparsable spans.
///
/// The skipped spans come back in file order so that a caller rewriting the
/// file can keep their text.
pub fn extract_lenient(
    text: &str,
    patterns: &PatternSet,
    role: PayloadRole,
    path: &Path,
) -> (Vec<Record>, Vec<SpanError>) {
    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for result in extract(text, patterns, role) {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("{}:{}: skipping record: {}", path.display(), e.line, e.error);
                skipped.push(e);
            }
        }
    }
    (records, skipped)
}

/// Parse a file into a corpus, strictly
pub fn parse_file<P: AsRef<Path>>(path: P, patterns: &PatternSet, role: PayloadRole) -> Result<Corpus> {
    let file = TextFile::read(path)?;
    let records = extract_strict(&file.text, patterns, role, &file.path)?;
    debug!("{}: {} {} records", file.path.display(), records.len(), role);
    Corpus::build(records, file.path)
}

/// Parse a file into a corpus, skipping bad records
pub fn parse_file_lenient<P: AsRef<Path>>(
    path: P,
    patterns: &PatternSet,
    role: PayloadRole,
) -> Result<Corpus> {
    let file = TextFile::read(path)?;
    let (records, _) = extract_lenient(&file.text, patterns, role, &file.path);
    Corpus::build(records, file.path)
}

/// Parse in-memory content into a corpus, strictly (useful for testing)
pub fn parse_str(
    content: &str,
    source_name: &str,
    patterns: &PatternSet,
    role: PayloadRole,
) -> Result<Corpus> {
    let path = PathBuf::from(source_name);
    let records = extract_strict(content, patterns, role, &path)?;
    Corpus::build(records, path)
}

fn parse_span(span: &str, line: usize, patterns: &PatternSet, role: PayloadRole) -> Extracted {
    let fail = |error| {
        Err(SpanError {
            line,
            error,
            raw_text: span.to_string(),
        })
    };

    let mut keys = patterns.key.captures_iter(span);
    let key = match (keys.next(), keys.count()) {
        (None, _) => return fail(RecordError::MissingKey),
        (Some(caps), 0) => caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str()),
        (Some(_), extra) => return fail(RecordError::AmbiguousKey(extra + 1)),
    };
    let key = match key {
        Some(k) if !k.is_empty() => k.to_string(),
        _ => return fail(RecordError::EmptyKey),
    };

    let (field, field_span) = match patterns.payload(role).captures(span) {
        Some(caps) => match caps.get(1).or_else(|| caps.get(0)) {
            Some(m) => (m.as_str().to_string(), Some(m.range())),
            None => (String::new(), None),
        },
        None => (String::new(), None),
    };

    Ok(Record {
        key,
        raw_text: span.to_string(),
        field,
        role,
        field_span,
        line,
    })
}

/// A marker opens a record only at file start or after a blank line
fn is_record_start(text: &str, start: usize) -> bool {
    let before = &text[..start];
    before.chars().all(|c| c == '\n' || c == '\r')
        || before.ends_with("\n\n")
        || before.ends_with("\n\r\n")
}

fn count_lines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}
