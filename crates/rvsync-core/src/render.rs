//! Regeneration of the merged target file and the orphan file
//!
//! Records are emitted verbatim, each preceded by a blank-line separator, so
//! the output parses back with the same extractor.

use crate::error::{Error, Result};
use crate::sync::SyncResult;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, trace, warn};

/// Separator written before every record
pub const RECORD_SEPARATOR: &str = "\n\n";

/// Suffix of the merged target file
pub const MERGED_SUFFIX: &str = "new";
/// Suffix of the orphan file
pub const UNUSED_SUFFIX: &str = "unused";

const UTF8_BOM: &str = "\u{feff}";

/// Text payloads produced from a synchronization result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Merged target file, in source order
    pub merged: String,
    /// Orphan file content
    pub orphans: String,
    /// Records written to `merged`
    pub merged_count: usize,
    /// Slots in `merged` that carry source text
    pub fallback_count: usize,
    /// Records written to `orphans`
    pub orphan_count: usize,
}

impl Rendered {
    /// Check if there is anything to put in the orphan file
    pub fn has_orphans(&self) -> bool {
        self.orphan_count > 0
    }
}

/// Render a synchronization result into file payloads
pub fn render(result: &SyncResult<'_>) -> Rendered {
    let mut merged = String::new();
    let mut fallback_count = 0;

    for entry in &result.matched {
        merged.push_str(RECORD_SEPARATOR);
        match entry.target {
            Some(target) => {
                trace!("{}: target text", entry.key);
                merged.push_str(&target.raw_text);
            }
            None => {
                trace!("{}: source text", entry.key);
                merged.push_str(&entry.source.raw_text);
                fallback_count += 1;
            }
        }
    }

    let mut orphans = String::new();
    for record in &result.orphans {
        orphans.push_str(RECORD_SEPARATOR);
        orphans.push_str(&record.raw_text);
    }

    Rendered {
        merged,
        orphans,
        merged_count: result.matched.len(),
        fallback_count,
        orphan_count: result.orphans.len(),
    }
}

/// Files written for one target file
#[derive(Debug, Clone, Serialize)]
pub struct WrittenFiles {
    /// Path of the merged file
    pub merged: PathBuf,
    /// Path of the orphan file, when one was written
    pub unused: Option<PathBuf>,
    /// Orphan file left over from an earlier run, when none was written now
    pub stale_unused: Option<PathBuf>,
}

/// Write `<target>.new` and, if there are orphans, `<target>.unused`.
///
/// `bom` re-emits a UTF-8 byte-order mark at the start of each file.
pub fn write_outputs(target: &Path, rendered: &Rendered, bom: bool) -> Result<WrittenFiles> {
    let merged_path = sibling(target, MERGED_SUFFIX);
    info!("Writing new target file {}...", merged_path.display());
    write_atomic(&merged_path, &with_bom(&rendered.merged, bom))?;
    info!(
        "New target file written: {} entries ({} untranslated)",
        rendered.merged_count, rendered.fallback_count
    );

    let unused_path = sibling(target, UNUSED_SUFFIX);
    let (unused, stale_unused) = if rendered.has_orphans() {
        info!("Writing unused target file {}...", unused_path.display());
        write_atomic(&unused_path, &with_bom(&rendered.orphans, bom))?;
        info!("Unused target file written: {} entries", rendered.orphan_count);
        (Some(unused_path), None)
    } else if unused_path.exists() {
        warn!(
            "No unused target entries, but {} from an earlier run is still present",
            unused_path.display()
        );
        (None, Some(unused_path))
    } else {
        info!("No unused target entries");
        (None, None)
    };

    Ok(WrittenFiles {
        merged: merged_path,
        unused,
        stale_unused,
    })
}

/// Path of `path` with `.suffix` appended to its file name
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Write through a temporary file in the same directory, then rename.
///
/// The destination is either untouched or fully replaced.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = sibling(path, "tmp");

    if let Err(e) = fs::write(&tmp_path, content) {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::FileWrite {
            path: path.to_path_buf(),
            source: e,
        });
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::FileWrite {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

fn with_bom(content: &str, bom: bool) -> String {
    if bom {
        format!("{}{}", UTF8_BOM, content)
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::extract::{parse_str, FileSide, PatternSet};
    use crate::record::PayloadRole;
    use crate::sync::synchronize;
    use proptest::prelude::*;

    fn source(text: &str) -> Corpus {
        let patterns = PatternSet::rvtext(FileSide::Source).unwrap();
        parse_str(text, "ja.rvtext", &patterns, PayloadRole::Original).unwrap()
    }

    fn target(text: &str) -> Corpus {
        let patterns = PatternSet::rvtext(FileSide::Target).unwrap();
        parse_str(text, "en.rvtext", &patterns, PayloadRole::Translation).unwrap()
    }

    #[test]
    fn test_render_with_fallback() {
        let s = source("<<1>>\nHello\n\n<<2>>\nWorld");
        let t = target("<<1>>\nBonjour");
        let rendered = render(&synchronize(&s, &t));

        assert_eq!(rendered.merged, "\n\n<<1>>\nBonjour\n\n<<2>>\nWorld");
        assert_eq!(rendered.orphans, "");
        assert_eq!(rendered.fallback_count, 1);
        assert!(!rendered.has_orphans());
    }

    #[test]
    fn test_render_orphans() {
        let s = source("<<1>>\nHello");
        let t = target("<<9>>\nObsolete\n\n<<1>>\nBonjour");
        let rendered = render(&synchronize(&s, &t));

        assert_eq!(rendered.merged, "\n\n<<1>>\nBonjour");
        assert_eq!(rendered.orphans, "\n\n<<9>>\nObsolete");
        assert_eq!(rendered.orphan_count, 1);
    }

    #[test]
    fn test_render_empty_source() {
        let s = source("");
        let t = target("<<1>>\nX");
        let rendered = render(&synchronize(&s, &t));

        assert_eq!(rendered.merged, "");
        assert_eq!(rendered.merged_count, 0);
        assert_eq!(rendered.orphans, "\n\n<<1>>\nX");
    }

    #[test]
    fn test_translator_formatting_is_kept() {
        let s = source("<<1>>\nA");
        let t = target("<<1>>\n  spaced\r\n\ttabbed  ");
        let rendered = render(&synchronize(&s, &t));

        assert_eq!(rendered.merged, "\n\n<<1>>\n  spaced\r\n\ttabbed  ");
    }

    #[test]
    fn test_sibling_paths() {
        let p = Path::new("dir/ScriptTextEnglish.rvtext");
        assert_eq!(sibling(p, "new"), PathBuf::from("dir/ScriptTextEnglish.rvtext.new"));
        assert_eq!(sibling(p, "unused"), PathBuf::from("dir/ScriptTextEnglish.rvtext.unused"));
    }

    #[test]
    fn test_write_outputs_skips_unused_without_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let target_path = dir.path().join("en.rvtext");

        let s = source("<<1>>\nHello");
        let t = target("<<1>>\nBonjour");
        let written = write_outputs(&target_path, &render(&synchronize(&s, &t)), false).unwrap();

        assert_eq!(written.merged, dir.path().join("en.rvtext.new"));
        assert!(written.unused.is_none());
        assert!(written.stale_unused.is_none());
        assert!(!dir.path().join("en.rvtext.unused").exists());
        assert!(!dir.path().join("en.rvtext.new.tmp").exists());
        assert_eq!(fs::read_to_string(&written.merged).unwrap(), "\n\n<<1>>\nBonjour");
    }

    #[test]
    fn test_write_outputs_with_orphans_and_bom() {
        let dir = tempfile::tempdir().unwrap();
        let target_path = dir.path().join("en.rvtext");

        let s = source("<<1>>\nHello");
        let t = target("<<1>>\nBonjour\n\n<<2>>\nGone");
        let written = write_outputs(&target_path, &render(&synchronize(&s, &t)), true).unwrap();

        let unused = written.unused.unwrap();
        assert_eq!(fs::read_to_string(unused).unwrap(), "\u{feff}\n\n<<2>>\nGone");
        assert!(fs::read_to_string(&written.merged).unwrap().starts_with('\u{feff}'));
    }

    #[test]
    fn test_write_outputs_flags_stale_unused_file() {
        let dir = tempfile::tempdir().unwrap();
        let target_path = dir.path().join("en.rvtext");
        let unused_path = dir.path().join("en.rvtext.unused");
        fs::write(&unused_path, "\n\n<<7>>\nOld orphan").unwrap();

        let s = source("<<1>>\nHello");
        let t = target("<<1>>\nBonjour");
        let written = write_outputs(&target_path, &render(&synchronize(&s, &t)), false).unwrap();

        assert!(written.unused.is_none());
        assert_eq!(written.stale_unused, Some(unused_path.clone()));
        assert_eq!(fs::read_to_string(unused_path).unwrap(), "\n\n<<7>>\nOld orphan");
    }

    #[test]
    fn test_write_atomic_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.new");

        let err = write_atomic(&path, "x").unwrap_err();
        assert!(matches!(err, Error::FileWrite { .. }));
        assert!(!path.exists());
    }

    /// Body line: plain text, or text that looks like a header but follows
    /// another line
    fn arb_line() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-z][A-Za-z ]{0,8}",
            "<<[a-z0-9]{1,3}>>[a-z ]{0,4}",
        ]
    }

    /// Files with unique keys in any order, multi-line or header-only
    /// bodies, and LF or CRLF line endings
    fn arb_file() -> impl Strategy<Value = String> {
        let body = prop::option::weighted(0.8, prop::collection::vec(arb_line(), 1..4));
        let records = prop::collection::btree_map("[a-z0-9]{1,3}", body, 0..15)
            .prop_map(|m| m.into_iter().collect::<Vec<_>>())
            .prop_shuffle();
        (records, any::<bool>()).prop_map(|(records, crlf)| {
            let (eol, separator) = if crlf { ("\r\n", "\r\n\r\n") } else { ("\n", "\n\n") };
            records
                .into_iter()
                .map(|(key, lines)| match lines {
                    Some(lines) => format!("<<{}>>{}{}", key, eol, lines.join(eol)),
                    None => format!("<<{}>>", key),
                })
                .collect::<Vec<_>>()
                .join(separator)
        })
    }

    proptest! {
        #[test]
        fn rerendering_is_stable(s in arb_file(), t in arb_file()) {
            let s_corpus = source(&s);
            let t_corpus = target(&t);
            let first = synchronize(&s_corpus, &t_corpus);
            let rendered = render(&first);

            let merged_again = target(&rendered.merged);
            let second = synchronize(&s_corpus, &merged_again);

            let first_keys: Vec<&str> = first.matched.iter().map(|m| m.key).collect();
            let second_keys: Vec<&str> = second.matched.iter().map(|m| m.key).collect();
            prop_assert_eq!(&first_keys, &second_keys);
            prop_assert_eq!(merged_again.keys().collect::<Vec<_>>(), first_keys);
            prop_assert!(second.orphans.is_empty());
            prop_assert_eq!(render(&second).merged, rendered.merged);

            for (before, after) in first.matched.iter().zip(&second.matched) {
                let expected = before.target.unwrap_or(before.source);
                let reread = after.target.map(|r| r.raw_text.as_str());
                prop_assert_eq!(reread, Some(expected.raw_text.as_str()));
            }
        }

        #[test]
        fn extraction_keeps_every_record(t in arb_file()) {
            let corpus = target(&t);
            let headers = t
                .split(if t.contains('\r') { "\r\n\r\n" } else { "\n\n" })
                .filter(|chunk| !chunk.is_empty())
                .count();
            prop_assert_eq!(corpus.len(), headers);
        }
    }
}
