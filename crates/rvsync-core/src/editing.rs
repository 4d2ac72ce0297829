//! Field-level accessors for an interactive editor
//!
//! A [`DomainMap`] pairs every source record with its translation and tracks,
//! per entry, the translation stored on disk and the one being edited. Nothing
//! here knows about rendering; editors subscribe to changes with listeners.
//!
//! Target spans that could not be parsed on load are carried along untouched
//! and written back on save.

use crate::error::{Error, RecordError, Result};
use crate::extract::{extract, FileSide, PatternSet, SpanError};
use crate::record::{PayloadRole, Record};
use crate::registry::{Domain, MapRegistry};
use crate::render::{write_atomic, RECORD_SEPARATOR};
use crate::sync::synchronize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Handle returned by [`TranslationEntry::add_listener`]
pub type ListenerId = usize;

type Listener = Box<dyn Fn(&str) + Send + Sync>;

/// One source entry and its editable translation
pub struct TranslationEntry {
    source: Record,
    target: Option<Record>,
    stored: String,
    current: String,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
}

impl fmt::Debug for TranslationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationEntry")
            .field("key", &self.source.key)
            .field("stored", &self.stored)
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TranslationEntry {
    /// Pair a source record with its translation record, if any
    pub fn new(source: Record, target: Option<Record>) -> Self {
        let stored = target.as_ref().map(|t| t.field.clone()).unwrap_or_default();
        Self {
            source,
            target,
            current: stored.clone(),
            stored,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Record key
    pub fn key(&self) -> &str {
        &self.source.key
    }

    /// Original-language text
    pub fn original_content(&self) -> &str {
        &self.source.field
    }

    /// Translation as last saved
    pub fn stored_translation(&self) -> &str {
        &self.stored
    }

    /// Translation being edited
    pub fn current_translation(&self) -> &str {
        &self.current
    }

    /// Check whether the target file had a record for this key
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Check if the current translation differs from the stored one
    pub fn is_modified(&self) -> bool {
        self.current != self.stored
    }

    /// Replace the current translation, notifying listeners on change
    pub fn set_current_translation(&mut self, translation: impl Into<String>) {
        let translation = translation.into();
        if translation != self.current {
            self.current = translation;
            self.notify();
        }
    }

    /// Make the current translation the stored one
    pub fn save_translation(&mut self) {
        self.stored = self.current.clone();
    }

    /// Drop edits and go back to the stored translation
    pub fn reset_translation(&mut self) {
        if self.is_modified() {
            self.current = self.stored.clone();
            self.notify();
        }
    }

    /// Register a callback receiving the new current translation
    pub fn add_listener(&mut self, listener: impl Fn(&str) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a callback; returns false for an unknown id
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Raw text of this entry for the target file, using the stored translation.
    ///
    /// An entry that was never translated keeps the source text.
    pub fn rebuild(&self) -> String {
        self.rebuild_with(&self.stored)
    }

    fn rebuild_with(&self, value: &str) -> String {
        match &self.target {
            Some(target) => target.rebuild_with_field(value),
            None if value.is_empty() => self.source.raw_text.clone(),
            None => self.source.rebuild_with_field(value),
        }
    }

    /// Check that the current translation reads back as this entry unchanged
    fn check_current(&self, patterns: &PatternSet) -> Result<()> {
        if !self.is_modified() || (self.target.is_none() && self.current.is_empty()) {
            return Ok(());
        }

        let text = self.rebuild_with(&self.current);
        let reason = match extract(&text, patterns, PayloadRole::Translation).as_slice() {
            [Ok(record)] if record.key == self.key() && record.field == self.current => {
                return Ok(());
            }
            [Ok(record)] if record.key == self.key() => {
                "leading or trailing line breaks would be lost".to_string()
            }
            [_] => "the record header would change".to_string(),
            spans => format!(
                "a blank line followed by a record marker would split it into {} records",
                spans.len()
            ),
        };
        Err(Error::UnsafeTranslation {
            key: self.key().to_string(),
            reason,
        })
    }

    fn notify(&self) {
        for (_, listener) in &self.listeners {
            listener(&self.current);
        }
    }
}

/// Every entry of one domain, in source order
#[derive(Debug)]
pub struct DomainMap {
    domain: Domain,
    target_path: PathBuf,
    target_bom: bool,
    entries: Vec<TranslationEntry>,
    index: HashMap<String, usize>,
    orphans: Vec<Record>,
    skipped: Vec<SpanError>,
    patterns: PatternSet,
}

impl DomainMap {
    /// Load a domain for editing.
    ///
    /// Unparsable records are left out of the entries but kept for saving.
    pub fn load(registry: &MapRegistry, domain: Domain) -> Result<Self> {
        let (_, target_path) = registry.resolve(domain)?;
        let corpora = registry.load_domain_lenient(domain)?;
        let result = synchronize(&corpora.source, &corpora.target);

        let entries: Vec<TranslationEntry> = result
            .matched
            .iter()
            .map(|m| TranslationEntry::new(m.source.clone(), m.target.cloned()))
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key().to_string(), i))
            .collect();
        let orphans: Vec<Record> = result.orphans.iter().map(|&r| r.clone()).collect();
        debug!(
            "{}: {} entries, {} obsolete translations, {} unparsable spans",
            domain,
            entries.len(),
            orphans.len(),
            corpora.target_skipped.len()
        );

        Ok(Self {
            domain,
            target_path,
            target_bom: corpora.target_bom,
            entries,
            index,
            orphans,
            skipped: corpora.target_skipped,
            patterns: registry.patterns(FileSide::Target).clone(),
        })
    }

    /// Domain of this map
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Target file the map saves to
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in source order
    pub fn entries(&self) -> &[TranslationEntry] {
        &self.entries
    }

    /// Entry by position
    pub fn entry(&self, index: usize) -> Option<&TranslationEntry> {
        self.entries.get(index)
    }

    /// Mutable entry by position
    pub fn entry_mut(&mut self, index: usize) -> Option<&mut TranslationEntry> {
        self.entries.get_mut(index)
    }

    /// Entry by key
    pub fn find(&self, key: &str) -> Option<&TranslationEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    /// Mutable entry by key
    pub fn find_mut(&mut self, key: &str) -> Option<&mut TranslationEntry> {
        match self.index.get(key) {
            Some(&i) => self.entries.get_mut(i),
            None => None,
        }
    }

    /// Target records with no source counterpart
    pub fn orphans(&self) -> &[Record] {
        &self.orphans
    }

    /// Target spans that could not be parsed, in file order
    pub fn skipped(&self) -> &[SpanError] {
        &self.skipped
    }

    /// Number of entries with unsaved edits
    pub fn modified_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_modified()).count()
    }

    /// Target file content built from stored translations.
    ///
    /// Entries come in source order; obsolete translations and unparsable
    /// spans are kept after them so that saving never drops text. Text found
    /// before the first record stays at the top.
    pub fn render_target(&self) -> String {
        self.render_with(TranslationEntry::stored_translation)
    }

    fn render_with<F>(&self, value: F) -> String
    where
        F: Fn(&TranslationEntry) -> &str,
    {
        let mut out = String::new();
        if self.target_bom {
            out.push('\u{feff}');
        }
        let (preamble, spans): (Vec<&SpanError>, Vec<&SpanError>) = self
            .skipped
            .iter()
            .partition(|span| span.error == RecordError::StrayText);
        for span in preamble {
            out.push_str(&span.raw_text);
        }
        for entry in &self.entries {
            out.push_str(RECORD_SEPARATOR);
            out.push_str(&entry.rebuild_with(value(entry)));
        }
        for record in &self.orphans {
            out.push_str(RECORD_SEPARATOR);
            out.push_str(&record.raw_text);
        }
        for span in spans {
            out.push_str(RECORD_SEPARATOR);
            out.push_str(&span.raw_text);
        }
        out
    }

    /// Check that every edited translation survives a save and reload
    pub fn validate(&self) -> Result<()> {
        self.entries
            .iter()
            .try_for_each(|entry| entry.check_current(&self.patterns))
    }

    /// Write every current translation to the target file, then commit them.
    ///
    /// On error nothing is committed and the edits stay pending.
    pub fn save_all(&mut self) -> Result<()> {
        self.validate()?;
        let modified = self.modified_count();
        let content = self.render_with(TranslationEntry::current_translation);
        write_atomic(&self.target_path, &content)?;

        for entry in &mut self.entries {
            entry.save_translation();
        }
        if !self.skipped.is_empty() {
            warn!(
                "{}: {} unparsable span(s) written back unchanged",
                self.domain,
                self.skipped.len()
            );
        }
        info!(
            "{}: saved {} ({} modified entries)",
            self.domain,
            self.target_path.display(),
            modified
        );
        Ok(())
    }

    /// Drop every unsaved edit
    pub fn reset_all(&mut self) {
        for entry in &mut self.entries {
            entry.reset_translation();
        }
    }
}
