//! Bilingual synchronizer: matches a target corpus against its source by key

use crate::corpus::Corpus;
use crate::record::Record;
use serde::Serialize;
use tracing::trace;

/// One source slot and the translation found for it, if any
#[derive(Debug, Clone, Serialize)]
pub struct MatchedEntry<'a> {
    /// Record key
    pub key: &'a str,
    /// Record from the source corpus
    pub source: &'a Record,
    /// Record from the target corpus with the same key
    pub target: Option<&'a Record>,
}

impl MatchedEntry<'_> {
    /// Check if the slot has a translation record
    pub fn is_translated(&self) -> bool {
        self.target.is_some()
    }
}

/// Result of matching a target corpus against a source corpus
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult<'a> {
    /// Every source record, in source order, with its target counterpart
    pub matched: Vec<MatchedEntry<'a>>,
    /// Target records whose key is not in the source, in target order
    pub orphans: Vec<&'a Record>,
}

impl SyncResult<'_> {
    /// Number of source slots that have a target record
    pub fn translated_count(&self) -> usize {
        self.matched.iter().filter(|m| m.is_translated()).count()
    }

    /// Number of source slots that fall back to source text
    pub fn untranslated_count(&self) -> usize {
        self.matched.len() - self.translated_count()
    }

    /// Check if any target record lost its source counterpart
    pub fn has_orphans(&self) -> bool {
        !self.orphans.is_empty()
    }
}

/// Match `target` against `source` by key.
///
/// Output order follows the source corpus; the physical order of the target
/// file only matters for orphans.
pub fn synchronize<'a>(source: &'a Corpus, target: &'a Corpus) -> SyncResult<'a> {
    let matched: Vec<MatchedEntry<'a>> = source
        .in_order()
        .iter()
        .map(|record| {
            let found = target.get(&record.key);
            trace!(
                "{}: {}",
                record.key,
                if found.is_some() { "translated" } else { "source fallback" }
            );
            MatchedEntry {
                key: record.key.as_str(),
                source: record,
                target: found,
            }
        })
        .collect();

    let orphans: Vec<&'a Record> = target
        .in_order()
        .iter()
        .filter(|record| !source.contains(&record.key))
        .inspect(|record| trace!("{}: orphan", record.key))
        .collect();

    SyncResult { matched, orphans }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{parse_str, FileSide, PatternSet};
    use crate::record::PayloadRole;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn source(text: &str) -> Corpus {
        let patterns = PatternSet::rvtext(FileSide::Source).unwrap();
        parse_str(text, "ja.rvtext", &patterns, PayloadRole::Original).unwrap()
    }

    fn target(text: &str) -> Corpus {
        let patterns = PatternSet::rvtext(FileSide::Target).unwrap();
        parse_str(text, "en.rvtext", &patterns, PayloadRole::Translation).unwrap()
    }

    fn rvtext(entries: &[(String, String)]) -> String {
        entries
            .iter()
            .map(|(k, v)| format!("<<{}>>\n{}", k, v))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_missing_translation_falls_back() {
        let s = source("<<1>>\nHello\n\n<<2>>\nWorld");
        let t = target("<<1>>\nBonjour");
        let result = synchronize(&s, &t);

        assert_eq!(result.matched.len(), 2);
        assert_eq!(result.matched[0].key, "1");
        assert_eq!(result.matched[0].source.field, "Hello");
        assert_eq!(result.matched[0].target.unwrap().field, "Bonjour");
        assert_eq!(result.matched[1].key, "2");
        assert!(result.matched[1].target.is_none());
        assert!(result.orphans.is_empty());
        assert_eq!(result.translated_count(), 1);
        assert_eq!(result.untranslated_count(), 1);
    }

    #[test]
    fn test_obsolete_translation_is_orphan() {
        let s = source("<<1>>\nHello");
        let t = target("<<1>>\nBonjour\n\n<<9>>\nObsolete");
        let result = synchronize(&s, &t);

        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.orphans.len(), 1);
        assert_eq!(result.orphans[0].key, "9");
        assert_eq!(result.orphans[0].field, "Obsolete");
        assert!(result.has_orphans());
    }

    #[test]
    fn test_empty_source() {
        let s = source("");
        let t = target("<<1>>\nX");
        let result = synchronize(&s, &t);

        assert!(result.matched.is_empty());
        assert_eq!(result.orphans.len(), 1);
    }

    #[test]
    fn test_empty_target() {
        let s = source("<<1>>\nA\n\n<<2>>\nB");
        let t = target("");
        let result = synchronize(&s, &t);

        assert_eq!(result.matched.len(), 2);
        assert!(result.matched.iter().all(|m| m.target.is_none()));
        assert!(result.orphans.is_empty());
    }

    #[test]
    fn test_target_order_does_not_matter() {
        let s = source("<<a>>\n1\n\n<<b>>\n2\n\n<<c>>\n3");
        let t = target("<<z>>\nold\n\n<<c>>\nthree\n\n<<a>>\none\n\n<<y>>\nold2");
        let result = synchronize(&s, &t);

        let keys: Vec<&str> = result.matched.iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        let orphans: Vec<&str> = result.orphans.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(orphans, vec!["z", "y"]);
    }

    fn arb_entries() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec(("[a-z0-9]{1,4}", "[A-Za-z ]{0,12}"), 0..20).prop_map(|v| {
            let mut seen = HashSet::new();
            v.into_iter().filter(|(k, _)| seen.insert(k.clone())).collect()
        })
    }

    proptest! {
        #[test]
        fn matched_follows_source_order(s in arb_entries(), t in arb_entries()) {
            let s_corpus = source(&rvtext(&s));
            let t_corpus = target(&rvtext(&t));
            let result = synchronize(&s_corpus, &t_corpus);

            let keys: Vec<&str> = result.matched.iter().map(|m| m.key).collect();
            let expected: Vec<&str> = s_corpus.keys().collect();
            prop_assert_eq!(keys, expected);
        }

        #[test]
        fn every_target_key_lands_once(s in arb_entries(), t in arb_entries()) {
            let s_corpus = source(&rvtext(&s));
            let t_corpus = target(&rvtext(&t));
            let result = synchronize(&s_corpus, &t_corpus);

            let matched_targets: HashSet<&str> = result
                .matched
                .iter()
                .filter_map(|m| m.target.map(|r| r.key.as_str()))
                .collect();
            let orphans: HashSet<&str> = result.orphans.iter().map(|r| r.key.as_str()).collect();

            prop_assert!(matched_targets.is_disjoint(&orphans));
            prop_assert_eq!(matched_targets.len() + orphans.len(), t_corpus.len());
            for key in &orphans {
                prop_assert!(!s_corpus.contains(key));
            }
        }
    }
}
