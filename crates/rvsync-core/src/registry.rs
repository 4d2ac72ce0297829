//! Map registry: binds each text domain to its source/target file pair

use crate::config::ProjectConfig;
use crate::corpus::Corpus;
use crate::error::{Error, Result};
use crate::extract::{extract_lenient, extract_strict, FileSide, PatternSet, SpanError, TextFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;
use walkdir::WalkDir;

/// File extension of record files
pub const RVTEXT_EXTENSION: &str = "rvtext";

/// Category of game text stored in one file pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Domain {
    /// Database text (items, skills, ...)
    Database,
    /// Map and event dialogues
    Dialogues,
    /// Text embedded in scripts
    ScriptText,
}

impl Domain {
    /// Every domain, in declaration order
    pub const ALL: [Domain; 3] = [Domain::Database, Domain::Dialogues, Domain::ScriptText];

    /// Canonical upper-case name
    pub fn name(self) -> &'static str {
        match self {
            Domain::Database => "DATABASE",
            Domain::Dialogues => "DIALOGUES",
            Domain::ScriptText => "SCRIPT_TEXT",
        }
    }

    /// Default file names, relative to the project directory
    pub fn default_files(self) -> DomainFiles {
        let stem = match self {
            Domain::Database => "DatabaseText",
            Domain::Dialogues => "Dialogues",
            Domain::ScriptText => "ScriptText",
        };
        DomainFiles {
            source: PathBuf::from(format!("{}Japanese.{}", stem, RVTEXT_EXTENSION)),
            target: PathBuf::from(format!("{}English.{}", stem, RVTEXT_EXTENSION)),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Domain::ALL
            .into_iter()
            .find(|d| d.name() == normalized)
            .ok_or_else(|| Error::UnknownDomain(s.to_string()))
    }
}

/// Source and target file names of one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFiles {
    /// Original-language file
    pub source: PathBuf,
    /// Translated file
    pub target: PathBuf,
}

/// Both corpora of one domain
#[derive(Debug, Clone)]
pub struct DomainCorpora {
    /// Domain the files belong to
    pub domain: Domain,
    /// Source corpus (original text)
    pub source: Corpus,
    /// Target corpus (translations)
    pub target: Corpus,
    /// Whether the target file starts with a UTF-8 BOM
    pub target_bom: bool,
    /// Target spans set aside by a lenient load, in file order
    pub target_skipped: Vec<SpanError>,
}

/// A record file found under the project directory
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Full path to the file
    pub path: PathBuf,
    /// Domain and side the file is bound to, if any
    pub binding: Option<(Domain, FileSide)>,
}

/// Result of scanning the project directory
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Directory that was scanned
    pub root: PathBuf,
    /// Record files found, sorted by path
    pub files: Vec<ScannedFile>,
    /// Bound files that do not exist
    pub missing: Vec<(Domain, FileSide, PathBuf)>,
}

impl ScanResult {
    /// Files not bound to any domain
    pub fn unbound(&self) -> Vec<&ScannedFile> {
        self.files.iter().filter(|f| f.binding.is_none()).collect()
    }
}

/// Resolves domains to file pairs and loads their corpora
#[derive(Debug, Clone)]
pub struct MapRegistry {
    project_dir: PathBuf,
    bindings: BTreeMap<Domain, DomainFiles>,
    source_patterns: PatternSet,
    target_patterns: PatternSet,
}

impl MapRegistry {
    /// Create a registry from an explicit configuration
    pub fn new(config: &ProjectConfig) -> Result<Self> {
        info!("Creating project on {}", config.project_dir.display());
        Ok(Self {
            project_dir: config.project_dir.clone(),
            bindings: config.domains.clone(),
            source_patterns: PatternSet::rvtext(FileSide::Source)?,
            target_patterns: PatternSet::rvtext(FileSide::Target)?,
        })
    }

    /// Project directory all bindings are relative to
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Domains that have a binding, in declaration order
    pub fn domains(&self) -> Vec<Domain> {
        self.bindings.keys().copied().collect()
    }

    /// Patterns used for one side of a domain
    pub fn patterns(&self, side: FileSide) -> &PatternSet {
        match side {
            FileSide::Source => &self.source_patterns,
            FileSide::Target => &self.target_patterns,
        }
    }

    /// Resolve a domain to its (source, target) paths
    pub fn resolve(&self, domain: Domain) -> Result<(PathBuf, PathBuf)> {
        let files = self
            .bindings
            .get(&domain)
            .ok_or_else(|| Error::UnboundDomain(domain.to_string()))?;
        Ok((
            self.project_dir.join(&files.source),
            self.project_dir.join(&files.target),
        ))
    }

    /// Load both corpora of a domain, failing on any unparsable record
    pub fn load_domain(&self, domain: Domain) -> Result<DomainCorpora> {
        self.load(domain, true)
    }

    /// Load both corpora of a domain, skipping unparsable records
    pub fn load_domain_lenient(&self, domain: Domain) -> Result<DomainCorpora> {
        self.load(domain, false)
    }

    fn load(&self, domain: Domain, strict: bool) -> Result<DomainCorpora> {
        info!("Building map {}...", domain);
        let (source_path, target_path) = self.resolve(domain)?;

        let (source, _, _) = self.load_side(domain, &source_path, FileSide::Source, strict)?;
        let (target, target_bom, target_skipped) =
            self.load_side(domain, &target_path, FileSide::Target, strict)?;

        Ok(DomainCorpora {
            domain,
            source,
            target,
            target_bom,
            target_skipped,
        })
    }

    fn load_side(
        &self,
        domain: Domain,
        path: &Path,
        side: FileSide,
        strict: bool,
    ) -> Result<(Corpus, bool, Vec<SpanError>)> {
        if !path.is_file() {
            return Err(Error::MissingFile {
                domain: domain.to_string(),
                path: path.to_path_buf(),
            });
        }

        info!("Loading {:?} file {}...", side, path.display());
        let file = TextFile::read(path)?;
        let patterns = self.patterns(side);
        let (records, skipped) = if strict {
            (extract_strict(&file.text, patterns, side.role(), &file.path)?, Vec::new())
        } else {
            extract_lenient(&file.text, patterns, side.role(), &file.path)
        };
        let corpus = Corpus::build(records, file.path)?;
        info!("{:?} loaded: {} entries", side, corpus.len());

        Ok((corpus, file.bom, skipped))
    }

    /// Walk the project directory for record files and match them to bindings
    pub fn scan_project(&self) -> Result<ScanResult> {
        let mut bound: BTreeMap<PathBuf, (Domain, FileSide)> = BTreeMap::new();
        for (&domain, files) in &self.bindings {
            bound.insert(self.project_dir.join(&files.source), (domain, FileSide::Source));
            bound.insert(self.project_dir.join(&files.target), (domain, FileSide::Target));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.project_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == RVTEXT_EXTENSION)
            {
                files.push(ScannedFile {
                    path: path.to_path_buf(),
                    binding: bound.get(path).copied(),
                });
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let missing = bound
            .into_iter()
            .filter(|(path, _)| !path.is_file())
            .map(|(path, (domain, side))| (domain, side, path))
            .collect();

        Ok(ScanResult {
            root: self.project_dir.clone(),
            files,
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project(dir: &Path) -> MapRegistry {
        MapRegistry::new(&ProjectConfig::for_project(dir)).unwrap()
    }

    #[test]
    fn test_domain_from_str() {
        assert_eq!("DATABASE".parse::<Domain>().unwrap(), Domain::Database);
        assert_eq!("script-text".parse::<Domain>().unwrap(), Domain::ScriptText);
        assert_eq!(" dialogues ".parse::<Domain>().unwrap(), Domain::Dialogues);
        assert!(matches!(
            "COMMON_EVENTS".parse::<Domain>(),
            Err(Error::UnknownDomain(_))
        ));
    }

    #[test]
    fn test_default_files() {
        let files = Domain::ScriptText.default_files();
        assert_eq!(files.source, PathBuf::from("ScriptTextJapanese.rvtext"));
        assert_eq!(files.target, PathBuf::from("ScriptTextEnglish.rvtext"));
    }

    #[test]
    fn test_resolve() {
        let registry = project(Path::new("MGQ-EX"));
        let (source, target) = registry.resolve(Domain::Dialogues).unwrap();

        assert_eq!(source, PathBuf::from("MGQ-EX/DialoguesJapanese.rvtext"));
        assert_eq!(target, PathBuf::from("MGQ-EX/DialoguesEnglish.rvtext"));
        assert_eq!(registry.domains(), Domain::ALL.to_vec());
    }

    #[test]
    fn test_resolve_unbound_domain() {
        let mut config = ProjectConfig::for_project("p");
        config.domains.remove(&Domain::Database);
        let registry = MapRegistry::new(&config).unwrap();

        assert!(matches!(
            registry.resolve(Domain::Database),
            Err(Error::UnboundDomain(_))
        ));
    }

    #[test]
    fn test_load_domain() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("DialoguesJapanese.rvtext"), "<<1>>\nこんにちは\n\n<<2>>\n世界").unwrap();
        fs::write(dir.path().join("DialoguesEnglish.rvtext"), "\u{feff}<<1>>\nHello").unwrap();

        let corpora = project(dir.path()).load_domain(Domain::Dialogues).unwrap();

        assert_eq!(corpora.source.len(), 2);
        assert_eq!(corpora.source.get("2").unwrap().field, "世界");
        assert_eq!(corpora.target.get("1").unwrap().field, "Hello");
        assert!(corpora.target_bom);
    }

    #[test]
    fn test_load_domain_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("DialoguesJapanese.rvtext"), "<<1>>\nx").unwrap();

        let err = project(dir.path()).load_domain(Domain::Dialogues).unwrap_err();
        assert!(matches!(err, Error::MissingFile { .. }));
    }

    #[test]
    fn test_strict_and_lenient_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("DatabaseTextJapanese.rvtext"), "<<1>>\nx\n\n<<>>\ny").unwrap();
        fs::write(dir.path().join("DatabaseTextEnglish.rvtext"), "<<1>>\nX\n\n<<>>\nZ").unwrap();
        let registry = project(dir.path());

        assert!(matches!(
            registry.load_domain(Domain::Database),
            Err(Error::Record { line: 4, .. })
        ));
        let corpora = registry.load_domain_lenient(Domain::Database).unwrap();
        assert_eq!(corpora.source.len(), 1);
        assert_eq!(corpora.target.len(), 1);
        assert_eq!(corpora.target_skipped.len(), 1);
        assert_eq!(corpora.target_skipped[0].raw_text, "<<>>\nZ");
    }

    #[test]
    fn test_scan_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ScriptTextJapanese.rvtext"), "").unwrap();
        fs::write(dir.path().join("ScriptTextEnglish.rvtext"), "").unwrap();
        fs::write(dir.path().join("OldStuff.rvtext"), "").unwrap();
        fs::write(dir.path().join("ScriptTextEnglish.rvtext.new"), "").unwrap();

        let scan = project(dir.path()).scan_project().unwrap();

        assert_eq!(scan.files.len(), 3);
        let unbound = scan.unbound();
        assert_eq!(unbound.len(), 1);
        assert!(unbound[0].path.ends_with("OldStuff.rvtext"));
        assert_eq!(scan.missing.len(), 4);
        assert!(scan
            .files
            .iter()
            .any(|f| f.binding == Some((Domain::ScriptText, FileSide::Target))));
    }
}
