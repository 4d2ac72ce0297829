//! Per-domain update pipeline: load, synchronize, render, write
//!
//! Each domain is an independent unit of work. A multi-domain run collects
//! every domain's outcome; one failing domain never stops its siblings.

use crate::error::Result;
use crate::registry::{Domain, MapRegistry};
use crate::render::{render, write_outputs, WrittenFiles};
use crate::sync::synchronize;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// What a run does with each domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Write `.new` and `.unused` files
    Update,
    /// Only count entries
    Status,
}

/// Counts and outputs for one domain
#[derive(Debug, Clone, Serialize)]
pub struct DomainReport {
    /// Domain processed
    pub domain: Domain,
    /// Source file
    pub source_path: PathBuf,
    /// Target file
    pub target_path: PathBuf,
    /// Records in the source file
    pub source_entries: usize,
    /// Records in the target file
    pub target_entries: usize,
    /// Source slots with a translation
    pub translated: usize,
    /// Source slots falling back to source text
    pub untranslated: usize,
    /// Target records without a source counterpart
    pub orphans: usize,
    /// Files written, in update mode
    pub written: Option<WrittenFiles>,
}

/// A domain that could not be processed
#[derive(Debug, Clone, Serialize)]
pub struct DomainFailure {
    /// Domain that failed
    pub domain: Domain,
    /// Error message
    pub error: String,
}

/// Outcome of a run over several domains
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Project directory
    pub project_dir: PathBuf,
    /// Domains processed successfully, in request order
    pub domains: Vec<DomainReport>,
    /// Domains that failed, in request order
    pub failures: Vec<DomainFailure>,
}

impl RunReport {
    /// Check if any domain failed
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Save the report as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Regenerate one domain's merged and orphan files
pub fn update_domain(registry: &MapRegistry, domain: Domain) -> Result<DomainReport> {
    process_domain(registry, domain, RunMode::Update)
}

/// Count one domain's entries without writing anything
pub fn domain_status(registry: &MapRegistry, domain: Domain) -> Result<DomainReport> {
    process_domain(registry, domain, RunMode::Status)
}

fn process_domain(registry: &MapRegistry, domain: Domain, mode: RunMode) -> Result<DomainReport> {
    debug!("{}: {:?}", domain, mode);
    let (source_path, target_path) = registry.resolve(domain)?;
    let corpora = registry.load_domain(domain)?;

    let result = synchronize(&corpora.source, &corpora.target);
    let written = match mode {
        RunMode::Update => {
            let rendered = render(&result);
            Some(write_outputs(&target_path, &rendered, corpora.target_bom)?)
        }
        RunMode::Status => None,
    };

    Ok(DomainReport {
        domain,
        source_path,
        target_path,
        source_entries: corpora.source.len(),
        target_entries: corpora.target.len(),
        translated: result.translated_count(),
        untranslated: result.untranslated_count(),
        orphans: result.orphans.len(),
        written,
    })
}

/// Process several domains, in parallel when asked.
///
/// Failures are logged and collected per domain.
pub fn run(registry: &MapRegistry, domains: &[Domain], mode: RunMode, parallel: bool) -> RunReport {
    let started_at = Utc::now();
    info!(
        "Processing {} domain(s){}",
        domains.len(),
        if parallel { " in parallel" } else { "" }
    );

    let outcomes: Vec<(Domain, Result<DomainReport>)> = if parallel {
        domains
            .par_iter()
            .map(|&d| (d, process_domain(registry, d, mode)))
            .collect()
    } else {
        domains
            .iter()
            .map(|&d| (d, process_domain(registry, d, mode)))
            .collect()
    };

    let mut report = RunReport {
        started_at,
        finished_at: started_at,
        project_dir: registry.project_dir().to_path_buf(),
        domains: Vec::new(),
        failures: Vec::new(),
    };

    for (domain, outcome) in outcomes {
        match outcome {
            Ok(domain_report) => report.domains.push(domain_report),
            Err(e) => {
                error!("{}: {}", domain, e);
                report.failures.push(DomainFailure {
                    domain,
                    error: e.to_string(),
                });
            }
        }
    }

    report.finished_at = Utc::now();
    report
}
