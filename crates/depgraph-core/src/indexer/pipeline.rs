//! Ingestion pipeline: scan, then extract and classify in parallel with
//! Rayon, then reconcile each unit in its own transaction.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::{Classified, Classifier};
use crate::config::IngestConfig;
use crate::errors::GraphResult;
use crate::identity::normalize_path;
use crate::indexer::extract::extract_facts;
use crate::indexer::filesystem::{
    compute_content_hash, detect_language, iter_repo_files, relative_path, ScanOptions,
};
use crate::indexer::parser::parse_file;
use crate::models::{Entity, GraphEntity, OutcomeKind, RepositoryEntity};
use crate::reconcile::{log_statistics, UpsertEngine};
use crate::store::{Database, GraphStore};

pub struct FileRecord {
    pub path: String,
    pub absolute_path: PathBuf,
    pub language: String,
    pub content_hash: String,
    pub size_bytes: i64,
}

pub struct ExtractionResult {
    pub file_path: String,
    pub absolute_path: PathBuf,
    pub content_hash: String,
    pub classified: Option<Classified>,
    pub error_stage: Option<&'static str>,
    pub error_message: Option<String>,
}

/// Repository entities and last-seen file hashes, owned by the caller and
/// reused across runs within one process.
#[derive(Debug, Default)]
pub struct RepositoryCache {
    repositories: HashMap<PathBuf, Entity>,
    file_hashes: HashMap<PathBuf, String>,
}

impl RepositoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository entity for `root`, built once per root.
    pub fn repository(&mut self, root: &Path) -> GraphResult<&Entity> {
        match self.repositories.entry(root.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "repository".to_string());
                let entity = RepositoryEntity {
                    name,
                    path: normalize_path(&root.to_string_lossy()),
                    remote_url: None,
                    default_branch: None,
                }
                .to_entity()?;
                Ok(entry.insert(entity))
            }
        }
    }

    fn is_unchanged(&self, record: &FileRecord) -> bool {
        self.file_hashes.get(&record.absolute_path) == Some(&record.content_hash)
    }

    fn remember(&mut self, path: PathBuf, content_hash: String) {
        self.file_hashes.insert(path, content_hash);
    }

    pub fn forget_files(&mut self) {
        self.file_hashes.clear();
    }
}

fn extract_file_worker(record: &FileRecord, classifier: &Classifier) -> ExtractionResult {
    let failed = |stage, message: String| ExtractionResult {
        file_path: record.path.clone(),
        absolute_path: record.absolute_path.clone(),
        content_hash: record.content_hash.clone(),
        classified: None,
        error_stage: Some(stage),
        error_message: Some(message),
    };
    let unit = match parse_file(&record.absolute_path, &record.path) {
        Ok(unit) => unit,
        Err(e) => return failed("parse", e.to_string()),
    };
    if unit.tree.root_node().has_error() {
        debug!(path = %record.path, "syntax errors; extracting what parsed");
    }
    let facts = extract_facts(&unit);
    ExtractionResult {
        file_path: record.path.clone(),
        absolute_path: record.absolute_path.clone(),
        content_hash: record.content_hash.clone(),
        classified: Some(classifier.classify_unit(&facts)),
        error_stage: None,
        error_message: None,
    }
}

pub fn parallel_extract(
    files: &[FileRecord],
    workers: usize,
    classifier: &Classifier,
) -> Vec<ExtractionResult> {
    if files.is_empty() {
        return vec![];
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    match pool {
        Ok(pool) => pool.install(|| {
            files
                .par_iter()
                .map(|record| extract_file_worker(record, classifier))
                .collect()
        }),
        Err(e) => {
            warn!(error = %e, "thread pool unavailable; extracting sequentially");
            files
                .iter()
                .map(|record| extract_file_worker(record, classifier))
                .collect()
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct IndexStats {
    pub files_seen: i64,
    pub files_indexed: i64,
    pub files_unchanged: i64,
    pub files_failed: i64,
    pub entities_written: i64,
    pub edges_added: i64,
    pub edges_updated: i64,
    pub edges_removed: i64,
    pub elapsed_ms: i64,
    pub run_id: String,
}

/// Scan repository for indexable files.
pub fn scan_repo_files(
    repo_root: &Path,
    options: &ScanOptions,
) -> GraphResult<(i64, Vec<FileRecord>)> {
    let all_files = iter_repo_files(repo_root, options)?;
    let mut files_seen = 0i64;
    let mut records = Vec::new();

    for file_path in all_files {
        files_seen += 1;
        let Some(language) = detect_language(&file_path.to_string_lossy()) else {
            continue;
        };
        let content_hash = match compute_content_hash(&file_path) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "unreadable file");
                continue;
            }
        };
        let size_bytes = file_path.metadata().map(|m| m.len() as i64).unwrap_or(0);

        records.push(FileRecord {
            path: relative_path(repo_root, &file_path),
            absolute_path: file_path,
            language,
            content_hash,
            size_bytes,
        });
    }

    Ok((files_seen, records))
}

/// Index one repository into `store`. A unit that fails to parse or to
/// reconcile is logged and skipped; the run continues.
pub fn index_repository(
    store: &dyn GraphStore,
    engine: &UpsertEngine,
    repo_root: &Path,
    config: &IngestConfig,
    cache: &mut RepositoryCache,
) -> GraphResult<IndexStats> {
    let started = Instant::now();
    let repository = cache.repository(repo_root)?.clone();
    let outcome = engine.upsert(store, &repository);
    if outcome.kind == OutcomeKind::Failure {
        warn!(
            repository = %repository.id,
            reason = ?outcome.reason,
            "repository entity not stored"
        );
    }

    let options = ScanOptions {
        include_patterns: config.include_patterns.clone(),
        exclude_patterns: config.exclude_patterns.clone(),
        exclude_sensitive: config.exclude_sensitive,
    };
    let (files_seen, records) = scan_repo_files(repo_root, &options)?;
    let mut stats = IndexStats {
        files_seen,
        run_id: engine.operation_id(),
        ..IndexStats::default()
    };

    let (unchanged, pending): (Vec<FileRecord>, Vec<FileRecord>) =
        records.into_iter().partition(|r| cache.is_unchanged(r));
    stats.files_unchanged = unchanged.len() as i64;

    let classifier =
        Classifier::new(config.classifier.clone()).with_repository(repository.id.clone());
    for result in parallel_extract(&pending, config.workers, &classifier) {
        let Some(classified) = result.classified else {
            warn!(
                path = %result.file_path,
                stage = result.error_stage.unwrap_or("unknown"),
                error = result.error_message.as_deref().unwrap_or(""),
                "skipping unit"
            );
            stats.files_failed += 1;
            continue;
        };
        match engine.apply_unit(store, &classified) {
            Ok(report) => {
                stats.files_indexed += 1;
                stats.entities_written += (report.count(OutcomeKind::Insert)
                    + report.count(OutcomeKind::Update)) as i64;
                stats.edges_added += report.edges_added as i64;
                stats.edges_updated += report.edges_updated as i64;
                stats.edges_removed += report.edges_removed as i64;
                cache.remember(result.absolute_path, result.content_hash);
            }
            Err(e) => {
                warn!(path = %result.file_path, error = %e, "unit not reconciled");
                stats.files_failed += 1;
            }
        }
    }

    stats.elapsed_ms = started.elapsed().as_millis() as i64;
    info!(
        root = %repo_root.display(),
        files_seen = stats.files_seen,
        files_indexed = stats.files_indexed,
        files_unchanged = stats.files_unchanged,
        files_failed = stats.files_failed,
        elapsed_ms = stats.elapsed_ms,
        "indexed repository"
    );
    log_statistics(engine);
    Ok(stats)
}

/// Open (or create) the database at `db_path` and index `repo_root` into it.
pub fn full_index(db_path: &Path, repo_root: &Path, config: &IngestConfig) -> GraphResult<IndexStats> {
    let db = Database::open(db_path)?
        .with_busy_timeout(Duration::from_millis(config.busy_timeout_ms));
    let engine = UpsertEngine::new(config.engine.clone());
    let mut cache = RepositoryCache::new();
    index_repository(&db, &engine, repo_root, config, &mut cache)
}
