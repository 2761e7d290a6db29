//! PyO3 surface for a Python orchestration layer.
//!
//! Structured values cross the boundary as JSON strings in the serde shapes
//! of [`crate::facts`] and [`crate::models`]; small reports come back as
//! dicts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use pyo3::wrap_pyfunction;

use crate::classify::{self, Classifier, ImportContext};
use crate::config::{ClassifierConfig, EngineConfig, IngestConfig};
use crate::errors::GraphError;
use crate::facts::{Fact, SourceFacts};
use crate::identity;
use crate::indexer::{extract, filesystem, parser, pipeline};
use crate::models::{DependencyEdge, Entity, EntityKind};
use crate::reconcile::UpsertEngine;
use crate::store::Database;

fn parse_kind(kind: &str) -> PyResult<EntityKind> {
    EntityKind::parse(kind)
        .or_else(|| EntityKind::from_prefix(kind))
        .ok_or_else(|| PyValueError::new_err(format!("unknown entity kind: {kind}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> PyResult<String> {
    Ok(serde_json::to_string(value).map_err(GraphError::from)?)
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> PyResult<T> {
    Ok(serde_json::from_str(raw).map_err(GraphError::from)?)
}

#[derive(serde::Serialize)]
struct ClassifiedView<'a> {
    source_path: Option<&'a str>,
    entities: Vec<&'a Entity>,
    edges: &'a [DependencyEdge],
}

fn classified_json(classified: &classify::Classified) -> PyResult<String> {
    to_json(&ClassifiedView {
        source_path: classified.source_path.as_deref(),
        entities: classified.entities.values().collect(),
        edges: &classified.edges,
    })
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[pyfunction]
fn generate_id(kind: &str, parts: Vec<String>) -> PyResult<String> {
    let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
    Ok(identity::generate_id_from_parts(parse_kind(kind)?, &parts)?)
}

#[pyfunction]
fn validate_id(id: &str, kind: &str) -> PyResult<bool> {
    Ok(identity::validate_id(id, parse_kind(kind)?))
}

#[pyfunction]
fn extract_kind(id: &str) -> Option<&'static str> {
    identity::extract_kind(id).map(EntityKind::as_str)
}

// ---------------------------------------------------------------------------
// Front-end and classification
// ---------------------------------------------------------------------------

#[pyfunction]
fn extract_java_facts(path: &str, source: &str) -> PyResult<String> {
    to_json(&extract::extract_source(path, source)?)
}

/// Classify a JSON fact list against an explicit import table.
#[pyfunction]
#[pyo3(signature = (facts_json, imports=None))]
fn classify_facts(facts_json: &str, imports: Option<HashMap<String, String>>) -> PyResult<String> {
    let facts: Vec<Fact> = from_json(facts_json)?;
    let mut context = ImportContext::new();
    for (simple, qualified) in imports.unwrap_or_default() {
        context.insert(&simple, &qualified);
    }
    classified_json(&classify::classify(&facts, context)?)
}

/// Classify a whole unit (`SourceFacts` JSON) with environment configuration.
#[pyfunction]
#[pyo3(signature = (unit_json, repository_id=None))]
fn classify_unit(unit_json: &str, repository_id: Option<String>) -> PyResult<String> {
    let unit: SourceFacts = from_json(unit_json)?;
    let mut classifier = Classifier::new(ClassifierConfig::from_env());
    if let Some(repo) = repository_id {
        classifier = classifier.with_repository(repo);
    }
    classified_json(&classifier.classify_unit(&unit))
}

#[pyfunction]
fn detect_language(path: &str) -> Option<String> {
    filesystem::detect_language(path)
}

#[pyfunction]
fn compute_content_hash(path: PathBuf) -> PyResult<String> {
    Ok(filesystem::compute_content_hash(&path)?)
}

#[pyfunction]
fn tree_sitter_capability_report(py: Python<'_>) -> PyResult<PyObject> {
    let report = parser::capability_report();

    let languages = PyList::empty(py);
    for lang in &report.languages {
        let entry = PyDict::new(py);
        entry.set_item("language", &lang.language)?;
        entry.set_item("backend", &lang.backend)?;
        entry.set_item("available", lang.available)?;
        entry.set_item("reason", &lang.reason)?;
        languages.append(entry)?;
    }

    let versions = PyDict::new(py);
    for (name, version) in &report.versions {
        versions.set_item(name, version)?;
    }

    let result = PyDict::new(py);
    result.set_item("module_available", report.module_available)?;
    result.set_item("all_required_available", report.all_required_available)?;
    result.set_item("required_languages", PyList::new(py, &report.required_languages)?)?;
    result.set_item("versions", versions)?;
    result.set_item("languages", languages)?;

    Ok(result.into_any().unbind())
}

// ---------------------------------------------------------------------------
// Store and engine
// ---------------------------------------------------------------------------

#[pyclass(name = "GraphDatabase")]
pub struct PyGraphDatabase {
    inner: Database,
}

#[pymethods]
impl PyGraphDatabase {
    #[new]
    #[pyo3(signature = (db_path, busy_timeout_ms=5000))]
    fn new(db_path: PathBuf, busy_timeout_ms: u64) -> PyResult<Self> {
        let inner =
            Database::open(db_path)?.with_busy_timeout(Duration::from_millis(busy_timeout_ms));
        Ok(Self { inner })
    }

    #[getter]
    fn db_path(&self) -> String {
        self.inner.db_path().to_string_lossy().to_string()
    }

    fn schema_version(&self) -> PyResult<i32> {
        Ok(self.inner.schema_version()?)
    }

    #[pyo3(signature = (kind=None))]
    fn count_entities(&self, kind: Option<&str>) -> PyResult<i64> {
        let kind = kind.map(parse_kind).transpose()?;
        Ok(self.inner.count_entities(kind)?)
    }

    fn count_edges(&self) -> PyResult<i64> {
        Ok(self.inner.count_edges()?)
    }

    fn get_entity(&self, id: &str) -> PyResult<Option<String>> {
        self.inner.get_entity(id)?.as_ref().map(to_json).transpose()
    }

    fn edges_from(&self, from_id: &str) -> PyResult<String> {
        to_json(&self.inner.edges_from(from_id)?)
    }

    fn audit_records(&self, operation_id: &str) -> PyResult<String> {
        to_json(&self.inner.audit_records(operation_id)?)
    }

    fn backup_to(&self, destination: PathBuf) -> PyResult<String> {
        Ok(self.inner.backup_to(destination)?.to_string_lossy().to_string())
    }
}

#[pyclass(name = "UpsertEngine")]
pub struct PyUpsertEngine {
    inner: UpsertEngine,
}

#[pymethods]
impl PyUpsertEngine {
    #[new]
    #[pyo3(signature = (audit_enabled=None))]
    fn new(audit_enabled: Option<bool>) -> Self {
        let mut config = EngineConfig::from_env();
        if let Some(enabled) = audit_enabled {
            config.audit_enabled = enabled;
        }
        Self {
            inner: UpsertEngine::new(config),
        }
    }

    #[getter]
    fn operation_id(&self) -> String {
        self.inner.operation_id()
    }

    #[setter]
    fn set_operation_id(&self, operation_id: String) {
        self.inner.set_operation_id(operation_id);
    }

    fn statistics(&self, py: Python<'_>) -> PyResult<PyObject> {
        let snap = self.inner.statistics();
        let result = PyDict::new(py);
        result.set_item("inserts", snap.inserts)?;
        result.set_item("updates", snap.updates)?;
        result.set_item("skips", snap.skips)?;
        result.set_item("conflicts", snap.conflicts)?;
        result.set_item("errors", snap.errors)?;
        result.set_item("elapsed_ms", snap.elapsed.as_millis() as u64)?;
        Ok(result.into_any().unbind())
    }

    fn reset_statistics(&self) {
        self.inner.reset_statistics();
    }

    /// Entities as a JSON list; returns the outcomes as JSON.
    fn upsert_batch(&self, db: &PyGraphDatabase, entities_json: &str) -> PyResult<String> {
        let entities: Vec<Entity> = from_json(entities_json)?;
        to_json(&self.inner.upsert_batch(&db.inner, &entities))
    }

    /// Classify and reconcile one unit (`SourceFacts` JSON).
    #[pyo3(signature = (db, unit_json, repository_id=None))]
    fn apply_unit(
        &self,
        db: &PyGraphDatabase,
        unit_json: &str,
        repository_id: Option<String>,
    ) -> PyResult<String> {
        let unit: SourceFacts = from_json(unit_json)?;
        let mut classifier = Classifier::new(ClassifierConfig::from_env());
        if let Some(repo) = repository_id {
            classifier = classifier.with_repository(repo);
        }
        let classified = classifier.classify_unit(&unit);
        to_json(&self.inner.apply_unit(&db.inner, &classified)?)
    }
}

/// Full ingestion of `repo_root` into `db_path`.
#[pyfunction]
#[pyo3(signature = (repo_root, db_path, workers=None))]
fn full_index(
    py: Python<'_>,
    repo_root: PathBuf,
    db_path: PathBuf,
    workers: Option<usize>,
) -> PyResult<PyObject> {
    let mut config = IngestConfig::from_env();
    if let Some(workers) = workers {
        config.workers = workers.max(1);
    }
    let stats = py.allow_threads(|| pipeline::full_index(&db_path, &repo_root, &config))?;

    let result = PyDict::new(py);
    result.set_item("files_seen", stats.files_seen)?;
    result.set_item("files_indexed", stats.files_indexed)?;
    result.set_item("files_unchanged", stats.files_unchanged)?;
    result.set_item("files_failed", stats.files_failed)?;
    result.set_item("entities_written", stats.entities_written)?;
    result.set_item("edges_added", stats.edges_added)?;
    result.set_item("edges_updated", stats.edges_updated)?;
    result.set_item("edges_removed", stats.edges_removed)?;
    result.set_item("elapsed_ms", stats.elapsed_ms)?;
    result.set_item("run_id", stats.run_id)?;
    result.set_item("workers", config.workers)?;
    Ok(result.into_any().unbind())
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

#[pymodule]
fn depgraph_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("DEFAULT_PACKAGE", identity::DEFAULT_PACKAGE)?;

    // -- Identity ------------------------------------------------------------
    m.add_function(wrap_pyfunction!(generate_id, m)?)?;
    m.add_function(wrap_pyfunction!(validate_id, m)?)?;
    m.add_function(wrap_pyfunction!(extract_kind, m)?)?;

    // -- Front-end and classification ---------------------------------------
    m.add_function(wrap_pyfunction!(extract_java_facts, m)?)?;
    m.add_function(wrap_pyfunction!(classify_facts, m)?)?;
    m.add_function(wrap_pyfunction!(classify_unit, m)?)?;
    m.add_function(wrap_pyfunction!(detect_language, m)?)?;
    m.add_function(wrap_pyfunction!(compute_content_hash, m)?)?;
    m.add_function(wrap_pyfunction!(tree_sitter_capability_report, m)?)?;

    // -- Store and engine ---------------------------------------------------
    m.add_class::<PyGraphDatabase>()?;
    m.add_class::<PyUpsertEngine>()?;
    m.add_function(wrap_pyfunction!(full_index, m)?)?;

    Ok(())
}
