//! Upsert and reconciliation engine.
//!
//! Each entity goes through `lookup → create` or `lookup → diff → skip |
//! update | conflict`. A batch runs in one store transaction: a store error
//! anywhere rolls the whole batch back and turns every outcome into
//! `FAILURE`.

pub mod audit;
pub mod diff;
pub mod stats;

use std::collections::HashSet;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::Classified;
use crate::config::EngineConfig;
use crate::errors::{GraphError, GraphResult};
use crate::identity::validate_id;
use crate::models::{DependencyEdge, Entity, OutcomeKind, UpsertOutcome};
use crate::store::{EdgeWrite, GraphSession, GraphStore};

pub use diff::Differ;
pub use stats::{StatisticsSnapshot, UpsertStatistics};

/// Result of reconciling one source unit.
#[derive(Clone, Debug, Default, Serialize)]
pub struct UnitReport {
    pub source_path: Option<String>,
    pub outcomes: Vec<UpsertOutcome>,
    pub edges_added: usize,
    /// Existing edges whose metadata changed.
    pub edges_updated: usize,
    pub edges_removed: usize,
    pub edges_unchanged: usize,
}

impl UnitReport {
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.outcomes.iter().filter(|o| o.kind == kind).count()
    }

    /// True when the unit wrote nothing: every entity skipped and the edge
    /// set unchanged.
    pub fn is_unchanged(&self) -> bool {
        self.edges_added == 0
            && self.edges_updated == 0
            && self.edges_removed == 0
            && self.outcomes.iter().all(|o| o.kind == OutcomeKind::Skip)
    }
}

#[derive(Default)]
struct EdgeSummary {
    added: usize,
    updated: usize,
    removed: usize,
    unchanged: usize,
}

struct BatchFailure {
    error: GraphError,
    outcomes: Vec<UpsertOutcome>,
}

pub struct UpsertEngine {
    config: EngineConfig,
    differ: Differ,
    stats: UpsertStatistics,
    operation_id: RwLock<String>,
}

impl Default for UpsertEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl UpsertEngine {
    pub fn new(config: EngineConfig) -> Self {
        let differ = Differ::new(&config.ephemeral_attributes);
        Self {
            config,
            differ,
            stats: UpsertStatistics::default(),
            operation_id: RwLock::new(uuid::Uuid::new_v4().to_string()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn operation_id(&self) -> String {
        self.operation_id.read().clone()
    }

    /// Tag subsequent outcomes and audit rows with `operation_id`.
    pub fn set_operation_id(&self, operation_id: impl Into<String>) {
        *self.operation_id.write() = operation_id.into();
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    // -- entry points --------------------------------------------------------

    /// Reconcile one entity in its own transaction.
    pub fn upsert(&self, store: &dyn GraphStore, entity: &Entity) -> UpsertOutcome {
        let mut outcomes = self.upsert_batch(store, std::slice::from_ref(entity));
        outcomes.pop().unwrap_or_else(|| {
            UpsertOutcome::failure(entity, &self.operation_id(), "no outcome produced")
        })
    }

    /// Reconcile entities in order within one transaction. Always returns
    /// one outcome per input entity.
    pub fn upsert_batch(&self, store: &dyn GraphStore, entities: &[Entity]) -> Vec<UpsertOutcome> {
        match self.run(store, entities, None) {
            Ok((outcomes, _)) => outcomes,
            Err(failure) => failure.outcomes,
        }
    }

    /// Entities then edges of one classified unit, in one transaction. Edges
    /// stored for the unit's source path that the new pass no longer
    /// produces are deleted.
    pub fn apply_unit(&self, store: &dyn GraphStore, unit: &Classified) -> GraphResult<UnitReport> {
        let entities = unit.entity_list();
        match self.run(store, &entities, Some(unit)) {
            Ok((outcomes, edges)) => Ok(UnitReport {
                source_path: unit.source_path.clone(),
                outcomes,
                edges_added: edges.added,
                edges_updated: edges.updated,
                edges_removed: edges.removed,
                edges_unchanged: edges.unchanged,
            }),
            Err(failure) => Err(failure.error),
        }
    }

    /// Reconcile one entity inside a caller-owned session. Store errors are
    /// returned for the caller to roll back; identity and attribute problems
    /// come back as outcomes.
    pub fn upsert_in(
        &self,
        session: &mut dyn GraphSession,
        entity: &Entity,
    ) -> GraphResult<UpsertOutcome> {
        let outcome =
            self.reconcile_or_reject(session, entity, &timestamp(), &self.operation_id())?;
        self.stats.record(outcome.kind, outcome.elapsed);
        Ok(outcome)
    }

    // -- transaction ---------------------------------------------------------

    fn run(
        &self,
        store: &dyn GraphStore,
        entities: &[Entity],
        unit: Option<&Classified>,
    ) -> Result<(Vec<UpsertOutcome>, EdgeSummary), BatchFailure> {
        let operation_id = self.operation_id();
        let indexed_at = timestamp();
        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(entities.len());

        let mut session = match store.begin() {
            Ok(session) => session,
            Err(e) => return Err(self.fail_batch(store, entities, outcomes, e, &operation_id)),
        };
        let applied =
            self.apply_all(&mut *session, entities, unit, &indexed_at, &operation_id, &mut outcomes);
        let result = match applied {
            Ok(edges) => session.commit().map(|()| edges),
            Err(e) => {
                if let Err(rollback) = session.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        };

        match result {
            Ok(edges) => {
                debug!(
                    operation_id = %operation_id,
                    source_path = ?unit.and_then(|u| u.source_path.as_deref()),
                    entities = entities.len(),
                    edges_added = edges.added,
                    edges_updated = edges.updated,
                    edges_removed = edges.removed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "batch committed"
                );
                Ok((outcomes, edges))
            }
            Err(e) => Err(self.fail_batch(store, entities, outcomes, e, &operation_id)),
        }
    }

    fn apply_all(
        &self,
        session: &mut dyn GraphSession,
        entities: &[Entity],
        unit: Option<&Classified>,
        indexed_at: &str,
        operation_id: &str,
        outcomes: &mut Vec<UpsertOutcome>,
    ) -> GraphResult<EdgeSummary> {
        for entity in entities {
            let outcome = self.reconcile_or_reject(session, entity, indexed_at, operation_id)?;
            self.stats.record(outcome.kind, outcome.elapsed);
            outcomes.push(outcome);
        }
        let edges = match unit {
            Some(unit) => reconcile_edges(session, unit.source_path.as_deref(), &unit.edges)?,
            None => EdgeSummary::default(),
        };
        if self.config.audit_enabled {
            audit::record_outcomes(session, outcomes)?;
        }
        Ok(edges)
    }

    /// Every outcome of a rolled-back batch becomes FAILURE, including the
    /// ones already tallied, since their writes are gone.
    fn fail_batch(
        &self,
        store: &dyn GraphStore,
        entities: &[Entity],
        counted: Vec<UpsertOutcome>,
        error: GraphError,
        operation_id: &str,
    ) -> BatchFailure {
        for outcome in &counted {
            self.stats.reclassify_as_error(outcome.kind);
        }
        for _ in counted.len()..entities.len() {
            self.stats.record(OutcomeKind::Failure, std::time::Duration::ZERO);
        }
        let reason = format!("batch rolled back: {error}");
        let outcomes: Vec<UpsertOutcome> = entities
            .iter()
            .map(|entity| UpsertOutcome::failure(entity, operation_id, reason.clone()))
            .collect();
        warn!(
            operation_id = %operation_id,
            entities = entities.len(),
            error = %error,
            "batch rolled back"
        );
        if self.config.audit_enabled && !outcomes.is_empty() {
            audit::record_failures(store, &outcomes);
        }
        BatchFailure { error, outcomes }
    }

    // -- per entity ----------------------------------------------------------

    /// Store failures abort the batch; any other error fails only `entity`.
    fn reconcile_or_reject(
        &self,
        session: &mut dyn GraphSession,
        entity: &Entity,
        indexed_at: &str,
        operation_id: &str,
    ) -> GraphResult<UpsertOutcome> {
        match self.reconcile(session, entity, indexed_at, operation_id) {
            Err(e) if !e.is_store_failure() => {
                warn!(entity_id = %entity.id, error = %e, "entity rejected");
                Ok(UpsertOutcome::failure(entity, operation_id, e.to_string()))
            }
            result => result,
        }
    }

    fn reconcile(
        &self,
        session: &mut dyn GraphSession,
        entity: &Entity,
        indexed_at: &str,
        operation_id: &str,
    ) -> GraphResult<UpsertOutcome> {
        let started = Instant::now();
        let outcome = |kind, changes, reason: Option<String>| UpsertOutcome {
            kind,
            entity_id: entity.id.clone(),
            entity_kind: entity.kind,
            changes,
            reason,
            operation_id: operation_id.to_string(),
            elapsed: started.elapsed(),
        };

        if !validate_id(&entity.id, entity.kind) {
            return Ok(outcome(
                OutcomeKind::Failure,
                Vec::new(),
                Some(format!("invalid {} id: {:?}", entity.kind.as_str(), entity.id)),
            ));
        }

        let incoming = entity.clone().stamped(indexed_at);
        let Some(stored) = session.find_entity(entity.kind, &entity.id)? else {
            session.create_entity(&incoming)?;
            return Ok(outcome(OutcomeKind::Insert, Vec::new(), None));
        };

        if incoming.provisional {
            // A forward reference never overwrites what is already known.
            return Ok(outcome(OutcomeKind::Skip, Vec::new(), None));
        }

        match self.differ.diff(&stored, &incoming) {
            Ok(changes) if !diff::has_significant(&changes) => {
                Ok(outcome(OutcomeKind::Skip, Vec::new(), None))
            }
            Ok(changes) => {
                session.update_entity(&incoming)?;
                Ok(outcome(OutcomeKind::Update, changes, None))
            }
            Err(conflict @ GraphError::AttributeConflict { .. }) => {
                debug!(entity_id = %entity.id, %conflict, "attribute conflict");
                Ok(outcome(OutcomeKind::Conflict, Vec::new(), Some(conflict.to_string())))
            }
            Err(e) => Err(e),
        }
    }
}

/// Merge the unit's edges, refreshing metadata on edges that already exist,
/// and drop the ones its previous pass produced but
/// this one no longer does.
fn reconcile_edges(
    session: &mut dyn GraphSession,
    source_path: Option<&str>,
    edges: &[DependencyEdge],
) -> GraphResult<EdgeSummary> {
    let mut summary = EdgeSummary::default();
    let mut current = HashSet::with_capacity(edges.len());
    for edge in edges {
        match session.merge_edge(edge)? {
            EdgeWrite::Inserted => summary.added += 1,
            EdgeWrite::Updated => summary.updated += 1,
            EdgeWrite::Unchanged => summary.unchanged += 1,
        }
        current.insert(edge.key());
    }
    if let Some(path) = source_path {
        for key in session.edges_for_source(path)? {
            if !current.contains(&key) && session.delete_edge(&key)? {
                summary.removed += 1;
            }
        }
    }
    Ok(summary)
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Log totals for a finished ingest.
pub fn log_statistics(engine: &UpsertEngine) {
    let snap = engine.statistics();
    info!(
        operation_id = %engine.operation_id(),
        inserts = snap.inserts,
        updates = snap.updates,
        skips = snap.skips,
        conflicts = snap.conflicts,
        errors = snap.errors,
        elapsed_ms = snap.elapsed.as_millis() as u64,
        "reconciliation totals"
    );
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::classify::Classifier;
    use crate::facts::{AnnotationFact, Fact, FieldFact, PackageFact, SourceFacts, Span, TypeFact};
    use crate::models::{
        AuditRecord, ClassEntity, DeclarationKind, EdgeKey, EntityKind, GraphEntity,
        PropertyValue, UsageKind,
    };
    use crate::store::Database;

    fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("graph.db")).unwrap();
        (dir, db)
    }

    fn class(name: &str) -> Entity {
        ClassEntity {
            package: "com.example".to_string(),
            name: name.to_string(),
            qualified_name: format!("com.example.{name}"),
            declaration_kind: Some(DeclarationKind::Class),
            visibility: Some("public".to_string()),
            modifiers: Vec::new(),
            type_parameters: Vec::new(),
            outer_class_id: None,
            is_external: false,
            location: None,
            provisional: false,
        }
        .to_entity()
        .unwrap()
    }

    /// Delegates to a real database but fails the Nth entity create, and
    /// cannot read back the entity named by `unreadable_id`.
    struct FailingStore {
        inner: Database,
        fail_on_create: usize,
        unreadable_id: Option<String>,
        creates: AtomicUsize,
    }

    struct FailingSession<'a> {
        inner: Box<dyn GraphSession + 'a>,
        store: &'a FailingStore,
    }

    impl GraphStore for FailingStore {
        fn begin(&self) -> GraphResult<Box<dyn GraphSession + '_>> {
            Ok(Box::new(FailingSession {
                inner: self.inner.begin()?,
                store: self,
            }))
        }
    }

    impl GraphSession for FailingSession<'_> {
        fn find_entity(&mut self, kind: EntityKind, id: &str) -> GraphResult<Option<Entity>> {
            if self.store.unreadable_id.as_deref() == Some(id) {
                return Err(GraphError::Parse(format!("unreadable properties for {id}")));
            }
            self.inner.find_entity(kind, id)
        }
        fn create_entity(&mut self, entity: &Entity) -> GraphResult<()> {
            let n = self.store.creates.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.store.fail_on_create {
                return Err(GraphError::Database("disk full".to_string()));
            }
            self.inner.create_entity(entity)
        }
        fn update_entity(&mut self, entity: &Entity) -> GraphResult<()> {
            self.inner.update_entity(entity)
        }
        fn merge_edge(&mut self, edge: &DependencyEdge) -> GraphResult<EdgeWrite> {
            self.inner.merge_edge(edge)
        }
        fn edges_for_source(&mut self, source_path: &str) -> GraphResult<Vec<EdgeKey>> {
            self.inner.edges_for_source(source_path)
        }
        fn delete_edge(&mut self, key: &EdgeKey) -> GraphResult<bool> {
            self.inner.delete_edge(key)
        }
        fn record_audit(&mut self, record: &AuditRecord) -> GraphResult<()> {
            self.inner.record_audit(record)
        }
        fn commit(self: Box<Self>) -> GraphResult<()> {
            self.inner.commit()
        }
        fn rollback(self: Box<Self>) -> GraphResult<()> {
            self.inner.rollback()
        }
    }

    #[test]
    fn insert_then_skip() {
        let (_dir, db) = temp_db();
        let engine = UpsertEngine::default();
        let entity = class("Foo");

        let first = engine.upsert(&db, &entity);
        assert_eq!(first.kind, OutcomeKind::Insert);
        let second = engine.upsert(&db, &entity);
        assert_eq!(second.kind, OutcomeKind::Skip);
        assert!(second.changes.is_empty());

        let stored = db.get_entity(&entity.id).unwrap().unwrap();
        assert!(stored.text("indexed_at").is_some());

        let stats = engine.statistics();
        assert_eq!((stats.inserts, stats.skips), (1, 1));

        let audits = db.audit_records(&engine.operation_id()).unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].outcome, OutcomeKind::Insert);
    }

    #[test]
    fn update_reports_only_significant_changes() {
        let (_dir, db) = temp_db();
        let engine = UpsertEngine::default();
        let entity = class("Foo");
        engine.upsert(&db, &entity);

        let mut changed = entity.clone();
        changed
            .properties
            .insert("visibility".to_string(), "protected".into());
        let outcome = engine.upsert(&db, &changed);
        assert_eq!(outcome.kind, OutcomeKind::Update);
        assert_eq!(outcome.changed_attributes(), vec!["visibility"]);

        let stored = db.get_entity(&entity.id).unwrap().unwrap();
        assert_eq!(stored.text("visibility"), Some("protected"));
    }

    #[test]
    fn type_mismatch_is_a_conflict_and_writes_nothing() {
        let (_dir, db) = temp_db();
        let engine = UpsertEngine::default();
        let entity = class("Foo");
        engine.upsert(&db, &entity);

        let mut changed = entity.clone();
        changed
            .properties
            .insert("visibility".to_string(), PropertyValue::Bool(true));
        let outcome = engine.upsert(&db, &changed);
        assert_eq!(outcome.kind, OutcomeKind::Conflict);
        assert!(outcome.reason.unwrap().contains("visibility"));

        let stored = db.get_entity(&entity.id).unwrap().unwrap();
        assert_eq!(stored.text("visibility"), Some("public"));
        assert_eq!(engine.statistics().conflicts, 1);
    }

    #[test]
    fn placeholders_never_overwrite_declarations() {
        let (_dir, db) = temp_db();
        let engine = UpsertEngine::default();
        let placeholder = ClassEntity::placeholder("com.example", "Foo", "com.example.Foo", false)
            .to_entity()
            .unwrap();
        let real = class("Foo");
        assert_eq!(placeholder.id, real.id);

        assert_eq!(engine.upsert(&db, &placeholder).kind, OutcomeKind::Insert);
        let replaced = engine.upsert(&db, &real);
        assert_eq!(replaced.kind, OutcomeKind::Update);
        assert!(replaced.changed_attributes().contains(&"provisional"));

        assert_eq!(engine.upsert(&db, &placeholder).kind, OutcomeKind::Skip);
        let stored = db.get_entity(&real.id).unwrap().unwrap();
        assert!(!stored.provisional);
        assert_eq!(stored.text("declaration_kind"), Some("class"));
    }

    #[test]
    fn invalid_identity_fails_only_that_entity() {
        let (_dir, db) = temp_db();
        let engine = UpsertEngine::default();
        let mut bad = class("Bad");
        bad.id = "pkg:com.example".to_string();
        let outcomes = engine.upsert_batch(&db, &[class("A"), bad, class("B")]);
        let kinds: Vec<OutcomeKind> = outcomes.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![OutcomeKind::Insert, OutcomeKind::Failure, OutcomeKind::Insert]
        );
        assert_eq!(db.count_entities(Some(EntityKind::Class)).unwrap(), 2);
    }

    #[test]
    fn store_failure_rolls_back_the_whole_batch() {
        let (_dir, db) = temp_db();
        let store = FailingStore {
            inner: db,
            fail_on_create: 3,
            unreadable_id: None,
            creates: AtomicUsize::new(0),
        };
        let engine = UpsertEngine::default();
        engine.set_operation_id("op-rollback");
        let batch: Vec<Entity> = ["A", "B", "C", "D", "E"].iter().map(|n| class(n)).collect();

        let outcomes = engine.upsert_batch(&store, &batch);
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.kind == OutcomeKind::Failure));
        assert!(outcomes.iter().all(|o| o.operation_id == "op-rollback"));
        assert!(outcomes[0].reason.as_deref().unwrap().contains("disk full"));
        assert_eq!(store.inner.count_entities(None).unwrap(), 0);

        let stats = engine.statistics();
        assert_eq!(stats.inserts, 0);
        assert_eq!(stats.errors, 5);

        let audits = store.inner.audit_records("op-rollback").unwrap();
        assert_eq!(audits.len(), 5);
        assert!(audits.iter().all(|a| a.outcome == OutcomeKind::Failure));
    }

    #[test]
    fn unreadable_entity_fails_alone() {
        let (_dir, db) = temp_db();
        let batch: Vec<Entity> = ["A", "B", "C"].iter().map(|n| class(n)).collect();
        let store = FailingStore {
            inner: db,
            fail_on_create: 0,
            unreadable_id: Some(batch[1].id.clone()),
            creates: AtomicUsize::new(0),
        };
        let engine = UpsertEngine::default();
        engine.set_operation_id("op-partial");

        let outcomes = engine.upsert_batch(&store, &batch);
        let kinds: Vec<OutcomeKind> = outcomes.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![OutcomeKind::Insert, OutcomeKind::Failure, OutcomeKind::Insert]
        );
        assert!(outcomes[1].reason.as_deref().unwrap().contains("unreadable"));
        assert_eq!(store.inner.count_entities(Some(EntityKind::Class)).unwrap(), 2);

        let stats = engine.statistics();
        assert_eq!(stats.inserts, 2);
        assert_eq!(stats.errors, 1);

        let audits = store.inner.audit_records("op-partial").unwrap();
        assert_eq!(audits.len(), 3);
    }

    #[test]
    fn audit_can_be_disabled() {
        let (_dir, db) = temp_db();
        let engine = UpsertEngine::new(EngineConfig {
            audit_enabled: false,
            ..EngineConfig::default()
        });
        engine.upsert(&db, &class("Foo"));
        assert!(db.audit_records(&engine.operation_id()).unwrap().is_empty());
    }

    #[test]
    fn operation_id_defaults_to_uuid_and_can_be_set() {
        let engine = UpsertEngine::default();
        assert!(uuid::Uuid::parse_str(&engine.operation_id()).is_ok());
        engine.set_operation_id("ingest-42");
        assert_eq!(engine.operation_id(), "ingest-42");

        engine.stats.record(OutcomeKind::Insert, std::time::Duration::ZERO);
        engine.reset_statistics();
        assert_eq!(engine.statistics().total(), 0);
    }

    fn unit(fields: &[(&str, &str)]) -> SourceFacts {
        let mut facts = vec![
            Fact::Package(PackageFact {
                name: "com.example".to_string(),
            }),
            Fact::Type(TypeFact {
                name: "Inventory".to_string(),
                enclosing: None,
                declaration_kind: DeclarationKind::Class,
                modifiers: vec!["public".to_string()],
                type_parameters: Vec::new(),
                extends: Vec::new(),
                implements: Vec::new(),
                annotations: Vec::new(),
                span: Span::default(),
            }),
        ];
        for (name, type_name) in fields {
            facts.push(Fact::Field(FieldFact {
                owner: "Inventory".to_string(),
                name: name.to_string(),
                type_name: type_name.to_string(),
                modifiers: Vec::new(),
                annotations: Vec::new(),
                usages: Vec::new(),
                span: Span::default(),
            }));
        }
        SourceFacts {
            path: "src/com/example/Inventory.java".to_string(),
            facts,
        }
    }

    #[test]
    fn apply_unit_is_idempotent_and_drops_stale_edges() {
        let (_dir, db) = temp_db();
        let engine = UpsertEngine::default();
        let classifier = Classifier::default();

        let first = classifier.classify_unit(&unit(&[("items", "List<String>"), ("owner", "Owner")]));
        let report = engine.apply_unit(&db, &first).unwrap();
        assert!(report.count(OutcomeKind::Insert) > 0);
        assert_eq!(report.edges_added, first.edges.len());
        assert_eq!(db.count_edges().unwrap() as usize, first.edges.len());

        let again = engine.apply_unit(&db, &classifier.classify_unit(&unit(&[
            ("items", "List<String>"),
            ("owner", "Owner"),
        ])))
        .unwrap();
        assert!(again.is_unchanged());

        let trimmed = classifier.classify_unit(&unit(&[("items", "List<String>")]));
        let report = engine.apply_unit(&db, &trimmed).unwrap();
        assert!(report.edges_removed >= 2);
        assert_eq!(report.edges_added, 0);
        assert_eq!(db.count_edges().unwrap() as usize, trimmed.edges.len());

        let remaining = db.edges_from("cls:com.example:Inventory").unwrap();
        assert!(remaining
            .iter()
            .all(|e| !e.metadata.context.starts_with("field: owner")));
    }

    fn annotated_unit(path: &str) -> SourceFacts {
        let mut arguments = BTreeMap::new();
        arguments.insert("value".to_string(), format!("\"{path}\""));
        SourceFacts {
            path: "src/com/example/Inventory.java".to_string(),
            facts: vec![
                Fact::Package(PackageFact {
                    name: "com.example".to_string(),
                }),
                Fact::Type(TypeFact {
                    name: "Inventory".to_string(),
                    enclosing: None,
                    declaration_kind: DeclarationKind::Class,
                    modifiers: vec!["public".to_string()],
                    type_parameters: Vec::new(),
                    extends: Vec::new(),
                    implements: Vec::new(),
                    annotations: vec![AnnotationFact {
                        name: "RequestMapping".to_string(),
                        arguments,
                    }],
                    span: Span::default(),
                }),
            ],
        }
    }

    #[test]
    fn changed_annotation_arguments_refresh_the_stored_edge() {
        let (_dir, db) = temp_db();
        let engine = UpsertEngine::default();
        let classifier = Classifier::default();
        let annotation_attributes = |db: &Database| -> Vec<BTreeMap<String, String>> {
            db.edges_from("cls:com.example:Inventory")
                .unwrap()
                .into_iter()
                .filter(|e| e.metadata.usage_kind == Some(UsageKind::AnnotationUsage))
                .map(|e| e.metadata.attributes)
                .collect()
        };

        engine
            .apply_unit(&db, &classifier.classify_unit(&annotated_unit("/users")))
            .unwrap();
        let report = engine
            .apply_unit(&db, &classifier.classify_unit(&annotated_unit("/people")))
            .unwrap();
        assert_eq!(report.edges_added, 0);
        assert_eq!(report.edges_removed, 0);
        assert_eq!(report.edges_updated, 1);
        assert!(!report.is_unchanged());

        let mut expected = BTreeMap::new();
        expected.insert("value".to_string(), "/people".to_string());
        assert_eq!(annotation_attributes(&db), vec![expected]);

        let again = engine
            .apply_unit(&db, &classifier.classify_unit(&annotated_unit("/people")))
            .unwrap();
        assert!(again.is_unchanged());
    }

    #[test]
    fn apply_unit_surfaces_store_failures() {
        let (_dir, db) = temp_db();
        let store = FailingStore {
            inner: db,
            fail_on_create: 2,
            unreadable_id: None,
            creates: AtomicUsize::new(0),
        };
        let engine = UpsertEngine::default();
        let classified = Classifier::default().classify_unit(&unit(&[("items", "List<String>")]));
        assert!(engine.apply_unit(&store, &classified).is_err());
        assert_eq!(store.inner.count_edges().unwrap(), 0);
        assert_eq!(store.inner.count_entities(None).unwrap(), 0);
    }
}
