//! Criterion benchmarks for depgraph-core.
//!
//! ## Benchmark groups
//!
//! 1. **schema**: DDL init + migration overhead.
//! 2. **identity**: ID generation and type-reference parsing.
//! 3. **classify**: Fact extraction and classification of one unit.
//! 4. **reconcile**: Upserting batches into a fresh store and re-applying
//!    an unchanged unit.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/depgraph-core/Cargo.toml
//! # Run only the reconcile group:
//! cargo bench --manifest-path crates/depgraph-core/Cargo.toml -- reconcile
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rusqlite::Connection;

use depgraph_core::classify::generics::parse_type;
use depgraph_core::config::{ClassifierConfig, EngineConfig};
use depgraph_core::identity::generate_id_from_parts;
use depgraph_core::indexer::extract::extract_source;
use depgraph_core::models::EntityKind;
use depgraph_core::store::schema::{migrate_schema, SCHEMA_STATEMENTS};
use depgraph_core::{Classifier, Database, UpsertEngine};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const JAVA_SOURCE: &str = r#"
package com.example.service;

import java.util.List;
import java.util.Map;
import java.util.Optional;
import com.example.model.User;
import com.example.repo.UserRepository;

@Service
public class UserService extends BaseService implements Auditable {
    @Inject
    private UserRepository repository;
    private Map<String, List<User>> cache;
    private static final int MAX = 10;

    public UserService(UserRepository repository) {
        this.repository = repository;
    }

    @Override
    public Optional<User> find(String id) {
        return repository.findById(id);
    }

    public List<User> findAll(int limit, String... tags) {
        List<User> users = repository.findAll();
        Helper.audit(users.size());
        return users;
    }

    @Transactional(readOnly = true)
    public void save(User user) throws IllegalStateException {
        User copy = new User(user.getName());
        repository.save(copy);
    }
}
"#;

fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    for stmt in SCHEMA_STATEMENTS {
        conn.execute_batch(stmt).unwrap();
    }
    migrate_schema(&conn).unwrap();
    conn
}

/// Variant of the fixture with distinct type names so units do not collide.
fn variant(i: usize) -> (String, String) {
    let path = format!("src/com/example/pkg{}/Service{i}.java", i / 4);
    let source = JAVA_SOURCE
        .replace("package com.example.service;", &format!("package com.example.pkg{};", i / 4))
        .replace("UserService", &format!("Service{i}"));
    (path, source)
}

// ---------------------------------------------------------------------------
// Benchmark: Schema initialization & migration
// ---------------------------------------------------------------------------

fn bench_schema(c: &mut Criterion) {
    let mut group = c.benchmark_group("schema");

    group.bench_function("init_and_migrate", |b| {
        b.iter(|| {
            let conn = setup_db();
            black_box(&conn);
        });
    });

    group.bench_function("migration_noop_on_current", |b| {
        let conn = setup_db();
        b.iter(|| {
            migrate_schema(black_box(&conn)).unwrap();
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Identity
// ---------------------------------------------------------------------------

fn bench_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity");

    group.bench_function("class_id", |b| {
        b.iter(|| {
            generate_id_from_parts(
                EntityKind::Class,
                black_box(&["com.example.service", "UserService"]),
            )
            .unwrap()
        });
    });

    let class_id =
        generate_id_from_parts(EntityKind::Class, &["com.example.service", "UserService"]).unwrap();
    group.bench_function("method_id", |b| {
        b.iter(|| {
            generate_id_from_parts(
                EntityKind::Method,
                black_box(&[class_id.as_str(), "findAll", "int", "String[]"]),
            )
            .unwrap()
        });
    });

    for raw in ["String", "List<User>", "Map<String, List<Optional<User>>>"] {
        group.bench_with_input(BenchmarkId::new("parse_type", raw), raw, |b, raw| {
            b.iter(|| parse_type(black_box(raw)));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Extraction & classification
// ---------------------------------------------------------------------------

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    group.bench_function("extract_source/java", |b| {
        b.iter(|| {
            extract_source(
                "src/com/example/service/UserService.java",
                black_box(JAVA_SOURCE),
            )
            .unwrap()
        });
    });

    let facts = extract_source("src/com/example/service/UserService.java", JAVA_SOURCE).unwrap();
    let classifier = Classifier::new(ClassifierConfig::default());
    group.bench_function("classify_unit/java", |b| {
        b.iter(|| {
            let classified = classifier.classify_unit(black_box(&facts));
            black_box(classified);
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Reconciliation
// ---------------------------------------------------------------------------

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    group.sample_size(20);

    let classifier = Classifier::new(ClassifierConfig::default());

    for &n_files in &[10, 50] {
        let units: Vec<_> = (0..n_files)
            .map(|i| {
                let (path, source) = variant(i);
                classifier.classify_unit(&extract_source(&path, &source).unwrap())
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("apply_units_fresh_store", n_files),
            &units,
            |b, units| {
                b.iter_with_setup(
                    || {
                        let dir = tempfile::tempdir().unwrap();
                        let db = Database::open(dir.path().join("graph.db")).unwrap();
                        (dir, db)
                    },
                    |(_dir, db)| {
                        let engine = UpsertEngine::new(EngineConfig::default());
                        for unit in units {
                            engine.apply_unit(&db, unit).unwrap();
                        }
                        black_box(engine.statistics());
                    },
                );
            },
        );
    }

    // Re-applying an unchanged unit: every entity should SKIP with no write.
    let (path, source) = variant(0);
    let unit = classifier.classify_unit(&extract_source(&path, &source).unwrap());
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("graph.db")).unwrap();
    let engine = UpsertEngine::new(EngineConfig::default());
    engine.apply_unit(&db, &unit).unwrap();
    group.bench_function("reapply_unchanged_unit", |b| {
        b.iter(|| engine.apply_unit(&db, black_box(&unit)).unwrap());
    });

    let entities = unit.entity_list();
    group.bench_function("upsert_batch_unchanged", |b| {
        b.iter(|| engine.upsert_batch(&db, black_box(&entities)));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_schema,
    bench_identity,
    bench_classify,
    bench_reconcile,
);
criterion_main!(benches);
