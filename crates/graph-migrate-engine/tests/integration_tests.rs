//! Integration tests for the migration pipeline.
//!
//! These tests lay out real migration trees in temporary directories and run
//! them through a [`Migrator`] backed by the in-memory backend and ledger,
//! verifying that:
//! - Discovery is deterministic and identities follow the directory layout
//! - Pending migrations apply in order, each in one transaction
//! - Applied migrations are never applied twice
//! - A failing statement leaves no ledger record and a retry re-runs the file
//! - Drift shows up in status
//! - Rollback removes only the ledger record

use std::path::Path;
use std::sync::Arc;

use graph_migrate_backends::{GraphBackend, MemoryBackend};
use graph_migrate_core::{MigrateError, Settings};
use graph_migrate_engine::descriptor::checksum;
use graph_migrate_engine::{
    ApplyOptions, LedgerStore, MemoryLedger, MigrationState, Migrator, RollbackOutcome,
};

struct Harness {
    root: tempfile::TempDir,
    backend: MemoryBackend,
    ledger: MemoryLedger,
    migrator: Migrator,
}

fn harness() -> Harness {
    let root = tempfile::tempdir().unwrap();
    let backend = MemoryBackend::new();
    let ledger = MemoryLedger::new();
    let settings = Settings {
        root: root.path().to_path_buf(),
        ..Settings::default()
    };
    let handle: Arc<dyn GraphBackend> = Arc::new(backend.clone());
    let migrator = Migrator::from_settings(&settings, handle, Arc::new(ledger.clone()));
    Harness {
        root,
        backend,
        ledger,
        migrator,
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

const CORE_INIT: &str = "\
// core bootstrap
CREATE CONSTRAINT user_id IF NOT EXISTS FOR (u:User) REQUIRE u.id IS UNIQUE;

MERGE (s:Settings {key: 'version'})
  ON CREATE SET s.value = 1;
";

const TWEET_SCHEMA: &str = "CREATE INDEX tweet_created IF NOT EXISTS FOR (t:Tweet) ON (t.created_at);\n";

fn example_tree(root: &Path) {
    write(root, "core/migrations/001_init.cypher", CORE_INIT);
    write(root, "twitter/tweet/migrations/001_schema.cypher", TWEET_SCHEMA);
}

// ── 1. Example scenario ─────────────────────────────────────────────────

#[tokio::test]
async fn test_example_scenario() {
    let h = harness();
    example_tree(h.root.path());

    let summary = h.migrator.up(None, false).await.unwrap();
    assert_eq!(summary.applied, vec!["core/001_init", "twitter/tweet/001_schema"]);

    assert_eq!(
        h.backend.committed_statements(),
        vec![
            "CREATE CONSTRAINT user_id IF NOT EXISTS FOR (u:User) REQUIRE u.id IS UNIQUE",
            "MERGE (s:Settings {key: 'version'})\n  ON CREATE SET s.value = 1",
            "CREATE INDEX tweet_created IF NOT EXISTS FOR (t:Tweet) ON (t.created_at)",
        ]
    );
    // The constraint and the MERGE of core/001_init commit separately.
    assert_eq!(h.backend.commit_count(), 3);

    let applied = h.ledger.list_applied().await.unwrap();
    assert_eq!(applied.len(), 2);
    assert_eq!(applied["core/001_init"].checksum, checksum(CORE_INIT.as_bytes()));
    assert_eq!(
        applied["twitter/tweet/001_schema"].checksum,
        checksum(TWEET_SCHEMA.as_bytes())
    );

    let report = h.migrator.status(None).await.unwrap();
    assert_eq!(report.applied_count(), 2);
    assert_eq!(report.pending_count(), 0);
    assert_eq!(report.drift_count(), 0);
}

// ── 2. Discovery ────────────────────────────────────────────────────────

#[test]
fn test_discovery_is_idempotent() {
    let h = harness();
    example_tree(h.root.path());
    write(h.root.path(), "migrations/000_bootstrap.cypher", "RETURN 1;");

    let first = h.migrator.discover().unwrap();
    let second = h.migrator.discover().unwrap();
    assert_eq!(first.descriptors, second.descriptors);
    let identities: Vec<_> = first.descriptors.iter().map(|d| d.identity.clone()).collect();
    assert_eq!(
        identities,
        vec!["core/000_bootstrap", "core/001_init", "twitter/tweet/001_schema"]
    );
}

#[tokio::test]
async fn test_duplicate_identity_aborts_before_execution() {
    let h = harness();
    write(h.root.path(), "migrations/001_init.cypher", "A;");
    write(h.root.path(), "core/migrations/001_init.cypher", "B;");

    let err = h.migrator.up(None, false).await.unwrap_err();
    assert!(matches!(err, MigrateError::DuplicateIdentity { .. }));
    assert_eq!(err.exit_code(), 65);
    assert!(h.backend.executed_statements().is_empty());
}

// ── 3. No double-apply ──────────────────────────────────────────────────

#[tokio::test]
async fn test_second_run_is_up_to_date() {
    let h = harness();
    example_tree(h.root.path());

    h.migrator.up(None, false).await.unwrap();
    let executed_after_first = h.backend.executed_statements().len();

    let summary = h.migrator.up(None, false).await.unwrap();
    assert!(summary.is_up_to_date());
    assert_eq!(h.backend.executed_statements().len(), executed_after_first);
}

#[tokio::test]
async fn test_new_file_applies_alone() {
    let h = harness();
    example_tree(h.root.path());
    h.migrator.up(None, false).await.unwrap();

    write(h.root.path(), "core/migrations/002_more.cypher", "CREATE (n:More);");
    let summary = h.migrator.up(None, false).await.unwrap();
    assert_eq!(summary.applied, vec!["core/002_more"]);
}

// ── 4. Failure and retry ────────────────────────────────────────────────

#[tokio::test]
async fn test_failure_leaves_no_record_and_retry_reruns() {
    let h = harness();
    write(
        h.root.path(),
        "core/migrations/001_init.cypher",
        "CREATE (a:A);\nCREATE (b:B) SYNTAX ERROR;\nCREATE (c:C);\n",
    );
    h.backend.fail_on("SYNTAX ERROR", "Invalid input 'SYNTAX'");

    let err = h.migrator.up(None, false).await.unwrap_err();
    let MigrateError::Execution {
        identity,
        path,
        statement_index,
        ..
    } = &err
    else {
        panic!("expected Execution, got {err:?}");
    };
    assert_eq!(identity, "core/001_init");
    assert!(path.ends_with("core/migrations/001_init.cypher"));
    assert_eq!(*statement_index, 2);
    assert!(h.ledger.is_empty());
    assert!(h.backend.committed_statements().is_empty());

    h.backend.clear_failures();
    let summary = h.migrator.up(None, false).await.unwrap();
    assert_eq!(summary.count(), 1);
    assert_eq!(h.backend.committed_statements().len(), 3);
    assert_eq!(
        h.backend
            .executed_statements()
            .iter()
            .filter(|s| *s == "CREATE (a:A)")
            .count(),
        2
    );
}

// ── 5. Drift ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_drift_is_reported_not_reapplied() {
    let h = harness();
    example_tree(h.root.path());
    h.migrator.up(None, false).await.unwrap();

    write(
        h.root.path(),
        "core/migrations/001_init.cypher",
        "// edited after the fact\nCREATE (x:X);\n",
    );
    let executed = h.backend.executed_statements().len();

    let summary = h.migrator.up(None, false).await.unwrap();
    assert!(summary.is_up_to_date());
    assert_eq!(h.backend.executed_statements().len(), executed);

    let report = h.migrator.status(None).await.unwrap();
    assert_eq!(report.drift_count(), 1);
    assert!(matches!(
        report.entries[0].state,
        MigrationState::Applied { drift: true, .. }
    ));
    assert!(report.render_text().contains("(changed since applied)"));
}

// ── 6. Scope ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scoped_up_and_status() {
    let h = harness();
    example_tree(h.root.path());

    let summary = h.migrator.up(Some("twitter/tweet"), false).await.unwrap();
    assert_eq!(summary.applied, vec!["twitter/tweet/001_schema"]);

    let core = h.migrator.status(Some("core")).await.unwrap();
    assert_eq!(core.entries.len(), 1);
    assert_eq!(core.pending_count(), 1);

    let all = h.migrator.status(None).await.unwrap();
    assert_eq!(all.applied_count(), 1);
    assert_eq!(all.pending_count(), 1);
}

// ── 7. Rollback ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rollback_removes_latest_record_only() {
    let h = harness();
    example_tree(h.root.path());
    h.migrator.up(None, false).await.unwrap();
    let committed = h.backend.committed_statements().len();

    let outcome = h.migrator.rollback_last(None).await.unwrap();
    let RollbackOutcome::RolledBack(record) = outcome else {
        panic!("expected a rollback");
    };
    assert_eq!(record.identity, "twitter/tweet/001_schema");
    assert_eq!(h.backend.committed_statements().len(), committed);

    let report = h.migrator.status(None).await.unwrap();
    assert_eq!(report.pending_count(), 1);

    // The next run re-applies the rolled-back migration.
    let summary = h.migrator.up(None, false).await.unwrap();
    assert_eq!(summary.applied, vec!["twitter/tweet/001_schema"]);
}

#[tokio::test]
async fn test_rollback_scope_and_exhaustion() {
    let h = harness();
    example_tree(h.root.path());
    h.migrator.up(None, false).await.unwrap();

    let outcome = h.migrator.rollback_last(Some("core")).await.unwrap();
    assert!(matches!(outcome, RollbackOutcome::RolledBack(ref r) if r.identity == "core/001_init"));
    assert_eq!(
        h.migrator.rollback_last(Some("core")).await.unwrap(),
        RollbackOutcome::NothingToRollBack
    );
}

// ── 8. Options ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dry_run_through_apply_pending() {
    let h = harness();
    example_tree(h.root.path());
    let options = ApplyOptions {
        dry_run: true,
        ..ApplyOptions::default()
    };

    let summary = h.migrator.apply_pending(&options).await.unwrap();
    assert_eq!(summary.planned.len(), 2);
    assert_eq!(summary.planned[0].statements.len(), 2);
    assert!(h.backend.executed_statements().is_empty());
    assert!(h.ledger.is_empty());
}

#[tokio::test]
async fn test_skeleton_applies_as_empty_migration() {
    let h = harness();
    let path = h.migrator.create_skeleton("core/identity", "user schema").unwrap();
    assert!(path.ends_with("core/identity/migrations/001_user_schema.cypher"));

    let summary = h.migrator.up(None, false).await.unwrap();
    assert_eq!(summary.applied, vec!["core/identity/001_user_schema"]);
    assert!(h.backend.executed_statements().is_empty());
}
