// crates/nutri-probe-migrate/tests/migration_unit.rs
// ============================================================================
// Module: Migration Runner Unit Tests
// Description: Idempotence, rollback, status, and backup checks on SQLite files.
// Purpose: Validate migrations against a scratch copy of the application schema.
// Dependencies: nutri-probe-migrate, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Each test seeds a temporary database with the tables the application
//! creates on first start, then drives [`MigrationRunner`] against it:
//! - Re-running a migration is a no-op
//! - Backfills only run when their column is added
//! - A failing step rolls back the whole migration
//! - Table rebuilds keep rows and run once
//! - Backups are verified and removed when unusable

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use nutri_probe_migrate::MigrateError;
use nutri_probe_migrate::Migration;
use nutri_probe_migrate::MigrationConfig;
use nutri_probe_migrate::MigrationReport;
use nutri_probe_migrate::MigrationRunner;
use nutri_probe_migrate::MigrationStatus;
use nutri_probe_migrate::RebuildGuard;
use nutri_probe_migrate::Step;
use nutri_probe_migrate::StepOutcome;
use nutri_probe_migrate::builtin_migrations;
use nutri_probe_migrate::find_migration;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Application tables before any migration, with a few rows.
const BASE_SCHEMA: &str = "
CREATE TABLE \"user\" (
    id INTEGER PRIMARY KEY,
    username VARCHAR(80) NOT NULL UNIQUE,
    email VARCHAR(120) NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    is_admin BOOLEAN DEFAULT 0,
    is_active BOOLEAN DEFAULT 1,
    created_at DATETIME,
    last_login DATETIME,
    first_name VARCHAR(50),
    last_name VARCHAR(50),
    age INTEGER,
    gender VARCHAR(10),
    height FLOAT,
    weight FLOAT,
    activity_level VARCHAR(20)
);
CREATE TABLE food (id INTEGER PRIMARY KEY, name VARCHAR(200) NOT NULL, category VARCHAR(50));
CREATE TABLE meal_log (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    food_id INTEGER NOT NULL,
    quantity FLOAT NOT NULL
);
CREATE TABLE nutrition_goal (id INTEGER PRIMARY KEY, user_id INTEGER, created_at DATETIME);
CREATE TABLE food_serving (
    id INTEGER PRIMARY KEY,
    food_id INTEGER NOT NULL REFERENCES food (id),
    serving_name VARCHAR(50) NOT NULL,
    serving_unit VARCHAR(20) NOT NULL,
    serving_quantity FLOAT NOT NULL,
    is_default BOOLEAN DEFAULT 0,
    created_at DATETIME
);
INSERT INTO \"user\" (id, username, email, password_hash, is_admin, created_at)
    VALUES (1, 'admin', 'admin@example.com', 'hash', 1, '2025-01-01 00:00:00');
INSERT INTO food VALUES (1, 'Apple', 'Fruits'), (2, 'Milk', 'Dairy'), (3, 'Mystery', NULL);
INSERT INTO meal_log VALUES (1, 1, 1, 150.0);
INSERT INTO nutrition_goal VALUES (1, 1, '2025-02-01 08:00:00');
INSERT INTO food_serving (id, food_id, serving_name, serving_unit, serving_quantity)
    VALUES (1, 1, '1 medium', 'piece', 182.0), (2, 2, 'splash', 'ml', 0);
";

/// Creates a database file from `sql`.
fn seeded_db(dir: &TempDir, sql: &str) -> PathBuf {
    let path = dir.path().join("nutri_tracker.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(sql).unwrap();
    path
}

/// Opens a runner on an existing file.
fn open(path: &Path) -> MigrationRunner {
    MigrationRunner::open(MigrationConfig::for_path(path)).unwrap()
}

/// Looks up a built-in migration.
fn migration(id: &str) -> Migration {
    find_migration(id).unwrap()
}

/// Counts columns named `column`.
fn column_count(runner: &MigrationRunner, table: &str, column: &str) -> usize {
    runner.table_columns(table).unwrap().iter().filter(|info| info.name == column).count()
}

// ============================================================================
// SECTION: Apply
// ============================================================================

#[test]
fn add_description_twice_leaves_one_column() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);

    let first = runner.apply(&migration("add_description")).unwrap();
    assert_eq!(first.applied(), 1);
    let second = runner.apply(&migration("add_description")).unwrap();
    assert_eq!(second.applied(), 0);
    assert_eq!(second.skipped(), 1);
    assert_eq!(column_count(&runner, "food", "description"), 1);
}

#[test]
fn serving_size_backfill_runs_only_when_column_is_added() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    let report = runner.apply(&migration("add_default_serving_size")).unwrap();
    assert_eq!(report.steps[0].outcome, StepOutcome::Applied);
    assert_eq!(report.steps[0].rows_updated, 2, "only categorised foods are rewritten");
    drop(runner);

    let conn = Connection::open(&path).unwrap();
    let sizes: Vec<f64> = conn
        .prepare("SELECT default_serving_size_grams FROM food ORDER BY id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(sizes, vec![150.0, 250.0, 100.0]);
    conn.execute("UPDATE food SET default_serving_size_grams = 42 WHERE id = 1", []).unwrap();
    drop(conn);

    let mut runner = open(&path);
    let report = runner.apply(&migration("add_default_serving_size")).unwrap();
    assert_eq!(report.steps[0].outcome, StepOutcome::Skipped);
    assert_eq!(report.steps[0].rows_updated, 0);
    drop(runner);
    let conn = Connection::open(&path).unwrap();
    let apple: f64 = conn
        .query_row("SELECT default_serving_size_grams FROM food WHERE id = 1", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert!((apple - 42.0).abs() < f64::EPSILON, "manual edit must survive a rerun");
}

#[test]
fn goal_date_is_backfilled_from_created_at() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    let report = runner.apply(&migration("add_goal_timing_fields")).unwrap();
    assert_eq!(report.applied(), 3);
    assert_eq!(report.steps[0].rows_updated, 1);
    drop(runner);

    let conn = Connection::open(&path).unwrap();
    let goal_date: String =
        conn.query_row("SELECT goal_date FROM nutrition_goal", [], |row| row.get(0)).unwrap();
    assert_eq!(goal_date, "2025-02-01 08:00:00");
}

#[test]
fn missing_table_rolls_back_the_whole_migration() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    let broken = Migration {
        id: "broken",
        description: "second step targets a missing table",
        steps: vec![
            Step::AddColumn {
                table: "food",
                column: "brand",
                definition: "TEXT",
                backfill: &[],
            },
            Step::AddColumn {
                table: "recipe",
                column: "servings",
                definition: "INTEGER",
                backfill: &[],
            },
        ],
    };
    let err = runner.apply(&broken).unwrap_err();
    assert_eq!(
        err,
        MigrateError::MissingTable {
            table: "recipe".to_string()
        }
    );
    assert_eq!(column_count(&runner, "food", "brand"), 0);
}

#[test]
fn apply_all_stops_at_first_failure_and_keeps_earlier_commits() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    let broken = Migration {
        id: "recipe_servings",
        description: "targets a table the application never created",
        steps: vec![Step::AddColumn {
            table: "recipe",
            column: "servings",
            definition: "INTEGER",
            backfill: &[],
        }],
    };
    let sequence = [migration("add_description"), broken, migration("add_target_weight")];

    let err = runner.apply_all(&sequence).unwrap_err();
    assert_eq!(
        err,
        MigrateError::MissingTable {
            table: "recipe".to_string()
        }
    );
    assert_eq!(column_count(&runner, "food", "description"), 1);
    assert_eq!(column_count(&runner, "nutrition_goal", "target_weight"), 0);
    drop(runner);

    let runner = open(&path);
    assert_eq!(column_count(&runner, "food", "description"), 1, "earlier commit must persist");
}

#[test]
fn unsafe_identifiers_are_refused_before_execution() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    let hostile = Migration {
        id: "hostile",
        description: "identifier carries sql",
        steps: vec![Step::AddColumn {
            table: "food",
            column: "x\" INTEGER; DROP TABLE food; --",
            definition: "TEXT",
            backfill: &[],
        }],
    };
    assert!(matches!(runner.apply(&hostile), Err(MigrateError::Invalid(_))));
    assert!(runner.table_names().unwrap().contains(&"food".to_string()));
}

#[test]
fn uom_support_adds_columns_and_index() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    let report = runner.apply(&migration("uom_support")).unwrap();
    assert_eq!(report.applied(), 4);
    let columns = runner.table_columns("meal_log").unwrap();
    let unit = columns.iter().find(|info| info.name == "unit_type").unwrap();
    assert!(unit.not_null);
    assert_eq!(unit.default_value.as_deref(), Some("'grams'"));
    drop(runner);

    let conn = Connection::open(&path).unwrap();
    let original: f64 =
        conn.query_row("SELECT original_quantity FROM meal_log", [], |row| row.get(0)).unwrap();
    assert!((original - 150.0).abs() < f64::EPSILON);
    let index: String = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'meal_log'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(index, "idx_meal_log_serving_id");
}

#[test]
fn full_registry_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    let migrations = builtin_migrations();

    let first = runner.apply_all(&migrations).unwrap();
    assert!(first.iter().all(|report| report.skipped() == 0));
    assert!(runner.table_names().unwrap().contains(&"serving_upload_job_item".to_string()));

    let second = runner.apply_all(&migrations).unwrap();
    assert!(second.iter().all(|report| report.applied() == 0), "{second:#?}");
    for migration in &migrations {
        assert_eq!(runner.status(migration).unwrap(), MigrationStatus::Applied, "{}", migration.id);
    }
}

// ============================================================================
// SECTION: Table Rebuilds
// ============================================================================

/// Applies `ids` in order.
fn apply_ids(runner: &mut MigrationRunner, ids: &[&str]) -> Vec<MigrationReport> {
    ids.iter().map(|id| runner.apply(&migration(id)).unwrap()).collect()
}

/// Lists index names on `table`.
fn index_names(path: &Path, table: &str) -> Vec<String> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1")
        .unwrap();
    stmt.query_map([table], |row| row.get(0)).unwrap().collect::<Result<_, _>>().unwrap()
}

#[test]
fn email_becomes_nullable_once_and_keeps_users() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    let email_nullable = migration("email_nullable");
    assert_eq!(runner.status(&email_nullable).unwrap(), MigrationStatus::Pending);

    let reports = apply_ids(&mut runner, &["add_password_changed_at", "email_nullable"]);
    assert_eq!(reports[1].steps[0].outcome, StepOutcome::Applied);
    assert_eq!(reports[1].steps[0].rows_updated, 1);
    let columns = runner.table_columns("user").unwrap();
    let email = columns.iter().find(|info| info.name == "email").unwrap();
    assert!(!email.not_null);
    assert_eq!(column_count(&runner, "user", "password_changed_at"), 1);
    assert_eq!(runner.status(&email_nullable).unwrap(), MigrationStatus::Applied);

    let rerun = runner.apply(&email_nullable).unwrap();
    assert_eq!(rerun.steps[0].outcome, StepOutcome::Skipped);
    assert!(!runner.table_names().unwrap().contains(&"user_new".to_string()));
    drop(runner);

    let indexes = index_names(&path, "user");
    assert!(indexes.contains(&"ix_user_username".to_string()), "{indexes:?}");
    assert!(indexes.contains(&"ix_user_email".to_string()), "{indexes:?}");
    let conn = Connection::open(&path).unwrap();
    let (username, hash): (String, String) = conn
        .query_row("SELECT username, password_hash FROM \"user\" WHERE id = 1", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!((username.as_str(), hash.as_str()), ("admin", "hash"));
    conn.execute(
        "INSERT INTO \"user\" (username, email, password_hash) VALUES ('nomail', NULL, 'h')",
        [],
    )
    .unwrap();
}

#[test]
fn user_ids_are_distinct_version_four_uuids() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "INSERT INTO \"user\" (id, username, email, password_hash) \
         VALUES (2, 'testuser', 'test@example.com', 'hash')",
        [],
    )
    .unwrap();
    drop(conn);

    let mut runner = open(&path);
    let reports =
        apply_ids(&mut runner, &["add_password_changed_at", "email_nullable", "add_user_id"]);
    assert_eq!(reports[2].steps[0].rows_updated, 2);
    let rerun = runner.apply(&migration("add_user_id")).unwrap();
    assert_eq!(rerun.skipped(), 1);
    drop(runner);

    let conn = Connection::open(&path).unwrap();
    let ids: Vec<String> = conn
        .prepare("SELECT user_id FROM \"user\" ORDER BY id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    for id in &ids {
        assert_eq!(id.len(), 36, "{id}");
        assert_eq!(id.as_bytes()[14], b'4', "{id}");
        assert!(matches!(id.as_bytes()[19], b'8' | b'9' | b'a' | b'b'), "{id}");
        assert_eq!(id.matches('-').count(), 4, "{id}");
    }
    assert!(index_names(&path, "user").contains(&"ix_user_user_id".to_string()));
}

#[test]
fn food_serving_rebuild_maps_columns_and_drops_empty_servings() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    let report = runner.apply(&migration("food_serving_model")).unwrap();
    assert_eq!(report.steps[0].outcome, StepOutcome::Applied);
    assert_eq!(report.steps[0].rows_updated, 1);
    assert_eq!(column_count(&runner, "food_serving", "grams_per_unit"), 1);
    assert_eq!(column_count(&runner, "food_serving", "serving_quantity"), 0);
    assert_eq!(runner.apply(&migration("food_serving_model")).unwrap().skipped(), 1);
    drop(runner);

    let conn = Connection::open(&path).unwrap();
    let (unit, grams): (String, f64) = conn
        .query_row("SELECT unit, grams_per_unit FROM food_serving", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(unit, "piece");
    assert!((grams - 182.0).abs() < f64::EPSILON);
    let negative = conn.execute(
        "INSERT INTO food_serving (food_id, serving_name, unit, grams_per_unit) \
         VALUES (1, 'bad', 'g', -5)",
        [],
    );
    assert!(negative.is_err(), "grams per unit must stay positive");
    assert!(index_names(&path, "food_serving").contains(&"ix_food_serving_food_id".to_string()));
}

#[test]
fn rebuild_that_loses_rows_rolls_back() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    let lossy = Migration {
        id: "food_brand",
        description: "copy drops uncategorised foods",
        steps: vec![Step::RebuildTable {
            table: "food",
            staging: "food_new",
            guard: RebuildGuard::ColumnPresent {
                column: "brand",
            },
            ddl: "CREATE TABLE food_new (id INTEGER PRIMARY KEY, name TEXT, category TEXT, \
                  brand TEXT)",
            copy: "INSERT INTO food_new (id, name, category) \
                   SELECT id, name, category FROM food WHERE category IS NOT NULL",
            indexes: &[],
            keep_all_rows: true,
        }],
    };
    let err = runner.apply(&lossy).unwrap_err();
    assert_eq!(err, MigrateError::Invalid("rebuild of food copied 2 of 3 rows".to_string()));
    assert_eq!(column_count(&runner, "food", "brand"), 0);
    assert!(!runner.table_names().unwrap().contains(&"food_new".to_string()));
    assert_eq!(runner.status(&lossy).unwrap(), MigrationStatus::Pending);
}

#[test]
fn leftover_staging_table_blocks_a_rebuild() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE food_serving_new (id INTEGER);").unwrap();
    drop(conn);

    let mut runner = open(&path);
    let err = runner.apply(&migration("food_serving_model")).unwrap_err();
    let MigrateError::Invalid(message) = &err else {
        panic!("expected an invalid-input error, got {err:?}");
    };
    assert!(message.contains("food_serving_new"), "{message}");
    assert_eq!(column_count(&runner, "food_serving", "serving_quantity"), 1);
}

// ============================================================================
// SECTION: Status and Inspection
// ============================================================================

#[test]
fn status_tracks_partial_progress() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let goal_timing = migration("add_goal_timing_fields");
    {
        let runner = open(&path);
        assert_eq!(runner.status(&goal_timing).unwrap(), MigrationStatus::Pending);
    }
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("ALTER TABLE nutrition_goal ADD COLUMN goal_date DATETIME;").unwrap();
    drop(conn);

    let mut runner = open(&path);
    assert_eq!(runner.status(&goal_timing).unwrap(), MigrationStatus::Partial);
    let report = runner.apply(&goal_timing).unwrap();
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.applied(), 2);
    assert_eq!(runner.status(&goal_timing).unwrap(), MigrationStatus::Applied);
}

#[test]
fn status_is_not_applicable_without_target_table() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, "CREATE TABLE food (id INTEGER PRIMARY KEY, name TEXT);");
    let runner = open(&path);
    assert_eq!(
        runner.status(&migration("add_target_weight")).unwrap(),
        MigrationStatus::NotApplicable
    );
    assert_eq!(runner.status(&migration("serving_upload_jobs")).unwrap(), MigrationStatus::Pending);
}

#[test]
fn table_columns_describe_the_schema() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let runner = open(&path);
    let columns = runner.table_columns("meal_log").unwrap();
    let names: Vec<&str> = columns.iter().map(|info| info.name.as_str()).collect();
    assert_eq!(names, vec!["id", "user_id", "food_id", "quantity"]);
    assert_eq!(columns[0].primary_key, 1);
    assert_eq!(columns[3].decl_type, "FLOAT");
    assert!(columns[3].not_null);
    assert_eq!(
        runner.table_columns("recipe").unwrap_err(),
        MigrateError::MissingTable {
            table: "recipe".to_string()
        }
    );
}

// ============================================================================
// SECTION: Open
// ============================================================================

#[test]
fn missing_database_is_not_created_by_default() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("instance").join("nutri_tracker.db");
    let err = MigrationRunner::open(MigrationConfig::for_path(&path)).err().unwrap();
    assert!(matches!(err, MigrateError::NotFound(_)));
    assert!(!path.exists());

    let mut config = MigrationConfig::for_path(&path);
    config.require_existing = false;
    let runner = MigrationRunner::open(config).unwrap();
    assert!(runner.table_names().unwrap().is_empty());
    assert!(path.exists());
}

#[test]
fn directory_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    let err = MigrationRunner::open(MigrationConfig::for_path(dir.path())).err().unwrap();
    assert!(matches!(err, MigrateError::Invalid(_)));
}

#[test]
fn runner_holds_an_exclusive_lock_after_writing() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let mut runner = open(&path);
    runner.apply(&migration("add_description")).unwrap();

    let other = Connection::open(&path).unwrap();
    other.busy_timeout(Duration::from_millis(50)).unwrap();
    let blocked = other.query_row("SELECT COUNT(*) FROM food", [], |row| row.get::<_, i64>(0));
    assert!(blocked.is_err(), "a second connection must not read while the runner is open");
    drop(runner);
    let count = other.query_row("SELECT COUNT(*) FROM food", [], |row| row.get::<_, i64>(0));
    assert_eq!(count.unwrap(), 3);
}

// ============================================================================
// SECTION: Backup
// ============================================================================

#[test]
fn backup_is_verified_and_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir, BASE_SCHEMA);
    let runner = open(&path);
    let dest = dir.path().join("backups").join("nutri_tracker_backup.db");

    let report = runner.backup_to(&dest).unwrap();
    assert!(dest.is_file());
    assert!(report.bytes > 0);
    assert_eq!(report.users, 1);
    for table in ["food", "meal_log", "user"] {
        assert!(report.tables.contains(&table.to_string()));
    }
    assert!(matches!(runner.backup_to(&dest), Err(MigrateError::Invalid(_))));
}

#[test]
fn backup_without_essential_tables_is_deleted() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(
        &dir,
        "CREATE TABLE \"user\" (id INTEGER PRIMARY KEY);
         CREATE TABLE food (id INTEGER PRIMARY KEY);
         INSERT INTO \"user\" VALUES (1);",
    );
    let runner = open(&path);
    let dest = dir.path().join("partial.db");
    let err = runner.backup_to(&dest).unwrap_err();
    assert_eq!(err, MigrateError::BackupInvalid("missing table meal_log".to_string()));
    assert!(!dest.exists());
}

#[test]
fn backup_without_users_is_deleted() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(
        &dir,
        "CREATE TABLE \"user\" (id INTEGER PRIMARY KEY);
         CREATE TABLE food (id INTEGER PRIMARY KEY);
         CREATE TABLE meal_log (id INTEGER PRIMARY KEY);",
    );
    let runner = open(&path);
    let dest = dir.path().join("empty.db");
    let err = runner.backup_to(&dest).unwrap_err();
    assert_eq!(err, MigrateError::BackupInvalid("user table is empty".to_string()));
    assert!(!dest.exists());
}
