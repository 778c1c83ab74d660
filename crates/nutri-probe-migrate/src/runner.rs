// crates/nutri-probe-migrate/src/runner.rs
// ============================================================================
// Module: Migration Runner
// Description: Exclusive SQLite connection that applies and inspects migrations.
// Purpose: Make schema changes idempotent, transactional, and reportable.
// Dependencies: rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`MigrationRunner`] opens the application database once, takes an
//! exclusive lock, and applies [`Migration`]s one transaction at a time.
//! Before each step the runner inspects `sqlite_master` and
//! `pragma_table_info` so a step that is already present is skipped rather
//! than failing on a duplicate column.
//! Backups use `VACUUM INTO` and are verified before they are reported.
//!
//! Security posture: migrations are compiled in; only table names read back
//! from the command line reach SQL, and those are bound as parameters.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::migration::Migration;
use crate::migration::RebuildGuard;
use crate::migration::Step;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Database location used by the application.
pub const DEFAULT_DB_PATH: &str = "instance/nutri_tracker.db";
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Tables a usable backup must contain.
pub const ESSENTIAL_TABLES: [&str; 3] = ["user", "food", "meal_log"];

// ============================================================================
// SECTION: Config
// ============================================================================

/// Migration runner configuration.
///
/// # Invariants
/// - `path` names a file, never a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Path to the `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Refuse to create the database when it does not exist.
    #[serde(default = "default_require_existing")]
    pub require_existing: bool,
}

impl MigrationConfig {
    /// Returns the default configuration pointed at `path`.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            require_existing: default_require_existing(),
        }
    }
}

/// Default for [`MigrationConfig::path`].
fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

/// Default for [`MigrationConfig::busy_timeout_ms`].
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default for [`MigrationConfig::require_existing`].
const fn default_require_existing() -> bool {
    true
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Migration errors.
///
/// # Invariants
/// - Messages name tables and paths only, never row data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MigrateError {
    /// Filesystem error.
    #[error("migration io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("migration db error: {0}")]
    Db(String),
    /// Invalid path, identifier, or migration definition.
    #[error("migration invalid input: {0}")]
    Invalid(String),
    /// Database file does not exist and creation is disabled.
    #[error("database not found: {0}")]
    NotFound(String),
    /// A step targets a table that does not exist.
    #[error("table {table} does not exist")]
    MissingTable {
        /// Missing table name.
        table: String,
    },
    /// Identifier not present in the registry.
    #[error("unknown migration: {0}")]
    UnknownMigration(String),
    /// Backup copy failed verification and was removed.
    #[error("backup verification failed: {0}")]
    BackupInvalid(String),
}

/// Maps a driver error into [`MigrateError::Db`].
fn db_err(err: rusqlite::Error) -> MigrateError {
    MigrateError::Db(err.to_string())
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step changed the schema or data.
    Applied,
    /// The change was already present.
    Skipped,
}

/// Per-step report line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Step label, e.g. `add column food.description`.
    pub label: String,
    /// Step outcome.
    pub outcome: StepOutcome,
    /// Rows touched by backfills or updates.
    pub rows_updated: usize,
}

/// Report for one migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Migration identifier.
    pub id: String,
    /// Step reports in execution order.
    pub steps: Vec<StepReport>,
}

impl MigrationReport {
    /// Number of applied steps.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.steps.iter().filter(|step| step.outcome == StepOutcome::Applied).count()
    }

    /// Number of skipped steps.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.steps.iter().filter(|step| step.outcome == StepOutcome::Skipped).count()
    }
}

/// Observed state of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Every checkable step is present.
    Applied,
    /// No checkable step is present.
    Pending,
    /// Some checkable steps are present.
    Partial,
    /// A target table is missing, so the migration cannot run here.
    NotApplicable,
}

impl MigrationStatus {
    /// Returns a lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::NotApplicable => "not_applicable",
        }
    }
}

/// Column description from `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Column position.
    pub cid: i64,
    /// Column name.
    pub name: String,
    /// Declared type, possibly empty.
    pub decl_type: String,
    /// Whether the column is `NOT NULL`.
    pub not_null: bool,
    /// Default expression text.
    pub default_value: Option<String>,
    /// Position in the primary key (0 when not part of it).
    pub primary_key: i64,
}

/// Outcome of a verified backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    /// Backup file path.
    pub path: PathBuf,
    /// Backup size in bytes.
    pub bytes: u64,
    /// Tables found in the copy.
    pub tables: Vec<String>,
    /// Rows in the `user` table of the copy.
    pub users: i64,
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Exclusive migration session over one database file.
pub struct MigrationRunner {
    /// Runner configuration.
    config: MigrationConfig,
    /// Exclusive connection.
    connection: Connection,
}

impl MigrationRunner {
    /// Opens the database and takes an exclusive lock on first access.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError`] when the path is invalid, the file is missing
    /// while `require_existing` is set, or `SQLite` cannot open it.
    pub fn open(config: MigrationConfig) -> Result<Self, MigrateError> {
        validate_db_path(&config.path)?;
        if config.require_existing {
            if !config.path.is_file() {
                return Err(MigrateError::NotFound(config.path.display().to_string()));
            }
        } else {
            ensure_parent_dir(&config.path)?;
        }
        let connection = open_connection(&config)?;
        Ok(Self {
            config,
            connection,
        })
    }

    /// Returns the runner configuration.
    #[must_use]
    pub const fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Applies one migration inside a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError`] when a target table is missing or a statement
    /// fails; nothing from the migration is committed in that case.
    pub fn apply(&mut self, migration: &Migration) -> Result<MigrationReport, MigrateError> {
        migration.validate()?;
        let rebuilds = migration.steps.iter().any(|step| matches!(step, Step::RebuildTable { .. }));
        if !rebuilds {
            return self.apply_in_transaction(migration);
        }
        // Foreign key enforcement cannot change inside a transaction.
        self.connection.execute_batch("PRAGMA foreign_keys = OFF;").map_err(db_err)?;
        let applied = self.apply_in_transaction(migration);
        let restored = self.connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err);
        let report = applied?;
        restored?;
        Ok(report)
    }

    /// Runs every step of `migration` in one transaction.
    fn apply_in_transaction(
        &mut self,
        migration: &Migration,
    ) -> Result<MigrationReport, MigrateError> {
        let tx = self.connection.transaction().map_err(db_err)?;
        let mut steps = Vec::with_capacity(migration.steps.len());
        for step in &migration.steps {
            steps.push(apply_step(&tx, step)?);
        }
        tx.commit().map_err(db_err)?;
        Ok(MigrationReport {
            id: migration.id.to_string(),
            steps,
        })
    }

    /// Applies migrations in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`MigrateError`]; earlier migrations stay committed.
    pub fn apply_all(
        &mut self,
        migrations: &[Migration],
    ) -> Result<Vec<MigrationReport>, MigrateError> {
        migrations.iter().map(|migration| self.apply(migration)).collect()
    }

    /// Reports whether a migration is already present without changing anything.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Db`] when the schema cannot be read.
    pub fn status(&self, migration: &Migration) -> Result<MigrationStatus, MigrateError> {
        let mut checkable = 0_usize;
        let mut present = 0_usize;
        for step in &migration.steps {
            let found = match step {
                Step::AddColumn {
                    table,
                    column,
                    ..
                } => {
                    if !object_exists(&self.connection, "table", table)? {
                        return Ok(MigrationStatus::NotApplicable);
                    }
                    column_exists(&self.connection, table, column)?
                }
                Step::CreateTable {
                    table, ..
                } => object_exists(&self.connection, "table", table)?,
                Step::CreateIndex {
                    index, ..
                } => object_exists(&self.connection, "index", index)?,
                Step::Update {
                    ..
                } => continue,
                Step::RebuildTable {
                    table,
                    guard,
                    ..
                } => {
                    if !object_exists(&self.connection, "table", table)? {
                        return Ok(MigrationStatus::NotApplicable);
                    }
                    guard_holds(&self.connection, table, *guard)?
                }
            };
            checkable += 1;
            if found {
                present += 1;
            }
        }
        Ok(match present {
            0 => MigrationStatus::Pending,
            _ if present == checkable => MigrationStatus::Applied,
            _ => MigrationStatus::Partial,
        })
    }

    /// Lists the columns of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MissingTable`] when the table does not exist.
    pub fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, MigrateError> {
        if !object_exists(&self.connection, "table", table)? {
            return Err(MigrateError::MissingTable {
                table: table.to_string(),
            });
        }
        read_columns(&self.connection, table)
    }

    /// Lists user tables in name order.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Db`] when the schema cannot be read.
    pub fn table_names(&self) -> Result<Vec<String>, MigrateError> {
        read_table_names(&self.connection)
    }

    /// Writes a compacted copy of the database to `dest` and verifies it.
    ///
    /// The copy must contain [`ESSENTIAL_TABLES`] and at least one user row.
    /// A copy that fails verification is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Invalid`] when `dest` already exists and
    /// [`MigrateError::BackupInvalid`] when verification fails.
    pub fn backup_to(&self, dest: &Path) -> Result<BackupReport, MigrateError> {
        validate_db_path(dest)?;
        if dest.exists() {
            return Err(MigrateError::Invalid(format!(
                "backup destination already exists: {}",
                dest.display()
            )));
        }
        ensure_parent_dir(dest)?;
        let Some(dest_str) = dest.to_str() else {
            return Err(MigrateError::Invalid("backup path must be valid utf-8".to_string()));
        };
        self.connection.execute("VACUUM INTO ?1", params![dest_str]).map_err(db_err)?;
        match verify_backup(dest) {
            Ok(report) => Ok(report),
            Err(err) => {
                let _ = std::fs::remove_file(dest);
                Err(err)
            }
        }
    }
}

// ============================================================================
// SECTION: Steps
// ============================================================================

/// Applies one step on the open transaction.
fn apply_step(connection: &Connection, step: &Step) -> Result<StepReport, MigrateError> {
    let label = step.label();
    let (outcome, rows_updated) = match step {
        Step::AddColumn {
            table,
            column,
            definition,
            backfill,
        } => {
            if !object_exists(connection, "table", table)? {
                return Err(MigrateError::MissingTable {
                    table: (*table).to_string(),
                });
            }
            if column_exists(connection, table, column)? {
                (StepOutcome::Skipped, 0)
            } else {
                connection
                    .execute_batch(&format!(
                        "ALTER TABLE \"{table}\" ADD COLUMN \"{column}\" {definition};"
                    ))
                    .map_err(db_err)?;
                let mut rows = 0;
                for sql in *backfill {
                    rows += connection.execute(sql, params![]).map_err(db_err)?;
                }
                (StepOutcome::Applied, rows)
            }
        }
        Step::CreateTable {
            table,
            ddl,
        } => create_object(connection, "table", table, ddl)?,
        Step::CreateIndex {
            index,
            ddl,
        } => create_object(connection, "index", index, ddl)?,
        Step::Update {
            sql,
        } => (StepOutcome::Applied, connection.execute(sql, params![]).map_err(db_err)?),
        Step::RebuildTable {
            table,
            staging,
            guard,
            ddl,
            copy,
            indexes,
            keep_all_rows,
        } => {
            if !object_exists(connection, "table", table)? {
                return Err(MigrateError::MissingTable {
                    table: (*table).to_string(),
                });
            }
            if guard_holds(connection, table, *guard)? {
                (StepOutcome::Skipped, 0)
            } else {
                let rebuild = Rebuild {
                    table,
                    staging,
                    guard: *guard,
                    ddl,
                    copy,
                    indexes,
                    keep_all_rows: *keep_all_rows,
                };
                (StepOutcome::Applied, rebuild_table(connection, &rebuild)?)
            }
        }
    };
    Ok(StepReport {
        label,
        outcome,
        rows_updated,
    })
}

/// Runs `ddl` unless an object of `kind` named `name` already exists.
fn create_object(
    connection: &Connection,
    kind: &str,
    name: &str,
    ddl: &str,
) -> Result<(StepOutcome, usize), MigrateError> {
    if object_exists(connection, kind, name)? {
        return Ok((StepOutcome::Skipped, 0));
    }
    connection.execute_batch(ddl).map_err(db_err)?;
    Ok((StepOutcome::Applied, 0))
}

/// Borrowed view of a [`Step::RebuildTable`].
struct Rebuild<'a> {
    /// Table being rebuilt.
    table: &'a str,
    /// Staging table name.
    staging: &'a str,
    /// Condition that must hold afterwards.
    guard: RebuildGuard,
    /// Staging table DDL.
    ddl: &'a str,
    /// Copy statement.
    copy: &'a str,
    /// Index DDL run after the rename.
    indexes: &'a [&'static str],
    /// Require every source row to be copied.
    keep_all_rows: bool,
}

/// Copies `table` into a staging table and swaps it in; returns rows copied.
fn rebuild_table(connection: &Connection, rebuild: &Rebuild<'_>) -> Result<usize, MigrateError> {
    let Rebuild {
        table,
        staging,
        ..
    } = *rebuild;
    if object_exists(connection, "table", staging)? {
        return Err(MigrateError::Invalid(format!(
            "staging table {staging} already exists; drop it before rebuilding {table}"
        )));
    }
    connection.execute_batch(rebuild.ddl).map_err(db_err)?;
    if !object_exists(connection, "table", staging)? {
        return Err(MigrateError::Invalid(format!(
            "rebuild of {table} did not create staging table {staging}"
        )));
    }
    let copied = connection.execute(rebuild.copy, params![]).map_err(db_err)?;
    if rebuild.keep_all_rows {
        let source = row_count(connection, table)?;
        if source != copied {
            return Err(MigrateError::Invalid(format!(
                "rebuild of {table} copied {copied} of {source} rows"
            )));
        }
    }
    connection
        .execute_batch(&format!(
            "DROP TABLE \"{table}\"; ALTER TABLE \"{staging}\" RENAME TO \"{table}\";"
        ))
        .map_err(db_err)?;
    for index in rebuild.indexes {
        connection.execute_batch(index).map_err(db_err)?;
    }
    if !guard_holds(connection, table, rebuild.guard)? {
        return Err(MigrateError::Invalid(format!(
            "rebuild of {table} left column {} in the wrong state",
            rebuild.guard.column()
        )));
    }
    Ok(copied)
}

// ============================================================================
// SECTION: Schema Inspection
// ============================================================================

/// Returns true when the rebuilt shape of `table` is already in place.
fn guard_holds(
    connection: &Connection,
    table: &str,
    guard: RebuildGuard,
) -> Result<bool, MigrateError> {
    let columns = read_columns(connection, table)?;
    let column = columns.iter().find(|info| info.name == guard.column());
    Ok(match guard {
        RebuildGuard::ColumnPresent {
            ..
        } => column.is_some(),
        RebuildGuard::ColumnAbsent {
            ..
        } => column.is_none(),
        RebuildGuard::ColumnNullable {
            ..
        } => column.is_some_and(|info| !info.not_null),
    })
}

/// Counts rows in `table`.
fn row_count(connection: &Connection, table: &str) -> Result<usize, MigrateError> {
    let count: i64 = connection
        .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), params![], |row| row.get(0))
        .map_err(db_err)?;
    usize::try_from(count).map_err(|_| MigrateError::Db(format!("negative row count for {table}")))
}

/// Returns true when `sqlite_master` lists an object of this kind.
fn object_exists(connection: &Connection, kind: &str, name: &str) -> Result<bool, MigrateError> {
    let found: Option<i64> = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2",
            params![kind, name],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)?;
    Ok(found.is_some())
}

/// Returns true when the table has the column.
fn column_exists(connection: &Connection, table: &str, column: &str) -> Result<bool, MigrateError> {
    Ok(read_columns(connection, table)?.iter().any(|info| info.name == column))
}

/// Reads `pragma_table_info` rows for a table.
fn read_columns(connection: &Connection, table: &str) -> Result<Vec<ColumnInfo>, MigrateError> {
    let mut stmt = connection
        .prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) \
             ORDER BY cid",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map(params![table], |row| {
            Ok(ColumnInfo {
                cid: row.get(0)?,
                name: row.get(1)?,
                decl_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                default_value: row.get(4)?,
                primary_key: row.get(5)?,
            })
        })
        .map_err(db_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
}

/// Lists user tables in name order.
fn read_table_names(connection: &Connection) -> Result<Vec<String>, MigrateError> {
    let mut stmt = connection
        .prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .map_err(db_err)?;
    let rows = stmt.query_map(params![], |row| row.get(0)).map_err(db_err)?;
    rows.collect::<Result<Vec<String>, _>>().map_err(db_err)
}

/// Opens a backup read-only and checks it is usable.
fn verify_backup(path: &Path) -> Result<BackupReport, MigrateError> {
    let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|err| MigrateError::BackupInvalid(err.to_string()))?;
    let tables = read_table_names(&connection)?;
    for essential in ESSENTIAL_TABLES {
        if !tables.iter().any(|table| table == essential) {
            return Err(MigrateError::BackupInvalid(format!("missing table {essential}")));
        }
    }
    let users: i64 = connection
        .query_row("SELECT COUNT(*) FROM \"user\"", params![], |row| row.get(0))
        .map_err(db_err)?;
    if users == 0 {
        return Err(MigrateError::BackupInvalid("user table is empty".to_string()));
    }
    drop(connection);
    let bytes = std::fs::metadata(path).map_err(|err| MigrateError::Io(err.to_string()))?.len();
    Ok(BackupReport {
        path: path.to_path_buf(),
        bytes,
        tables,
        users,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for a database file exists.
fn ensure_parent_dir(path: &Path) -> Result<(), MigrateError> {
    let Some(parent) = path.parent() else {
        return Err(MigrateError::Io("database path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| MigrateError::Io(err.to_string()))
}

/// Validates database paths for safety limits.
fn validate_db_path(path: &Path) -> Result<(), MigrateError> {
    if path.as_os_str().is_empty() {
        return Err(MigrateError::Invalid("database path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(MigrateError::Invalid("database path exceeds length limit".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(MigrateError::Invalid(
            "database path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(MigrateError::Invalid(
            "database path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens the connection and applies session pragmas.
fn open_connection(config: &MigrationConfig) -> Result<Connection, MigrateError> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    if !config.require_existing {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_err)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
    connection.execute_batch("PRAGMA locking_mode = EXCLUSIVE;").map_err(db_err)?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_err)?;
    Ok(connection)
}
