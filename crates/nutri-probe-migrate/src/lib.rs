// crates/nutri-probe-migrate/src/lib.rs
// ============================================================================
// Module: Nutri Probe Migrations
// Description: Idempotent schema migrations for the Nutri Tracker database.
// Purpose: Apply, inspect, and back up the SQLite file the application uses.
// Dependencies: rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! The Nutri Tracker database evolves through raw `ALTER TABLE` and
//! `CREATE ... IF NOT EXISTS` statements rather than a versioned migration
//! framework. This crate keeps that model but makes every step idempotent:
//! a column that already exists is skipped, a table or index that already
//! exists is skipped, and backfills only run when their column was just added.
//! Changes `ALTER TABLE` cannot express rebuild the table through a staging
//! copy, guarded by a column check so a finished rebuild is never repeated.
//!
//! [`MigrationRunner`] owns one exclusive connection for the whole session.
//! Each migration runs in its own transaction and either commits completely
//! or leaves the database untouched.

pub mod migration;
pub mod runner;

pub use migration::Migration;
pub use migration::RebuildGuard;
pub use migration::Step;
pub use migration::builtin_migrations;
pub use migration::find_migration;
pub use migration::select_migrations;
pub use runner::BackupReport;
pub use runner::ColumnInfo;
pub use runner::DEFAULT_DB_PATH;
pub use runner::ESSENTIAL_TABLES;
pub use runner::MigrateError;
pub use runner::MigrationConfig;
pub use runner::MigrationReport;
pub use runner::MigrationRunner;
pub use runner::MigrationStatus;
pub use runner::StepOutcome;
pub use runner::StepReport;
