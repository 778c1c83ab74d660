// crates/nutri-probe-migrate/src/migration.rs
// ============================================================================
// Module: Migration Registry
// Description: Migration and step definitions plus the built-in registry.
// Purpose: Describe schema changes declaratively so they can be checked first.
// Dependencies: none
// ============================================================================

//! ## Overview
//! A [`Migration`] is an ordered list of [`Step`]s. Steps are declarative so
//! the runner can ask whether a change is already present before making it,
//! and so `status` can report progress without touching the schema.
//!
//! The built-in registry reproduces the schema changes the Nutri Tracker
//! application has accumulated, in the order they were introduced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::runner::MigrateError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One schema change.
///
/// # Invariants
/// - `table`, `column`, and `index` are plain SQL identifiers
///   (see [`Migration::validate`]).
/// - `CreateTable` and `CreateIndex` DDL uses `IF NOT EXISTS`.
/// - `RebuildTable` index DDL uses `IF NOT EXISTS` and targets the final
///   table name, never the staging name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `ALTER TABLE .. ADD COLUMN`, skipped when the column exists.
    AddColumn {
        /// Table receiving the column.
        table: &'static str,
        /// New column name.
        column: &'static str,
        /// Column type and constraints.
        definition: &'static str,
        /// Statements run only when the column was added.
        backfill: &'static [&'static str],
    },
    /// `CREATE TABLE IF NOT EXISTS`.
    CreateTable {
        /// Table name, used to detect an existing table.
        table: &'static str,
        /// Full DDL statement.
        ddl: &'static str,
    },
    /// `CREATE INDEX IF NOT EXISTS`.
    CreateIndex {
        /// Index name, used to detect an existing index.
        index: &'static str,
        /// Full DDL statement.
        ddl: &'static str,
    },
    /// Unconditional data update.
    Update {
        /// Statement to execute.
        sql: &'static str,
    },
    /// Recreates a table through a staging copy, for changes `ALTER TABLE`
    /// cannot make. Skipped when `guard` already holds.
    RebuildTable {
        /// Table being rebuilt.
        table: &'static str,
        /// Staging table created by `ddl` and renamed over `table`.
        staging: &'static str,
        /// Condition that holds once the rebuild is in place.
        guard: RebuildGuard,
        /// `CREATE TABLE` statement for the staging table.
        ddl: &'static str,
        /// `INSERT INTO staging .. SELECT .. FROM table` statement.
        copy: &'static str,
        /// Indexes recreated on the rebuilt table.
        indexes: &'static [&'static str],
        /// Fail when the copy does not carry every source row.
        keep_all_rows: bool,
    },
}

/// Schema condition that marks a table rebuild as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildGuard {
    /// The rebuilt table has this column.
    ColumnPresent {
        /// Column name.
        column: &'static str,
    },
    /// The rebuilt table no longer has this column.
    ColumnAbsent {
        /// Column name.
        column: &'static str,
    },
    /// The column exists and accepts NULL.
    ColumnNullable {
        /// Column name.
        column: &'static str,
    },
}

impl RebuildGuard {
    /// Returns the column the guard inspects.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::ColumnPresent {
                column,
            }
            | Self::ColumnAbsent {
                column,
            }
            | Self::ColumnNullable {
                column,
            } => column,
        }
    }
}

impl Step {
    /// Returns a short label such as `add column food.description`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::AddColumn {
                table,
                column,
                ..
            } => format!("add column {table}.{column}"),
            Self::CreateTable {
                table, ..
            } => format!("create table {table}"),
            Self::CreateIndex {
                index, ..
            } => format!("create index {index}"),
            Self::Update {
                ..
            } => "update rows".to_string(),
            Self::RebuildTable {
                table, ..
            } => format!("rebuild table {table}"),
        }
    }
}

/// Named, ordered group of steps applied in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Stable identifier used on the command line.
    pub id: &'static str,
    /// One-line summary.
    pub description: &'static str,
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

impl Migration {
    /// Checks that every identifier the runner interpolates is a plain name.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Invalid`] when the migration has no steps or
    /// names a table, column, or index that is not a plain identifier.
    pub fn validate(&self) -> Result<(), MigrateError> {
        if self.steps.is_empty() {
            return Err(MigrateError::Invalid(format!("migration {} has no steps", self.id)));
        }
        for step in &self.steps {
            match step {
                Step::AddColumn {
                    table,
                    column,
                    ..
                } => {
                    validate_identifier(table)?;
                    validate_identifier(column)?;
                }
                Step::CreateTable {
                    table, ..
                } => validate_identifier(table)?,
                Step::CreateIndex {
                    index, ..
                } => validate_identifier(index)?,
                Step::Update {
                    ..
                } => {}
                Step::RebuildTable {
                    table,
                    staging,
                    guard,
                    ..
                } => {
                    validate_identifier(table)?;
                    validate_identifier(staging)?;
                    validate_identifier(guard.column())?;
                    if table == staging {
                        return Err(MigrateError::Invalid(format!(
                            "rebuild of {table} needs a distinct staging table"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn validate_identifier(name: &str) -> Result<(), MigrateError> {
    let mut chars = name.chars();
    let valid_head = chars.next().is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
    if valid_head && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        Ok(())
    } else {
        Err(MigrateError::Invalid(format!("not a plain sql identifier: {name:?}")))
    }
}

// ============================================================================
// SECTION: Built-in Registry
// ============================================================================

/// Serving size defaults by food category, in grams.
const CATEGORY_SERVING_BACKFILL: &str = "UPDATE food SET default_serving_size_grams = CASE category
    WHEN 'Dairy' THEN 250
    WHEN 'Grains' THEN 50
    WHEN 'Vegetables' THEN 100
    WHEN 'Fruits' THEN 150
    WHEN 'Proteins' THEN 100
    WHEN 'Legumes' THEN 50
    WHEN 'Nuts' THEN 30
    WHEN 'Beverages' THEN 250
    WHEN 'Snacks' THEN 30
    WHEN 'Oils' THEN 15
    WHEN 'Spices' THEN 5
    WHEN 'Condiments' THEN 15
    END
    WHERE category IN ('Dairy', 'Grains', 'Vegetables', 'Fruits', 'Proteins', 'Legumes',
        'Nuts', 'Beverages', 'Snacks', 'Oils', 'Spices', 'Condiments')";

/// User table with a nullable email.
const USER_EMAIL_NULLABLE_DDL: &str = "CREATE TABLE user_new (
    id INTEGER PRIMARY KEY,
    username VARCHAR(80) NOT NULL UNIQUE,
    email VARCHAR(120) NULL,
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
    activity_level VARCHAR(20),
    password_changed_at DATETIME
)";

/// Copies users into the staging table unchanged.
const USER_EMAIL_NULLABLE_COPY: &str = "INSERT INTO user_new (id, username, email, \
     password_hash, is_admin, is_active, created_at, last_login, first_name, last_name, age, \
     gender, height, weight, activity_level, password_changed_at) \
     SELECT id, username, email, password_hash, is_admin, is_active, created_at, last_login, \
     first_name, last_name, age, gender, height, weight, activity_level, password_changed_at \
     FROM \"user\"";

/// User table with a public UUID identifier.
const USER_WITH_USER_ID_DDL: &str = "CREATE TABLE user_new (
    id INTEGER PRIMARY KEY,
    user_id VARCHAR(36) NOT NULL UNIQUE,
    username VARCHAR(80) NOT NULL UNIQUE,
    email VARCHAR(120) NULL,
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
    activity_level VARCHAR(20),
    password_changed_at DATETIME
)";

/// Copies users into the staging table, minting a version 4 UUID per row.
const USER_WITH_USER_ID_COPY: &str = "INSERT INTO user_new (user_id, id, username, email, \
     password_hash, is_admin, is_active, created_at, last_login, first_name, last_name, age, \
     gender, height, weight, activity_level, password_changed_at) \
     SELECT lower(hex(randomblob(4)) || '-' || hex(randomblob(2)) || '-4' || \
     substr(hex(randomblob(2)), 2) || '-' || substr('89ab', 1 + (abs(random()) % 4), 1) || \
     substr(hex(randomblob(2)), 2) || '-' || hex(randomblob(6))), id, username, email, \
     password_hash, is_admin, is_active, created_at, last_login, first_name, last_name, age, \
     gender, height, weight, activity_level, password_changed_at FROM \"user\"";

/// Serving table keyed by unit with a positive gram weight per unit.
const FOOD_SERVING_DDL: &str = "CREATE TABLE food_serving_new (
    id INTEGER NOT NULL,
    food_id INTEGER NOT NULL,
    serving_name VARCHAR(50) NOT NULL,
    unit VARCHAR(20) NOT NULL,
    grams_per_unit FLOAT NOT NULL,
    created_at DATETIME,
    created_by INTEGER,
    PRIMARY KEY (id),
    FOREIGN KEY (food_id) REFERENCES food (id) ON DELETE CASCADE,
    FOREIGN KEY (created_by) REFERENCES user (id),
    CONSTRAINT uq_food_serving_name_unit UNIQUE (food_id, serving_name, unit),
    CONSTRAINT ck_grams_per_unit_positive CHECK (grams_per_unit > 0)
)";

/// Maps legacy serving columns; servings without a positive quantity are dropped.
const FOOD_SERVING_COPY: &str = "INSERT INTO food_serving_new \
     (id, food_id, serving_name, unit, grams_per_unit, created_at, created_by) \
     SELECT id, food_id, serving_name, serving_unit, serving_quantity, created_at, NULL \
     FROM food_serving WHERE serving_quantity > 0";

/// Bulk serving upload job table.
const SERVING_UPLOAD_JOB_DDL: &str = "CREATE TABLE IF NOT EXISTS serving_upload_job (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id VARCHAR(36) UNIQUE NOT NULL,
    filename VARCHAR(255) NOT NULL,
    total_rows INTEGER DEFAULT 0,
    processed_rows INTEGER DEFAULT 0,
    successful_rows INTEGER DEFAULT 0,
    failed_rows INTEGER DEFAULT 0,
    status VARCHAR(20) DEFAULT 'pending',
    error_message TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    started_at DATETIME,
    completed_at DATETIME,
    created_by INTEGER NOT NULL,
    FOREIGN KEY (created_by) REFERENCES user (id)
)";

/// Per-row results of a serving upload job.
const SERVING_UPLOAD_JOB_ITEM_DDL: &str = "CREATE TABLE IF NOT EXISTS serving_upload_job_item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL,
    row_number INTEGER NOT NULL,
    food_key VARCHAR(50),
    serving_name VARCHAR(100),
    status VARCHAR(20) DEFAULT 'pending',
    error_message TEXT,
    serving_id INTEGER,
    processed_at DATETIME,
    FOREIGN KEY (job_id) REFERENCES serving_upload_job (id) ON DELETE CASCADE,
    FOREIGN KEY (serving_id) REFERENCES food_serving (id)
)";

/// Returns the built-in migrations in the order they must be applied.
#[must_use]
pub fn builtin_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "add_description",
            description: "Add a free-text description to foods",
            steps: vec![Step::AddColumn {
                table: "food",
                column: "description",
                definition: "TEXT",
                backfill: &[],
            }],
        },
        Migration {
            id: "add_default_serving_id",
            description: "Link foods to their default serving",
            steps: vec![Step::AddColumn {
                table: "food",
                column: "default_serving_id",
                definition: "INTEGER",
                backfill: &[],
            }],
        },
        Migration {
            id: "add_default_serving_size",
            description: "Store a default serving size in grams per food",
            steps: vec![Step::AddColumn {
                table: "food",
                column: "default_serving_size_grams",
                definition: "FLOAT DEFAULT 100.0",
                backfill: &[
                    CATEGORY_SERVING_BACKFILL,
                    "UPDATE food SET default_serving_size_grams = 100.0 \
                     WHERE default_serving_size_grams IS NULL",
                ],
            }],
        },
        Migration {
            id: "add_target_weight",
            description: "Add a target weight to nutrition goals",
            steps: vec![Step::AddColumn {
                table: "nutrition_goal",
                column: "target_weight",
                definition: "FLOAT",
                backfill: &[],
            }],
        },
        Migration {
            id: "add_goal_timing_fields",
            description: "Add goal date, duration, and target date to nutrition goals",
            steps: vec![
                Step::AddColumn {
                    table: "nutrition_goal",
                    column: "goal_date",
                    definition: "DATETIME",
                    backfill: &[
                        "UPDATE nutrition_goal SET goal_date = created_at WHERE goal_date IS NULL",
                    ],
                },
                Step::AddColumn {
                    table: "nutrition_goal",
                    column: "target_duration",
                    definition: "VARCHAR(20)",
                    backfill: &[],
                },
                Step::AddColumn {
                    table: "nutrition_goal",
                    column: "target_date",
                    definition: "DATE",
                    backfill: &[],
                },
            ],
        },
        Migration {
            id: "add_password_changed_at",
            description: "Track when each user last changed their password",
            steps: vec![Step::AddColumn {
                table: "user",
                column: "password_changed_at",
                definition: "DATETIME",
                backfill: &[
                    "UPDATE \"user\" SET password_changed_at = CURRENT_TIMESTAMP \
                     WHERE password_changed_at IS NULL",
                ],
            }],
        },
        Migration {
            id: "email_nullable",
            description: "Allow users without an email address",
            steps: vec![Step::RebuildTable {
                table: "user",
                staging: "user_new",
                guard: RebuildGuard::ColumnNullable {
                    column: "email",
                },
                ddl: USER_EMAIL_NULLABLE_DDL,
                copy: USER_EMAIL_NULLABLE_COPY,
                indexes: &[
                    "CREATE UNIQUE INDEX IF NOT EXISTS ix_user_username ON \"user\" (username)",
                    "CREATE INDEX IF NOT EXISTS ix_user_email ON \"user\" (email)",
                ],
                keep_all_rows: true,
            }],
        },
        Migration {
            id: "add_user_id",
            description: "Give every user a stable public UUID",
            steps: vec![Step::RebuildTable {
                table: "user",
                staging: "user_new",
                guard: RebuildGuard::ColumnPresent {
                    column: "user_id",
                },
                ddl: USER_WITH_USER_ID_DDL,
                copy: USER_WITH_USER_ID_COPY,
                indexes: &[
                    "CREATE UNIQUE INDEX IF NOT EXISTS ix_user_user_id ON \"user\" (user_id)",
                    "CREATE UNIQUE INDEX IF NOT EXISTS ix_user_username ON \"user\" (username)",
                    "CREATE INDEX IF NOT EXISTS ix_user_email ON \"user\" (email)",
                ],
                keep_all_rows: true,
            }],
        },
        Migration {
            id: "meal_log_columns",
            description: "Record logged grams, sugar, and sodium on meal logs",
            steps: vec![
                Step::AddColumn {
                    table: "meal_log",
                    column: "logged_grams",
                    definition: "FLOAT",
                    backfill: &[
                        "UPDATE meal_log SET logged_grams = quantity WHERE logged_grams IS NULL",
                        "UPDATE meal_log SET logged_grams = 0 WHERE logged_grams IS NULL",
                    ],
                },
                Step::AddColumn {
                    table: "meal_log",
                    column: "sugar",
                    definition: "FLOAT",
                    backfill: &[],
                },
                Step::AddColumn {
                    table: "meal_log",
                    column: "sodium",
                    definition: "FLOAT",
                    backfill: &[],
                },
            ],
        },
        Migration {
            id: "uom_support",
            description: "Keep the entered quantity and unit alongside grams",
            steps: vec![
                Step::AddColumn {
                    table: "meal_log",
                    column: "original_quantity",
                    definition: "REAL NOT NULL DEFAULT 0",
                    backfill: &[
                        "UPDATE meal_log SET original_quantity = quantity \
                         WHERE original_quantity = 0 OR original_quantity IS NULL",
                    ],
                },
                Step::AddColumn {
                    table: "meal_log",
                    column: "unit_type",
                    definition: "VARCHAR(20) NOT NULL DEFAULT 'grams'",
                    backfill: &[],
                },
                Step::AddColumn {
                    table: "meal_log",
                    column: "serving_id",
                    definition: "INTEGER",
                    backfill: &[],
                },
                Step::CreateIndex {
                    index: "idx_meal_log_serving_id",
                    ddl: "CREATE INDEX IF NOT EXISTS idx_meal_log_serving_id \
                          ON meal_log(serving_id)",
                },
            ],
        },
        Migration {
            id: "food_serving_model",
            description: "Describe servings as a unit with grams per unit",
            steps: vec![Step::RebuildTable {
                table: "food_serving",
                staging: "food_serving_new",
                guard: RebuildGuard::ColumnPresent {
                    column: "grams_per_unit",
                },
                ddl: FOOD_SERVING_DDL,
                copy: FOOD_SERVING_COPY,
                indexes: &[
                    "CREATE INDEX IF NOT EXISTS ix_food_serving_food_id ON food_serving (food_id)",
                ],
                keep_all_rows: false,
            }],
        },
        Migration {
            id: "serving_upload_jobs",
            description: "Track bulk serving upload jobs and their rows",
            steps: vec![
                Step::CreateTable {
                    table: "serving_upload_job",
                    ddl: SERVING_UPLOAD_JOB_DDL,
                },
                Step::CreateIndex {
                    index: "idx_serving_upload_job_id",
                    ddl: "CREATE INDEX IF NOT EXISTS idx_serving_upload_job_id \
                          ON serving_upload_job(job_id)",
                },
                Step::CreateIndex {
                    index: "idx_serving_upload_job_created_by",
                    ddl: "CREATE INDEX IF NOT EXISTS idx_serving_upload_job_created_by \
                          ON serving_upload_job(created_by)",
                },
                Step::CreateTable {
                    table: "serving_upload_job_item",
                    ddl: SERVING_UPLOAD_JOB_ITEM_DDL,
                },
                Step::CreateIndex {
                    index: "idx_serving_upload_job_item_job_id",
                    ddl: "CREATE INDEX IF NOT EXISTS idx_serving_upload_job_item_job_id \
                          ON serving_upload_job_item(job_id)",
                },
                Step::CreateIndex {
                    index: "idx_serving_upload_job_item_serving_id",
                    ddl: "CREATE INDEX IF NOT EXISTS idx_serving_upload_job_item_serving_id \
                          ON serving_upload_job_item(serving_id)",
                },
            ],
        },
    ]
}

/// Looks up a built-in migration by identifier.
#[must_use]
pub fn find_migration(id: &str) -> Option<Migration> {
    builtin_migrations().into_iter().find(|migration| migration.id == id)
}

/// Selects built-in migrations by identifier, keeping registry order.
///
/// An empty selection returns the whole registry.
///
/// # Errors
///
/// Returns [`MigrateError::UnknownMigration`] for the first unknown identifier.
pub fn select_migrations<S: AsRef<str>>(ids: &[S]) -> Result<Vec<Migration>, MigrateError> {
    let registry = builtin_migrations();
    if ids.is_empty() {
        return Ok(registry);
    }
    for id in ids {
        let id = id.as_ref();
        if !registry.iter().any(|migration| migration.id == id) {
            return Err(MigrateError::UnknownMigration(id.to_string()));
        }
    }
    Ok(registry
        .into_iter()
        .filter(|migration| ids.iter().any(|id| id.as_ref() == migration.id))
        .collect())
}
