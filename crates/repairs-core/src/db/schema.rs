//! Canonical SQLite schema for the repair ticket store.
//!
//! One row per ticket. `created_at` is stored as fixed-width RFC 3339 text
//! (nanosecond precision, `Z` suffix) so lexical order is chronological.

/// Migration v1: the `repairs` table and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS repairs (
    id TEXT PRIMARY KEY,
    item TEXT NOT NULL CHECK (length(trim(item)) > 0),
    description TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'New',
    assigned_to TEXT,
    created_at TEXT NOT NULL,
    created_by TEXT
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes for the list filters.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_repairs_status_created
    ON repairs(status, created_at);

CREATE INDEX IF NOT EXISTS idx_repairs_created_by
    ON repairs(created_by, created_at);

CREATE INDEX IF NOT EXISTS idx_repairs_created_at
    ON repairs(created_at, id);
";

/// Indexes expected after all migrations have run.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_repairs_status_created",
    "idx_repairs_created_by",
    "idx_repairs_created_at",
];

/// Column list shared by every ticket `SELECT`, in row-mapping order.
pub const TICKET_COLUMNS: &str =
    "id, item, description, status, assigned_to, created_at, created_by";
