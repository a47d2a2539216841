//! Database schema and migrations for junkmail.
//!
//! Migrations are applied sequentially when the database is first opened or
//! upgraded. The schema_version table tracks which have been applied.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Address registry
    r#"
-- Durable record per inbox address; survives message expiry
CREATE TABLE addresses (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    address        TEXT NOT NULL UNIQUE,
    created_at     INTEGER NOT NULL,            -- Unix epoch milliseconds
    email_count    INTEGER NOT NULL DEFAULT 0,
    last_email_at  INTEGER                      -- Unix epoch milliseconds
);

CREATE INDEX idx_address ON addresses(address);
CREATE INDEX idx_created_at ON addresses(created_at DESC);
"#,
    // v2: Runtime settings (email_retention)
    r#"
CREATE TABLE settings (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
];
