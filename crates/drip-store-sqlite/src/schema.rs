//! SQL schema for the drip SQLite store.
//!
//! Executed once at connection startup. Only additive changes are planned;
//! they will be gated on `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per enrollment. Rows are never deleted; only the progress
-- columns (status .. last_sent_at) are ever updated.
CREATE TABLE IF NOT EXISTS enrollments (
    enrollment_id TEXT PRIMARY KEY,
    campaign      TEXT NOT NULL,
    email         TEXT NOT NULL,      -- trimmed, lowercased
    npi           TEXT NOT NULL,
    display_name  TEXT NOT NULL,
    specialty     TEXT NOT NULL,
    city          TEXT,
    state         TEXT NOT NULL,
    estimated_gap INTEGER NOT NULL,   -- whole dollars
    enrolled_at   TEXT NOT NULL,      -- ISO 8601 UTC; server-assigned
    status        TEXT NOT NULL,      -- 'active' | 'completed' | 'unsubscribed'
    stage_index   INTEGER NOT NULL DEFAULT 0,
    messages_sent INTEGER NOT NULL DEFAULT 0,
    last_sent_at  TEXT
);

-- At most one active enrollment per identity and campaign.
CREATE UNIQUE INDEX IF NOT EXISTS enrollments_active_identity_idx
    ON enrollments(campaign, email, npi) WHERE status = 'active';

CREATE INDEX IF NOT EXISTS enrollments_status_idx ON enrollments(status);
CREATE INDEX IF NOT EXISTS enrollments_email_idx  ON enrollments(email);

PRAGMA user_version = 1;
";
