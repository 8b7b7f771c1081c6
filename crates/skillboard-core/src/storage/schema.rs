pub const SCHEMA_VERSION: i64 = 1;

pub const TABLE: &str = "skillrack_profiles";

/// Column order used by every `SELECT` that decodes a `ProfileRecord`.
pub const COLUMNS: [&str; 10] = [
    "id",
    "name",
    "college",
    "points",
    "last_fetched",
    "dc",
    "dt",
    "profile_url",
    "created_at",
    "updated_at",
];

// Timestamps are UTC RFC 3339 with millisecond precision, e.g. 2026-10-16T09:30:00.123Z.
// SQLite triggers cannot assign to NEW, so the row is re-stamped after the update inside
// the same statement. 'now' is fixed for the whole statement, so the WHEN guard stops the
// re-stamp from firing the trigger again when recursive_triggers is on.
pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS skillrack_profiles (
  id TEXT PRIMARY KEY,
  name TEXT,
  college TEXT,
  points INTEGER NOT NULL DEFAULT 0,
  last_fetched TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
  dc INTEGER NOT NULL DEFAULT 0,
  dt INTEGER NOT NULL DEFAULT 0,
  profile_url TEXT,
  created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
  updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
) STRICT;

CREATE INDEX IF NOT EXISTS idx_skillrack_profiles_points
  ON skillrack_profiles(points DESC);

CREATE INDEX IF NOT EXISTS idx_skillrack_profiles_last_fetched
  ON skillrack_profiles(last_fetched DESC);

CREATE TRIGGER IF NOT EXISTS trg_skillrack_profiles_updated_at
  AFTER UPDATE ON skillrack_profiles
  FOR EACH ROW
  WHEN NEW.updated_at IS NOT strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
BEGIN
  UPDATE skillrack_profiles
  SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
  WHERE id = NEW.id;
END;
"#;
