//! Database schema definitions

pub const CREATE_VISITS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS visits (
    date TEXT NOT NULL,   -- calendar day, YYYY-MM-DD
    ip TEXT NOT NULL,     -- visitor key
    path TEXT NOT NULL    -- normalized page path
)
"#;

// One row per visitor per page per day. INSERT OR IGNORE relies on this.
pub const CREATE_INDEX_UNIQUE_VISIT: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_visits_unique ON visits(date, ip, path)";
