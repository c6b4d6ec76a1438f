use anyhow::Result;
use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS activity_events (
    id INTEGER PRIMARY KEY,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    process_name TEXT,
    window_title TEXT,
    is_idle INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_events_start_time
    ON activity_events(start_time);

CREATE TABLE IF NOT EXISTS project_mappings (
    id INTEGER PRIMARY KEY,
    project_name TEXT NOT NULL,
    process_name TEXT,
    window_title TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (process_name IS NOT NULL OR window_title IS NOT NULL)
);

-- NULL must be a matchable key, a plain UNIQUE would let duplicates through.
CREATE UNIQUE INDEX IF NOT EXISTS idx_project_mappings_key
    ON project_mappings(IFNULL(process_name, ''), IFNULL(window_title, ''));
";

pub fn initialize_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
