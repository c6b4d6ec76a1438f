use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::utils::time::{format_store_time, parse_store_time};

use super::{
    database::EventStore,
    entities::{NewProjectMapping, ProjectMapping},
};

fn row_to_mapping(row: &Row) -> Result<ProjectMapping> {
    Ok(ProjectMapping {
        id: row.get("id")?,
        project_name: row.get("project_name")?,
        process_name: row.get("process_name")?,
        window_title: row.get("window_title")?,
        created_at: parse_store_time(&row.get::<_, String>("created_at")?)?,
        updated_at: parse_store_time(&row.get::<_, String>("updated_at")?)?,
    })
}

impl EventStore {
    /// All mappings, grouped by project name.
    pub async fn fetch_project_mappings(&self) -> Result<Vec<ProjectMapping>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, project_name, process_name, window_title, created_at, updated_at
                 FROM project_mappings
                 ORDER BY project_name COLLATE NOCASE, id",
            )?;
            let mut rows = stmt.query([])?;
            let mut mappings = Vec::new();
            while let Some(row) = rows.next()? {
                mappings.push(row_to_mapping(row)?);
            }
            Ok(mappings)
        })
        .await
    }

    /// Inserts the mapping, or replaces the project of the mapping with the same key pair. The
    /// original `created_at` survives a replacement.
    pub async fn upsert_project_mapping(
        &self,
        mapping: NewProjectMapping,
        now: DateTime<Utc>,
    ) -> Result<ProjectMapping> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let now = format_store_time(now);

            // `IS` compares NULLs as equal, which is what the unique index enforces as well.
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM project_mappings
                     WHERE process_name IS ?1 AND window_title IS ?2",
                    params![mapping.process_key, mapping.title_key],
                    |row| row.get(0),
                )
                .optional()?;

            let id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE project_mappings
                         SET project_name = ?1, updated_at = ?2
                         WHERE id = ?3",
                        params![mapping.project_name, now, id],
                    )
                    .context("failed to update project mapping")?;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO project_mappings (
                            project_name,
                            process_name,
                            window_title,
                            created_at,
                            updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?4)",
                        params![
                            mapping.project_name,
                            mapping.process_key,
                            mapping.title_key,
                            now
                        ],
                    )
                    .context("failed to insert project mapping")?;
                    tx.last_insert_rowid()
                }
            };

            let stored = tx.query_row(
                "SELECT id, project_name, process_name, window_title, created_at, updated_at
                 FROM project_mappings
                 WHERE id = ?1",
                params![id],
                |row| Ok(row_to_mapping(row)),
            )??;
            tx.commit()?;
            Ok(stored)
        })
        .await
    }
}
