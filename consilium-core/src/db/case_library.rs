use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use uuid::Uuid;

use super::analyses::find_analysis;
use super::{col_json, col_json_opt, col_ts, col_uuid, like_pattern, now, ts, Database};
use crate::models::*;
use crate::validation::{self, sanitize_text, FieldErrors, MAX_TEXT_LEN};
use crate::StoreError;

pub const MAX_SEARCH_QUERY_LEN: usize = 200;
pub const MAX_SEARCH_RESULTS: usize = 50;
const MAX_TAG_LEN: usize = 100;

const ENTRY_SELECT: &str = "
    SELECT c.id, c.analysis_id, c.tags, c.final_diagnosis, c.outcome, c.is_anonymous,
           c.is_public, c.view_count, c.created_at, c.updated_at,
           a.user_id, u.name, a.patient_id, a.patient_data, a.final_report,
           a.is_completed, a.created_at
    FROM case_library c
    JOIN analyses a ON a.id = c.analysis_id
    JOIN accounts u ON u.id = a.user_id";

/// Entries the viewer owns plus every public entry.
const VISIBLE: &str = "(a.user_id = ? OR c.is_public = 1)";

/// An entry as seen by `viewer`: anonymized unless the viewer owns it.
fn row_to_entry(row: &rusqlite::Row<'_>, viewer: Uuid) -> rusqlite::Result<CaseLibraryEntry> {
    let analysis_id = col_uuid(row, 1)?;
    let owner = col_uuid(row, 10)?;
    let patient_data: serde_json::Value = col_json(row, 13)?;
    let final_report: Option<serde_json::Value> = col_json_opt(row, 14)?;

    let mut entry = CaseLibraryEntry {
        id: col_uuid(row, 0)?,
        analysis: analysis_id,
        analysis_data: AnalysisListItem {
            id: analysis_id,
            user_name: row.get(11)?,
            patient_id: row.get(12)?,
            patient_name: patient_name(&patient_data),
            diagnosis_summary: diagnosis_summary(final_report.as_ref()),
            is_completed: row.get(15)?,
            created_at: col_ts(row, 16)?,
        },
        tags: col_json(row, 2)?,
        final_diagnosis: row.get(3)?,
        outcome: row.get(4)?,
        is_anonymous: row.get(5)?,
        is_public: row.get(6)?,
        view_count: row.get(7)?,
        created_at: col_ts(row, 8)?,
        updated_at: col_ts(row, 9)?,
    };
    if entry.is_anonymous && owner != viewer {
        entry.anonymize();
    }
    Ok(entry)
}

fn query_entries(
    conn: &Connection,
    sql: &str,
    values: Vec<SqlValue>,
    viewer: Uuid,
) -> Result<Vec<CaseLibraryEntry>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| row_to_entry(row, viewer))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn find_entry(
    conn: &Connection,
    viewer: Uuid,
    id: Uuid,
) -> Result<Option<CaseLibraryEntry>, StoreError> {
    let entry = conn
        .query_row(
            &format!("{ENTRY_SELECT} WHERE c.id = ? AND {VISIBLE}"),
            params![id.to_string(), viewer.to_string()],
            |row| row_to_entry(row, viewer),
        )
        .optional()?;
    Ok(entry)
}

impl Database {
    /// Publish one of the caller's analyses to the library.
    pub fn add_to_library(
        &self,
        user_id: Uuid,
        input: CreateCaseLibraryInput,
    ) -> Result<CaseLibraryEntry, StoreError> {
        let final_diagnosis = sanitize_text(&input.final_diagnosis);
        let outcome = sanitize_text(&input.outcome);
        let tags: Vec<String> = input
            .tags
            .iter()
            .map(|tag| sanitize_text(tag))
            .filter(|tag| !tag.is_empty())
            .collect();

        let mut errors = FieldErrors::new();
        errors.check(
            "final_diagnosis",
            validation::validate_required_text(&final_diagnosis, MAX_TEXT_LEN),
        );
        errors.check("outcome", validation::validate_text_len(&outcome, MAX_TEXT_LEN));
        for tag in &tags {
            errors.check("tags", validation::validate_text_len(tag, MAX_TAG_LEN));
        }
        errors.into_result()?;

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            if find_analysis(&tx, user_id, input.analysis)?.is_none() {
                return Err(StoreError::field("analysis", "Analysis not found."));
            }
            let already: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM case_library WHERE analysis_id = ?1)",
                params![input.analysis.to_string()],
                |row| row.get(0),
            )?;
            if already {
                return Err(StoreError::field(
                    "analysis",
                    "case library entry with this analysis already exists.",
                ));
            }

            let id = Uuid::new_v4();
            let created = ts(&now());
            tx.execute(
                "INSERT INTO case_library (id, analysis_id, tags, final_diagnosis, outcome,
                                           is_anonymous, is_public, view_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
                params![
                    id.to_string(),
                    input.analysis.to_string(),
                    serde_json::to_string(&tags)?,
                    final_diagnosis,
                    outcome,
                    input.is_anonymous,
                    input.is_public,
                    created,
                ],
            )?;
            let entry = find_entry(&tx, user_id, id)?.ok_or(StoreError::NotFound("case"))?;
            tx.commit()?;
            tracing::debug!(case_id = %id, public = input.is_public, "case added to library");
            Ok(entry)
        })
    }

    pub fn get_library_entry(
        &self,
        viewer: Uuid,
        id: Uuid,
    ) -> Result<Option<CaseLibraryEntry>, StoreError> {
        self.with_conn(|conn| find_entry(conn, viewer, id))
    }

    pub fn list_library(
        &self,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Page<CaseLibraryEntry>, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM case_library c
                     JOIN analyses a ON a.id = c.analysis_id WHERE {VISIBLE}"
                ),
                params![viewer.to_string()],
                |row| row.get(0),
            )?;
            let rows = query_entries(
                conn,
                &format!(
                    "{ENTRY_SELECT} WHERE {VISIBLE}
                     ORDER BY c.created_at DESC, c.rowid DESC LIMIT ? OFFSET ?"
                ),
                vec![
                    SqlValue::Text(viewer.to_string()),
                    SqlValue::Integer(page.limit()),
                    SqlValue::Integer(page.offset()),
                ],
                viewer,
            )?;
            Ok(Page::new(page, count, rows))
        })
    }

    /// Increment the view counter of a visible entry and return the new value.
    pub fn record_case_view(&self, viewer: Uuid, id: Uuid) -> Result<Option<i64>, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            if find_entry(&tx, viewer, id)?.is_none() {
                return Ok(None);
            }
            let view_count: i64 = tx.query_row(
                "UPDATE case_library SET view_count = view_count + 1
                 WHERE id = ?1 RETURNING view_count",
                params![id.to_string()],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(Some(view_count))
        })
    }

    /// Case-insensitive keyword match over tags, final diagnosis and outcome.
    /// Blank queries match nothing; overlong queries are rejected.
    pub fn search_library(
        &self,
        viewer: Uuid,
        query: &str,
    ) -> Result<Vec<CaseLibraryEntry>, StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if query.chars().count() > MAX_SEARCH_QUERY_LEN {
            return Err(StoreError::field(
                "q",
                format!("Search query too long. Maximum {MAX_SEARCH_QUERY_LEN} characters allowed."),
            ));
        }

        let pattern = like_pattern(query);
        self.with_conn(|conn| {
            query_entries(
                conn,
                &format!(
                    "{ENTRY_SELECT} WHERE {VISIBLE}
                       AND (casefold(c.tags) LIKE casefold(?2) ESCAPE '\\'
                            OR casefold(c.final_diagnosis) LIKE casefold(?2) ESCAPE '\\'
                            OR casefold(c.outcome) LIKE casefold(?2) ESCAPE '\\')
                     ORDER BY c.created_at DESC, c.rowid DESC LIMIT ?3"
                ),
                vec![
                    SqlValue::Text(viewer.to_string()),
                    SqlValue::Text(pattern),
                    SqlValue::Integer(MAX_SEARCH_RESULTS as i64),
                ],
                viewer,
            )
        })
    }
}
