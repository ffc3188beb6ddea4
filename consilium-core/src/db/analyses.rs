use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use super::accounts::refresh_account_stats;
use super::{col_json, col_json_opt, col_ts, col_uuid, like_pattern, now, ts, Database};
use crate::models::*;
use crate::validation::{self, FieldErrors};
use crate::StoreError;

const ANALYSIS_SELECT: &str = "
    SELECT a.id, a.user_id, u.name, a.patient_id, a.patient_data, a.debate_history,
           a.final_report, a.differential_diagnoses, a.selected_specialists,
           a.follow_up_history, a.detected_medications, a.is_completed,
           a.created_at, a.updated_at
    FROM analyses a
    JOIN accounts u ON u.id = a.user_id";

fn row_to_analysis(row: &rusqlite::Row<'_>) -> rusqlite::Result<Analysis> {
    Ok(Analysis {
        id: col_uuid(row, 0)?,
        user: col_uuid(row, 1)?,
        user_name: row.get(2)?,
        patient_id: row.get(3)?,
        patient_data: col_json(row, 4)?,
        debate_history: col_json(row, 5)?,
        final_report: col_json_opt(row, 6)?,
        differential_diagnoses: col_json(row, 7)?,
        selected_specialists: col_json(row, 8)?,
        follow_up_history: col_json(row, 9)?,
        detected_medications: col_json_opt(row, 10)?,
        is_completed: row.get(11)?,
        created_at: col_ts(row, 12)?,
        updated_at: col_ts(row, 13)?,
    })
}

pub(super) fn find_analysis(
    conn: &Connection,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<Analysis>, StoreError> {
    let analysis = conn
        .query_row(
            &format!("{ANALYSIS_SELECT} WHERE a.id = ?1 AND a.user_id = ?2"),
            params![id.to_string(), user_id.to_string()],
            row_to_analysis,
        )
        .optional()?;
    Ok(analysis)
}

fn query_analyses(
    conn: &Connection,
    sql: &str,
    values: Vec<SqlValue>,
) -> Result<Vec<Analysis>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), row_to_analysis)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// WHERE clause and bound values for a filtered listing.
fn filter_clause(user_id: Uuid, filter: &AnalysisFilter) -> (String, Vec<SqlValue>) {
    let mut clause = String::from(" WHERE a.user_id = ?");
    let mut values = vec![SqlValue::Text(user_id.to_string())];

    if let Some(completed) = filter.is_completed {
        clause.push_str(" AND a.is_completed = ?");
        values.push(SqlValue::Integer(i64::from(completed)));
    }
    if let Some(patient_id) = filter.patient_id.as_deref().filter(|p| !p.is_empty()) {
        clause.push_str(" AND a.patient_id = ?");
        values.push(SqlValue::Text(patient_id.to_string()));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        clause.push_str(" AND casefold(a.patient_data) LIKE casefold(?) ESCAPE '\\'");
        values.push(SqlValue::Text(like_pattern(search)));
    }
    (clause, values)
}

fn json_text(value: &Value) -> Result<String, StoreError> {
    Ok(serde_json::to_string(value)?)
}

fn json_text_opt(value: Option<&Value>) -> Result<Option<String>, StoreError> {
    value.map(json_text).transpose()
}

fn validate_fields(
    patient_id: Option<&str>,
    patient_data: Option<&Value>,
    debate_history: Option<&Value>,
    lists: [(&str, Option<&Value>); 3],
) -> Result<(), StoreError> {
    let mut errors = FieldErrors::new();
    if let Some(patient_id) = patient_id {
        errors.check("patient_id", validation::validate_patient_id(patient_id));
    }
    if let Some(patient_data) = patient_data {
        errors.check("patient_data", validation::validate_patient_data(patient_data));
    }
    if let Some(debate_history) = debate_history {
        errors.check(
            "debate_history",
            validation::validate_debate_history(debate_history),
        );
    }
    for (field, value) in lists {
        if let Some(value) = value {
            errors.check(field, validation::validate_json_list(value));
        }
    }
    Ok(errors.into_result()?)
}

impl Database {
    pub fn create_analysis(
        &self,
        user_id: Uuid,
        input: CreateAnalysisInput,
    ) -> Result<Analysis, StoreError> {
        validate_fields(
            Some(&input.patient_id),
            Some(&input.patient_data),
            Some(&input.debate_history),
            [
                ("differential_diagnoses", Some(&input.differential_diagnoses)),
                ("selected_specialists", Some(&input.selected_specialists)),
                ("follow_up_history", Some(&input.follow_up_history)),
            ],
        )?;

        let id = Uuid::new_v4();
        let created = ts(&now());
        let patient_data = json_text(&input.patient_data)?;
        let debate_history = json_text(&input.debate_history)?;
        let final_report = json_text_opt(input.final_report.as_ref())?;
        let differential = json_text(&input.differential_diagnoses)?;
        let specialists = json_text(&input.selected_specialists)?;
        let follow_up = json_text(&input.follow_up_history)?;
        let medications = json_text_opt(input.detected_medications.as_ref())?;

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO analyses (id, user_id, patient_id, patient_data, debate_history,
                                       final_report, differential_diagnoses, selected_specialists,
                                       follow_up_history, detected_medications, is_completed,
                                       created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                params![
                    id.to_string(),
                    user_id.to_string(),
                    input.patient_id,
                    patient_data,
                    debate_history,
                    final_report,
                    differential,
                    specialists,
                    follow_up,
                    medications,
                    input.is_completed.unwrap_or(true),
                    created,
                ],
            )?;
            refresh_account_stats(&tx, user_id)?;
            let analysis =
                find_analysis(&tx, user_id, id)?.ok_or(StoreError::NotFound("analysis"))?;
            tx.commit()?;
            tracing::debug!(analysis_id = %id, "analysis created");
            Ok(analysis)
        })
    }

    pub fn get_analysis(&self, user_id: Uuid, id: Uuid) -> Result<Option<Analysis>, StoreError> {
        self.with_conn(|conn| find_analysis(conn, user_id, id))
    }

    pub fn list_analyses(
        &self,
        user_id: Uuid,
        filter: &AnalysisFilter,
        page: PageRequest,
    ) -> Result<Page<AnalysisListItem>, StoreError> {
        let (clause, values) = filter_clause(user_id, filter);
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM analyses a{clause}"),
                params_from_iter(values.clone()),
                |row| row.get(0),
            )?;

            let mut paged = values;
            paged.push(SqlValue::Integer(page.limit()));
            paged.push(SqlValue::Integer(page.offset()));
            let rows = query_analyses(
                conn,
                &format!(
                    "{ANALYSIS_SELECT}{clause} ORDER BY {} LIMIT ? OFFSET ?",
                    filter.ordering.sql()
                ),
                paged,
            )?;

            Ok(Page::new(
                page,
                count,
                rows.iter().map(Analysis::to_list_item).collect(),
            ))
        })
    }

    /// The first `limit` entries of the filtered listing.
    pub fn recent_analyses(
        &self,
        user_id: Uuid,
        filter: &AnalysisFilter,
        limit: usize,
    ) -> Result<Vec<AnalysisListItem>, StoreError> {
        let (clause, mut values) = filter_clause(user_id, filter);
        values.push(SqlValue::Integer(limit as i64));
        self.with_conn(|conn| {
            let rows = query_analyses(
                conn,
                &format!(
                    "{ANALYSIS_SELECT}{clause} ORDER BY {} LIMIT ?",
                    filter.ordering.sql()
                ),
                values,
            )?;
            Ok(rows.iter().map(Analysis::to_list_item).collect())
        })
    }

    /// Full analyses, newest first. Feeds AI suggestions built from history.
    pub fn latest_analyses(&self, user_id: Uuid, limit: usize) -> Result<Vec<Analysis>, StoreError> {
        self.with_conn(|conn| {
            query_analyses(
                conn,
                &format!(
                    "{ANALYSIS_SELECT} WHERE a.user_id = ? ORDER BY {} LIMIT ?",
                    AnalysisOrdering::CreatedAtDesc.sql()
                ),
                vec![
                    SqlValue::Text(user_id.to_string()),
                    SqlValue::Integer(limit as i64),
                ],
            )
        })
    }

    /// Apply a partial update. `Ok(None)` when the analysis is not the caller's.
    pub fn update_analysis(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: UpdateAnalysisInput,
    ) -> Result<Option<Analysis>, StoreError> {
        validate_fields(
            input.patient_id.as_deref(),
            input.patient_data.as_ref(),
            input.debate_history.as_ref(),
            [
                ("differential_diagnoses", input.differential_diagnoses.as_ref()),
                ("selected_specialists", input.selected_specialists.as_ref()),
                ("follow_up_history", input.follow_up_history.as_ref()),
            ],
        )?;

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let Some(existing) = find_analysis(&tx, user_id, id)? else {
                return Ok(None);
            };

            let final_report = match input.final_report {
                Some(value) => value,
                None => existing.final_report,
            };
            let medications = match input.detected_medications {
                Some(value) => value,
                None => existing.detected_medications,
            };

            tx.execute(
                "UPDATE analyses SET patient_id = ?3, patient_data = ?4, debate_history = ?5,
                        final_report = ?6, differential_diagnoses = ?7, selected_specialists = ?8,
                        follow_up_history = ?9, detected_medications = ?10, is_completed = ?11,
                        updated_at = ?12
                 WHERE id = ?1 AND user_id = ?2",
                params![
                    id.to_string(),
                    user_id.to_string(),
                    input.patient_id.unwrap_or(existing.patient_id),
                    json_text(&input.patient_data.unwrap_or(existing.patient_data))?,
                    json_text(&input.debate_history.unwrap_or(existing.debate_history))?,
                    json_text_opt(final_report.as_ref())?,
                    json_text(
                        &input
                            .differential_diagnoses
                            .unwrap_or(existing.differential_diagnoses)
                    )?,
                    json_text(
                        &input
                            .selected_specialists
                            .unwrap_or(existing.selected_specialists)
                    )?,
                    json_text(&input.follow_up_history.unwrap_or(existing.follow_up_history))?,
                    json_text_opt(medications.as_ref())?,
                    input.is_completed.unwrap_or(existing.is_completed),
                    ts(&now()),
                ],
            )?;
            let updated = find_analysis(&tx, user_id, id)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Mark an analysis completed. Repeating it only bumps `updated_at`.
    pub fn complete_analysis(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Analysis>, StoreError> {
        self.update_analysis(
            user_id,
            id,
            UpdateAnalysisInput {
                is_completed: Some(true),
                ..Default::default()
            },
        )
    }

    /// Delete an analysis and recount the owner's total. Returns whether a
    /// row was removed.
    pub fn delete_analysis(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM analyses WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )?;
            if removed > 0 {
                refresh_account_stats(&tx, user_id)?;
            }
            tx.commit()?;
            Ok(removed > 0)
        })
    }

    /// Every analysis of the same patient as `id`, oldest first.
    pub fn longitudinal_view(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Vec<AnalysisListItem>>, StoreError> {
        self.with_conn(|conn| {
            let Some(anchor) = find_analysis(conn, user_id, id)? else {
                return Ok(None);
            };
            let rows = query_analyses(
                conn,
                &format!(
                    "{ANALYSIS_SELECT} WHERE a.user_id = ? AND a.patient_id = ? ORDER BY {}",
                    AnalysisOrdering::CreatedAt.sql()
                ),
                vec![
                    SqlValue::Text(user_id.to_string()),
                    SqlValue::Text(anchor.patient_id),
                ],
            )?;
            Ok(Some(rows.iter().map(Analysis::to_list_item).collect()))
        })
    }

    pub fn dashboard_stats(&self, user_id: Uuid) -> Result<DashboardStats, StoreError> {
        self.with_conn(|conn| {
            let total_analyses: i64 = conn.query_row(
                "SELECT COUNT(*) FROM analyses WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )?;

            let newest_first = AnalysisOrdering::CreatedAtDesc.sql();
            let completed = query_analyses(
                conn,
                &format!(
                    "{ANALYSIS_SELECT} WHERE a.user_id = ? AND a.is_completed = 1
                     ORDER BY {newest_first} LIMIT ?"
                ),
                vec![
                    SqlValue::Text(user_id.to_string()),
                    SqlValue::Integer(STATS_WINDOW as i64),
                ],
            )?;
            let newest = query_analyses(
                conn,
                &format!("{ANALYSIS_SELECT} WHERE a.user_id = ? ORDER BY {newest_first} LIMIT ?"),
                vec![
                    SqlValue::Text(user_id.to_string()),
                    SqlValue::Integer((RECENT_ANALYSES_LIMIT * 2) as i64),
                ],
            )?;

            Ok(DashboardStats {
                total_analyses,
                common_diagnoses: common_diagnoses(&completed),
                feedback_accuracy: FEEDBACK_ACCURACY,
                recent_analyses: recent_analyses(&completed, &newest),
            })
        })
    }
}
