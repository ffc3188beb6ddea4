use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::analyses::find_analysis;
use super::{col_json, col_ts, col_uuid, now, ts, Database};
use crate::models::*;
use crate::validation::{self, sanitize_text, FieldErrors, MAX_TEXT_LEN, MAX_TOPIC_LEN};
use crate::StoreError;

const TOPIC_COLUMNS: &str = "id, user_id, topic, relevance, source_analyses, is_completed, created_at";

fn row_to_topic(row: &rusqlite::Row<'_>) -> rusqlite::Result<CmeTopic> {
    Ok(CmeTopic {
        id: col_uuid(row, 0)?,
        user: col_uuid(row, 1)?,
        topic: row.get(2)?,
        relevance: row.get(3)?,
        source_analyses: col_json(row, 4)?,
        is_completed: row.get(5)?,
        created_at: col_ts(row, 6)?,
    })
}

fn find_topic(conn: &Connection, user_id: Uuid, id: Uuid) -> Result<Option<CmeTopic>, StoreError> {
    let topic = conn
        .query_row(
            &format!("SELECT {TOPIC_COLUMNS} FROM cme_topics WHERE id = ?1 AND user_id = ?2"),
            params![id.to_string(), user_id.to_string()],
            row_to_topic,
        )
        .optional()?;
    Ok(topic)
}

fn insert_topic(
    conn: &Connection,
    user_id: Uuid,
    input: CreateCmeTopicInput,
) -> Result<CmeTopic, StoreError> {
    let topic = sanitize_text(&input.topic);
    let relevance = sanitize_text(&input.relevance);

    let mut errors = FieldErrors::new();
    errors.check("topic", validation::validate_required_text(&topic, MAX_TOPIC_LEN));
    errors.check(
        "relevance",
        validation::validate_required_text(&relevance, MAX_TEXT_LEN),
    );
    for source in &input.source_analyses {
        if find_analysis(conn, user_id, *source)?.is_none() {
            errors.add("source_analyses", format!("Unknown analysis: {source}."));
        }
    }
    errors.into_result()?;

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO cme_topics (id, user_id, topic, relevance, source_analyses, is_completed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            user_id.to_string(),
            topic,
            relevance,
            serde_json::to_string(&input.source_analyses)?,
            input.is_completed,
            ts(&now()),
        ],
    )?;
    find_topic(conn, user_id, id)?.ok_or(StoreError::NotFound("CME topic"))
}

impl Database {
    pub fn create_cme_topic(
        &self,
        user_id: Uuid,
        input: CreateCmeTopicInput,
    ) -> Result<CmeTopic, StoreError> {
        self.with_conn(|conn| insert_topic(conn, user_id, input))
    }

    /// Store a batch of suggested topics atomically: all or none.
    pub fn create_cme_topics(
        &self,
        user_id: Uuid,
        inputs: Vec<CreateCmeTopicInput>,
    ) -> Result<Vec<CmeTopic>, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let topics = inputs
                .into_iter()
                .map(|input| insert_topic(&tx, user_id, input))
                .collect::<Result<Vec<_>, _>>()?;
            tx.commit()?;
            Ok(topics)
        })
    }

    pub fn get_cme_topic(&self, user_id: Uuid, id: Uuid) -> Result<Option<CmeTopic>, StoreError> {
        self.with_conn(|conn| find_topic(conn, user_id, id))
    }

    pub fn list_cme_topics(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<CmeTopic>, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM cme_topics WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {TOPIC_COLUMNS} FROM cme_topics WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(
                    params![user_id.to_string(), page.limit(), page.offset()],
                    row_to_topic,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page::new(page, count, rows))
        })
    }

    /// Mark a topic completed; completing twice is a no-op.
    pub fn complete_cme_topic(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CmeTopic>, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE cme_topics SET is_completed = 1 WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )?;
            find_topic(conn, user_id, id)
        })
    }
}
