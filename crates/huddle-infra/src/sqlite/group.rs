//! SQLite group/event/poll reads.
//!
//! Groups, events, and polls are owned by other subsystems; this
//! repository only reads what the chat core needs: membership for
//! authorization and descriptive context for the bot pipeline.

use sqlx::Row;
use uuid::Uuid;

use huddle_core::chat::repository::GroupRepository;
use huddle_types::error::RepositoryError;
use huddle_types::group::{EventSummary, GroupSummary, PollSummary};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `GroupRepository`.
pub struct SqliteGroupRepository {
    pool: DatabasePool,
}

impl SqliteGroupRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

impl GroupRepository for SqliteGroupRepository {
    async fn get_summary(&self, id: &Uuid) -> Result<Option<GroupSummary>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM groups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };

        let get_string = |column: &str| -> Result<String, RepositoryError> {
            row.try_get(column)
                .map_err(|e| RepositoryError::Query(e.to_string()))
        };

        let members_json = get_string("members")?;
        // A malformed member list degrades to empty rather than failing
        // the read.
        let members: Vec<Uuid> = serde_json::from_str(&members_json).unwrap_or_default();

        Ok(Some(GroupSummary {
            id: *id,
            name: get_string("name")?,
            description: row
                .try_get("description")
                .map_err(|e| RepositoryError::Query(e.to_string()))?,
            group_type: get_string("group_type")?,
            members,
        }))
    }

    async fn upcoming_events(&self, group_id: &Uuid) -> Result<Vec<EventSummary>, RepositoryError> {
        let rows =
            sqlx::query("SELECT * FROM events WHERE group_id = ? ORDER BY date_time ASC")
                .bind(group_id.to_string())
                .fetch_all(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row
                .try_get("id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let date_time: Option<String> = row
                .try_get("date_time")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

            events.push(EventSummary {
                id: parse_uuid(&id, "event id")?,
                group_id: *group_id,
                title: row
                    .try_get("title")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?,
                description: row
                    .try_get("description")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?,
                date_time: date_time.as_deref().map(parse_datetime).transpose()?,
            });
        }

        Ok(events)
    }

    async fn polls_for_events(
        &self,
        event_ids: &[Uuid],
        limit: i64,
    ) -> Result<Vec<PollSummary>, RepositoryError> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; event_ids.len()].join(", ");
        let sql = format!(
            "SELECT p.id, p.event_id, p.question,
                    (SELECT COUNT(*) FROM poll_options po WHERE po.poll_id = p.id) AS option_count
             FROM polls p
             WHERE p.event_id IN ({placeholders})
             LIMIT {limit}"
        );

        let mut query = sqlx::query(&sql);
        for id in event_ids {
            query = query.bind(id.to_string());
        }

        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut polls = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row
                .try_get("id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let event_id: String = row
                .try_get("event_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let option_count: i64 = row
                .try_get("option_count")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

            polls.push(PollSummary {
                id: parse_uuid(&id, "poll id")?,
                event_id: parse_uuid(&event_id, "event_id")?,
                question: row
                    .try_get("question")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?,
                option_count: option_count as usize,
            });
        }

        Ok(polls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn make_group(pool: &DatabasePool, members: &[Uuid]) -> Uuid {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO groups (id, name, description, group_type, members, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind("Hiking Crew")
        .bind("Weekend hikes")
        .bind("outdoors")
        .bind(serde_json::to_string(members).unwrap())
        .bind(Utc::now().to_rfc3339())
        .execute(&pool.writer)
        .await
        .unwrap();
        id
    }

    async fn make_event(pool: &DatabasePool, group_id: Uuid, title: &str) -> Uuid {
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO events (id, group_id, title, date_time) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(group_id.to_string())
            .bind(title)
            .bind(Utc::now().to_rfc3339())
            .execute(&pool.writer)
            .await
            .unwrap();
        id
    }

    async fn make_poll(pool: &DatabasePool, event_id: Uuid, question: &str, options: usize) {
        let poll_id = Uuid::now_v7();
        sqlx::query("INSERT INTO polls (id, event_id, question) VALUES (?, ?, ?)")
            .bind(poll_id.to_string())
            .bind(event_id.to_string())
            .bind(question)
            .execute(&pool.writer)
            .await
            .unwrap();
        for i in 0..options {
            sqlx::query("INSERT INTO poll_options (id, poll_id, label) VALUES (?, ?, ?)")
                .bind(Uuid::now_v7().to_string())
                .bind(poll_id.to_string())
                .bind(format!("option {i}"))
                .execute(&pool.writer)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn summary_includes_members() {
        let pool = test_pool().await;
        let repo = SqliteGroupRepository::new(pool.clone());
        let member = Uuid::now_v7();
        let group_id = make_group(&pool, &[member]).await;

        let summary = repo.get_summary(&group_id).await.unwrap().unwrap();
        assert_eq!(summary.name, "Hiking Crew");
        assert_eq!(summary.group_type, "outdoors");
        assert_eq!(summary.members, vec![member]);

        assert!(repo.get_summary(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn events_and_polls_for_context() {
        let pool = test_pool().await;
        let repo = SqliteGroupRepository::new(pool.clone());
        let group_id = make_group(&pool, &[]).await;
        let event_id = make_event(&pool, group_id, "Movie night").await;
        make_poll(&pool, event_id, "Which film?", 3).await;

        let events = repo.upcoming_events(&group_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Movie night");

        let polls = repo
            .polls_for_events(&[events[0].id], 10)
            .await
            .unwrap();
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0].question, "Which film?");
        assert_eq!(polls[0].option_count, 3);
    }

    #[tokio::test]
    async fn polls_with_no_events_short_circuits() {
        let pool = test_pool().await;
        let repo = SqliteGroupRepository::new(pool);
        assert!(repo.polls_for_events(&[], 10).await.unwrap().is_empty());
    }
}
