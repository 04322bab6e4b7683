//! SQLite profile repository implementation.

use sqlx::Row;
use uuid::Uuid;

use huddle_core::chat::repository::ProfileRepository;
use huddle_types::error::RepositoryError;
use huddle_types::profile::Profile;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ProfileRepository`.
pub struct SqliteProfileRepository {
    pool: DatabasePool,
}

impl SqliteProfileRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn profile_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Profile, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| RepositoryError::Query(format!("invalid profile id: {e}")))?;

    let get = |column: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get(column)
            .map_err(|e| RepositoryError::Query(e.to_string()))
    };

    Ok(Profile {
        id: Some(id),
        username: get("username")?,
        display_name: get("full_name")?,
        avatar_url: get("avatar_url")?,
        email: get("email")?,
    })
}

impl ProfileRepository for SqliteProfileRepository {
    async fn get(&self, id: &Uuid) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM profiles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM profiles WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn create(&self, profile: &Profile) -> Result<(), RepositoryError> {
        let id = profile
            .id
            .ok_or_else(|| RepositoryError::Query("profile id required".to_string()))?;

        let result = sqlx::query(
            r#"INSERT INTO profiles (id, username, full_name, avatar_url, email)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(id.to_string())
        .bind(&profile.username)
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .bind(&profile.email)
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                RepositoryError::Conflict(format!("username already exists: {db}")),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::profile::BOT_USERNAME;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn bot_profile(id: Uuid) -> Profile {
        Profile {
            id: Some(id),
            username: Some(BOT_USERNAME.to_string()),
            display_name: Some("Huddle Bot".to_string()),
            avatar_url: None,
            email: Some("huddle-bot@system.local".to_string()),
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let repo = SqliteProfileRepository::new(test_pool().await);
        let id = Uuid::now_v7();

        repo.create(&bot_profile(id)).await.unwrap();

        let found = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.username.as_deref(), Some(BOT_USERNAME));
        assert_eq!(found.display_name.as_deref(), Some("Huddle Bot"));
    }

    #[tokio::test]
    async fn find_by_username() {
        let repo = SqliteProfileRepository::new(test_pool().await);
        let id = Uuid::now_v7();
        repo.create(&bot_profile(id)).await.unwrap();

        let found = repo.find_by_username(BOT_USERNAME).await.unwrap().unwrap();
        assert_eq!(found.id, Some(id));

        assert!(repo.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let repo = SqliteProfileRepository::new(test_pool().await);
        repo.create(&bot_profile(Uuid::now_v7())).await.unwrap();

        let err = repo.create(&bot_profile(Uuid::now_v7())).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let repo = SqliteProfileRepository::new(test_pool().await);
        assert!(repo.get(&Uuid::now_v7()).await.unwrap().is_none());
    }
}
