//! SQLite profile store.
//!
//! A single database file with three tables — `users`, `profiles`,
//! `connections` — created on open. WAL journal, foreign keys ON.

use crate::{ProfileDraft, ProfileStore, connection_view};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tentacool_core::error::StoreError;
use tentacool_core::profile::{Connection, ConnectionView, Profile, ProfileCard, User};
use tracing::{debug, info};
use uuid::Uuid;

/// A production SQLite profile store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite profile store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                email      TEXT UNIQUE NOT NULL,
                image      TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id     TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                job_title   TEXT,
                company     TEXT,
                experience  TEXT,
                tech_skills TEXT NOT NULL DEFAULT '[]',
                interests   TEXT NOT NULL DEFAULT '[]'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("profiles table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS connections (
                id           TEXT PRIMARY KEY,
                requester_id TEXT NOT NULL REFERENCES users(id),
                target_id    TEXT NOT NULL REFERENCES users(id),
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("connections table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_connections_requester ON connections(requester_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("requester index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_connections_target ON connections(target_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("target index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, StoreError> {
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(User {
            id: row
                .try_get("id")
                .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?,
            name: row
                .try_get("name")
                .map_err(|e| StoreError::QueryFailed(format!("name column: {e}")))?,
            email: row
                .try_get("email")
                .map_err(|e| StoreError::QueryFailed(format!("email column: {e}")))?,
            image: row
                .try_get("image")
                .map_err(|e| StoreError::QueryFailed(format!("image column: {e}")))?,
            created_at: parse_timestamp(&created_at)?,
        })
    }

    fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<Profile, StoreError> {
        let tech_skills: String = row
            .try_get("tech_skills")
            .map_err(|e| StoreError::QueryFailed(format!("tech_skills column: {e}")))?;
        let interests: String = row
            .try_get("interests")
            .map_err(|e| StoreError::QueryFailed(format!("interests column: {e}")))?;

        Ok(Profile {
            user_id: row
                .try_get("user_id")
                .map_err(|e| StoreError::QueryFailed(format!("user_id column: {e}")))?,
            job_title: row
                .try_get("job_title")
                .map_err(|e| StoreError::QueryFailed(format!("job_title column: {e}")))?,
            company: row
                .try_get("company")
                .map_err(|e| StoreError::QueryFailed(format!("company column: {e}")))?,
            experience: row
                .try_get("experience")
                .map_err(|e| StoreError::QueryFailed(format!("experience column: {e}")))?,
            tech_skills: serde_json::from_str(&tech_skills).unwrap_or_default(),
            interests: serde_json::from_str(&interests).unwrap_or_default(),
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("bad timestamp '{s}': {e}")))
}

fn json_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".into())
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn upsert_user(
        &self,
        name: &str,
        email: &str,
        image: Option<&str>,
    ) -> Result<User, StoreError> {
        if let Some(existing) = self.find_user_by_email(email).await? {
            sqlx::query("UPDATE users SET name = ?, image = ? WHERE id = ?")
                .bind(name)
                .bind(image)
                .bind(&existing.id)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("update user: {e}")))?;

            return Ok(User {
                name: name.to_string(),
                image: image.map(String::from),
                ..existing
            });
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            image: image.map(String::from),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO users (id, name, email, image, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.image)
            .bind(user.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("insert user: {e}")))?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("find user by id: {e}")))?;

        row.map(|r| Self::row_to_user(&r)).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("find user by email: {e}")))?;

        row.map(|r| Self::row_to_user(&r)).transpose()
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        draft: ProfileDraft,
    ) -> Result<Profile, StoreError> {
        if self.find_user_by_id(user_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, job_title, company, experience, tech_skills, interests)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                job_title = excluded.job_title,
                company = excluded.company,
                experience = excluded.experience,
                tech_skills = excluded.tech_skills,
                interests = excluded.interests
            "#,
        )
        .bind(user_id)
        .bind(&draft.job_title)
        .bind(&draft.company)
        .bind(&draft.experience)
        .bind(json_list(&draft.tech_skills))
        .bind(json_list(&draft.interests))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("upsert profile: {e}")))?;

        Ok(Profile {
            user_id: user_id.to_string(),
            job_title: draft.job_title,
            company: draft.company,
            experience: draft.experience,
            tech_skills: draft.tech_skills,
            interests: draft.interests,
        })
    }

    async fn find_profile_by_user_id(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query("SELECT * FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("find profile: {e}")))?;

        row.map(|r| Self::row_to_profile(&r)).transpose()
    }

    async fn list_profiles(&self) -> Result<Vec<ProfileCard>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT p.user_id, p.job_title, p.company, p.experience,
                   p.tech_skills, p.interests, u.name, u.image
            FROM profiles p
            JOIN users u ON u.id = p.user_id
            ORDER BY u.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list profiles: {e}")))?;

        rows.iter()
            .map(|row| {
                let profile = Self::row_to_profile(row)?;
                Ok(ProfileCard {
                    user_id: profile.user_id,
                    name: row
                        .try_get("name")
                        .map_err(|e| StoreError::QueryFailed(format!("name column: {e}")))?,
                    image: row
                        .try_get("image")
                        .map_err(|e| StoreError::QueryFailed(format!("image column: {e}")))?,
                    job_title: profile.job_title,
                    company: profile.company,
                    experience: profile.experience,
                    tech_skills: profile.tech_skills,
                    interests: profile.interests,
                })
            })
            .collect()
    }

    async fn create_connection(
        &self,
        requester_id: &str,
        target_id: &str,
    ) -> Result<Connection, StoreError> {
        if self.find_user_by_id(requester_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "user",
                id: requester_id.to_string(),
            });
        }
        if self.find_user_by_id(target_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "user",
                id: target_id.to_string(),
            });
        }

        let existing = sqlx::query(
            r#"
            SELECT id FROM connections
            WHERE (requester_id = ?1 AND target_id = ?2)
               OR (requester_id = ?2 AND target_id = ?1)
            "#,
        )
        .bind(requester_id)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("check connection: {e}")))?;

        if existing.is_some() {
            return Err(StoreError::ConnectionExists {
                requester_id: requester_id.to_string(),
                target_id: target_id.to_string(),
            });
        }

        let connection = Connection {
            id: Uuid::new_v4().to_string(),
            requester_id: requester_id.to_string(),
            target_id: target_id.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO connections (id, requester_id, target_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&connection.id)
        .bind(&connection.requester_id)
        .bind(&connection.target_id)
        .bind(connection.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert connection: {e}")))?;

        Ok(connection)
    }

    async fn list_connections(&self, user_id: &str) -> Result<Vec<ConnectionView>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, requester_id, target_id, created_at
            FROM connections
            WHERE requester_id = ?1 OR target_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list connections: {e}")))?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            let created_at: String = row
                .try_get("created_at")
                .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
            let conn = Connection {
                id: row
                    .try_get("id")
                    .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?,
                requester_id: row
                    .try_get("requester_id")
                    .map_err(|e| StoreError::QueryFailed(format!("requester_id column: {e}")))?,
                target_id: row
                    .try_get("target_id")
                    .map_err(|e| StoreError::QueryFailed(format!("target_id column: {e}")))?,
                created_at: parse_timestamp(&created_at)?,
            };

            let other_id = if conn.requester_id == user_id {
                conn.target_id.clone()
            } else {
                conn.requester_id.clone()
            };

            let Some(other) = self.find_user_by_id(&other_id).await? else {
                continue; // user deleted since; skip the dangling edge
            };
            let profile = self.find_profile_by_user_id(&other_id).await?;

            views.push(connection_view(&conn, user_id, other, profile));
        }

        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = SqliteStore::new(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    fn draft() -> ProfileDraft {
        ProfileDraft {
            job_title: Some("Backend Dev".into()),
            company: Some("Acme".into()),
            experience: Some("5 years".into()),
            tech_skills: vec!["Rust".into(), "Go".into()],
            interests: vec!["Chess".into()],
        }
    }

    #[tokio::test]
    async fn user_roundtrip() {
        let (store, _dir) = test_store().await;
        let user = store
            .upsert_user("Ana", "ana@example.com", Some("http://img"))
            .await
            .unwrap();

        let by_id = store.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ana@example.com");

        let by_email = store
            .find_user_by_email("ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn upsert_user_updates_image_on_second_sign_in() {
        let (store, _dir) = test_store().await;
        let first = store.upsert_user("Ana", "ana@x.com", None).await.unwrap();
        let second = store
            .upsert_user("Ana", "ana@x.com", Some("http://new"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.image.as_deref(), Some("http://new"));
    }

    #[tokio::test]
    async fn profile_upsert_and_listing() {
        let (store, _dir) = test_store().await;
        let user = store.upsert_user("Ana", "ana@x.com", None).await.unwrap();
        store.upsert_profile(&user.id, draft()).await.unwrap();

        // Second upsert replaces, not duplicates
        let mut updated = draft();
        updated.tech_skills = vec!["Rust".into()];
        store.upsert_profile(&user.id, updated).await.unwrap();

        let cards = store.list_profiles().await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "Ana");
        assert_eq!(cards[0].tech_skills, vec!["Rust"]);

        let json = serde_json::to_string(&cards[0]).unwrap();
        assert!(!json.contains("ana@x.com"));
    }

    #[tokio::test]
    async fn profile_for_unknown_user_fails() {
        let (store, _dir) = test_store().await;
        let err = store.upsert_profile("ghost", draft()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn connection_conflict_in_either_direction() {
        let (store, _dir) = test_store().await;
        let a = store.upsert_user("Ana", "a@x.com", None).await.unwrap();
        let b = store.upsert_user("Bea", "b@x.com", None).await.unwrap();

        store.create_connection(&a.id, &b.id).await.unwrap();

        assert!(matches!(
            store.create_connection(&a.id, &b.id).await,
            Err(StoreError::ConnectionExists { .. })
        ));
        assert!(matches!(
            store.create_connection(&b.id, &a.id).await,
            Err(StoreError::ConnectionExists { .. })
        ));

        let for_a = store.list_connections(&a.id).await.unwrap();
        let for_b = store.list_connections(&b.id).await.unwrap();
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_a[0].user.id, b.id);
        assert_eq!(for_b[0].user.id, a.id);
    }

    #[tokio::test]
    async fn connections_listed_newest_first_with_profiles() {
        let (store, _dir) = test_store().await;
        let a = store.upsert_user("Ana", "a@x.com", None).await.unwrap();
        let b = store.upsert_user("Bea", "b@x.com", None).await.unwrap();
        let c = store.upsert_user("Cleo", "c@x.com", None).await.unwrap();
        store.upsert_profile(&b.id, draft()).await.unwrap();

        store.create_connection(&a.id, &b.id).await.unwrap();
        store.create_connection(&c.id, &a.id).await.unwrap();

        let views = store.list_connections(&a.id).await.unwrap();
        assert_eq!(views.len(), 2);
        // Bea's entry carries her profile; Cleo has none
        let bea = views.iter().find(|v| v.user.id == b.id).unwrap();
        assert!(bea.profile.is_some());
        let cleo = views.iter().find(|v| v.user.id == c.id).unwrap();
        assert!(cleo.profile.is_none());
        assert!(!cleo.is_requester);
    }
}
