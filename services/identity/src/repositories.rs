//! User repository with Postgres and in-memory backends
//!
//! The in-memory backend is selected when the database is unreachable at
//! startup. It is explicitly not durable; it exists so the service keeps
//! answering instead of refusing to start.

use anyhow::Result;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::models::User;

/// Failure modes of user creation
///
/// Duplicates are detected at the store itself (unique constraint on
/// username, or the map checked under its write lock), so two concurrent
/// registrations for the same name cannot both succeed.
#[derive(Error, Debug)]
pub enum CreateUserError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Memory(Arc<RwLock<HashMap<String, User>>>),
}

impl UserRepository {
    /// Create a repository backed by PostgreSQL
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    /// Create a repository backed by an in-memory map (not durable)
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(HashMap::new()))),
        }
    }

    /// Create a new user with an already-hashed password
    ///
    /// The id is assigned here, never derived from the username.
    pub async fn create(&self, username: &str, password_hash: &str) -> Result<User, CreateUserError> {
        info!("Creating new user: {}", username);

        match &self.backend {
            Backend::Postgres(pool) => {
                let row = sqlx::query(
                    r#"
                    INSERT INTO users (username, password_hash)
                    VALUES ($1, $2)
                    RETURNING id, username, password_hash, created_at
                    "#,
                )
                .bind(username)
                .bind(password_hash)
                .fetch_one(pool)
                .await
                .map_err(|e| match &e {
                    sqlx::Error::Database(db) if db.is_unique_violation() => {
                        CreateUserError::DuplicateUsername
                    }
                    _ => CreateUserError::Store(e.into()),
                })?;

                Ok(User {
                    id: row.get("id"),
                    username: row.get("username"),
                    password_hash: row.get("password_hash"),
                    created_at: row.get("created_at"),
                })
            }
            Backend::Memory(map) => {
                let mut map = map.write().await;
                if map.contains_key(username) {
                    return Err(CreateUserError::DuplicateUsername);
                }
                let user = User {
                    id: Uuid::new_v4(),
                    username: username.to_string(),
                    password_hash: password_hash.to_string(),
                    created_at: Utc::now(),
                };
                map.insert(username.to_string(), user.clone());
                Ok(user)
            }
        }
    }

    /// Find a user by username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let row = sqlx::query(
                    r#"
                    SELECT id, username, password_hash, created_at
                    FROM users
                    WHERE username = $1
                    "#,
                )
                .bind(username)
                .fetch_optional(pool)
                .await?;

                Ok(row.map(|row| User {
                    id: row.get("id"),
                    username: row.get("username"),
                    password_hash: row.get("password_hash"),
                    created_at: row.get("created_at"),
                }))
            }
            Backend::Memory(map) => Ok(map.read().await.get(username).cloned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let repo = UserRepository::in_memory();

        let created = repo.create("alice", "hash").await.unwrap();
        let found = repo.find_by_username("alice").await.unwrap().unwrap();

        assert_eq!(found.id, created.id);
        assert_eq!(found.username, "alice");
    }

    #[tokio::test]
    async fn duplicate_create_is_a_duplicate_error() {
        let repo = UserRepository::in_memory();

        repo.create("alice", "hash").await.unwrap();
        let err = repo.create("alice", "other").await.unwrap_err();
        assert!(matches!(err, CreateUserError::DuplicateUsername));
    }

    #[tokio::test]
    async fn unknown_username_is_none() {
        let repo = UserRepository::in_memory();
        assert!(repo.find_by_username("nobody").await.unwrap().is_none());
    }
}
