use sqlx::{FromRow, SqlitePool};

use super::utils::get_timestamp;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// What login needs: the stored hash and the row id.
#[derive(Debug, Clone, FromRow)]
pub struct UserAuth {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
    google_access_token: Option<String>,
}

impl UserRecord {
    pub fn google_connected(&self) -> bool {
        self.google_access_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

/// Insert a user and return its id.
pub async fn create_user(pool: &SqlitePool, user: &NewUser) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(get_timestamp())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Get user authentication data by username
pub async fn get_user_auth(pool: &SqlitePool, username: &str) -> sqlx::Result<Option<UserAuth>> {
    sqlx::query_as::<_, UserAuth>(
        "SELECT id, username, password_hash FROM users WHERE username = ?1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> sqlx::Result<Option<UserRecord>> {
    sqlx::query_as::<_, UserRecord>(
        "SELECT id, username, email, created_at, last_login, google_access_token
         FROM users WHERE username = ?1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

/// Resolve a token subject to a user id.
pub async fn get_user_id(pool: &SqlitePool, username: &str) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM users WHERE username = ?1")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn username_exists(pool: &SqlitePool, username: &str) -> sqlx::Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE username = ?1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

pub async fn email_exists(pool: &SqlitePool, email: &str) -> sqlx::Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM users WHERE email = ?1 COLLATE NOCASE")
            .bind(email)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

pub async fn update_last_login(pool: &SqlitePool, user_id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET last_login = ?1 WHERE id = ?2")
        .bind(get_timestamp())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
