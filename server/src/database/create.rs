use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version. Bump this whenever the schema changes and add a
/// corresponding migration arm in `run_migrations`.
const SCHEMA_VERSION: i64 = 2;

/// Initialize the database schema and run any pending migrations.
pub async fn create_tables(pool: &SqlitePool) -> sqlx::Result<()> {
    create_schema(pool).await?;
    run_migrations(pool).await?;
    Ok(())
}

/// Create the tables for a brand-new database.
async fn create_schema(pool: &SqlitePool) -> sqlx::Result<()> {
    // The Google columns hold the per-user calendar credential. A NULL or
    // empty access token means "not connected".
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            username             TEXT    NOT NULL UNIQUE,
            email                TEXT    NOT NULL UNIQUE,
            password_hash        TEXT    NOT NULL,
            created_at           INTEGER NOT NULL,
            last_login           INTEGER,
            google_access_token  TEXT,
            google_refresh_token TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email    ON users(email)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Apply any schema migrations required to reach `SCHEMA_VERSION`.
///
/// Uses `PRAGMA user_version` as the migration counter. Each arm checks the
/// actual table shape first, so it is safe on a database created at any
/// earlier version.
async fn run_migrations(pool: &SqlitePool) -> sqlx::Result<()> {
    let current_version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    info!(
        "Database schema at version {}; target version {}. Running migrations…",
        current_version, SCHEMA_VERSION
    );

    // ── v1 → v2: Google calendar credential columns on users ─────────────
    if current_version < 2 {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('users')")
                .fetch_all(pool)
                .await?;

        for column in ["google_access_token", "google_refresh_token"] {
            if !columns.iter().any(|c| c == column) {
                warn!("Migrating users table: adding {}", column);
                let stmt = format!("ALTER TABLE users ADD COLUMN {} TEXT", column);
                sqlx::query(&stmt).execute(pool).await?;
            }
        }
    }

    let stmt = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
    sqlx::query(&stmt).execute(pool).await?;
    info!("Schema version set to {}.", SCHEMA_VERSION);

    Ok(())
}
