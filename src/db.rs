//! SQLite metadata store for uploaded recordings.
//!
//! Rows are inserted once per upload and never updated or deleted here.

use log::info;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Executor, Row, Sqlite};
use std::path::Path;

use crate::models::Recording;
use crate::queries::{ddl, recordings};

pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Open a file-based database pool for production use
/// Creates the file if missing and enables WAL mode
pub async fn open_database_connection(db_path: &Path) -> Result<SqlitePool, DynError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| format!("Failed to open database '{}': {}", db_path.display(), e))?;

    info!("SQLite database: {}", db_path.display());
    Ok(pool)
}

/// Create the recordings table and its index if they do not exist yet
pub async fn init_database_schema(pool: &SqlitePool) -> Result<(), DynError> {
    sqlx::query(&ddl::create_recordings_table())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_recordings_created_at_index())
        .execute(pool)
        .await?;
    Ok(())
}

/// Create a database in a fresh temporary directory for tests
/// Keep the returned guard alive for as long as the pool is used
pub async fn create_test_connection_in_temporary_file(
) -> Result<(SqlitePool, tempfile::TempDir), DynError> {
    let guard = tempfile::tempdir()?;
    let pool = open_database_connection(&guard.path().join("test.sqlite")).await?;
    Ok((pool, guard))
}

fn recording_from_row(row: &SqliteRow) -> Result<Recording, sqlx::Error> {
    Ok(Recording {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        filepath: row.try_get("filepath")?,
        filesize: row.try_get("filesize")?,
        created_at: row.try_get("createdAt")?,
    })
}

/// Insert one recording row and return the id assigned by the store
pub async fn insert_recording<'e, E>(
    executor: E,
    filename: &str,
    filepath: &str,
    filesize: i64,
    created_at: &str,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = recordings::insert(filename, filepath, filesize, created_at);
    sqlx::query_scalar::<_, i64>(&sql).fetch_one(executor).await
}

/// All recordings, newest first
pub async fn list_recordings<'e, E>(executor: E) -> Result<Vec<Recording>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = recordings::select_all_newest_first();
    let rows = sqlx::query(&sql).fetch_all(executor).await?;
    rows.iter().map(recording_from_row).collect()
}

pub async fn get_recording<'e, E>(executor: E, id: i64) -> Result<Option<Recording>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = recordings::select_by_id(id);
    let row = sqlx::query(&sql).fetch_optional(executor).await?;
    row.as_ref().map(recording_from_row).transpose()
}

/// Highest id assigned so far, or None on an empty table
pub async fn max_recording_id<'e, E>(executor: E) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = recordings::select_max_id();
    sqlx::query_scalar::<_, Option<i64>>(&sql)
        .fetch_one(executor)
        .await
}
