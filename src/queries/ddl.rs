use sea_query::{ColumnDef, Index, SqliteQueryBuilder, Table};

use crate::schema::Recordings;

/// CREATE TABLE IF NOT EXISTS recordings (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     filename TEXT NOT NULL,
///     filepath TEXT NOT NULL,
///     filesize BIGINT NOT NULL,
///     createdAt TEXT NOT NULL
/// )
pub fn create_recordings_table() -> String {
    Table::create()
        .table(Recordings::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Recordings::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(Recordings::Filename).string().not_null())
        .col(ColumnDef::new(Recordings::Filepath).string().not_null())
        .col(ColumnDef::new(Recordings::Filesize).big_integer().not_null())
        .col(ColumnDef::new(Recordings::CreatedAt).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_recordings_created_at ON recordings(createdAt)
pub fn create_recordings_created_at_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_recordings_created_at")
        .table(Recordings::Table)
        .col(Recordings::CreatedAt)
        .to_string(SqliteQueryBuilder)
}
