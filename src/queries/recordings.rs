use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use crate::schema::Recordings;

const ALL_COLUMNS: [Recordings; 5] = [
    Recordings::Id,
    Recordings::Filename,
    Recordings::Filepath,
    Recordings::Filesize,
    Recordings::CreatedAt,
];

/// INSERT INTO recordings (filename, filepath, filesize, createdAt) VALUES (?, ?, ?, ?) RETURNING id
pub fn insert(filename: &str, filepath: &str, filesize: i64, created_at: &str) -> String {
    Query::insert()
        .into_table(Recordings::Table)
        .columns([
            Recordings::Filename,
            Recordings::Filepath,
            Recordings::Filesize,
            Recordings::CreatedAt,
        ])
        .values_panic([
            filename.into(),
            filepath.into(),
            filesize.into(),
            created_at.into(),
        ])
        .returning_col(Recordings::Id)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings ORDER BY createdAt DESC, id ASC
///
/// Rows sharing a timestamp keep insertion order.
pub fn select_all_newest_first() -> String {
    Query::select()
        .columns(ALL_COLUMNS)
        .from(Recordings::Table)
        .order_by(Recordings::CreatedAt, Order::Desc)
        .order_by(Recordings::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings WHERE id = ?
pub fn select_by_id(id: i64) -> String {
    Query::select()
        .columns(ALL_COLUMNS)
        .from(Recordings::Table)
        .and_where(Expr::col(Recordings::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT MAX(id) FROM recordings
pub fn select_max_id() -> String {
    Query::select()
        .expr(Expr::col(Recordings::Id).max())
        .from(Recordings::Table)
        .to_string(SqliteQueryBuilder)
}
