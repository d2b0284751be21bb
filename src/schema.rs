use sea_query::Iden;

/// Recordings table - one row per uploaded file
#[derive(Iden)]
pub enum Recordings {
    Table,
    Id,
    Filename,
    Filepath,
    Filesize,
    #[iden = "createdAt"]
    CreatedAt,
}
