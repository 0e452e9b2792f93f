use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    Statement,
};
use std::path::Path;

/// How the SQLite file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// `mode=ro`: every write fails at the driver level
    ReadOnly,
    /// `mode=rwc`: create the file when missing
    ReadWriteCreate,
}

impl AccessMode {
    fn as_query_value(self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "ro",
            AccessMode::ReadWriteCreate => "rwc",
        }
    }
}

pub fn build_sqlite_url(path: &Path, mode: AccessMode) -> String {
    // Normalize path separators and ensure proper URL form on Windows
    let normalized = path.to_string_lossy().replace('\\', "/");
    let needs_leading_slash = !normalized.starts_with('/') && normalized.contains(':');
    let prefix = if needs_leading_slash { "/" } else { "" };
    format!(
        "sqlite://{}{}?mode={}",
        prefix,
        normalized,
        mode.as_query_value()
    )
}

/// Open a connection to the SQLite file at `path`.
///
/// Relative paths are resolved against the current directory. In
/// `ReadWriteCreate` mode the parent directory is created as well.
pub async fn open(path: &Path, mode: AccessMode) -> anyhow::Result<DatabaseConnection> {
    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    if mode == AccessMode::ReadWriteCreate {
        if let Some(parent) = absolute_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut options = ConnectOptions::new(build_sqlite_url(&absolute_path, mode));
    // One connection: the file has a single writer and reads happen once at load
    options.max_connections(1).sqlx_logging(false);

    tracing::debug!(
        "Opening database {} ({:?})",
        absolute_path.display(),
        mode
    );
    let conn = Database::connect(options).await?;
    Ok(conn)
}

pub async fn table_exists<C: ConnectionTrait>(conn: &C, table_name: &str) -> Result<bool, DbErr> {
    let row = conn
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "SELECT COUNT(1) AS cnt FROM sqlite_master WHERE type = 'table' AND name = ?",
            [table_name.into()],
        ))
        .await?;

    let count: i64 = match row {
        Some(row) => row.try_get("", "cnt")?,
        None => 0,
    };
    Ok(count > 0)
}

pub async fn execute_ddl<C: ConnectionTrait>(conn: &C, sql: &str) -> Result<(), DbErr> {
    conn.execute(Statement::from_string(DatabaseBackend::Sqlite, sql.to_string()))
        .await?;
    Ok(())
}
