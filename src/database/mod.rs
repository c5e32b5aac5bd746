pub mod ingestion;
pub mod schema;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Store unavailable ({url}): {source}")]
    StoreUnavailable {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Data integrity error: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Handle on the election results store.
///
/// Every query takes one of these explicitly; cloning is cheap and shares the
/// underlying pool.
#[derive(Clone)]
pub struct ResultsDatabase {
    pool: SqlitePool,
}

impl ResultsDatabase {
    /// Open (or create) a database for reading and loading.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = parse_options(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|source| unavailable(database_url, source))?;

        Ok(Self { pool })
    }

    /// Open an existing database without write access. Fails with
    /// `StoreUnavailable` when the file is missing.
    pub async fn open_read_only(database_url: &str) -> Result<Self> {
        let options = parse_options(database_url)?.read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|source| unavailable(database_url, source))?;

        Ok(Self { pool })
    }

    /// In-memory store with a single long-lived connection, so that every
    /// query sees the same database.
    pub async fn create_in_memory() -> Result<Self> {
        let url = "sqlite::memory:";
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(parse_options(url)?)
            .await
            .map_err(|source| unavailable(url, source))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Row counts for every table, in schema order
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        let mut counts = Vec::with_capacity(schema::TABLES.len());
        for table in schema::TABLES {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            let count: i64 = sqlx::query_scalar(&sql)
                .fetch_one(&self.pool)
                .await?;
            counts.push((*table, count));
        }
        Ok(counts)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_options(database_url: &str) -> Result<SqliteConnectOptions> {
    SqliteConnectOptions::from_str(database_url).map_err(|source| unavailable(database_url, source))
}

fn unavailable(database_url: &str, source: sqlx::Error) -> DatabaseError {
    DatabaseError::StoreUnavailable {
        url: database_url.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_is_shared_across_queries() {
        let db = ResultsDatabase::create_in_memory().await.unwrap();
        schema::create_schema(db.pool()).await.unwrap();

        let counts = db.table_counts().await.unwrap();
        assert_eq!(counts.len(), schema::TABLES.len());
        assert!(counts.iter().all(|(_, count)| *count == 0));
    }

    #[tokio::test]
    async fn missing_database_is_reported_as_unavailable() {
        let result =
            ResultsDatabase::open_read_only("sqlite:/nonexistent-directory/election/mdb.db").await;

        match result {
            Err(DatabaseError::StoreUnavailable { url, .. }) => {
                assert!(url.contains("nonexistent-directory"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("opening a missing database should fail"),
        }
    }
}
