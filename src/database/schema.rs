use crate::database::{DatabaseError, Result};
/// Database schema definitions and integrity checks
use sqlx::SqlitePool;

/// Every table of the results store, parents first.
pub const TABLES: &[&str] = &[
    "region",
    "parti",
    "candidat",
    "candidat_parti",
    "urne_vote",
    "resultat_candidat",
    "resultat_metainfo",
];

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Regions are keyed by department code only; ballots reference that code.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS region (
            department_code INTEGER PRIMARY KEY,
            department_name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parti (
            id INTEGER PRIMARY KEY,
            parti_name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidat (
            id INTEGER PRIMARY KEY,
            candidat_name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidat_parti (
            id INTEGER PRIMARY KEY,
            courant TEXT,
            candidat_id INTEGER NOT NULL,
            parti_id INTEGER NOT NULL,
            FOREIGN KEY (candidat_id) REFERENCES candidat(id),
            FOREIGN KEY (parti_id) REFERENCES parti(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS urne_vote (
            id INTEGER PRIMARY KEY,
            circonscription INTEGER NOT NULL,
            region_code INTEGER NOT NULL,
            annee TEXT NOT NULL,
            final_round INTEGER NOT NULL DEFAULT 0,
            is_legis INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (region_code) REFERENCES region(department_code),
            UNIQUE(circonscription, region_code, annee, final_round, is_legis)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resultat_candidat (
            id INTEGER PRIMARY KEY,
            urne_vote_id INTEGER NOT NULL,
            candidat_parti_id INTEGER NOT NULL,
            value INTEGER NOT NULL DEFAULT 0 CHECK (value >= 0),
            FOREIGN KEY (urne_vote_id) REFERENCES urne_vote(id),
            FOREIGN KEY (candidat_parti_id) REFERENCES candidat_parti(id),
            UNIQUE(urne_vote_id, candidat_parti_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resultat_metainfo (
            id INTEGER PRIMARY KEY,
            urne_vote_id INTEGER NOT NULL UNIQUE,
            inscripts INTEGER NOT NULL DEFAULT 0,
            votants INTEGER NOT NULL DEFAULT 0,
            nullparts INTEGER NOT NULL DEFAULT 0,
            exprimes INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (urne_vote_id) REFERENCES urne_vote(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    create_indexes(pool).await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    let indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_urne_vote_filter ON urne_vote(is_legis, final_round, annee)",
        "CREATE INDEX IF NOT EXISTS idx_urne_vote_region ON urne_vote(region_code)",
        "CREATE INDEX IF NOT EXISTS idx_resultat_candidat_urne ON resultat_candidat(urne_vote_id)",
        "CREATE INDEX IF NOT EXISTS idx_resultat_candidat_cp ON resultat_candidat(candidat_parti_id)",
        "CREATE INDEX IF NOT EXISTS idx_candidat_parti_candidat ON candidat_parti(candidat_id)",
        "CREATE INDEX IF NOT EXISTS idx_candidat_name ON candidat(candidat_name)",
    ];

    for index_sql in indexes {
        sqlx::query(index_sql).execute(pool).await?;
    }

    Ok(())
}

/// Verify database schema integrity
pub async fn verify_schema(pool: &SqlitePool) -> Result<()> {
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(pool)
            .await?;

    for expected in TABLES {
        if !tables.iter().any(|name| name == expected) {
            return Err(DatabaseError::Integrity(format!(
                "Missing table: {}",
                expected
            )));
        }
    }

    Ok(())
}
