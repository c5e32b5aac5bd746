/// Parameterized aggregation queries over the results store
use super::{ElectionType, Round};
use crate::database::{ResultsDatabase, Result};
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Participation counters summed over the whole country for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NationalParticipationRow {
    pub annee: String,
    pub inscripts: i64,
    pub exprimes: i64,
    pub nullparts: i64,
    pub votants: i64,
}

/// Participation counters for one (year, department).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RegionalParticipationRow {
    pub annee: String,
    #[serde(rename = "Region")]
    pub region: String,
    pub inscripts: i64,
    pub exprimes: i64,
    pub nullparts: i64,
    pub votants: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NationalTendencyRow {
    pub annee: String,
    pub courant: Option<String>,
    pub resultat: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RegionalTendencyRow {
    pub annee: String,
    #[serde(rename = "Region")]
    pub region: String,
    pub courant: Option<String>,
    pub resultat: i64,
}

/// Average vote count of one candidate across the ballots of a department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CandidateRegionRow {
    pub department_code: i64,
    pub department_name: String,
    pub resultat: f64,
}

const NATIONAL_PARTICIPATION_SQL: &str = r#"
    SELECT
        uv.annee AS annee,
        SUM(m.inscripts) AS inscripts,
        SUM(m.exprimes) AS exprimes,
        SUM(m.nullparts) AS nullparts,
        SUM(m.votants) AS votants
    FROM urne_vote uv
    JOIN resultat_metainfo m ON m.urne_vote_id = uv.id
    WHERE uv.is_legis = ? AND uv.final_round = ?
    GROUP BY uv.annee
    ORDER BY uv.annee
"#;

const REGIONAL_PARTICIPATION_SQL: &str = r#"
    SELECT
        uv.annee AS annee,
        r.department_name AS region,
        SUM(m.inscripts) AS inscripts,
        SUM(m.exprimes) AS exprimes,
        SUM(m.nullparts) AS nullparts,
        SUM(m.votants) AS votants
    FROM urne_vote uv
    JOIN region r ON r.department_code = uv.region_code
    JOIN resultat_metainfo m ON m.urne_vote_id = uv.id
    WHERE uv.is_legis = ? AND uv.final_round = ?
    GROUP BY uv.annee, r.department_name
    ORDER BY uv.annee, r.department_name
"#;

const NATIONAL_TENDENCY_SQL: &str = r#"
    SELECT
        uv.annee AS annee,
        cp.courant AS courant,
        SUM(rc.value) AS resultat
    FROM urne_vote uv
    JOIN resultat_candidat rc ON rc.urne_vote_id = uv.id
    JOIN candidat_parti cp ON cp.id = rc.candidat_parti_id
    WHERE uv.is_legis = ? AND uv.final_round = ?
    GROUP BY uv.annee, cp.courant
    ORDER BY uv.annee, cp.courant
"#;

const REGIONAL_TENDENCY_SQL: &str = r#"
    SELECT
        uv.annee AS annee,
        r.department_name AS region,
        cp.courant AS courant,
        SUM(rc.value) AS resultat
    FROM urne_vote uv
    JOIN region r ON r.department_code = uv.region_code
    JOIN resultat_candidat rc ON rc.urne_vote_id = uv.id
    JOIN candidat_parti cp ON cp.id = rc.candidat_parti_id
    WHERE uv.is_legis = ? AND uv.final_round = ?
    GROUP BY uv.annee, r.department_name, cp.courant
    ORDER BY uv.annee, r.department_name, cp.courant
"#;

const CANDIDATE_BY_REGION_SQL: &str = r#"
    SELECT
        r.department_code AS department_code,
        r.department_name AS department_name,
        AVG(rc.value) AS resultat
    FROM urne_vote uv
    JOIN resultat_candidat rc ON rc.urne_vote_id = uv.id
    JOIN region r ON r.department_code = uv.region_code
    JOIN candidat_parti cp ON cp.id = rc.candidat_parti_id
    JOIN candidat c ON c.id = cp.candidat_id
    WHERE uv.is_legis = ? AND uv.final_round = ? AND c.candidat_name = ?
    GROUP BY r.department_code, r.department_name
    ORDER BY resultat DESC, r.department_name ASC
"#;

/// Run a query and log how long it took
pub(crate) async fn timed<T, F>(operation: &'static str, query: F) -> Result<Vec<T>>
where
    F: Future<Output = std::result::Result<Vec<T>, sqlx::Error>>,
{
    let start = Instant::now();
    let rows = query.await?;
    tracing::debug!(
        operation,
        rows = rows.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "query"
    );
    Ok(rows)
}

/// All department names, alphabetically
pub async fn department_names(db: &ResultsDatabase) -> Result<Vec<String>> {
    timed(
        "department_names",
        sqlx::query_scalar("SELECT department_name FROM region ORDER BY department_name")
            .fetch_all(db.pool()),
    )
    .await
}

pub async fn national_participation_by_year(
    db: &ResultsDatabase,
    round: Round,
    election: ElectionType,
) -> Result<Vec<NationalParticipationRow>> {
    timed(
        "national_participation_by_year",
        sqlx::query_as(NATIONAL_PARTICIPATION_SQL)
            .bind(election.is_legis())
            .bind(round.is_final())
            .fetch_all(db.pool()),
    )
    .await
}

pub async fn regional_participation_by_year(
    db: &ResultsDatabase,
    round: Round,
    election: ElectionType,
) -> Result<Vec<RegionalParticipationRow>> {
    timed(
        "regional_participation_by_year",
        sqlx::query_as(REGIONAL_PARTICIPATION_SQL)
            .bind(election.is_legis())
            .bind(round.is_final())
            .fetch_all(db.pool()),
    )
    .await
}

/// Votes per tendency (`courant`) and year
pub async fn tendency_by_year(
    db: &ResultsDatabase,
    round: Round,
    election: ElectionType,
) -> Result<Vec<NationalTendencyRow>> {
    timed(
        "tendency_by_year",
        sqlx::query_as(NATIONAL_TENDENCY_SQL)
            .bind(election.is_legis())
            .bind(round.is_final())
            .fetch_all(db.pool()),
    )
    .await
}

pub async fn tendency_by_year_and_region(
    db: &ResultsDatabase,
    round: Round,
    election: ElectionType,
) -> Result<Vec<RegionalTendencyRow>> {
    timed(
        "tendency_by_year_and_region",
        sqlx::query_as(REGIONAL_TENDENCY_SQL)
            .bind(election.is_legis())
            .bind(round.is_final())
            .fetch_all(db.pool()),
    )
    .await
}

/// Average result of one candidate per department, best department first.
///
/// The name must match exactly; an unknown candidate yields an empty table.
pub async fn candidate_median_by_region(
    db: &ResultsDatabase,
    round: Round,
    election: ElectionType,
    candidate_name: &str,
) -> Result<Vec<CandidateRegionRow>> {
    timed(
        "candidate_median_by_region",
        sqlx::query_as(CANDIDATE_BY_REGION_SQL)
            .bind(election.is_legis())
            .bind(round.is_final())
            .bind(candidate_name)
            .fetch_all(db.pool()),
    )
    .await
}
