//! Qualification threshold ("seuil") per department and year.
//!
//! The threshold is the smallest first-round share obtained by any
//! candidate-party that went on to the second round in that department.
//! It is computed in two passes: the store returns first-round tallies and the
//! second-round participants, then [`compute_thresholds`] combines them.

use super::aggregation::timed;
use super::derived::rounded_share_pct;
use super::ElectionType;
use crate::database::{ResultsDatabase, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// First-round votes of one candidate-party in one department and year.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FirstRoundTally {
    pub department_code: i64,
    pub annee: String,
    pub candidat_parti_id: i64,
    pub votes: i64,
}

/// A candidate-party present in the second round of a department and year.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Qualifier {
    pub department_code: i64,
    pub department_name: String,
    pub annee: String,
    pub candidat_parti_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRow {
    pub department_code: i64,
    pub department_name: String,
    pub annee: String,
    /// Minimum qualifying share in percent, two decimals. `None` when no
    /// qualifier has a defined first-round share.
    pub rs: Option<f64>,
}

const FIRST_ROUND_TALLIES_SQL: &str = r#"
    SELECT
        uv.region_code AS department_code,
        uv.annee AS annee,
        rc.candidat_parti_id AS candidat_parti_id,
        SUM(rc.value) AS votes
    FROM resultat_candidat rc
    JOIN urne_vote uv ON uv.id = rc.urne_vote_id
    WHERE uv.final_round = 0 AND uv.is_legis = ?
    GROUP BY uv.region_code, uv.annee, rc.candidat_parti_id
"#;

const QUALIFIERS_SQL: &str = r#"
    SELECT DISTINCT
        r.department_code AS department_code,
        r.department_name AS department_name,
        uv.annee AS annee,
        rc.candidat_parti_id AS candidat_parti_id
    FROM resultat_candidat rc
    JOIN urne_vote uv ON uv.id = rc.urne_vote_id
    JOIN region r ON r.department_code = uv.region_code
    WHERE uv.final_round = 1 AND uv.is_legis = ?
"#;

pub async fn first_round_tallies(
    db: &ResultsDatabase,
    election: ElectionType,
) -> Result<Vec<FirstRoundTally>> {
    timed(
        "first_round_tallies",
        sqlx::query_as(FIRST_ROUND_TALLIES_SQL)
            .bind(election.is_legis())
            .fetch_all(db.pool()),
    )
    .await
}

pub async fn second_round_qualifiers(
    db: &ResultsDatabase,
    election: ElectionType,
) -> Result<Vec<Qualifier>> {
    timed(
        "second_round_qualifiers",
        sqlx::query_as(QUALIFIERS_SQL)
            .bind(election.is_legis())
            .fetch_all(db.pool()),
    )
    .await
}

/// Threshold per (department, year), ordered by department name then year.
pub async fn threshold_per_region(
    db: &ResultsDatabase,
    election: ElectionType,
) -> Result<Vec<ThresholdRow>> {
    let tallies = first_round_tallies(db, election).await?;
    let qualifiers = second_round_qualifiers(db, election).await?;

    let rows = compute_thresholds(&tallies, &qualifiers);
    tracing::debug!(
        tallies = tallies.len(),
        qualifiers = qualifiers.len(),
        rows = rows.len(),
        "threshold computed"
    );
    Ok(rows)
}

/// Combine first-round tallies with second-round qualifiers.
///
/// A department/year without qualifiers produces no row. A qualifier that
/// has no first-round tally, or whose department had no first-round votes,
/// contributes no share.
pub fn compute_thresholds(tallies: &[FirstRoundTally], qualifiers: &[Qualifier]) -> Vec<ThresholdRow> {
    // Pass 1: first-round totals, then every candidate-party's share.
    let mut totals: HashMap<(i64, &str), i64> = HashMap::new();
    for tally in tallies {
        *totals
            .entry((tally.department_code, tally.annee.as_str()))
            .or_default() += tally.votes;
    }

    let shares: HashMap<(i64, &str, i64), Option<f64>> = tallies
        .iter()
        .map(|tally| {
            let total = totals[&(tally.department_code, tally.annee.as_str())];
            let share = rounded_share_pct(tally.votes, total, 2);
            (
                (tally.department_code, tally.annee.as_str(), tally.candidat_parti_id),
                share,
            )
        })
        .collect();

    // Pass 2: minimum share over the qualifiers of each department/year.
    let mut thresholds: BTreeMap<(&str, i64, &str), Option<f64>> = BTreeMap::new();
    for qualifier in qualifiers {
        let share = shares
            .get(&(
                qualifier.department_code,
                qualifier.annee.as_str(),
                qualifier.candidat_parti_id,
            ))
            .copied()
            .flatten();

        let current = thresholds
            .entry((
                qualifier.department_name.as_str(),
                qualifier.department_code,
                qualifier.annee.as_str(),
            ))
            .or_insert(None);

        *current = match (*current, share) {
            (Some(min), Some(share)) => Some(min.min(share)),
            (None, share) => share,
            (min, None) => min,
        };
    }

    thresholds
        .into_iter()
        .map(|((department_name, department_code, annee), rs)| ThresholdRow {
            department_code,
            department_name: department_name.to_string(),
            annee: annee.to_string(),
            rs,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures;

    fn tally(department_code: i64, annee: &str, candidat_parti_id: i64, votes: i64) -> FirstRoundTally {
        FirstRoundTally {
            department_code,
            annee: annee.to_string(),
            candidat_parti_id,
            votes,
        }
    }

    fn qualifier(department_code: i64, name: &str, annee: &str, candidat_parti_id: i64) -> Qualifier {
        Qualifier {
            department_code,
            department_name: name.to_string(),
            annee: annee.to_string(),
            candidat_parti_id,
        }
    }

    #[test]
    fn threshold_is_the_weakest_qualifier_share() {
        let tallies = vec![
            tally(1, "2022", 1, 100),
            tally(1, "2022", 2, 200),
            tally(1, "2022", 3, 700),
        ];
        let qualifiers = vec![qualifier(1, "Ain", "2022", 1), qualifier(1, "Ain", "2022", 2)];

        let rows = compute_thresholds(&tallies, &qualifiers);
        assert_eq!(
            rows,
            vec![ThresholdRow {
                department_code: 1,
                department_name: "Ain".to_string(),
                annee: "2022".to_string(),
                rs: Some(10.0),
            }]
        );
    }

    #[test]
    fn zero_first_round_total_gives_missing_threshold() {
        let tallies = vec![tally(976, "2022", 1, 0), tally(976, "2022", 2, 0)];
        let qualifiers = vec![qualifier(976, "Mayotte", "2022", 1)];

        let rows = compute_thresholds(&tallies, &qualifiers);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rs, None);
    }

    #[test]
    fn departments_without_qualifiers_are_absent() {
        let tallies = vec![tally(1, "2022", 1, 10), tally(75, "2022", 1, 10)];
        let qualifiers = vec![qualifier(75, "Paris", "2022", 1)];

        let rows = compute_thresholds(&tallies, &qualifiers);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].department_name, "Paris");
        assert_eq!(rows[0].rs, Some(100.0));
    }

    #[test]
    fn qualifier_without_first_round_result_is_ignored() {
        let tallies = vec![tally(1, "2022", 1, 300), tally(1, "2022", 2, 700)];
        let qualifiers = vec![qualifier(1, "Ain", "2022", 2), qualifier(1, "Ain", "2022", 9)];

        let rows = compute_thresholds(&tallies, &qualifiers);
        assert_eq!(rows[0].rs, Some(70.0));
    }

    #[test]
    fn shares_are_scoped_to_department_and_year() {
        let tallies = vec![
            tally(1, "2017", 1, 50),
            tally(1, "2017", 2, 50),
            tally(1, "2022", 1, 10),
            tally(1, "2022", 2, 90),
        ];
        let qualifiers = vec![
            qualifier(1, "Ain", "2022", 1),
            qualifier(1, "Ain", "2022", 2),
            qualifier(1, "Ain", "2017", 1),
            qualifier(1, "Ain", "2017", 2),
        ];

        let rows = compute_thresholds(&tallies, &qualifiers);
        let flat: Vec<(&str, Option<f64>)> = rows.iter().map(|r| (r.annee.as_str(), r.rs)).collect();
        assert_eq!(flat, vec![("2017", Some(50.0)), ("2022", Some(10.0))]);
    }

    #[test]
    fn half_way_shares_round_up() {
        let tallies = vec![tally(1, "2022", 1, 338), tally(1, "2022", 2, 7662)];
        let qualifiers = vec![qualifier(1, "Ain", "2022", 1), qualifier(1, "Ain", "2022", 2)];

        let rows = compute_thresholds(&tallies, &qualifiers);
        assert_eq!(rows[0].rs, Some(4.23));

        let tallies = vec![tally(29, "2017", 1, 201), tally(29, "2017", 2, 19799)];
        let qualifiers = vec![qualifier(29, "Finistere", "2017", 1)];
        assert_eq!(compute_thresholds(&tallies, &qualifiers)[0].rs, Some(1.01));
    }

    #[tokio::test]
    async fn threshold_over_the_store() {
        let db = fixtures::database().await;

        let rows = threshold_per_region(&db, ElectionType::Presidential).await.unwrap();
        let flat: Vec<(&str, &str, Option<f64>)> = rows
            .iter()
            .map(|r| (r.department_name.as_str(), r.annee.as_str(), r.rs))
            .collect();

        assert_eq!(
            flat,
            vec![
                ("Ain", "2002", Some(27.27)),
                ("Mayotte", "2002", None),
                ("Paris", "2002", Some(15.79)),
            ]
        );
    }

    #[tokio::test]
    async fn legislative_threshold_is_empty_without_legislative_ballots() {
        let db = fixtures::database().await;

        let rows = threshold_per_region(&db, ElectionType::Legislative).await.unwrap();
        assert!(rows.is_empty());
    }
}
