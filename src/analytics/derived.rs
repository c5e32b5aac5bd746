//! Ratios and row-wise helpers over fetched tables. No I/O.
//!
//! A zero denominator never produces 0, infinity or a panic: the ratio is
//! `None`, which serializes as `null`.

use super::aggregation::{
    NationalParticipationRow, NationalTendencyRow, RegionalParticipationRow, RegionalTendencyRow,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// `part * 100 / total`, or `None` when `total` is zero.
pub fn share_pct(part: i64, total: i64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(part as f64 * 100.0 / total as f64)
}

/// `part * 100 / total` rounded half away from zero to `decimals` places,
/// or `None` when `total` is zero. Computed in integers so decimal ties
/// such as 4.225 round up.
pub fn rounded_share_pct(part: i64, total: i64, decimals: u32) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let scale = 10i128.pow(decimals);
    let numerator = i128::from(part) * 100 * scale;
    let denominator = i128::from(total);
    let magnitude = (numerator.abs() * 2 + denominator.abs()) / (denominator.abs() * 2);
    let rounded = if (numerator < 0) != (denominator < 0) {
        -magnitude
    } else {
        magnitude
    };
    Some(rounded as f64 / scale as f64)
}

/// Round half away from zero to `decimals` places.
///
/// The scaled value is nudged by a few ulps so that a decimal tie stored
/// just below its binary neighbour (422.4999... for 4.225) still rounds up.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    let nudged = scaled + scaled.signum() * scaled.abs() * f64::EPSILON * 4.0;
    nudged.round() / factor
}

/// Expressed votes as a percentage of voters.
pub fn participation_pct(exprimes: i64, votants: i64) -> Option<f64> {
    share_pct(exprimes, votants)
}

/// Rows carrying the counters a participation rate is computed from.
pub trait Participation {
    fn exprimes(&self) -> i64;
    fn votants(&self) -> i64;

    fn participation_pct(&self) -> Option<f64> {
        participation_pct(self.exprimes(), self.votants())
    }
}

impl Participation for NationalParticipationRow {
    fn exprimes(&self) -> i64 {
        self.exprimes
    }

    fn votants(&self) -> i64 {
        self.votants
    }
}

impl Participation for RegionalParticipationRow {
    fn exprimes(&self) -> i64 {
        self.exprimes
    }

    fn votants(&self) -> i64 {
        self.votants
    }
}

/// A participation row together with its derived rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithParticipation<R> {
    #[serde(flatten)]
    pub row: R,
    pub participation: Option<f64>,
}

pub fn with_participation<R>(rows: &[R]) -> Vec<WithParticipation<R>>
where
    R: Participation + Clone,
{
    rows.iter()
        .map(|row| WithParticipation {
            participation: row.participation_pct(),
            row: row.clone(),
        })
        .collect()
}

fn fold_participation<'a, I>(rows: I) -> Vec<NationalParticipationRow>
where
    I: IntoIterator<Item = &'a RegionalParticipationRow>,
{
    let mut by_year: BTreeMap<&str, NationalParticipationRow> = BTreeMap::new();
    for row in rows {
        let total = by_year
            .entry(row.annee.as_str())
            .or_insert_with(|| NationalParticipationRow {
                annee: row.annee.clone(),
                inscripts: 0,
                exprimes: 0,
                nullparts: 0,
                votants: 0,
            });
        total.inscripts += row.inscripts;
        total.exprimes += row.exprimes;
        total.nullparts += row.nullparts;
        total.votants += row.votants;
    }
    by_year.into_values().collect()
}

/// Sum the regional breakdown over all departments, per year.
pub fn national_from_regional(rows: &[RegionalParticipationRow]) -> Vec<NationalParticipationRow> {
    fold_participation(rows)
}

/// Participation of one department, per year.
pub fn participation_for_region(
    rows: &[RegionalParticipationRow],
    region: &str,
) -> Vec<NationalParticipationRow> {
    fold_participation(rows.iter().filter(|row| row.region == region))
}

fn fold_tendency<'a, I>(rows: I) -> Vec<NationalTendencyRow>
where
    I: IntoIterator<Item = &'a RegionalTendencyRow>,
{
    let mut by_key: BTreeMap<(&str, Option<&str>), i64> = BTreeMap::new();
    for row in rows {
        *by_key
            .entry((row.annee.as_str(), row.courant.as_deref()))
            .or_default() += row.resultat;
    }
    by_key
        .into_iter()
        .map(|((annee, courant), resultat)| NationalTendencyRow {
            annee: annee.to_string(),
            courant: courant.map(str::to_string),
            resultat,
        })
        .collect()
}

/// Sum the regional tendency breakdown over all departments.
pub fn national_tendency_from_regional(rows: &[RegionalTendencyRow]) -> Vec<NationalTendencyRow> {
    fold_tendency(rows)
}

/// Tendency results of one department, per (year, tendency).
pub fn tendency_for_region(rows: &[RegionalTendencyRow], region: &str) -> Vec<NationalTendencyRow> {
    fold_tendency(rows.iter().filter(|row| row.region == region))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regional(annee: &str, region: &str, exprimes: i64, votants: i64) -> RegionalParticipationRow {
        RegionalParticipationRow {
            annee: annee.to_string(),
            region: region.to_string(),
            inscripts: votants * 2,
            exprimes,
            nullparts: votants - exprimes,
            votants,
        }
    }

    fn tendency(annee: &str, region: &str, courant: Option<&str>, resultat: i64) -> RegionalTendencyRow {
        RegionalTendencyRow {
            annee: annee.to_string(),
            region: region.to_string(),
            courant: courant.map(str::to_string),
            resultat,
        }
    }

    #[test]
    fn participation_is_expressed_over_voters() {
        assert_eq!(participation_pct(95, 100), Some(95.0));
        assert_eq!(participation_pct(0, 10), Some(0.0));
    }

    #[test]
    fn zero_voters_is_a_missing_value() {
        let pct = participation_pct(0, 0);
        assert_eq!(pct, None);

        let row = regional("2002", "Mayotte", 0, 0);
        assert_eq!(row.participation_pct(), None);
    }

    #[test]
    fn missing_participation_serializes_as_null() {
        let rows = with_participation(&[regional("2002", "Mayotte", 0, 0)]);
        let json = serde_json::to_value(&rows).unwrap();

        assert!(json[0]["participation"].is_null());
        assert_eq!(json[0]["Region"], "Mayotte");
        assert_eq!(json[0]["annee"], "2002");
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to(27.272727, 2), 27.27);
        assert_eq!(round_to(31.818181, 2), 31.82);
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(10.0, 2), 10.0);
        assert_eq!(round_to(-0.125, 2), -0.13);
    }

    #[test]
    fn decimal_ties_round_up_despite_binary_representation() {
        assert_eq!(round_to(338.0 * 100.0 / 8000.0, 2), 4.23);
        assert_eq!(round_to(201.0 * 100.0 / 20000.0, 2), 1.01);
        assert_eq!(round_to(82.0 * 100.0 / 8000.0, 2), 1.03);
    }

    #[test]
    fn rounded_share_is_exact_on_ties() {
        assert_eq!(rounded_share_pct(338, 8000, 2), Some(4.23));
        assert_eq!(rounded_share_pct(201, 20000, 2), Some(1.01));
        assert_eq!(rounded_share_pct(82, 8000, 2), Some(1.03));
        assert_eq!(rounded_share_pct(300, 1100, 2), Some(27.27));
        assert_eq!(rounded_share_pct(1, 3, 0), Some(33.0));
        assert_eq!(rounded_share_pct(5, 0, 2), None);
    }

    #[test]
    fn rounded_share_agrees_with_rounding_the_float_share() {
        for total in [7, 640, 875, 1430, 8000, 99_991] {
            for part in [0, 1, total / 3, total / 2, total - 1, total] {
                let float = share_pct(part, total).map(|pct| round_to(pct, 2));
                assert_eq!(rounded_share_pct(part, total, 2), float, "{}/{}", part, total);
            }
        }
    }

    #[test]
    fn every_participation_call_site_agrees() {
        let national = NationalParticipationRow {
            annee: "2002".to_string(),
            inscripts: 0,
            exprimes: 0,
            nullparts: 0,
            votants: 0,
        };
        let regional = regional("2002", "Mayotte", 0, 0);
        let annotated = with_participation(&[national.clone()]);

        assert_eq!(national.participation_pct(), regional.participation_pct());
        assert_eq!(annotated[0].participation, participation_pct(0, 0));
    }

    #[test]
    fn regional_rows_fold_into_national_totals() {
        let rows = vec![
            regional("1995", "Ain", 780, 800),
            regional("2002", "Ain", 880, 900),
            regional("2002", "Paris", 1900, 2000),
        ];

        let national = national_from_regional(&rows);
        assert_eq!(national.len(), 2);
        assert_eq!(national[1].annee, "2002");
        assert_eq!(national[1].exprimes, 2780);
        assert_eq!(national[1].votants, 2900);
        assert_eq!(national[1].inscripts, 5800);
    }

    #[test]
    fn region_selection_keeps_only_that_department() {
        let rows = vec![
            regional("1995", "Ain", 780, 800),
            regional("1995", "Paris", 1450, 1500),
            regional("2002", "Ain", 880, 900),
        ];

        let ain = participation_for_region(&rows, "Ain");
        let years: Vec<&str> = ain.iter().map(|r| r.annee.as_str()).collect();
        assert_eq!(years, vec!["1995", "2002"]);
        assert!(participation_for_region(&rows, "Corse").is_empty());
    }

    #[test]
    fn tendency_folds_keep_missing_labels_apart() {
        let rows = vec![
            tendency("2002", "Ain", Some("DROIT"), 240),
            tendency("2002", "Paris", Some("DROIT"), 700),
            tendency("2002", "Paris", None, 5),
        ];

        let national = national_tendency_from_regional(&rows);
        assert_eq!(
            national,
            vec![
                NationalTendencyRow {
                    annee: "2002".to_string(),
                    courant: None,
                    resultat: 5,
                },
                NationalTendencyRow {
                    annee: "2002".to_string(),
                    courant: Some("DROIT".to_string()),
                    resultat: 940,
                },
            ]
        );

        let paris = tendency_for_region(&rows, "Paris");
        assert_eq!(paris.len(), 2);
        assert_eq!(tendency_for_region(&rows, "Ain")[0].resultat, 240);
    }
}
