/// Dataset loading for the results store
use crate::database::{ResultsDatabase, Result};
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid dataset: {0}")]
    Json(#[from] serde_json::Error),
}

/// A self-contained election results dataset, as produced by the ETL step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub regions: Vec<RegionRecord>,
    #[serde(default)]
    pub parties: Vec<PartyRecord>,
    #[serde(default)]
    pub candidates: Vec<CandidateRecord>,
    #[serde(default)]
    pub candidate_parties: Vec<CandidatePartyRecord>,
    #[serde(default)]
    pub ballots: Vec<BallotRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionRecord {
    pub department_code: i64,
    pub department_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyRecord {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePartyRecord {
    pub id: i64,
    pub candidate_id: i64,
    pub party_id: i64,
    #[serde(default)]
    pub courant: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotRecord {
    pub circonscription: i64,
    pub region_code: i64,
    pub annee: String,
    #[serde(default)]
    pub final_round: bool,
    #[serde(default)]
    pub is_legis: bool,
    #[serde(default)]
    pub meta: Option<MetaInfoRecord>,
    #[serde(default)]
    pub results: Vec<ResultRecord>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetaInfoRecord {
    pub inscripts: i64,
    pub votants: i64,
    pub nullparts: i64,
    pub exprimes: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResultRecord {
    pub candidate_party_id: i64,
    pub value: i64,
}

impl Dataset {
    pub fn from_json_str(json: &str) -> std::result::Result<Self, DatasetError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> std::result::Result<Self, DatasetError> {
        let contents = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }
}

impl BallotRecord {
    fn label(&self) -> String {
        format!(
            "{} dept {} circ {} {}{}",
            self.annee,
            self.region_code,
            self.circonscription,
            if self.final_round { "T2" } else { "T1" },
            if self.is_legis { " legis" } else { "" }
        )
    }
}

/// Inconsistency in the raw counters of one ballot. Reported, never rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityIssue {
    MissingMetaInfo,
    TurnoutExceedsRegistered { votants: i64, inscripts: i64 },
    CountsExceedTurnout { exprimes: i64, nullparts: i64, votants: i64 },
    ResultsMismatch { results_total: i64, exprimes: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityWarning {
    pub ballot: String,
    pub issue: QualityIssue,
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.ballot)?;
        match &self.issue {
            QualityIssue::MissingMetaInfo => write!(f, "no meta info row"),
            QualityIssue::TurnoutExceedsRegistered { votants, inscripts } => {
                write!(f, "votants ({}) > inscripts ({})", votants, inscripts)
            }
            QualityIssue::CountsExceedTurnout {
                exprimes,
                nullparts,
                votants,
            } => write!(
                f,
                "exprimes + nullparts ({} + {}) > votants ({})",
                exprimes, nullparts, votants
            ),
            QualityIssue::ResultsMismatch {
                results_total,
                exprimes,
            } => write!(
                f,
                "candidate results sum to {} but exprimes is {}",
                results_total, exprimes
            ),
        }
    }
}

/// Check the counter invariants of every ballot in a dataset
pub fn check_quality(dataset: &Dataset) -> Vec<QualityWarning> {
    let mut warnings = Vec::new();

    for ballot in &dataset.ballots {
        let mut push = |issue| {
            warnings.push(QualityWarning {
                ballot: ballot.label(),
                issue,
            })
        };

        let meta = match ballot.meta {
            Some(meta) => meta,
            None => {
                push(QualityIssue::MissingMetaInfo);
                continue;
            }
        };

        if meta.votants > meta.inscripts {
            push(QualityIssue::TurnoutExceedsRegistered {
                votants: meta.votants,
                inscripts: meta.inscripts,
            });
        }
        if meta.exprimes + meta.nullparts > meta.votants {
            push(QualityIssue::CountsExceedTurnout {
                exprimes: meta.exprimes,
                nullparts: meta.nullparts,
                votants: meta.votants,
            });
        }

        let results_total: i64 = ballot.results.iter().map(|r| r.value).sum();
        if !ballot.results.is_empty() && results_total != meta.exprimes {
            push(QualityIssue::ResultsMismatch {
                results_total,
                exprimes: meta.exprimes,
            });
        }
    }

    warnings
}

#[derive(Debug, Default)]
pub struct IngestionSummary {
    pub regions: usize,
    pub parties: usize,
    pub candidates: usize,
    pub candidate_parties: usize,
    pub ballots: usize,
    pub results: usize,
    pub warnings: Vec<QualityWarning>,
    pub total_duration_ms: u64,
}

pub struct DatasetLoader {
    db: ResultsDatabase,
}

impl DatasetLoader {
    pub fn new(db: ResultsDatabase) -> Self {
        Self { db }
    }

    /// Load a dataset in a single transaction. Reference rows are upserted;
    /// a ballot that already exists aborts the whole load.
    pub async fn load(&self, dataset: &Dataset) -> Result<IngestionSummary> {
        let start = Instant::now();

        let warnings = check_quality(dataset);
        for warning in &warnings {
            tracing::warn!(%warning, "data quality");
        }

        let mut tx = self.db.pool().begin().await?;

        for region in &dataset.regions {
            sqlx::query(
                r#"
                INSERT INTO region (department_code, department_name)
                VALUES (?, ?)
                ON CONFLICT(department_code) DO UPDATE SET
                    department_name = excluded.department_name
                "#,
            )
            .bind(region.department_code)
            .bind(&region.department_name)
            .execute(&mut *tx)
            .await?;
        }

        for party in &dataset.parties {
            sqlx::query(
                r#"
                INSERT INTO parti (id, parti_name)
                VALUES (?, ?)
                ON CONFLICT(id) DO UPDATE SET parti_name = excluded.parti_name
                "#,
            )
            .bind(party.id)
            .bind(&party.name)
            .execute(&mut *tx)
            .await?;
        }

        for candidate in &dataset.candidates {
            sqlx::query(
                r#"
                INSERT INTO candidat (id, candidat_name)
                VALUES (?, ?)
                ON CONFLICT(id) DO UPDATE SET candidat_name = excluded.candidat_name
                "#,
            )
            .bind(candidate.id)
            .bind(&candidate.name)
            .execute(&mut *tx)
            .await?;
        }

        for binding in &dataset.candidate_parties {
            sqlx::query(
                r#"
                INSERT INTO candidat_parti (id, courant, candidat_id, parti_id)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    courant = excluded.courant,
                    candidat_id = excluded.candidat_id,
                    parti_id = excluded.parti_id
                "#,
            )
            .bind(binding.id)
            .bind(&binding.courant)
            .bind(binding.candidate_id)
            .bind(binding.party_id)
            .execute(&mut *tx)
            .await?;
        }

        let mut result_count = 0usize;
        for ballot in &dataset.ballots {
            let urne_vote_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO urne_vote (circonscription, region_code, annee, final_round, is_legis)
                VALUES (?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(ballot.circonscription)
            .bind(ballot.region_code)
            .bind(&ballot.annee)
            .bind(ballot.final_round)
            .bind(ballot.is_legis)
            .fetch_one(&mut *tx)
            .await?;

            if let Some(meta) = &ballot.meta {
                sqlx::query(
                    r#"
                    INSERT INTO resultat_metainfo (urne_vote_id, inscripts, votants, nullparts, exprimes)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(urne_vote_id)
                .bind(meta.inscripts)
                .bind(meta.votants)
                .bind(meta.nullparts)
                .bind(meta.exprimes)
                .execute(&mut *tx)
                .await?;
            }

            for result in &ballot.results {
                sqlx::query(
                    r#"
                    INSERT INTO resultat_candidat (urne_vote_id, candidat_parti_id, value)
                    VALUES (?, ?, ?)
                    "#,
                )
                .bind(urne_vote_id)
                .bind(result.candidate_party_id)
                .bind(result.value)
                .execute(&mut *tx)
                .await?;
                result_count += 1;
            }
        }

        tx.commit().await?;

        let summary = IngestionSummary {
            regions: dataset.regions.len(),
            parties: dataset.parties.len(),
            candidates: dataset.candidates.len(),
            candidate_parties: dataset.candidate_parties.len(),
            ballots: dataset.ballots.len(),
            results: result_count,
            warnings,
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            ballots = summary.ballots,
            results = summary.results,
            warnings = summary.warnings.len(),
            duration_ms = summary.total_duration_ms,
            "dataset loaded"
        );

        Ok(summary)
    }
}
