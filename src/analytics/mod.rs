//! Read-only analytics over the results store: aggregation queries, the
//! qualification threshold, derived ratios and the memoizing front.

pub mod aggregation;
pub mod cache;
pub mod derived;
pub mod service;
pub mod threshold;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use aggregation::{
    CandidateRegionRow, NationalParticipationRow, NationalTendencyRow,
    RegionalParticipationRow, RegionalTendencyRow,
};
pub use cache::{MemoryCache, NoCache, QueryCache};
pub use service::Dashboard;
pub use threshold::ThresholdRow;

/// Election round; stored as `urne_vote.final_round`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Round {
    First,
    Second,
}

impl Round {
    pub fn is_final(self) -> bool {
        matches!(self, Round::Second)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Round::First => write!(f, "1er tour"),
            Round::Second => write!(f, "2eme tour"),
        }
    }
}

/// Kind of election; stored as `urne_vote.is_legis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ElectionType {
    Presidential,
    Legislative,
}

impl ElectionType {
    pub fn is_legis(self) -> bool {
        matches!(self, ElectionType::Legislative)
    }
}

impl fmt::Display for ElectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElectionType::Presidential => write!(f, "presidentielle"),
            ElectionType::Legislative => write!(f, "legislatives"),
        }
    }
}
