/// Memoization of query tables, keyed by operation and parameters
use super::aggregation::{
    CandidateRegionRow, NationalParticipationRow, NationalTendencyRow, RegionalParticipationRow,
    RegionalTendencyRow,
};
use super::threshold::ThresholdRow;
use super::{ElectionType, Round};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Departments,
    NationalParticipation { round: Round, election: ElectionType },
    RegionalParticipation { round: Round, election: ElectionType },
    NationalTendency { round: Round, election: ElectionType },
    RegionalTendency { round: Round, election: ElectionType },
    CandidateByRegion {
        round: Round,
        election: ElectionType,
        candidate: String,
    },
    Threshold { election: ElectionType },
}

impl QueryKey {
    pub fn operation(&self) -> &'static str {
        match self {
            QueryKey::Departments => "department_names",
            QueryKey::NationalParticipation { .. } => "national_participation_by_year",
            QueryKey::RegionalParticipation { .. } => "regional_participation_by_year",
            QueryKey::NationalTendency { .. } => "tendency_by_year",
            QueryKey::RegionalTendency { .. } => "tendency_by_year_and_region",
            QueryKey::CandidateByRegion { .. } => "candidate_median_by_region",
            QueryKey::Threshold { .. } => "threshold_per_region",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryTable {
    Departments(Vec<String>),
    NationalParticipation(Vec<NationalParticipationRow>),
    RegionalParticipation(Vec<RegionalParticipationRow>),
    NationalTendency(Vec<NationalTendencyRow>),
    RegionalTendency(Vec<RegionalTendencyRow>),
    CandidateByRegion(Vec<CandidateRegionRow>),
    Threshold(Vec<ThresholdRow>),
}

/// Row types that can be stored in a [`QueryTable`].
pub trait CachedRows: Sized + Clone {
    fn into_table(rows: Vec<Self>) -> QueryTable;
    fn from_table(table: QueryTable) -> Option<Vec<Self>>;
}

macro_rules! cached_rows {
    ($($row:ty => $variant:ident),* $(,)?) => {
        $(
            impl CachedRows for $row {
                fn into_table(rows: Vec<Self>) -> QueryTable {
                    QueryTable::$variant(rows)
                }

                fn from_table(table: QueryTable) -> Option<Vec<Self>> {
                    match table {
                        QueryTable::$variant(rows) => Some(rows),
                        _ => None,
                    }
                }
            }
        )*
    };
}

cached_rows! {
    String => Departments,
    NationalParticipationRow => NationalParticipation,
    RegionalParticipationRow => RegionalParticipation,
    NationalTendencyRow => NationalTendency,
    RegionalTendencyRow => RegionalTendency,
    CandidateRegionRow => CandidateByRegion,
    ThresholdRow => Threshold,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub table: QueryTable,
    pub cached_at: DateTime<Utc>,
}

/// Storage for query results. Implementations decide retention; a miss is
/// always safe since the caller falls back to the store.
pub trait QueryCache: Send + Sync {
    fn get(&self, key: &QueryKey) -> Option<CacheEntry>;
    fn put(&self, key: QueryKey, table: QueryTable);
    fn invalidate_all(&self);
}

impl<C: QueryCache + ?Sized> QueryCache for Box<C> {
    fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        (**self).get(key)
    }

    fn put(&self, key: QueryKey, table: QueryTable) {
        (**self).put(key, table)
    }

    fn invalidate_all(&self) {
        (**self).invalidate_all()
    }
}

/// Never stores anything; every query goes to the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl QueryCache for NoCache {
    fn get(&self, _key: &QueryKey) -> Option<CacheEntry> {
        None
    }

    fn put(&self, _key: QueryKey, _table: QueryTable) {}

    fn invalidate_all(&self) {}
}

/// In-process cache with an optional maximum entry age and size.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    max_age: Option<Duration>,
    max_entries: Option<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            ..Self::default()
        }
    }

    /// Evict the oldest table once `max_entries` are held. Zero disables
    /// storage altogether.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        // Entries are inserted whole, so a poisoned map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        match self.max_age {
            Some(max_age) => now - entry.cached_at > max_age,
            None => false,
        }
    }
}

impl QueryCache for MemoryCache {
    fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        let mut entries = self.entries();
        let expired = self.is_expired(entries.get(key)?, Utc::now());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).cloned()
    }

    fn put(&self, key: QueryKey, table: QueryTable) {
        let entry = CacheEntry {
            table,
            cached_at: Utc::now(),
        };
        let mut entries = self.entries();
        if let Some(max_entries) = self.max_entries {
            if max_entries == 0 {
                return;
            }
            while !entries.contains_key(&key) && entries.len() >= max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.cached_at)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(oldest) => {
                        entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        entries.insert(key, entry);
    }

    fn invalidate_all(&self) {
        self.entries().clear();
    }
}
