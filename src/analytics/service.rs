use super::aggregation::{
    self, CandidateRegionRow, NationalParticipationRow, NationalTendencyRow,
    RegionalParticipationRow, RegionalTendencyRow,
};
use super::cache::{CachedRows, MemoryCache, QueryCache, QueryKey};
use super::threshold::{self, ThresholdRow};
use super::{ElectionType, Round};
use crate::database::{ResultsDatabase, Result};
use std::future::Future;

/// Query front used by the presentation layer: a store handle plus a cache.
///
/// Tables are served from the cache when an entry exists for the same
/// operation and parameters; otherwise the store is queried and the result
/// is cached.
pub struct Dashboard<C: QueryCache = MemoryCache> {
    db: ResultsDatabase,
    cache: C,
}

impl Dashboard<MemoryCache> {
    pub fn new(db: ResultsDatabase) -> Self {
        Self::with_cache(db, MemoryCache::new())
    }
}

impl<C: QueryCache> Dashboard<C> {
    pub fn with_cache(db: ResultsDatabase, cache: C) -> Self {
        Self { db, cache }
    }

    pub fn database(&self) -> &ResultsDatabase {
        &self.db
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    async fn memoize<T, F>(&self, key: QueryKey, query: F) -> Result<Vec<T>>
    where
        T: CachedRows,
        F: Future<Output = Result<Vec<T>>>,
    {
        if let Some(rows) = self.cache.get(&key).and_then(|entry| T::from_table(entry.table)) {
            tracing::debug!(operation = key.operation(), rows = rows.len(), "cache hit");
            return Ok(rows);
        }

        let rows = query.await?;
        self.cache.put(key, T::into_table(rows.clone()));
        Ok(rows)
    }

    pub async fn department_names(&self) -> Result<Vec<String>> {
        self.memoize(QueryKey::Departments, aggregation::department_names(&self.db))
            .await
    }

    pub async fn national_participation(
        &self,
        round: Round,
        election: ElectionType,
    ) -> Result<Vec<NationalParticipationRow>> {
        self.memoize(
            QueryKey::NationalParticipation { round, election },
            aggregation::national_participation_by_year(&self.db, round, election),
        )
        .await
    }

    pub async fn regional_participation(
        &self,
        round: Round,
        election: ElectionType,
    ) -> Result<Vec<RegionalParticipationRow>> {
        self.memoize(
            QueryKey::RegionalParticipation { round, election },
            aggregation::regional_participation_by_year(&self.db, round, election),
        )
        .await
    }

    pub async fn national_tendency(
        &self,
        round: Round,
        election: ElectionType,
    ) -> Result<Vec<NationalTendencyRow>> {
        self.memoize(
            QueryKey::NationalTendency { round, election },
            aggregation::tendency_by_year(&self.db, round, election),
        )
        .await
    }

    pub async fn regional_tendency(
        &self,
        round: Round,
        election: ElectionType,
    ) -> Result<Vec<RegionalTendencyRow>> {
        self.memoize(
            QueryKey::RegionalTendency { round, election },
            aggregation::tendency_by_year_and_region(&self.db, round, election),
        )
        .await
    }

    pub async fn candidate_by_region(
        &self,
        round: Round,
        election: ElectionType,
        candidate_name: &str,
    ) -> Result<Vec<CandidateRegionRow>> {
        self.memoize(
            QueryKey::CandidateByRegion {
                round,
                election,
                candidate: candidate_name.to_string(),
            },
            aggregation::candidate_median_by_region(&self.db, round, election, candidate_name),
        )
        .await
    }

    pub async fn threshold(&self, election: ElectionType) -> Result<Vec<ThresholdRow>> {
        self.memoize(
            QueryKey::Threshold { election },
            threshold::threshold_per_region(&self.db, election),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::cache::NoCache;
    use crate::analytics::fixtures;

    async fn add_second_department(db: &ResultsDatabase) {
        sqlx::query("INSERT INTO region (department_code, department_name) VALUES (2, 'Aisne')")
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn repeated_calls_are_served_from_the_cache() {
        let db = fixtures::database().await;
        let dashboard = Dashboard::new(db.clone());

        let first = dashboard.department_names().await.unwrap();
        add_second_department(&db).await;
        let second = dashboard.department_names().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(dashboard.cache().len(), 1);
    }

    #[tokio::test]
    async fn invalidation_picks_up_store_changes() {
        let db = fixtures::database().await;
        let dashboard = Dashboard::new(db.clone());

        dashboard.department_names().await.unwrap();
        add_second_department(&db).await;
        dashboard.cache().invalidate_all();

        let names = dashboard.department_names().await.unwrap();
        assert_eq!(names, vec!["Ain", "Aisne", "Mayotte", "Paris"]);
    }

    #[tokio::test]
    async fn bypassing_the_cache_always_reads_the_store() {
        let db = fixtures::database().await;
        let dashboard = Dashboard::with_cache(db.clone(), NoCache);

        dashboard.department_names().await.unwrap();
        add_second_department(&db).await;

        assert_eq!(dashboard.department_names().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn cached_and_uncached_tables_agree() {
        let db = fixtures::database().await;
        let cached = Dashboard::new(db.clone());
        let uncached = Dashboard::with_cache(db, NoCache);

        for _ in 0..2 {
            assert_eq!(
                cached.threshold(ElectionType::Presidential).await.unwrap(),
                uncached.threshold(ElectionType::Presidential).await.unwrap()
            );
            assert_eq!(
                cached
                    .candidate_by_region(Round::First, ElectionType::Presidential, "LAGUILLER")
                    .await
                    .unwrap(),
                uncached
                    .candidate_by_region(Round::First, ElectionType::Presidential, "LAGUILLER")
                    .await
                    .unwrap()
            );
            assert_eq!(
                cached
                    .regional_tendency(Round::Second, ElectionType::Presidential)
                    .await
                    .unwrap(),
                uncached
                    .regional_tendency(Round::Second, ElectionType::Presidential)
                    .await
                    .unwrap()
            );
        }
        assert_eq!(cached.cache().len(), 3);
    }

    #[tokio::test]
    async fn parameters_are_part_of_the_cache_key() {
        let db = fixtures::database().await;
        let dashboard = Dashboard::new(db);

        let first = dashboard
            .national_participation(Round::First, ElectionType::Presidential)
            .await
            .unwrap();
        let second = dashboard
            .national_participation(Round::Second, ElectionType::Presidential)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(dashboard.cache().len(), 2);
    }
}
