use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use gts_core::location::{CapacityRecord, CapacitySummary};
use gts_core::repository::CapacityRepository;
use gts_core::settings::CapacitySettings;
use gts_core::{CoreError, CoreResult};

/// What a single read-compute-commit pass decided to write.
enum Mutation {
    Insert(CapacityRecord),
    Update(CapacityRecord),
    Skip,
}

/// Per-location-per-day spot accounting.
///
/// Every mutation reads the current record, computes the next one and commits
/// it only if the stored version is unchanged, retrying on conflict. Records for
/// different (location, date) keys are independent.
pub struct CapacityLedger {
    repo: Arc<dyn CapacityRepository>,
    settings: CapacitySettings,
}

impl CapacityLedger {
    pub fn new(repo: Arc<dyn CapacityRepository>, settings: CapacitySettings) -> Self {
        Self { repo, settings }
    }

    /// The ledger's notion of "today" (UTC calendar date).
    pub fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub fn auto_provision(&self) -> bool {
        self.settings.auto_provision
    }

    pub async fn get(&self, location_id: Uuid, date: NaiveDate) -> CoreResult<Option<CapacityRecord>> {
        Ok(self.repo.fetch_capacity(location_id, date).await?)
    }

    /// A missing record counts as available only under auto-provisioning.
    pub async fn has_capacity(&self, location_id: Uuid, date: NaiveDate) -> CoreResult<bool> {
        match self.repo.fetch_capacity(location_id, date).await? {
            Some(record) => Ok(record.has_capacity()),
            None => Ok(self.settings.auto_provision),
        }
    }

    /// Sell one spot.
    pub async fn claim(&self, location_id: Uuid, date: NaiveDate) -> CoreResult<CapacityRecord> {
        let defaults = (self.settings.default_total_spots, self.settings.default_holdback_spots);
        let auto_provision = self.settings.auto_provision;

        let committed = self
            .commit(location_id, date, |current| match current {
                Some(record) if record.has_capacity() => {
                    Ok(Mutation::Update(CapacityRecord { sold_spots: record.sold_spots + 1, ..record.clone() }))
                }
                Some(_) => Err(CoreError::CapacityExhausted { location_id, date }),
                None if auto_provision => {
                    let record = CapacityRecord::new(location_id, date, defaults.0, defaults.1, 1);
                    if record.is_consistent() {
                        Ok(Mutation::Insert(record))
                    } else {
                        Err(CoreError::CapacityExhausted { location_id, date })
                    }
                }
                None => Err(CoreError::CapacityNotConfigured { location_id, date }),
            })
            .await?;

        committed.ok_or(CoreError::CapacityExhausted { location_id, date })
    }

    /// Return one spot. Returns `None` when there was nothing to release.
    pub async fn release(&self, location_id: Uuid, date: NaiveDate) -> CoreResult<Option<CapacityRecord>> {
        self.commit(location_id, date, |current| match current {
            Some(record) if record.sold_spots > 0 => {
                Ok(Mutation::Update(CapacityRecord { sold_spots: record.sold_spots - 1, ..record.clone() }))
            }
            _ => Ok(Mutation::Skip),
        })
        .await
    }

    /// Administrative override of total and/or holdback spots.
    pub async fn set_capacity(
        &self,
        location_id: Uuid,
        date: NaiveDate,
        total_spots: Option<i32>,
        holdback_spots: Option<i32>,
    ) -> CoreResult<CapacityRecord> {
        let defaults = (self.settings.default_total_spots, self.settings.default_holdback_spots);

        let committed = self
            .commit(location_id, date, |current| {
                let (base, insert) = match current {
                    Some(record) => (record.clone(), false),
                    None => (CapacityRecord::new(location_id, date, defaults.0, defaults.1, 0), true),
                };
                let next = CapacityRecord {
                    total_spots: total_spots.unwrap_or(base.total_spots),
                    holdback_spots: holdback_spots.unwrap_or(base.holdback_spots),
                    ..base
                };
                validate_override(&next)?;
                Ok(if insert { Mutation::Insert(next) } else { Mutation::Update(next) })
            })
            .await?;

        committed.ok_or_else(|| CoreError::Storage("capacity override was not committed".to_string()))
    }

    /// Add one spot on top of whatever is configured.
    pub async fn force_add_capacity(&self, location_id: Uuid, date: NaiveDate) -> CoreResult<CapacityRecord> {
        let defaults = (self.settings.default_total_spots, self.settings.default_holdback_spots);

        let committed = self
            .commit(location_id, date, |current| {
                Ok(match current {
                    Some(record) => Mutation::Update(CapacityRecord { total_spots: record.total_spots + 1, ..record.clone() }),
                    None => Mutation::Insert(CapacityRecord::new(location_id, date, defaults.0 + 1, defaults.1, 0)),
                })
            })
            .await?;

        committed.ok_or_else(|| CoreError::Storage("capacity increase was not committed".to_string()))
    }

    /// Read model. Without a record this reports what a claim would provision,
    /// or an empty day when auto-provisioning is off.
    pub async fn summary(&self, location_id: Uuid, date: NaiveDate) -> CoreResult<CapacitySummary> {
        let record = match self.repo.fetch_capacity(location_id, date).await? {
            Some(record) => record,
            None if self.settings.auto_provision => CapacityRecord::new(
                location_id,
                date,
                self.settings.default_total_spots,
                self.settings.default_holdback_spots,
                0,
            ),
            None => CapacityRecord::new(location_id, date, 0, 0, 0),
        };
        Ok(record.summary())
    }

    async fn commit<F>(&self, location_id: Uuid, date: NaiveDate, compute: F) -> CoreResult<Option<CapacityRecord>>
    where
        F: Fn(Option<&CapacityRecord>) -> CoreResult<Mutation>,
    {
        let attempts = self.settings.max_commit_attempts.max(1);

        for attempt in 1..=attempts {
            let current = self.repo.fetch_capacity(location_id, date).await?;

            match compute(current.as_ref())? {
                Mutation::Skip => return Ok(None),
                Mutation::Insert(record) => {
                    if self.repo.insert_capacity(&record).await? {
                        return Ok(Some(record));
                    }
                }
                Mutation::Update(mut record) => {
                    let expected = current.as_ref().map(|r| r.version).unwrap_or_default();
                    record.version = expected + 1;
                    if self.repo.update_capacity(&record, expected).await? {
                        return Ok(Some(record));
                    }
                }
            }

            tracing::debug!("Capacity commit for {} on {} lost a race (attempt {})", location_id, date, attempt);
        }

        tracing::warn!("Capacity ledger gave up on {} on {} after {} attempts", location_id, date, attempts);
        Err(CoreError::Contention { location_id, attempts })
    }
}

fn validate_override(record: &CapacityRecord) -> CoreResult<()> {
    if record.total_spots < 0 || record.holdback_spots < 0 {
        return Err(CoreError::InvalidCapacity("spot counts must not be negative".to_string()));
    }
    if record.holdback_spots > record.total_spots {
        return Err(CoreError::InvalidCapacity(format!(
            "holdback {} exceeds total {}",
            record.holdback_spots, record.total_spots
        )));
    }
    if record.sold_spots > record.sellable() {
        return Err(CoreError::InvalidCapacity(format!(
            "{} spots already sold but only {} would be sellable",
            record.sold_spots,
            record.sellable()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gts_core::InMemoryStore;

    fn ledger_with(settings: CapacitySettings) -> (Arc<InMemoryStore>, CapacityLedger) {
        let store = Arc::new(InMemoryStore::new());
        let ledger = CapacityLedger::new(store.clone(), settings);
        (store, ledger)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[tokio::test]
    async fn test_claim_provisions_default_record() {
        let (_, ledger) = ledger_with(CapacitySettings::default());
        let location = Uuid::new_v4();

        assert!(ledger.has_capacity(location, date()).await.unwrap());
        let record = ledger.claim(location, date()).await.unwrap();
        assert_eq!((record.total_spots, record.holdback_spots, record.sold_spots), (20, 2, 1));

        let summary = ledger.summary(location, date()).await.unwrap();
        assert_eq!(summary.available_spots, 17);
    }

    #[tokio::test]
    async fn test_claim_never_oversells() {
        let (store, ledger) = ledger_with(CapacitySettings::default());
        let location = Uuid::new_v4();
        store.put_capacity(CapacityRecord::new(location, date(), 3, 1, 1)).await;

        ledger.claim(location, date()).await.unwrap();
        let err = ledger.claim(location, date()).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityExhausted { .. }));

        let record = ledger.get(location, date()).await.unwrap().unwrap();
        assert_eq!(record.sold_spots, 2);
        assert!(record.is_consistent());
        assert!(!ledger.has_capacity(location, date()).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_is_noop_without_sales() {
        let (store, ledger) = ledger_with(CapacitySettings::default());
        let location = Uuid::new_v4();

        assert!(ledger.release(location, date()).await.unwrap().is_none());

        store.put_capacity(CapacityRecord::new(location, date(), 20, 2, 0)).await;
        assert!(ledger.release(location, date()).await.unwrap().is_none());

        ledger.claim(location, date()).await.unwrap();
        let released = ledger.release(location, date()).await.unwrap().unwrap();
        assert_eq!(released.sold_spots, 0);
    }

    #[tokio::test]
    async fn test_set_capacity_rules() {
        let (store, ledger) = ledger_with(CapacitySettings::default());
        let location = Uuid::new_v4();

        let created = ledger.set_capacity(location, date(), Some(30), None).await.unwrap();
        assert_eq!((created.total_spots, created.holdback_spots, created.sold_spots), (30, 2, 0));

        let err = ledger.set_capacity(location, date(), Some(5), Some(6)).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidCapacity(_)));

        store.put_capacity(CapacityRecord::new(location, date(), 30, 2, 10)).await;
        let err = ledger.set_capacity(location, date(), Some(11), None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidCapacity(_)));

        let ok = ledger.set_capacity(location, date(), Some(12), None).await.unwrap();
        assert_eq!(ok.available(), 0);
    }

    #[tokio::test]
    async fn test_force_add_capacity() {
        let (store, ledger) = ledger_with(CapacitySettings::default());
        let fresh = Uuid::new_v4();
        let full = Uuid::new_v4();

        let record = ledger.force_add_capacity(fresh, date()).await.unwrap();
        assert_eq!((record.total_spots, record.holdback_spots, record.sold_spots), (21, 2, 0));

        store.put_capacity(CapacityRecord::new(full, date(), 10, 2, 8)).await;
        assert!(!ledger.has_capacity(full, date()).await.unwrap());
        ledger.force_add_capacity(full, date()).await.unwrap();
        assert!(ledger.has_capacity(full, date()).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_record_fails_closed_without_auto_provision() {
        let settings = CapacitySettings { auto_provision: false, ..CapacitySettings::default() };
        let (_, ledger) = ledger_with(settings);
        let location = Uuid::new_v4();

        assert!(!ledger.has_capacity(location, date()).await.unwrap());
        let err = ledger.claim(location, date()).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityNotConfigured { .. }));
        assert_eq!(ledger.summary(location, date()).await.unwrap().available_spots, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_respect_capacity() {
        let (store, ledger) = ledger_with(CapacitySettings::default());
        let ledger = Arc::new(ledger);
        let location = Uuid::new_v4();
        store.put_capacity(CapacityRecord::new(location, date(), 6, 1, 0)).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.claim(location, date()).await }));
        }

        let mut sold = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => sold += 1,
                Err(CoreError::CapacityExhausted { .. }) => {}
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert_eq!(sold, 5);
        let record = ledger.get(location, date()).await.unwrap().unwrap();
        assert_eq!(record.sold_spots, 5);
        assert_eq!(record.version, 5);
    }

    #[tokio::test]
    async fn test_interleaved_claims_and_releases_stay_consistent() {
        let (store, ledger) = ledger_with(CapacitySettings::default());
        let location = Uuid::new_v4();
        store.put_capacity(CapacityRecord::new(location, date(), 4, 1, 0)).await;

        // true = claim, false = release
        let steps = [
            false, true, true, false, true, true, true, true, false, false, false, false, false, true,
        ];
        let mut expected = 0;
        for (i, claim) in steps.into_iter().enumerate() {
            if claim {
                match ledger.claim(location, date()).await {
                    Ok(_) => expected += 1,
                    Err(CoreError::CapacityExhausted { .. }) => assert_eq!(expected, 3, "step {}", i),
                    Err(other) => panic!("unexpected error at step {}: {}", i, other),
                }
            } else {
                let released = ledger.release(location, date()).await.unwrap();
                assert_eq!(released.is_some(), expected > 0, "step {}", i);
                if released.is_some() {
                    expected -= 1;
                }
            }

            let record = ledger.get(location, date()).await.unwrap().unwrap();
            assert!(record.is_consistent(), "step {}: {:?}", i, record);
            assert_eq!(record.sold_spots, expected, "step {}", i);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_and_releases_stay_consistent() {
        let (store, ledger) = ledger_with(CapacitySettings::default());
        let ledger = Arc::new(ledger);
        let location = Uuid::new_v4();
        store.put_capacity(CapacityRecord::new(location, date(), 6, 1, 3)).await;

        let mut handles = Vec::new();
        for i in 0..24 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    ledger.claim(location, date()).await.map(|_| 1)
                } else {
                    ledger.release(location, date()).await.map(|r| if r.is_some() { -1 } else { 0 })
                }
            }));
        }

        let mut sold = 3;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(delta) => sold += delta,
                Err(CoreError::CapacityExhausted { .. } | CoreError::Contention { .. }) => {}
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        let record = ledger.get(location, date()).await.unwrap().unwrap();
        assert!(record.is_consistent(), "{:?}", record);
        assert_eq!(record.sold_spots, sold);
    }
}
