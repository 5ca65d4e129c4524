use crate::domain::models::{Alarm, AlarmState};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::snapshot_repository::SnapshotRepository;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub const SNAPSHOT_KEY: &str = "alarms";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Missing,
    AlreadyResolved,
    Resolved(Alarm),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub restored: usize,
    pub recovered_from_corruption: bool,
}

#[derive(Debug, Default)]
struct StoreInner {
    alarms: HashMap<i64, Alarm>,
    order: Vec<i64>,
}

impl StoreInner {
    fn snapshot(&self) -> Vec<Alarm> {
        self.order
            .iter()
            .filter_map(|id| self.alarms.get(id).cloned())
            .collect()
    }

    fn replace(&mut self, alarms: Vec<Alarm>) {
        self.alarms.clear();
        self.order.clear();
        for alarm in alarms {
            if self.alarms.insert(alarm.id, alarm.clone()).is_none() {
                self.order.push(alarm.id);
            }
        }
    }
}

// Sole owner of Alarm records. Every mutation persists the full snapshot;
// a storage failure surfaces as Persistence and does not roll back memory.
pub struct AlarmStore<S: SnapshotRepository> {
    repository: Arc<S>,
    inner: Mutex<StoreInner>,
}

impl<S: SnapshotRepository> AlarmStore<S> {
    pub fn new(repository: Arc<S>) -> Self {
        Self {
            repository,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    // A missing or corrupt payload resets to an empty store instead of
    // failing; the summary reports the recovery so the caller can log it.
    pub fn load(&self) -> Result<LoadSummary, InfraError> {
        let payload = self
            .repository
            .load(SNAPSHOT_KEY)
            .map_err(|error| match error {
                InfraError::Persistence(message) => InfraError::Persistence(message),
                other => InfraError::Persistence(format!("read alarm snapshot: {other}")),
            })?;
        let mut inner = self.lock_inner()?;

        let Some(payload) = payload else {
            inner.replace(Vec::new());
            return Ok(LoadSummary::default());
        };

        match serde_json::from_slice::<Vec<Alarm>>(&payload) {
            Ok(alarms) => {
                let restored = alarms.len();
                inner.replace(alarms);
                Ok(LoadSummary {
                    restored,
                    recovered_from_corruption: false,
                })
            }
            Err(_) => {
                inner.replace(Vec::new());
                Ok(LoadSummary {
                    restored: 0,
                    recovered_from_corruption: true,
                })
            }
        }
    }

    pub fn list(&self) -> Result<Vec<Alarm>, InfraError> {
        Ok(self.lock_inner()?.snapshot())
    }

    pub fn get(&self, id: i64) -> Result<Option<Alarm>, InfraError> {
        Ok(self.lock_inner()?.alarms.get(&id).cloned())
    }

    pub fn upsert(&self, alarm: Alarm) -> Result<(), InfraError> {
        let snapshot = {
            let mut inner = self.lock_inner()?;
            if inner.alarms.insert(alarm.id, alarm.clone()).is_none() {
                inner.order.push(alarm.id);
            }
            inner.snapshot()
        };
        self.persist_snapshot(&snapshot)
    }

    pub fn remove(&self, id: i64) -> Result<bool, InfraError> {
        let (removed, snapshot) = {
            let mut inner = self.lock_inner()?;
            let removed = inner.alarms.remove(&id).is_some();
            if removed {
                inner.order.retain(|candidate| *candidate != id);
            }
            (removed, inner.snapshot())
        };
        self.persist_snapshot(&snapshot)?;
        Ok(removed)
    }

    pub fn mark_resolved(&self, id: i64) -> Result<ResolveOutcome, InfraError> {
        let (outcome, snapshot) = {
            let mut inner = self.lock_inner()?;
            let Some(alarm) = inner.alarms.get_mut(&id) else {
                return Ok(ResolveOutcome::Missing);
            };
            let outcome = if alarm.state == AlarmState::Resolved {
                ResolveOutcome::AlreadyResolved
            } else {
                alarm.resolve();
                ResolveOutcome::Resolved(alarm.clone())
            };
            (outcome, inner.snapshot())
        };
        self.persist_snapshot(&snapshot)?;
        Ok(outcome)
    }

    pub fn persist(&self) -> Result<(), InfraError> {
        let snapshot = self.lock_inner()?.snapshot();
        self.persist_snapshot(&snapshot)
    }

    fn persist_snapshot(&self, snapshot: &[Alarm]) -> Result<(), InfraError> {
        let payload = serde_json::to_vec(snapshot)
            .map_err(|error| InfraError::Persistence(format!("encode alarm snapshot: {error}")))?;
        self.repository
            .save(SNAPSHOT_KEY, &payload)
            .map_err(|error| match error {
                InfraError::Persistence(message) => InfraError::Persistence(message),
                other => InfraError::Persistence(format!("write alarm snapshot: {other}")),
            })
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, StoreInner>, InfraError> {
        self.inner
            .lock()
            .map_err(|error| InfraError::Persistence(format!("alarm store lock poisoned: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::snapshot_repository::InMemorySnapshotRepository;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    struct FailingSnapshotRepository;

    impl SnapshotRepository for FailingSnapshotRepository {
        fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, InfraError> {
            Ok(None)
        }

        fn save(&self, _key: &str, _payload: &[u8]) -> Result<(), InfraError> {
            Err(InfraError::Persistence("disk full".to_string()))
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_alarm(id: i64, title: &str) -> Alarm {
        Alarm::new(id, title, fixed_time("2026-02-16T09:00:00Z"))
    }

    fn store_with_memory() -> (AlarmStore<InMemorySnapshotRepository>, Arc<InMemorySnapshotRepository>) {
        let repository = Arc::new(InMemorySnapshotRepository::default());
        (AlarmStore::new(Arc::clone(&repository)), repository)
    }

    #[test]
    fn list_preserves_insertion_order() {
        let (store, _) = store_with_memory();
        store.upsert(sample_alarm(3, "third")).expect("upsert");
        store.upsert(sample_alarm(1, "first")).expect("upsert");
        store.upsert(sample_alarm(2, "second")).expect("upsert");

        let ids = store
            .list()
            .expect("list")
            .into_iter()
            .map(|alarm| alarm.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn upsert_existing_id_keeps_position() {
        let (store, _) = store_with_memory();
        store.upsert(sample_alarm(1, "original")).expect("upsert");
        store.upsert(sample_alarm(2, "other")).expect("upsert");
        store.upsert(sample_alarm(1, "renamed")).expect("upsert");

        let listed = store.list().expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, 1);
        assert_eq!(listed[0].title, "renamed");
        assert_eq!(store.get(1).expect("get").expect("alarm 1").title, "renamed");
        assert!(store.get(404).expect("get").is_none());
    }

    #[test]
    fn explicit_persist_rewrites_the_durable_snapshot() {
        let (store, repository) = store_with_memory();
        store.upsert(sample_alarm(1, "first")).expect("upsert");
        store.upsert(sample_alarm(2, "second")).expect("upsert");

        repository
            .save(SNAPSHOT_KEY, b"stale bytes")
            .expect("clobber snapshot");
        store.persist().expect("persist");

        let fresh = AlarmStore::new(repository);
        let summary = fresh.load().expect("load");
        assert_eq!(summary.restored, 2);
        assert!(!summary.recovered_from_corruption);
    }

    #[test]
    fn remove_reports_whether_record_existed() {
        let (store, _) = store_with_memory();
        store.upsert(sample_alarm(1, "only")).expect("upsert");

        assert!(store.remove(1).expect("remove"));
        assert!(!store.remove(1).expect("remove again"));
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn mark_resolved_transitions_once() {
        let (store, _) = store_with_memory();
        store.upsert(sample_alarm(1, "wake up")).expect("upsert");

        match store.mark_resolved(1).expect("resolve") {
            ResolveOutcome::Resolved(alarm) => assert_eq!(alarm.state, AlarmState::Resolved),
            other => panic!("expected Resolved, got {other:?}"),
        }
        assert_eq!(
            store.mark_resolved(1).expect("resolve again"),
            ResolveOutcome::AlreadyResolved
        );
        assert_eq!(
            store.mark_resolved(404).expect("resolve missing"),
            ResolveOutcome::Missing
        );
    }

    #[test]
    fn load_on_empty_repository_yields_empty_store() {
        let (store, _) = store_with_memory();
        let summary = store.load().expect("load");
        assert_eq!(summary, LoadSummary::default());
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn load_recovers_from_corrupt_payload() {
        let (store, repository) = store_with_memory();
        repository
            .save(SNAPSHOT_KEY, b"{not valid json")
            .expect("seed corrupt payload");

        let summary = store.load().expect("load");
        assert!(summary.recovered_from_corruption);
        assert_eq!(summary.restored, 0);
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn load_discards_stale_in_memory_state() {
        let (store, _) = store_with_memory();
        store.upsert(sample_alarm(1, "persisted")).expect("upsert");
        store.upsert(sample_alarm(2, "persisted too")).expect("upsert");
        store.remove(2).expect("remove");

        let summary = store.load().expect("load");
        assert_eq!(summary.restored, 1);
        assert_eq!(store.list().expect("list")[0].title, "persisted");
    }

    #[test]
    fn persist_failure_surfaces_but_keeps_memory() {
        let store = AlarmStore::new(Arc::new(FailingSnapshotRepository));
        let result = store.upsert(sample_alarm(1, "kept in memory"));

        assert!(matches!(result, Err(InfraError::Persistence(_))));
        let listed = store.list().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, 1);
    }

    proptest! {
        #[test]
        fn persist_then_load_on_fresh_store_preserves_alarms(
            titles in proptest::collection::vec("[a-zA-Z0-9 ]{1,24}", 1..8)
        ) {
            let repository = Arc::new(InMemorySnapshotRepository::default());
            let store = AlarmStore::new(Arc::clone(&repository));
            for (index, title) in titles.iter().enumerate() {
                let mut alarm = sample_alarm(1_000 + index as i64, title);
                if index % 2 == 1 {
                    alarm.resolve();
                }
                store.upsert(alarm).expect("upsert");
            }
            let original = store.list().expect("list original");

            let fresh = AlarmStore::new(repository);
            fresh.load().expect("load fresh");

            prop_assert_eq!(fresh.list().expect("list fresh"), original);
        }
    }
}
