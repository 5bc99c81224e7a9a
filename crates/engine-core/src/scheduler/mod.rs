mod fsrs;

pub use fsrs::{FsrsParameters, Rating};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::store::Store;
use crate::types::{FsrsLearningState, FsrsState, ReviewItem, ReviewStatus};

/// Spaced-repetition state machine over `ReviewItem`s. Owns no storage
/// of its own beyond `Store`; every operation is a single read-modify-write
/// against one row, matching the "single-row transaction, no partial update"
/// failure semantics.
pub struct Scheduler {
    store: Arc<Store>,
    params: FsrsParameters,
    desired_retention: f64,
}

impl Scheduler {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            params: FsrsParameters::default(),
            desired_retention: 0.9,
        }
    }

    pub fn with_parameters(mut self, params: FsrsParameters) -> Self {
        self.params = params;
        self
    }

    /// Creates a `new`-state item with `next_review = now` if one does not
    /// already exist for this document; otherwise a no-op.
    pub fn add(&self, document_id: Uuid, now: DateTime<Utc>) -> EngineResult<ReviewItem> {
        if let Some(existing) = self.store.get_review(document_id) {
            return Ok(existing);
        }

        let item = ReviewItem {
            id: Uuid::new_v4(),
            document_id,
            fsrs_state: FsrsState {
                stability: 0.0,
                difficulty: 0.0,
                elapsed_days: 0.0,
                scheduled_days: 0.0,
                reps: 0,
                lapses: 0,
                state: FsrsLearningState::New,
                last_review: None,
            },
            next_review: Some(now),
            last_reviewed: None,
            review_count: 0,
            status: ReviewStatus::Active,
        };
        self.store.upsert_review(item.clone())?;
        Ok(item)
    }

    /// `status=active ∧ next_review ≤ now`, ordered by `next_review ASC`.
    pub fn due(&self, now: DateTime<Utc>, limit: usize) -> Vec<ReviewItem> {
        self.store.due_reviews(now, limit)
    }

    /// Transitions state per the rating, writes the new state, and returns
    /// the new `next_review`. Idempotent over `(document_id, last_reviewed)`:
    /// re-submitting with the same `now` that is already recorded as
    /// `last_reviewed` returns the existing outcome unchanged.
    pub fn submit(&self, document_id: Uuid, rating: Rating, now: DateTime<Utc>) -> EngineResult<DateTime<Utc>> {
        let mut item = self
            .store
            .get_review(document_id)
            .ok_or_else(|| EngineError::NotFound(format!("no review item for document {document_id}")))?;

        if item.last_reviewed == Some(now) {
            return item
                .next_review
                .ok_or_else(|| EngineError::ValidationError("review item has no scheduled next_review".to_string()));
        }
        if item.status != ReviewStatus::Active {
            return Err(EngineError::ValidationError(format!("review item for {document_id} is not active")));
        }

        let elapsed_days = item
            .last_reviewed
            .map(|last| (now - last).num_seconds() as f64 / 86_400.0)
            .unwrap_or(0.0)
            .max(0.0);

        let new_state = fsrs::apply_rating(item.fsrs_state, rating, elapsed_days, self.desired_retention, &self.params);
        let next_review = now + chrono_days(new_state.scheduled_days);

        item.fsrs_state = new_state;
        item.next_review = Some(next_review);
        item.last_reviewed = Some(now);
        item.review_count += 1;
        self.store.upsert_review(item)?;

        Ok(next_review)
    }

    pub fn suspend(&self, document_id: Uuid) -> EngineResult<()> {
        self.set_status(document_id, ReviewStatus::Suspended)
    }

    pub fn archive(&self, document_id: Uuid) -> EngineResult<()> {
        self.set_status(document_id, ReviewStatus::Archived)
    }

    /// Resumes a suspended/archived item: status becomes active and
    /// `next_review` is restored to `now` if it had been cleared.
    pub fn resume(&self, document_id: Uuid, now: DateTime<Utc>) -> EngineResult<()> {
        let mut item = self
            .store
            .get_review(document_id)
            .ok_or_else(|| EngineError::NotFound(format!("no review item for document {document_id}")))?;
        item.status = ReviewStatus::Active;
        if item.next_review.is_none() {
            item.next_review = Some(now);
        }
        self.store.upsert_review(item)
    }

    fn set_status(&self, document_id: Uuid, status: ReviewStatus) -> EngineResult<()> {
        let mut item = self
            .store
            .get_review(document_id)
            .ok_or_else(|| EngineError::NotFound(format!("no review item for document {document_id}")))?;
        item.status = status;
        // next_review is set iff status = active.
        if status != ReviewStatus::Active {
            item.next_review = None;
        }
        self.store.upsert_review(item)
    }
}

fn chrono_days(days: f64) -> Duration_ {
    Duration_::seconds((days.max(0.0) * 86_400.0).round() as i64)
}

type Duration_ = chrono::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (Arc<Store>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::StoreConfig {
            database_url: String::new(),
            db_pool_min: 2,
            db_pool_max: 10,
            db_pool_timeout_secs: 30,
            db_command_timeout_secs: 30,
            db_retry_attempts: 3,
        };
        let store = Store::open(dir.path(), 8, &config).await.unwrap();
        (Arc::new(store), dir)
    }

    #[tokio::test]
    async fn lapse_shortens_the_interval_relative_to_the_prior_good_review() {
        let (store, _dir) = temp_store().await;
        let scheduler = Scheduler::new(store);
        let document_id = Uuid::new_v4();

        let t0 = Utc::now();
        scheduler.add(document_id, t0).unwrap();

        let next_review_1 = scheduler.submit(document_id, Rating::Good, t0).unwrap();
        let interval_1 = next_review_1 - t0;

        let t1 = next_review_1;
        let next_review_2 = scheduler.submit(document_id, Rating::Again, t1).unwrap();
        let interval_2 = next_review_2 - t1;

        assert!(interval_2 < interval_1, "lapse should shorten the interval");

        let item = store_review(&scheduler, document_id);
        assert_eq!(item.fsrs_state.lapses, 1);
        assert_eq!(item.fsrs_state.state, FsrsLearningState::Relearning);
    }

    #[tokio::test]
    async fn duplicate_submission_at_the_same_timestamp_is_a_no_op() {
        let (store, _dir) = temp_store().await;
        let scheduler = Scheduler::new(store);
        let document_id = Uuid::new_v4();
        let t0 = Utc::now();
        scheduler.add(document_id, t0).unwrap();

        let first = scheduler.submit(document_id, Rating::Good, t0).unwrap();
        let second = scheduler.submit(document_id, Rating::Good, t0).unwrap();
        assert_eq!(first, second);

        let item = store_review(&scheduler, document_id);
        assert_eq!(item.review_count, 1);
    }

    #[tokio::test]
    async fn fsrs_state_roundtrips_through_serde_without_changing_future_due_decisions() {
        let (store, _dir) = temp_store().await;
        let scheduler = Scheduler::new(store);
        let document_id = Uuid::new_v4();
        let t0 = Utc::now();
        scheduler.add(document_id, t0).unwrap();
        scheduler.submit(document_id, Rating::Good, t0).unwrap();

        let item = store_review(&scheduler, document_id);
        let serialized = serde_json::to_string(&item.fsrs_state).unwrap();
        let restored: FsrsState = serde_json::from_str(&serialized).unwrap();

        assert_eq!(item.fsrs_state.stability, restored.stability);
        assert_eq!(item.fsrs_state.difficulty, restored.difficulty);
        assert_eq!(item.fsrs_state.state, restored.state);
    }

    #[tokio::test]
    async fn suspend_clears_next_review_and_resume_restores_it() {
        let (store, _dir) = temp_store().await;
        let scheduler = Scheduler::new(store);
        let document_id = Uuid::new_v4();
        let t0 = Utc::now();
        scheduler.add(document_id, t0).unwrap();

        scheduler.suspend(document_id).unwrap();
        let suspended = store_review(&scheduler, document_id);
        assert_eq!(suspended.status, ReviewStatus::Suspended);
        assert!(suspended.next_review.is_none());

        scheduler.resume(document_id, t0).unwrap();
        let resumed = store_review(&scheduler, document_id);
        assert_eq!(resumed.status, ReviewStatus::Active);
        assert!(resumed.next_review.is_some());
    }

    fn store_review(scheduler: &Scheduler, document_id: Uuid) -> ReviewItem {
        scheduler.store.get_review(document_id).unwrap()
    }
}
