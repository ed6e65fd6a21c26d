//! Persistence seam for subscriptions, ratings and delivered results.
//!
//! Durable storage is an external collaborator; this crate ships the trait
//! plus an in-memory implementation used by tests and the demo binary.

use crate::types::{CandidateRating, Result, ScoredCandidate, Subscription};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>>;

    /// Insert or replace a subscription wholesale.
    async fn put_subscription(&self, subscription: Subscription) -> Result<()>;

    /// Ids of all active subscriptions, for the daily cycle.
    async fn list_subscription_ids(&self) -> Result<Vec<Uuid>>;

    /// Queue a rating for the next preference-analysis run.
    async fn append_rating(&self, subscription_id: Uuid, rating: CandidateRating) -> Result<()>;

    /// Drain the ratings queued since the last analysis run.
    async fn take_unprocessed_ratings(&self, subscription_id: Uuid)
        -> Result<Vec<CandidateRating>>;

    /// Replace the latest delivered result set.
    async fn save_results(&self, subscription_id: Uuid, results: &[ScoredCandidate])
        -> Result<()>;

    async fn latest_results(&self, subscription_id: Uuid) -> Result<Vec<ScoredCandidate>>;
}

/// In-memory store keyed by subscription id.
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<HashMap<Uuid, Subscription>>>,
    pending_ratings: Arc<RwLock<HashMap<Uuid, Vec<CandidateRating>>>>,
    results: Arc<RwLock<HashMap<Uuid, Vec<ScoredCandidate>>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            pending_ratings: Arc::new(RwLock::new(HashMap::new())),
            results: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.get(&id).cloned())
    }

    async fn put_subscription(&self, mut subscription: Subscription) -> Result<()> {
        subscription.updated_at = Utc::now();
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.insert(subscription.id, subscription);
        Ok(())
    }

    async fn list_subscription_ids(&self) -> Result<Vec<Uuid>> {
        let subscriptions = self.subscriptions.read().await;
        let mut ids: Vec<Uuid> = subscriptions.keys().copied().collect();
        // Stable iteration order keeps the daily cycle deterministic.
        ids.sort();
        Ok(ids)
    }

    async fn append_rating(&self, subscription_id: Uuid, rating: CandidateRating) -> Result<()> {
        let mut pending = self.pending_ratings.write().await;
        pending.entry(subscription_id).or_default().push(rating);
        Ok(())
    }

    async fn take_unprocessed_ratings(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<CandidateRating>> {
        let mut pending = self.pending_ratings.write().await;
        Ok(pending.remove(&subscription_id).unwrap_or_default())
    }

    async fn save_results(
        &self,
        subscription_id: Uuid,
        results: &[ScoredCandidate],
    ) -> Result<()> {
        let mut stored = self.results.write().await;
        stored.insert(subscription_id, results.to_vec());
        Ok(())
    }

    async fn latest_results(&self, subscription_id: Uuid) -> Result<Vec<ScoredCandidate>> {
        let stored = self.results.read().await;
        Ok(stored.get(&subscription_id).cloned().unwrap_or_default())
    }
}
