//! Delivery seam. The real messaging layer lives outside this crate.

use crate::types::{Result, ScoredCandidate, Subscription};
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait CandidateNotifier: Send + Sync {
    /// Deliver a scored result set to the subscription's owner.
    async fn deliver(
        &self,
        subscription: &Subscription,
        candidates: &[ScoredCandidate],
    ) -> Result<()>;
}

/// Default notifier that only logs what would be delivered.
pub struct LogNotifier;

#[async_trait]
impl CandidateNotifier for LogNotifier {
    async fn deliver(
        &self,
        subscription: &Subscription,
        candidates: &[ScoredCandidate],
    ) -> Result<()> {
        info!(
            subscription = %subscription.id,
            user = %subscription.user_id,
            count = candidates.len(),
            "Delivering candidates"
        );
        for candidate in candidates {
            info!(
                "  {} [{}] {}",
                candidate.name, candidate.source, candidate.match_reason
            );
        }
        Ok(())
    }
}
