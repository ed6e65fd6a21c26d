//! Facade wiring the pipeline together behind the three operations exposed
//! to collaborators: setup search, daily cycle, rating submission.

use crate::collector::CollectorFanout;
use crate::discovery::ChannelDiscoveryAgent;
use crate::learner::PreferenceLearner;
use crate::llm::ReasoningService;
use crate::notifier::CandidateNotifier;
use crate::scheduler::{CycleStats, MiningScheduler, SchedulerConfig};
use crate::scorer::CandidateScorer;
use crate::search_backend::ChannelSearchBackend;
use crate::store::SubscriptionStore;
use crate::types::{
    CandidateRating, DiscoveryConstraints, DiscoverySession, ExplorationResult, MinerError,
    Result, ScoredCandidate, Subscription,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct MinerService {
    discovery: Arc<ChannelDiscoveryAgent>,
    fanout: Arc<CollectorFanout>,
    scorer: Arc<CandidateScorer>,
    store: Arc<dyn SubscriptionStore>,
    notifier: Arc<dyn CandidateNotifier>,
    scheduler: Arc<MiningScheduler>,
    max_candidates: usize,
}

impl MinerService {
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        backend: Arc<dyn ChannelSearchBackend>,
        fanout: CollectorFanout,
        store: Arc<dyn SubscriptionStore>,
        notifier: Arc<dyn CandidateNotifier>,
        config: SchedulerConfig,
    ) -> Self {
        let discovery = Arc::new(ChannelDiscoveryAgent::new(reasoning.clone(), backend));
        let fanout = Arc::new(fanout);
        let scorer = Arc::new(CandidateScorer::new(reasoning.clone()));
        let learner = Arc::new(PreferenceLearner::new(reasoning));
        let max_candidates = config.max_candidates;

        let scheduler = Arc::new(MiningScheduler::new(
            store.clone(),
            discovery.clone(),
            fanout.clone(),
            scorer.clone(),
            learner,
            notifier.clone(),
            config,
        ));

        Self {
            discovery,
            fanout,
            scorer,
            store,
            notifier,
            scheduler,
            max_candidates,
        }
    }

    /// Start a refinement conversation for a raw query.
    pub fn begin_refinement(&self, query: &str) -> DiscoverySession {
        DiscoverySession::new(query)
    }

    /// Advance the refinement conversation by one round, recording the
    /// user's answer first when there is one.
    pub async fn refine(
        &self,
        session: &mut DiscoverySession,
        user_reply: Option<&str>,
    ) -> Result<ExplorationResult> {
        if let Some(reply) = user_reply {
            session.push_user(reply);
        }
        self.discovery.explore(session).await
    }

    /// First search for a subscription: discover and verify channels, mine
    /// them, deliver the initial result set.
    pub async fn run_setup_search(
        &self,
        subscription_id: Uuid,
        user_id: &str,
        query: &str,
    ) -> Result<Vec<ScoredCandidate>> {
        info!(subscription = %subscription_id, "Running setup search");

        let mut subscription = Subscription::new(subscription_id, user_id, query);
        let channels = self
            .discovery
            .propose_channels(query, &DiscoveryConstraints::default())
            .await?;
        subscription.channels = channels;
        subscription.last_discovery_at = Some(Utc::now());

        let collected = self.fanout.collect(&subscription.channels).await?;
        let scored = self
            .scorer
            .score_and_select(&collected, query, self.max_candidates, None)
            .await?;

        subscription.last_daily_run_at = Some(Utc::now());
        self.store.put_subscription(subscription.clone()).await?;
        self.store.save_results(subscription_id, &scored).await?;

        self.notifier.deliver(&subscription, &scored).await?;
        Ok(scored)
    }

    /// Scheduler entry point; also callable directly.
    pub async fn run_daily_cycle(&self) -> Result<CycleStats> {
        self.scheduler.run_daily_cycle().await
    }

    /// Record a user's rating (1-5) of a candidate from the latest delivered
    /// result set. The candidate id is its identity key.
    pub async fn submit_rating(
        &self,
        subscription_id: Uuid,
        candidate_id: &str,
        rating: u8,
    ) -> Result<()> {
        if !(1..=5).contains(&rating) {
            return Err(MinerError::Validation(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }

        let wanted = candidate_id.trim().to_lowercase();
        let results = self.store.latest_results(subscription_id).await?;
        let candidate = results
            .into_iter()
            .find(|c| c.identity_key().as_deref() == Some(wanted.as_str()))
            .ok_or_else(|| {
                MinerError::Validation(format!(
                    "candidate '{}' not found in the latest results",
                    candidate_id
                ))
            })?;

        self.store
            .append_rating(
                subscription_id,
                CandidateRating {
                    candidate_id: wanted,
                    candidate,
                    rating,
                    rated_at: Utc::now(),
                },
            )
            .await
    }

    /// Start the periodic mining driver.
    pub async fn start_scheduler(&self) -> Result<()> {
        self.scheduler.start().await
    }

    pub async fn stop_scheduler(&self) {
        self.scheduler.stop().await
    }

    pub fn scheduler(&self) -> Arc<MiningScheduler> {
        self.scheduler.clone()
    }
}
