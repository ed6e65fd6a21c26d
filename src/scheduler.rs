//! Daily mining driver.
//!
//! One periodic tick drives strictly sequential per-subscription cycles;
//! collection inside a cycle is the only parallel region. A failing
//! subscription is logged and skipped so it never starves the others.

use crate::collector::CollectorFanout;
use crate::discovery::ChannelDiscoveryAgent;
use crate::learner::PreferenceLearner;
use crate::notifier::CandidateNotifier;
use crate::scorer::CandidateScorer;
use crate::store::SubscriptionStore;
use crate::types::{DiscoveryConstraints, MinerError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cadence of the mining driver.
    pub tick_interval: Duration,
    /// Pause between subscriptions, to respect downstream rate limits.
    pub inter_subscription_delay: Duration,
    /// Result-set bound handed to the scorer.
    pub max_candidates: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(24 * 60 * 60),
            inter_subscription_delay: Duration::from_secs(30),
            max_candidates: 10,
        }
    }
}

/// Outcome of one full daily cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub succeeded: usize,
    pub failed: usize,
    pub candidates_delivered: usize,
}

pub struct MiningScheduler {
    store: Arc<dyn SubscriptionStore>,
    discovery: Arc<ChannelDiscoveryAgent>,
    fanout: Arc<CollectorFanout>,
    scorer: Arc<CandidateScorer>,
    learner: Arc<PreferenceLearner>,
    notifier: Arc<dyn CandidateNotifier>,
    config: SchedulerConfig,
    is_running: Arc<RwLock<bool>>,
}

impl MiningScheduler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        discovery: Arc<ChannelDiscoveryAgent>,
        fanout: Arc<CollectorFanout>,
        scorer: Arc<CandidateScorer>,
        learner: Arc<PreferenceLearner>,
        notifier: Arc<dyn CandidateNotifier>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            discovery,
            fanout,
            scorer,
            learner,
            notifier,
            config,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Run one pass over every subscription, sequentially, with a fixed
    /// delay between them. Per-subscription failures are absorbed here.
    pub async fn run_daily_cycle(&self) -> Result<CycleStats> {
        let ids = self.store.list_subscription_ids().await?;
        info!(subscriptions = ids.len(), "Running daily mining cycle");

        let mut stats = CycleStats::default();
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.inter_subscription_delay).await;
            }
            match self.run_subscription_cycle(*id).await {
                Ok(delivered) => {
                    stats.succeeded += 1;
                    stats.candidates_delivered += delivered;
                }
                Err(e) => {
                    error!("Cycle failed for subscription {}: {}; skipping", id, e);
                    stats.failed += 1;
                }
            }
        }

        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            delivered = stats.candidates_delivered,
            "Daily mining cycle complete"
        );
        Ok(stats)
    }

    /// One subscription's mining cycle: refresh channels when due, learn
    /// from new ratings, collect, score, persist and deliver. Completed
    /// refreshes and learned profiles are persisted as soon as they exist,
    /// so a later failure in the cycle cannot throw them away; no lock
    /// spans an external call.
    pub async fn run_subscription_cycle(&self, id: Uuid) -> Result<usize> {
        let mut subscription = self
            .store
            .get_subscription(id)
            .await?
            .ok_or(MinerError::SubscriptionNotFound { id })?;
        let now = Utc::now();

        if subscription.discovery_due(now) {
            info!(subscription = %id, "Channel set is stale, rediscovering");
            let channels = self
                .discovery
                .propose_channels(&subscription.query, &DiscoveryConstraints::default())
                .await?;
            // Wholesale replacement: stale channels are not trustworthy and
            // are never merged back in. A refresh costs a full search-agent
            // run, so it is persisted before anything else can fail.
            subscription.channels = channels;
            subscription.last_discovery_at = Some(now);
            self.store.put_subscription(subscription.clone()).await?;
        } else {
            debug!(
                subscription = %id,
                due = ?subscription.next_discovery_due(),
                "Channel refresh not due yet"
            );
        }

        let ratings = self.store.take_unprocessed_ratings(id).await?;
        if !ratings.is_empty() {
            match self.learner.analyze(&ratings).await {
                Ok(profile) => {
                    subscription.learned_profile = Some(profile);
                    self.store.put_subscription(subscription.clone()).await?;
                }
                Err(e) => {
                    warn!(
                        subscription = %id,
                        "Preference analysis failed: {}; keeping previous profile",
                        e
                    );
                    // The drained ratings still carry unprocessed signal.
                    // Requeue them so the next cycle retries the analysis.
                    for rating in ratings {
                        self.store.append_rating(id, rating).await?;
                    }
                }
            }
        }

        let collected = self.fanout.collect(&subscription.channels).await?;
        let scored = self
            .scorer
            .score_and_select(
                &collected,
                &subscription.query,
                self.config.max_candidates,
                subscription.learned_profile.as_ref(),
            )
            .await?;

        self.store.save_results(id, &scored).await?;
        subscription.last_daily_run_at = Some(Utc::now());
        self.store.put_subscription(subscription.clone()).await?;

        self.notifier.deliver(&subscription, &scored).await?;
        Ok(scored.len())
    }

    /// Spawn the periodic driver. The first cycle runs immediately.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(MinerError::General(
                "scheduler is already running".to_string(),
            ));
        }
        *is_running = true;
        drop(is_running);

        info!(
            tick_secs = self.config.tick_interval.as_secs(),
            "Starting mining scheduler"
        );

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = interval(scheduler.config.tick_interval);
            while *scheduler.is_running.read().await {
                tick.tick().await;
                if let Err(e) = scheduler.run_daily_cycle().await {
                    error!("Daily mining cycle failed: {}", e);
                }
            }
        });

        Ok(())
    }

    pub async fn stop(&self) {
        let mut is_running = self.is_running.write().await;
        *is_running = false;
        info!("Stopping mining scheduler");
    }
}
