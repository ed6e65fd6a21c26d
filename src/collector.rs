//! Concurrent, fault-isolated collection of raw candidates.
//!
//! One collector per source type; collectors are external collaborators and
//! are expected to fail with an error. A failing source degrades to an empty
//! entry for that source only and never aborts the fan-out.

use crate::types::{Candidate, Channel, ChannelType, CollectedCandidates, MinerError, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-source cap applied to each collector's result.
pub const DEFAULT_PER_SOURCE_LIMIT: usize = 20;

/// One collector per source type, with a uniform signature.
#[async_trait]
pub trait CandidateCollector: Send + Sync {
    /// The source type this collector mines.
    fn source_type(&self) -> ChannelType;

    /// Human-readable name, for logging.
    fn collector_name(&self) -> String;

    /// Collect up to `limit` candidates from the given channels (all of this
    /// collector's source type).
    async fn collect(&self, channels: &[Channel], limit: usize) -> Result<Vec<Candidate>>;
}

/// Fans one collector out per distinct source type and joins all branches.
pub struct CollectorFanout {
    collectors: HashMap<ChannelType, Arc<dyn CandidateCollector>>,
    per_source_limit: usize,
}

impl CollectorFanout {
    pub fn new() -> Self {
        Self {
            collectors: HashMap::new(),
            per_source_limit: DEFAULT_PER_SOURCE_LIMIT,
        }
    }

    pub fn with_per_source_limit(mut self, limit: usize) -> Self {
        self.per_source_limit = limit;
        self
    }

    /// Register a collector for its source type, replacing any previous one.
    pub fn register(&mut self, collector: Arc<dyn CandidateCollector>) {
        info!(
            source = %collector.source_type(),
            "Registering collector: {}",
            collector.collector_name()
        );
        self.collectors.insert(collector.source_type(), collector);
    }

    /// Collect from every source type present in `channels`, concurrently.
    /// Branches are joined in parallel (never first-completed); each failure
    /// is logged and degraded to an empty entry for that source. An empty
    /// union across all sources is a terminal condition for the cycle.
    pub async fn collect(&self, channels: &[Channel]) -> Result<CollectedCandidates> {
        let mut grouped: HashMap<ChannelType, Vec<Channel>> = HashMap::new();
        for channel in channels {
            grouped
                .entry(channel.channel_type)
                .or_default()
                .push(channel.clone());
        }

        let limit = self.per_source_limit;
        let branches = grouped.into_iter().map(|(source, source_channels)| {
            let collector = self.collectors.get(&source).cloned();
            async move {
                let candidates = match collector {
                    None => {
                        warn!(source = %source, "No collector registered, source yields nothing");
                        Vec::new()
                    }
                    Some(collector) => match collector.collect(&source_channels, limit).await {
                        Ok(mut found) => {
                            found.truncate(limit);
                            info!(
                                source = %source,
                                candidates = found.len(),
                                "Collector finished"
                            );
                            found
                        }
                        Err(e) => {
                            warn!(
                                source = %source,
                                "Collector failed: {}; continuing with empty result",
                                e
                            );
                            Vec::new()
                        }
                    },
                };
                (source, candidates)
            }
        });

        let by_source: HashMap<ChannelType, Vec<Candidate>> =
            join_all(branches).await.into_iter().collect();
        let collected = CollectedCandidates { by_source };

        if collected.is_empty() {
            return Err(MinerError::Validation(
                "no candidates found across any source".to_string(),
            ));
        }

        info!(total = collected.total(), "Fan-out collection complete");
        Ok(collected)
    }
}

impl Default for CollectorFanout {
    fn default() -> Self {
        Self::new()
    }
}
