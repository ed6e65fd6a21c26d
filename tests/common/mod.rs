//! Shared test doubles for pipeline integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use candidate_miner::types::{
    Candidate, Channel, ChannelExample, ChannelType, DiscoveryConstraints, MinerError, Result,
};
use candidate_miner::{CandidateCollector, ChannelSearchBackend};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Search backend that returns a canned channel batch and counts calls.
pub struct ScriptedSearchBackend {
    channels: Vec<Channel>,
    calls: AtomicUsize,
}

impl ScriptedSearchBackend {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            channels,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSearchBackend for ScriptedSearchBackend {
    async fn propose(
        &self,
        _query: &str,
        _constraints: &DiscoveryConstraints,
    ) -> Result<Vec<Channel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.channels.clone())
    }
}

/// Collector that returns a fixed candidate list.
pub struct StaticCollector {
    source: ChannelType,
    candidates: Vec<Candidate>,
}

impl StaticCollector {
    pub fn new(source: ChannelType, candidates: Vec<Candidate>) -> Self {
        Self { source, candidates }
    }
}

#[async_trait]
impl CandidateCollector for StaticCollector {
    fn source_type(&self) -> ChannelType {
        self.source
    }

    fn collector_name(&self) -> String {
        format!("static ({})", self.source)
    }

    async fn collect(&self, _channels: &[Channel], limit: usize) -> Result<Vec<Candidate>> {
        let mut found = self.candidates.clone();
        found.truncate(limit);
        Ok(found)
    }
}

/// Collector that always fails, as throwing collaborators do.
pub struct FailingCollector {
    source: ChannelType,
}

impl FailingCollector {
    pub fn new(source: ChannelType) -> Self {
        Self { source }
    }
}

#[async_trait]
impl CandidateCollector for FailingCollector {
    fn source_type(&self) -> ChannelType {
        self.source
    }

    fn collector_name(&self) -> String {
        format!("failing ({})", self.source)
    }

    async fn collect(&self, _channels: &[Channel], _limit: usize) -> Result<Vec<Candidate>> {
        Err(MinerError::General("source exploded".to_string()))
    }
}

pub fn verified_channel(channel_type: ChannelType, name: &str) -> Channel {
    Channel {
        channel_type,
        name: name.to_string(),
        search_query: Some(format!("{} site:example.com", name)),
        platform_url: Some(format!("https://example.com/{}", name)),
        description: format!("Channel {}", name),
        score: 8,
        reason: "active community".to_string(),
        example: Some(ChannelExample {
            name: format!("{} member", name),
            url: format!("https://example.com/{}/member", name),
            description: "verified profile".to_string(),
        }),
    }
}

pub fn candidate(source: ChannelType, name: &str) -> Candidate {
    Candidate {
        source,
        name: name.to_string(),
        profile_url: Some(format!("https://profiles.example.com/{}", name.to_lowercase())),
        handle: None,
        location: Some("Berlin".to_string()),
        summary: Some(format!("{} builds backend systems", name)),
        raw_profile: serde_json::json!({ "name": name }),
        source_signals: HashMap::new(),
    }
}
