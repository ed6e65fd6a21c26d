mod common;

use candidate_miner::types::*;
use candidate_miner::{ChannelDiscoveryAgent, MockReasoningService};
use common::{verified_channel, ScriptedSearchBackend};
use std::sync::Arc;

fn agent(
    reasoning: MockReasoningService,
    backend: ScriptedSearchBackend,
) -> ChannelDiscoveryAgent {
    ChannelDiscoveryAgent::new(Arc::new(reasoning), Arc::new(backend))
}

#[tokio::test]
async fn verified_batch_is_accepted_whole() {
    let batch = vec![
        verified_channel(ChannelType::SearchQuery, "rust-jobs"),
        verified_channel(ChannelType::Community, "backend-forum"),
        verified_channel(ChannelType::Directory, "dev-directory"),
    ];
    let discovery = agent(
        MockReasoningService::new("discovery"),
        ScriptedSearchBackend::new(batch),
    );

    let channels = discovery
        .propose_channels("senior backend engineers", &DiscoveryConstraints::default())
        .await
        .unwrap();
    assert_eq!(channels.len(), 3);
    assert!(channels.iter().all(|c| c.has_verified_example()));
}

#[tokio::test]
async fn one_unverified_channel_rejects_the_whole_batch() {
    let mut batch = vec![
        verified_channel(ChannelType::SearchQuery, "rust-jobs"),
        verified_channel(ChannelType::Community, "backend-forum"),
        verified_channel(ChannelType::Directory, "dev-directory"),
    ];
    batch[1].example = None;

    let discovery = agent(
        MockReasoningService::new("discovery"),
        ScriptedSearchBackend::new(batch),
    );

    let err = discovery
        .propose_channels("senior backend engineers", &DiscoveryConstraints::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MinerError::Validation(_)));
}

#[tokio::test]
async fn exploration_rounds_stay_within_the_character_budget() {
    let oversized = "x".repeat(2000);
    let reasoning = MockReasoningService::new("discovery")
        .with_response(oversized)
        .with_response("Understood: backend engineers. Where should they be located?");
    let discovery = agent(reasoning, ScriptedSearchBackend::new(Vec::new()));

    let mut session = DiscoverySession::new("backend people");

    let first = discovery.explore(&mut session).await.unwrap();
    match first {
        ExplorationResult::Exploration { message } => {
            assert_eq!(message.chars().count(), 500);
        }
        other => panic!("expected exploration round, got {:?}", other),
    }
    assert_eq!(session.round_count, 1);

    session.push_user("They should be in Europe, remote friendly.");
    let second = discovery.explore(&mut session).await.unwrap();
    assert!(matches!(second, ExplorationResult::Exploration { .. }));
    assert_eq!(session.round_count, 2);
    assert!(session.refined_query.is_none());
}

#[tokio::test]
async fn third_round_synthesizes_a_refined_query() {
    let refined = "Senior backend engineer, Rust or Go, EU-remote, \
                   distributed-systems background, open-source activity a plus";
    let reasoning = MockReasoningService::new("discovery")
        .with_response("round one")
        .with_response("round two")
        .with_response(refined);
    let discovery = agent(reasoning, ScriptedSearchBackend::new(Vec::new()));

    let mut session = DiscoverySession::new("backend people");
    discovery.explore(&mut session).await.unwrap();
    discovery.explore(&mut session).await.unwrap();

    let third = discovery.explore(&mut session).await.unwrap();
    match third {
        ExplorationResult::RefinedQuery { refined_query } => {
            assert_eq!(refined_query, refined);
        }
        other => panic!("expected refined query, got {:?}", other),
    }
    assert_eq!(session.refined_query.as_deref(), Some(refined));
}
