//! Two-phase channel discovery.
//!
//! Phase 1 turns a vague query into a refined one through a short
//! conversation; phase 2 asks the search backend for concrete channels and
//! applies the verification gate.

use crate::llm::ReasoningService;
use crate::parser::clamp_chars;
use crate::search_backend::ChannelSearchBackend;
use crate::types::{
    Channel, DiscoveryConstraints, DiscoverySession, ExplorationResult, MinerError, Result,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Exploration replies travel over a narrow-bandwidth channel, so they are
/// clamped to this many characters.
pub const EXPLORATION_CHAR_BUDGET: usize = 500;

/// Conversational rounds before a refined query is synthesized.
pub const REFINEMENT_ROUND_CAP: u32 = 2;

pub struct ChannelDiscoveryAgent {
    reasoning: Arc<dyn ReasoningService>,
    backend: Arc<dyn ChannelSearchBackend>,
}

impl ChannelDiscoveryAgent {
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        backend: Arc<dyn ChannelSearchBackend>,
    ) -> Self {
        Self { reasoning, backend }
    }

    /// Run one conversational round. Early rounds explore the persona and
    /// ask clarifying questions; once the round cap is reached, a refined
    /// query is synthesized instead and the caller must obtain explicit user
    /// approval before proceeding to `propose_channels`.
    pub async fn explore(&self, session: &mut DiscoverySession) -> Result<ExplorationResult> {
        if session.round_count < REFINEMENT_ROUND_CAP {
            let prompt = build_exploration_prompt(session);
            let reply = self.reasoning.complete(&prompt).await?;
            let message = clamp_chars(reply.trim(), EXPLORATION_CHAR_BUDGET);

            session.push_assistant(message.clone());
            session.round_count += 1;
            debug!(round = session.round_count, "Exploration round complete");
            Ok(ExplorationResult::Exploration { message })
        } else {
            let prompt = build_refinement_prompt(session);
            let refined = self.reasoning.complete(&prompt).await?.trim().to_string();
            if refined.is_empty() {
                return Err(MinerError::Validation(
                    "refinement produced an empty query".to_string(),
                ));
            }

            session.refined_query = Some(refined.clone());
            info!("Synthesized refined query, awaiting user approval");
            Ok(ExplorationResult::RefinedQuery {
                refined_query: refined,
            })
        }
    }

    /// Ask the search backend for channels anchored by verified examples.
    /// The whole batch is rejected if any channel lacks one: a channel
    /// nobody can verify cannot be trusted to be mineable.
    pub async fn propose_channels(
        &self,
        refined_query: &str,
        constraints: &DiscoveryConstraints,
    ) -> Result<Vec<Channel>> {
        let channels = self.backend.propose(refined_query, constraints).await?;
        validate_channel_batch(&channels)?;
        info!(channels = channels.len(), "Accepted verified channel batch");
        Ok(channels)
    }
}

/// All-or-nothing verification gate over a proposed channel batch.
pub fn validate_channel_batch(channels: &[Channel]) -> Result<()> {
    if channels.is_empty() {
        return Err(MinerError::Validation(
            "channel discovery returned no channels".to_string(),
        ));
    }

    for channel in channels {
        if channel.search_query.is_none() && channel.platform_url.is_none() {
            return Err(MinerError::Validation(format!(
                "channel '{}' has neither a search query nor a platform URL",
                channel.name
            )));
        }
        if !channel.has_verified_example() {
            return Err(MinerError::Validation(format!(
                "channel '{}' has no verified example profile; rejecting the whole batch",
                channel.name
            )));
        }
    }

    Ok(())
}

fn render_history(session: &DiscoverySession) -> String {
    session
        .history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_exploration_prompt(session: &DiscoverySession) -> String {
    let mut prompt = format!(
        "You are helping a recruiter sharpen a candidate search.\n\
         Original query: {}\n",
        session.query
    );
    if !session.history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        prompt.push_str(&render_history(session));
        prompt.push('\n');
    }
    prompt.push_str(
        "Reply with: (1) your current understanding of the target persona, \
         (2) general categories of places such people can be found (no \
         concrete channel names), (3) at most two clarifying questions. \
         Keep the whole reply under 500 characters.",
    );
    prompt
}

fn build_refinement_prompt(session: &DiscoverySession) -> String {
    let mut prompt = format!(
        "You are helping a recruiter sharpen a candidate search.\n\
         Original query: {}\n",
        session.query
    );
    if !session.history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        prompt.push_str(&render_history(session));
        prompt.push('\n');
    }
    prompt.push_str(
        "Write a single refined search query: one detailed specification \
         covering role, skills, location, work arrangement and anything that \
         differentiates the ideal candidate. Reply with the query text only.",
    );
    prompt
}
