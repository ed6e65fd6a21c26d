//! Ranking and bounded selection of collected candidates.
//!
//! The ranking call goes through the reasoning service; its output is parsed
//! with the extraction cascade. Whenever the ranked set is unusable or too
//! thin, a deterministic round-robin selection over the collected pool takes
//! over or supplements it. Parsing problems never leave this module as
//! errors.

use crate::llm::ReasoningService;
use crate::parser::extract_json_array;
use crate::types::{
    Candidate, ChannelType, CollectedCandidates, LearnedProfile, Result, ScoredCandidate,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-source truncation applied when building the ranking prompt, to bound
/// request size.
pub const PROMPT_CANDIDATES_PER_SOURCE: usize = 10;

pub struct CandidateScorer {
    reasoning: Arc<dyn ReasoningService>,
}

impl CandidateScorer {
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self { reasoning }
    }

    /// Rank the collected pool against the query (and learned profile, if
    /// any) and select at most `max_candidates`, unique by identity key,
    /// each with its raw profile re-attached.
    pub async fn score_and_select(
        &self,
        collected: &CollectedCandidates,
        query: &str,
        max_candidates: usize,
        profile: Option<&LearnedProfile>,
    ) -> Result<Vec<ScoredCandidate>> {
        let prompt = build_ranking_prompt(collected, query, max_candidates, profile);

        let ranked = match self.reasoning.complete(&prompt).await {
            Ok(reply) => parse_ranked_candidates(&reply),
            Err(e) => {
                warn!("Ranking call failed: {}; selecting deterministically", e);
                None
            }
        };

        let mut selected = match ranked {
            None => {
                info!("Ranking output unusable, using deterministic selection");
                fallback_build(collected, max_candidates)
            }
            Some(ranked) => {
                let mut selected = dedup_by_identity(ranked);
                selected.truncate(max_candidates);

                // A materially thin ranked set gets supplemented, not
                // replaced.
                if selected.len() < max_candidates / 2 {
                    debug!(
                        ranked = selected.len(),
                        "Ranked set is thin, supplementing deterministically"
                    );
                    supplement(&mut selected, collected, max_candidates);
                }
                selected
            }
        };

        attach_raw_profiles(&mut selected, collected);
        info!(selected = selected.len(), "Candidate selection complete");
        Ok(selected)
    }
}

/// Parse the ranking reply into candidates, or `None` when the reply holds
/// no usable array.
pub fn parse_ranked_candidates(reply: &str) -> Option<Vec<ScoredCandidate>> {
    let items = extract_json_array(reply)?;

    let mut ranked = Vec::new();
    for item in items {
        match serde_json::from_value::<ScoredCandidate>(item) {
            Ok(candidate) => ranked.push(candidate),
            Err(e) => debug!("Skipping unparseable ranked entry: {}", e),
        }
    }

    if ranked.is_empty() {
        None
    } else {
        Some(ranked)
    }
}

/// Deterministic selection: walk sources in fixed order, round-robin one
/// candidate per source, dedup by identity key, until the cap is reached or
/// every source is exhausted. No randomness, so same pool in means same
/// selection out.
pub fn fallback_build(
    collected: &CollectedCandidates,
    max_candidates: usize,
) -> Vec<ScoredCandidate> {
    let mut cursors: Vec<(ChannelType, std::slice::Iter<'_, Candidate>)> = ChannelType::ALL
        .iter()
        .filter_map(|source| {
            collected
                .by_source
                .get(source)
                .map(|candidates| (*source, candidates.iter()))
        })
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut selected = Vec::new();
    let mut exhausted = false;

    while selected.len() < max_candidates && !exhausted {
        exhausted = true;
        for (source, cursor) in cursors.iter_mut() {
            if selected.len() >= max_candidates {
                break;
            }
            for candidate in cursor.by_ref() {
                exhausted = false;
                let Some(key) = candidate.identity_key() else {
                    continue;
                };
                if seen.insert(key) {
                    selected.push(to_scored(candidate, *source));
                    break;
                }
            }
        }
    }

    selected
}

fn to_scored(candidate: &Candidate, source: ChannelType) -> ScoredCandidate {
    ScoredCandidate {
        name: candidate.name.clone(),
        profile_url: candidate.profile_url.clone(),
        handle: candidate.handle.clone(),
        location: candidate.location.clone(),
        match_reason: format!("Top remaining result from the {} source", source),
        source: source.as_str().to_string(),
        company_size: None,
        raw_profile: serde_json::Value::Null,
    }
}

/// Keep first occurrence per identity key; entries without a key cannot be
/// deduplicated and are kept.
pub fn dedup_by_identity(candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut deduped = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match candidate.identity_key() {
            Some(key) => {
                if seen.insert(key) {
                    deduped.push(candidate);
                }
            }
            None => deduped.push(candidate),
        }
    }
    deduped
}

fn supplement(
    selected: &mut Vec<ScoredCandidate>,
    collected: &CollectedCandidates,
    max_candidates: usize,
) {
    let mut seen: HashSet<String> = selected
        .iter()
        .filter_map(|c| c.identity_key())
        .collect();

    for candidate in fallback_build(collected, max_candidates) {
        if selected.len() >= max_candidates {
            break;
        }
        let Some(key) = candidate.identity_key() else {
            continue;
        };
        if seen.insert(key) {
            selected.push(candidate);
        }
    }
}

/// Re-attach each selected candidate's raw profile from the collected pool.
/// A candidate with no match gets an empty raw profile rather than an error.
fn attach_raw_profiles(selected: &mut [ScoredCandidate], collected: &CollectedCandidates) {
    let pool: HashMap<String, &serde_json::Value> = collected
        .iter_ordered()
        .filter_map(|candidate| {
            candidate
                .identity_key()
                .map(|key| (key, &candidate.raw_profile))
        })
        .collect();

    for candidate in selected.iter_mut() {
        candidate.raw_profile = candidate
            .identity_key()
            .and_then(|key| pool.get(&key).map(|raw| (*raw).clone()))
            .unwrap_or_else(|| serde_json::json!({}));
    }
}

fn build_ranking_prompt(
    collected: &CollectedCandidates,
    query: &str,
    max_candidates: usize,
    profile: Option<&LearnedProfile>,
) -> String {
    let mut prompt = format!(
        "Rank the following candidates for this recruiting query and return \
         the best {} as a JSON array.\nQuery: {}\n",
        max_candidates, query
    );

    if let Some(profile) = profile {
        prompt.push_str("The recruiter's learned preferences:\n");
        prompt.push_str(
            &serde_json::to_string_pretty(profile).unwrap_or_else(|_| "{}".to_string()),
        );
        prompt.push('\n');
    }

    for source in ChannelType::ALL {
        let candidates = collected.get(source);
        if candidates.is_empty() {
            continue;
        }
        prompt.push_str(&format!("\nCandidates from {}:\n", source));
        for candidate in candidates.iter().take(PROMPT_CANDIDATES_PER_SOURCE) {
            prompt.push_str(&format!(
                "- name: {} | url: {} | handle: {} | location: {} | summary: {}\n",
                candidate.name,
                candidate.profile_url.as_deref().unwrap_or("-"),
                candidate.handle.as_deref().unwrap_or("-"),
                candidate.location.as_deref().unwrap_or("-"),
                candidate.summary.as_deref().unwrap_or("-"),
            ));
        }
    }

    prompt.push_str(
        "\nReply with a JSON array of objects with fields: name, profile_url, \
         handle, location, match_reason, source, company_size.",
    );
    prompt
}
