//! Preference learning from user ratings.
//!
//! High and low ratings carry signal; middling ones carry none and are
//! excluded entirely. Each analysis produces a whole new profile; there is
//! no incremental merge, because stale signal is worse than fresh partial
//! signal.

use crate::llm::ReasoningService;
use crate::parser::extract_json_object;
use crate::types::{CandidateRating, LearnedProfile, MinerError, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Ratings at or above this go into the "liked" bucket.
pub const HIGH_RATING_FLOOR: u8 = 4;

/// Ratings at or below this go into the "disliked" bucket.
pub const LOW_RATING_CEILING: u8 = 2;

pub struct PreferenceLearner {
    reasoning: Arc<dyn ReasoningService>,
}

impl PreferenceLearner {
    pub fn new(reasoning: Arc<dyn ReasoningService>) -> Self {
        Self { reasoning }
    }

    /// Derive a fresh profile from the decisive ratings. The result replaces
    /// whatever profile the subscription held before.
    pub async fn analyze(&self, rated: &[CandidateRating]) -> Result<LearnedProfile> {
        let (high, low) = partition_ratings(rated);
        if high.is_empty() && low.is_empty() {
            return Err(MinerError::Validation(
                "no decisive ratings to learn from".to_string(),
            ));
        }

        debug!(
            liked = high.len(),
            disliked = low.len(),
            excluded = rated.len() - high.len() - low.len(),
            "Analyzing rating buckets"
        );

        let prompt = build_feedback_prompt(&high, &low);
        let reply = self.reasoning.complete(&prompt).await?;

        let profile = parse_learned_profile(&reply).ok_or_else(|| {
            MinerError::Parse("could not extract a preference profile from model output".to_string())
        })?;

        info!(
            seniority = profile.preferred_seniority.len(),
            skills = profile.preferred_skills.len(),
            avoid = profile.avoid.len(),
            "Learned fresh preference profile"
        );
        Ok(profile)
    }
}

/// Split ratings into liked (>= 4) and disliked (<= 2); everything in
/// between is dropped from the analysis input.
pub fn partition_ratings(
    rated: &[CandidateRating],
) -> (Vec<&CandidateRating>, Vec<&CandidateRating>) {
    let mut high = Vec::new();
    let mut low = Vec::new();
    for rating in rated {
        if rating.rating >= HIGH_RATING_FLOOR {
            high.push(rating);
        } else if rating.rating <= LOW_RATING_CEILING {
            low.push(rating);
        }
    }
    (high, low)
}

/// Fenced-block extraction first, then raw object parsing.
pub fn parse_learned_profile(reply: &str) -> Option<LearnedProfile> {
    let map = extract_json_object(reply)?;
    serde_json::from_value(serde_json::Value::Object(map)).ok()
}

fn describe_bucket(bucket: &[&CandidateRating]) -> String {
    if bucket.is_empty() {
        return "(none)\n".to_string();
    }
    bucket
        .iter()
        .map(|r| {
            format!(
                "- {} ({}): {}\n",
                r.candidate.name, r.rating, r.candidate.match_reason
            )
        })
        .collect()
}

fn build_feedback_prompt(high: &[&CandidateRating], low: &[&CandidateRating]) -> String {
    let mut prompt = String::from(
        "A recruiter rated candidates you previously surfaced. Infer their \
         preferences from the contrast.\n\nCandidates they liked:\n",
    );
    prompt.push_str(&describe_bucket(high));
    prompt.push_str("\nCandidates they disliked:\n");
    prompt.push_str(&describe_bucket(low));
    prompt.push_str(
        "\nReply with a JSON object with exactly these array-of-string \
         fields: preferred_seniority, preferred_company_sizes, \
         preferred_skills, preferred_backgrounds, avoid.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoredCandidate;
    use chrono::Utc;

    fn rating(name: &str, value: u8) -> CandidateRating {
        CandidateRating {
            candidate_id: name.to_lowercase(),
            candidate: ScoredCandidate {
                name: name.to_string(),
                profile_url: None,
                handle: None,
                location: None,
                match_reason: "test".to_string(),
                source: "directory".to_string(),
                company_size: None,
                raw_profile: serde_json::Value::Null,
            },
            rating: value,
            rated_at: Utc::now(),
        }
    }

    #[test]
    fn middling_ratings_are_excluded() {
        let rated = vec![
            rating("a", 5),
            rating("b", 5),
            rating("c", 1),
            rating("d", 1),
            rating("e", 3),
            rating("f", 3),
        ];
        let (high, low) = partition_ratings(&rated);
        assert_eq!(high.len(), 2);
        assert_eq!(low.len(), 2);
    }

    #[test]
    fn boundary_ratings_land_in_buckets() {
        let rated = vec![rating("a", 4), rating("b", 2), rating("c", 3)];
        let (high, low) = partition_ratings(&rated);
        assert_eq!(high.len(), 1);
        assert_eq!(low.len(), 1);
    }

    #[tokio::test]
    async fn all_middling_input_is_a_validation_error() {
        let reasoning = Arc::new(crate::llm::MockReasoningService::new("learner"));
        let learner = PreferenceLearner::new(reasoning);
        let err = learner
            .analyze(&[rating("a", 3), rating("b", 3)])
            .await
            .unwrap_err();
        assert!(matches!(err, MinerError::Validation(_)));
    }

    #[tokio::test]
    async fn profile_parses_from_fenced_reply() {
        let reply = "```json\n{\"preferred_seniority\": [\"senior\"], \
                     \"preferred_company_sizes\": [], \"preferred_skills\": \
                     [\"rust\"], \"preferred_backgrounds\": [], \"avoid\": \
                     [\"agencies\"]}\n```";
        let reasoning =
            Arc::new(crate::llm::MockReasoningService::new("learner").with_default_response(reply));
        let learner = PreferenceLearner::new(reasoning);
        let profile = learner
            .analyze(&[rating("a", 5), rating("b", 1)])
            .await
            .unwrap();
        assert_eq!(profile.preferred_seniority, vec!["senior"]);
        assert_eq!(profile.avoid, vec!["agencies"]);
    }

    #[tokio::test]
    async fn raw_object_reply_also_parses() {
        let reply = "{\"preferred_skills\": [\"go\"]}";
        let reasoning =
            Arc::new(crate::llm::MockReasoningService::new("learner").with_default_response(reply));
        let learner = PreferenceLearner::new(reasoning);
        let profile = learner.analyze(&[rating("a", 5)]).await.unwrap();
        assert_eq!(profile.preferred_skills, vec!["go"]);
        assert!(profile.avoid.is_empty());
    }

    #[tokio::test]
    async fn unusable_reply_is_a_parse_error() {
        let reasoning = Arc::new(
            crate::llm::MockReasoningService::new("learner")
                .with_default_response("I cannot produce JSON today"),
        );
        let learner = PreferenceLearner::new(reasoning);
        let err = learner.analyze(&[rating("a", 5)]).await.unwrap_err();
        assert!(matches!(err, MinerError::Parse(_)));
    }
}
