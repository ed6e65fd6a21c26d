pub mod types;
pub mod parser;
pub mod llm;
pub mod discovery;
pub mod search_backend;
pub mod collector;
pub mod scorer;
pub mod learner;
pub mod store;
pub mod notifier;
pub mod scheduler;
pub mod service;

pub use types::*;
pub use llm::{HttpReasoningService, MockReasoningService, ReasoningConfig, ReasoningService};
pub use discovery::ChannelDiscoveryAgent;
pub use search_backend::{ChannelSearchBackend, SearchAgentConfig, SubprocessSearchBackend};
pub use collector::{CandidateCollector, CollectorFanout};
pub use scorer::CandidateScorer;
pub use learner::PreferenceLearner;
pub use store::{InMemorySubscriptionStore, SubscriptionStore};
pub use notifier::{CandidateNotifier, LogNotifier};
pub use scheduler::{CycleStats, MiningScheduler, SchedulerConfig};
pub use service::MinerService;
