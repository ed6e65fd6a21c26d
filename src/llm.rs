use crate::types::{MinerError, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Opaque reasoning/generation service. Invoked with a prompt, returns free
/// text that is only expected to contain JSON somewhere; callers run the
/// extraction cascade over it.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Name of this service, for logging.
    fn service_name(&self) -> String;

    /// Run one completion over the prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Configuration for the HTTP reasoning client.
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_seconds: 120,
            max_retries: 3,
            retry_delay_seconds: 2,
        }
    }
}

/// Chat-completion backed reasoning service.
pub struct HttpReasoningService {
    client: Client,
    api_key: String,
    config: ReasoningConfig,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl HttpReasoningService {
    pub fn new(api_key: impl Into<String>, config: ReasoningConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.into(),
            config,
        }
    }

    /// Create from the `MINER_LLM_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("MINER_LLM_API_KEY")
            .map_err(|_| MinerError::General("MINER_LLM_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key, ReasoningConfig::default()))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    async fn send_once(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MinerError::General(format!(
                "reasoning service returned HTTP {}: {}",
                status,
                crate::parser::clamp_chars(&body, 300)
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| MinerError::General("reasoning service returned no choices".to_string()))
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningService {
    fn service_name(&self) -> String {
        format!("chat-completions ({})", self.config.model)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 16),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            match self.send_once(prompt).await {
                Ok(text) => {
                    debug!(chars = text.len(), "Reasoning service responded");
                    return Ok(text);
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!(
                                "Reasoning call attempt {} failed, retrying in {:?}",
                                attempt + 1,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| MinerError::General("reasoning call failed".to_string())))
    }
}

/// Scripted reasoning service for development and testing. Responses are
/// consumed in order; when the queue runs dry the default response is
/// returned instead.
pub struct MockReasoningService {
    name: String,
    responses: Mutex<VecDeque<String>>,
    default_response: String,
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl MockReasoningService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(VecDeque::new()),
            default_response: String::new(),
            prompts: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses
            .lock()
            .expect("mock responses lock")
            .push_back(response.into());
        self
    }

    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Make every call fail, for exercising degraded paths.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// All prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("mock prompts lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().expect("mock prompts lock").len()
    }
}

#[async_trait]
impl ReasoningService for MockReasoningService {
    fn service_name(&self) -> String {
        format!("mock ({})", self.name)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("mock prompts lock")
            .push(prompt.to_string());

        if self.fail {
            return Err(MinerError::General("mock reasoning failure".to_string()));
        }

        let next = self
            .responses
            .lock()
            .expect("mock responses lock")
            .pop_front();
        Ok(next.unwrap_or_else(|| self.default_response.clone()))
    }
}
