use async_trait::async_trait;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::answer_service::{Answer, AnswerService, AnswerServiceError};
use crate::config::ChatConfig;
use crate::message::Message;
use crate::model::ModelConfig;

/// USD per 1K tokens as (prompt, completion), keyed by model-name prefix.
/// Longer prefixes come first so that e.g. `gpt-4-32k` is not billed as `gpt-4`.
const PRICES_PER_1K_TOKENS: &[(&str, f64, f64)] = &[
    ("gpt-4-32k", 0.06, 0.12),
    ("gpt-4", 0.03, 0.06),
    ("gpt-3.5-turbo-16k", 0.003, 0.004),
    ("gpt-3.5-turbo", 0.0015, 0.002),
];

/// Client for the OpenAI chat completions endpoint.
pub struct OpenAiClient {
    api_key: String,
    endpoint: Url,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| eyre!("OPENAI_API_KEY environment variable not set"))?;

        let endpoint = chat_completions_url(&config.base_url)?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            api_key,
            endpoint,
            client,
        })
    }
}

#[async_trait]
impl AnswerService for OpenAiClient {
    async fn answer(
        &self,
        messages: &[Message],
        config: &ModelConfig,
    ) -> Result<Answer, AnswerServiceError> {
        let request_body = ChatCompletionRequest {
            model: config.model_identifier(),
            messages,
            temperature: config.temperature(),
        };

        debug!(
            model = config.model_identifier(),
            temperature = config.temperature(),
            messages = messages.len(),
            "Sending request to OpenAI API"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            error!("API request failed with status {}: {}", status, body);
            return Err(classify_status(status.as_u16(), body));
        }

        debug!("Received response from OpenAI API: {}", body);

        let answer = parse_response(&body, config.model_identifier())?;
        debug!(cost = answer.cost, "Answer received");
        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Token counts reported for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Cost in USD of a call to `model` with the given usage. Models without a
/// known price cost nothing.
pub fn compute_cost(model: &str, usage: Usage) -> f64 {
    PRICES_PER_1K_TOKENS
        .iter()
        .find(|(prefix, _, _)| model.starts_with(prefix))
        .map(|(_, prompt, completion)| {
            (usage.prompt_tokens as f64 * prompt + usage.completion_tokens as f64 * completion)
                / 1000.0
        })
        .unwrap_or(0.0)
}

fn chat_completions_url(base_url: &str) -> Result<Url> {
    let base = format!("{}/", base_url.trim_end_matches('/'));
    let base = Url::parse(&base)
        .map_err(|e| eyre!("Invalid OPENAI_BASE_URL {:?}: {}", base_url, e))?;
    Ok(base.join("chat/completions")?)
}

fn parse_response(body: &str, model: &str) -> Result<Answer, AnswerServiceError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| AnswerServiceError::Parse(e.to_string()))?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AnswerServiceError::Parse("response contained no message content".into()))?;

    let cost = compute_cost(model, response.usage.unwrap_or_default());

    Ok(Answer { text, cost })
}

fn classify_status(status: u16, body: String) -> AnswerServiceError {
    match status {
        401 | 403 => AnswerServiceError::Auth(body),
        408 => AnswerServiceError::Timeout,
        429 => AnswerServiceError::RateLimited(body),
        500..=599 => AnswerServiceError::Server { status, body },
        _ => AnswerServiceError::Rejected { status, body },
    }
}

fn map_transport_error(err: reqwest::Error) -> AnswerServiceError {
    if err.is_timeout() {
        AnswerServiceError::Timeout
    } else {
        AnswerServiceError::Network(err.to_string())
    }
}
