//! Seats played by an OpenAI-compatible chat completions endpoint.
//!
//! Each seat keeps its own bounded conversation, opened by a system
//! preamble naming its seat, role, persona and dialect. Briefing stages are
//! appended to the conversation without a request; decision stages send the
//! whole conversation and append the answer.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use moderator::{AgentError, AgentPort, SeatConfig, SeatId, StageCall};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ChatEndpoint;
use crate::prompts;

/// Most user/assistant messages kept per seat, preamble excluded.
pub const MAX_HISTORY_MESSAGES: usize = 40;

const MAX_TOKENS: u32 = 512;
const TEMPERATURE: f32 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// One conversation per seat.
#[derive(Debug, Clone)]
struct SeatConversation {
    preamble: ChatMessage,
    history: Vec<ChatMessage>,
}

impl SeatConversation {
    fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
        if self.history.len() > MAX_HISTORY_MESSAGES {
            let excess = self.history.len() - MAX_HISTORY_MESSAGES;
            self.history.drain(..excess);
        }
    }
}

pub struct ChatAgent {
    http: reqwest::Client,
    endpoint: ChatEndpoint,
    seats: BTreeMap<SeatId, SeatConversation>,
}

impl ChatAgent {
    pub fn new(endpoint: ChatEndpoint, plan: &[SeatConfig]) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build chat HTTP client")?;

        let mut seats = BTreeMap::new();
        for seat in plan {
            let preamble = prompts::seat_preamble(seat)
                .with_context(|| format!("Failed to render preamble for seat {}", seat.seat_id))?;
            seats.insert(
                seat.seat_id,
                SeatConversation {
                    preamble: ChatMessage::system(preamble),
                    history: Vec::new(),
                },
            );
        }

        Ok(Self {
            http,
            endpoint,
            seats,
        })
    }

    /// Conversation of one seat, preamble first.
    pub fn history(&self, seat: SeatId) -> Vec<ChatMessage> {
        self.seats
            .get(&seat)
            .map(|c| {
                std::iter::once(c.preamble.clone())
                    .chain(c.history.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The rendered prompt, or the raw metadata when no renderer is attached.
    fn user_text(call: &StageCall) -> String {
        match &call.prompt {
            Some(prompt) => prompt.clone(),
            None => {
                let metadata = serde_json::to_string(&call.metadata).unwrap_or_default();
                format!("[{}] {metadata}", call.stage)
            }
        }
    }

    async fn complete(&self, conversation: &SeatConversation) -> Result<String, AgentError> {
        let request = ChatRequest {
            model: &self.endpoint.model,
            messages: std::iter::once(&conversation.preamble)
                .chain(conversation.history.iter())
                .collect(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let url = format!(
            "{}/chat/completions",
            self.endpoint.url.trim_end_matches('/')
        );
        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.endpoint.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Transport(format!(
                "chat API error ({status}): {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Protocol(format!("Failed to parse response: {e}")))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| AgentError::Protocol("response had no choices".into()))
    }
}

#[async_trait]
impl AgentPort for ChatAgent {
    async fn decide(&mut self, call: &StageCall) -> Result<Option<String>, AgentError> {
        let Some(conversation) = self.seats.get(&call.seat) else {
            warn!(seat = call.seat, stage = %call.stage, "No conversation for seat");
            return Ok(None);
        };
        let mut conversation = conversation.clone();
        conversation.push(ChatMessage::user(Self::user_text(call)));

        let reply = if call.expect_reply {
            let answer = self.complete(&conversation).await?;
            debug!(
                seat = call.seat,
                stage = %call.stage,
                chars = answer.len(),
                "Chat reply received"
            );
            conversation.push(ChatMessage::assistant(answer.clone()));
            Some(answer)
        } else {
            None
        };

        // Only a completed exchange is kept, so a failed request can be retried.
        self.seats.insert(call.seat, conversation);
        Ok(reply)
    }
}
