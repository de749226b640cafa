use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{OracleConfig, OracleError, Refinement, RefinementOracle, RefinementRequest};

const SYSTEM_PROMPT: &str = "You tag KJV Old Testament passages where YHWH speaks. \
Return STRICT JSON only with keys: start_verse, end_verse, via, evidence_phrases, confidence.";

/// Local Ollama chat endpoint used as a refinement oracle
pub struct OllamaOracle {
    client: reqwest::Client,
    url: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    format: &'static str,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// User prompt for one block
    pub fn build_prompt(request: &RefinementRequest) -> String {
        format!(
            "BOOK: {book}\n\
             CHAPTER: {chapter}\n\
             CANDIDATE_START_VERSE: {start}\n\
             VERSES (ordered):\n\
             {verses}\n\
             \n\
             Rules:\n\
             - Use explicit KJV cues: 'God spake/said', 'the LORD spake/said ... saying',\n  \
             'Thus saith the LORD', 'saith the LORD (of hosts)', 'the LORD called ... saying',\n  \
             'The word of the LORD came unto ... saying'.\n\
             - If speech continues into following verses, include them until narration resumes\n  \
             (e.g., 'And Moses said', 'And the people answered', etc.).\n\
             - If mediated through a prophet, via='prophet'; if angelic, via='angel'; else 'direct'.\n\
             - Only quote phrases actually present in the supplied verses.\n\
             - If uncertain, prefer a shorter block and lower confidence.\n\
             Return JSON: {{\"start_verse\":INT, \"end_verse\":INT, \"via\":\"direct|prophet|angel|narration\", \
             \"evidence_phrases\":[STR], \"confidence\":FLOAT}}\n",
            book = request.book,
            chapter = request.chapter,
            start = request.candidate_start,
            verses = request.ordered_verses(),
        )
    }

    fn map_transport(&self, error: reqwest::Error) -> OracleError {
        if error.is_timeout() {
            OracleError::Timeout(self.timeout_secs)
        } else if let Some(status) = error.status() {
            OracleError::Status(status.as_u16())
        } else {
            OracleError::Transport(error.to_string())
        }
    }
}

/// Parse the model's message content as a refinement object
pub fn parse_refinement(content: &str) -> Result<Refinement, OracleError> {
    serde_json::from_str(content.trim())
        .map_err(|e| OracleError::Protocol(format!("malformed refinement JSON: {e}")))
}

#[async_trait]
impl RefinementOracle for OllamaOracle {
    async fn refine(&self, request: &RefinementRequest) -> Result<Refinement, OracleError> {
        let start_time = Instant::now();
        let prompt = Self::build_prompt(request);

        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            format: "json",
            stream: false,
            options: ChatOptions { temperature: 0.0 },
        };

        info!(
            "Sending oracle request for {} {}:{} (prompt length: {} chars)",
            request.book,
            request.chapter,
            request.candidate_start,
            prompt.len()
        );

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?
            .error_for_status()
            .map_err(|e| self.map_transport(e))?;

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Protocol(format!("unexpected chat response: {e}")))?;
        let refinement = parse_refinement(&chat.message.content)?;

        info!(
            "Oracle request for {} {}:{} completed in {}ms",
            request.book,
            request.chapter,
            request.candidate_start,
            start_time.elapsed().as_millis()
        );
        debug!(?refinement, "Oracle response");

        Ok(refinement)
    }
}
