//! Ollama backend for link ranking and chunk enrichment
//!
//! Generation goes through `/api/chat` (non-streaming), embeddings through
//! `/api/embed`.

use super::{parse_tags, AiError, ChunkEnricher, LinkRanker, PageContext, RankedLink, MAX_PRIORITY};
use crate::config::AiConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Links sent to the model in one ranking request
const RANK_BATCH_SIZE: usize = 50;

/// Characters of page text included in the ranking prompt
const EXCERPT_CHARS: usize = 500;

pub struct OllamaBackend {
    client: Client,
    base_url: String,
    generation_model: String,
    embedding_model: String,
}

impl OllamaBackend {
    pub fn new(
        base_url: impl Into<String>,
        generation_model: impl Into<String>,
        embedding_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            generation_model: generation_model.into(),
            embedding_model: embedding_model.into(),
        })
    }

    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        Self::new(
            &config.base_url,
            &config.generation_model,
            &config.embedding_model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Single-turn chat completion; `json` asks Ollama for a JSON object
    async fn generate(&self, system: &str, prompt: &str, json: bool) -> Result<String, AiError> {
        let start = Instant::now();

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.generation_model.clone(),
            messages,
            stream: false,
            format: json.then(|| "json".to_string()),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        debug!(
            "Generation finished in {}ms ({} chars)",
            start.elapsed().as_millis(),
            result.message.content.len()
        );
        Ok(result.message.content)
    }

    async fn rank_batch(
        &self,
        links: &[String],
        context: &PageContext,
    ) -> Result<Vec<RankedLink>, AiError> {
        let excerpt: String = context.excerpt.chars().take(EXCERPT_CHARS).collect();
        let listing = links
            .iter()
            .map(|l| format!("- {}", l))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Page: {}\nTitle: {}\nExcerpt: {}\n\nRate each link below from 0 to 10 for how likely \
             it leads to technical documentation related to this page. Respond with JSON of the \
             form {{\"links\": [{{\"url\": \"...\", \"priority\": 0}}]}}.\n\n{}",
            context.url, context.title, excerpt, listing
        );

        let answer = self
            .generate(
                "You rank hyperlinks for a documentation crawler.",
                &prompt,
                true,
            )
            .await?;
        parse_rankings(&answer)
    }
}

#[async_trait]
impl LinkRanker for OllamaBackend {
    #[instrument(skip(self, links, context), fields(model = %self.generation_model, link_count = links.len()))]
    async fn rank(
        &self,
        links: &[String],
        context: &PageContext,
    ) -> Result<Vec<RankedLink>, AiError> {
        let mut ranked = Vec::new();
        for batch in links.chunks(RANK_BATCH_SIZE) {
            ranked.extend(self.rank_batch(batch, context).await?);
        }
        Ok(ranked)
    }
}

#[async_trait]
impl ChunkEnricher for OllamaBackend {
    async fn tags(&self, text: &str) -> Result<Vec<String>, AiError> {
        let prompt = format!(
            "Analyze the following text and provide 5 relevant tags as a comma-separated list. \
             Text: {}",
            text
        );
        let answer = self.generate("", &prompt, false).await?;
        Ok(parse_tags(&answer))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: vec![text.to_string()],
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Parse("no embedding returned".to_string()))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct RankingEntry {
    url: String,
    priority: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RankingAnswer {
    Wrapped { links: Vec<RankingEntry> },
    Bare(Vec<RankingEntry>),
}

/// Parses a ranking answer, tolerating prose around the JSON
fn parse_rankings(answer: &str) -> Result<Vec<RankedLink>, AiError> {
    let parsed = serde_json::from_str::<RankingAnswer>(answer.trim()).or_else(|first| {
        let start = answer.find(|c: char| c == '{' || c == '[');
        let end = answer.rfind(|c: char| c == '}' || c == ']');
        match (start, end) {
            (Some(s), Some(e)) if s < e => serde_json::from_str(&answer[s..=e]),
            _ => Err(first),
        }
    });

    let entries = match parsed.map_err(|e| AiError::Parse(e.to_string()))? {
        RankingAnswer::Wrapped { links } => links,
        RankingAnswer::Bare(links) => links,
    };

    Ok(entries
        .into_iter()
        .map(|entry| RankedLink {
            url: entry.url.trim().to_string(),
            priority: entry.priority.round().clamp(0.0, MAX_PRIORITY as f64) as u8,
        })
        .collect())
}
