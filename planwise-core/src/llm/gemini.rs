use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::OracleSection;

use super::{LlmError, RankingOracle};

/// Oracle backed by the Generative Language `generateContent` endpoint.
pub struct GeminiOracle {
    client: reqwest::Client,
    url: Url,
    model: String,
    api_key: String,
}

impl GeminiOracle {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let model = model.into();
        let url = Url::parse(&format!(
            "{}/models/{}:generateContent",
            endpoint.trim_end_matches('/'),
            model
        ))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            model,
            api_key: api_key.into(),
        })
    }

    /// Reads the API key from the environment variable named in config.
    pub fn from_config(section: &OracleSection) -> Result<Self, LlmError> {
        let api_key = std::env::var(&section.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(section.api_key_env.clone()))?;
        Self::new(&section.endpoint, section.model.clone(), api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate; empty when the service sent none.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

#[async_trait]
impl RankingOracle for GeminiOracle {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        let response = self
            .client
            .post(self.url.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(LlmError::Status(response.status().as_u16()));
        }
        let body = response.json::<GenerateContentResponse>().await?;
        let text = body.text();
        debug!(target: "llm", model = %self.model, chars = text.len(), "oracle replied");
        Ok(text)
    }
}
