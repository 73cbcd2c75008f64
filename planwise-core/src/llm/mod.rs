pub mod gemini;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::OracleSection;
use crate::monitor::{MetricsSink, SearchMetric};
use crate::plan::Plan;

pub use gemini::GeminiOracle;
pub use prompt::{build_analysis_prompt, build_ranking_prompt, ReplyParser, OFF_TOPIC_REPLY};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oracle returned status {0}")]
    Status(u16),
    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),
    #[error("api key variable {0} is not set")]
    MissingApiKey(String),
    #[error("invalid oracle endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("oracle error: {0}")]
    Handler(String),
}

/// The external reasoning service: one prompt in, free text out.
#[async_trait]
pub trait RankingOracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Stand-in used when no oracle could be configured; every call fails with
/// the recorded reason.
pub struct UnavailableOracle {
    reason: String,
}

impl UnavailableOracle {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RankingOracle for UnavailableOracle {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Handler(self.reason.clone()))
    }
}

/// Builds the configured oracle, or an [`UnavailableOracle`] explaining why
/// it could not be built. Flows that never consult the oracle keep working.
pub fn oracle_from_config(section: &OracleSection) -> Arc<dyn RankingOracle> {
    match GeminiOracle::from_config(section) {
        Ok(oracle) => Arc::new(oracle),
        Err(err) => {
            debug!(target: "llm", "oracle unavailable: {err}");
            Arc::new(UnavailableOracle::new(err.to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "plans", rename_all = "snake_case")]
pub enum RankingOutcome {
    /// Blank query or empty catalog; the oracle was not consulted.
    NothingToRank,
    /// The reply held no usable plan number.
    NoMatch,
    Ranked(Vec<Plan>),
}

impl RankingOutcome {
    pub fn plans(&self) -> &[Plan] {
        match self {
            RankingOutcome::Ranked(plans) => plans,
            _ => &[],
        }
    }

    pub fn into_plans(self) -> Vec<Plan> {
        match self {
            RankingOutcome::Ranked(plans) => plans,
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "terms", rename_all = "snake_case")]
pub enum SearchTerms {
    Terms(Vec<String>),
    /// The question is not about postpaid plans.
    OffTopic,
}

pub struct RankingOrchestrator {
    oracle: Arc<dyn RankingOracle>,
    metrics: Option<Arc<dyn MetricsSink>>,
    deadline: Duration,
    parser: ReplyParser,
}

impl RankingOrchestrator {
    pub fn new(oracle: Arc<dyn RankingOracle>) -> Self {
        Self {
            oracle,
            metrics: None,
            deadline: DEFAULT_TIMEOUT,
            parser: ReplyParser::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_timeout(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Single attempt, bounded by the configured deadline. No retry.
    async fn consult(&self, prompt: &str) -> Result<String, LlmError> {
        match timeout(self.deadline, self.oracle.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(target: "llm", "oracle timeout after {:?}", self.deadline);
                Err(LlmError::Timeout(self.deadline))
            }
        }
    }

    /// Orders `plans` by relevance to `query` as judged by the oracle.
    ///
    /// The result only ever contains plans from `plans`, each at most once.
    pub async fn rank_by_query(
        &self,
        query: &str,
        plans: &[Plan],
    ) -> Result<RankingOutcome, LlmError> {
        let query = query.trim();
        if query.is_empty() || plans.is_empty() {
            debug!(target: "llm", "nothing to rank");
            return Ok(RankingOutcome::NothingToRank);
        }

        let prompt = build_ranking_prompt(query, plans);
        let reply = self.consult(&prompt).await?;
        let indices = self.parser.indices(&reply);
        let ranked: Vec<Plan> = self
            .parser
            .select(&indices, plans)
            .into_iter()
            .cloned()
            .collect();

        if ranked.is_empty() {
            info!(target: "llm", found = indices.len(), "oracle reply had no usable plan numbers");
            return Ok(RankingOutcome::NoMatch);
        }
        if ranked.len() < plans.len() {
            debug!(
                target: "llm",
                ranked = ranked.len(),
                total = plans.len(),
                "oracle returned a partial ranking"
            );
        }

        self.report(query, &ranked);
        Ok(RankingOutcome::Ranked(ranked))
    }

    /// Asks the oracle for the key terms of a plan question.
    pub async fn extract_search_terms(&self, question: &str) -> Result<SearchTerms, LlmError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(SearchTerms::Terms(Vec::new()));
        }
        let reply = self.consult(&build_analysis_prompt(question)).await?;
        if reply.trim().eq_ignore_ascii_case(OFF_TOPIC_REPLY) {
            return Ok(SearchTerms::OffTopic);
        }
        Ok(SearchTerms::Terms(prompt::parse_terms(&reply)))
    }

    fn report(&self, query: &str, ranked: &[Plan]) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let metric = SearchMetric::new(query, ranked);
        if let Err(err) = metrics.record_search(&metric) {
            warn!(target: "metrics", "failed to record search metric: {err}");
        }
    }
}
