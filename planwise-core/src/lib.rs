pub mod config;
pub mod error;
pub mod llm;
pub mod monitor;
pub mod plan;
pub mod search;
pub mod sqlite;

pub use config::{load_planwise_config, PlanwiseConfig};
pub use error::{ConfigError, Result};
pub use llm::{
    oracle_from_config, GeminiOracle, LlmError, RankingOracle, RankingOrchestrator, RankingOutcome,
    SearchTerms, UnavailableOracle,
};
pub use monitor::{
    MemoryMetricsSink, MetricsSink, MonitorError, SearchMetric, SqliteMetricsStore,
};
pub use plan::{
    apply_filters, normalize, CatalogStore, Dimension, FilterBounds, FilterError, FilterResult,
    FilterSpec, FilterSpecBuilder, KeywordClassifier, KeywordQuery, Plan, PlanError,
    PlanImportRecord, PlanResult, QuantityRange, SortOrder, SqlitePlanStore,
    SqlitePlanStoreBuilder,
};
pub use search::{BrowseView, PlanSearch, SearchError, SearchOutcome, SearchResponse};
