use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use planwise_core::{
    load_planwise_config, oracle_from_config, BrowseView, Dimension, FilterBounds, FilterSpec,
    FilterSpecBuilder, MetricsSink, Plan, PlanSearch, PlanwiseConfig, RankingOrchestrator,
    SearchMetric, SearchOutcome, SearchResponse, SortOrder, SqliteMetricsStore, SqlitePlanStore,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] planwise_core::ConfigError),
    #[error("catalog error: {0}")]
    Store(#[from] planwise_core::PlanError),
    #[error("invalid filter: {0}")]
    Filter(#[from] planwise_core::FilterError),
    #[error("metrics error: {0}")]
    Metrics(#[from] planwise_core::MonitorError),
    #[error("{0}")]
    Search(#[from] planwise_core::SearchError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("required resource missing: {0}")]
    MissingResource(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Postpaid plan catalog browser and search", long_about = None)]
pub struct Cli {
    /// Path to planwise.toml
    #[arg(long, default_value = "configs/planwise.toml")]
    pub config: PathBuf,
    /// Alternate path for the plan catalog database
    #[arg(long)]
    pub plans_db: Option<PathBuf>,
    /// Alternate path for the search metrics database
    #[arg(long)]
    pub metrics_db: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Creates the catalog and metrics schemas
    Init,
    /// Loads plans from a JSON file into the catalog
    Import(ImportArgs),
    /// Filters and sorts the catalog
    Browse(BrowseArgs),
    /// Shows the slider ranges and providers derived from the catalog
    Bounds,
    /// Ranks the whole catalog against a question
    Search(SearchArgs),
    /// Extracts keywords from a question and runs the capped catalog search
    Keywords(SearchArgs),
    /// Lists recorded searches, newest first
    Metrics(MetricsArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON array of plans; entries may carry `"overwrite": true`
    pub file: PathBuf,
}

#[derive(Args, Debug, Default)]
pub struct BrowseArgs {
    #[arg(long)]
    pub price_min: Option<f64>,
    #[arg(long)]
    pub price_max: Option<f64>,
    #[arg(long)]
    pub data_min: Option<f64>,
    #[arg(long)]
    pub data_max: Option<f64>,
    #[arg(long)]
    pub voice_min: Option<f64>,
    #[arg(long)]
    pub voice_max: Option<f64>,
    #[arg(long)]
    pub sms_min: Option<f64>,
    #[arg(long)]
    pub sms_max: Option<f64>,
    /// Keep only these providers (repeatable)
    #[arg(long = "provider")]
    pub providers: Vec<String>,
    #[arg(long, value_enum)]
    pub sort_by: Option<SortKey>,
    #[arg(long, value_enum)]
    pub order: Option<SortDirection>,
}

impl BrowseArgs {
    fn is_empty(&self) -> bool {
        Dimension::ALL
            .iter()
            .all(|dimension| self.bounds(*dimension) == (None, None))
            && self.providers.is_empty()
            && self.sort_by.is_none()
            && self.order.is_none()
    }

    fn bounds(&self, dimension: Dimension) -> (Option<f64>, Option<f64>) {
        match dimension {
            Dimension::Price => (self.price_min, self.price_max),
            Dimension::Data => (self.data_min, self.data_max),
            Dimension::Voice => (self.voice_min, self.voice_max),
            Dimension::Sms => (self.sms_min, self.sms_max),
        }
    }

    /// Flags left unset keep the catalog-wide bounds, widened when needed so
    /// a single flag past the catalog still forms a valid range.
    fn to_spec(&self, bounds: &FilterBounds) -> Result<FilterSpec> {
        let mut builder = FilterSpecBuilder::from_spec(&FilterSpec::from_bounds(bounds));
        for dimension in Dimension::ALL {
            let current = bounds.range(dimension);
            let (min, max) = match self.bounds(dimension) {
                (Some(min), Some(max)) => (min, max),
                (Some(min), None) => (min, current.max().max(min)),
                (None, Some(max)) => (current.min().min(max), max),
                (None, None) => (current.min(), current.max()),
            };
            builder = builder.range(dimension, min, max);
        }
        if !self.providers.is_empty() {
            builder = builder.providers(self.providers.iter().cloned());
        }
        if let Some(key) = self.sort_by {
            builder = builder.sort_by(key.into());
        }
        if let Some(direction) = self.order {
            builder = builder.sort_order(direction.into());
        }
        Ok(builder.build()?)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    Price,
    Data,
    Voice,
    Sms,
}

impl From<SortKey> for Dimension {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Price => Dimension::Price,
            SortKey::Data => Dimension::Data,
            SortKey::Voice => Dimension::Voice,
            SortKey::Sms => Dimension::Sms,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl From<SortDirection> for SortOrder {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => SortOrder::Asc,
            SortDirection::Desc => SortOrder::Desc,
        }
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free-text question; multiple words are joined with spaces
    #[arg(required = true)]
    pub question: Vec<String>,
}

impl SearchArgs {
    fn text(&self) -> String {
        self.question.join(" ")
    }
}

#[derive(Args, Debug)]
pub struct MetricsArgs {
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

pub async fn run(cli: Cli) -> Result<()> {
    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Init => {
            let report = context.init()?;
            render(&report, cli.format)?;
        }
        Commands::Import(args) => {
            let report = context.import(&args.file)?;
            render(&report, cli.format)?;
        }
        Commands::Browse(args) => {
            let view = context.browse(args)?;
            render(&view, cli.format)?;
        }
        Commands::Bounds => {
            let bounds = context.search_service()?.bounds()?;
            render(&bounds, cli.format)?;
        }
        Commands::Search(args) => {
            let response = context.search_service()?.search(&args.text()).await?;
            render(&response, cli.format)?;
        }
        Commands::Keywords(args) => {
            let response = context
                .search_service()?
                .keyword_search(&args.text())
                .await?;
            render(&response, cli.format)?;
        }
        Commands::Metrics(args) => {
            let history = context.metrics_history(args.limit)?;
            render(&history, cli.format)?;
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config: PlanwiseConfig,
    plans_db: PathBuf,
    metrics_db: PathBuf,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config = load_planwise_config(&cli.config)?;
        let plans_db = cli
            .plans_db
            .clone()
            .unwrap_or_else(|| config.catalog_database());
        let metrics_db = cli
            .metrics_db
            .clone()
            .unwrap_or_else(|| config.metrics_database());
        debug!(
            target: "catalog",
            plans = %plans_db.display(),
            metrics = %metrics_db.display(),
            "resolved database paths"
        );

        Ok(Self {
            config,
            plans_db,
            metrics_db,
        })
    }

    /// Only `init` and `import` may create the catalog file; every other
    /// command reports a missing database.
    fn plan_store(&self, create: bool) -> Result<SqlitePlanStore> {
        Ok(SqlitePlanStore::builder()
            .path(&self.plans_db)
            .create_if_missing(create)
            .keyword_limit(self.config.catalog.keyword_result_limit)
            .build()?)
    }

    fn metrics_store(&self) -> Option<SqliteMetricsStore> {
        self.config
            .metrics
            .enabled
            .then(|| SqliteMetricsStore::new(&self.metrics_db))
    }

    fn search_service(&self) -> Result<PlanSearch> {
        let mut ranker = RankingOrchestrator::new(oracle_from_config(&self.config.oracle))
            .with_timeout(self.config.oracle.timeout());
        if let Some(metrics) = self.metrics_store() {
            let sink: Arc<dyn MetricsSink> = Arc::new(metrics);
            ranker = ranker.with_metrics(sink);
        }
        Ok(PlanSearch::from_config(
            Arc::new(self.plan_store(false)?),
            ranker,
            &self.config,
        ))
    }

    fn init(&self) -> Result<InitReport> {
        ensure_parent(&self.plans_db)?;
        self.plan_store(true)?.initialize()?;

        let metrics_db = match self.metrics_store() {
            Some(metrics) => {
                ensure_parent(metrics.path())?;
                metrics.initialize()?;
                Some(metrics.path().to_path_buf())
            }
            None => None,
        };
        info!(target: "catalog", path = %self.plans_db.display(), "schemas initialized");

        Ok(InitReport {
            plans_db: self.plans_db.clone(),
            metrics_db,
        })
    }

    fn import(&self, file: &Path) -> Result<ImportReport> {
        if !file.exists() {
            return Err(AppError::MissingResource(format!(
                "plan file not found at {}",
                file.display()
            )));
        }
        let json = fs::read_to_string(file)?;
        let store = self.plan_store(true)?;
        let imported = store.import_json(&json)?;
        Ok(ImportReport {
            file: file.to_path_buf(),
            imported,
            total: store.count()?,
        })
    }

    fn browse(&self, args: &BrowseArgs) -> Result<BrowseView> {
        let search = self.search_service()?;
        if args.is_empty() {
            return Ok(search.browse(None)?);
        }
        search.browse_with(|bounds| args.to_spec(bounds))
    }

    fn metrics_history(&self, limit: usize) -> Result<MetricsHistory> {
        let metrics = self.metrics_store().ok_or_else(|| {
            AppError::MissingResource("search metrics are disabled in the config".to_string())
        })?;
        Ok(MetricsHistory {
            rows: metrics.recent(limit)?,
        })
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct InitReport {
    pub plans_db: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_db: Option<PathBuf>,
}

impl DisplayFallback for InitReport {
    fn display(&self) -> String {
        let mut lines = vec![format!("Catalog ready at {}", self.plans_db.display())];
        match &self.metrics_db {
            Some(path) => lines.push(format!("Metrics ready at {}", path.display())),
            None => lines.push("Metrics disabled".to_string()),
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub file: PathBuf,
    pub imported: usize,
    pub total: usize,
}

impl DisplayFallback for ImportReport {
    fn display(&self) -> String {
        format!(
            "Imported {} plan(s) from {} ({} in catalog)",
            self.imported,
            self.file.display(),
            self.total
        )
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsHistory {
    pub rows: Vec<SearchMetric>,
}

impl DisplayFallback for MetricsHistory {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No searches recorded".to_string();
        }
        self.rows
            .iter()
            .map(|metric| {
                format!(
                    "{} | {} | {}",
                    metric.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                    metric.question,
                    metric.recommended_package_names.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for FilterBounds {
    fn display(&self) -> String {
        let mut lines: Vec<String> = Dimension::ALL
            .iter()
            .map(|dimension| format!("{dimension}: {}", self.range(*dimension)))
            .collect();
        if self.providers.is_empty() {
            lines.push("providers: -".to_string());
        } else {
            lines.push(format!("providers: {}", self.providers.join(", ")));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for SearchOutcome {
    fn display(&self) -> String {
        match self {
            SearchOutcome::Plans(plans) => plans
                .iter()
                .enumerate()
                .map(|(idx, plan)| format!("{}. {}", idx + 1, plan_line(plan)))
                .collect::<Vec<_>>()
                .join("\n"),
            other => other.message().to_string(),
        }
    }
}

impl DisplayFallback for SearchResponse {
    fn display(&self) -> String {
        self.outcome.display()
    }
}

impl DisplayFallback for BrowseView {
    fn display(&self) -> String {
        let sort = format!("sorted by {} {:?}", self.spec.sort_by(), self.spec.sort_order());
        format!("{}\n({})", self.outcome.display(), sort.to_lowercase())
    }
}

fn plan_line(plan: &Plan) -> String {
    let data = match plan.data_breakdown_detail() {
        Some(detail) => format!("{}* ({detail})", field(&plan.total_data)),
        None => field(&plan.total_data).to_string(),
    };
    format!(
        "{} | {} | MVR{}/month | data={} | calls={} | sms={}",
        plan.provider,
        plan.package_name,
        plan.cost,
        data,
        field(&plan.local_calls_mins),
        field(&plan.local_sms)
    )
}

fn field(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(text) if !text.trim().is_empty() => text,
        _ => "-",
    }
}
