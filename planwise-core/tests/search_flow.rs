use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use planwise_core::{
    CatalogStore, Dimension, FilterSpec, FilterSpecBuilder, KeywordQuery, LlmError, MetricsSink, Plan, PlanError,
    PlanResult, PlanSearch, RankingOracle, RankingOrchestrator, SearchError, SearchOutcome,
    SortOrder, SqliteMetricsStore, SqlitePlanStore,
};
use tempfile::TempDir;

struct CannedOracle {
    reply: String,
}

#[async_trait]
impl RankingOracle for CannedOracle {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.starts_with("Analyze this question") {
            return Ok("Ooredoo, unlimited".into());
        }
        Ok(self.reply.clone())
    }
}

struct DownOracle;

#[async_trait]
impl RankingOracle for DownOracle {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Handler("quota exceeded".into()))
    }
}

struct UnavailableCatalog;

impl CatalogStore for UnavailableCatalog {
    fn fetch_all_plans(&self) -> PlanResult<Vec<Plan>> {
        Err(PlanError::MissingStore)
    }

    fn search_by_keywords(&self, _query: &KeywordQuery) -> PlanResult<Vec<Plan>> {
        Err(PlanError::MissingStore)
    }
}

struct CountingCatalog {
    inner: SqlitePlanStore,
    fetches: AtomicUsize,
}

impl CatalogStore for CountingCatalog {
    fn fetch_all_plans(&self) -> PlanResult<Vec<Plan>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_all_plans()
    }

    fn search_by_keywords(&self, query: &KeywordQuery) -> PlanResult<Vec<Plan>> {
        self.inner.search_by_keywords(query)
    }
}

fn seeded_store(dir: &Path) -> SqlitePlanStore {
    let store = SqlitePlanStore::new(dir.join("plans.sqlite")).unwrap();
    store.initialize().unwrap();
    let sample = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/plans.sample.json");
    store
        .import_json(&std::fs::read_to_string(sample).unwrap())
        .unwrap();
    store
}

fn metrics_store(dir: &Path) -> Arc<SqliteMetricsStore> {
    let metrics = Arc::new(SqliteMetricsStore::new(dir.join("metrics.sqlite")));
    metrics.initialize().unwrap();
    metrics
}

fn service(
    store: SqlitePlanStore,
    oracle: Arc<dyn RankingOracle>,
    metrics: Arc<dyn MetricsSink>,
) -> PlanSearch {
    let ranker = RankingOrchestrator::new(oracle).with_metrics(metrics);
    PlanSearch::new(Arc::new(store), ranker)
}

#[tokio::test]
async fn ai_search_ranks_catalog_and_logs_metric() {
    let dir = TempDir::new().unwrap();
    let metrics = metrics_store(dir.path());
    let search = service(
        seeded_store(dir.path()),
        Arc::new(CannedOracle {
            reply: "Ranking: 3, 1, 4, 2".into(),
        }),
        metrics.clone(),
    );

    let response = search.search("best package under 500").await.unwrap();
    let names: Vec<&str> = response
        .outcome
        .plans()
        .iter()
        .map(|plan| plan.package_name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["Smart 350", "Postpaid Basic", "Max Unlimited", "Postpaid Plus"]
    );
    assert!(search.is_latest(response.generation));

    let recent = metrics.recent(5).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].question, "best package under 500");
    assert_eq!(recent[0].recommended_package_names.len(), 4);
}

#[tokio::test]
async fn empty_catalog_and_blank_query_are_states_not_errors() {
    let dir = TempDir::new().unwrap();
    let store = SqlitePlanStore::new(dir.path().join("plans.sqlite")).unwrap();
    store.initialize().unwrap();
    let search = service(
        store,
        Arc::new(CannedOracle { reply: "1".into() }),
        metrics_store(dir.path()),
    );

    let blank = search.search("   ").await.unwrap();
    assert_eq!(blank.outcome, SearchOutcome::NothingToRank);

    let empty = search.search("best").await.unwrap();
    assert_eq!(empty.outcome, SearchOutcome::EmptyCatalog);
    assert!(!search.is_latest(blank.generation));
    assert!(search.is_latest(empty.generation));
}

#[tokio::test]
async fn unusable_reply_is_no_match() {
    let dir = TempDir::new().unwrap();
    let metrics = metrics_store(dir.path());
    let search = service(
        seeded_store(dir.path()),
        Arc::new(CannedOracle {
            reply: "I cannot decide.".into(),
        }),
        metrics.clone(),
    );

    let response = search.search("best").await.unwrap();
    assert_eq!(response.outcome, SearchOutcome::NoMatch);
    assert!(metrics.recent(5).unwrap().is_empty());
}

#[tokio::test]
async fn store_and_oracle_failures_stay_distinct() {
    let dir = TempDir::new().unwrap();
    let down = service(
        seeded_store(dir.path()),
        Arc::new(DownOracle),
        metrics_store(dir.path()),
    );
    assert!(matches!(
        down.search("best").await,
        Err(SearchError::Oracle(LlmError::Handler(_)))
    ));

    let unavailable = PlanSearch::new(
        Arc::new(UnavailableCatalog),
        RankingOrchestrator::new(Arc::new(CannedOracle { reply: "1".into() })),
    );
    assert!(matches!(
        unavailable.search("best").await,
        Err(SearchError::Store(_))
    ));
    assert!(matches!(unavailable.browse(None), Err(SearchError::Store(_))));
}

#[tokio::test]
async fn keyword_search_uses_extracted_terms() {
    let dir = TempDir::new().unwrap();
    let search = service(
        seeded_store(dir.path()),
        Arc::new(CannedOracle { reply: String::new() }),
        metrics_store(dir.path()),
    );

    let response = search
        .keyword_search("any unlimited plan from ooredoo?")
        .await
        .unwrap();
    let ids: Vec<&str> = response
        .outcome
        .plans()
        .iter()
        .map(|plan| plan.id.as_str())
        .collect();
    assert_eq!(ids, vec!["ooredoo-max"]);
}

#[test]
fn browse_defaults_to_catalog_bounds_and_respects_spec() {
    let dir = TempDir::new().unwrap();
    let search = service(
        seeded_store(dir.path()),
        Arc::new(CannedOracle { reply: String::new() }),
        metrics_store(dir.path()),
    );

    let view = search.browse(None).unwrap();
    assert_eq!(view.bounds.providers, vec!["Dhiraagu", "Ooredoo"]);
    assert_eq!(view.bounds.price.min(), 199.0);
    assert_eq!(view.bounds.price.max(), 899.0);
    let ids: Vec<&str> = view.outcome.plans().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["dhi-basic", "ooredoo-smart", "dhi-plus", "ooredoo-max"]);

    let spec = FilterSpec::builder()
        .sms(0.0, 200.0)
        .sort_by(Dimension::Voice)
        .sort_order(SortOrder::Desc)
        .build()
        .unwrap();
    let view = search.browse(Some(spec)).unwrap();
    let ids: Vec<&str> = view.outcome.plans().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["ooredoo-max", "ooredoo-smart", "dhi-basic"]);

    let none = FilterSpec::builder().price(0.0, 10.0).build().unwrap();
    assert_eq!(
        search.browse(Some(none)).unwrap().outcome,
        SearchOutcome::NoMatch
    );
}

#[test]
fn browse_with_builds_spec_from_the_snapshot_it_filters() {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(CountingCatalog {
        inner: seeded_store(dir.path()),
        fetches: AtomicUsize::new(0),
    });
    let search = PlanSearch::new(
        catalog.clone(),
        RankingOrchestrator::new(Arc::new(CannedOracle { reply: String::new() })),
    );

    let view = search
        .browse_with(|bounds| {
            let price = bounds.range(Dimension::Price);
            Ok::<_, SearchError>(
                FilterSpecBuilder::from_spec(&FilterSpec::from_bounds(bounds))
                    .price(price.min(), 400.0)
                    .build()
                    .unwrap(),
            )
        })
        .unwrap();
    let ids: Vec<&str> = view.outcome.plans().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["dhi-basic", "ooredoo-smart"]);
    assert_eq!(view.spec.range(Dimension::Price).min(), 199.0);
    assert_eq!(catalog.fetches.load(Ordering::SeqCst), 1);
}
