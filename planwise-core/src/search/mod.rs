use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{BrowseSection, CatalogSection, PlanwiseConfig};
use crate::llm::{LlmError, RankingOrchestrator, RankingOutcome, SearchTerms};
use crate::plan::{
    apply_filters, CatalogStore, FilterBounds, FilterSpec, KeywordClassifier, Plan, PlanError,
};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("plans unavailable: {0}")]
    Store(#[from] PlanError),
    #[error("request failed: {0}")]
    Oracle(#[from] LlmError),
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// What a search or browse request produced. Only `Plans` carries results;
/// the other variants are user-facing states, not failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "plans", rename_all = "snake_case")]
pub enum SearchOutcome {
    NothingToRank,
    EmptyCatalog,
    NoMatch,
    OffTopic,
    Plans(Vec<Plan>),
}

impl SearchOutcome {
    pub fn plans(&self) -> &[Plan] {
        match self {
            SearchOutcome::Plans(plans) => plans,
            _ => &[],
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SearchOutcome::NothingToRank => "Enter a question to search for plans.",
            SearchOutcome::EmptyCatalog => "No plans found in the database.",
            SearchOutcome::NoMatch => "No matching packages found. Try different criteria.",
            SearchOutcome::OffTopic => "That question is not about postpaid packages.",
            SearchOutcome::Plans(_) => "",
        }
    }
}

impl From<RankingOutcome> for SearchOutcome {
    fn from(outcome: RankingOutcome) -> Self {
        match outcome {
            RankingOutcome::NothingToRank => SearchOutcome::NothingToRank,
            RankingOutcome::NoMatch => SearchOutcome::NoMatch,
            RankingOutcome::Ranked(plans) => SearchOutcome::Plans(plans),
        }
    }
}

/// Outcome stamped with the generation of the request that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub generation: u64,
    pub outcome: SearchOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowseView {
    pub bounds: FilterBounds,
    pub spec: FilterSpec,
    pub outcome: SearchOutcome,
}

/// Entry point for the browse, AI search and keyword search flows.
pub struct PlanSearch {
    catalog: Arc<dyn CatalogStore>,
    ranker: RankingOrchestrator,
    classifier: KeywordClassifier,
    browse_defaults: BrowseSection,
    generation: AtomicU64,
}

impl PlanSearch {
    pub fn new(catalog: Arc<dyn CatalogStore>, ranker: RankingOrchestrator) -> Self {
        let defaults = CatalogSection::default();
        Self {
            catalog,
            ranker,
            classifier: KeywordClassifier::new(&defaults.known_providers, &defaults.price_terms),
            browse_defaults: BrowseSection::default(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(
        catalog: Arc<dyn CatalogStore>,
        ranker: RankingOrchestrator,
        config: &PlanwiseConfig,
    ) -> Self {
        Self {
            catalog,
            ranker,
            classifier: KeywordClassifier::new(
                &config.catalog.known_providers,
                &config.catalog.price_terms,
            ),
            browse_defaults: config.browse,
            generation: AtomicU64::new(0),
        }
    }

    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `generation` belongs to the newest request issued so far.
    /// Callers drop responses for which this is false.
    pub fn is_latest(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Ranks the whole catalog against a free-text question.
    pub async fn search(&self, query: &str) -> SearchResult<SearchResponse> {
        let generation = self.begin();
        if query.trim().is_empty() {
            return Ok(SearchResponse {
                generation,
                outcome: SearchOutcome::NothingToRank,
            });
        }

        let plans = self.catalog.fetch_all_plans()?;
        if plans.is_empty() {
            warn!(target: "search", "catalog is empty");
            return Ok(SearchResponse {
                generation,
                outcome: SearchOutcome::EmptyCatalog,
            });
        }

        let outcome = self.ranker.rank_by_query(query, &plans).await?;
        info!(
            target: "search",
            generation,
            ranked = outcome.plans().len(),
            catalog = plans.len(),
            "ranking finished"
        );
        Ok(SearchResponse {
            generation,
            outcome: outcome.into(),
        })
    }

    /// Question analysis followed by the capped catalog keyword search.
    pub async fn keyword_search(&self, question: &str) -> SearchResult<SearchResponse> {
        let generation = self.begin();
        if question.trim().is_empty() {
            return Ok(SearchResponse {
                generation,
                outcome: SearchOutcome::NothingToRank,
            });
        }

        let outcome = match self.ranker.extract_search_terms(question).await? {
            SearchTerms::OffTopic => SearchOutcome::OffTopic,
            SearchTerms::Terms(terms) => {
                let query = self.classifier.classify(&terms);
                let plans = self.catalog.search_by_keywords(&query)?;
                if plans.is_empty() {
                    SearchOutcome::NoMatch
                } else {
                    SearchOutcome::Plans(plans)
                }
            }
        };
        Ok(SearchResponse {
            generation,
            outcome,
        })
    }

    pub fn bounds(&self) -> SearchResult<FilterBounds> {
        let plans = self.catalog.fetch_all_plans()?;
        Ok(FilterBounds::from_catalog(&plans, &self.browse_defaults))
    }

    /// Filters and sorts the catalog. Without a spec, the catalog-wide
    /// bounds are used, which keeps every plan that has all three fields.
    pub fn browse(&self, spec: Option<FilterSpec>) -> SearchResult<BrowseView> {
        self.browse_with(|bounds| {
            Ok::<_, SearchError>(spec.unwrap_or_else(|| FilterSpec::from_bounds(bounds)))
        })
    }

    /// Like [`PlanSearch::browse`], with the spec derived from the bounds of
    /// the same catalog snapshot it is applied to.
    pub fn browse_with<F, E>(&self, build: F) -> Result<BrowseView, E>
    where
        F: FnOnce(&FilterBounds) -> Result<FilterSpec, E>,
        E: From<SearchError>,
    {
        let plans = self
            .catalog
            .fetch_all_plans()
            .map_err(|err| E::from(SearchError::from(err)))?;
        let bounds = FilterBounds::from_catalog(&plans, &self.browse_defaults);
        let spec = build(&bounds)?;

        let outcome = if plans.is_empty() {
            SearchOutcome::EmptyCatalog
        } else {
            let kept = apply_filters(&plans, &spec);
            if kept.is_empty() {
                SearchOutcome::NoMatch
            } else {
                SearchOutcome::Plans(kept)
            }
        };
        Ok(BrowseView {
            bounds,
            spec,
            outcome,
        })
    }
}
