pub mod error;
pub mod filter;
pub mod keywords;
pub mod models;
pub mod normalize;
pub mod store;

pub use error::{FilterError, FilterResult, PlanError, PlanResult};
pub use filter::{
    apply_filters, FilterBounds, FilterSpec, FilterSpecBuilder, QuantityRange, SortOrder,
};
pub use keywords::{KeywordClassifier, KeywordQuery};
pub use models::{Plan, PlanImportRecord};
pub use normalize::{is_unbounded, normalize, Dimension};
pub use store::{CatalogStore, SqlitePlanStore, SqlitePlanStoreBuilder};
