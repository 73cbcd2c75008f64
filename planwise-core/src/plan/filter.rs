use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::models::Plan;
use super::normalize::Dimension;
use super::{FilterError, FilterResult};
use crate::config::BrowseSection;

/// Closed interval `[min, max]`, inclusive on both ends.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct QuantityRange {
    min: f64,
    max: f64,
}

impl QuantityRange {
    pub fn new(min: f64, max: f64) -> FilterResult<Self> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(FilterError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// `[0, +inf)`.
    pub fn unbounded() -> Self {
        Self {
            min: 0.0,
            max: f64::INFINITY,
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl fmt::Display for QuantityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// One filtering request: four ranges, a provider allow-list and a sort key.
///
/// Immutable once built. A changed control means building a new spec.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FilterSpec {
    price: QuantityRange,
    data: QuantityRange,
    voice: QuantityRange,
    sms: QuantityRange,
    providers: Vec<String>,
    sort_by: Dimension,
    sort_order: SortOrder,
}

impl FilterSpec {
    pub fn builder() -> FilterSpecBuilder {
        FilterSpecBuilder::new()
    }

    /// Initial browse spec covering the whole catalog, cheapest first.
    pub fn from_bounds(bounds: &FilterBounds) -> Self {
        Self {
            price: bounds.price,
            data: bounds.data,
            voice: bounds.voice,
            sms: bounds.sms,
            providers: Vec::new(),
            sort_by: Dimension::Price,
            sort_order: SortOrder::Asc,
        }
    }

    pub fn range(&self, dimension: Dimension) -> QuantityRange {
        match dimension {
            Dimension::Price => self.price,
            Dimension::Data => self.data,
            Dimension::Voice => self.voice,
            Dimension::Sms => self.sms,
        }
    }

    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    pub fn sort_by(&self) -> Dimension {
        self.sort_by
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn matches(&self, plan: &Plan) -> bool {
        Dimension::ALL
            .iter()
            .all(|dimension| self.matches_dimension(plan, *dimension))
            && self.matches_provider(plan)
    }

    fn matches_dimension(&self, plan: &Plan, dimension: Dimension) -> bool {
        let range = self.range(dimension);
        if dimension == Dimension::Price {
            return range.contains(plan.normalized(Dimension::Price));
        }
        if plan.raw_field(dimension).is_none() {
            return false;
        }
        plan.is_unbounded(dimension) || range.contains(plan.normalized(dimension))
    }

    fn matches_provider(&self, plan: &Plan) -> bool {
        self.providers.is_empty() || self.providers.iter().any(|p| p == &plan.provider)
    }
}

#[derive(Debug, Clone)]
pub struct FilterSpecBuilder {
    ranges: [(f64, f64); 4],
    providers: Vec<String>,
    sort_by: Dimension,
    sort_order: SortOrder,
}

impl Default for FilterSpecBuilder {
    fn default() -> Self {
        let open = (0.0, f64::INFINITY);
        Self {
            ranges: [open; 4],
            providers: Vec::new(),
            sort_by: Dimension::Price,
            sort_order: SortOrder::Asc,
        }
    }
}

impl FilterSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing spec so a single control can be replaced.
    pub fn from_spec(spec: &FilterSpec) -> Self {
        let mut builder = Self::new();
        for dimension in Dimension::ALL {
            let range = spec.range(dimension);
            builder = builder.range(dimension, range.min(), range.max());
        }
        builder
            .providers(spec.providers.iter().cloned())
            .sort_by(spec.sort_by)
            .sort_order(spec.sort_order)
    }

    pub fn range(mut self, dimension: Dimension, min: f64, max: f64) -> Self {
        self.ranges[slot(dimension)] = (min, max);
        self
    }

    pub fn price(self, min: f64, max: f64) -> Self {
        self.range(Dimension::Price, min, max)
    }

    pub fn data(self, min: f64, max: f64) -> Self {
        self.range(Dimension::Data, min, max)
    }

    pub fn voice(self, min: f64, max: f64) -> Self {
        self.range(Dimension::Voice, min, max)
    }

    pub fn sms(self, min: f64, max: f64) -> Self {
        self.range(Dimension::Sms, min, max)
    }

    pub fn providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = providers.into_iter().map(Into::into).collect();
        self
    }

    pub fn sort_by(mut self, dimension: Dimension) -> Self {
        self.sort_by = dimension;
        self
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    pub fn build(self) -> FilterResult<FilterSpec> {
        let checked = |dimension: Dimension| {
            let (min, max) = self.ranges[slot(dimension)];
            QuantityRange::new(min, max).map_err(|_| FilterError::InvalidDimensionRange {
                dimension,
                min,
                max,
            })
        };
        Ok(FilterSpec {
            price: checked(Dimension::Price)?,
            data: checked(Dimension::Data)?,
            voice: checked(Dimension::Voice)?,
            sms: checked(Dimension::Sms)?,
            providers: self.providers,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        })
    }
}

fn slot(dimension: Dimension) -> usize {
    match dimension {
        Dimension::Price => 0,
        Dimension::Data => 1,
        Dimension::Voice => 2,
        Dimension::Sms => 3,
    }
}

/// Span of normalized values present in a catalog, plus its providers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FilterBounds {
    pub price: QuantityRange,
    pub data: QuantityRange,
    pub voice: QuantityRange,
    pub sms: QuantityRange,
    pub providers: Vec<String>,
}

impl FilterBounds {
    /// Missing quantity fields count as zero here, so the bounds cover every
    /// plan's displayed value even though the filter itself rejects them.
    ///
    /// An empty catalog yields the configured browse defaults.
    pub fn from_catalog(plans: &[Plan], defaults: &BrowseSection) -> Self {
        let span = |dimension: Dimension| {
            let values = plans.iter().map(|plan| plan.normalized(dimension));
            let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |acc, v| {
                (acc.0.min(v), acc.1.max(v))
            });
            if min > max {
                let (min, max) = defaults.range(dimension);
                QuantityRange { min, max }
            } else {
                QuantityRange { min, max }
            }
        };

        let mut providers: Vec<String> = Vec::new();
        for plan in plans {
            if !plan.provider.is_empty() && !providers.contains(&plan.provider) {
                providers.push(plan.provider.clone());
            }
        }

        Self {
            price: span(Dimension::Price),
            data: span(Dimension::Data),
            voice: span(Dimension::Voice),
            sms: span(Dimension::Sms),
            providers,
        }
    }

    pub fn range(&self, dimension: Dimension) -> QuantityRange {
        match dimension {
            Dimension::Price => self.price,
            Dimension::Data => self.data,
            Dimension::Voice => self.voice,
            Dimension::Sms => self.sms,
        }
    }
}

/// Filters `plans` by `spec` and orders the survivors by the spec's sort key.
///
/// Equal sort values keep their catalog order in both directions.
pub fn apply_filters(plans: &[Plan], spec: &FilterSpec) -> Vec<Plan> {
    let mut kept: Vec<(f64, &Plan)> = plans
        .iter()
        .filter(|plan| spec.matches(plan))
        .map(|plan| (plan.normalized(spec.sort_by), plan))
        .collect();

    kept.sort_by(|a, b| {
        let ordering = a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal);
        match spec.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    kept.into_iter().map(|(_, plan)| plan.clone()).collect()
}
