use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::normalize::{is_unbounded, normalize, normalize_cost, Dimension};

/// A postpaid offering as stored in the catalog.
///
/// Quantity fields are kept verbatim; use [`Plan::normalized`] for anything
/// numeric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    #[serde(default)]
    pub id: String,
    pub provider: String,
    pub package_name: String,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub total_data: Option<String>,
    #[serde(default)]
    pub data_breakdown: Option<String>,
    #[serde(default)]
    pub local_calls_mins: Option<String>,
    #[serde(default)]
    pub network_calls_mins: Option<String>,
    #[serde(default)]
    pub local_sms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Plan {
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        package_name: impl Into<String>,
        cost: f64,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            package_name: package_name.into(),
            cost,
            total_data: None,
            data_breakdown: None,
            local_calls_mins: None,
            network_calls_mins: None,
            local_sms: None,
            updated_at: None,
        }
    }

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let updated_at: Option<NaiveDateTime> = row.get("updated_at")?;
        Ok(Self {
            id: row.get("id")?,
            provider: row.get::<_, Option<String>>("provider")?.unwrap_or_default(),
            package_name: row
                .get::<_, Option<String>>("package_name")?
                .unwrap_or_default(),
            cost: row.get::<_, Option<f64>>("cost")?.unwrap_or(0.0),
            total_data: row.get("total_data")?,
            data_breakdown: row.get("data_breakdown")?,
            local_calls_mins: row.get("local_calls_mins")?,
            network_calls_mins: row.get("network_calls_mins")?,
            local_sms: row.get("local_sms")?,
            updated_at: updated_at.map(|dt| Utc.from_utc_datetime(&dt)),
        })
    }

    /// Raw text behind a quantity dimension, `None` when absent or empty.
    ///
    /// Price is numeric and has no raw text.
    pub fn raw_field(&self, dimension: Dimension) -> Option<&str> {
        let raw = match dimension {
            Dimension::Price => None,
            Dimension::Data => self.total_data.as_deref(),
            Dimension::Voice => self.local_calls_mins.as_deref(),
            Dimension::Sms => self.local_sms.as_deref(),
        };
        raw.filter(|value| !value.is_empty())
    }

    pub fn normalized(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Price => normalize_cost(self.cost),
            other => normalize(other, self.raw_field(other)),
        }
    }

    pub fn is_unbounded(&self, dimension: Dimension) -> bool {
        self.raw_field(dimension)
            .map(|raw| is_unbounded(dimension, raw))
            .unwrap_or(false)
    }

    /// The data breakdown when it says more than the headline figure.
    pub fn data_breakdown_detail(&self) -> Option<&str> {
        let breakdown = self.data_breakdown.as_deref()?.trim();
        if breakdown.is_empty() {
            return None;
        }
        let total = self.total_data.as_deref().unwrap_or("").trim();
        if breakdown.to_lowercase() == total.to_lowercase() {
            None
        } else {
            Some(breakdown)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanImportRecord {
    #[serde(flatten)]
    pub plan: Plan,
    #[serde(default)]
    pub overwrite: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_read_as_absent() {
        let mut plan = Plan::new("p1", "Ooredoo", "Smart", 350.0);
        plan.local_sms = Some(String::new());
        plan.total_data = Some("25 GB".into());
        assert_eq!(plan.raw_field(Dimension::Sms), None);
        assert_eq!(plan.raw_field(Dimension::Data), Some("25 GB"));
        assert_eq!(plan.raw_field(Dimension::Price), None);
        assert_eq!(plan.normalized(Dimension::Sms), 0.0);
        assert_eq!(plan.normalized(Dimension::Data), 25.0);
        assert_eq!(plan.normalized(Dimension::Price), 350.0);
    }

    #[test]
    fn breakdown_detail_hidden_when_it_repeats_total() {
        let mut plan = Plan::new("p1", "Dhiraagu", "Plus", 499.0);
        plan.total_data = Some("40GB".into());
        plan.data_breakdown = Some(" 40gb ".into());
        assert_eq!(plan.data_breakdown_detail(), None);

        plan.data_breakdown = Some("30GB anytime + 10GB night".into());
        assert_eq!(
            plan.data_breakdown_detail(),
            Some("30GB anytime + 10GB night")
        );

        plan.data_breakdown = Some("   ".into());
        assert_eq!(plan.data_breakdown_detail(), None);
    }

    #[test]
    fn import_record_reads_flat_json() {
        let record: PlanImportRecord = serde_json::from_str(
            r#"{"id":"x","provider":"Ooredoo","package_name":"Max","cost":899,"local_sms":"Unlimited"}"#,
        )
        .unwrap();
        assert!(!record.overwrite);
        assert_eq!(record.plan.cost, 899.0);
        assert!(record.plan.is_unbounded(Dimension::Sms));
        assert!(!record.plan.is_unbounded(Dimension::Data));
    }
}
