use regex::Regex;
use serde::Serialize;

/// Keywords sorted into the three buckets the catalog search understands.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeywordQuery {
    /// Lowercased provider names.
    pub providers: Vec<String>,
    /// Largest price mentioned, if any.
    pub max_cost: Option<f64>,
    /// Matched against package name, data and call minutes.
    pub terms: Vec<String>,
}

impl KeywordQuery {
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty() && self.max_cost.is_none() && self.terms.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    known_providers: Vec<String>,
    price_terms: Vec<String>,
    number: Regex,
}

impl KeywordClassifier {
    pub fn new<P, T>(known_providers: P, price_terms: T) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            known_providers: known_providers
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
            price_terms: price_terms
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
            number: Regex::new(r"\d+").expect("valid regex"),
        }
    }

    /// A keyword is a price hint when it contains a price term ("under 500")
    /// or is a bare number. The ceiling is the largest number among the
    /// hints; hints without digits only mark intent and set no ceiling.
    pub fn classify<S: AsRef<str>>(&self, keywords: &[S]) -> KeywordQuery {
        let mut query = KeywordQuery::default();
        let mut ceiling: Option<f64> = None;

        for keyword in keywords {
            let keyword = keyword.as_ref().trim();
            if keyword.is_empty() {
                continue;
            }
            let lowered = keyword.to_lowercase();

            if self.known_providers.contains(&lowered) {
                if !query.providers.contains(&lowered) {
                    query.providers.push(lowered);
                }
                continue;
            }

            let bare_number = keyword.chars().all(|c| c.is_ascii_digit());
            let price_hint = self.price_terms.iter().any(|term| lowered.contains(term));
            if bare_number || price_hint {
                let largest = self
                    .number
                    .find_iter(keyword)
                    .filter_map(|m| m.as_str().parse::<f64>().ok())
                    .fold(None, |acc: Option<f64>, value| {
                        Some(acc.map_or(value, |current| current.max(value)))
                    });
                if let Some(value) = largest {
                    ceiling = Some(ceiling.map_or(value, |current| current.max(value)));
                }
                continue;
            }

            query.terms.push(keyword.to_string());
        }

        query.max_cost = ceiling.filter(|value| *value > 0.0);
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new(
            ["Dhiraagu", "ooredoo"],
            ["less than", "under", "below", "cheaper than", "maximum", "max"],
        )
    }

    #[test]
    fn splits_providers_prices_and_terms() {
        let query = classifier().classify(&["Ooredoo", "under 500", "unlimited", "5GB"]);
        assert_eq!(query.providers, vec!["ooredoo"]);
        assert_eq!(query.max_cost, Some(500.0));
        assert_eq!(query.terms, vec!["unlimited", "5GB"]);
    }

    #[test]
    fn largest_price_wins_and_zero_is_ignored() {
        let query = classifier().classify(&["300", "below 450", "max"]);
        assert_eq!(query.max_cost, Some(450.0));
        assert!(query.terms.is_empty());

        let zero = classifier().classify(&["0"]);
        assert_eq!(zero.max_cost, None);
        assert!(zero.is_empty());
    }

    #[test]
    fn blank_keywords_are_skipped() {
        let query = classifier().classify(&["  ", "", "dhiraagu", "DHIRAAGU"]);
        assert_eq!(query.providers, vec!["dhiraagu"]);
        assert!(query.terms.is_empty());
    }
}
