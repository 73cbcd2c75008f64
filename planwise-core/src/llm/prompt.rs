use std::collections::HashSet;

use regex::Regex;

use crate::plan::Plan;

/// Reply the analysis prompt asks for when a question is not about plans.
pub const OFF_TOPIC_REPLY: &str = "INVALID";

const RANKING_INSTRUCTIONS: &str = "Instructions for ranking plans:
1. If the user asks for \"best package\" or similar general queries:
   - Consider the overall value (cost vs features)
   - Prioritize plans with good data, call minutes, and SMS allocation
   - Consider the provider's network quality and reliability
2. If the user asks about a specific feature (for example free SMS, data or calls):
   - Prioritize plans with a higher allocation of that feature
   - Consider the cost-to-feature ratio
3. For specific requirements:
   - Match the user's stated needs (data, calls, SMS, cost, etc.)
   - Consider the overall value proposition";

/// Renders one plan as the 1-indexed record the oracle sees.
pub fn plan_record(position: usize, plan: &Plan) -> String {
    format!(
        "Plan {position}:\nProvider: {}\nName: {}\nCost: {}\nData: {}\nCalls: {}\nSMS: {}",
        plan.provider,
        plan.package_name,
        plan.cost,
        plan.total_data.as_deref().unwrap_or(""),
        plan.local_calls_mins.as_deref().unwrap_or(""),
        plan.local_sms.as_deref().unwrap_or(""),
    )
}

pub fn build_ranking_prompt(question: &str, plans: &[Plan]) -> String {
    let records = plans
        .iter()
        .enumerate()
        .map(|(idx, plan)| plan_record(idx + 1, plan))
        .collect::<Vec<_>>()
        .join("\n\n");
    let example = (1..=plans.len().min(8))
        .rev()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "A user asked: \"{question}\"\nHere are some postpaid plans:\n{records}\n\n\
         {RANKING_INSTRUCTIONS}\n\n\
         Rank ALL {count} plans from most to least relevant based on these criteria. \
         Respond ONLY with the plan numbers 1 to {count} in order of relevance, \
         separated by commas (e.g., {example}).",
        count = plans.len(),
    )
}

pub fn build_analysis_prompt(question: &str) -> String {
    format!(
        "Analyze this question about postpaid mobile packages and extract key terms related to:
        - Provider names
        - Data requirements (e.g., 5GB, unlimited)
        - Call minutes (e.g., 100 mins, unlimited)
        - SMS requirements
        - Budget/cost preferences (e.g., under 500)
        - Any specific features (rollover, credit limit)

        Only respond with relevant terms separated by commas. If the question is not about postpaid packages, respond with \"{OFF_TOPIC_REPLY}\":
        Question: {question}"
    )
}

/// Pulls 1-based plan numbers out of a free-form reply.
#[derive(Debug, Clone)]
pub struct ReplyParser {
    digits: Regex,
}

impl Default for ReplyParser {
    fn default() -> Self {
        Self {
            digits: Regex::new(r"[0-9]+").expect("valid regex"),
        }
    }
}

impl ReplyParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every run of decimal digits, in order of appearance. Runs too long to
    /// fit a `usize` can never be a valid index and are skipped.
    pub fn indices(&self, reply: &str) -> Vec<usize> {
        self.digits
            .find_iter(reply)
            .filter_map(|m| m.as_str().parse::<usize>().ok())
            .collect()
    }

    /// Maps indices back to plans, dropping out-of-range and repeated ones.
    pub fn select<'a>(&self, indices: &[usize], plans: &'a [Plan]) -> Vec<&'a Plan> {
        let mut seen = HashSet::new();
        indices
            .iter()
            .filter(|idx| **idx >= 1 && **idx <= plans.len())
            .filter(|idx| seen.insert(**idx))
            .map(|idx| &plans[idx - 1])
            .collect()
    }
}

/// Splits an analysis reply into trimmed, non-empty terms.
pub fn parse_terms(reply: &str) -> Vec<String> {
    reply
        .split(|c| c == ',' || c == '\n')
        .map(|term| term.trim().trim_start_matches('-').trim())
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}
