//! Daily token usage tracking and budget enforcement.
//!
//! One record per calendar date, append-only per request; historical records
//! are immutable once the date rolls over. The policy (ceiling, warning
//! threshold, hard-block flag) is mutated only through explicit
//! administrative operations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::persist;

/// Budget decision for one incoming request.
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetStatus {
    /// Under the warning threshold.
    Ok,
    /// Approaching the ceiling; the request proceeds with a warning.
    Warning { message: String, remaining: u64 },
    /// Over the ceiling with hard limiting on; skip all backend calls.
    Blocked { message: String },
}

impl BudgetStatus {
    /// Whether the request may proceed.
    pub fn allowed(&self) -> bool {
        !matches!(self, BudgetStatus::Blocked { .. })
    }

    /// Warning text, if any.
    pub fn warning(&self) -> Option<&str> {
        match self {
            BudgetStatus::Warning { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Enforcement policy, persisted alongside the daily records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct UsagePolicy {
    pub daily_token_limit: u64,
    /// Fraction of the ceiling at which warnings start.
    pub warning_threshold: f64,
    pub hard_limit_enabled: bool,
}

impl Default for UsagePolicy {
    fn default() -> Self {
        Self {
            daily_token_limit: 100_000,
            warning_threshold: 0.8,
            hard_limit_enabled: false,
        }
    }
}

/// Consumption for one calendar date.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DailyUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub requests: u64,
}

impl DailyUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Estimated cost in USD. Display only — never used in gating.
    pub fn estimate_cost(&self, model: &str) -> f64 {
        // Prices per million tokens (input, output), keyed by name substring.
        let (input_price, output_price) = {
            let model = model.to_lowercase();
            if model.contains("haiku") {
                (0.80, 4.00)
            } else if model.contains("opus") {
                (15.00, 75.00)
            } else {
                (3.00, 15.00)
            }
        };
        (self.input_tokens as f64 / 1_000_000.0) * input_price
            + (self.output_tokens as f64 / 1_000_000.0) * output_price
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsageFile {
    #[serde(default)]
    daily: BTreeMap<NaiveDate, DailyUsage>,
    #[serde(default)]
    policy: UsagePolicy,
}

/// Tracks consumption against a rolling daily budget.
pub struct UsageTracker {
    path: PathBuf,
    state: UsageFile,
}

impl UsageTracker {
    /// Open the tracker, loading persisted history and policy.
    pub fn open(path: PathBuf) -> Self {
        let state = match persist::load_json::<UsageFile>(&path) {
            Ok(Some(state)) => {
                info!(days = state.daily.len(), "loaded usage data from {}", path.display());
                state
            }
            Ok(None) => UsageFile::default(),
            Err(e) => {
                warn!("failed to load usage data, starting empty: {e}");
                UsageFile::default()
            }
        };
        Self { path, state }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Append usage from a completed request and persist immediately.
    pub fn record_usage(&mut self, input_tokens: u64, output_tokens: u64) -> Result<()> {
        self.record_usage_on(Self::today(), input_tokens, output_tokens)
    }

    fn record_usage_on(
        &mut self,
        date: NaiveDate,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<()> {
        let entry = self.state.daily.entry(date).or_default();
        entry.input_tokens += input_tokens;
        entry.output_tokens += output_tokens;
        entry.requests += 1;
        self.save()?;
        debug!("recorded usage: +{input_tokens} input, +{output_tokens} output");
        Ok(())
    }

    /// Today's consumption (zeroed if nothing recorded yet).
    pub fn today_usage(&self) -> DailyUsage {
        self.usage_on(Self::today())
    }

    fn usage_on(&self, date: NaiveDate) -> DailyUsage {
        self.state.daily.get(&date).copied().unwrap_or_default()
    }

    /// Gate an incoming request against the daily budget.
    pub fn check_budget(&self) -> BudgetStatus {
        self.check_budget_on(Self::today())
    }

    fn check_budget_on(&self, date: NaiveDate) -> BudgetStatus {
        let policy = self.state.policy;
        if policy.daily_token_limit == 0 {
            return BudgetStatus::Ok;
        }

        let used = self.usage_on(date).total_tokens();
        let fraction = used as f64 / policy.daily_token_limit as f64;

        if policy.hard_limit_enabled && fraction >= 1.0 {
            return BudgetStatus::Blocked {
                message: format!(
                    "Daily token limit reached ({used}/{limit}). Try again tomorrow.",
                    limit = policy.daily_token_limit
                ),
            };
        }

        if fraction >= policy.warning_threshold {
            let remaining = policy.daily_token_limit.saturating_sub(used);
            return BudgetStatus::Warning {
                message: format!(
                    "Warning: {percent:.0}% of the daily token budget used ({remaining} tokens remaining)",
                    percent = fraction * 100.0
                ),
                remaining,
            };
        }

        BudgetStatus::Ok
    }

    /// Formatted usage summary for the admin command.
    pub fn summary(&self, model: &str) -> String {
        let usage = self.today_usage();
        let limit = self.state.policy.daily_token_limit;
        let percent = if limit > 0 {
            usage.total_tokens() as f64 / limit as f64 * 100.0
        } else {
            0.0
        };
        format!(
            "Today's usage:\n\
             - Requests: {requests}\n\
             - Input tokens: {input}\n\
             - Output tokens: {output}\n\
             - Total: {total} / {limit} ({percent:.1}%)\n\
             - Est. cost: ${cost:.4}",
            requests = usage.requests,
            input = usage.input_tokens,
            output = usage.output_tokens,
            total = usage.total_tokens(),
            cost = usage.estimate_cost(model),
        )
    }

    pub fn policy(&self) -> UsagePolicy {
        self.state.policy
    }

    /// Set the daily ceiling; takes effect on the next check.
    pub fn set_daily_limit(&mut self, limit: u64) -> Result<()> {
        self.state.policy.daily_token_limit = limit;
        self.save()
    }

    /// Toggle hard-limit enforcement.
    pub fn set_hard_limit(&mut self, enabled: bool) -> Result<()> {
        self.state.policy.hard_limit_enabled = enabled;
        self.save()
    }

    /// Reset today's counters to zero.
    pub fn reset_today(&mut self) -> Result<()> {
        self.state.daily.remove(&Self::today());
        self.save()
    }

    fn save(&self) -> Result<()> {
        persist::save_json(&self.path, &self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with(
        dir: &tempfile::TempDir,
        limit: u64,
        warning: f64,
        hard: bool,
    ) -> UsageTracker {
        let mut tracker = UsageTracker::open(dir.path().join("usage.json"));
        tracker.state.policy = UsagePolicy {
            daily_token_limit: limit,
            warning_threshold: warning,
            hard_limit_enabled: hard,
        };
        tracker
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()
    }

    #[test]
    fn test_under_warning_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker_with(&dir, 100, 0.8, false);
        tracker.record_usage_on(date(), 59, 20).unwrap();
        assert_eq!(tracker.check_budget_on(date()), BudgetStatus::Ok);
    }

    #[test]
    fn test_warning_between_threshold_and_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker_with(&dir, 100, 0.8, false);
        tracker.record_usage_on(date(), 60, 25).unwrap();
        let status = tracker.check_budget_on(date());
        assert!(status.allowed());
        assert!(status.warning().is_some_and(|w| w.contains("15 tokens remaining")));
    }

    #[test]
    fn test_hard_limit_blocks_at_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker_with(&dir, 100, 0.8, true);
        tracker.record_usage_on(date(), 80, 20).unwrap();
        let status = tracker.check_budget_on(date());
        assert!(!status.allowed());
        assert!(matches!(status, BudgetStatus::Blocked { message } if message.contains("tomorrow")));
    }

    #[test]
    fn test_soft_limit_only_warns_over_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker_with(&dir, 100, 0.8, false);
        tracker.record_usage_on(date(), 150, 0).unwrap();
        assert!(tracker.check_budget_on(date()).allowed());
    }

    #[test]
    fn test_one_record_per_date() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker_with(&dir, 1000, 0.8, false);
        tracker.record_usage_on(date(), 10, 5).unwrap();
        tracker.record_usage_on(date(), 20, 5).unwrap();
        let usage = tracker.usage_on(date());
        assert_eq!(usage.input_tokens, 30);
        assert_eq!(usage.output_tokens, 10);
        assert_eq!(usage.requests, 2);
        assert_eq!(tracker.state.daily.len(), 1);
    }

    #[test]
    fn test_cost_tiers_by_name_substring() {
        let usage = DailyUsage {
            input_tokens: 1_000_000,
            output_tokens: 1_000_000,
            requests: 1,
        };
        assert_eq!(usage.estimate_cost("claude-haiku-4-5"), 4.80);
        assert_eq!(usage.estimate_cost("claude-opus-4-1"), 90.00);
        // Unknown names fall into the middle tier.
        assert_eq!(usage.estimate_cost("claude-sonnet-4-5"), 18.00);
        assert_eq!(usage.estimate_cost("something-else"), 18.00);
    }

    #[test]
    fn test_policy_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        {
            let mut tracker = UsageTracker::open(path.clone());
            tracker.set_daily_limit(42_000).unwrap();
            tracker.set_hard_limit(true).unwrap();
        }
        let tracker = UsageTracker::open(path);
        assert_eq!(tracker.policy().daily_token_limit, 42_000);
        assert!(tracker.policy().hard_limit_enabled);
    }

    #[test]
    fn test_reset_today() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker_with(&dir, 100, 0.8, true);
        tracker.record_usage(500, 500).unwrap();
        assert!(!tracker.check_budget().allowed());
        tracker.reset_today().unwrap();
        assert_eq!(tracker.check_budget(), BudgetStatus::Ok);
        assert_eq!(tracker.today_usage().requests, 0);
    }
}
