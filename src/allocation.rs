//! Two-way budget split between channel A (meta) and channel B (snapchat).
//!
//! The split is computed in four deterministic steps:
//!   1. base shares proportional to efficiency (50/50 when there is no evidence)
//!   2. preference boost: +`preference_boost`, capped at `max_share`
//!   3. floor: a channel below `min_share` is clamped to it, the other gets the rest
//!   4. monetization: channel A is rounded to `rounding_step`, channel B takes
//!      the remainder so the amounts sum exactly to the budget
use std::fmt::{self, Write as FmtWrite};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregator::{self, EfficiencyFigure};
use crate::dataset::Dataset;
use crate::domain::{Channel, ChannelPreference, Kpi, Objective};
use crate::error::PlannerError;
use crate::schema::{allocation, efficiency};

// ── Policy ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationPolicy {
    /// Share added to the preferred channel (0.20 = 20 percentage points).
    pub preference_boost: f64,
    /// Lowest share any channel may receive.
    pub min_share: f64,
    /// Highest share any channel may receive.
    pub max_share: f64,
    /// Channel A's amount is rounded to a multiple of this.
    pub rounding_step: f64,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            preference_boost: 0.20,
            min_share: 0.15,
            max_share: 0.85,
            rounding_step: 100.0,
        }
    }
}

impl AllocationPolicy {
    pub fn validate(&self) -> Result<(), PlannerError> {
        if !(0.0..0.5).contains(&self.min_share) {
            return Err(PlannerError::Config(format!(
                "allocation.min_share must be in [0, 0.5), got {}",
                self.min_share
            )));
        }
        if (self.min_share + self.max_share - 1.0).abs() > 1e-9 {
            return Err(PlannerError::Config(format!(
                "allocation.min_share + allocation.max_share must equal 1, got {} + {}",
                self.min_share, self.max_share
            )));
        }
        if !(0.0..=1.0).contains(&self.preference_boost) {
            return Err(PlannerError::Config(format!(
                "allocation.preference_boost must be in [0, 1], got {}",
                self.preference_boost
            )));
        }
        if !(self.rounding_step > 0.0) {
            return Err(PlannerError::Config(format!(
                "allocation.rounding_step must be positive, got {}",
                self.rounding_step
            )));
        }
        Ok(())
    }
}

// ── Shares ──────────────────────────────────────────────────────────────────

/// Fractions of the budget per channel; always sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Split {
    pub meta: f64,
    pub snapchat: f64,
}

impl Split {
    pub const EVEN: Split = Split {
        meta: 0.5,
        snapchat: 0.5,
    };

    /// `channel` gets `share`, the other channel the complement.
    pub fn with_share(channel: Channel, share: f64) -> Self {
        match channel {
            Channel::Meta => Split {
                meta: share,
                snapchat: 1.0 - share,
            },
            Channel::Snapchat => Split {
                meta: 1.0 - share,
                snapchat: share,
            },
        }
    }

    pub fn share(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Meta => self.meta,
            Channel::Snapchat => self.snapchat,
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "meta {:.1}% / snapchat {:.1}%",
            self.meta * 100.0,
            self.snapchat * 100.0
        )
    }
}

/// Every intermediate split, so callers can show how the result was reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitTrace {
    pub base: Split,
    pub after_preference: Split,
    pub final_split: Split,
    /// No efficiency evidence for either channel; base is 50/50.
    pub no_evidence: bool,
    pub preference_applied: bool,
    pub floor_applied: bool,
}

/// Pure share computation over the two channel efficiencies. A non-finite
/// or negative efficiency counts as zero.
pub fn split_shares(
    meta_efficiency: f64,
    snapchat_efficiency: f64,
    preferred: Option<Channel>,
    policy: &AllocationPolicy,
) -> SplitTrace {
    let meta_efficiency = usable_efficiency(meta_efficiency);
    let snapchat_efficiency = usable_efficiency(snapchat_efficiency);
    let total = meta_efficiency + snapchat_efficiency;
    let no_evidence = !(total > 0.0);
    let base = if no_evidence {
        Split::EVEN
    } else {
        Split::with_share(Channel::Meta, meta_efficiency / total)
    };

    let after_preference = match preferred {
        Some(channel) => {
            let boosted = (base.share(channel) + policy.preference_boost).min(policy.max_share);
            Split::with_share(channel, boosted)
        }
        None => base,
    };

    let mut final_split = after_preference;
    let mut floor_applied = false;
    for channel in Channel::ALL {
        if final_split.share(channel) < policy.min_share {
            final_split = Split::with_share(channel, policy.min_share);
            floor_applied = true;
            break;
        }
    }

    SplitTrace {
        base,
        after_preference,
        final_split,
        no_evidence,
        preference_applied: preferred.is_some(),
        floor_applied,
    }
}

fn usable_efficiency(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ── Result ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reasoning {
    PreferredAndMoreEfficient,
    Preferred,
    MoreEfficient,
    Diversification,
}

impl Reasoning {
    pub fn classify(preferred: bool, more_efficient: bool) -> Self {
        match (preferred, more_efficient) {
            (true, true) => Reasoning::PreferredAndMoreEfficient,
            (true, false) => Reasoning::Preferred,
            (false, true) => Reasoning::MoreEfficient,
            (false, false) => Reasoning::Diversification,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Reasoning::PreferredAndMoreEfficient => "preferred channel + higher efficiency",
            Reasoning::Preferred => "preferred channel",
            Reasoning::MoreEfficient => "higher efficiency",
            Reasoning::Diversification => "diversification",
        }
    }
}

impl fmt::Display for Reasoning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAllocation {
    pub channel: Channel,
    pub efficiency: f64,
    pub metric_sum: f64,
    pub spend_sum: f64,
    pub allocated_amount: f64,
    /// Final policy share in percent (two decimals), before amount rounding.
    pub allocation_percent: f64,
    pub reasoning: Reasoning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResult {
    pub budget: f64,
    pub objective: Objective,
    pub kpi: Kpi,
    pub preference: Option<ChannelPreference>,
    /// Channel A first, channel B second.
    pub rows: Vec<ChannelAllocation>,
    pub trace: SplitTrace,
}

impl AllocationResult {
    pub fn row(&self, channel: Channel) -> Option<&ChannelAllocation> {
        self.rows.iter().find(|r| r.channel == channel)
    }

    pub fn total_allocated(&self) -> f64 {
        self.rows.iter().map(|r| r.allocated_amount).sum()
    }

    /// Output columns: channel, efficiency, allocated_amount,
    /// allocation_percent, reasoning.
    pub fn to_frame(&self) -> Result<DataFrame, PlannerError> {
        let df = df!(
            allocation::CHANNEL => self.rows.iter().map(|r| r.channel.as_str()).collect::<Vec<_>>(),
            efficiency::EFFICIENCY => self.rows.iter().map(|r| r.efficiency).collect::<Vec<_>>(),
            allocation::ALLOCATED_AMOUNT => self.rows.iter().map(|r| r.allocated_amount).collect::<Vec<_>>(),
            allocation::ALLOCATION_PERCENT => self.rows.iter().map(|r| r.allocation_percent).collect::<Vec<_>>(),
            allocation::REASONING => self.rows.iter().map(|r| r.reasoning.as_str()).collect::<Vec<_>>(),
        )?;
        Ok(df)
    }

    /// Human-readable walk through the data and each rule that fired.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        let kpi = self.kpi.as_str();
        let _ = writeln!(
            out,
            "Allocation for a {} campaign (KPI: {}), budget {}:",
            self.objective,
            kpi,
            format_amount(self.budget)
        );
        for row in &self.rows {
            let _ = writeln!(
                out,
                "- {}: {:.4} {} per unit spent ({} {} from {} spend)",
                row.channel,
                row.efficiency,
                kpi,
                format_amount(row.metric_sum),
                kpi,
                format_amount(row.spend_sum)
            );
        }

        let trace = &self.trace;
        if trace.no_evidence {
            let _ = writeln!(out, "No {kpi} recorded for either channel: starting from an even split.");
        } else {
            let _ = writeln!(out, "Base split from efficiency: {}", trace.base);
        }
        match self.preference {
            Some(ChannelPreference::Channel(channel)) => {
                let _ = writeln!(
                    out,
                    "Preference for {channel}: boosted, capped -> {}",
                    trace.after_preference
                );
            }
            Some(ChannelPreference::NoPreference) | None => {
                let _ = writeln!(out, "No channel preference: efficiency split kept.");
            }
        }
        if trace.floor_applied {
            let _ = writeln!(
                out,
                "Minimum share per channel enforced -> {}",
                trace.final_split
            );
        }
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{}: {} ({:.1}%) - {}",
                row.channel,
                format_amount(row.allocated_amount),
                row.allocation_percent,
                row.reasoning
            );
        }
        out
    }
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// Split `budget` between the two channels for `objective`.
///
/// Checks run in order: budget, objective, then efficiency lookup. A channel
/// with no rows for the objective's KPI counts as zero efficiency, and so
/// does the whole dataset when no row carries that KPI.
pub fn allocate(
    dataset: &Dataset,
    budget: f64,
    objective: &str,
    preference: Option<ChannelPreference>,
    policy: &AllocationPolicy,
) -> Result<AllocationResult, PlannerError> {
    if !(budget > 0.0) || !budget.is_finite() {
        return Err(PlannerError::InvalidBudget(budget));
    }
    let objective: Objective = objective.parse()?;
    let kpi = objective.kpi();

    let figures = match aggregator::aggregate(dataset, kpi) {
        Ok(figures) => figures,
        Err(PlannerError::EmptyResult(reason)) => {
            warn!(%reason, "no efficiency data, falling back to an even split");
            Default::default()
        }
        Err(e) => return Err(e),
    };
    let figure = |c: Channel| {
        figures
            .get(c.as_str())
            .copied()
            .unwrap_or(EfficiencyFigure::ZERO)
    };
    let meta = figure(Channel::Meta);
    let snapchat = figure(Channel::Snapchat);

    let preferred = preference.and_then(ChannelPreference::channel);
    let trace = split_shares(meta.efficiency, snapchat.efficiency, preferred, policy);

    let meta_amount = round_to_step(budget * trace.final_split.meta, policy.rounding_step)
        .clamp(0.0, budget);
    let snapchat_amount = budget - meta_amount;

    let rows = [
        (Channel::Meta, meta, meta_amount),
        (Channel::Snapchat, snapchat, snapchat_amount),
    ]
    .into_iter()
    .map(|(channel, fig, amount)| {
        let other = if channel == Channel::Meta { snapchat } else { meta };
        ChannelAllocation {
            channel,
            efficiency: fig.efficiency,
            metric_sum: fig.metric_sum,
            spend_sum: fig.spend_sum,
            allocated_amount: amount,
            allocation_percent: percent(trace.final_split.share(channel)),
            reasoning: Reasoning::classify(
                preferred == Some(channel),
                fig.efficiency > other.efficiency,
            ),
        }
    })
    .collect();

    info!(
        budget,
        objective = %objective,
        meta_share = trace.final_split.meta,
        snapchat_share = trace.final_split.snapchat,
        preference_applied = trace.preference_applied,
        floor_applied = trace.floor_applied,
        "computed spend split"
    );

    Ok(AllocationResult {
        budget,
        objective,
        kpi,
        preference,
        rows,
        trace,
    })
}

fn round_to_step(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

fn percent(share: f64) -> f64 {
    (share * 10_000.0).round() / 100.0
}

// ── Proportional split ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProportionalShare {
    pub source: String,
    pub efficiency: f64,
    pub allocated_budget: f64,
}

/// Simplified mode: spread `budget` across the `top_n` most efficient
/// channels in proportion to efficiency, with no preference, floor or
/// rounding. Even split when every efficiency is zero.
pub fn proportional_split(
    dataset: &Dataset,
    budget: f64,
    kpi: &str,
    top_n: usize,
) -> Result<Vec<ProportionalShare>, PlannerError> {
    if !(budget > 0.0) || !budget.is_finite() {
        return Err(PlannerError::InvalidBudget(budget));
    }
    let kpi: Kpi = kpi.parse()?;

    let mut ranked: Vec<(String, f64)> = aggregator::aggregate(dataset, kpi)?
        .into_iter()
        .map(|(source, fig)| (source, fig.efficiency))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_n);
    if ranked.is_empty() {
        return Err(PlannerError::EmptyResult("top_n is zero".into()));
    }

    let total: f64 = ranked.iter().map(|(_, e)| e).sum();
    let count = ranked.len() as f64;
    Ok(ranked
        .into_iter()
        .map(|(source, efficiency)| {
            let share = if total > 0.0 {
                efficiency / total
            } else {
                1.0 / count
            };
            ProportionalShare {
                source,
                efficiency,
                allocated_budget: share * budget,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tests::sample_dataset;
    use crate::dataset::CampaignRecord;
    use crate::error::ErrorKind;

    fn policy() -> AllocationPolicy {
        AllocationPolicy::default()
    }

    fn two_channel_dataset(meta: (f64, f64), snapchat: (f64, f64)) -> Dataset {
        Dataset::from_records(&[
            CampaignRecord::new("meta", "conversion", "leads", meta.1, meta.0, 0.0),
            CampaignRecord::new("snapchat", "conversion", "leads", snapchat.1, snapchat.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn dominant_channel_is_floored_to_85_15() {
        let ds = two_channel_dataset((2145.0, 9400.0), (0.0, 2650.0));
        let result = allocate(&ds, 15000.0, "conversion", None, &policy()).unwrap();

        let trace = result.trace;
        assert_eq!(trace.base.meta, 1.0);
        assert!(trace.floor_applied);
        assert!((trace.final_split.meta - 0.85).abs() < 1e-9);
        assert!((trace.final_split.snapchat - 0.15).abs() < 1e-9);

        let meta = result.row(Channel::Meta).unwrap();
        assert!((meta.efficiency - 0.228).abs() < 1e-3);
        assert_eq!(meta.allocated_amount, 12800.0);
        assert_eq!(meta.reasoning, Reasoning::MoreEfficient);
        let snap = result.row(Channel::Snapchat).unwrap();
        assert_eq!(snap.allocated_amount, 2200.0);
        assert_eq!(snap.reasoning, Reasoning::Diversification);
        assert_eq!(result.total_allocated(), 15000.0);
    }

    #[test]
    fn preferred_dominant_channel_stays_within_band() {
        let ds = two_channel_dataset((2145.0, 9400.0), (0.0, 2650.0));
        let pref = Some(ChannelPreference::Channel(Channel::Meta));
        let result = allocate(&ds, 15000.0, "conversion", pref, &policy()).unwrap();

        let meta = result.row(Channel::Meta).unwrap();
        assert!((meta.allocation_percent - 85.0).abs() < 1e-9);
        assert_eq!(meta.reasoning, Reasoning::PreferredAndMoreEfficient);
        assert_eq!(meta.allocated_amount % 100.0, 0.0);
        assert_eq!(result.total_allocated(), 15000.0);
    }

    #[test]
    fn preference_for_weaker_channel_boosts_it() {
        // meta 0.6, snapchat 0.4 by efficiency
        let ds = two_channel_dataset((60.0, 100.0), (40.0, 100.0));
        let pref = Some(ChannelPreference::Channel(Channel::Snapchat));
        let result = allocate(&ds, 10000.0, "conversion", pref, &policy()).unwrap();

        assert!((result.trace.final_split.snapchat - 0.6).abs() < 1e-9);
        assert!(!result.trace.floor_applied);
        assert_eq!(result.row(Channel::Meta).unwrap().allocated_amount, 4000.0);
        assert_eq!(result.row(Channel::Snapchat).unwrap().allocated_amount, 6000.0);
        assert_eq!(
            result.row(Channel::Snapchat).unwrap().reasoning,
            Reasoning::Preferred
        );
        assert_eq!(
            result.row(Channel::Meta).unwrap().reasoning,
            Reasoning::MoreEfficient
        );
    }

    #[test]
    fn floor_supersedes_preference() {
        // Preferring snapchat with zero efficiency: the 0.2 boost alone clears the floor
        let trace = split_shares(1.0, 0.0, Some(Channel::Snapchat), &policy());
        assert!((trace.after_preference.snapchat - 0.2).abs() < 1e-9);
        assert!(!trace.floor_applied);

        let mut strict = policy();
        strict.preference_boost = 0.05;
        let trace = split_shares(1.0, 0.0, Some(Channel::Snapchat), &strict);
        assert!(trace.floor_applied);
        assert!((trace.final_split.snapchat - 0.15).abs() < 1e-9);
    }

    #[test]
    fn boost_is_capped() {
        for base in [0.66, 0.7, 0.8, 0.9, 1.0] {
            let trace = split_shares(base, 1.0 - base, Some(Channel::Meta), &policy());
            assert!(trace.final_split.meta <= 0.85 + 1e-12);
            assert!(trace.final_split.snapchat >= 0.15 - 1e-12);
        }
    }

    #[test]
    fn no_evidence_starts_even() {
        let trace = split_shares(0.0, 0.0, None, &policy());
        assert!(trace.no_evidence);
        assert_eq!(trace.final_split, Split::EVEN);

        let trace = split_shares(0.0, 0.0, Some(Channel::Snapchat), &policy());
        assert!((trace.final_split.snapchat - 0.7).abs() < 1e-9);
    }

    #[test]
    fn non_finite_efficiency_counts_as_zero() {
        let trace = split_shares(f64::INFINITY, 0.5, None, &policy());
        assert!(trace.final_split.meta.is_finite());
        assert!((trace.final_split.meta - 0.15).abs() < 1e-9);
        assert!((trace.final_split.snapchat - 0.85).abs() < 1e-9);

        let trace = split_shares(f64::NAN, f64::NAN, Some(Channel::Meta), &policy());
        assert!(trace.no_evidence);
        assert!((trace.final_split.meta - 0.7).abs() < 1e-9);
    }

    #[test]
    fn swapping_efficiencies_swaps_shares() {
        for (a, b) in [(0.1, 0.3), (2.0, 0.5), (0.0, 1.0), (0.25, 0.25), (7.0, 0.01)] {
            let forward = split_shares(a, b, None, &policy()).final_split;
            let reverse = split_shares(b, a, None, &policy()).final_split;
            assert!((forward.meta - reverse.snapchat).abs() < 1e-12);
            assert!((forward.snapchat - reverse.meta).abs() < 1e-12);
        }
    }

    #[test]
    fn amounts_sum_exactly_and_respect_band() {
        let ds = two_channel_dataset((30.0, 100.0), (5.0, 100.0));
        let prefs = [
            None,
            Some(ChannelPreference::NoPreference),
            Some(ChannelPreference::Channel(Channel::Meta)),
            Some(ChannelPreference::Channel(Channel::Snapchat)),
        ];
        for budget in (1..=200).map(|i| i as f64 * 137.0) {
            for pref in prefs {
                let result = allocate(&ds, budget, "conversion", pref, &policy()).unwrap();
                assert_eq!(result.total_allocated(), budget);
                for row in &result.rows {
                    assert!(row.allocated_amount >= 0.15 * budget - 100.0);
                    assert!(row.allocated_amount <= 0.85 * budget + 100.0);
                    assert!(row.allocation_percent >= 15.0 - 1e-9);
                    assert!(row.allocation_percent <= 85.0 + 1e-9);
                }
            }
        }
    }

    #[test]
    fn invalid_budget_is_rejected_before_objective() {
        let ds = sample_dataset();
        for budget in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let err = allocate(&ds, budget, "awareness", None, &policy()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidBudget);
        }
    }

    #[test]
    fn unsupported_objective() {
        let err = allocate(&sample_dataset(), 1000.0, "awareness", None, &policy()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedObjective);
        assert!(err.to_string().contains("conversion, traffic"));
    }

    #[test]
    fn missing_kpi_rows_fall_back_to_even_split() {
        let ds = Dataset::from_records(&[CampaignRecord::new(
            "meta", "traffic", "clicks", 100.0, 0.0, 50.0,
        )])
        .unwrap();
        let result = allocate(&ds, 1000.0, "conversion", None, &policy()).unwrap();
        assert!(result.trace.no_evidence);
        assert_eq!(result.row(Channel::Meta).unwrap().allocated_amount, 500.0);
        assert_eq!(result.row(Channel::Snapchat).unwrap().allocated_amount, 500.0);
    }

    #[test]
    fn frame_and_explanation() {
        let pref = Some(ChannelPreference::Channel(Channel::Meta));
        let result = allocate(&sample_dataset(), 15000.0, "conversion", pref, &policy()).unwrap();

        let df = result.to_frame().unwrap();
        assert_eq!(df.height(), 2);
        let amounts = df
            .column(allocation::ALLOCATED_AMOUNT)
            .unwrap()
            .f64()
            .unwrap();
        assert_eq!(amounts.get(0), Some(12800.0));

        let text = result.explain();
        assert!(text.contains("conversion campaign"));
        assert!(text.contains("Preference for meta"));
        assert!(!text.contains("Minimum share per channel enforced"));
        assert!(text.contains("diversification"));
    }

    #[test]
    fn policy_validation() {
        assert!(policy().validate().is_ok());
        let bad = AllocationPolicy {
            min_share: 0.2,
            ..policy()
        };
        assert_eq!(bad.validate().unwrap_err().kind(), ErrorKind::Config);
        let bad = AllocationPolicy {
            rounding_step: 0.0,
            ..policy()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn proportional_split_follows_efficiency() {
        let ds = two_channel_dataset((30.0, 100.0), (10.0, 100.0));
        let shares = proportional_split(&ds, 1000.0, "leads", 3).unwrap();
        assert_eq!(shares[0].source, "meta");
        assert!((shares[0].allocated_budget - 750.0).abs() < 1e-9);
        assert!((shares[1].allocated_budget - 250.0).abs() < 1e-9);

        let err = proportional_split(&ds, 1000.0, "impressions", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownKpi);
    }

    #[test]
    fn proportional_split_without_evidence_is_even() {
        let ds = two_channel_dataset((0.0, 100.0), (0.0, 100.0));
        let shares = proportional_split(&ds, 900.0, "leads", 3).unwrap();
        assert!(shares.iter().all(|s| (s.allocated_budget - 450.0).abs() < 1e-9));
    }
}
