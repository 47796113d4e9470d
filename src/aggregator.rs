use std::collections::BTreeMap;

use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::dataset::Dataset;
use crate::domain::Kpi;
use crate::error::PlannerError;
use crate::schema::{campaign, derived, efficiency, summary};

/// Per-channel totals for one KPI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EfficiencyFigure {
    pub metric_sum: f64,
    pub spend_sum: f64,
    /// Metric units per currency unit; 0 when nothing was spent.
    pub efficiency: f64,
}

impl EfficiencyFigure {
    pub const ZERO: EfficiencyFigure = EfficiencyFigure {
        metric_sum: 0.0,
        spend_sum: 0.0,
        efficiency: 0.0,
    };
}

// ── Efficiency ──────────────────────────────────────────────────────────────

/// Rows whose `kpi` tag matches, grouped by channel.
///
/// Output columns: source, metric_sum, spend_sum, efficiency (sorted by source).
pub fn efficiency_table(dataset: &Dataset, kpi: Kpi) -> Result<DataFrame, PlannerError> {
    let df = dataset
        .frame()
        .clone()
        .lazy()
        .filter(
            col(campaign::KPI)
                .eq(lit(kpi.as_str()))
                .and(col(campaign::SOURCE).is_not_null()),
        )
        .group_by([col(campaign::SOURCE)])
        .agg([
            col(kpi.metric_column()).sum().alias(efficiency::METRIC_SUM),
            col(campaign::SPENDS).sum().alias(efficiency::SPEND_SUM),
        ])
        .with_column(
            // Zero spend means zero demonstrated efficiency, not a division error
            when(col(efficiency::SPEND_SUM).gt(lit(0.0)))
                .then(col(efficiency::METRIC_SUM) / col(efficiency::SPEND_SUM))
                .otherwise(lit(0.0))
                .alias(efficiency::EFFICIENCY),
        )
        .sort([campaign::SOURCE], SortMultipleOptions::default())
        .collect()?;

    if df.height() == 0 {
        return Err(PlannerError::EmptyResult(format!(
            "no rows with kpi '{}'",
            kpi.as_str()
        )));
    }
    Ok(df)
}

/// Efficiency figures keyed by channel name.
pub fn aggregate(
    dataset: &Dataset,
    kpi: Kpi,
) -> Result<BTreeMap<String, EfficiencyFigure>, PlannerError> {
    let df = efficiency_table(dataset, kpi)?;

    let sources = df.column(campaign::SOURCE)?.str()?;
    let metric = df.column(efficiency::METRIC_SUM)?.f64()?;
    let spend = df.column(efficiency::SPEND_SUM)?.f64()?;
    let eff = df.column(efficiency::EFFICIENCY)?.f64()?;

    let mut figures = BTreeMap::new();
    for i in 0..df.height() {
        let source = sources
            .get(i)
            .ok_or_else(|| PlannerError::General(format!("Null source at row {i}")))?;
        figures.insert(
            source.to_string(),
            EfficiencyFigure {
                metric_sum: metric.get(i).unwrap_or(0.0),
                spend_sum: spend.get(i).unwrap_or(0.0),
                efficiency: eff.get(i).unwrap_or(0.0),
            },
        );
    }

    debug!(kpi = %kpi, channels = figures.len(), "aggregated efficiency");
    Ok(figures)
}

/// Channels ranked by efficiency (descending), at most `top_n` rows.
pub fn top_channels_by_kpi(
    dataset: &Dataset,
    kpi: &str,
    top_n: usize,
) -> Result<DataFrame, PlannerError> {
    let kpi: Kpi = kpi.parse()?;
    let df = efficiency_table(dataset, kpi)?
        .lazy()
        .sort(
            [efficiency::EFFICIENCY, campaign::SOURCE],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .limit(IdxSize::try_from(top_n).unwrap_or(IdxSize::MAX))
        .collect()?;
    Ok(df)
}

// ── Descriptive ─────────────────────────────────────────────────────────────

/// Per-channel totals and mean unit costs, sorted by spend descending.
///
/// Output columns: source, total_spend, mean_cost_per_lead,
/// mean_cost_per_click, total_leads, total_clicks.
/// Null unit costs (zero leads/clicks) are skipped by the means.
pub fn summarize(dataset: &Dataset) -> Result<DataFrame, PlannerError> {
    let df = dataset
        .frame()
        .clone()
        .lazy()
        .filter(col(campaign::SOURCE).is_not_null())
        .group_by([col(campaign::SOURCE)])
        .agg([
            col(campaign::SPENDS).sum().alias(summary::TOTAL_SPEND),
            col(derived::COST_PER_LEAD)
                .mean()
                .alias(summary::MEAN_COST_PER_LEAD),
            col(derived::COST_PER_CLICK)
                .mean()
                .alias(summary::MEAN_COST_PER_CLICK),
            col(campaign::LEADS).sum().alias(summary::TOTAL_LEADS),
            col(campaign::AD_CLICKS).sum().alias(summary::TOTAL_CLICKS),
        ])
        .sort(
            [summary::TOTAL_SPEND, campaign::SOURCE],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()?;
    Ok(df)
}

/// Rows whose objective matches case-insensitively.
pub fn filter_by_objective(dataset: &Dataset, objective: &str) -> Result<DataFrame, PlannerError> {
    let wanted = objective.trim().to_lowercase();
    let df = dataset
        .frame()
        .clone()
        .lazy()
        .filter(col(campaign::OBJECTIVE).eq(lit(wanted.as_str())))
        .collect()?;

    if df.height() == 0 {
        return Err(PlannerError::UnknownObjective(objective.to_string()));
    }
    Ok(df)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dataset::CampaignRecord;
    use crate::error::ErrorKind;

    /// Meta: 2145 leads from $9400 on lead campaigns; Snapchat: no lead
    /// campaigns, only traffic.
    pub(crate) fn sample_dataset() -> Dataset {
        Dataset::from_records(&[
            CampaignRecord::new("Meta", "Conversion", "leads", 5000.0, 1200.0, 9000.0),
            CampaignRecord::new("Meta", "Conversion", "leads", 4400.0, 945.0, 7000.0),
            CampaignRecord::new("Meta", "Traffic", "clicks", 1000.0, 0.0, 20000.0),
            CampaignRecord::new("Snapchat", "Traffic", "clicks", 2650.0, 0.0, 207620.0),
        ])
        .unwrap()
    }

    #[test]
    fn aggregate_leads_matches_hand_computation() {
        let figures = aggregate(&sample_dataset(), Kpi::Leads).unwrap();
        assert_eq!(figures.len(), 1);
        let meta = figures["meta"];
        assert_eq!(meta.metric_sum, 2145.0);
        assert_eq!(meta.spend_sum, 9400.0);
        assert!((meta.efficiency - 0.228).abs() < 1e-3);
        assert!(!figures.contains_key("snapchat"));
    }

    #[test]
    fn aggregate_clicks_uses_ad_clicks_column() {
        let figures = aggregate(&sample_dataset(), Kpi::Clicks).unwrap();
        assert_eq!(figures["meta"].metric_sum, 20000.0);
        assert!((figures["snapchat"].efficiency - 207620.0 / 2650.0).abs() < 1e-9);
    }

    #[test]
    fn zero_spend_yields_zero_efficiency() {
        let ds = Dataset::from_records(&[CampaignRecord::new(
            "meta", "conversion", "leads", 0.0, 10.0, 0.0,
        )])
        .unwrap();
        let figures = aggregate(&ds, Kpi::Leads).unwrap();
        assert_eq!(figures["meta"].efficiency, 0.0);
    }

    #[test]
    fn no_matching_kpi_rows_is_empty_result() {
        let ds = Dataset::from_records(&[CampaignRecord::new(
            "meta", "traffic", "clicks", 10.0, 0.0, 10.0,
        )])
        .unwrap();
        let err = aggregate(&ds, Kpi::Leads).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn top_channels_ranks_by_efficiency() {
        let df = top_channels_by_kpi(&sample_dataset(), "clicks", 3).unwrap();
        let sources = df.column(campaign::SOURCE).unwrap().str().unwrap();
        assert_eq!(sources.get(0), Some("snapchat"));
        assert_eq!(sources.get(1), Some("meta"));

        let top_one = top_channels_by_kpi(&sample_dataset(), "clicks", 1).unwrap();
        assert_eq!(top_one.height(), 1);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn huge_top_n_keeps_every_channel() {
        // 2^32 would wrap to 0 in a 32-bit index
        let df = top_channels_by_kpi(&sample_dataset(), "clicks", 1usize << 32).unwrap();
        assert_eq!(df.height(), 2);
        let df = top_channels_by_kpi(&sample_dataset(), "clicks", usize::MAX).unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn top_channels_rejects_unknown_kpi() {
        let err = top_channels_by_kpi(&sample_dataset(), "impressions", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownKpi);
        assert!(err.to_string().contains("leads, clicks"));
    }

    #[test]
    fn summarize_sorts_by_spend() {
        let df = summarize(&sample_dataset()).unwrap();
        let sources = df.column(campaign::SOURCE).unwrap().str().unwrap();
        assert_eq!(sources.get(0), Some("meta"));

        let spend = df.column(summary::TOTAL_SPEND).unwrap().f64().unwrap();
        assert_eq!(spend.get(0), Some(10400.0));
        assert_eq!(spend.get(1), Some(2650.0));

        // Snapchat never produced a lead, so its mean cost per lead is null
        let cpl = df.column(summary::MEAN_COST_PER_LEAD).unwrap().f64().unwrap();
        assert_eq!(cpl.get(1), None);
        let clicks = df.column(summary::TOTAL_CLICKS).unwrap().f64().unwrap();
        assert_eq!(clicks.get(1), Some(207620.0));
    }

    #[test]
    fn filter_by_objective_is_case_insensitive() {
        let df = filter_by_objective(&sample_dataset(), "TRAFFIC").unwrap();
        assert_eq!(df.height(), 2);

        let err = filter_by_objective(&sample_dataset(), "awareness").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownObjective);
    }
}
