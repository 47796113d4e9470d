/// Column-name constants for media-planner schema.
/// Single source of truth - exported to Python via PyO3.

// ── Campaign columns ────────────────────────────────────────────────────────
pub mod campaign {
    pub const SOURCE: &str = "source";
    pub const OBJECTIVE: &str = "objective";
    pub const KPI: &str = "kpi";
    pub const SPENDS: &str = "spends";
    pub const LEADS: &str = "leads";
    pub const AD_CLICKS: &str = "ad_clicks";

    pub const REQUIRED: [&str; 6] = [SOURCE, OBJECTIVE, KPI, SPENDS, LEADS, AD_CLICKS];

    /// Free-text columns normalized to trimmed lowercase at load time.
    pub const CATEGORICAL: [&str; 3] = [SOURCE, OBJECTIVE, KPI];

    pub const NUMERIC: [&str; 3] = [SPENDS, LEADS, AD_CLICKS];
}

// ── Derived at load time ────────────────────────────────────────────────────
pub mod derived {
    pub const COST_PER_LEAD: &str = "cost_per_lead";
    pub const COST_PER_CLICK: &str = "cost_per_click";
}

// ── Efficiency table ────────────────────────────────────────────────────────
pub mod efficiency {
    pub const METRIC_SUM: &str = "metric_sum";
    pub const SPEND_SUM: &str = "spend_sum";
    pub const EFFICIENCY: &str = "efficiency";
}

// ── Channel summary table ───────────────────────────────────────────────────
pub mod summary {
    pub const TOTAL_SPEND: &str = "total_spend";
    pub const MEAN_COST_PER_LEAD: &str = "mean_cost_per_lead";
    pub const MEAN_COST_PER_CLICK: &str = "mean_cost_per_click";
    pub const TOTAL_LEADS: &str = "total_leads";
    pub const TOTAL_CLICKS: &str = "total_clicks";
}

// ── Allocation table ────────────────────────────────────────────────────────
pub mod allocation {
    pub const CHANNEL: &str = "channel";
    pub const ALLOCATED_AMOUNT: &str = "allocated_amount";
    pub const ALLOCATION_PERCENT: &str = "allocation_percent";
    pub const REASONING: &str = "reasoning";
}
