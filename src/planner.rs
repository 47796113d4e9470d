use chrono::Duration;
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::aggregator;
use crate::allocation::{self, AllocationPolicy, AllocationResult, ProportionalShare};
use crate::config::PlannerConfig;
use crate::dataset::Dataset;
use crate::error::PlannerError;
use crate::preferences::{InputsStatus, SubmitOutcome};
use crate::session::SessionStore;

pub const DEFAULT_TOP_N: usize = 3;

/// Result of asking for a plan from stored session inputs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome {
    /// Objective or budget is still unset.
    Incomplete(InputsStatus),
    Planned(AllocationResult),
}

/// Operations an orchestrator invokes, bound to one read-only dataset.
///
/// Preference state lives in per-conversation sessions; every
/// session-scoped call takes the session id returned by [`open_session`].
///
/// [`open_session`]: MediaPlanner::open_session
#[derive(Debug)]
pub struct MediaPlanner {
    dataset: Dataset,
    policy: AllocationPolicy,
    session_idle: Duration,
    sessions: SessionStore,
}

impl MediaPlanner {
    pub fn new(dataset: Dataset, policy: AllocationPolicy) -> Result<Self, PlannerError> {
        policy.validate()?;
        Ok(Self {
            dataset,
            policy,
            session_idle: PlannerConfig::default().session_idle(),
            sessions: SessionStore::new(),
        })
    }

    /// Load the dataset named by `config` and apply its policy.
    pub fn from_config(config: &PlannerConfig) -> Result<Self, PlannerError> {
        config.validate()?;
        let dataset = Dataset::from_csv(&config.dataset_path())?;
        let mut planner = Self::new(dataset, config.allocation)?;
        planner.session_idle = config.session_idle();
        Ok(planner)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    // ── Descriptive ─────────────────────────────────────────────────────────

    pub fn summarize_channel_performance(&self) -> Result<DataFrame, PlannerError> {
        aggregator::summarize(&self.dataset)
    }

    pub fn top_channels_by_kpi(&self, kpi: &str, top_n: usize) -> Result<DataFrame, PlannerError> {
        aggregator::top_channels_by_kpi(&self.dataset, kpi, top_n)
    }

    pub fn filter_by_objective(&self, objective: &str) -> Result<DataFrame, PlannerError> {
        aggregator::filter_by_objective(&self.dataset, objective)
    }

    // ── Sessions ────────────────────────────────────────────────────────────

    pub fn open_session(&self) -> Uuid {
        self.sessions.open()
    }

    pub fn close_session(&self, session: Uuid) -> bool {
        self.sessions.close(session)
    }

    pub fn reset_session(&self, session: Uuid) -> Result<(), PlannerError> {
        self.sessions.reset(session)
    }

    /// Drop sessions idle longer than the configured window.
    pub fn prune_idle_sessions(&self) -> usize {
        self.sessions.prune_idle(self.session_idle)
    }

    pub fn submit_user_inputs(
        &self,
        session: Uuid,
        text: &str,
    ) -> Result<SubmitOutcome, PlannerError> {
        self.sessions.submit(session, text)
    }

    pub fn get_current_inputs(&self, session: Uuid) -> Result<InputsStatus, PlannerError> {
        self.sessions.current(session)
    }

    // ── Allocation ──────────────────────────────────────────────────────────

    /// Split `budget` for `objective`, reading the channel preference from
    /// the session.
    pub fn suggest_spend_split(
        &self,
        session: Uuid,
        budget: f64,
        objective: &str,
    ) -> Result<AllocationResult, PlannerError> {
        let preference = self.sessions.parameters(session)?.channel_preference;
        debug!(%session, ?preference, "suggesting spend split");
        allocation::allocate(&self.dataset, budget, objective, preference, &self.policy)
    }

    /// Allocate from the session's stored objective, budget and preference.
    pub fn plan(&self, session: Uuid) -> Result<PlanOutcome, PlannerError> {
        let params = self.sessions.parameters(session)?;
        match (params.objective, params.budget) {
            (Some(objective), Some(budget)) => allocation::allocate(
                &self.dataset,
                f64::from(budget),
                objective.as_str(),
                params.channel_preference,
                &self.policy,
            )
            .map(PlanOutcome::Planned),
            _ => Ok(PlanOutcome::Incomplete(InputsStatus::from(params))),
        }
    }

    /// Efficiency-proportional split across the top channels, without
    /// preference or floor.
    pub fn suggest_proportional_split(
        &self,
        budget: f64,
        kpi: &str,
        top_n: usize,
    ) -> Result<Vec<ProportionalShare>, PlannerError> {
        allocation::proportional_split(&self.dataset, budget, kpi, top_n)
    }
}
