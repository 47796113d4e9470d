use std::path::Path;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;
use uuid::Uuid;

use crate::allocation::AllocationPolicy;
use crate::config::PlannerConfig;
use crate::dataset::Dataset;
use crate::error::PlannerError;
use crate::planner::{MediaPlanner, DEFAULT_TOP_N};
use crate::schema;

fn parse_session(session_id: &str) -> PyResult<Uuid> {
    Uuid::parse_str(session_id)
        .map_err(|e| PyValueError::new_err(format!("Invalid session id '{session_id}': {e}")))
}

#[pyclass(name = "MediaPlanner")]
pub struct PyMediaPlanner {
    inner: MediaPlanner,
}

#[pymethods]
impl PyMediaPlanner {
    /// Load a campaign CSV and plan with the default allocation policy.
    #[new]
    fn new(dataset_path: &str) -> PyResult<Self> {
        let dataset = Dataset::from_csv(Path::new(dataset_path))?;
        let inner = MediaPlanner::new(dataset, AllocationPolicy::default())?;
        Ok(Self { inner })
    }

    /// Build from a TOML config file (missing file means defaults).
    #[staticmethod]
    fn from_config(config_path: &str) -> PyResult<Self> {
        let config = PlannerConfig::load_from(Path::new(config_path))?;
        let inner = MediaPlanner::from_config(&config)?;
        Ok(Self { inner })
    }

    // ── Data questions ──────────────────────────────────────────────────────

    fn summarize_channel_performance(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.summarize_channel_performance()?))
    }

    #[pyo3(signature = (kpi, top_n=DEFAULT_TOP_N))]
    fn top_channels_by_kpi(&self, kpi: &str, top_n: usize) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.top_channels_by_kpi(kpi, top_n)?))
    }

    fn filter_by_objective(&self, objective: &str) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.filter_by_objective(objective)?))
    }

    // ── Campaign inputs ─────────────────────────────────────────────────────

    fn open_session(&self) -> String {
        self.inner.open_session().to_string()
    }

    fn close_session(&self, session_id: &str) -> PyResult<bool> {
        Ok(self.inner.close_session(parse_session(session_id)?))
    }

    fn reset_session(&self, session_id: &str) -> PyResult<()> {
        Ok(self.inner.reset_session(parse_session(session_id)?)?)
    }

    fn prune_idle_sessions(&self) -> usize {
        self.inner.prune_idle_sessions()
    }

    /// Returns the status message for re-prompting the user.
    fn submit_user_inputs(&self, session_id: &str, text: &str) -> PyResult<String> {
        let outcome = self
            .inner
            .submit_user_inputs(parse_session(session_id)?, text)?;
        Ok(outcome.message)
    }

    fn get_current_inputs(&self, session_id: &str) -> PyResult<String> {
        let status = self.inner.get_current_inputs(parse_session(session_id)?)?;
        Ok(status.message)
    }

    /// Structured status (accepted/ignored fragments) as JSON.
    fn submit_user_inputs_json(&self, session_id: &str, text: &str) -> PyResult<String> {
        let outcome = self
            .inner
            .submit_user_inputs(parse_session(session_id)?, text)?;
        Ok(serde_json::to_string(&outcome).map_err(PlannerError::from)?)
    }

    // ── Allocation ──────────────────────────────────────────────────────────

    /// Returns (allocation table, explanation).
    fn suggest_spend_split(
        &self,
        session_id: &str,
        budget: f64,
        objective: &str,
    ) -> PyResult<(PyDataFrame, String)> {
        let result = self
            .inner
            .suggest_spend_split(parse_session(session_id)?, budget, objective)?;
        Ok((PyDataFrame(result.to_frame()?), result.explain()))
    }

    /// Plan from stored inputs; JSON with a `status` of `planned` or `incomplete`.
    fn plan(&self, session_id: &str) -> PyResult<String> {
        let outcome = self.inner.plan(parse_session(session_id)?)?;
        Ok(serde_json::to_string(&outcome).map_err(PlannerError::from)?)
    }

    #[pyo3(signature = (budget, kpi, top_n=DEFAULT_TOP_N))]
    fn suggest_proportional_split(&self, budget: f64, kpi: &str, top_n: usize) -> PyResult<String> {
        let shares = self.inner.suggest_proportional_split(budget, kpi, top_n)?;
        Ok(serde_json::to_string(&shares).map_err(PlannerError::from)?)
    }
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let campaign = PyModule::new(m.py(), "campaign")?;
    campaign.add("SOURCE", schema::campaign::SOURCE)?;
    campaign.add("OBJECTIVE", schema::campaign::OBJECTIVE)?;
    campaign.add("KPI", schema::campaign::KPI)?;
    campaign.add("SPENDS", schema::campaign::SPENDS)?;
    campaign.add("LEADS", schema::campaign::LEADS)?;
    campaign.add("AD_CLICKS", schema::campaign::AD_CLICKS)?;
    m.add_submodule(&campaign)?;

    let derived = PyModule::new(m.py(), "derived")?;
    derived.add("COST_PER_LEAD", schema::derived::COST_PER_LEAD)?;
    derived.add("COST_PER_CLICK", schema::derived::COST_PER_CLICK)?;
    m.add_submodule(&derived)?;

    let efficiency = PyModule::new(m.py(), "efficiency")?;
    efficiency.add("METRIC_SUM", schema::efficiency::METRIC_SUM)?;
    efficiency.add("SPEND_SUM", schema::efficiency::SPEND_SUM)?;
    efficiency.add("EFFICIENCY", schema::efficiency::EFFICIENCY)?;
    m.add_submodule(&efficiency)?;

    let summary = PyModule::new(m.py(), "summary")?;
    summary.add("TOTAL_SPEND", schema::summary::TOTAL_SPEND)?;
    summary.add("MEAN_COST_PER_LEAD", schema::summary::MEAN_COST_PER_LEAD)?;
    summary.add("MEAN_COST_PER_CLICK", schema::summary::MEAN_COST_PER_CLICK)?;
    summary.add("TOTAL_LEADS", schema::summary::TOTAL_LEADS)?;
    summary.add("TOTAL_CLICKS", schema::summary::TOTAL_CLICKS)?;
    m.add_submodule(&summary)?;

    let allocation = PyModule::new(m.py(), "allocation")?;
    allocation.add("CHANNEL", schema::allocation::CHANNEL)?;
    allocation.add("ALLOCATED_AMOUNT", schema::allocation::ALLOCATED_AMOUNT)?;
    allocation.add("ALLOCATION_PERCENT", schema::allocation::ALLOCATION_PERCENT)?;
    allocation.add("REASONING", schema::allocation::REASONING)?;
    m.add_submodule(&allocation)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyMediaPlanner>()?;
    add_schema_exports(m)?;
    Ok(())
}
