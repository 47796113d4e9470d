//! Two-channel ad budget planning over historical campaign performance.
//!
//! The crate is usable directly from Rust through [`MediaPlanner`], and as a
//! Python extension module (`_core`) with the `python` feature.

pub mod aggregator;
pub mod allocation;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod planner;
pub mod preferences;
pub mod schema;
pub mod session;

#[cfg(feature = "python")]
mod python;

pub use allocation::{AllocationPolicy, AllocationResult, ChannelAllocation, Reasoning};
pub use config::PlannerConfig;
pub use dataset::{CampaignRecord, Dataset};
pub use domain::{Channel, ChannelPreference, Kpi, Objective};
pub use error::{ErrorKind, PlannerError};
pub use planner::{MediaPlanner, PlanOutcome};
pub use preferences::{CampaignParameters, InputsStatus, SubmitOutcome};
