#[cfg(feature = "python")]
use pyo3::exceptions::{PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Unknown KPI '{0}'. Valid values: leads, clicks")]
    UnknownKpi(String),

    #[error("No rows with objective '{0}'")]
    UnknownObjective(String),

    #[error("Unsupported objective '{0}'. Valid values: conversion, traffic")]
    UnsupportedObjective(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Invalid budget {0}: budget must be a positive number")]
    InvalidBudget(f64),

    #[error("Missing columns: {}", .0.join(", "))]
    SchemaError(Vec<String>),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Config: {0}")]
    Config(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    General(String),
}

/// Stable, enumerable error kind for callers that translate errors into
/// user-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownKpi,
    UnknownObjective,
    UnsupportedObjective,
    EmptyResult,
    InvalidBudget,
    SchemaError,
    InvalidData,
    SessionNotFound,
    Config,
    Internal,
}

impl PlannerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownKpi(_) => ErrorKind::UnknownKpi,
            Self::UnknownObjective(_) => ErrorKind::UnknownObjective,
            Self::UnsupportedObjective(_) => ErrorKind::UnsupportedObjective,
            Self::EmptyResult(_) => ErrorKind::EmptyResult,
            Self::InvalidBudget(_) => ErrorKind::InvalidBudget,
            Self::SchemaError(_) => ErrorKind::SchemaError,
            Self::InvalidData(_) => ErrorKind::InvalidData,
            Self::SessionNotFound(_) => ErrorKind::SessionNotFound,
            Self::Config(_) | Self::Toml(_) => ErrorKind::Config,
            Self::Polars(_) | Self::Io(_) | Self::Json(_) | Self::General(_) => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(feature = "python")]
impl From<PlannerError> for PyErr {
    fn from(err: PlannerError) -> PyErr {
        match err.kind() {
            ErrorKind::Internal | ErrorKind::Config => PyRuntimeError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

#[cfg(feature = "python")]
impl From<PyErr> for PlannerError {
    fn from(err: PyErr) -> Self {
        PlannerError::General(err.to_string())
    }
}
