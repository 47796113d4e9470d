//! Typed vocabulary shared by the aggregator, preference parsing and the
//! allocation engine. All parsing is case-insensitive and trims whitespace.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::schema::campaign;

// ── Channel ─────────────────────────────────────────────────────────────────

/// One of the two advertising platforms a budget is split between.
///
/// `Meta` is channel A and `Snapchat` is channel B: when amounts are rounded,
/// the remainder always lands on channel B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Meta,
    Snapchat,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Meta, Channel::Snapchat];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Meta => "meta",
            Channel::Snapchat => "snapchat",
        }
    }

    pub fn other(self) -> Channel {
        match self {
            Channel::Meta => Channel::Snapchat,
            Channel::Snapchat => Channel::Meta,
        }
    }

    pub fn parse(value: &str) -> Option<Channel> {
        let value = value.trim();
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── KPI ─────────────────────────────────────────────────────────────────────

/// Which metric drives efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kpi {
    Leads,
    Clicks,
}

impl Kpi {
    pub const ALL: [Kpi; 2] = [Kpi::Leads, Kpi::Clicks];

    /// Tag as it appears in the dataset's `kpi` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Kpi::Leads => "leads",
            Kpi::Clicks => "clicks",
        }
    }

    /// Column summed as the numerator of efficiency.
    pub fn metric_column(self) -> &'static str {
        match self {
            Kpi::Leads => campaign::LEADS,
            Kpi::Clicks => campaign::AD_CLICKS,
        }
    }
}

impl FromStr for Kpi {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        Kpi::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| PlannerError::UnknownKpi(s.to_string()))
    }
}

impl fmt::Display for Kpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Objective ───────────────────────────────────────────────────────────────

/// Stated campaign goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Conversion,
    Traffic,
}

impl Objective {
    pub const ALL: [Objective; 2] = [Objective::Conversion, Objective::Traffic];

    pub fn as_str(self) -> &'static str {
        match self {
            Objective::Conversion => "conversion",
            Objective::Traffic => "traffic",
        }
    }

    pub fn kpi(self) -> Kpi {
        match self {
            Objective::Conversion => Kpi::Leads,
            Objective::Traffic => Kpi::Clicks,
        }
    }

    pub fn parse(value: &str) -> Option<Objective> {
        let value = value.trim();
        Objective::ALL
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(value))
    }
}

impl FromStr for Objective {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Objective::parse(s).ok_or_else(|| PlannerError::UnsupportedObjective(s.to_string()))
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Channel preference ──────────────────────────────────────────────────────

/// A stated channel preference. `NoPreference` is an explicit answer and
/// is distinct from the preference never having been given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPreference {
    Channel(Channel),
    NoPreference,
}

impl ChannelPreference {
    pub fn channel(self) -> Option<Channel> {
        match self {
            ChannelPreference::Channel(c) => Some(c),
            ChannelPreference::NoPreference => None,
        }
    }
}

impl fmt::Display for ChannelPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelPreference::Channel(c) => c.fmt(f),
            ChannelPreference::NoPreference => f.write_str("none"),
        }
    }
}
