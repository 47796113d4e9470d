//! Free-text campaign parameter capture.
//!
//! Parsing and merging are separate steps: [`parse_update`] only extracts
//! raw `key: value` fragments, and [`CampaignParameters::merge`] decides
//! which of them are valid. Unrecognized values never overwrite stored
//! state; they are reported back in [`SubmitOutcome::ignored`].
use std::fmt::{self, Write as FmtWrite};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::{Channel, ChannelPreference, Objective};

static OBJECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bobjective\s*:\s*([a-z]+)").expect("objective pattern"));
static BUDGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbudget\s*:\s*\$?(\d{3,6})\b").expect("budget pattern"));
static CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bchannel\s*:\s*([a-z][a-z ]*)").expect("channel pattern"));

/// Raw fragments found in one submission. `None` means the key was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUpdate {
    pub objective: Option<String>,
    pub budget: Option<u32>,
    pub channel: Option<String>,
}

impl ParsedUpdate {
    pub fn is_empty(&self) -> bool {
        self.objective.is_none() && self.budget.is_none() && self.channel.is_none()
    }
}

/// Extract `objective: <word>`, `budget: <3-6 digits>` and
/// `channel: <word(s)>` independently of each other.
pub fn parse_update(text: &str) -> ParsedUpdate {
    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    ParsedUpdate {
        objective: capture(&*OBJECTIVE_RE),
        budget: capture(&*BUDGET_RE).and_then(|digits| digits.parse().ok()),
        channel: capture(&*CHANNEL_RE).filter(|s| !s.is_empty()),
    }
}

/// Interpret channel text. Any word "none"/"no" means no preference; a
/// known channel name sets it; anything else is unrecognized.
fn interpret_channel(text: &str) -> Option<ChannelPreference> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.iter().any(|w| *w == "none" || *w == "no") {
        return Some(ChannelPreference::NoPreference);
    }
    words
        .iter()
        .find_map(|w| Channel::parse(w))
        .map(ChannelPreference::Channel)
}

// ── Parameters ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Objective,
    Budget,
    Channel,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Objective => "objective",
            Field::Budget => "budget",
            Field::Channel => "channel",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fragment that was found but not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoredFragment {
    pub field: Field,
    pub text: String,
}

/// Work-in-progress campaign form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CampaignParameters {
    pub objective: Option<Objective>,
    pub budget: Option<u32>,
    pub channel_preference: Option<ChannelPreference>,
}

impl CampaignParameters {
    /// Apply recognized fields from `update`; returns (accepted, ignored).
    pub fn merge(&mut self, update: &ParsedUpdate) -> (Vec<Field>, Vec<IgnoredFragment>) {
        let mut accepted = Vec::new();
        let mut ignored = Vec::new();

        if let Some(text) = &update.objective {
            match Objective::parse(text) {
                Some(objective) => {
                    self.objective = Some(objective);
                    accepted.push(Field::Objective);
                }
                None => ignored.push(IgnoredFragment {
                    field: Field::Objective,
                    text: text.clone(),
                }),
            }
        }

        if let Some(budget) = update.budget {
            self.budget = Some(budget);
            accepted.push(Field::Budget);
        }

        if let Some(text) = &update.channel {
            match interpret_channel(text) {
                Some(pref) => {
                    self.channel_preference = Some(pref);
                    accepted.push(Field::Channel);
                }
                None => ignored.push(IgnoredFragment {
                    field: Field::Channel,
                    text: text.clone(),
                }),
            }
        }

        (accepted, ignored)
    }

    /// Objective and budget are set; enough to run an allocation.
    pub fn is_ready(&self) -> bool {
        self.objective.is_some() && self.budget.is_some()
    }

    pub fn missing(&self) -> Vec<Field> {
        let mut missing = Vec::new();
        if self.objective.is_none() {
            missing.push(Field::Objective);
        }
        if self.budget.is_none() {
            missing.push(Field::Budget);
        }
        if self.channel_preference.is_none() {
            missing.push(Field::Channel);
        }
        missing
    }

    fn describe(&self) -> String {
        let show = |v: Option<String>| v.unwrap_or_else(|| "not set".to_string());
        format!(
            "objective={}, budget={}, channel={}",
            show(self.objective.map(|o| o.to_string())),
            show(self.budget.map(|b| b.to_string())),
            show(self.channel_preference.map(|c| c.to_string())),
        )
    }

    /// Status text for re-prompting the user.
    pub fn status_message(&self) -> String {
        let missing = self.missing();
        if missing.is_empty() {
            return format!("All campaign inputs collected: {}.", self.describe());
        }

        let mut msg = format!("Current inputs: {}.", self.describe());
        let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
        let _ = write!(msg, " Still needed: {}.", names.join(", "));
        if missing.contains(&Field::Objective) {
            msg.push_str(" Objective must be one of: conversion, traffic.");
        }
        if missing.contains(&Field::Budget) {
            msg.push_str(" Budget must be a whole number between 100 and 999999.");
        }
        if missing.contains(&Field::Channel) {
            msg.push_str(" Channel must be one of: meta, snapchat, none.");
        }
        msg
    }
}

// ── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub parameters: CampaignParameters,
    pub accepted: Vec<Field>,
    pub ignored: Vec<IgnoredFragment>,
    /// All three fields are populated.
    pub complete: bool,
    pub message: String,
}

impl SubmitOutcome {
    pub fn new(
        parameters: CampaignParameters,
        accepted: Vec<Field>,
        ignored: Vec<IgnoredFragment>,
    ) -> Self {
        let mut message = parameters.status_message();
        for fragment in &ignored {
            let _ = write!(
                message,
                " Ignored unrecognized {} '{}'.",
                fragment.field, fragment.text
            );
        }
        Self {
            complete: parameters.missing().is_empty(),
            parameters,
            accepted,
            ignored,
            message,
        }
    }
}

/// Snapshot returned by `current()`. Never an error.
#[derive(Debug, Clone, Serialize)]
pub struct InputsStatus {
    pub parameters: CampaignParameters,
    /// Objective and budget are set.
    pub complete: bool,
    pub missing: Vec<Field>,
    pub message: String,
}

impl From<CampaignParameters> for InputsStatus {
    fn from(parameters: CampaignParameters) -> Self {
        Self {
            complete: parameters.is_ready(),
            missing: parameters.missing(),
            message: parameters.status_message(),
            parameters,
        }
    }
}
