//! Process-wide feature gates.
//!
//! Gates are read once from configuration and are immutable for the
//! process lifetime. Some controller groups require a gate in addition
//! to being named in the enabled-controller set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Feature gates understood by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureGate {
    /// Location and placement APIs, and the scheduling controllers.
    LocationApi,
}

impl FeatureGate {
    /// All known gates.
    pub const ALL: &'static [FeatureGate] = &[FeatureGate::LocationApi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocationApi => "location-api",
        }
    }
}

impl fmt::Display for FeatureGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureGate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureGate::ALL
            .iter()
            .copied()
            .find(|gate| gate.as_str() == s)
            .ok_or_else(|| format!("unknown feature gate {:?}", s))
    }
}

/// The set of enabled feature gates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureGates {
    enabled: BTreeSet<FeatureGate>,
}

impl FeatureGates {
    /// Create an empty gate set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse gate names, rejecting unknown ones.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        let enabled = names
            .iter()
            .map(|name| name.as_ref().parse::<FeatureGate>())
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { enabled })
    }

    /// Enable a gate.
    pub fn enable(&mut self, gate: FeatureGate) {
        self.enabled.insert(gate);
    }

    /// Builder-style enable.
    pub fn with(mut self, gate: FeatureGate) -> Self {
        self.enable(gate);
        self
    }

    /// Check if a gate is enabled.
    pub fn is_enabled(&self, gate: FeatureGate) -> bool {
        self.enabled.contains(&gate)
    }

    /// Enabled gates in stable order.
    pub fn iter(&self) -> impl Iterator<Item = FeatureGate> + '_ {
        self.enabled.iter().copied()
    }
}
