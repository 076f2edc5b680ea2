//! Named historical stress scenarios.
//!
//! Read-only reference data looked up by id. Shocks are decimal fractions;
//! sector shocks override the market-wide shock, asset shocks override both
//! (resolution happens in the stress engine).

use portrisk_core::error::{Result, RiskError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named historical stress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Stable catalog id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What happened.
    pub description: String,
    /// Asset-specific shocks, by ticker.
    pub asset_shocks: BTreeMap<String, f64>,
    /// Sector-level shocks, by sector name.
    pub sector_shocks: BTreeMap<String, f64>,
    /// Market-wide shock applied where nothing more specific matches.
    pub market_shock: f64,
    /// Observed peak-to-recovery time in months.
    pub recovery_months: f64,
}

impl Scenario {
    fn new(
        id: &str,
        name: &str,
        description: &str,
        market_shock: f64,
        sector_shocks: &[(&str, f64)],
        recovery_months: f64,
    ) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            description: description.to_owned(),
            asset_shocks: BTreeMap::new(),
            sector_shocks: sector_shocks
                .iter()
                .map(|(s, v)| ((*s).to_owned(), *v))
                .collect(),
            market_shock,
            recovery_months,
        }
    }
}

/// Lookup table of scenarios, keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioCatalog {
    scenarios: BTreeMap<String, Scenario>,
}

impl Default for ScenarioCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScenarioCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            scenarios: BTreeMap::new(),
        }
    }

    /// The built-in historical events.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for scenario in [
            Scenario::new(
                "black-monday-1987",
                "Black Monday (1987)",
                "One-day global equity crash of October 19, 1987",
                -0.22,
                &[("Financials", -0.26), ("Technology", -0.24)],
                20.0,
            ),
            Scenario::new(
                "dotcom-2000",
                "Dot-Com Bust (2000-2002)",
                "Collapse of the internet bubble, technology-led bear market",
                -0.45,
                &[
                    ("Technology", -0.78),
                    ("Communication Services", -0.60),
                    ("Utilities", -0.20),
                ],
                56.0,
            ),
            Scenario::new(
                "gfc-2008",
                "Global Financial Crisis (2008)",
                "Credit crisis and banking collapse of 2008-2009",
                -0.50,
                &[
                    ("Financials", -0.72),
                    ("Real Estate", -0.65),
                    ("Energy", -0.45),
                    ("Consumer Staples", -0.25),
                ],
                49.0,
            ),
            Scenario::new(
                "covid-2020",
                "COVID-19 Crash (2020)",
                "Pandemic shutdown shock of February-March 2020",
                -0.34,
                &[
                    ("Energy", -0.55),
                    ("Financials", -0.40),
                    ("Technology", -0.27),
                    ("Health Care", -0.25),
                ],
                6.0,
            ),
            Scenario::new(
                "rate-shock-2022",
                "Rate Shock (2022)",
                "Aggressive policy tightening, duration-heavy selloff",
                -0.25,
                &[
                    ("Technology", -0.33),
                    ("Communication Services", -0.38),
                    ("Real Estate", -0.28),
                    ("Energy", 0.35),
                ],
                18.0,
            ),
        ] {
            catalog.scenarios.insert(scenario.id.clone(), scenario);
        }
        catalog
    }

    /// Add or replace a scenario.
    pub fn insert(&mut self, scenario: Scenario) {
        self.scenarios.insert(scenario.id.clone(), scenario);
    }

    /// Look up a scenario by id.
    pub fn get(&self, id: &str) -> Result<&Scenario> {
        self.scenarios
            .get(id)
            .ok_or_else(|| RiskError::not_found("scenario", id))
    }

    /// All scenario ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.scenarios.keys().map(String::as_str).collect()
    }

    /// Number of scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// True when the catalog holds no scenarios.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
