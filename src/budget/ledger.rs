use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::money::Usd;

/// One costed operation. Append-only; never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub phase: String,
    pub iteration: u32,
    pub cost: Usd,
    #[serde(default)]
    pub build_id: Option<String>,
}

impl CostLedgerEntry {
    pub fn new(
        operation: &str,
        phase: &str,
        iteration: u32,
        cost: Usd,
        build_id: Option<&str>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            phase: phase.to_string(),
            iteration,
            cost,
            build_id: build_id.map(str::to_string),
        }
    }

    /// Ledger key: `<rfc3339 timestamp>_<operation>`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.timestamp.to_rfc3339(), self.operation)
    }
}

/// On-disk ledger for a single calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    pub current_date: NaiveDate,
    #[serde(default)]
    pub history: BTreeMap<String, CostLedgerEntry>,
}

impl CostLedger {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            current_date: date,
            history: BTreeMap::new(),
        }
    }

    /// Load the ledger for `today`; a missing file or a ledger from another date starts fresh.
    pub fn load_for(path: &Path, today: NaiveDate) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::empty(today));
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read cost ledger: {}", path.display()))?;
        let ledger: CostLedger = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cost ledger: {}", path.display()))?;
        if ledger.current_date != today {
            tracing::info!(
                stored = %ledger.current_date,
                today = %today,
                "Cost ledger is from another day, starting fresh"
            );
            return Ok(Self::empty(today));
        }
        Ok(ledger)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize cost ledger")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write cost ledger: {}", path.display()))
    }

    /// Insert an entry under a unique key.
    pub fn append(&mut self, entry: CostLedgerEntry) {
        let base = entry.key();
        let mut key = base.clone();
        let mut n = 1;
        while self.history.contains_key(&key) {
            key = format!("{}_{}", base, n);
            n += 1;
        }
        self.history.insert(key, entry);
    }

    pub fn total(&self) -> Usd {
        self.history.values().map(|e| e.cost).sum()
    }

    pub fn total_by_phase(&self) -> BTreeMap<String, Usd> {
        let mut by_phase = BTreeMap::new();
        for entry in self.history.values() {
            *by_phase.entry(entry.phase.clone()).or_insert(Usd::ZERO) += entry.cost;
        }
        by_phase
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Default ledger path under a build root.
pub fn default_ledger_path(build_root: &Path) -> PathBuf {
    build_root.join("token_costs.json")
}
