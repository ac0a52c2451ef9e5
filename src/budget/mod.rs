//! Daily spend tracking and enforcement.
//!
//! The guardian keeps an append-only ledger of costed operations for the current
//! calendar date and refuses work that would push the day's spend to the ceiling.
//! The ledger lives in a single JSON file shared by every build under a root; a
//! ledger written on a previous date is discarded on load (no partial-day rollover).

mod ledger;

pub use ledger::{CostLedger, CostLedgerEntry, default_ledger_path};

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::BuildError;
use crate::money::Usd;

/// Source of "today" for ledger bucketing.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Local calendar date clock.
pub fn local_clock() -> Clock {
    Arc::new(|| chrono::Local::now().date_naive())
}

/// Snapshot of today's usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub date: NaiveDate,
    pub limit: Usd,
    pub spent: Usd,
    pub remaining: Usd,
    pub operations_count: usize,
    pub by_phase: BTreeMap<String, Usd>,
}

/// Enforces a daily spend ceiling over a JSON-backed ledger.
pub struct BudgetGuardian {
    ledger_file: PathBuf,
    daily_limit: Usd,
    ledger: CostLedger,
    clock: Clock,
}

impl std::fmt::Debug for BudgetGuardian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetGuardian")
            .field("ledger_file", &self.ledger_file)
            .field("daily_limit", &self.daily_limit)
            .field("ledger", &self.ledger)
            .finish()
    }
}

impl BudgetGuardian {
    /// Open the ledger at `ledger_file` using the local calendar date.
    pub fn open(ledger_file: &Path, daily_limit: Usd) -> Result<Self> {
        Self::with_clock(ledger_file, daily_limit, local_clock())
    }

    /// Open the ledger with an explicit clock.
    pub fn with_clock(ledger_file: &Path, daily_limit: Usd, clock: Clock) -> Result<Self> {
        let ledger = CostLedger::load_for(ledger_file, clock())?;
        Ok(Self {
            ledger_file: ledger_file.to_path_buf(),
            daily_limit,
            ledger,
            clock,
        })
    }

    pub fn daily_limit(&self) -> Usd {
        self.daily_limit
    }

    pub fn ledger_file(&self) -> &Path {
        &self.ledger_file
    }

    /// Append a cost entry and persist the ledger.
    pub fn record_cost(
        &mut self,
        operation: &str,
        phase: &str,
        iteration: u32,
        amount: Usd,
        build_id: Option<&str>,
    ) -> Result<()> {
        let today = (self.clock)();
        if self.ledger.current_date != today {
            tracing::info!(from = %self.ledger.current_date, to = %today, "Date changed, resetting cost ledger");
            self.ledger = CostLedger::empty(today);
        }
        self.ledger
            .append(CostLedgerEntry::new(operation, phase, iteration, amount, build_id));
        self.ledger.save(&self.ledger_file)?;
        tracing::debug!(operation, phase, iteration, cost = %amount, "Cost recorded");
        Ok(())
    }

    /// Sum of today's ledger entries. Zero once the date has moved past the ledger's date.
    pub fn daily_spend(&self) -> Usd {
        if self.ledger.current_date != (self.clock)() {
            return Usd::ZERO;
        }
        self.ledger.total()
    }

    /// True iff `daily_spend() + estimated < daily_limit` (reaching the limit exactly is refused).
    pub fn has_budget_for(&self, estimated: Usd) -> bool {
        self.daily_spend() + estimated < self.daily_limit
    }

    /// Hard stop once spend has reached the limit.
    pub fn assert_under_limit(&self, context: &str) -> Result<(), BuildError> {
        let spent = self.daily_spend();
        if spent >= self.daily_limit {
            return Err(BuildError::budget(format!(
                "Daily limit {} reached ({} spent). {}",
                self.daily_limit, spent, context
            )));
        }
        Ok(())
    }

    pub fn summary(&self) -> BudgetSummary {
        let today = (self.clock)();
        let (spent, count, by_phase) = if self.ledger.current_date == today {
            (self.ledger.total(), self.ledger.len(), self.ledger.total_by_phase())
        } else {
            (Usd::ZERO, 0, BTreeMap::new())
        };
        BudgetSummary {
            date: today,
            limit: self.daily_limit,
            spent,
            remaining: self.daily_limit - spent,
            operations_count: count,
            by_phase,
        }
    }

    /// How many more iterations at `avg_cost` fit under today's ceiling.
    pub fn estimate_remaining_iterations(&self, avg_cost: Usd) -> u32 {
        let remaining = self.daily_limit - self.daily_spend();
        if !remaining.is_positive() || !avg_cost.is_positive() {
            return 0;
        }
        u32::try_from(remaining.micros() / avg_cost.micros()).unwrap_or(u32::MAX)
    }
}
