//! Exact dollar amounts for cost tracking.
//!
//! Costs are summed and compared against a daily ceiling, so they are kept as
//! integer micro-dollars rather than floats. On disk they serialize as plain
//! decimal dollar numbers (`0.5`, `1.25`) so ledger and state files stay readable.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

const MICROS_PER_DOLLAR: i64 = 1_000_000;

/// A US-dollar amount with micro-dollar precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Usd(i64);

impl Usd {
    pub const ZERO: Usd = Usd(0);

    /// Build an amount from whole cents (`Usd::cents(50)` is $0.50).
    pub const fn cents(cents: i64) -> Self {
        Usd(cents * (MICROS_PER_DOLLAR / 100))
    }

    /// Build an amount from a decimal dollar value, rounding to the nearest micro-dollar.
    pub fn from_dollars(dollars: f64) -> Self {
        Usd((dollars * MICROS_PER_DOLLAR as f64).round() as i64)
    }

    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / MICROS_PER_DOLLAR as f64
    }

    pub fn micros(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Multiply by a whole count (e.g. iterations × per-iteration rate).
    pub fn times(self, count: u32) -> Self {
        Usd(self.0 * i64::from(count))
    }
}

impl Add for Usd {
    type Output = Usd;

    fn add(self, rhs: Usd) -> Usd {
        Usd(self.0 + rhs.0)
    }
}

impl AddAssign for Usd {
    fn add_assign(&mut self, rhs: Usd) {
        self.0 += rhs.0;
    }
}

impl Sub for Usd {
    type Output = Usd;

    fn sub(self, rhs: Usd) -> Usd {
        Usd(self.0 - rhs.0)
    }
}

impl Sum for Usd {
    fn sum<I: Iterator<Item = Usd>>(iter: I) -> Usd {
        iter.fold(Usd::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Usd> for Usd {
    fn sum<I: Iterator<Item = &'a Usd>>(iter: I) -> Usd {
        iter.copied().sum()
    }
}

impl fmt::Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.as_dollars())
    }
}

impl Serialize for Usd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_dollars())
    }
}

impl<'de> Deserialize<'de> for Usd {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dollars = f64::deserialize(deserializer)?;
        Ok(Usd::from_dollars(dollars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cents_and_dollars_agree() {
        assert_eq!(Usd::cents(50), Usd::from_dollars(0.5));
        assert_eq!(Usd::cents(5), Usd::from_dollars(0.05));
        assert_eq!(Usd::cents(500).as_dollars(), 5.0);
    }

    #[test]
    fn test_sum_is_exact() {
        // 0.1 + 0.2 != 0.3 in f64; micro-dollars keep it exact
        let total: Usd = [Usd::from_dollars(0.1), Usd::from_dollars(0.2)].iter().sum();
        assert_eq!(total, Usd::from_dollars(0.3));
    }

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Usd::cents(350).to_string(), "$3.50");
        assert_eq!(Usd::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_times() {
        assert_eq!(Usd::cents(50).times(7), Usd::cents(350));
    }

    #[test]
    fn test_serde_as_decimal_dollars() {
        let json = serde_json::to_string(&Usd::cents(125)).unwrap();
        assert_eq!(json, "1.25");
        let back: Usd = serde_json::from_str("1.25").unwrap();
        assert_eq!(back, Usd::cents(125));
    }
}
