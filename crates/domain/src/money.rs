//! Money value object.

use serde::{Deserialize, Serialize};

/// Money amount in paise (1/100 rupee) to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    paise: i64,
}

impl Money {
    pub fn from_paise(paise: i64) -> Self {
        Self { paise }
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self {
            paise: rupees * 100,
        }
    }

    pub fn zero() -> Self {
        Self { paise: 0 }
    }

    pub fn paise(&self) -> i64 {
        self.paise
    }

    /// Whole rupees, truncated toward zero.
    pub fn rupees(&self) -> i64 {
        self.paise / 100
    }

    pub fn is_positive(&self) -> bool {
        self.paise > 0
    }

    pub fn is_negative(&self) -> bool {
        self.paise < 0
    }

    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            paise: self.paise * i64::from(quantity),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.paise < 0 { "-" } else { "" };
        let abs = self.paise.unsigned_abs();
        write!(f, "{sign}₹{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            paise: self.paise + rhs.paise,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            paise: self.paise - rhs.paise,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.paise += rhs.paise;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
