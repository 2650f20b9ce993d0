//! The fixed price buckets offered by the faceted listings.
//!
//! Every bucket is lower-inclusive and upper-exclusive except `800_1000`,
//! which also includes its upper bound. Prices above 1000.00 fall in no bucket.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::error::DomainError;
use super::types::Price;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriceBucket {
    Under50,
    From50To100,
    From100To200,
    From200To500,
    From500To800,
    From800To1000,
}

impl PriceBucket {
    pub const ALL: [PriceBucket; 6] = [
        PriceBucket::Under50,
        PriceBucket::From50To100,
        PriceBucket::From100To200,
        PriceBucket::From200To500,
        PriceBucket::From500To800,
        PriceBucket::From800To1000,
    ];

    /// Canonical token used in query strings and cache keys.
    pub fn token(self) -> &'static str {
        match self {
            PriceBucket::Under50 => "0_50",
            PriceBucket::From50To100 => "50_100",
            PriceBucket::From100To200 => "100_200",
            PriceBucket::From200To500 => "200_500",
            PriceBucket::From500To800 => "500_800",
            PriceBucket::From800To1000 => "800_1000",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PriceBucket::Under50 => "0 – 50",
            PriceBucket::From50To100 => "50 – 100",
            PriceBucket::From100To200 => "100 – 200",
            PriceBucket::From200To500 => "200 – 500",
            PriceBucket::From500To800 => "500 – 800",
            PriceBucket::From800To1000 => "800 – 1000",
        }
    }

    pub fn lower(self) -> Price {
        match self {
            PriceBucket::Under50 => Price::units(0),
            PriceBucket::From50To100 => Price::units(50),
            PriceBucket::From100To200 => Price::units(100),
            PriceBucket::From200To500 => Price::units(200),
            PriceBucket::From500To800 => Price::units(500),
            PriceBucket::From800To1000 => Price::units(800),
        }
    }

    pub fn upper(self) -> Price {
        match self {
            PriceBucket::Under50 => Price::units(50),
            PriceBucket::From50To100 => Price::units(100),
            PriceBucket::From100To200 => Price::units(200),
            PriceBucket::From200To500 => Price::units(500),
            PriceBucket::From500To800 => Price::units(800),
            PriceBucket::From800To1000 => Price::units(1000),
        }
    }

    pub fn upper_inclusive(self) -> bool {
        matches!(self, PriceBucket::From800To1000)
    }

    pub fn contains(self, price: Price) -> bool {
        if price < self.lower() {
            return false;
        }
        if self.upper_inclusive() {
            price <= self.upper()
        } else {
            price < self.upper()
        }
    }

    /// The bucket a price falls into, if any.
    pub fn classify(price: Price) -> Option<PriceBucket> {
        Self::ALL.into_iter().find(|bucket| bucket.contains(price))
    }
}

impl fmt::Display for PriceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl Serialize for PriceBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.token())
    }
}

impl FromStr for PriceBucket {
    type Err = DomainError;

    /// Accepts `_` or `-` between the bounds (`0_50`, `0-50`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation(format!("unknown price bucket `{value}`"));
        let (low, high) = value
            .trim()
            .split_once(['_', '-'])
            .ok_or_else(invalid)?;
        let low = parse_bound(low).ok_or_else(invalid)?;
        let high = parse_bound(high).ok_or_else(invalid)?;

        Self::ALL
            .into_iter()
            .find(|bucket| bucket.lower().cents() == low && bucket.upper().cents() == high)
            .ok_or_else(invalid)
    }
}

/// Whole units as plain ASCII digits, no sign.
fn parse_bound(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok()?.checked_mul(100)
}
