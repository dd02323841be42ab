//! Per-pair, per-asset amount ranges.
//!
//! Each swap draws its input amount uniformly from the configured
//! `[min, max)` range for the asset being spent. Ranges are validated when
//! they are assigned, so a stored range always satisfies `0 < min < max`.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::RangeError;

/// Sampling resolution: amounts are drawn on a grid of 10^-8 of the span.
const SAMPLE_STEPS: u64 = 100_000_000;

/// Decimal places kept on a sampled amount.
const SAMPLE_DP: u32 = 8;

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

/// Half-open amount range `[min, max)` in whole-token units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmountRange {
    min: Decimal,
    max: Decimal,
}

impl AmountRange {
    pub fn new(min: Decimal, max: Decimal) -> Result<Self, RangeError> {
        if min <= Decimal::ZERO || max <= min {
            return Err(RangeError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Decimal {
        self.min
    }

    pub fn max(&self) -> Decimal {
        self.max
    }

    /// Uniform draw from `[min, max)`.
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Decimal {
        let step = rng.gen_range(0..SAMPLE_STEPS);
        let span = self.max - self.min;
        // Fraction first: span * fraction never exceeds span.
        let fraction = Decimal::from(step) / Decimal::from(SAMPLE_STEPS);
        let offset = span
            .checked_mul(fraction)
            .unwrap_or(Decimal::ZERO)
            .round_dp_with_strategy(SAMPLE_DP, rust_decimal::RoundingStrategy::ToZero);
        self.min + offset
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Amount ranges for every configured pair, keyed by pair id then asset
/// symbol. A pair's assets are fixed when the pair is registered.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AmountRangeStore {
    ranges: BTreeMap<String, BTreeMap<String, AmountRange>>,
}

impl AmountRangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table used when no configuration overrides it.
    pub fn defaults() -> Self {
        let mut store = Self::new();
        let table = [
            ("STT_USDTG", "STT", dec!(0.01), dec!(0.05)),
            ("STT_USDTG", "USDTG", dec!(0.04), dec!(0.21)),
            ("STT_NIA", "STT", dec!(0.01), dec!(0.05)),
            ("STT_NIA", "NIA", dec!(2), dec!(10)),
        ];
        for (pair, asset, min, max) in table {
            if let Ok(range) = AmountRange::new(min, max) {
                store.insert(pair, asset, range);
            }
        }
        store
    }

    /// Register (or replace) a range without requiring the pair to exist.
    /// Used while building the table from configuration.
    pub fn insert(&mut self, pair: &str, asset: &str, range: AmountRange) {
        self.ranges
            .entry(pair.to_string())
            .or_default()
            .insert(asset.to_string(), range);
    }

    pub fn get(&self, pair: &str, asset: &str) -> Result<AmountRange, RangeError> {
        self.ranges
            .get(pair)
            .ok_or_else(|| RangeError::UnknownPair(pair.to_string()))?
            .get(asset)
            .copied()
            .ok_or_else(|| RangeError::UnknownAsset {
                pair: pair.to_string(),
                asset: asset.to_string(),
            })
    }

    /// All ranges of one pair.
    pub fn pair(&self, pair: &str) -> Option<&BTreeMap<String, AmountRange>> {
        self.ranges.get(pair)
    }

    /// Replace one range. An invalid range leaves the previous one in place.
    pub fn set(
        &mut self,
        pair: &str,
        asset: &str,
        min: Decimal,
        max: Decimal,
    ) -> Result<(), RangeError> {
        self.apply(pair, &[(asset.to_string(), min, max)])
    }

    /// Replace several ranges of one pair as a unit: either every update is
    /// valid and all are stored, or nothing changes.
    pub fn apply(
        &mut self,
        pair: &str,
        updates: &[(String, Decimal, Decimal)],
    ) -> Result<(), RangeError> {
        let current = self
            .ranges
            .get(pair)
            .ok_or_else(|| RangeError::UnknownPair(pair.to_string()))?;

        let mut validated = Vec::with_capacity(updates.len());
        for (asset, min, max) in updates {
            if !current.contains_key(asset) {
                return Err(RangeError::UnknownAsset {
                    pair: pair.to_string(),
                    asset: asset.clone(),
                });
            }
            validated.push((asset.clone(), AmountRange::new(*min, *max)?));
        }

        let entry = self.ranges.entry(pair.to_string()).or_default();
        for (asset, range) in validated {
            entry.insert(asset, range);
        }
        Ok(())
    }

    pub fn sample(&self, pair: &str, asset: &str) -> Result<Decimal, RangeError> {
        let range = self.get(pair, asset)?;
        Ok(range.sample_with(&mut rand::thread_rng()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
