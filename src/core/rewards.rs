//! Reward and carbon-offset computation: per-stream base rates with quality
//! multipliers. All arithmetic is integer (micro-tokens, grams, basis
//! points); no float, RNG, or system time. Same inputs and same tables yield
//! the same result.
//!
//! **Model:** `reward = weight × base_rate(stream) × quality_multiplier(stream, quality) / SCALE`
//! and `carbon = weight × carbon_rate(stream) × carbon_quality_multiplier(quality) / SCALE`.
//! Base rates are micro-tokens per kg; carbon rates are grams CO2e per kg;
//! multipliers are basis points (SCALE = 10_000 = ×1.0). Integer division
//! truncates toward zero; that truncation is the rounding policy, not an
//! approximation error.
//!
//! Rate tables are total functions over the closed enums: defaults exist for
//! every variant, and admin overrides are stored sparsely on top. Setter
//! changes affect only computations performed afterwards; rewards already
//! paid are never recomputed.

use serde::Serialize;
use std::collections::HashMap;

use crate::core::waste::{QualityGrade, WasteStream};

/// Fixed-point denominator for all multiplier tables (basis points).
/// Compile-time constant, so the divisions below can never divide by zero.
pub const SCALE: u128 = 10_000;

/// Multiplier value representing ×1.0.
pub const MULTIPLIER_UNIT: u128 = SCALE;

/// Default base reward rates in micro-tokens per kg.
///
/// # Examples
/// ```
/// use africycle_core::core::rewards::default_base_rate;
/// use africycle_core::core::waste::WasteStream;
///
/// assert_eq!(default_base_rate(WasteStream::Plastic), 50_000); // 0.05 token/kg
/// assert_eq!(default_base_rate(WasteStream::Ewaste), 250_000); // 0.25 token/kg
/// ```
pub fn default_base_rate(stream: WasteStream) -> u128 {
    match stream {
        WasteStream::Plastic => 50_000,
        WasteStream::Ewaste => 250_000,
        WasteStream::Metal => 100_000,
        WasteStream::General => 20_000,
    }
}

/// Default quality multipliers in basis points, identical across streams.
/// The table is still keyed by `(stream, quality)` so an admin can diverge
/// per stream.
pub fn default_quality_multiplier(_stream: WasteStream, quality: QualityGrade) -> u128 {
    match quality {
        QualityGrade::Low => 8_000,
        QualityGrade::Medium => 10_000,
        QualityGrade::High => 12_500,
        QualityGrade::Premium => 15_000,
    }
}

/// Default carbon-offset rates in grams CO2e per kg.
pub fn default_carbon_rate(stream: WasteStream) -> u128 {
    match stream {
        WasteStream::Plastic => 1_500,
        WasteStream::Ewaste => 2_500,
        WasteStream::Metal => 2_000,
        WasteStream::General => 500,
    }
}

/// Default carbon quality multipliers in basis points.
pub fn default_carbon_quality_multiplier(quality: QualityGrade) -> u128 {
    match quality {
        QualityGrade::Low => 9_000,
        QualityGrade::Medium => 10_000,
        QualityGrade::High => 11_000,
        QualityGrade::Premium => 12_000,
    }
}

/// Admin-mutable rate tables. Lookups fall back to the defaults above, so
/// every getter is a total function over its enum domain.
#[derive(Debug, Default)]
pub struct RateTables {
    base_rates: HashMap<WasteStream, u128>,
    quality_multipliers: HashMap<(WasteStream, QualityGrade), u128>,
    carbon_rates: HashMap<WasteStream, u128>,
    carbon_quality_multipliers: HashMap<QualityGrade, u128>,
}

impl RateTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base reward rate in micro-tokens per kg for the given stream.
    pub fn base_rate(&self, stream: WasteStream) -> u128 {
        self.base_rates
            .get(&stream)
            .copied()
            .unwrap_or_else(|| default_base_rate(stream))
    }

    /// Quality multiplier in basis points for the given stream and grade.
    pub fn quality_multiplier(&self, stream: WasteStream, quality: QualityGrade) -> u128 {
        self.quality_multipliers
            .get(&(stream, quality))
            .copied()
            .unwrap_or_else(|| default_quality_multiplier(stream, quality))
    }

    /// Carbon-offset rate in grams CO2e per kg for the given stream.
    pub fn carbon_rate(&self, stream: WasteStream) -> u128 {
        self.carbon_rates
            .get(&stream)
            .copied()
            .unwrap_or_else(|| default_carbon_rate(stream))
    }

    /// Carbon quality multiplier in basis points for the given grade.
    pub fn carbon_quality_multiplier(&self, quality: QualityGrade) -> u128 {
        self.carbon_quality_multipliers
            .get(&quality)
            .copied()
            .unwrap_or_else(|| default_carbon_quality_multiplier(quality))
    }

    /// Overrides the base reward rate for a stream. Admin gate enforced by
    /// the ledger façade. Takes effect for subsequent computations only.
    pub fn set_base_rate(&mut self, stream: WasteStream, rate: u128) {
        self.base_rates.insert(stream, rate);
    }

    /// Overrides the quality multiplier for a (stream, grade) pair.
    pub fn set_quality_multiplier(
        &mut self,
        stream: WasteStream,
        quality: QualityGrade,
        multiplier: u128,
    ) {
        self.quality_multipliers.insert((stream, quality), multiplier);
    }

    /// Overrides the carbon-offset rate for a stream.
    pub fn set_carbon_rate(&mut self, stream: WasteStream, rate: u128) {
        self.carbon_rates.insert(stream, rate);
    }

    /// Overrides the carbon quality multiplier for a grade.
    pub fn set_carbon_quality_multiplier(&mut self, quality: QualityGrade, multiplier: u128) {
        self.carbon_quality_multipliers.insert(quality, multiplier);
    }

    /// Snapshot of the effective tables (defaults merged with overrides),
    /// in canonical enum order, for display and simulation.
    pub fn snapshot(&self) -> RateTableSnapshot {
        let mut base_rates = Vec::new();
        let mut carbon_rates = Vec::new();
        let mut quality_multipliers = Vec::new();
        for stream in WasteStream::ALL {
            base_rates.push((stream, self.base_rate(stream)));
            carbon_rates.push((stream, self.carbon_rate(stream)));
            for quality in QualityGrade::ALL {
                quality_multipliers.push((stream, quality, self.quality_multiplier(stream, quality)));
            }
        }
        let carbon_quality_multipliers = QualityGrade::ALL
            .into_iter()
            .map(|q| (q, self.carbon_quality_multiplier(q)))
            .collect();
        RateTableSnapshot {
            base_rates,
            quality_multipliers,
            carbon_rates,
            carbon_quality_multipliers,
        }
    }
}

/// Effective rate tables at a point in time, in canonical enum order.
#[derive(Debug, Clone, Serialize)]
pub struct RateTableSnapshot {
    pub base_rates: Vec<(WasteStream, u128)>,
    pub quality_multipliers: Vec<(WasteStream, QualityGrade, u128)>,
    pub carbon_rates: Vec<(WasteStream, u128)>,
    pub carbon_quality_multipliers: Vec<(QualityGrade, u128)>,
}

/// Computes the reward in micro-tokens for a verified collection.
///
/// `reward = weight × base_rate(stream) × quality_multiplier(stream, quality) / SCALE`,
/// truncating toward zero. Pure: same tables and inputs always yield the
/// same value.
///
/// # Examples
/// ```
/// use africycle_core::core::rewards::{compute_reward, RateTables};
/// use africycle_core::core::waste::{QualityGrade, WasteStream};
///
/// let tables = RateTables::new();
/// // 100 kg plastic at high quality: 100 × 50_000 × 12_500 / 10_000
/// assert_eq!(
///     compute_reward(&tables, WasteStream::Plastic, 100, QualityGrade::High),
///     6_250_000,
/// );
/// ```
pub fn compute_reward(
    tables: &RateTables,
    stream: WasteStream,
    weight_kg: u64,
    quality: QualityGrade,
) -> u128 {
    let base = tables.base_rate(stream);
    let multiplier = tables.quality_multiplier(stream, quality);
    (weight_kg as u128) * base * multiplier / SCALE
}

/// Computes the estimated carbon offset in grams CO2e.
///
/// `carbon = weight × carbon_rate(stream) × carbon_quality_multiplier(quality) / SCALE`,
/// truncating toward zero. Pure.
///
/// # Examples
/// ```
/// use africycle_core::core::rewards::{compute_carbon_offset, RateTables};
/// use africycle_core::core::waste::{QualityGrade, WasteStream};
///
/// let tables = RateTables::new();
/// // 100 kg plastic at high quality: 100 × 1_500 × 11_000 / 10_000
/// assert_eq!(
///     compute_carbon_offset(&tables, WasteStream::Plastic, 100, QualityGrade::High),
///     165_000,
/// );
/// ```
pub fn compute_carbon_offset(
    tables: &RateTables,
    stream: WasteStream,
    weight_kg: u64,
    quality: QualityGrade,
) -> u128 {
    let rate = tables.carbon_rate(stream);
    let multiplier = tables.carbon_quality_multiplier(quality);
    (weight_kg as u128) * rate * multiplier / SCALE
}
