//! Waste streams and quality grades. Both enums are closed: every rate table
//! and counter array is a total function over them, so adding a variant is a
//! breaking change by design.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of waste streams; per-stream counter arrays are `[u64; STREAM_COUNT]`.
pub const STREAM_COUNT: usize = 4;

/// Category of collected material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasteStream {
    Plastic,
    Ewaste,
    Metal,
    General,
}

impl WasteStream {
    /// All streams in canonical order; `index()` is the position in this array.
    pub const ALL: [WasteStream; STREAM_COUNT] = [
        WasteStream::Plastic,
        WasteStream::Ewaste,
        WasteStream::Metal,
        WasteStream::General,
    ];

    /// Position in `ALL`, used to index per-stream counter arrays.
    pub fn index(&self) -> usize {
        match self {
            WasteStream::Plastic => 0,
            WasteStream::Ewaste => 1,
            WasteStream::Metal => 2,
            WasteStream::General => 3,
        }
    }

    /// Canonical lowercase name for hashing, ordering, and CLI parsing (deterministic).
    pub fn as_canonical(&self) -> &'static str {
        match self {
            WasteStream::Plastic => "plastic",
            WasteStream::Ewaste => "ewaste",
            WasteStream::Metal => "metal",
            WasteStream::General => "general",
        }
    }

    /// Parses a canonical name. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.as_canonical() == s)
    }
}

impl fmt::Display for WasteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_canonical())
    }
}

/// Number of quality grades.
pub const GRADE_COUNT: usize = 4;

/// Tiered quality assessment assigned at verification; scales reward and
/// carbon-offset multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityGrade {
    Low,
    Medium,
    High,
    Premium,
}

impl QualityGrade {
    /// All grades in ascending order; `index()` is the position in this array.
    pub const ALL: [QualityGrade; GRADE_COUNT] = [
        QualityGrade::Low,
        QualityGrade::Medium,
        QualityGrade::High,
        QualityGrade::Premium,
    ];

    pub fn index(&self) -> usize {
        match self {
            QualityGrade::Low => 0,
            QualityGrade::Medium => 1,
            QualityGrade::High => 2,
            QualityGrade::Premium => 3,
        }
    }

    /// Canonical lowercase name for hashing, ordering, and CLI parsing (deterministic).
    pub fn as_canonical(&self) -> &'static str {
        match self {
            QualityGrade::Low => "low",
            QualityGrade::Medium => "medium",
            QualityGrade::High => "high",
            QualityGrade::Premium => "premium",
        }
    }

    /// Parses a canonical name. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.as_canonical() == s)
    }
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_canonical())
    }
}
