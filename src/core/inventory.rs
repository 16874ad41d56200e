//! Per-recycler processed-material inventory, keyed by (recycler, stream).
//!
//! Two counters per key: `processed_kg` (append-only history of everything a
//! recycler's batches have produced) and `reserved_kg` (portions committed to
//! marketplace listings). Listings reserve at creation and release only on
//! cancellation, so `reserved ≤ processed` holds at all times and the
//! sellable remainder is `processed − reserved`.

use crate::error::AfriCycleError;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::core::registry::Address;
use crate::core::waste::{WasteStream, STREAM_COUNT};

/// Errors produced by inventory accounting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("Insufficient inventory: requested {requested} kg, {available} kg available")]
    InsufficientInventory { requested: u64, available: u64 },
}

impl From<InventoryError> for AfriCycleError {
    fn from(e: InventoryError) -> Self {
        AfriCycleError::Validation(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StreamInventory {
    processed_kg: u64,
    reserved_kg: u64,
}

/// Point-in-time inventory snapshot for one recycler, indexed by
/// `WasteStream::index()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventorySnapshot {
    pub processed_by_stream: [u64; STREAM_COUNT],
    pub available_by_stream: [u64; STREAM_COUNT],
}

/// Inventory book for all recyclers. Plain data; the owning ledger
/// serializes access.
#[derive(Debug, Default)]
pub struct InventoryBook {
    entries: HashMap<(Address, WasteStream), StreamInventory>,
}

impl InventoryBook {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    fn entry(&mut self, recycler: &Address, stream: WasteStream) -> &mut StreamInventory {
        self.entries
            .entry((recycler.clone(), stream))
            .or_default()
    }

    /// Credits processed output from a completed batch.
    pub fn credit_processed(&mut self, recycler: &Address, stream: WasteStream, kg: u64) {
        let inv = self.entry(recycler, stream);
        inv.processed_kg = inv.processed_kg.saturating_add(kg);
    }

    /// Sellable remainder: processed minus reserved.
    pub fn available(&self, recycler: &Address, stream: WasteStream) -> u64 {
        self.entries
            .get(&(recycler.clone(), stream))
            .map(|inv| inv.processed_kg - inv.reserved_kg)
            .unwrap_or(0)
    }

    /// Total processed history for the stream (never decremented).
    pub fn processed(&self, recycler: &Address, stream: WasteStream) -> u64 {
        self.entries
            .get(&(recycler.clone(), stream))
            .map(|inv| inv.processed_kg)
            .unwrap_or(0)
    }

    /// Errors unless at least `kg` is available (check phase of listing
    /// creation).
    pub fn check_available(
        &self,
        recycler: &Address,
        stream: WasteStream,
        kg: u64,
    ) -> Result<(), InventoryError> {
        let available = self.available(recycler, stream);
        if available < kg {
            return Err(InventoryError::InsufficientInventory {
                requested: kg,
                available,
            });
        }
        Ok(())
    }

    /// Reserves `kg` for a listing. Checks availability first; a failed
    /// reserve changes nothing.
    pub fn reserve(
        &mut self,
        recycler: &Address,
        stream: WasteStream,
        kg: u64,
    ) -> Result<(), InventoryError> {
        self.check_available(recycler, stream, kg)?;
        let inv = self.entry(recycler, stream);
        inv.reserved_kg += kg;
        Ok(())
    }

    /// Releases a cancelled listing's unsold remainder back to available.
    /// Only ever called with amounts previously reserved.
    pub fn release(&mut self, recycler: &Address, stream: WasteStream, kg: u64) {
        let inv = self.entry(recycler, stream);
        debug_assert!(inv.reserved_kg >= kg, "release exceeds reservation");
        inv.reserved_kg = inv.reserved_kg.saturating_sub(kg);
    }

    /// Snapshot of one recycler's inventory across all streams.
    pub fn snapshot(&self, recycler: &Address) -> InventorySnapshot {
        let mut snap = InventorySnapshot::default();
        for stream in WasteStream::ALL {
            snap.processed_by_stream[stream.index()] = self.processed(recycler, stream);
            snap.available_by_stream[stream.index()] = self.available(recycler, stream);
        }
        snap
    }
}
