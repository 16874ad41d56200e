//! Processing ledger: recycler-owned batches that turn verified collections
//! into finished material.
//!
//! A batch consumes a non-empty set of collection ids. Each input must be
//! Verified, share a single waste stream, and (if pre-bound) be bound to the
//! batch's recycler. Exclusivity (each collection in at most one open batch)
//! falls out of the collection state machine: batching moves inputs to
//! InProgress, so a second batch referencing the same id fails the
//! Verified check. Cancelling a batch releases its inputs back to Verified.
//!
//! Output weight is not coupled to the sum of input weights; processing
//! yield loss (or densification gain) is unconstrained.

use crate::error::AfriCycleError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::core::collection::{Collection, CollectionStatus};
use crate::core::registry::Address;
use crate::core::waste::{QualityGrade, WasteStream};

/// Lifecycle status of a processing batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::Active => "active",
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// A recycler-owned grouping of verified collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingBatch {
    pub id: u64,
    pub recycler: Address,
    pub label: String,
    /// Input collection ids; all share `stream`.
    pub inputs: Vec<u64>,
    pub stream: WasteStream,
    pub status: BatchStatus,
    /// Finished-goods weight, set at completion. Not bounded by the input sum.
    pub output_weight_kg: u64,
    pub output_quality: Option<QualityGrade>,
    pub created_at: u64,
}

/// Errors produced by the processing ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("Batch not found: {0}")]
    NotFound(u64),

    #[error("Invalid input: batch requires at least one collection id")]
    EmptyBatch,

    #[error("Invalid input: collection {id} is not eligible for batching ({reason})")]
    IneligibleInput { id: u64, reason: String },

    #[error("Invalid input: collections mix waste streams ({0} and {1})")]
    MixedStreams(WasteStream, WasteStream),

    #[error("Batch {0} already closed: status is {1}")]
    AlreadyCompleted(u64, BatchStatus),

    #[error("Caller {caller} does not own batch {id}")]
    NotBatchOwner { id: u64, caller: Address },
}

impl From<ProcessingError> for AfriCycleError {
    fn from(e: ProcessingError) -> Self {
        match e {
            ProcessingError::NotFound(_) => AfriCycleError::NotFound(e.to_string()),
            ProcessingError::EmptyBatch
            | ProcessingError::IneligibleInput { .. }
            | ProcessingError::MixedStreams(..) => AfriCycleError::Validation(e.to_string()),
            ProcessingError::AlreadyCompleted(..) => AfriCycleError::State(e.to_string()),
            ProcessingError::NotBatchOwner { .. } => AfriCycleError::Unauthorized(e.to_string()),
        }
    }
}

/// Validates one candidate input against the batching rules (check phase).
/// `collection` is the looked-up entry for an id in the candidate list.
pub fn check_input(
    collection: &Collection,
    recycler: &Address,
) -> Result<(), ProcessingError> {
    if collection.status != CollectionStatus::Verified {
        return Err(ProcessingError::IneligibleInput {
            id: collection.id,
            reason: format!("status is {}", collection.status),
        });
    }
    if let Some(bound) = &collection.recycler {
        if bound != recycler {
            return Err(ProcessingError::IneligibleInput {
                id: collection.id,
                reason: format!("bound to recycler {}", bound),
            });
        }
    }
    Ok(())
}

/// Book of all processing batches, keyed by monotonic id.
#[derive(Debug)]
pub struct BatchBook {
    entries: HashMap<u64, ProcessingBatch>,
    next_id: u64,
}

impl Default for BatchBook {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchBook {
    pub fn new() -> Self {
        Self { entries: HashMap::new(), next_id: 1 }
    }

    /// Inserts a new Active batch and returns its id. Inputs must have
    /// passed `check_input` and stream agreement.
    pub fn insert(
        &mut self,
        recycler: Address,
        label: String,
        inputs: Vec<u64>,
        stream: WasteStream,
        now: u64,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            ProcessingBatch {
                id,
                recycler,
                label,
                inputs,
                stream,
                status: BatchStatus::Active,
                output_weight_kg: 0,
                output_quality: None,
                created_at: now,
            },
        );
        id
    }

    pub fn get(&self, id: u64) -> Option<&ProcessingBatch> {
        self.entries.get(&id)
    }

    pub fn require(&self, id: u64) -> Result<&ProcessingBatch, ProcessingError> {
        self.entries.get(&id).ok_or(ProcessingError::NotFound(id))
    }

    /// Check phase for completion/cancellation: the batch must exist, be
    /// owned by `caller`, and still be Active.
    pub fn check_open_owned(
        &self,
        id: u64,
        caller: &Address,
    ) -> Result<&ProcessingBatch, ProcessingError> {
        let batch = self.require(id)?;
        if &batch.recycler != caller {
            return Err(ProcessingError::NotBatchOwner { id, caller: caller.clone() });
        }
        if batch.status != BatchStatus::Active {
            return Err(ProcessingError::AlreadyCompleted(id, batch.status));
        }
        Ok(batch)
    }

    /// Active → Completed; records the output. Exactly once per batch.
    pub fn mark_completed(
        &mut self,
        id: u64,
        output_weight_kg: u64,
        output_quality: QualityGrade,
    ) -> Result<(), ProcessingError> {
        let batch = self.entries.get_mut(&id).ok_or(ProcessingError::NotFound(id))?;
        if batch.status != BatchStatus::Active {
            return Err(ProcessingError::AlreadyCompleted(id, batch.status));
        }
        batch.status = BatchStatus::Completed;
        batch.output_weight_kg = output_weight_kg;
        batch.output_quality = Some(output_quality);
        Ok(())
    }

    /// Active → Cancelled (terminal).
    pub fn mark_cancelled(&mut self, id: u64) -> Result<(), ProcessingError> {
        let batch = self.entries.get_mut(&id).ok_or(ProcessingError::NotFound(id))?;
        if batch.status != BatchStatus::Active {
            return Err(ProcessingError::AlreadyCompleted(id, batch.status));
        }
        batch.status = BatchStatus::Cancelled;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified_collection(id: u64, recycler: Option<&str>) -> Collection {
        Collection {
            id,
            collector: "alice".into(),
            stream: WasteStream::Plastic,
            weight_kg: 10,
            location: "accra".into(),
            image_hash: "aa".into(),
            status: CollectionStatus::Verified,
            quality: Some(QualityGrade::Medium),
            created_at: 0,
            pickup_time: 0,
            reward_amount: 0,
            carbon_offset: 0,
            is_processed: false,
            recycler: recycler.map(String::from),
        }
    }

    #[test]
    fn test_check_input_requires_verified() {
        let mut col = verified_collection(1, None);
        col.status = CollectionStatus::Pending;
        let r = check_input(&col, &"rey".into());
        assert!(matches!(r, Err(ProcessingError::IneligibleInput { id: 1, .. })));
    }

    #[test]
    fn test_check_input_respects_binding() {
        let col = verified_collection(1, Some("rey"));
        assert!(check_input(&col, &"rey".into()).is_ok());
        assert!(check_input(&col, &"other".into()).is_err());
        // Unbound verified collections are eligible for anyone.
        let col = verified_collection(2, None);
        assert!(check_input(&col, &"other".into()).is_ok());
    }

    #[test]
    fn test_complete_once() {
        let mut book = BatchBook::new();
        let id = book.insert("rey".into(), "b1".into(), vec![1, 2], WasteStream::Plastic, 0);
        book.mark_completed(id, 90, QualityGrade::High).unwrap();
        let batch = book.get(id).unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.output_weight_kg, 90);
        assert_eq!(batch.output_quality, Some(QualityGrade::High));

        let r = book.mark_completed(id, 90, QualityGrade::High);
        assert_eq!(r, Err(ProcessingError::AlreadyCompleted(id, BatchStatus::Completed)));
    }

    #[test]
    fn test_check_open_owned() {
        let mut book = BatchBook::new();
        let id = book.insert("rey".into(), "b1".into(), vec![1], WasteStream::Metal, 0);
        assert!(book.check_open_owned(id, &"rey".into()).is_ok());
        assert!(matches!(
            book.check_open_owned(id, &"other".into()),
            Err(ProcessingError::NotBatchOwner { .. })
        ));
        book.mark_cancelled(id).unwrap();
        assert!(matches!(
            book.check_open_owned(id, &"rey".into()),
            Err(ProcessingError::AlreadyCompleted(..))
        ));
        assert!(matches!(
            book.check_open_owned(99, &"rey".into()),
            Err(ProcessingError::NotFound(99))
        ));
    }

    #[test]
    fn test_cancel_is_terminal() {
        let mut book = BatchBook::new();
        let id = book.insert("rey".into(), "b1".into(), vec![1], WasteStream::Metal, 0);
        book.mark_cancelled(id).unwrap();
        assert_eq!(book.get(id).unwrap().status, BatchStatus::Cancelled);
        let r = book.mark_completed(id, 10, QualityGrade::Low);
        assert_eq!(r, Err(ProcessingError::AlreadyCompleted(id, BatchStatus::Cancelled)));
    }

    #[test]
    fn test_output_weight_unconstrained() {
        let mut book = BatchBook::new();
        let id = book.insert("rey".into(), "b1".into(), vec![1], WasteStream::Plastic, 0);
        // Output may exceed the input sum (densification) or be zero.
        book.mark_completed(id, 10_000, QualityGrade::Low).unwrap();
        assert_eq!(book.get(id).unwrap().output_weight_kg, 10_000);
    }
}
