//! Waste-collection ledger: per-collection state machine and the book of all
//! collections keyed by monotonic id.
//!
//! # State machine
//! ```text
//! Pending --accept--> Verified --(batched)--> InProgress --(batch completes)--> Completed
//! Pending --reject--> Rejected (terminal)
//! ```
//! Transitions are monotonic and one-directional; the only reversal is the
//! batch-cancellation path InProgress → Verified, which re-exposes inputs of
//! a cancelled batch for re-batching and never skips a state.
//!
//! # Invariants
//! - Ids are assigned sequentially and never reused, even after Rejected.
//! - Every transition validates the current status before mutating; a failed
//!   transition leaves the collection unchanged.
//! - Once Completed, a collection is immutable apart from `is_processed`,
//!   which the processing ledger sets in the same transition.

use crate::error::AfriCycleError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::core::registry::Address;
use crate::core::waste::{QualityGrade, WasteStream};

/// Lifecycle status of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionStatus {
    Pending,
    Verified,
    Rejected,
    InProgress,
    Completed,
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CollectionStatus::Pending => "pending",
            CollectionStatus::Verified => "verified",
            CollectionStatus::Rejected => "rejected",
            CollectionStatus::InProgress => "in-progress",
            CollectionStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// Recycler decision on a pending collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept { quality: QualityGrade },
    Reject,
}

/// A single reported unit of gathered waste.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: u64,
    pub collector: Address,
    pub stream: WasteStream,
    pub weight_kg: u64,
    pub location: String,
    /// Opaque reference into the off-chain proof store; the ledger only
    /// checks the hex format and never interprets the content.
    pub image_hash: String,
    pub status: CollectionStatus,
    /// Assigned by the verifying recycler on accept; `None` while Pending
    /// and after Rejected.
    pub quality: Option<QualityGrade>,
    pub created_at: u64,
    pub pickup_time: u64,
    /// Micro-tokens paid at verification; 0 until then and after rejection.
    pub reward_amount: u128,
    /// Grams CO2e estimated at verification.
    pub carbon_offset: u128,
    /// Set when the owning batch completes. The only field that may change
    /// after Completed is reached.
    pub is_processed: bool,
    /// Verifying recycler. Either pre-bound at creation or bound
    /// retroactively by the first verification.
    pub recycler: Option<Address>,
}

/// Errors produced by the collection ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("Collection not found: {0}")]
    NotFound(u64),

    #[error("Invalid weight: must be greater than 0")]
    InvalidWeight,

    #[error("Invalid image hash: not a hex digest")]
    InvalidImageHash,

    #[error("Collection {0} already verified: status is {1}")]
    AlreadyVerified(u64, CollectionStatus),

    #[error("Invalid transition for collection {id}: {from} -> {to}")]
    InvalidTransition {
        id: u64,
        from: CollectionStatus,
        to: CollectionStatus,
    },

    #[error("Collection {id} is bound to recycler {bound}, not {caller}")]
    BoundToOtherRecycler {
        id: u64,
        bound: Address,
        caller: Address,
    },

    #[error("Insufficient contract balance: reward {required}, reserve holds {available}")]
    InsufficientContractBalance { required: u128, available: u128 },
}

impl From<CollectionError> for AfriCycleError {
    fn from(e: CollectionError) -> Self {
        match e {
            CollectionError::NotFound(_) => AfriCycleError::NotFound(e.to_string()),
            CollectionError::InvalidWeight | CollectionError::InvalidImageHash => {
                AfriCycleError::Validation(e.to_string())
            }
            CollectionError::AlreadyVerified(..) | CollectionError::InvalidTransition { .. } => {
                AfriCycleError::State(e.to_string())
            }
            CollectionError::BoundToOtherRecycler { .. } => {
                AfriCycleError::Unauthorized(e.to_string())
            }
            CollectionError::InsufficientContractBalance { .. } => {
                AfriCycleError::Resource(e.to_string())
            }
        }
    }
}

/// Returns true if `hash` looks like a hex digest (non-empty, even length,
/// hex alphabet). The content behind it is never inspected.
pub fn is_valid_image_hash(hash: &str) -> bool {
    !hash.is_empty() && hash.len() % 2 == 0 && hex::decode(hash).is_ok()
}

/// Book of all collections, keyed by monotonic id. Plain data; the owning
/// ledger serializes access.
#[derive(Debug)]
pub struct CollectionBook {
    entries: HashMap<u64, Collection>,
    next_id: u64,
}

impl Default for CollectionBook {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionBook {
    pub fn new() -> Self {
        Self { entries: HashMap::new(), next_id: 1 }
    }

    /// Validates creation inputs without mutating (check phase).
    pub fn check_new(weight_kg: u64, image_hash: &str) -> Result<(), CollectionError> {
        if weight_kg == 0 {
            return Err(CollectionError::InvalidWeight);
        }
        if !is_valid_image_hash(image_hash) {
            return Err(CollectionError::InvalidImageHash);
        }
        Ok(())
    }

    /// Inserts a new Pending collection and returns its id. Inputs must have
    /// passed `check_new`.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        collector: Address,
        stream: WasteStream,
        weight_kg: u64,
        location: String,
        image_hash: String,
        pickup_time: u64,
        recycler: Option<Address>,
        now: u64,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            Collection {
                id,
                collector,
                stream,
                weight_kg,
                location,
                image_hash,
                status: CollectionStatus::Pending,
                quality: None,
                created_at: now,
                pickup_time,
                reward_amount: 0,
                carbon_offset: 0,
                is_processed: false,
                recycler,
            },
        );
        id
    }

    pub fn get(&self, id: u64) -> Option<&Collection> {
        self.entries.get(&id)
    }

    pub fn require(&self, id: u64) -> Result<&Collection, CollectionError> {
        self.entries.get(&id).ok_or(CollectionError::NotFound(id))
    }

    /// Check phase of verification: the collection must exist, be Pending,
    /// and (if pre-bound) be bound to `caller`.
    pub fn check_verifiable(&self, id: u64, caller: &Address) -> Result<&Collection, CollectionError> {
        let col = self.require(id)?;
        if col.status != CollectionStatus::Pending {
            return Err(CollectionError::AlreadyVerified(id, col.status));
        }
        if let Some(bound) = &col.recycler {
            if bound != caller {
                return Err(CollectionError::BoundToOtherRecycler {
                    id,
                    bound: bound.clone(),
                    caller: caller.clone(),
                });
            }
        }
        Ok(col)
    }

    /// Pending → Verified. Binds the verifying recycler (retroactively for
    /// previously unbound collections) and records quality, reward, and
    /// carbon figures. Caller must have passed `check_verifiable`.
    pub fn mark_verified(
        &mut self,
        id: u64,
        recycler: &Address,
        quality: QualityGrade,
        reward_amount: u128,
        carbon_offset: u128,
    ) -> Result<(), CollectionError> {
        let col = self.entries.get_mut(&id).ok_or(CollectionError::NotFound(id))?;
        if col.status != CollectionStatus::Pending {
            return Err(CollectionError::AlreadyVerified(id, col.status));
        }
        col.status = CollectionStatus::Verified;
        col.quality = Some(quality);
        col.reward_amount = reward_amount;
        col.carbon_offset = carbon_offset;
        col.recycler = Some(recycler.clone());
        Ok(())
    }

    /// Pending → Rejected (terminal).
    pub fn mark_rejected(&mut self, id: u64, recycler: &Address) -> Result<(), CollectionError> {
        let col = self.entries.get_mut(&id).ok_or(CollectionError::NotFound(id))?;
        if col.status != CollectionStatus::Pending {
            return Err(CollectionError::AlreadyVerified(id, col.status));
        }
        col.status = CollectionStatus::Rejected;
        col.recycler = Some(recycler.clone());
        Ok(())
    }

    /// Verified → InProgress (collection enters an active batch).
    pub fn mark_in_progress(&mut self, id: u64) -> Result<(), CollectionError> {
        self.transition(id, CollectionStatus::Verified, CollectionStatus::InProgress)
    }

    /// InProgress → Completed; sets `is_processed` in the same step.
    pub fn mark_completed(&mut self, id: u64) -> Result<(), CollectionError> {
        self.transition(id, CollectionStatus::InProgress, CollectionStatus::Completed)?;
        // transition() verified existence above.
        if let Some(col) = self.entries.get_mut(&id) {
            col.is_processed = true;
        }
        Ok(())
    }

    /// InProgress → Verified (owning batch was cancelled); the collection
    /// becomes eligible for a new batch.
    pub fn release_to_verified(&mut self, id: u64) -> Result<(), CollectionError> {
        self.transition(id, CollectionStatus::InProgress, CollectionStatus::Verified)
    }

    fn transition(
        &mut self,
        id: u64,
        from: CollectionStatus,
        to: CollectionStatus,
    ) -> Result<(), CollectionError> {
        let col = self.entries.get_mut(&id).ok_or(CollectionError::NotFound(id))?;
        if col.status != from {
            return Err(CollectionError::InvalidTransition { id, from: col.status, to });
        }
        col.status = to;
        Ok(())
    }

    /// Number of collections ever created (ids are never reused).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All ids in ascending order (deterministic iteration for digests and
    /// replay checks).
    pub fn ids_sorted(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "deadbeef";

    fn book_with_one(recycler: Option<&str>) -> (CollectionBook, u64) {
        let mut book = CollectionBook::new();
        let id = book.insert(
            "alice".into(),
            WasteStream::Plastic,
            100,
            "accra".into(),
            HASH.into(),
            1000,
            recycler.map(String::from),
            500,
        );
        (book, id)
    }

    #[test]
    fn test_check_new_rejects_zero_weight() {
        assert_eq!(CollectionBook::check_new(0, HASH), Err(CollectionError::InvalidWeight));
        assert!(CollectionBook::check_new(1, HASH).is_ok());
    }

    #[test]
    fn test_check_new_rejects_bad_hash() {
        assert_eq!(
            CollectionBook::check_new(1, "not-hex"),
            Err(CollectionError::InvalidImageHash)
        );
        assert_eq!(CollectionBook::check_new(1, ""), Err(CollectionError::InvalidImageHash));
        assert_eq!(CollectionBook::check_new(1, "abc"), Err(CollectionError::InvalidImageHash));
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let (mut book, first) = book_with_one(None);
        let second = book.insert(
            "alice".into(),
            WasteStream::Metal,
            5,
            "accra".into(),
            HASH.into(),
            0,
            None,
            0,
        );
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_happy_path_transitions() {
        let (mut book, id) = book_with_one(None);
        book.mark_verified(id, &"rey".into(), QualityGrade::High, 42, 7).unwrap();
        let col = book.get(id).unwrap();
        assert_eq!(col.status, CollectionStatus::Verified);
        assert_eq!(col.quality, Some(QualityGrade::High));
        assert_eq!(col.reward_amount, 42);
        assert_eq!(col.recycler, Some("rey".to_string()));

        book.mark_in_progress(id).unwrap();
        assert_eq!(book.get(id).unwrap().status, CollectionStatus::InProgress);

        book.mark_completed(id).unwrap();
        let col = book.get(id).unwrap();
        assert_eq!(col.status, CollectionStatus::Completed);
        assert!(col.is_processed);
    }

    #[test]
    fn test_double_verify_fails() {
        let (mut book, id) = book_with_one(None);
        book.mark_verified(id, &"rey".into(), QualityGrade::Low, 1, 1).unwrap();
        let r = book.mark_verified(id, &"rey".into(), QualityGrade::Low, 1, 1);
        assert_eq!(
            r,
            Err(CollectionError::AlreadyVerified(id, CollectionStatus::Verified))
        );
    }

    #[test]
    fn test_reject_is_terminal() {
        let (mut book, id) = book_with_one(None);
        book.mark_rejected(id, &"rey".into()).unwrap();
        assert_eq!(book.get(id).unwrap().status, CollectionStatus::Rejected);
        assert!(book.mark_in_progress(id).is_err());
        assert!(book.mark_verified(id, &"rey".into(), QualityGrade::Low, 1, 1).is_err());
    }

    #[test]
    fn test_no_skipping_states() {
        let (mut book, id) = book_with_one(None);
        // Pending cannot jump to InProgress or Completed.
        assert!(matches!(
            book.mark_in_progress(id),
            Err(CollectionError::InvalidTransition { .. })
        ));
        assert!(matches!(
            book.mark_completed(id),
            Err(CollectionError::InvalidTransition { .. })
        ));
        // Failed transitions leave the status unchanged.
        assert_eq!(book.get(id).unwrap().status, CollectionStatus::Pending);
    }

    #[test]
    fn test_bound_collection_rejects_other_verifier() {
        let (book, id) = book_with_one(Some("rey"));
        assert!(book.check_verifiable(id, &"rey".into()).is_ok());
        let r = book.check_verifiable(id, &"mallory".into());
        assert!(matches!(r, Err(CollectionError::BoundToOtherRecycler { .. })));
    }

    #[test]
    fn test_unbound_collection_binds_retroactively() {
        let (mut book, id) = book_with_one(None);
        assert!(book.check_verifiable(id, &"anyone".into()).is_ok());
        book.mark_verified(id, &"anyone".into(), QualityGrade::Medium, 1, 1).unwrap();
        assert_eq!(book.get(id).unwrap().recycler, Some("anyone".to_string()));
    }

    #[test]
    fn test_release_to_verified() {
        let (mut book, id) = book_with_one(None);
        book.mark_verified(id, &"rey".into(), QualityGrade::Low, 1, 1).unwrap();
        book.mark_in_progress(id).unwrap();
        book.release_to_verified(id).unwrap();
        assert_eq!(book.get(id).unwrap().status, CollectionStatus::Verified);
        // And it can be batched again.
        book.mark_in_progress(id).unwrap();
    }

    #[test]
    fn test_require_not_found() {
        let book = CollectionBook::new();
        assert_eq!(book.require(99).unwrap_err(), CollectionError::NotFound(99));
    }
}
