//! Marketplace ledger: recycler-created listings of processed material.
//!
//! Quantity is reserved against the recycler's inventory when the listing is
//! created, not when it sells; overselling is impossible by construction.
//! Purchases may be partial; the listing becomes Sold when `remaining_kg`
//! reaches zero. Cancellation releases the unsold remainder back to the
//! recycler's available inventory.

use crate::error::AfriCycleError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::core::registry::Address;
use crate::core::waste::{QualityGrade, WasteStream};

/// Lifecycle status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStatus {
    Active,
    Sold,
    Cancelled,
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// A for-sale unit of processed material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: u64,
    pub recycler: Address,
    pub stream: WasteStream,
    /// Quantity originally listed; never changes after creation.
    pub quantity_kg: u64,
    /// Quantity still unsold. `quantity_kg` at creation, 0 once Sold.
    pub remaining_kg: u64,
    /// Micro-tokens per kg.
    pub price_per_kg: u128,
    pub quality: QualityGrade,
    pub description: String,
    pub status: ListingStatus,
    pub created_at: u64,
}

/// Errors produced by the marketplace ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Listing not found: {0}")]
    NotFound(u64),

    #[error("Invalid quantity: must be greater than 0")]
    InvalidQuantity,

    #[error("Invalid quantity: requested {requested} kg, listing has {remaining} kg remaining")]
    ExceedsRemaining { requested: u64, remaining: u64 },

    #[error("Caller {caller} does not own listing {id}")]
    NotOwner { id: u64, caller: Address },

    #[error("Listing {0} already sold out")]
    AlreadySold(u64),

    #[error("Listing {0} already cancelled")]
    AlreadyCancelled(u64),
}

impl From<MarketError> for AfriCycleError {
    fn from(e: MarketError) -> Self {
        match e {
            MarketError::NotFound(_) => AfriCycleError::NotFound(e.to_string()),
            MarketError::InvalidQuantity | MarketError::ExceedsRemaining { .. } => {
                AfriCycleError::Validation(e.to_string())
            }
            MarketError::NotOwner { .. } => AfriCycleError::Unauthorized(e.to_string()),
            MarketError::AlreadySold(_) | MarketError::AlreadyCancelled(_) => {
                AfriCycleError::State(e.to_string())
            }
        }
    }
}

/// Book of all listings, keyed by monotonic id.
#[derive(Debug)]
pub struct ListingBook {
    entries: HashMap<u64, Listing>,
    next_id: u64,
}

impl Default for ListingBook {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingBook {
    pub fn new() -> Self {
        Self { entries: HashMap::new(), next_id: 1 }
    }

    /// Inserts a new Active listing and returns its id. The quantity must
    /// already be reserved in the inventory book.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        recycler: Address,
        stream: WasteStream,
        quantity_kg: u64,
        price_per_kg: u128,
        quality: QualityGrade,
        description: String,
        now: u64,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            Listing {
                id,
                recycler,
                stream,
                quantity_kg,
                remaining_kg: quantity_kg,
                price_per_kg,
                quality,
                description,
                status: ListingStatus::Active,
                created_at: now,
            },
        );
        id
    }

    pub fn get(&self, id: u64) -> Option<&Listing> {
        self.entries.get(&id)
    }

    pub fn require(&self, id: u64) -> Result<&Listing, MarketError> {
        self.entries.get(&id).ok_or(MarketError::NotFound(id))
    }

    /// Check phase of a purchase: the listing must be Active and hold at
    /// least `quantity_kg`. Returns the listing for price computation.
    pub fn check_purchasable(&self, id: u64, quantity_kg: u64) -> Result<&Listing, MarketError> {
        if quantity_kg == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        let listing = self.require(id)?;
        match listing.status {
            ListingStatus::Active => {}
            ListingStatus::Sold => return Err(MarketError::AlreadySold(id)),
            ListingStatus::Cancelled => return Err(MarketError::AlreadyCancelled(id)),
        }
        if quantity_kg > listing.remaining_kg {
            return Err(MarketError::ExceedsRemaining {
                requested: quantity_kg,
                remaining: listing.remaining_kg,
            });
        }
        Ok(listing)
    }

    /// Applies a purchase: decrements `remaining_kg` and flips to Sold at
    /// zero. Caller must have passed `check_purchasable`. Returns true if
    /// the listing sold out.
    pub fn record_purchase(&mut self, id: u64, quantity_kg: u64) -> Result<bool, MarketError> {
        // Re-validate so the book stays safe standalone.
        self.check_purchasable(id, quantity_kg)?;
        let listing = self.entries.get_mut(&id).ok_or(MarketError::NotFound(id))?;
        listing.remaining_kg -= quantity_kg;
        let sold_out = listing.remaining_kg == 0;
        if sold_out {
            listing.status = ListingStatus::Sold;
        }
        Ok(sold_out)
    }

    /// Check phase of a cancellation: caller must own the listing and it
    /// must still be Active.
    pub fn check_cancellable(&self, id: u64, caller: &Address) -> Result<&Listing, MarketError> {
        let listing = self.require(id)?;
        if &listing.recycler != caller {
            return Err(MarketError::NotOwner { id, caller: caller.clone() });
        }
        match listing.status {
            ListingStatus::Active => Ok(listing),
            ListingStatus::Sold => Err(MarketError::AlreadySold(id)),
            ListingStatus::Cancelled => Err(MarketError::AlreadyCancelled(id)),
        }
    }

    /// Active → Cancelled. Returns the unsold remainder to release back to
    /// inventory. Caller must have passed `check_cancellable`.
    pub fn mark_cancelled(&mut self, id: u64) -> Result<u64, MarketError> {
        let listing = self.entries.get_mut(&id).ok_or(MarketError::NotFound(id))?;
        match listing.status {
            ListingStatus::Active => {}
            ListingStatus::Sold => return Err(MarketError::AlreadySold(id)),
            ListingStatus::Cancelled => return Err(MarketError::AlreadyCancelled(id)),
        }
        listing.status = ListingStatus::Cancelled;
        Ok(listing.remaining_kg)
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

    fn book_with_listing(qty: u64) -> (ListingBook, u64) {
        let mut book = ListingBook::new();
        let id = book.insert(
            "rey".into(),
            WasteStream::Plastic,
            qty,
            10_000,
            QualityGrade::High,
            "baled PET".into(),
            0,
        );
        (book, id)
    }

    #[test]
    fn test_partial_purchase_keeps_active() {
        let (mut book, id) = book_with_listing(50);
        let sold_out = book.record_purchase(id, 20).unwrap();
        assert!(!sold_out);
        let listing = book.get(id).unwrap();
        assert_eq!(listing.remaining_kg, 30);
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(listing.quantity_kg, 50);
    }

    #[test]
    fn test_full_purchase_marks_sold() {
        let (mut book, id) = book_with_listing(50);
        book.record_purchase(id, 20).unwrap();
        let sold_out = book.record_purchase(id, 30).unwrap();
        assert!(sold_out);
        assert_eq!(book.get(id).unwrap().status, ListingStatus::Sold);
        // Further purchases fail.
        assert_eq!(book.record_purchase(id, 1), Err(MarketError::AlreadySold(id)));
    }

    #[test]
    fn test_purchase_exceeding_remaining_fails() {
        let (mut book, id) = book_with_listing(50);
        let r = book.record_purchase(id, 51);
        assert_eq!(r, Err(MarketError::ExceedsRemaining { requested: 51, remaining: 50 }));
        assert_eq!(book.get(id).unwrap().remaining_kg, 50);
    }

    #[test]
    fn test_zero_quantity_purchase_fails() {
        let (book, id) = book_with_listing(50);
        assert_eq!(book.check_purchasable(id, 0), Err(MarketError::InvalidQuantity));
    }

    #[test]
    fn test_cancel_returns_remainder() {
        let (mut book, id) = book_with_listing(50);
        book.record_purchase(id, 20).unwrap();
        book.check_cancellable(id, &"rey".into()).unwrap();
        let released = book.mark_cancelled(id).unwrap();
        assert_eq!(released, 30);
        assert_eq!(book.get(id).unwrap().status, ListingStatus::Cancelled);
    }

    #[test]
    fn test_cancel_owner_only() {
        let (book, id) = book_with_listing(50);
        let r = book.check_cancellable(id, &"mallory".into());
        assert!(matches!(r, Err(MarketError::NotOwner { .. })));
    }

    #[test]
    fn test_cancel_sold_listing_fails() {
        let (mut book, id) = book_with_listing(10);
        book.record_purchase(id, 10).unwrap();
        let r = book.check_cancellable(id, &"rey".into());
        assert_eq!(r.err(), Some(MarketError::AlreadySold(id)));
    }

    #[test]
    fn test_not_found() {
        let book = ListingBook::new();
        assert_eq!(book.require(7).unwrap_err(), MarketError::NotFound(7));
    }
}
