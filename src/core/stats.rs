//! Aggregate statistics, driven entirely by the event log.
//!
//! Every mutating ledger operation appends exactly one [`Event`] and feeds it
//! through [`Stats::apply`] inside the same transaction. Counters are never
//! hand-edited at call sites, so the aggregate update for an operation lives
//! in one `match` arm instead of being scattered across the ledger.
//!
//! # Conservation invariant
//! `Stats::replay(log)` folds the log from an empty aggregate. At every
//! point in time the live aggregate equals the replay of the log so far;
//! drift is impossible unless an event is applied twice or skipped, and the
//! integration tests check the equality after long scenarios.
//!
//! The digest (`Stats::digest`) hashes the counters in a deterministic order
//! for cheap cross-checks, in the manner of a state root.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::core::registry::{Address, Role};
use crate::core::waste::{QualityGrade, WasteStream, STREAM_COUNT};

/// Which rate table an admin update touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateTable {
    BaseReward,
    QualityMultiplier,
    CarbonRate,
    CarbonQualityMultiplier,
}

/// One mutating ledger operation, in commit order. The log is append-only
/// and ids inside events are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    UserRegistered {
        address: Address,
        role: Role,
    },
    UserVerified {
        address: Address,
    },
    ReputationUpdated {
        address: Address,
        old_score: u32,
        new_score: u32,
        /// Auditable free-text reason supplied by the admin.
        reason: String,
    },
    TokensDeposited {
        account: Address,
        amount: u128,
    },
    CollectionCreated {
        id: u64,
        collector: Address,
        stream: WasteStream,
        weight_kg: u64,
    },
    CollectionVerified {
        id: u64,
        collector: Address,
        recycler: Address,
        stream: WasteStream,
        weight_kg: u64,
        quality: QualityGrade,
        reward: u128,
        carbon: u128,
    },
    CollectionRejected {
        id: u64,
        collector: Address,
        recycler: Address,
        stream: WasteStream,
    },
    BatchCreated {
        id: u64,
        recycler: Address,
        stream: WasteStream,
        input_count: u64,
    },
    BatchCompleted {
        id: u64,
        recycler: Address,
        stream: WasteStream,
        input_count: u64,
        output_weight_kg: u64,
        output_quality: QualityGrade,
        carbon: u128,
    },
    BatchCancelled {
        id: u64,
        recycler: Address,
        input_count: u64,
    },
    ListingCreated {
        id: u64,
        recycler: Address,
        stream: WasteStream,
        quantity_kg: u64,
        price_per_kg: u128,
    },
    ListingPurchased {
        id: u64,
        buyer: Address,
        recycler: Address,
        stream: WasteStream,
        quantity_kg: u64,
        total_price: u128,
        sold_out: bool,
    },
    ListingCancelled {
        id: u64,
        recycler: Address,
        stream: WasteStream,
        released_kg: u64,
    },
    RateTableUpdated {
        table: RateTable,
        stream: Option<WasteStream>,
        quality: Option<QualityGrade>,
        value: u128,
    },
}

/// Per-user denormalized counters. A single type serves collectors,
/// recyclers, and buyers; fields irrelevant to a role stay zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    // Collector side.
    pub collections_created: u64,
    pub collections_verified: u64,
    pub collections_rejected: u64,
    pub pending_verifications: u64,
    /// Verified weight only; pending and rejected material is not counted.
    pub total_weight_collected_kg: u64,
    /// Micro-tokens: collection rewards plus marketplace sales.
    pub total_earnings: u128,
    /// Grams CO2e credited at verification (collector) and completion (recycler).
    pub total_carbon_offset_g: u128,
    // Recycler side.
    pub verifications_performed: u64,
    pub batches_created: u64,
    pub batches_completed: u64,
    pub batches_cancelled: u64,
    pub processed_by_stream: [u64; STREAM_COUNT],
    pub listings_created: u64,
    pub active_listings: u64,
    pub listings_sold: u64,
    pub listings_cancelled: u64,
    // Buyer side.
    pub purchases: u64,
    pub total_spent: u128,
}

/// Platform-wide denormalized counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_users: u64,
    pub collectors: u64,
    pub recyclers: u64,
    pub corporate_partners: u64,
    pub admins: u64,
    pub verified_users: u64,
    pub total_collections: u64,
    pub pending_verifications: u64,
    pub verified_collections: u64,
    pub rejected_collections: u64,
    pub completed_collections: u64,
    pub total_weight_collected_kg: u64,
    pub weight_by_stream: [u64; STREAM_COUNT],
    pub total_rewards_paid: u128,
    pub total_carbon_offset_g: u128,
    pub total_batches: u64,
    pub completed_batches: u64,
    pub cancelled_batches: u64,
    pub total_processed_kg: u64,
    pub processed_by_stream: [u64; STREAM_COUNT],
    pub total_listings: u64,
    pub active_listings: u64,
    pub sold_listings: u64,
    pub cancelled_listings: u64,
    pub traded_kg: u64,
    /// Micro-tokens moved through marketplace purchases.
    pub trade_volume: u128,
}

/// The aggregate engine: per-user and platform counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    users: HashMap<Address, UserStats>,
    platform: PlatformStats,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-user snapshot; zeroed counters for unknown addresses.
    pub fn user(&self, address: &Address) -> UserStats {
        self.users.get(address).cloned().unwrap_or_default()
    }

    pub fn platform(&self) -> &PlatformStats {
        &self.platform
    }

    fn user_mut(&mut self, address: &Address) -> &mut UserStats {
        self.users.entry(address.clone()).or_default()
    }

    /// Applies one event's counter deltas. The single place aggregate
    /// bookkeeping happens; ledger operations never touch counters directly.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::UserRegistered { address, role } => {
                self.user_mut(address);
                self.platform.total_users += 1;
                match role {
                    Role::Collector => self.platform.collectors += 1,
                    Role::Recycler => self.platform.recyclers += 1,
                    Role::CorporatePartner => self.platform.corporate_partners += 1,
                    Role::Admin => self.platform.admins += 1,
                }
            }
            Event::UserVerified { .. } => {
                self.platform.verified_users += 1;
            }
            Event::ReputationUpdated { .. } => {
                // Reputation lives in the registry; no counter changes.
            }
            Event::TokensDeposited { .. } => {
                // Balances live in the token vault; no counter changes.
            }
            Event::CollectionCreated { collector, .. } => {
                let user = self.user_mut(collector);
                user.collections_created += 1;
                user.pending_verifications += 1;
                self.platform.total_collections += 1;
                self.platform.pending_verifications += 1;
            }
            Event::CollectionVerified {
                collector,
                recycler,
                stream,
                weight_kg,
                reward,
                carbon,
                ..
            } => {
                let user = self.user_mut(collector);
                user.collections_verified += 1;
                user.pending_verifications -= 1;
                user.total_weight_collected_kg += weight_kg;
                user.total_earnings += reward;
                user.total_carbon_offset_g += carbon;
                self.user_mut(recycler).verifications_performed += 1;
                self.platform.pending_verifications -= 1;
                self.platform.verified_collections += 1;
                self.platform.total_weight_collected_kg += weight_kg;
                self.platform.weight_by_stream[stream.index()] += weight_kg;
                self.platform.total_rewards_paid += reward;
                self.platform.total_carbon_offset_g += carbon;
            }
            Event::CollectionRejected { collector, recycler, .. } => {
                let user = self.user_mut(collector);
                user.collections_rejected += 1;
                user.pending_verifications -= 1;
                self.user_mut(recycler).verifications_performed += 1;
                self.platform.pending_verifications -= 1;
                self.platform.rejected_collections += 1;
            }
            Event::BatchCreated { recycler, .. } => {
                self.user_mut(recycler).batches_created += 1;
                self.platform.total_batches += 1;
            }
            Event::BatchCompleted {
                recycler,
                stream,
                input_count,
                output_weight_kg,
                carbon,
                ..
            } => {
                let user = self.user_mut(recycler);
                user.batches_completed += 1;
                user.processed_by_stream[stream.index()] += output_weight_kg;
                user.total_carbon_offset_g += carbon;
                self.platform.completed_batches += 1;
                self.platform.completed_collections += input_count;
                self.platform.total_processed_kg += output_weight_kg;
                self.platform.processed_by_stream[stream.index()] += output_weight_kg;
                self.platform.total_carbon_offset_g += carbon;
            }
            Event::BatchCancelled { recycler, .. } => {
                self.user_mut(recycler).batches_cancelled += 1;
                self.platform.cancelled_batches += 1;
            }
            Event::ListingCreated { recycler, .. } => {
                let user = self.user_mut(recycler);
                user.listings_created += 1;
                user.active_listings += 1;
                self.platform.total_listings += 1;
                self.platform.active_listings += 1;
            }
            Event::ListingPurchased {
                buyer,
                recycler,
                quantity_kg,
                total_price,
                sold_out,
                ..
            } => {
                let buyer_stats = self.user_mut(buyer);
                buyer_stats.purchases += 1;
                buyer_stats.total_spent += total_price;
                let seller = self.user_mut(recycler);
                seller.total_earnings += total_price;
                self.platform.traded_kg += quantity_kg;
                self.platform.trade_volume += total_price;
                if *sold_out {
                    self.user_mut(recycler).active_listings -= 1;
                    self.user_mut(recycler).listings_sold += 1;
                    self.platform.active_listings -= 1;
                    self.platform.sold_listings += 1;
                }
            }
            Event::ListingCancelled { recycler, .. } => {
                let user = self.user_mut(recycler);
                user.active_listings -= 1;
                user.listings_cancelled += 1;
                self.platform.active_listings -= 1;
                self.platform.cancelled_listings += 1;
            }
            Event::RateTableUpdated { .. } => {
                // Configuration, not activity; nothing to count.
            }
        }
    }

    /// Rebuilds the aggregate from scratch by folding the event log. The
    /// conservation invariant is `Stats::replay(log) == live_stats`.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a Event>) -> Stats {
        let mut stats = Stats::new();
        for event in events {
            stats.apply(event);
        }
        stats
    }

    /// Deterministic hex digest of every counter. Users are hashed in
    /// address order; same aggregate always yields the same digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        let p = &self.platform;
        for v in [
            p.total_users,
            p.collectors,
            p.recyclers,
            p.corporate_partners,
            p.admins,
            p.verified_users,
            p.total_collections,
            p.pending_verifications,
            p.verified_collections,
            p.rejected_collections,
            p.completed_collections,
            p.total_weight_collected_kg,
            p.total_batches,
            p.completed_batches,
            p.cancelled_batches,
            p.total_processed_kg,
            p.total_listings,
            p.active_listings,
            p.sold_listings,
            p.cancelled_listings,
            p.traded_kg,
        ] {
            hasher.update(v.to_le_bytes());
        }
        for v in [p.total_rewards_paid, p.total_carbon_offset_g, p.trade_volume] {
            hasher.update(v.to_le_bytes());
        }
        for arr in [&p.weight_by_stream, &p.processed_by_stream] {
            for v in arr {
                hasher.update(v.to_le_bytes());
            }
        }
        let mut addresses: Vec<&Address> = self.users.keys().collect();
        addresses.sort();
        for address in addresses {
            let u = &self.users[address];
            hasher.update(address.as_bytes());
            for v in [
                u.collections_created,
                u.collections_verified,
                u.collections_rejected,
                u.pending_verifications,
                u.total_weight_collected_kg,
                u.verifications_performed,
                u.batches_created,
                u.batches_completed,
                u.batches_cancelled,
                u.listings_created,
                u.active_listings,
                u.listings_sold,
                u.listings_cancelled,
                u.purchases,
            ] {
                hasher.update(v.to_le_bytes());
            }
            for v in [u.total_earnings, u.total_carbon_offset_g, u.total_spent] {
                hasher.update(v.to_le_bytes());
            }
            for v in &u.processed_by_stream {
                hasher.update(v.to_le_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }
}
