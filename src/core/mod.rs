// Core module for the AfriCycle ledger
//
// ATOMICITY GUARANTEES:
// =====================
// Every public write operation is one serialized transaction:
// 1. Take the single write lock over the whole store
// 2. Validate every precondition (no mutation yet)
// 3. Apply all effects, append the event, update the aggregates
// If any check fails, the operation returns before the first mutation, so a
// failed call never leaves partial state. The token movement in verification
// and purchase commits together with the status change.
//
// DETERMINISM:
// - No randomness and no system time: timestamps are caller-supplied
// - Same operation sequence always produces the same store, event log,
//   aggregates, and digest

pub mod collection;
pub mod inventory;
pub mod marketplace;
pub mod processing;
pub mod registry;
pub mod rewards;
pub mod stats;
pub mod token;
pub mod waste;

use serde::Serialize;
use std::sync::RwLock;

use crate::core::collection::{Collection, CollectionBook, CollectionError, Verdict};
use crate::core::inventory::{InventoryBook, InventorySnapshot};
use crate::core::marketplace::{Listing, ListingBook, MarketError};
use crate::core::processing::{BatchBook, ProcessingBatch, ProcessingError};
use crate::core::registry::{Address, RegistryError, ReputationEvent, Role, User, UserRegistry};
use crate::core::rewards::{compute_carbon_offset, compute_reward, RateTableSnapshot, RateTables};
use crate::core::stats::{Event, PlatformStats, RateTable, Stats, UserStats};
use crate::core::token::{TokenVault, RESERVE_ADDRESS};
use crate::core::waste::{QualityGrade, WasteStream};
use crate::error::{AfriCycleError, Result};

/// Contract-wide snapshot for dashboards: entity counts plus the token and
/// reward totals that sit next to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractStats {
    pub total_users: u64,
    pub total_collections: u64,
    pub total_batches: u64,
    pub total_listings: u64,
    pub reserve_balance: u128,
    pub total_rewards_paid: u128,
    pub trade_volume: u128,
}

/// Recycler-facing snapshot: counters plus live inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecyclerStats {
    pub stats: UserStats,
    pub inventory: InventorySnapshot,
}

/// The whole durable store. Component books are plain data; serialization
/// happens one level up in [`Ledger`].
#[derive(Debug, Default)]
struct LedgerState {
    registry: UserRegistry,
    collections: CollectionBook,
    batches: BatchBook,
    inventory: InventoryBook,
    listings: ListingBook,
    rates: RateTables,
    vault: TokenVault,
    stats: Stats,
    /// Append-only, in commit order. `Stats::replay(events)` must always
    /// equal `stats`.
    events: Vec<Event>,
}

impl LedgerState {
    /// Commits one event: aggregates first, then the log. Called exactly
    /// once per successful write operation.
    fn commit(&mut self, event: Event) {
        self.stats.apply(&event);
        self.events.push(event);
    }
}

/// The AfriCycle core ledger: registry, collection/processing/marketplace
/// books, reward engine, token vault, and aggregates behind one lock.
///
/// All write operations take `&self`; the internal `RwLock` serializes them
/// into a single total order (the on-chain execution model). Read getters
/// take the read lock and clone out point-in-time snapshots; they are safe
/// to call at arbitrary frequency and never mutate.
#[derive(Debug)]
pub struct Ledger {
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Creates a ledger with `admin` seeded as the verified Admin user.
    /// The admin role can only exist through this path; self-service
    /// registration refuses it.
    pub fn new(admin: Address, now: u64) -> Self {
        let mut state = LedgerState::default();
        state.registry.seed(admin.clone(), Role::Admin, now);
        state.commit(Event::UserRegistered { address: admin, role: Role::Admin });
        Self { state: RwLock::new(state) }
    }

    // ------------------------------------------------------------------
    // Registry operations
    // ------------------------------------------------------------------

    /// Self-service registration. One role per address, permanent.
    pub fn register(
        &self,
        caller: &Address,
        role: Role,
        name: String,
        location: String,
        contact_info: String,
        now: u64,
    ) -> Result<()> {
        let mut st = self.state.write().unwrap();
        if role == Role::Admin {
            return Err(RegistryError::Unauthorized(
                "the admin role cannot be self-registered".into(),
            )
            .into());
        }
        st.registry
            .register(caller.clone(), role, name, location, contact_info, now)?;
        st.commit(Event::UserRegistered { address: caller.clone(), role });
        Ok(())
    }

    /// Marks a user verified. Admin-only.
    pub fn verify_user(&self, caller: &Address, address: &Address) -> Result<()> {
        let mut st = self.state.write().unwrap();
        st.registry.require_role(caller, Role::Admin)?;
        let user = st
            .registry
            .get(address)
            .ok_or_else(|| RegistryError::UserNotFound(address.clone()))?;
        if user.verified {
            return Err(AfriCycleError::State(format!("user {} already verified", address)));
        }
        st.registry.set_verified(address)?;
        st.commit(Event::UserVerified { address: address.clone() });
        Ok(())
    }

    /// Replaces a user's reputation score. Admin-only; `new_score` must lie
    /// in `0..=1000`. The reason lands in the event log as the audit trail.
    pub fn update_reputation(
        &self,
        caller: &Address,
        address: &Address,
        new_score: u32,
        reason: &str,
    ) -> Result<()> {
        let mut st = self.state.write().unwrap();
        st.registry.require_role(caller, Role::Admin)?;
        let old_score = st.registry.update_reputation(address, new_score)?;
        st.commit(Event::ReputationUpdated {
            address: address.clone(),
            old_score,
            new_score,
            reason: reason.to_string(),
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Token operations
    // ------------------------------------------------------------------

    /// Credits stable tokens to an account. This is the on-ramp seam: the
    /// real token contract lives outside the core, and external transfers
    /// into the system land here.
    pub fn deposit(&self, account: &Address, amount: u128) -> Result<()> {
        let mut st = self.state.write().unwrap();
        if amount == 0 {
            return Err(AfriCycleError::Validation(
                "deposit amount must be greater than 0".into(),
            ));
        }
        st.vault.deposit(account, amount);
        st.commit(Event::TokensDeposited { account: account.clone(), amount });
        Ok(())
    }

    /// Funds the reward reserve (deposit to the ledger's own account).
    pub fn fund_reserve(&self, amount: u128) -> Result<()> {
        self.deposit(&RESERVE_ADDRESS.to_string(), amount)
    }

    // ------------------------------------------------------------------
    // Collection operations
    // ------------------------------------------------------------------

    /// Records a new waste collection. Caller must be a registered, admin-
    /// verified Collector; an optional pre-bound recycler must be a
    /// registered Recycler.
    #[allow(clippy::too_many_arguments)]
    pub fn create_collection(
        &self,
        caller: &Address,
        stream: WasteStream,
        weight_kg: u64,
        location: String,
        image_hash: String,
        pickup_time: u64,
        recycler: Option<Address>,
        now: u64,
    ) -> Result<u64> {
        let mut st = self.state.write().unwrap();
        // Checks.
        let user = st.registry.require_role(caller, Role::Collector)?;
        if !user.verified {
            return Err(
                RegistryError::Unauthorized(format!("collector {} is not verified", caller)).into(),
            );
        }
        CollectionBook::check_new(weight_kg, &image_hash)?;
        if let Some(r) = &recycler {
            st.registry.require_role(r, Role::Recycler)?;
        }
        // Effects.
        let id = st.collections.insert(
            caller.clone(),
            stream,
            weight_kg,
            location,
            image_hash,
            pickup_time,
            recycler,
            now,
        );
        st.commit(Event::CollectionCreated {
            id,
            collector: caller.clone(),
            stream,
            weight_kg,
        });
        Ok(id)
    }

    /// Accepts or rejects a pending collection.
    ///
    /// On accept: the reward and carbon offset are computed against the
    /// current rate tables, the reward moves from the reserve to the
    /// collector, and the status flips to Verified in one transaction. A
    /// short reserve aborts everything (`InsufficientContractBalance`) and
    /// the collection stays Pending.
    ///
    /// A collection pre-bound to a recycler is only verifiable by that
    /// recycler; an unbound one is bound retroactively to the caller.
    pub fn verify_collection(&self, caller: &Address, id: u64, verdict: Verdict) -> Result<()> {
        let mut st = self.state.write().unwrap();
        // Checks.
        st.registry.require_role(caller, Role::Recycler)?;
        let col = st.collections.check_verifiable(id, caller)?;
        let collector = col.collector.clone();
        let stream = col.stream;
        let weight_kg = col.weight_kg;
        match verdict {
            Verdict::Accept { quality } => {
                let reward = compute_reward(&st.rates, stream, weight_kg, quality);
                let carbon = compute_carbon_offset(&st.rates, stream, weight_kg, quality);
                let available = st.vault.reserve_balance();
                if available < reward {
                    return Err(CollectionError::InsufficientContractBalance {
                        required: reward,
                        available,
                    }
                    .into());
                }
                // Effects. The transfer cannot fail after the check above.
                st.vault.transfer(RESERVE_ADDRESS, &collector, reward)?;
                st.collections.mark_verified(id, caller, quality, reward, carbon)?;
                st.registry
                    .adjust_reputation(&collector, ReputationEvent::CollectionVerified);
                st.commit(Event::CollectionVerified {
                    id,
                    collector,
                    recycler: caller.clone(),
                    stream,
                    weight_kg,
                    quality,
                    reward,
                    carbon,
                });
            }
            Verdict::Reject => {
                st.collections.mark_rejected(id, caller)?;
                st.registry
                    .adjust_reputation(&collector, ReputationEvent::CollectionRejected);
                st.commit(Event::CollectionRejected {
                    id,
                    collector,
                    recycler: caller.clone(),
                    stream,
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Processing operations
    // ------------------------------------------------------------------

    /// Groups verified collections into a new Active batch. Every id must
    /// exist, be Verified, share one waste stream, appear once, and (if
    /// pre-bound) be bound to the caller. Inputs move to InProgress.
    pub fn create_processing_batch(
        &self,
        caller: &Address,
        collection_ids: &[u64],
        label: String,
        now: u64,
    ) -> Result<u64> {
        let mut st = self.state.write().unwrap();
        // Checks.
        st.registry.require_role(caller, Role::Recycler)?;
        if collection_ids.is_empty() {
            return Err(ProcessingError::EmptyBatch.into());
        }
        let mut seen = std::collections::HashSet::new();
        let mut stream: Option<WasteStream> = None;
        for &id in collection_ids {
            if !seen.insert(id) {
                return Err(ProcessingError::IneligibleInput {
                    id,
                    reason: "duplicated in input list".into(),
                }
                .into());
            }
            let col = st
                .collections
                .get(id)
                .ok_or(ProcessingError::IneligibleInput {
                    id,
                    reason: "collection does not exist".into(),
                })?;
            processing::check_input(col, caller)?;
            match stream {
                None => stream = Some(col.stream),
                Some(s) if s != col.stream => {
                    return Err(ProcessingError::MixedStreams(s, col.stream).into());
                }
                Some(_) => {}
            }
        }
        // Non-empty list, so stream is set.
        let stream = stream.expect("non-empty batch has a stream");
        // Effects. Transitions cannot fail: every input was checked Verified.
        for &id in collection_ids {
            st.collections.mark_in_progress(id)?;
        }
        let id = st
            .batches
            .insert(caller.clone(), label, collection_ids.to_vec(), stream, now);
        st.commit(Event::BatchCreated {
            id,
            recycler: caller.clone(),
            stream,
            input_count: collection_ids.len() as u64,
        });
        Ok(id)
    }

    /// Completes an Active batch: records the output, completes every input
    /// collection (setting `is_processed`), credits the recycler's inventory
    /// with the output weight, and credits the output's carbon offset.
    pub fn complete_processing(
        &self,
        caller: &Address,
        batch_id: u64,
        output_weight_kg: u64,
        output_quality: QualityGrade,
    ) -> Result<()> {
        let mut st = self.state.write().unwrap();
        // Checks.
        st.registry.require_role(caller, Role::Recycler)?;
        let batch = st.batches.check_open_owned(batch_id, caller)?;
        let inputs = batch.inputs.clone();
        let stream = batch.stream;
        let carbon = compute_carbon_offset(&st.rates, stream, output_weight_kg, output_quality);
        // Effects.
        st.batches.mark_completed(batch_id, output_weight_kg, output_quality)?;
        for &id in &inputs {
            st.collections.mark_completed(id)?;
        }
        st.inventory.credit_processed(caller, stream, output_weight_kg);
        st.commit(Event::BatchCompleted {
            id: batch_id,
            recycler: caller.clone(),
            stream,
            input_count: inputs.len() as u64,
            output_weight_kg,
            output_quality,
            carbon,
        });
        Ok(())
    }

    /// Cancels an Active batch; its inputs return to Verified and may be
    /// batched again.
    pub fn cancel_processing_batch(&self, caller: &Address, batch_id: u64) -> Result<()> {
        let mut st = self.state.write().unwrap();
        st.registry.require_role(caller, Role::Recycler)?;
        let batch = st.batches.check_open_owned(batch_id, caller)?;
        let inputs = batch.inputs.clone();
        st.batches.mark_cancelled(batch_id)?;
        for &id in &inputs {
            st.collections.release_to_verified(id)?;
        }
        st.commit(Event::BatchCancelled {
            id: batch_id,
            recycler: caller.clone(),
            input_count: inputs.len() as u64,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rate-table operations (admin-only; affect later computations only)
    // ------------------------------------------------------------------

    /// Sets the base reward rate (micro-tokens per kg) for a stream.
    pub fn set_reward_rate(&self, caller: &Address, stream: WasteStream, rate: u128) -> Result<()> {
        let mut st = self.state.write().unwrap();
        st.registry.require_role(caller, Role::Admin)?;
        st.rates.set_base_rate(stream, rate);
        st.commit(Event::RateTableUpdated {
            table: RateTable::BaseReward,
            stream: Some(stream),
            quality: None,
            value: rate,
        });
        Ok(())
    }

    /// Sets the quality multiplier (basis points) for a (stream, grade) pair.
    pub fn set_quality_multiplier(
        &self,
        caller: &Address,
        stream: WasteStream,
        quality: QualityGrade,
        multiplier: u128,
    ) -> Result<()> {
        let mut st = self.state.write().unwrap();
        st.registry.require_role(caller, Role::Admin)?;
        st.rates.set_quality_multiplier(stream, quality, multiplier);
        st.commit(Event::RateTableUpdated {
            table: RateTable::QualityMultiplier,
            stream: Some(stream),
            quality: Some(quality),
            value: multiplier,
        });
        Ok(())
    }

    /// Sets the carbon-offset rate (grams CO2e per kg) for a stream.
    pub fn update_carbon_offset_multiplier(
        &self,
        caller: &Address,
        stream: WasteStream,
        rate: u128,
    ) -> Result<()> {
        let mut st = self.state.write().unwrap();
        st.registry.require_role(caller, Role::Admin)?;
        st.rates.set_carbon_rate(stream, rate);
        st.commit(Event::RateTableUpdated {
            table: RateTable::CarbonRate,
            stream: Some(stream),
            quality: None,
            value: rate,
        });
        Ok(())
    }

    /// Sets the carbon quality multiplier (basis points) for a grade.
    pub fn update_quality_carbon_multiplier(
        &self,
        caller: &Address,
        quality: QualityGrade,
        multiplier: u128,
    ) -> Result<()> {
        let mut st = self.state.write().unwrap();
        st.registry.require_role(caller, Role::Admin)?;
        st.rates.set_carbon_quality_multiplier(quality, multiplier);
        st.commit(Event::RateTableUpdated {
            table: RateTable::CarbonQualityMultiplier,
            stream: None,
            quality: Some(quality),
            value: multiplier,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Marketplace operations
    // ------------------------------------------------------------------

    /// Lists processed material for sale. The quantity is reserved against
    /// the caller's available inventory immediately, so concurrent listings
    /// cannot oversell.
    #[allow(clippy::too_many_arguments)]
    pub fn create_listing(
        &self,
        caller: &Address,
        stream: WasteStream,
        quantity_kg: u64,
        price_per_kg: u128,
        quality: QualityGrade,
        description: String,
        now: u64,
    ) -> Result<u64> {
        let mut st = self.state.write().unwrap();
        // Checks.
        st.registry.require_role(caller, Role::Recycler)?;
        if quantity_kg == 0 {
            return Err(MarketError::InvalidQuantity.into());
        }
        st.inventory.check_available(caller, stream, quantity_kg)?;
        // Effects.
        st.inventory.reserve(caller, stream, quantity_kg)?;
        let id = st.listings.insert(
            caller.clone(),
            stream,
            quantity_kg,
            price_per_kg,
            quality,
            description,
            now,
        );
        st.commit(Event::ListingCreated {
            id,
            recycler: caller.clone(),
            stream,
            quantity_kg,
            price_per_kg,
        });
        Ok(id)
    }

    /// Buys part or all of an Active listing. The payment
    /// (`quantity × price_per_kg`) moves from the buyer to the recycler in
    /// the same transaction as the quantity decrement; a short buyer balance
    /// aborts everything.
    pub fn purchase_listing(&self, caller: &Address, id: u64, quantity_kg: u64) -> Result<()> {
        let mut st = self.state.write().unwrap();
        // Checks.
        st.registry.require_registered(caller)?;
        let listing = st.listings.check_purchasable(id, quantity_kg)?;
        let recycler = listing.recycler.clone();
        let stream = listing.stream;
        let total_price = (quantity_kg as u128) * listing.price_per_kg;
        st.vault.require_balance(caller, total_price)?;
        // Effects.
        st.vault.transfer(caller, &recycler, total_price)?;
        let sold_out = st.listings.record_purchase(id, quantity_kg)?;
        st.commit(Event::ListingPurchased {
            id,
            buyer: caller.clone(),
            recycler,
            stream,
            quantity_kg,
            total_price,
            sold_out,
        });
        Ok(())
    }

    /// Cancels an Active listing the caller owns; the unsold remainder
    /// returns to available inventory.
    pub fn cancel_listing(&self, caller: &Address, id: u64) -> Result<()> {
        let mut st = self.state.write().unwrap();
        let listing = st.listings.check_cancellable(id, caller)?;
        let stream = listing.stream;
        let released_kg = st.listings.mark_cancelled(id)?;
        st.inventory.release(caller, stream, released_kg);
        st.commit(Event::ListingCancelled {
            id,
            recycler: caller.clone(),
            stream,
            released_kg,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read operations (snapshot reads; no mutation)
    // ------------------------------------------------------------------

    pub fn get_user_profile(&self, address: &Address) -> Result<User> {
        let st = self.state.read().unwrap();
        st.registry
            .get(address)
            .cloned()
            .ok_or_else(|| RegistryError::UserNotFound(address.clone()).into())
    }

    pub fn get_collection(&self, id: u64) -> Result<Collection> {
        let st = self.state.read().unwrap();
        Ok(st.collections.require(id)?.clone())
    }

    pub fn get_processing_batch(&self, id: u64) -> Result<ProcessingBatch> {
        let st = self.state.read().unwrap();
        Ok(st.batches.require(id)?.clone())
    }

    pub fn get_listing(&self, id: u64) -> Result<Listing> {
        let st = self.state.read().unwrap();
        Ok(st.listings.require(id)?.clone())
    }

    /// Counters for any address; all-zero for addresses never seen.
    pub fn get_user_stats(&self, address: &Address) -> UserStats {
        let st = self.state.read().unwrap();
        st.stats.user(address)
    }

    /// Collector-facing counters; errors unless `address` is a Collector.
    pub fn get_collector_stats(&self, address: &Address) -> Result<UserStats> {
        let st = self.state.read().unwrap();
        st.registry.require_role(address, Role::Collector)?;
        Ok(st.stats.user(address))
    }

    /// Recycler-facing counters plus live inventory; errors unless `address`
    /// is a Recycler.
    pub fn get_recycler_stats(&self, address: &Address) -> Result<RecyclerStats> {
        let st = self.state.read().unwrap();
        st.registry.require_role(address, Role::Recycler)?;
        Ok(RecyclerStats {
            stats: st.stats.user(address),
            inventory: st.inventory.snapshot(address),
        })
    }

    pub fn get_platform_stats(&self) -> PlatformStats {
        let st = self.state.read().unwrap();
        st.stats.platform().clone()
    }

    pub fn get_contract_stats(&self) -> ContractStats {
        let st = self.state.read().unwrap();
        let platform = st.stats.platform();
        ContractStats {
            total_users: platform.total_users,
            total_collections: st.collections.len() as u64,
            total_batches: st.batches.len() as u64,
            total_listings: st.listings.len() as u64,
            reserve_balance: st.vault.reserve_balance(),
            total_rewards_paid: platform.total_rewards_paid,
            trade_volume: platform.trade_volume,
        }
    }

    /// Balance of the ledger's reward reserve.
    pub fn get_contract_token_balance(&self) -> u128 {
        let st = self.state.read().unwrap();
        st.vault.reserve_balance()
    }

    pub fn get_token_balance(&self, address: &Address) -> u128 {
        let st = self.state.read().unwrap();
        st.vault.balance_of(address)
    }

    /// Live inventory snapshot for a recycler.
    pub fn get_inventory(&self, recycler: &Address) -> InventorySnapshot {
        let st = self.state.read().unwrap();
        st.inventory.snapshot(recycler)
    }

    /// Effective rate tables at this moment.
    pub fn get_rate_tables(&self) -> RateTableSnapshot {
        let st = self.state.read().unwrap();
        st.rates.snapshot()
    }

    /// What a verification would pay right now, without mutating anything.
    pub fn simulate_reward(&self, stream: WasteStream, weight_kg: u64, quality: QualityGrade) -> u128 {
        let st = self.state.read().unwrap();
        compute_reward(&st.rates, stream, weight_kg, quality)
    }

    /// Carbon-offset estimate against the current tables.
    pub fn simulate_carbon_offset(
        &self,
        stream: WasteStream,
        weight_kg: u64,
        quality: QualityGrade,
    ) -> u128 {
        let st = self.state.read().unwrap();
        compute_carbon_offset(&st.rates, stream, weight_kg, quality)
    }

    /// The full event log in commit order (cloned).
    pub fn events(&self) -> Vec<Event> {
        let st = self.state.read().unwrap();
        st.events.clone()
    }

    /// Deterministic digest of the live aggregates. Equals
    /// `Stats::replay(self.events()).digest()` at all times.
    pub fn state_digest(&self) -> String {
        let st = self.state.read().unwrap();
        st.stats.digest()
    }
}
