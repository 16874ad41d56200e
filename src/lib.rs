pub mod core;
pub mod error;

pub use crate::error::{AfriCycleError, Result};

// Core API exports
pub use crate::core::{ContractStats, Ledger, RecyclerStats};
pub use crate::core::waste::{QualityGrade, WasteStream, GRADE_COUNT, STREAM_COUNT};
pub use crate::core::registry::{
    Address,
    RegistryError,
    ReputationEvent,
    Role,
    User,
    UserRegistry,
    REPUTATION_BONUS_VERIFIED,
    REPUTATION_MAX,
    REPUTATION_MIN,
    REPUTATION_NEUTRAL,
    REPUTATION_PENALTY_REJECTED,
};
pub use crate::core::collection::{
    is_valid_image_hash,
    Collection,
    CollectionBook,
    CollectionError,
    CollectionStatus,
    Verdict,
};
pub use crate::core::processing::{BatchBook, BatchStatus, ProcessingBatch, ProcessingError};
pub use crate::core::inventory::{InventoryBook, InventoryError, InventorySnapshot};
pub use crate::core::marketplace::{Listing, ListingBook, ListingStatus, MarketError};
pub use crate::core::rewards::{
    compute_carbon_offset,
    compute_reward,
    default_base_rate,
    default_carbon_quality_multiplier,
    default_carbon_rate,
    default_quality_multiplier,
    RateTableSnapshot,
    RateTables,
    MULTIPLIER_UNIT,
    SCALE,
};
pub use crate::core::token::{TokenError, TokenVault, MICRO_PER_TOKEN, RESERVE_ADDRESS};
pub use crate::core::stats::{Event, PlatformStats, RateTable, Stats, UserStats};
