//! User registry: roles, verification status, and reputation.
//!
//! Every other component consults `require_role` before mutating anything,
//! so the registry is the leaf dependency of the whole ledger. Roles are a
//! closed enum matched exhaustively at each gate; there is no string or hash
//! comparison anywhere in the dispatch path.
//!
//! # Reputation
//! Scores are integers in `0..=REPUTATION_MAX` with a neutral default of
//! `REPUTATION_NEUTRAL`. Admin updates must land inside the range
//! (`InvalidRange` otherwise); drift from ledger events saturates at the
//! bounds instead of failing.

use crate::error::AfriCycleError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// User identity (account address). Alias for `String`.
pub type Address = String;

/// Lower and upper bounds of the reputation range.
pub const REPUTATION_MIN: u32 = 0;
pub const REPUTATION_MAX: u32 = 1000;

/// Score assigned at registration (neutral midpoint).
pub const REPUTATION_NEUTRAL: u32 = 500;

/// Reputation drift applied when a user's collection is verified.
pub const REPUTATION_BONUS_VERIFIED: u32 = 10;

/// Reputation drift applied when a user's collection is rejected.
pub const REPUTATION_PENALTY_REJECTED: u32 = 25;

/// Actor role. Permanent once assigned; an address holds exactly one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Collector,
    Recycler,
    CorporatePartner,
    Admin,
}

impl Role {
    /// Canonical lowercase name (deterministic; used in events and CLI output).
    pub fn as_canonical(&self) -> &'static str {
        match self {
            Role::Collector => "collector",
            Role::Recycler => "recycler",
            Role::CorporatePartner => "corporate-partner",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_canonical())
    }
}

/// A registered user. Never destroyed; role and address are immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub address: Address,
    pub role: Role,
    pub name: String,
    pub location: String,
    pub contact_info: String,
    /// Set by an admin via `verify_user`; gates collection creation.
    pub verified: bool,
    /// Integer in `REPUTATION_MIN..=REPUTATION_MAX`.
    pub reputation_score: u32,
    /// Unix seconds, supplied by the caller at registration.
    pub registered_at: u64,
}

/// Ledger outcome that drifts a user's reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationEvent {
    /// One of the user's collections was accepted by a recycler.
    CollectionVerified,
    /// One of the user's collections was rejected.
    CollectionRejected,
}

/// Returns the signed reputation delta for the given outcome.
fn reputation_delta_for(event: ReputationEvent) -> i64 {
    match event {
        ReputationEvent::CollectionVerified => REPUTATION_BONUS_VERIFIED as i64,
        ReputationEvent::CollectionRejected => -(REPUTATION_PENALTY_REJECTED as i64),
    }
}

/// Errors produced by the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Address already registered: {0}")]
    AlreadyRegistered(Address),

    #[error("Address not registered: {0}")]
    NotRegistered(Address),

    #[error("Unauthorized: {address} does not hold role {required}")]
    MissingRole { address: Address, required: Role },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid reputation score: must be {min}..={max}, got {got}")]
    InvalidRange { min: u32, max: u32, got: u32 },

    #[error("User not found: {0}")]
    UserNotFound(Address),
}

impl From<RegistryError> for AfriCycleError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::AlreadyRegistered(_) => AfriCycleError::State(e.to_string()),
            RegistryError::NotRegistered(_)
            | RegistryError::MissingRole { .. }
            | RegistryError::Unauthorized(_) => AfriCycleError::Unauthorized(e.to_string()),
            RegistryError::InvalidRange { .. } => AfriCycleError::Validation(e.to_string()),
            RegistryError::UserNotFound(_) => AfriCycleError::NotFound(e.to_string()),
        }
    }
}

/// User registry. Plain data; the owning [`Ledger`](crate::core::Ledger)
/// serializes access, so methods take `&self`/`&mut self` without locking.
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: HashMap<Address, User>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self { users: HashMap::new() }
    }

    /// Registers a new user with the neutral reputation score, unverified.
    /// Errors if the address already holds a role (roles are permanent).
    pub fn register(
        &mut self,
        address: Address,
        role: Role,
        name: String,
        location: String,
        contact_info: String,
        now: u64,
    ) -> Result<(), RegistryError> {
        if self.users.contains_key(&address) {
            return Err(RegistryError::AlreadyRegistered(address));
        }
        self.users.insert(
            address.clone(),
            User {
                address,
                role,
                name,
                location,
                contact_info,
                verified: false,
                reputation_score: REPUTATION_NEUTRAL,
                registered_at: now,
            },
        );
        Ok(())
    }

    /// Seeds a pre-verified user (ledger construction only; bypasses the
    /// self-service path so the admin role can exist at genesis).
    pub(crate) fn seed(&mut self, address: Address, role: Role, now: u64) {
        self.users.insert(
            address.clone(),
            User {
                address,
                role,
                name: String::new(),
                location: String::new(),
                contact_info: String::new(),
                verified: true,
                reputation_score: REPUTATION_NEUTRAL,
                registered_at: now,
            },
        );
    }

    /// Returns the user for the given address, if registered.
    pub fn get(&self, address: &Address) -> Option<&User> {
        self.users.get(address)
    }

    /// Returns the user or `NotRegistered`.
    pub fn require_registered(&self, address: &Address) -> Result<&User, RegistryError> {
        self.users
            .get(address)
            .ok_or_else(|| RegistryError::NotRegistered(address.clone()))
    }

    /// Capability gate consumed by every other component: the address must be
    /// registered and hold exactly `role`.
    pub fn require_role(&self, address: &Address, role: Role) -> Result<&User, RegistryError> {
        let user = self.require_registered(address)?;
        if user.role != role {
            return Err(RegistryError::MissingRole {
                address: address.clone(),
                required: role,
            });
        }
        Ok(user)
    }

    /// Marks a user verified. The admin gate is enforced by the ledger façade.
    pub fn set_verified(&mut self, address: &Address) -> Result<(), RegistryError> {
        let user = self
            .users
            .get_mut(address)
            .ok_or_else(|| RegistryError::UserNotFound(address.clone()))?;
        user.verified = true;
        Ok(())
    }

    /// Replaces a user's reputation score. Errors with `InvalidRange` unless
    /// `new_score` lies in `REPUTATION_MIN..=REPUTATION_MAX`. Returns the
    /// previous score for the audit event.
    pub fn update_reputation(
        &mut self,
        address: &Address,
        new_score: u32,
    ) -> Result<u32, RegistryError> {
        if new_score > REPUTATION_MAX {
            return Err(RegistryError::InvalidRange {
                min: REPUTATION_MIN,
                max: REPUTATION_MAX,
                got: new_score,
            });
        }
        let user = self
            .users
            .get_mut(address)
            .ok_or_else(|| RegistryError::UserNotFound(address.clone()))?;
        let old = user.reputation_score;
        user.reputation_score = new_score;
        Ok(old)
    }

    /// Applies reputation drift for a ledger outcome, saturating at the range
    /// bounds. Unknown addresses are a programming error upstream, so this
    /// silently no-ops rather than failing a committed transaction.
    pub fn adjust_reputation(&mut self, address: &Address, event: ReputationEvent) {
        if let Some(user) = self.users.get_mut(address) {
            let delta = reputation_delta_for(event);
            let next = (user.reputation_score as i64 + delta)
                .clamp(REPUTATION_MIN as i64, REPUTATION_MAX as i64);
            user.reputation_score = next as u32;
        }
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
