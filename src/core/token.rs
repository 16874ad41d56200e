//! Stable-token vault: balances for every address plus the ledger's own
//! reserve account, which funds collection rewards.
//!
//! The real token lives outside the core (an ERC-20-style stable asset); this
//! vault models the slice the ledger observes: balance queries, deposits
//! arriving from the outside, and transfers the ledger itself initiates.
//! Keeping it inside the same store as the entity books is what makes a
//! reward transfer atomic with its status change.
//!
//! # Invariants
//! - A transfer checks the full amount against the sender's balance before
//!   moving anything; a failed transfer changes no balance.
//! - Amounts are integer micro-units; no floats.

use crate::error::AfriCycleError;
use std::collections::HashMap;
use thiserror::Error;

use crate::core::registry::Address;

/// The ledger's own token account; collection rewards are paid from here.
pub const RESERVE_ADDRESS: &str = "africycle-reserve";

/// Fixed-point unit for the stable token: 1 token = 1_000_000 micro-units.
pub const MICRO_PER_TOKEN: u128 = 1_000_000;

/// Errors produced by the token vault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Insufficient funds: {account} holds {available}, needs {required}")]
    InsufficientFunds {
        account: Address,
        required: u128,
        available: u128,
    },
}

impl From<TokenError> for AfriCycleError {
    fn from(e: TokenError) -> Self {
        AfriCycleError::Resource(e.to_string())
    }
}

/// In-store stable-token balances.
#[derive(Debug, Default)]
pub struct TokenVault {
    balances: HashMap<Address, u128>,
}

impl TokenVault {
    pub fn new() -> Self {
        Self { balances: HashMap::new() }
    }

    /// Balance in micro-units. Returns 0 for unknown accounts.
    pub fn balance_of(&self, account: &str) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Balance of the ledger reserve.
    pub fn reserve_balance(&self) -> u128 {
        self.balance_of(RESERVE_ADDRESS)
    }

    /// Credits an account. Models tokens arriving from outside the core
    /// (an on-chain transfer into the contract or a funded test account).
    pub fn deposit(&mut self, account: &str, amount: u128) {
        let bal = self.balances.entry(account.to_string()).or_insert(0);
        *bal = bal.saturating_add(amount);
    }

    /// Errors unless `account` holds at least `amount`. Used in the check
    /// phase of ledger operations so the apply phase cannot fail mid-way.
    pub fn require_balance(&self, account: &str, amount: u128) -> Result<(), TokenError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(TokenError::InsufficientFunds {
                account: account.to_string(),
                required: amount,
                available,
            });
        }
        Ok(())
    }

    /// Moves `amount` from `from` to `to`. Checks the balance first; on error
    /// no balance changes.
    pub fn transfer(&mut self, from: &str, to: &str, amount: u128) -> Result<(), TokenError> {
        self.require_balance(from, amount)?;
        let from_bal = self.balance_of(from);
        self.balances.insert(from.to_string(), from_bal - amount);
        let to_bal = self.balance_of(to);
        self.balances.insert(to.to_string(), to_bal + amount);
        Ok(())
    }
}
