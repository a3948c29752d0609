use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::AccountId;

use super::error::RepositoryError;

/// Account balances and funds checks
pub trait AccountService: Send + Sync {
    /// Whether the account can cover `quantity * price` on `market_id`
    fn has_sufficient_funds(
        &self,
        account_id: &str,
        market_id: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<bool, RepositoryError>;

    /// Note an estimated amount against an order. Advisory only, no funds move.
    fn reserve_for_order(
        &self,
        account_id: &str,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<(), RepositoryError>;

    /// Drop the reservation held for an order once it can no longer trade
    fn release_reservation(&self, account_id: &str, order_id: Uuid) -> Result<(), RepositoryError>;

    /// Add `delta` to the balance; returns the new balance
    fn adjust_balance(&self, account_id: &str, delta: Decimal) -> Result<Decimal, RepositoryError>;

    /// `None` when the account does not exist
    fn get_balance(&self, account_id: &str) -> Result<Option<Decimal>, RepositoryError>;

    /// Move `amount` from one account to another as a single unit
    fn transfer(&self, debit: &str, credit: &str, amount: Decimal) -> Result<(), RepositoryError>;
}

#[derive(Debug, Default)]
struct AccountState {
    balance: Decimal,
    reservations: HashMap<Uuid, Decimal>,
}

/// In-memory accounts. One mutex guards every account so transfers are atomic.
#[derive(Default)]
pub struct InMemoryAccountService {
    accounts: Mutex<HashMap<AccountId, AccountState>>,
}

impl InMemoryAccountService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or reset an account with an opening balance
    pub fn open_account(&self, account_id: impl Into<AccountId>, balance: Decimal) {
        self.accounts.lock().insert(
            account_id.into(),
            AccountState {
                balance,
                reservations: HashMap::new(),
            },
        );
    }

    /// Total advisory reservations for an account
    pub fn reserved(&self, account_id: &str) -> Decimal {
        self.accounts
            .lock()
            .get(account_id)
            .map(|a| a.reservations.values().copied().sum())
            .unwrap_or_default()
    }
}

fn not_found(account_id: &str) -> RepositoryError {
    RepositoryError::NotFound(format!("account {}", account_id))
}

impl AccountService for InMemoryAccountService {
    fn has_sufficient_funds(
        &self,
        account_id: &str,
        _market_id: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<bool, RepositoryError> {
        let accounts = self.accounts.lock();
        let account = accounts.get(account_id).ok_or_else(|| not_found(account_id))?;
        Ok(account.balance >= quantity * price)
    }

    fn reserve_for_order(
        &self,
        account_id: &str,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<(), RepositoryError> {
        let mut accounts = self.accounts.lock();
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| not_found(account_id))?;
        account.reservations.insert(order_id, amount);
        Ok(())
    }

    fn release_reservation(&self, account_id: &str, order_id: Uuid) -> Result<(), RepositoryError> {
        let mut accounts = self.accounts.lock();
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| not_found(account_id))?;
        account.reservations.remove(&order_id);
        Ok(())
    }

    fn adjust_balance(&self, account_id: &str, delta: Decimal) -> Result<Decimal, RepositoryError> {
        let mut accounts = self.accounts.lock();
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| not_found(account_id))?;
        account.balance += delta;
        Ok(account.balance)
    }

    fn get_balance(&self, account_id: &str) -> Result<Option<Decimal>, RepositoryError> {
        Ok(self.accounts.lock().get(account_id).map(|a| a.balance))
    }

    fn transfer(&self, debit: &str, credit: &str, amount: Decimal) -> Result<(), RepositoryError> {
        let mut accounts = self.accounts.lock();
        if !accounts.contains_key(debit) {
            return Err(not_found(debit));
        }
        if !accounts.contains_key(credit) {
            return Err(not_found(credit));
        }

        if let Some(from) = accounts.get_mut(debit) {
            from.balance -= amount;
        }
        if let Some(to) = accounts.get_mut(credit) {
            to.balance += amount;
        }
        Ok(())
    }
}
