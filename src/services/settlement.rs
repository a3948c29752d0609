//! Market settlement
//!
//! A market moves OPEN -> SETTLING -> SETTLED once. The in-process status map
//! stops concurrent or repeated calls; the settlement records stop a repeated
//! call from a fresh process.
//!
//! Each position is claimed with `mark_settled` before its balance moves, so
//! two processes settling the same market never pay a position twice. A crash
//! between the claim and the payout leaves the position settled but unpaid.

use dashmap::DashMap;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::{CoreConfig, SettlementMode};
use crate::models::{MarketId, MarketStatus, OrderSide, Position, SettlementRecord, SettlementSummary};
use crate::repositories::{
    AccountService, PositionRepository, RepositoryError, SettlementRepository,
};

use super::errors::SettlementError;

pub struct MarketSettlementService {
    positions: Arc<dyn PositionRepository>,
    accounts: Arc<dyn AccountService>,
    settlements: Arc<dyn SettlementRepository>,
    mode: SettlementMode,
    /// Decimal places payouts are rounded to before they touch a balance
    balance_scale: u32,
    statuses: DashMap<MarketId, MarketStatus>,
}

impl MarketSettlementService {
    pub fn new(
        positions: Arc<dyn PositionRepository>,
        accounts: Arc<dyn AccountService>,
        settlements: Arc<dyn SettlementRepository>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            positions,
            accounts,
            settlements,
            mode: config.settlement_mode,
            balance_scale: config.balance_scale,
            statuses: DashMap::new(),
        }
    }

    /// Pay out every unsettled position of a resolved market
    pub fn settle(
        &self,
        market_id: &str,
        winning_side: OrderSide,
    ) -> Result<SettlementSummary, SettlementError> {
        self.claim(market_id)?;

        match self.run(market_id, winning_side) {
            Ok(summary) => {
                self.statuses
                    .insert(market_id.to_string(), MarketStatus::Settled);
                tracing::info!(
                    market = %market_id,
                    winning_side = ?winning_side,
                    settled = summary.positions_settled,
                    skipped = summary.skipped,
                    total_payout = %summary.total_payout,
                    "market settled"
                );
                Ok(summary)
            }
            Err(e) => {
                let status = match e {
                    SettlementError::AlreadySettled(_) => MarketStatus::Settled,
                    _ => MarketStatus::Open,
                };
                self.statuses.insert(market_id.to_string(), status);
                tracing::warn!(market = %market_id, "settlement failed: {}", e);
                Err(e)
            }
        }
    }

    /// Settlement state of a market
    pub fn status(&self, market_id: &str) -> Result<MarketStatus, SettlementError> {
        if let Some(status) = self.statuses.get(market_id) {
            return Ok(*status);
        }
        if self.settlements.find_by_market(market_id)?.is_some() {
            return Ok(MarketStatus::Settled);
        }
        Ok(MarketStatus::Open)
    }

    /// Move the market to SETTLING, failing if another call got there first
    fn claim(&self, market_id: &str) -> Result<(), SettlementError> {
        let mut status = self.statuses.entry(market_id.to_string()).or_default();
        match *status {
            MarketStatus::Settled => Err(SettlementError::AlreadySettled(market_id.to_string())),
            MarketStatus::Settling => {
                Err(SettlementError::SettlementInProgress(market_id.to_string()))
            }
            MarketStatus::Open => {
                *status = MarketStatus::Settling;
                Ok(())
            }
        }
    }

    fn run(
        &self,
        market_id: &str,
        winning_side: OrderSide,
    ) -> Result<SettlementSummary, SettlementError> {
        let positions = self.positions.find_unsettled_by_market(market_id)?;
        let previously_settled = self.settlements.find_by_market(market_id)?.is_some();

        if positions.is_empty() {
            if previously_settled {
                return Err(SettlementError::AlreadySettled(market_id.to_string()));
            }
            return Err(SettlementError::NoPositions);
        }
        if previously_settled {
            tracing::warn!(
                market = %market_id,
                remaining = positions.len(),
                "resuming interrupted settlement"
            );
        }

        let unknown = self.unresolved_accounts(&positions)?;
        if self.mode == SettlementMode::Strict {
            if let Some(account_id) = positions
                .iter()
                .map(|p| &p.account_id)
                .find(|a| unknown.contains(a.as_str()))
            {
                return Err(SettlementError::UnknownAccount {
                    market_id: market_id.to_string(),
                    account_id: account_id.clone(),
                });
            }
        }

        let mut summary = SettlementSummary::new(market_id.to_string(), winning_side);
        for position in &positions {
            if unknown.contains(position.account_id.as_str()) {
                tracing::warn!(
                    market = %market_id,
                    position = %position.id,
                    account = %position.account_id,
                    "skipping position with unknown account"
                );
                summary.skipped += 1;
                continue;
            }

            if let Some((payout, won)) = self.settle_position(position, winning_side)? {
                summary.record(payout, won);
            }
        }

        Ok(summary)
    }

    /// Accounts referenced by `positions` that the account service does not know
    fn unresolved_accounts(&self, positions: &[Position]) -> Result<HashSet<String>, SettlementError> {
        let mut resolved: HashMap<&str, bool> = HashMap::new();
        for position in positions {
            let account = position.account_id.as_str();
            if !resolved.contains_key(account) {
                let known = self.accounts.get_balance(account)?.is_some();
                resolved.insert(account, known);
            }
        }
        Ok(resolved
            .into_iter()
            .filter(|(_, known)| !known)
            .map(|(account, _)| account.to_string())
            .collect())
    }

    /// Claim, pay and record one position. `None` when another settler claimed it first.
    fn settle_position(
        &self,
        position: &Position,
        winning_side: OrderSide,
    ) -> Result<Option<(Decimal, bool)>, SettlementError> {
        let won = position.is_winner(winning_side);
        let payout = position
            .payout(winning_side)
            .round_dp_with_strategy(self.balance_scale, RoundingStrategy::MidpointAwayFromZero);

        match self.positions.mark_settled(position.id, won) {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => {
                tracing::warn!(
                    market = %position.market_id,
                    position = %position.id,
                    "position already claimed by another settlement"
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        self.accounts.adjust_balance(&position.account_id, payout)?;
        self.settlements.save(&SettlementRecord::new(
            position.market_id.clone(),
            position.account_id.clone(),
            position.id,
            position.stake,
            payout,
            won,
        ))?;

        tracing::debug!(
            position = %position.id,
            account = %position.account_id,
            won,
            payout = %payout,
            "position settled"
        );
        Ok(Some((payout, won)))
    }
}
