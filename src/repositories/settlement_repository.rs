use parking_lot::RwLock;

use crate::models::SettlementRecord;

use super::error::RepositoryError;

/// Append-only store of settlement records
pub trait SettlementRepository: Send + Sync {
    fn save(&self, record: &SettlementRecord) -> Result<(), RepositoryError>;

    /// Any record for the market; `Some` means the market has been settled
    fn find_by_market(&self, market_id: &str) -> Result<Option<SettlementRecord>, RepositoryError>;

    fn find_all_by_market(&self, market_id: &str) -> Result<Vec<SettlementRecord>, RepositoryError>;
}

#[derive(Default)]
pub struct InMemorySettlementRepository {
    records: RwLock<Vec<SettlementRecord>>,
}

impl InMemorySettlementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl SettlementRepository for InMemorySettlementRepository {
    fn save(&self, record: &SettlementRecord) -> Result<(), RepositoryError> {
        self.records.write().push(record.clone());
        Ok(())
    }

    fn find_by_market(&self, market_id: &str) -> Result<Option<SettlementRecord>, RepositoryError> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| r.market_id == market_id)
            .cloned())
    }

    fn find_all_by_market(&self, market_id: &str) -> Result<Vec<SettlementRecord>, RepositoryError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.market_id == market_id)
            .cloned()
            .collect())
    }
}
