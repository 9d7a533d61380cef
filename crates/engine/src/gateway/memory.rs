//! In-process gateway for tests and tooling.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    EngineError, MoneyCents, NewTransaction, Origin, ResultEngine, Transaction,
    TransactionFilter, query::Sort,
};

use super::Gateway;

/// Recorded balance-changing call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    IncrementOriginTotal { origin_id: String, delta: MoneyCents },
}

#[derive(Default)]
struct State {
    transactions: HashMap<String, Transaction>,
    origins: HashMap<String, Origin>,
    calls: Vec<GatewayCall>,
    failing_origins: HashSet<String>,
    fail_transaction_writes: bool,
}

/// Gateway keeping everything in memory behind one mutex.
///
/// Every operation holds the lock for its whole duration, so
/// `increment_origin_total` is atomic with respect to concurrent callers.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<State>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All `increment_origin_total` calls received so far, failed ones included.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Makes every later increment on `origin_id` fail with `Internal`.
    pub fn fail_increments_on(&self, origin_id: &str) {
        self.state().failing_origins.insert(origin_id.to_string());
    }

    /// Makes transaction inserts, updates and deletes fail with `Internal`.
    pub fn fail_transaction_writes(&self, fail: bool) {
        self.state().fail_transaction_writes = fail;
    }

    fn check_transaction_write(state: &State) -> ResultEngine<()> {
        if state.fail_transaction_writes {
            return Err(EngineError::Internal(
                "transaction store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

/// The fields a reconciliation was planned against.
fn same_version(stored: &Transaction, previous: &Transaction) -> bool {
    stored.updated_at == previous.updated_at
        && stored.origin_id == previous.origin_id
        && stored.amount == previous.amount
        && stored.direction == previous.direction
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn insert_transaction(&self, draft: &NewTransaction) -> ResultEngine<Transaction> {
        let mut state = self.state();
        Self::check_transaction_write(&state)?;
        let tx = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: draft.user_id.clone(),
            origin_id: draft.origin_id.clone(),
            amount: draft.amount,
            direction: draft.direction,
            subject: draft.subject.clone(),
            counterparty: draft.counterparty.clone(),
            description: draft.description.clone(),
            created_label: draft.created_label.clone(),
            created_at: draft.created_at,
            updated_at: draft.created_at,
        };
        state.transactions.insert(tx.id.clone(), tx.clone());
        Ok(tx)
    }

    async fn find_transaction(&self, id: &str) -> ResultEngine<Option<Transaction>> {
        Ok(self.state().transactions.get(id).cloned())
    }

    async fn update_transaction(
        &self,
        previous: &Transaction,
        next: &Transaction,
    ) -> ResultEngine<Transaction> {
        let mut state = self.state();
        Self::check_transaction_write(&state)?;
        let stored = state
            .transactions
            .get_mut(&previous.id)
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
        if !same_version(stored, previous) {
            return Err(EngineError::StaleRecord(previous.id.clone()));
        }
        *stored = next.clone();
        Ok(next.clone())
    }

    async fn delete_transaction(&self, previous: &Transaction) -> ResultEngine<()> {
        let mut state = self.state();
        Self::check_transaction_write(&state)?;
        let stored = state
            .transactions
            .get(&previous.id)
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
        if !same_version(stored, previous) {
            return Err(EngineError::StaleRecord(previous.id.clone()));
        }
        state.transactions.remove(&previous.id);
        Ok(())
    }

    async fn count_transactions(&self, filter: &TransactionFilter) -> ResultEngine<u64> {
        let state = self.state();
        Ok(state.transactions.values().filter(|tx| filter.matches(tx)).count() as u64)
    }

    async fn find_transaction_page(
        &self,
        filter: &TransactionFilter,
        sort: Sort,
        skip: u64,
        limit: u64,
    ) -> ResultEngine<Vec<Transaction>> {
        let state = self.state();
        let mut rows: Vec<&Transaction> = state
            .transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .collect();
        rows.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        if sort == Sort::CreatedAtDesc {
            rows.reverse();
        }
        Ok(rows
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn insert_origin(&self, user_id: &str, name: &str) -> ResultEngine<Origin> {
        let mut state = self.state();
        if state
            .origins
            .values()
            .any(|o| o.user_id == user_id && o.name == name)
        {
            return Err(EngineError::ExistingKey(name.to_string()));
        }
        let now = Utc::now();
        let origin = Origin {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            total: MoneyCents::ZERO,
            created_at: now,
            updated_at: now,
        };
        state.origins.insert(origin.id.clone(), origin.clone());
        Ok(origin)
    }

    async fn find_origin(&self, id: &str) -> ResultEngine<Option<Origin>> {
        Ok(self.state().origins.get(id).cloned())
    }

    async fn lookup_origins(&self, ids: &[String]) -> ResultEngine<HashMap<String, Origin>> {
        let state = self.state();
        Ok(ids
            .iter()
            .filter_map(|id| state.origins.get(id).map(|o| (id.clone(), o.clone())))
            .collect())
    }

    async fn origins_by_user(&self, user_id: &str) -> ResultEngine<Vec<Origin>> {
        let state = self.state();
        let mut origins: Vec<Origin> = state
            .origins
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        origins.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(origins)
    }

    async fn update_origin(
        &self,
        id: &str,
        name: &str,
        total: Option<MoneyCents>,
    ) -> ResultEngine<Origin> {
        let mut state = self.state();
        let user_id = state
            .origins
            .get(id)
            .map(|o| o.user_id.clone())
            .ok_or_else(|| EngineError::KeyNotFound("origin not exists".to_string()))?;
        if state
            .origins
            .values()
            .any(|o| o.id != id && o.user_id == user_id && o.name == name)
        {
            return Err(EngineError::ExistingKey(name.to_string()));
        }
        let origin = state
            .origins
            .get_mut(id)
            .ok_or_else(|| EngineError::KeyNotFound("origin not exists".to_string()))?;
        origin.name = name.to_string();
        if let Some(total) = total {
            origin.total = total;
        }
        origin.updated_at = Utc::now();
        Ok(origin.clone())
    }

    async fn delete_origin(&self, id: &str) -> ResultEngine<()> {
        self.state()
            .origins
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::KeyNotFound("origin not exists".to_string()))
    }

    async fn increment_origin_total(&self, id: &str, delta: MoneyCents) -> ResultEngine<Origin> {
        let mut state = self.state();
        state.calls.push(GatewayCall::IncrementOriginTotal {
            origin_id: id.to_string(),
            delta,
        });
        if state.failing_origins.contains(id) {
            return Err(EngineError::Internal(format!(
                "storage failure on origin {id}"
            )));
        }
        let origin = state
            .origins
            .get_mut(id)
            .ok_or_else(|| EngineError::KeyNotFound("origin not exists".to_string()))?;
        origin.total = origin.total.try_add(delta)?;
        origin.updated_at = Utc::now();
        Ok(origin.clone())
    }
}
